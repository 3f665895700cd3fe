//! Nested hook configuration
//!
//! A `HookTree` is an arbitrarily nested mapping whose leaves are hooks and
//! whose groups are named sub-mappings. Flattening joins names from root to
//! leaf with `:`, so `{a: {b: {c: f}}}` flattens to the single name
//! `a:b:c`.

use std::sync::Arc;

use crate::callers::{combine_hooks, CallStrategy};
use crate::types::{ArcHook, Hook};

/// Recursive nested-hook configuration node
pub enum HookTree {
    /// A registrable callback
    Leaf(ArcHook),
    /// A named group of further nodes, in insertion order
    Node(Vec<(String, HookTree)>),
}

impl HookTree {
    /// Leaf node holding a hook
    pub fn leaf<H: Hook + 'static>(hook: H) -> Self {
        HookTree::Leaf(Arc::new(hook))
    }

    /// Leaf node sharing an already-registered hook (identity preserved,
    /// so `remove_hooks` can match it)
    pub fn leaf_arc(hook: ArcHook) -> Self {
        HookTree::Leaf(hook)
    }

    /// Group node; entry order becomes registration order
    pub fn node<S: Into<String>>(children: impl IntoIterator<Item = (S, HookTree)>) -> Self {
        HookTree::Node(
            children
                .into_iter()
                .map(|(name, child)| (name.into(), child))
                .collect(),
        )
    }
}

impl std::fmt::Debug for HookTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookTree::Leaf(_) => f.write_str("Leaf"),
            HookTree::Node(children) => {
                let mut map = f.debug_map();
                for (name, child) in children {
                    map.entry(name, child);
                }
                map.finish()
            }
        }
    }
}

/// Flatten a nested config into `name -> hook` pairs
///
/// Names are joined with `:` from root to leaf; arbitrary depth. A bare
/// top-level leaf has no name to register under and flattens to nothing.
pub fn flat_hooks(tree: &HookTree) -> Vec<(String, ArcHook)> {
    let mut flat = Vec::new();
    if let HookTree::Node(children) = tree {
        for (name, child) in children {
            walk(name, child, &mut flat);
        }
    }
    flat
}

fn walk(name: &str, node: &HookTree, flat: &mut Vec<(String, ArcHook)>) {
    match node {
        HookTree::Leaf(hook) => flat.push((name.to_string(), hook.clone())),
        HookTree::Node(children) => {
            for (child_name, child) in children {
                walk(&format!("{name}:{child_name}"), child, flat);
            }
        }
    }
}

/// Merge several nested configs into one flat mapping
///
/// A name contributed by exactly one input passes its hook through
/// untouched (identity preserved, no wrapper). A name contributed more than
/// once gets its hooks combined, in input order, under the given strategy.
pub fn merge_hooks(trees: &[HookTree], strategy: CallStrategy) -> Vec<(String, ArcHook)> {
    let mut merged: Vec<(String, Vec<ArcHook>)> = Vec::new();

    for tree in trees {
        for (name, hook) in flat_hooks(tree) {
            match merged.iter_mut().find(|(existing, _)| *existing == name) {
                Some((_, hooks)) => hooks.push(hook),
                None => merged.push((name, vec![hook])),
            }
        }
    }

    merged
        .into_iter()
        .map(|(name, mut hooks)| {
            let hook = if hooks.len() > 1 {
                combine_hooks(&name, strategy, hooks)
            } else {
                hooks.swap_remove(0)
            };
            (name, hook)
        })
        .collect()
}
