//! Hook registry
//!
//! Contains:
//! - `Hookable` - the name -> callback-list registry and dispatch engine
//! - `Unhook` - idempotent unregister token
//! - `DeprecatedHook` - alias entry redirecting an old name to a new one

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::callers::{Caller, CallerOutput, ParallelCaller, SerialCaller, SyncCaller};
use crate::context::{bind, current_context, ExecutionStage, HookContext};
use crate::error::HookError;
use crate::tree::{flat_hooks, HookTree};
use crate::types::{ArcHook, ArcInterceptor, Hook, HookArgs, HookOutput};

/// Deprecation alias: registrations under the old name are redirected to
/// `to`, with an optional custom warning message
#[derive(Debug, Clone)]
pub struct DeprecatedHook {
    /// Replacement hook name
    pub to: String,
    /// Custom warning; a default naming the replacement is used when absent
    pub message: Option<String>,
}

impl DeprecatedHook {
    /// Alias to a replacement name with the default warning
    pub fn to(name: impl Into<String>) -> Self {
        Self {
            to: name.into(),
            message: None,
        }
    }

    /// Attach a custom warning message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl From<&str> for DeprecatedHook {
    fn from(name: &str) -> Self {
        DeprecatedHook::to(name)
    }
}

impl From<String> for DeprecatedHook {
    fn from(name: String) -> Self {
        DeprecatedHook::to(name)
    }
}

/// Idempotent unregister token
///
/// Cloneable; whichever clone fires first wins and every later call is a
/// no-op. Holds only a weak reference to the registry, so a token outliving
/// its registry is inert.
#[derive(Clone)]
pub struct Unhook {
    action: Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>,
}

impl Unhook {
    fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Arc::new(Mutex::new(Some(Box::new(action)))),
        }
    }

    /// Inert token returned for rejected registrations
    fn noop() -> Self {
        Self {
            action: Arc::new(Mutex::new(None)),
        }
    }

    /// Aggregate several tokens into one bulk token
    pub fn all(tokens: Vec<Unhook>) -> Self {
        Unhook::new(move || {
            for token in &tokens {
                token.unhook();
            }
        })
    }

    /// Unregister; calling again is a no-op
    pub fn unhook(&self) {
        let action = self.action.lock().unwrap().take();
        if let Some(action) = action {
            action();
        }
    }
}

impl std::fmt::Debug for Unhook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let spent = self.action.lock().unwrap().is_none();
        f.debug_struct("Unhook").field("spent", &spent).finish()
    }
}

/// Wrapper making a hook fire at most once; it unregisters itself before
/// running the inner hook, and unregistering it first cancels it entirely
struct OnceHook {
    hook: ArcHook,
    unhook: Mutex<Option<Unhook>>,
}

impl Hook for OnceHook {
    fn call(&self, args: HookArgs) -> HookOutput {
        // Taking the token is atomic, so at-most-once holds even when two
        // dispatches snapshot this hook concurrently.
        let token = self.unhook.lock().unwrap().take();
        match token {
            Some(token) => {
                token.unhook();
                self.hook.call(args)
            }
            None => HookOutput::unit(),
        }
    }
}

/// Internal state protected by RwLock
struct HookableState {
    /// name -> ordered callback list; entries created on first registration
    /// and deleted when emptied
    hooks: HashMap<String, Vec<ArcHook>>,
    /// Global before-interceptors, in registration order
    before: Vec<ArcInterceptor>,
    /// Global after-interceptors, in registration order
    after: Vec<ArcInterceptor>,
    /// old name -> alias entry, consulted at registration time
    deprecated: HashMap<String, DeprecatedHook>,
}

/// Deprecation warnings already surfaced, deduplicated by message text for
/// the lifetime of the process
static DEPRECATED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn warn_deprecated(message: String) {
    let seen = DEPRECATED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));
    if seen.lock().unwrap().insert(message.clone()) {
        tracing::warn!("{message}");
    }
}

/// Named-hook registry and dispatch engine
///
/// Callbacks register under a name; dispatching a name invokes every
/// registered callback under a call strategy (sync, serial-async or
/// parallel-async), with global before/after interceptors observing every
/// dispatch through its [`HookContext`].
///
/// Cloning is cheap and clones share state.
///
/// # Example
///
/// ```ignore
/// use hookbus::{Hookable, HookArgs, HookOutput};
///
/// let hooks = Hookable::new();
///
/// hooks.hook("build:done", |args: HookArgs| {
///     println!("built {} artifacts", args.len());
///     HookOutput::unit()
/// });
///
/// let last = hooks.call_hook_sync("build:done", vec![])?;
/// ```
#[derive(Clone, Default)]
pub struct Hookable {
    state: Arc<RwLock<HookableState>>,
}

impl Default for HookableState {
    fn default() -> Self {
        Self {
            hooks: HashMap::new(),
            before: Vec::new(),
            after: Vec::new(),
            deprecated: HashMap::new(),
        }
    }
}

impl Hookable {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback under a hook name
    ///
    /// An empty name is rejected silently (inert token). If the name
    /// resolves through deprecation aliases, registration is redirected to
    /// the final target and a one-time warning is surfaced.
    pub fn hook<H: Hook + 'static>(&self, name: &str, hook: H) -> Unhook {
        self.hook_arc(name, Arc::new(hook), false)
    }

    /// Register under a deprecated name without surfacing the warning
    pub fn hook_allow_deprecated<H: Hook + 'static>(&self, name: &str, hook: H) -> Unhook {
        self.hook_arc(name, Arc::new(hook), true)
    }

    fn hook_arc(&self, name: &str, hook: ArcHook, allow_deprecated: bool) -> Unhook {
        if name.is_empty() {
            return Unhook::noop();
        }

        let resolved = {
            let mut state = self.state.write().unwrap();

            // Follow the alias chain eagerly; the visited set stops an
            // accidental alias cycle from spinning.
            let mut resolved = name.to_string();
            let mut dep: Option<DeprecatedHook> = None;
            let mut seen = HashSet::new();
            while let Some(entry) = state.deprecated.get(&resolved) {
                if !seen.insert(resolved.clone()) {
                    break;
                }
                dep = Some(entry.clone());
                resolved = entry.to.clone();
            }

            if let Some(dep) = dep {
                if !allow_deprecated {
                    let message = dep.message.clone().unwrap_or_else(|| {
                        format!("{name} hook has been deprecated, please use {resolved}")
                    });
                    warn_deprecated(message);
                }
            }

            state.hooks.entry(resolved.clone()).or_default().push(hook.clone());
            resolved
        };

        tracing::debug!(hook = %resolved, "registered hook");

        let state = Arc::downgrade(&self.state);
        Unhook::new(move || {
            if let Some(state) = state.upgrade() {
                remove_hook_arc(&state, &resolved, &hook);
            }
        })
    }

    /// Register a callback that fires at most once
    ///
    /// Its first invocation unregisters it before running; unregistering
    /// via the returned token before that cancels it entirely.
    pub fn hook_once<H: Hook + 'static>(&self, name: &str, hook: H) -> Unhook {
        let once = Arc::new(OnceHook {
            hook: Arc::new(hook),
            unhook: Mutex::new(None),
        });
        let token = self.hook_arc(name, once.clone(), false);
        *once.unhook.lock().unwrap() = Some(token.clone());
        token
    }

    /// Remove a callback from a name's list by identity
    ///
    /// Unknown name or callback is a no-op. Removing a name's last callback
    /// deletes the entry.
    pub fn remove_hook(&self, name: &str, hook: &ArcHook) {
        remove_hook_arc(&self.state, name, hook);
    }

    /// Record a deprecation alias and migrate existing registrations
    ///
    /// Callbacks already registered under `name` are re-registered so they
    /// land under the resolved target, order preserved.
    pub fn deprecate_hook(&self, name: &str, deprecated: impl Into<DeprecatedHook>) {
        let existing = {
            let mut state = self.state.write().unwrap();
            state.deprecated.insert(name.to_string(), deprecated.into());
            state.hooks.remove(name).unwrap_or_default()
        };
        for hook in existing {
            self.hook_arc(name, hook, false);
        }
    }

    /// Record several deprecation aliases at once
    pub fn deprecate_hooks<I, S, D>(&self, deprecated: I)
    where
        I: IntoIterator<Item = (S, D)>,
        S: AsRef<str>,
        D: Into<DeprecatedHook>,
    {
        for (name, dep) in deprecated {
            self.deprecate_hook(name.as_ref(), dep);
        }
    }

    /// Flatten a nested hook config and register every leaf
    ///
    /// The returned token unregisters all of them.
    pub fn add_hooks(&self, config: &HookTree) -> Unhook {
        let tokens: Vec<Unhook> = flat_hooks(config)
            .into_iter()
            .map(|(name, hook)| self.hook_arc(&name, hook, false))
            .collect();
        Unhook::all(tokens)
    }

    /// Remove the leaves of a nested hook config by identity
    pub fn remove_hooks(&self, config: &HookTree) {
        for (name, hook) in flat_hooks(config) {
            self.remove_hook(&name, &hook);
        }
    }

    /// Remove entire name entries
    pub fn remove_hooks_by_name<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.write().unwrap();
        for name in names {
            state.hooks.remove(name.as_ref());
        }
    }

    /// Clear every registered hook; interceptors are unaffected
    pub fn remove_all_hooks(&self) {
        self.state.write().unwrap().hooks = HashMap::new();
    }

    /// Register a global interceptor run before the hook stage of every
    /// dispatch, across all names, in registration order
    pub fn before_each<F>(&self, interceptor: F) -> Unhook
    where
        F: Fn(&HookContext) + Send + Sync + 'static,
    {
        let interceptor: ArcInterceptor = Arc::new(interceptor);
        self.state.write().unwrap().before.push(interceptor.clone());

        let state = Arc::downgrade(&self.state);
        Unhook::new(move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.write().unwrap();
                if let Some(pos) = state
                    .before
                    .iter()
                    .position(|i| Arc::ptr_eq(i, &interceptor))
                {
                    state.before.remove(pos);
                }
            }
        })
    }

    /// Register a global interceptor run after the hook stage settles,
    /// success or failure
    pub fn after_each<F>(&self, interceptor: F) -> Unhook
    where
        F: Fn(&HookContext) + Send + Sync + 'static,
    {
        let interceptor: ArcInterceptor = Arc::new(interceptor);
        self.state.write().unwrap().after.push(interceptor.clone());

        let state = Arc::downgrade(&self.state);
        Unhook::new(move || {
            if let Some(state) = state.upgrade() {
                let mut state = state.write().unwrap();
                if let Some(pos) = state
                    .after
                    .iter()
                    .position(|i| Arc::ptr_eq(i, &interceptor))
                {
                    state.after.remove(pos);
                }
            }
        })
    }

    /// Dispatch synchronously; yields the final callback's return value
    pub fn call_hook_sync(&self, name: &str, args: Vec<Value>) -> Result<Value, HookError> {
        self.call_hook_with(SyncCaller, name, args)
    }

    /// Dispatch serially; each callback starts once the prior one settled
    pub fn call_hook(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Value, HookError>> {
        self.call_hook_with(SerialCaller, name, args)
    }

    /// Dispatch in parallel; yields every callback's result in input order
    pub fn call_hook_parallel(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> BoxFuture<'static, Result<Vec<Value>, HookError>> {
        self.call_hook_with(ParallelCaller, name, args)
    }

    /// Dispatch with an explicit call strategy
    ///
    /// The orchestration core: snapshots the callback and interceptor
    /// lists, creates a fresh context, runs the before stage, hands the
    /// context-bound callbacks to the caller, and attaches the after stage
    /// to the result's completion so it runs whether the hook stage
    /// succeeded or failed. Context, callbacks and the completion closure
    /// all drop once the after stage finishes, releasing the argument
    /// graph.
    pub fn call_hook_with<C: Caller>(&self, caller: C, name: &str, args: Vec<Value>) -> C::Output {
        let (hooks, before, after) = {
            let state = self.state.read().unwrap();
            (
                state.hooks.get(name).cloned().unwrap_or_default(),
                state.before.clone(),
                state.after.clone(),
            )
        };

        tracing::debug!(hook = %name, count = hooks.len(), "calling hooks");

        let args: HookArgs = Arc::new(args);
        let ctx = HookContext::new(name, args.clone(), hooks.len());

        ctx.set_stage(ExecutionStage::Before);
        run_interceptors(&ctx, &before);

        ctx.set_stage(ExecutionStage::Hook);
        let bound = hooks
            .into_iter()
            .enumerate()
            .map(|(index, hook)| bind(hook, ctx.clone(), index))
            .collect();
        let result = caller.call(name, bound, args);

        result.finally(move || {
            ctx.set_stage(ExecutionStage::After);
            run_interceptors(&ctx, &after);
        })
    }

    /// Context of the hook currently executing on this thread, if any
    ///
    /// Only meaningful synchronously from the top level of a hook body; see
    /// [`current_context`].
    pub fn current_context(&self) -> Option<Arc<HookContext>> {
        current_context()
    }

    /// Names with at least one registered callback
    pub fn hook_names(&self) -> Vec<String> {
        self.state.read().unwrap().hooks.keys().cloned().collect()
    }

    /// Number of callbacks registered under a name
    pub fn hook_count(&self, name: &str) -> usize {
        self.state
            .read()
            .unwrap()
            .hooks
            .get(name)
            .map(|hooks| hooks.len())
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for Hookable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().unwrap();
        let mut map = f.debug_map();
        for (name, hooks) in &state.hooks {
            map.entry(name, &hooks.len());
        }
        map.finish()
    }
}

/// Create a new hook registry
pub fn create_hooks() -> Hookable {
    Hookable::new()
}

fn remove_hook_arc(state: &RwLock<HookableState>, name: &str, hook: &ArcHook) {
    let mut state = state.write().unwrap();
    if let Some(hooks) = state.hooks.get_mut(name) {
        if let Some(pos) = hooks.iter().position(|h| Arc::ptr_eq(h, hook)) {
            hooks.remove(pos);
        }
        if hooks.is_empty() {
            state.hooks.remove(name);
        }
    }
}

fn run_interceptors(ctx: &Arc<HookContext>, interceptors: &[ArcInterceptor]) {
    for (index, interceptor) in interceptors.iter().enumerate() {
        ctx.set_current_index(index);
        (interceptor.as_ref())(ctx.as_ref());
    }
}
