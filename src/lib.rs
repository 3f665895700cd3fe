//! Named-hook registration and dispatch
//!
//! Callers register callbacks ("hooks") under names; dispatching a name
//! invokes every callback registered under it, in registration order, under
//! one of three call strategies:
//!
//! | Strategy | Entry point | Result |
//! |----------|-------------|--------|
//! | Sync | [`Hookable::call_hook_sync`] | last callback's value |
//! | Serial-async | [`Hookable::call_hook`] | last settled value |
//! | Parallel-async | [`Hookable::call_hook_parallel`] | all values, input order |
//!
//! Every dispatch carries a [`HookContext`] visible to global before/after
//! interceptors and, via ambient lookup ([`current_context`]), to the hook
//! currently executing. Nested hook configs flatten to colon-joined names
//! (`a:b:c`) for bulk registration and merging.
//!
//! # Example
//!
//! ```ignore
//! use hookbus::{create_hooks, HookArgs, HookOutput};
//! use serde_json::json;
//!
//! let hooks = create_hooks();
//!
//! hooks.hook("page:render", |args: HookArgs| {
//!     HookOutput::value(format!("rendered {}", args[0]))
//! });
//!
//! let result = hooks.call_hook_sync("page:render", vec![json!("index")])?;
//! ```

pub mod callers;
pub mod context;
pub mod error;
pub mod registry;
pub mod tree;
pub mod types;

pub use callers::{combine_hooks, CallStrategy, Caller, CallerOutput, ParallelCaller, SerialCaller, SyncCaller};
pub use context::{current_context, BoundHook, ExecutionStage, HookContext};
pub use error::{HookError, HookResult};
pub use registry::{create_hooks, DeprecatedHook, Hookable, Unhook};
pub use tree::{flat_hooks, merge_hooks, HookTree};
pub use types::{ArcHook, ArcInterceptor, Hook, HookArgs, HookFuture, HookOutput};
