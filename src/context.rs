//! Execution context
//!
//! One `HookContext` exists per dispatch. It records the hook name, the
//! shared argument list, the current stage, position bookkeeping for the
//! callback being invoked, and the last observed return value.
//!
//! The "current" context is the top of a thread-local stack so that a hook
//! body can look its own context up without it being threaded through as a
//! parameter, and so that a hook dispatching further hooks re-entrantly
//! restores the outer context when the inner dispatch finishes.

use std::cell::RefCell;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::types::{ArcHook, HookArgs, HookOutput};

/// Stage a dispatch is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    /// Context created, nothing run yet
    Init,
    /// Before-interceptors running
    Before,
    /// Registered hook callbacks running
    Hook,
    /// After-interceptors running
    After,
}

impl std::fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStage::Init => write!(f, "init"),
            ExecutionStage::Before => write!(f, "before"),
            ExecutionStage::Hook => write!(f, "hook"),
            ExecutionStage::After => write!(f, "after"),
        }
    }
}

/// Mutable portion of the context, updated by the registry between callbacks
struct ContextState {
    stage: ExecutionStage,
    current_index: Option<usize>,
    returned: Option<Value>,
}

/// Per-dispatch execution context
///
/// `args` and `returned` are shared mutable state across the whole batch:
/// every callback of one dispatch sees the same argument list, and under
/// the parallel strategy concurrently settling callbacks race on
/// `returned` with last-settled-wins semantics.
///
/// Position fields (`current_index`, `is_first`, `is_end`) are only valid
/// when read from inside the callback they were set for. `length` is always
/// the registered hook count for the dispatched name, including while
/// interceptors run.
pub struct HookContext {
    name: String,
    args: HookArgs,
    length: usize,
    state: Mutex<ContextState>,
}

impl HookContext {
    pub(crate) fn new(name: &str, args: HookArgs, length: usize) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            args,
            length,
            state: Mutex::new(ContextState {
                stage: ExecutionStage::Init,
                current_index: None,
                returned: None,
            }),
        })
    }

    /// Hook name being dispatched
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Argument list shared by every callback of this dispatch
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Number of hook callbacks registered for this dispatch
    pub fn length(&self) -> usize {
        self.length
    }

    /// Stage currently executing
    pub fn stage(&self) -> ExecutionStage {
        self.state.lock().unwrap().stage
    }

    /// Index of the callback currently executing within its stage
    ///
    /// `None` until the first callback of the dispatch runs.
    pub fn current_index(&self) -> Option<usize> {
        self.state.lock().unwrap().current_index
    }

    /// Whether the current callback is first in its queue
    pub fn is_first(&self) -> bool {
        self.current_index() == Some(0)
    }

    /// Whether the current callback is last relative to the hook count
    pub fn is_end(&self) -> bool {
        matches!(self.current_index(), Some(index) if index + 1 == self.length)
    }

    /// Last observed successful return value
    pub fn returned(&self) -> Option<Value> {
        self.state.lock().unwrap().returned.clone()
    }

    /// Overwrite the last observed return value
    pub fn set_returned(&self, value: Value) {
        self.state.lock().unwrap().returned = Some(value);
    }

    pub(crate) fn set_stage(&self, stage: ExecutionStage) {
        self.state.lock().unwrap().stage = stage;
    }

    pub(crate) fn set_current_index(&self, index: usize) {
        self.state.lock().unwrap().current_index = Some(index);
    }
}

impl std::fmt::Debug for HookContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("HookContext")
            .field("name", &self.name)
            .field("stage", &state.stage)
            .field("current_index", &state.current_index)
            .field("length", &self.length)
            .finish()
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<Arc<HookContext>>> = RefCell::new(Vec::new());
}

/// Get the context of the hook currently executing on this thread
///
/// Only meaningful when called synchronously from the top level of a hook
/// body; returns `None` anywhere else, including after an `.await` inside
/// an async hook (the resumed body may run on a different thread and the
/// ambient slot has already been released).
pub fn current_context() -> Option<Arc<HookContext>> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

/// Scope guard publishing a context as current for one callback invocation
///
/// Push on construction, pop on drop. The stack discipline is what keeps
/// re-entrant dispatch sound: an inner dispatch's pop reveals the outer
/// context again instead of clearing the slot outright.
pub(crate) struct ContextGuard;

impl ContextGuard {
    pub(crate) fn enter(ctx: Arc<HookContext>) -> Self {
        CURRENT.with(|stack| stack.borrow_mut().push(ctx));
        ContextGuard
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// A hook wrapped for one dispatch: invoked exactly once with the batch args
pub type BoundHook = Box<dyn FnOnce(HookArgs) -> HookOutput + Send>;

/// Wrap a hook so its invocation maintains the context
///
/// Immediately before the hook's synchronous body: publish the context as
/// current and record the hook's own index. Immediately after it returns
/// (value or error): un-publish. A successful ready value overwrites
/// `returned` synchronously; a pending output schedules the overwrite onto
/// settle.
pub(crate) fn bind(hook: ArcHook, ctx: Arc<HookContext>, index: usize) -> BoundHook {
    Box::new(move |args| {
        let _guard = ContextGuard::enter(ctx.clone());
        ctx.set_current_index(index);

        match hook.call(args) {
            HookOutput::Ready(result) => {
                if let Ok(value) = &result {
                    ctx.set_returned(value.clone());
                }
                HookOutput::Ready(result)
            }
            HookOutput::Pending(fut) => {
                let ctx = ctx.clone();
                HookOutput::future(async move {
                    let result = fut.await;
                    if let Ok(value) = &result {
                        ctx.set_returned(value.clone());
                    }
                    result
                })
            }
        }
    })
}
