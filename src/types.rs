//! Core hook types
//!
//! - `Hook` trait - implemented by anything registrable under a hook name
//! - `HookOutput` - a hook's result: ready value or pending future
//! - `HookArgs` - the argument list shared across one dispatch

use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use crate::context::HookContext;
use crate::error::HookError;

/// Argument list handed to every hook of one dispatch
///
/// Shared by reference across the whole batch; hooks must not assume
/// exclusive access.
pub type HookArgs = Arc<Vec<Value>>;

/// Boxed future resolving to a hook's settled result
pub type HookFuture = BoxFuture<'static, Result<Value, HookError>>;

/// Result of invoking a hook
///
/// A hook's synchronous portion always runs inline; what it hands back is
/// either a settled result or a future for the remainder. The sync call
/// strategy rejects `Pending` outputs, the async strategies await them.
pub enum HookOutput {
    /// The hook completed synchronously
    Ready(Result<Value, HookError>),
    /// The hook's remainder settles asynchronously
    Pending(HookFuture),
}

impl HookOutput {
    /// Successful synchronous completion with a value
    pub fn value(value: impl Into<Value>) -> Self {
        HookOutput::Ready(Ok(value.into()))
    }

    /// Successful synchronous completion without a meaningful value
    pub fn unit() -> Self {
        HookOutput::Ready(Ok(Value::Null))
    }

    /// Synchronous failure
    pub fn err(error: impl Into<HookError>) -> Self {
        HookOutput::Ready(Err(error.into()))
    }

    /// Asynchronous completion
    pub fn future<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, HookError>> + Send + 'static,
    {
        HookOutput::Pending(future.boxed())
    }

    /// Collapse into a future regardless of which side this is
    pub(crate) fn into_future(self) -> HookFuture {
        match self {
            HookOutput::Ready(result) => future::ready(result).boxed(),
            HookOutput::Pending(fut) => fut,
        }
    }
}

impl std::fmt::Debug for HookOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookOutput::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            HookOutput::Pending(_) => f.debug_tuple("Pending").finish(),
        }
    }
}

/// Trait for hook callbacks
pub trait Hook: Send + Sync {
    /// Invoke the hook with the dispatch's argument list
    fn call(&self, args: HookArgs) -> HookOutput;
}

/// Implement Hook for closures
///
/// Any `Fn(HookArgs) -> HookOutput` closure registers directly.
impl<F> Hook for F
where
    F: Fn(HookArgs) -> HookOutput + Send + Sync,
{
    fn call(&self, args: HookArgs) -> HookOutput {
        (self)(args)
    }
}

/// Type alias for stored hooks; removal identity is `Arc::ptr_eq`
pub type ArcHook = Arc<dyn Hook>;

/// Type alias for stored before/after interceptors
///
/// Interceptors receive the execution context directly rather than relying
/// on ambient lookup.
pub type ArcInterceptor = Arc<dyn Fn(&HookContext) + Send + Sync>;
