//! Call strategies
//!
//! A caller turns the ordered, context-bound hook list of one dispatch into
//! a single combined invocation:
//!
//! - `SyncCaller` - in order, never suspends, fails fast, yields the last value
//! - `SerialCaller` - in order, each hook starts only once the prior settled
//! - `ParallelCaller` - all started in order, completions race, all-or-first-failure
//!
//! `combine_hooks` is the strategy applied at merge time: it folds several
//! hooks registered under one name into a single stored hook.

use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::Value;

use crate::context::BoundHook;
use crate::error::HookError;
use crate::types::{ArcHook, Hook, HookArgs, HookOutput};

/// Combination policy for hooks sharing a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStrategy {
    /// Synchronous, last value wins
    Sync,
    /// Asynchronous, strictly one after another
    Serial,
    /// Asynchronous, all at once
    Parallel,
}

/// Output of a caller, with a completion attachment point
///
/// `finally` runs an action when the output settles: immediately for a
/// synchronous result, on completion of the future for asynchronous ones.
/// The action runs on the error path too, which is what keeps
/// after-interceptors firing when the hook stage failed.
pub trait CallerOutput {
    fn finally(self, action: impl FnOnce() + Send + 'static) -> Self;
}

impl CallerOutput for Result<Value, HookError> {
    fn finally(self, action: impl FnOnce() + Send + 'static) -> Self {
        action();
        self
    }
}

impl<T: Send + 'static> CallerOutput for BoxFuture<'static, Result<T, HookError>> {
    fn finally(self, action: impl FnOnce() + Send + 'static) -> Self {
        async move {
            let result = self.await;
            action();
            result
        }
        .boxed()
    }
}

/// Strategy executing one dispatch's bound hooks
pub trait Caller {
    type Output: CallerOutput;

    /// Run the bound hooks with the shared argument list
    fn call(self, name: &str, hooks: Vec<BoundHook>, args: HookArgs) -> Self::Output;
}

/// Invoke every hook in order, synchronously; yield the final return value
///
/// A failing hook aborts the rest of the batch. A hook handing back a
/// pending future is a misuse of this strategy and surfaces as
/// [`HookError::AsyncHookInSyncCall`].
pub struct SyncCaller;

impl Caller for SyncCaller {
    type Output = Result<Value, HookError>;

    fn call(self, name: &str, hooks: Vec<BoundHook>, args: HookArgs) -> Self::Output {
        let mut last = Value::Null;
        for hook in hooks {
            match hook(args.clone()) {
                HookOutput::Ready(result) => last = result?,
                HookOutput::Pending(_) => {
                    return Err(HookError::AsyncHookInSyncCall(name.to_string()));
                }
            }
        }
        Ok(last)
    }
}

/// Invoke hooks strictly in order, each one starting only after the prior
/// result settled; yield the last settled value
pub struct SerialCaller;

impl Caller for SerialCaller {
    type Output = BoxFuture<'static, Result<Value, HookError>>;

    fn call(self, _name: &str, hooks: Vec<BoundHook>, args: HookArgs) -> Self::Output {
        async move {
            let mut last = Value::Null;
            for hook in hooks {
                last = hook(args.clone()).into_future().await?;
            }
            Ok(last)
        }
        .boxed()
    }
}

/// Start every hook immediately (synchronous portions in registration
/// order), then join: all values in input order, or the first failure
pub struct ParallelCaller;

impl Caller for ParallelCaller {
    type Output = BoxFuture<'static, Result<Vec<Value>, HookError>>;

    fn call(self, _name: &str, hooks: Vec<BoundHook>, args: HookArgs) -> Self::Output {
        // Every synchronous portion runs here, before the first await.
        let pending: Vec<_> = hooks
            .into_iter()
            .map(|hook| hook(args.clone()).into_future())
            .collect();
        try_join_all(pending).boxed()
    }
}

/// One stored hook combining several, keyed by strategy
struct CombinedHook {
    name: String,
    strategy: CallStrategy,
    hooks: Vec<ArcHook>,
}

impl Hook for CombinedHook {
    fn call(&self, args: HookArgs) -> HookOutput {
        match self.strategy {
            CallStrategy::Sync => {
                let mut last = Value::Null;
                for hook in &self.hooks {
                    match hook.call(args.clone()) {
                        HookOutput::Ready(Ok(value)) => last = value,
                        HookOutput::Ready(Err(err)) => return HookOutput::Ready(Err(err)),
                        HookOutput::Pending(_) => {
                            return HookOutput::err(HookError::AsyncHookInSyncCall(
                                self.name.clone(),
                            ));
                        }
                    }
                }
                HookOutput::value(last)
            }
            CallStrategy::Serial => {
                let hooks = self.hooks.clone();
                HookOutput::future(async move {
                    let mut last = Value::Null;
                    for hook in hooks {
                        last = hook.call(args.clone()).into_future().await?;
                    }
                    Ok(last)
                })
            }
            CallStrategy::Parallel => {
                let pending: Vec<_> = self
                    .hooks
                    .iter()
                    .map(|hook| hook.call(args.clone()).into_future())
                    .collect();
                HookOutput::future(async move {
                    let values = try_join_all(pending).await?;
                    Ok(Value::Array(values))
                })
            }
        }
    }
}

/// Combine several hooks registered under one name into a single hook
///
/// The parallel strategy yields its per-hook results as one `Value::Array`.
pub fn combine_hooks(
    name: impl Into<String>,
    strategy: CallStrategy,
    hooks: Vec<ArcHook>,
) -> ArcHook {
    Arc::new(CombinedHook {
        name: name.into(),
        strategy,
        hooks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn bound(hook: impl Fn(HookArgs) -> HookOutput + Send + 'static) -> BoundHook {
        Box::new(hook)
    }

    #[test]
    fn test_sync_caller_order_and_last_value() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks: Vec<BoundHook> = (1..=3)
            .map(|i| {
                let log = log.clone();
                bound(move |_args| {
                    log.lock().unwrap().push(i);
                    HookOutput::value(i)
                })
            })
            .collect();

        let result = SyncCaller.call("t", hooks, Arc::new(Vec::new())).unwrap();
        assert_eq!(result, json!(3));
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_sync_caller_empty_yields_null() {
        let result = SyncCaller.call("t", Vec::new(), Arc::new(Vec::new())).unwrap();
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn test_sync_caller_fails_fast() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c1 = calls.clone();
        let c2 = calls.clone();
        let hooks: Vec<BoundHook> = vec![
            bound(move |_args| {
                c1.fetch_add(1, Ordering::SeqCst);
                HookOutput::err(HookError::msg("first failed"))
            }),
            bound(move |_args| {
                c2.fetch_add(1, Ordering::SeqCst);
                HookOutput::unit()
            }),
        ];

        let err = SyncCaller
            .call("t", hooks, Arc::new(Vec::new()))
            .unwrap_err();
        assert_eq!(err.to_string(), "first failed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sync_caller_rejects_pending() {
        let hooks: Vec<BoundHook> =
            vec![bound(|_args| HookOutput::future(async { Ok(Value::Null) }))];
        let err = SyncCaller
            .call("save", hooks, Arc::new(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, HookError::AsyncHookInSyncCall(name) if name == "save"));
    }

    #[tokio::test]
    async fn test_serial_caller_gates_on_settle() {
        let first_done = Arc::new(AtomicUsize::new(0));
        let d1 = first_done.clone();
        let d2 = first_done.clone();
        let hooks: Vec<BoundHook> = vec![
            bound(move |_args| {
                let done = d1.clone();
                HookOutput::future(async move {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    done.store(1, Ordering::SeqCst);
                    Ok(json!("first"))
                })
            }),
            bound(move |_args| {
                // Second hook's synchronous portion must observe the first
                // hook's settle.
                assert_eq!(d2.load(Ordering::SeqCst), 1);
                HookOutput::value("second")
            }),
        ];

        let result = SerialCaller
            .call("t", hooks, Arc::new(Vec::new()))
            .await
            .unwrap();
        assert_eq!(result, json!("second"));
    }

    #[tokio::test]
    async fn test_serial_caller_rejection_aborts_rest() {
        let second_ran = Arc::new(AtomicUsize::new(0));
        let flag = second_ran.clone();
        let hooks: Vec<BoundHook> = vec![
            bound(|_args| HookOutput::future(async { Err(HookError::msg("bad")) })),
            bound(move |_args| {
                flag.store(1, Ordering::SeqCst);
                HookOutput::unit()
            }),
        ];

        let err = SerialCaller
            .call("t", hooks, Arc::new(Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "bad");
        assert_eq!(second_ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_parallel_caller_results_in_input_order() {
        let hooks: Vec<BoundHook> = vec![
            bound(|_args| {
                HookOutput::future(async {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok(json!("slow"))
                })
            }),
            bound(|_args| HookOutput::value("fast")),
        ];

        let results = ParallelCaller
            .call("t", hooks, Arc::new(Vec::new()))
            .await
            .unwrap();
        assert_eq!(results, vec![json!("slow"), json!("fast")]);
    }

    #[tokio::test]
    async fn test_parallel_caller_starts_all_before_awaiting() {
        let started = Arc::new(AtomicUsize::new(0));
        let hooks: Vec<BoundHook> = (0..3)
            .map(|_| {
                let started = started.clone();
                bound(move |_args| {
                    started.fetch_add(1, Ordering::SeqCst);
                    HookOutput::future(async { Ok(Value::Null) })
                })
            })
            .collect();

        let fut = ParallelCaller.call("t", hooks, Arc::new(Vec::new()));
        // Synchronous portions already ran, before any poll.
        assert_eq!(started.load(Ordering::SeqCst), 3);
        fut.await.unwrap();
    }

    #[tokio::test]
    async fn test_parallel_caller_rejects_with_failing_hook_error() {
        let hooks: Vec<BoundHook> = vec![
            bound(|_args| HookOutput::value(1)),
            bound(|_args| HookOutput::future(async { Err(HookError::msg("k failed")) })),
            bound(|_args| HookOutput::value(3)),
        ];

        let err = ParallelCaller
            .call("t", hooks, Arc::new(Vec::new()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "k failed");
    }

    #[test]
    fn test_finally_runs_on_sync_error() {
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        let result: Result<Value, HookError> = Err(HookError::msg("x"));
        let result = result.finally(move || {
            flag.fetch_add(1, Ordering::SeqCst);
        });
        assert!(result.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finally_runs_when_future_rejects() {
        let ran = Arc::new(AtomicUsize::new(0));
        let flag = ran.clone();
        let fut: BoxFuture<'static, Result<Value, HookError>> =
            async { Err(HookError::msg("x")) }.boxed();
        let result = fut
            .finally(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert!(result.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_combined_sync_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hooks: Vec<ArcHook> = (1..=2)
            .map(|i| {
                let log = log.clone();
                Arc::new(move |_args: HookArgs| {
                    log.lock().unwrap().push(i);
                    HookOutput::value(i)
                }) as ArcHook
            })
            .collect();

        let combined = combine_hooks("a", CallStrategy::Sync, hooks);
        match combined.call(Arc::new(Vec::new())) {
            HookOutput::Ready(Ok(value)) => assert_eq!(value, json!(2)),
            other => panic!("unexpected output: {other:?}"),
        }
        assert_eq!(*log.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_combined_parallel_folds_to_array() {
        let hooks: Vec<ArcHook> = vec![
            Arc::new(|_args: HookArgs| HookOutput::value(1)) as ArcHook,
            Arc::new(|_args: HookArgs| HookOutput::future(async { Ok(json!(2)) })) as ArcHook,
        ];
        let combined = combine_hooks("a", CallStrategy::Parallel, hooks);
        let value = combined.call(Arc::new(Vec::new())).into_future().await.unwrap();
        assert_eq!(value, json!([1, 2]));
    }
}
