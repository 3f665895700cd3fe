//! Hook error types

use thiserror::Error;

/// Errors produced while dispatching hooks
///
/// The registry never catches or rewraps a failing hook's error: whatever a
/// hook returns is what the dispatch caller receives. Hooks that need to
/// surface a domain-specific error should go through [`HookError::Other`]
/// so the caller can downcast back to the original type.
#[derive(Debug, Error)]
pub enum HookError {
    /// A hook returned a pending future while dispatched (or merged) under
    /// the sync call strategy
    #[error("hook '{0}' returned a future under the sync call strategy")]
    AsyncHookInSyncCall(String),

    /// Plain-message failure raised by a hook callback
    #[error("{0}")]
    Message(String),

    /// Arbitrary hook failure, preserved for caller-side downcasting
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HookError {
    /// Create a plain-message error
    pub fn msg(message: impl Into<String>) -> Self {
        HookError::Message(message.into())
    }
}

/// Result type alias for hook dispatch operations
pub type HookResult<T> = Result<T, HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn test_message_display() {
        let err = HookError::msg("save failed");
        assert_eq!(err.to_string(), "save failed");
    }

    #[test]
    fn test_other_preserves_identity() {
        let err = HookError::from(anyhow::Error::new(Boom));
        match err {
            HookError::Other(inner) => assert!(inner.downcast_ref::<Boom>().is_some()),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_async_hook_display_names_hook() {
        let err = HookError::AsyncHookInSyncCall("save".to_string());
        assert!(err.to_string().contains("save"));
    }
}
