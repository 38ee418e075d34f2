//! Interception point run right before a message is handed to transport.
//!
//! Hooks run once every declarative call on the [`Delivery`] is done,
//! and may inspect the message class, the message overrides and the
//! composed message, mutating the latter in place. Concrete
//! implementations live in the [`hooks`](crate::hooks) module.

use thiserror::Error;
use tracing::debug;

use crate::{Delivery, SmtpApiError};

/// Result type for hook operations.
pub type HookResult<T> = Result<T, HookError>;

/// Errors that abort the send pipeline.
#[derive(Debug, Error)]
pub enum HookError {
    /// The `X-SMTPAPI` header could not be built.
    #[error(transparent)]
    SmtpApi(#[from] SmtpApiError),

    /// A custom hook refused the message.
    #[error("Hook {hook} failed: {reason}")]
    Rejected { hook: String, reason: String },
}

/// Trait for hooks invoked synchronously before a message is sent.
pub trait SendHook: Send + Sync {
    /// Inspects or modifies the delivery, an error stops the pipeline and
    /// the message must not be sent.
    fn before_send(&self, delivery: &mut Delivery) -> HookResult<()>;

    /// Returns the name of this hook.
    fn name(&self) -> &str;
}

/// Runs `hooks` in order, stopping at the first failure.
pub fn apply_hooks(hooks: &[Box<dyn SendHook>], delivery: &mut Delivery) -> HookResult<()> {
    for hook in hooks {
        debug!(
            hook = hook.name(),
            message_id = %delivery.message().message_id,
            "Applying send hook"
        );
        hook.before_send(delivery)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::{EmailMessage, MailerClass};

    struct CountingHook {
        count: AtomicUsize,
        fail: bool,
    }

    impl CountingHook {
        fn new(fail: bool) -> Self {
            Self {
                count: AtomicUsize::new(0),
                fail,
            }
        }
    }

    impl SendHook for Arc<CountingHook> {
        fn before_send(&self, delivery: &mut Delivery) -> HookResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HookError::Rejected {
                    hook: self.name().to_string(),
                    reason: "nope".to_string(),
                });
            }
            delivery.message_mut().set_header("X-Counted", "yes");
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn delivery() -> Delivery {
        Delivery::new(
            Arc::new(MailerClass::new("test")),
            EmailMessage::compose("a@x.com", "b@x.com", "Subject", "Body"),
        )
    }

    #[test]
    fn test_apply_hooks_in_order() {
        let first = Arc::new(CountingHook::new(false));
        let second = Arc::new(CountingHook::new(false));
        let hooks: Vec<Box<dyn SendHook>> =
            vec![Box::new(first.clone()), Box::new(second.clone())];

        let mut delivery = delivery();
        apply_hooks(&hooks, &mut delivery).unwrap();

        assert_eq!(first.count.load(Ordering::SeqCst), 1);
        assert_eq!(second.count.load(Ordering::SeqCst), 1);
        assert_eq!(delivery.message().header("X-Counted"), Some("yes"));
    }

    #[test]
    fn test_apply_hooks_stops_on_failure() {
        let failing = Arc::new(CountingHook::new(true));
        let after = Arc::new(CountingHook::new(false));
        let hooks: Vec<Box<dyn SendHook>> =
            vec![Box::new(failing.clone()), Box::new(after.clone())];

        let mut delivery = delivery();
        let result = apply_hooks(&hooks, &mut delivery);

        assert!(matches!(result, Err(HookError::Rejected { .. })));
        assert_eq!(after.count.load(Ordering::SeqCst), 0);
        assert!(delivery.message().header("X-Counted").is_none());
    }

    #[test]
    fn test_hook_error_display() {
        let error = HookError::Rejected {
            hook: "counting".to_string(),
            reason: "nope".to_string(),
        };
        assert_eq!(error.to_string(), "Hook counting failed: nope");
    }
}
