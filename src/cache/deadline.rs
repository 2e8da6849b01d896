//! Request deadlines and their scoped release
//!
//! Every request builder holds a [`DeadlineScope`]. A scope that created its
//! own deadline cancels it when dropped, which happens exactly once on every
//! exit path of the terminal call. Caller-supplied deadlines are only
//! borrowed and stay usable after the request completes.

use super::errors::{CacheError, CacheResult};
use crate::constants::DEFAULT_OPERATION_TIMEOUT;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct CancelSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Absolute deadline plus a cancellation signal shared by its clones
#[derive(Debug, Clone)]
pub struct Deadline {
    at: Instant,
    signal: Arc<CancelSignal>,
}

impl Deadline {
    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    pub fn at(at: Instant) -> Self {
        Self {
            at,
            signal: Arc::new(CancelSignal::default()),
        }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left before expiry, zero once elapsed
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    /// Cancel this deadline and every clone of it; idempotent
    pub fn cancel(&self) {
        if !self.signal.cancelled.swap(true, Ordering::AcqRel) {
            self.signal.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }

    /// Run one backend round-trip bounded by this deadline
    pub(crate) async fn run<T, F>(
        &self,
        operation: &'static str,
        key: &str,
        fut: F,
    ) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        let notified = self.signal.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_cancelled() {
            return Err(CacheError::Cancelled {
                operation,
                key: key.to_string(),
            });
        }
        if Instant::now() >= self.at {
            return Err(CacheError::Timeout {
                operation,
                key: key.to_string(),
            });
        }

        tokio::select! {
            _ = &mut notified => Err(CacheError::Cancelled {
                operation,
                key: key.to_string(),
            }),
            result = tokio::time::timeout_at(self.at, fut) => match result {
                Ok(inner) => inner,
                Err(_) => Err(CacheError::Timeout {
                    operation,
                    key: key.to_string(),
                }),
            },
        }
    }
}

/// Scoped ownership of a request deadline
#[derive(Debug)]
pub struct DeadlineScope {
    deadline: Deadline,
    owned: bool,
}

impl DeadlineScope {
    /// Borrow `external`, or create a default deadline owned by the scope
    pub fn acquire(external: Option<Deadline>) -> Self {
        match external {
            Some(deadline) => Self {
                deadline,
                owned: false,
            },
            None => Self {
                deadline: Deadline::after(DEFAULT_OPERATION_TIMEOUT),
                owned: true,
            },
        }
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    /// Whether dropping this scope cancels the deadline
    pub fn owns_deadline(&self) -> bool {
        self.owned
    }
}

impl Drop for DeadlineScope {
    fn drop(&mut self) {
        if self.owned {
            self.deadline.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scope_owns_and_releases_on_drop() {
        let scope = DeadlineScope::acquire(None);
        assert!(scope.owns_deadline());
        let observer = scope.deadline().clone();
        assert!(!observer.is_cancelled());
        assert!(observer.remaining() <= DEFAULT_OPERATION_TIMEOUT);

        drop(scope);
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_external_deadline_is_not_cancelled_by_scope() {
        let external = Deadline::after(Duration::from_secs(5));
        let scope = DeadlineScope::acquire(Some(external.clone()));
        assert!(!scope.owns_deadline());

        drop(scope);
        assert!(!external.is_cancelled());
    }

    #[test]
    fn test_scope_releases_on_unwind() {
        let scope = DeadlineScope::acquire(None);
        let observer = scope.deadline().clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _scope = scope;
            panic!("boom");
        }));

        assert!(result.is_err());
        assert!(observer.is_cancelled());
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let deadline = Deadline::after(Duration::from_millis(10));
        let result: CacheResult<()> = deadline
            .run("get", "ns:k", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CacheError::Timeout { operation: "get", .. })));
    }

    #[tokio::test]
    async fn test_run_observes_cancellation() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let canceller = deadline.clone();

        let handle = tokio::spawn(async move {
            deadline
                .run("set", "ns:k", async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(CacheError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_run_after_cancel_fails_fast() {
        let deadline = Deadline::after(Duration::from_secs(5));
        deadline.cancel();
        let result = deadline.run("del", "ns:k", async { Ok(1i64) }).await;
        assert!(matches!(result, Err(CacheError::Cancelled { .. })));
    }

    #[tokio::test]
    async fn test_run_after_expiry_fails_fast() {
        let deadline = Deadline::at(Instant::now());
        let result = deadline.run("get", "ns:k", async { Ok(1u8) }).await;
        assert!(matches!(result, Err(CacheError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let deadline = Deadline::after(Duration::from_secs(1));
        let value = deadline.run("get", "ns:k", async { Ok(7u8) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
