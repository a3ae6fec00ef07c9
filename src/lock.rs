//! Per-device serialization of declarative submissions.
//!
//! FAST, AS3 and DO each process one declaration at a time on a device, so
//! every submission (and the task poll that follows it) runs while holding the
//! device's [`DeviceLock`]. Locks live in a [`LockRegistry`] owned by one
//! configured provider; nothing is process-global.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ProviderError;

/// A mutual-exclusion region for one device.
#[derive(Debug)]
pub struct DeviceLock {
    device: String,
    permit: Semaphore,
    timeout: Duration,
}

impl DeviceLock {
    /// Create a lock for `device`; waiting for it gives up after `timeout`.
    pub fn new(device: impl Into<String>, timeout: Duration) -> Self {
        Self {
            device: device.into(),
            permit: Semaphore::new(1),
            timeout,
        }
    }

    /// The device key this lock guards.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Run `work` while holding the lock.
    ///
    /// Fails with [`ProviderError::DeadlineExceeded`] when the lock is not
    /// acquired within the timeout, and with [`ProviderError::Cancelled`]
    /// when `cancel` fires first. The lock is released when `work` finishes,
    /// whatever its outcome.
    pub async fn run<F, T>(&self, cancel: &CancellationToken, work: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(ProviderError::Cancelled(format!(
                    "stopped while waiting for the {} lock",
                    self.device
                )));
            }
            acquired = tokio::time::timeout(self.timeout, self.permit.acquire()) => match acquired {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => {
                    return Err(ProviderError::Internal(format!(
                        "lock for {} was closed",
                        self.device
                    )));
                }
                Err(_) => {
                    return Err(ProviderError::DeadlineExceeded(format!(
                        "waited {:?} for the {} lock",
                        self.timeout, self.device
                    )));
                }
            },
        };

        debug!(device = %self.device, "device lock acquired");
        let result = work.await;
        drop(permit);
        debug!(device = %self.device, "device lock released");
        result
    }
}

/// The set of device locks owned by one provider instance.
#[derive(Debug)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<DeviceLock>>>,
    timeout: Duration,
}

impl LockRegistry {
    /// Create an empty registry whose locks time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Get the lock for a device, creating it on first use.
    pub async fn lock_for(&self, device: &str) -> Arc<DeviceLock> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(device.to_string())
                .or_insert_with(|| Arc::new(DeviceLock::new(device, self.timeout))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_run_serializes_work() {
        let lock = Arc::new(DeviceLock::new("https://10.0.0.1", Duration::from_secs(5)));
        let cancel = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let lock = Arc::clone(&lock);
            let cancel = cancel.clone();
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                lock.run(&cancel, async {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, ProviderError>(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let lock = Arc::new(DeviceLock::new("dev", Duration::from_secs(1)));
        let cancel = CancellationToken::new();

        let holder = {
            let lock = Arc::clone(&lock);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                lock.run(&cancel, async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, ProviderError>(())
                })
                .await
            })
        };
        tokio::task::yield_now().await;

        let err = lock
            .run(&cancel, async { Ok::<_, ProviderError>(()) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));

        holder.abort();
    }

    #[tokio::test]
    async fn test_cancelled_before_acquire() {
        let lock = DeviceLock::new("dev", Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = lock
            .run(&cancel, async { Ok::<_, ProviderError>(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_lock_released_after_error() {
        let lock = DeviceLock::new("dev", Duration::from_secs(1));
        let cancel = CancellationToken::new();

        let err = lock
            .run(&cancel, async {
                Err::<(), _>(ProviderError::api(500, "boom"))
            })
            .await;
        tokio_test::assert_err!(err);

        let ok = lock.run(&cancel, async { Ok::<_, ProviderError>(7) }).await;
        assert_eq!(tokio_test::assert_ok!(ok), 7);
    }

    #[tokio::test]
    async fn test_registry_reuses_locks_per_device() {
        let registry = LockRegistry::new(Duration::from_secs(1));
        let a = registry.lock_for("https://a").await;
        let a_again = registry.lock_for("https://a").await;
        let b = registry.lock_for("https://b").await;

        assert!(Arc::ptr_eq(&a, &a_again));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.device(), "https://b");
    }

    #[tokio::test]
    async fn test_registries_are_independent() {
        let first = LockRegistry::new(Duration::from_secs(1));
        let second = LockRegistry::new(Duration::from_secs(1));
        let a = first.lock_for("https://a").await;
        let b = second.lock_for("https://a").await;
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
