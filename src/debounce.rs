use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Trailing-edge debounce: each call cancels the pending one and schedules
/// its own work after `delay`. Only the last call inside a window runs.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Must be called from within a tokio runtime.
    pub fn call<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });

        if let Some(previous) = self.pending().replace(handle) {
            previous.abort();
        }
    }

    /// Drop the pending call, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending().take() {
            previous.abort();
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_once() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            debouncer.call(counting(&counter));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_only_after_quiet_period() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let counter = Arc::new(AtomicUsize::new(0));

        debouncer.call(counting(&counter));
        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_each_run() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        let counter = Arc::new(AtomicUsize::new(0));

        debouncer.call(counting(&counter));
        tokio::time::sleep(Duration::from_millis(500)).await;
        debouncer.call(counting(&counter));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_drop() {
        let counter = Arc::new(AtomicUsize::new(0));

        let debouncer = Debouncer::new(Duration::from_millis(300));
        debouncer.call(counting(&counter));
        debouncer.cancel();

        let dropped = Debouncer::new(Duration::from_millis(300));
        dropped.call(counting(&counter));
        drop(dropped);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
