use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// Single-flight guard: at most one body runs at a time.
///
/// Callers that arrive while a body is running are rejected immediately.
/// There is no queue and nobody is notified when the running body finishes.
#[derive(Debug, Default)]
pub struct ConcurrencyGuard {
    running: AtomicBool,
}

impl ConcurrencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs `body` if nothing else is running, returning its output.
    ///
    /// Returns `None` without calling `body` when another run holds the
    /// guard. The guard is released when the run ends, whether `body`
    /// completes, panics, or the returned future is dropped.
    pub async fn try_run<F, Fut, T>(&self, body: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _token = self.acquire()?;
        Some(body().await)
    }

    fn acquire(&self) -> Option<RunToken<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunToken {
                running: &self.running,
            })
    }
}

struct RunToken<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunToken<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
