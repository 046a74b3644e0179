use std::future::Future;
use std::time::Duration;

use cloudstorm_core::prelude::{CancelHandle, CancelledError};

/// Runs async scenario code from the synchronous worker threads.
///
/// Every worker pool has its own executor. Stopping the pool cancels whatever its executor is
/// running.
#[derive(Debug, Clone)]
pub struct Executor {
    runtime: tokio::runtime::Handle,
    cancel_handle: CancelHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Handle, cancel_handle: CancelHandle) -> Self {
        Self {
            runtime,
            cancel_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Note that the future will be cancelled if the worker pool is stopped, in which case a
    /// [CancelledError] is returned. Futures that do not yield can prevent a pool from stopping.
    ///
    /// Must not be called from inside an async context.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut cancel_listener = self.cancel_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = cancel_listener.cancelled() => {
                    Err(anyhow::anyhow!(CancelledError::default()))
                },
            }
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// The future is not cancelled when the pool stops, and nothing waits for it to complete.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }

    /// Sleep without holding up a pool that is being stopped.
    pub fn sleep(&self, duration: Duration) -> anyhow::Result<()> {
        self.execute_in_place(async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_handle.is_cancelled()
    }

    pub(crate) fn cancel(&self) {
        self.cancel_handle.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn executor() -> (tokio::runtime::Runtime, Executor) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let executor = Executor::new(runtime.handle().clone(), CancelHandle::new());
        (runtime, executor)
    }

    #[test]
    fn runs_futures_to_completion() {
        let (_runtime, executor) = executor();

        let value = executor.execute_in_place(async { Ok(21 * 2) }).unwrap();

        assert_eq!(42, value);
    }

    #[test]
    fn cancel_interrupts_a_sleep() {
        let (_runtime, executor) = executor();

        let canceller = executor.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            canceller.cancel();
        });

        let start = Instant::now();
        let err = executor.sleep(Duration::from_secs(30)).unwrap_err();
        handle.join().unwrap();

        assert!(err.is::<CancelledError>());
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(executor.is_cancelled());
    }
}
