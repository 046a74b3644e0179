use std::sync::Arc;

use tokio::sync::watch;

/// Cancels a group of workers, along with any async work they are running.
///
/// Cancellation is sticky. A listener created after [CancelHandle::cancel] has been called sees
/// the cancelled state straight away, so late workers cannot miss the signal.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        if !self.sender.send_replace(true) {
            log::trace!("Cancellation requested");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn new_listener(&self) -> CancelListener {
        CancelListener {
            receiver: self.sender.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CancelListener {
    receiver: watch::Receiver<bool>,
}

impl CancelListener {
    /// Point in time check. Workers call this between iterations to decide whether to stop.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the handle has been cancelled. Safe to race against other futures so that
    /// cancellation can abort work in progress.
    pub async fn cancelled(&mut self) {
        let closed = self.receiver.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            // Every handle was dropped without cancelling, so this can never resolve.
            std::future::pending::<()>().await;
        }
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct CancelledError {
    msg: String,
}

impl Default for CancelledError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled because the worker pool was stopped".to_string(),
        }
    }
}
