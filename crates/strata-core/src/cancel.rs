//! Cooperative cancellation shared by the emitter and the quality loop.

use tokio::sync::watch;

/// Trips the paired [`CancelSignal`]s.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Observed between artifacts and raced against external processes.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

/// Create a connected handle and signal.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested; pends forever if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
