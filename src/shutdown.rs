//! Run-wide cancellation signal.
//!
//! Cancellation is sticky: once the sender flips the value to `true`, every
//! receiver observes it, including receivers cloned after the fact.
use tokio::sync::watch;

pub type ShutdownSender = watch::Sender<bool>;
pub type ShutdownReceiver = watch::Receiver<bool>;

#[must_use]
pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    watch::channel(false)
}

#[must_use]
pub fn is_shutdown(receiver: &ShutdownReceiver) -> bool {
    *receiver.borrow()
}

/// Resolves once cancellation has been requested.
///
/// A dropped sender never cancels; the future stays pending instead.
pub async fn wait_for_shutdown(receiver: &mut ShutdownReceiver) {
    if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Requests cancellation. Returns `false` when every receiver is gone.
pub fn request_shutdown(sender: &ShutdownSender) -> bool {
    sender.send(true).is_ok()
}
