//! Cooperative cancellation for in-flight attempts.
//!
//! A [`CancelHandle`] belongs to one logical request. Every attempt arms a
//! fresh [`CancelSignal`], replacing the previous one, so cancelling only
//! ever reaches the attempt that is currently running.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

/// Cancels the current attempt of a logical request.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    current: Arc<Mutex<Option<watch::Sender<bool>>>>,
}

impl CancelHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Signals the in-flight attempt, if any. Best effort: the attempt may
    /// already have completed.
    pub fn cancel(&self) {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = current.as_ref() {
            let _ = sender.send(true);
        }
    }

    /// Replaces the previous attempt's signal with a fresh one.
    pub(crate) fn arm(&self) -> CancelSignal {
        let (tx, rx) = watch::channel(false);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        CancelSignal { notify: Some(rx) }
    }

    pub(crate) fn disarm(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Observes cancellation of a single attempt.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    notify: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires. Useful for driving a transport directly.
    pub fn never() -> Self {
        Self { notify: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.notify.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the attempt is cancelled. Pends forever when the
    /// owning handle is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        match self.notify.as_mut() {
            Some(rx) => {
                let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
                if closed {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{CancelHandle, CancelSignal};

    #[tokio::test]
    async fn cancel_reaches_armed_signal() {
        let handle = CancelHandle::new();
        let mut signal = handle.arm();
        assert!(!signal.is_cancelled());

        handle.cancel();
        assert!(signal.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .expect("signal must resolve after cancel");
    }

    #[tokio::test]
    async fn rearming_detaches_previous_attempt() {
        let handle = CancelHandle::new();
        let first = handle.arm();
        let second = handle.arm();

        handle.cancel();
        assert!(!first.is_cancelled());
        assert!(second.is_cancelled());
    }

    #[test]
    fn cancel_without_attempt_is_noop() {
        let handle = CancelHandle::new();
        handle.cancel();
        handle.disarm();
        assert!(!CancelSignal::never().is_cancelled());
    }
}
