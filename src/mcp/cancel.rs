//! Session cancellation.
//!
//! A [`CancellationHandle`] raises the signal once; every cloned
//! [`CancellationSignal`] observes it. The serving loop checks the signal
//! before each read and never interrupts a handler that is already running.

use std::sync::Arc;

use tokio::sync::watch;

/// Creates a connected handle/signal pair.
#[must_use]
pub fn cancellation() -> (CancellationHandle, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancellationHandle { tx: Arc::new(tx) },
        CancellationSignal { rx },
    )
}

/// The raising side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    /// Raises the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns a new signal observing this handle.
    #[must_use]
    pub fn signal(&self) -> CancellationSignal {
        CancellationSignal {
            rx: self.tx.subscribe(),
        }
    }
}

/// The observing side of a cancellation pair.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// Returns a signal that is never raised.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Returns `true` once the signal has been raised.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes when the signal is raised.
    ///
    /// Pends forever if the handle was dropped without cancelling.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_clear() {
        let (_handle, signal) = cancellation();
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn cancel_is_seen_by_clones() {
        let (handle, signal) = cancellation();
        let clone = signal.clone();
        let late = handle.signal();
        handle.cancel();
        handle.cancel();
        assert!(signal.is_cancelled());
        assert!(clone.is_cancelled());
        assert!(late.is_cancelled());
    }

    #[test]
    fn never_is_never_cancelled() {
        assert!(!CancellationSignal::never().is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_completes_after_cancel() {
        let (handle, mut signal) = cancellation();
        let waiter = tokio::spawn(async move { signal.cancelled().await });
        handle.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("cancelled() did not complete")
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_handle_pends() {
        let mut signal = CancellationSignal::never();
        let result =
            tokio::time::timeout(std::time::Duration::from_millis(20), signal.cancelled()).await;
        assert!(result.is_err());
    }
}
