//! Cooperative shutdown signaling.
//!
//! Every long-running loop holds a [`StopSignal`] and checks it at
//! each suspension point: between blocks, between verifier ticks,
//! between mempool transactions. Dropping (or firing) the matching
//! [`StopHandle`] makes every clone of the signal report stopped, so
//! one handle fans out to any number of loops.

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Never-sent marker; the channel closing is the signal.
pub enum Never {}

/// The controlling end. Dropping it, or calling [`StopHandle::stop`],
/// signals every associated [`StopSignal`].
pub struct StopHandle {
    _tx: Sender<Never>,
}

impl StopHandle {
    /// Signal all receivers to stop.
    pub fn stop(self) {
        // Dropping the sender closes the channel.
    }
}

/// The observing end, cloned into each loop.
#[derive(Clone)]
pub struct StopSignal {
    rx: Receiver<Never>,
}

impl StopSignal {
    /// Returns `true` once the handle has been dropped or fired.
    pub fn is_stopped(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `timeout`, waking early on shutdown. Returns `true`
    /// if the loop should exit.
    pub fn sleep(&self, timeout: Duration) -> bool {
        match self.rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => true,
            Ok(never) => match never {},
        }
    }

    /// The underlying channel, for use in `select!` arms.
    pub fn receiver(&self) -> &Receiver<Never> {
        &self.rx
    }
}

/// Create a linked handle/signal pair.
pub fn channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = bounded(0);
    (StopHandle { _tx: tx }, StopSignal { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_fires_when_handle_drops() {
        quagga_test::init();

        let (handle, signal) = channel();
        let other = signal.clone();
        assert!(!signal.is_stopped());

        handle.stop();
        assert!(signal.is_stopped());
        assert!(other.is_stopped());
    }

    #[test]
    fn sleep_returns_early_on_stop() {
        quagga_test::init();

        let (handle, signal) = channel();
        let waiter = std::thread::spawn(move || signal.sleep(Duration::from_secs(30)));
        handle.stop();
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn sleep_times_out_while_running() {
        quagga_test::init();

        let (_handle, signal) = channel();
        assert!(!signal.sleep(Duration::from_millis(5)));
    }
}
