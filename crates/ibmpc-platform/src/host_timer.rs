use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{ChipsetError, Result};

/// Periodic host timer notifications, produced on a helper thread and consumed by the thread
/// that owns the chipset.
///
/// Notifications that arrive while the owner is busy are queued, never lost.
pub struct HostTicker {
    rx: Receiver<()>,
    queued: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HostTicker {
    pub fn spawn(interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(ChipsetError::HostTimer(
                "tick interval must be non-zero".into(),
            ));
        }

        let (tx, rx) = mpsc::channel();
        let queued = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));

        let handle = {
            let queued = queued.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name("ibmpc-host-timer".into())
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        thread::sleep(interval);
                        queued.fetch_add(1, Ordering::AcqRel);
                        if tx.send(()).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|err| ChipsetError::HostTimer(err.to_string()))?
        };
        tracing::debug!(?interval, "host timer started");

        Ok(Self {
            rx,
            queued,
            stop,
            handle: Some(handle),
        })
    }

    /// Whether a notification is queued and not yet consumed.
    pub fn is_pending(&self) -> bool {
        self.queued.load(Ordering::Acquire) > 0
    }

    /// Blocks until the next notification, or until `timeout` passes. Returns `false` on
    /// timeout.
    pub fn wait(&self, timeout: Duration) -> Result<bool> {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => {
                self.queued.fetch_sub(1, Ordering::AcqRel);
                Ok(true)
            }
            Err(RecvTimeoutError::Timeout) => Ok(false),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ChipsetError::HostTimer("timer thread exited".into()))
            }
        }
    }

    /// Consumes every queued notification and returns how many there were.
    pub fn drain(&self) -> usize {
        let drained = self.rx.try_iter().count();
        self.queued.fetch_sub(drained, Ordering::AcqRel);
        drained
    }
}

impl Drop for HostTicker {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_is_rejected() {
        let err = HostTicker::spawn(Duration::ZERO).err().unwrap();
        assert!(matches!(err, ChipsetError::HostTimer(_)), "{err}");
    }

    #[test]
    fn notifications_queue_until_consumed() {
        let ticker = HostTicker::spawn(Duration::from_millis(1)).unwrap();
        assert!(ticker.wait(Duration::from_secs(5)).unwrap());

        thread::sleep(Duration::from_millis(20));
        assert!(ticker.is_pending());
        assert!(ticker.drain() > 0);
    }
}
