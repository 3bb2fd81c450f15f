use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background pacing for replay playback. The thread only signals; the
/// owner drains ticks and steps on its own thread.
pub(crate) struct ReplayTicker {
    stop_tx: Option<mpsc::Sender<()>>,
    tick_rx: mpsc::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl ReplayTicker {
    pub(crate) fn start(interval: Duration) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (tick_tx, tick_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(_) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    Err(mpsc::RecvTimeoutError::Timeout) => {
                        if tick_tx.send(()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self {
            stop_tx: Some(stop_tx),
            tick_rx,
            handle: Some(handle),
        }
    }

    /// Ticks delivered since the last drain, without blocking.
    pub(crate) fn drain(&self) -> usize {
        self.tick_rx.try_iter().count()
    }

    /// Block until one tick arrives or `timeout` passes.
    pub(crate) fn wait(&self, timeout: Duration) -> bool {
        self.tick_rx.recv_timeout(timeout).is_ok()
    }

    pub(crate) fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReplayTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
