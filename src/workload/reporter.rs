use crate::workload::counters::{CounterSnapshot, Counters};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Prints and resets the counters once per interval on its own thread until
/// stopped.
pub struct StatsReporter {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StatsReporter {
    pub fn start(counters: Arc<Counters>, interval: Duration) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("stats-reporter".to_owned())
            .spawn(move || {
                loop {
                    report(&counters);
                    match rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;
        Ok(StatsReporter { stop: Some(tx), handle: Some(handle) })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // dropping the sender wakes the reporter
        self.stop.take();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

impl Drop for StatsReporter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One reporter firing.
pub fn report(counters: &Counters) -> CounterSnapshot {
    let snapshot = counters.take();
    println!("{snapshot}");
    snapshot
}
