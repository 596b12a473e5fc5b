//! Background thread running refresh cycles on a timer or on demand.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{RefreshReport, Refresher};
use crate::Result;

enum Command {
    Refresh,
    Shutdown,
}

/// Shared between the scheduler handle and its thread.
#[derive(Default)]
struct Progress {
    cycles: AtomicU64,
    last_report: Mutex<Option<RefreshReport>>,
}

/// Scheduler runs [`Refresher::refresh_all`] every `interval` on a dedicated
/// thread, and immediately whenever [`trigger`](Self::trigger) is called.
///
/// The thread is stopped and joined on [`shutdown`](Self::shutdown) or drop.
pub struct Scheduler {
    sender: Sender<Command>,
    handle: Mutex<Option<JoinHandle<()>>>,
    progress: Arc<Progress>,
}

impl Scheduler {
    /// Spawn the refresh thread. The first cycle runs after `interval`.
    pub fn spawn(
        refresher: Arc<Refresher>,
        countries: Vec<String>,
        block_anonymizers: bool,
        interval: Duration,
    ) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let progress = Arc::new(Progress::default());
        let thread_progress = Arc::clone(&progress);

        let handle = thread::Builder::new()
            .name("zone-refresh".to_string())
            .spawn(move || {
                log::info!("Periodic refresh every {:?}", interval);
                loop {
                    match receiver.recv_timeout(interval) {
                        Ok(Command::Refresh) | Err(RecvTimeoutError::Timeout) => {
                            let report = refresher.refresh_all(&countries, block_anonymizers);
                            *thread_progress.last_report.lock() = Some(report);
                            thread_progress.cycles.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::info!("Periodic refresh stopped");
            })?;

        Ok(Self {
            sender,
            handle: Mutex::new(Some(handle)),
            progress,
        })
    }

    /// Request an immediate refresh cycle.
    ///
    /// Returns `false` if the scheduler has already shut down.
    pub fn trigger(&self) -> bool {
        self.sender.send(Command::Refresh).is_ok()
    }

    /// Number of completed refresh cycles.
    pub fn cycles(&self) -> u64 {
        self.progress.cycles.load(Ordering::SeqCst)
    }

    /// Report of the most recent cycle.
    pub fn last_report(&self) -> Option<RefreshReport> {
        self.progress.last_report.lock().clone()
    }

    /// Stop the thread and wait for an in-flight cycle to finish.
    pub fn shutdown(&self) {
        let _ = self.sender.send(Command::Shutdown);
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                log::error!("Refresh thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
