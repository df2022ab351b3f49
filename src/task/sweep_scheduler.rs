//! Background task that runs availability sweeps back to back.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::debug;
use log::error;
use log::info;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::task::checker::Checker;

/// Runs a sweep, waits `interval` after it finishes, and repeats.
///
/// At most one loop exists at a time. The loop clears `handle` under the lock
/// before it exits, so `start` either revives the live loop or spawns a new one.
pub struct SweepScheduler {
    checker: Arc<Checker>,
    interval: Duration,
    running: AtomicBool,
    wake: Notify,
    completed: AtomicU64,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SweepScheduler {
    pub fn new(checker: Arc<Checker>, interval: Duration) -> Arc<Self> {
        info!("Initializing SweepScheduler with interval {:?}", interval);
        Arc::new(Self {
            checker,
            interval,
            running: AtomicBool::new(false),
            wake: Notify::new(),
            completed: AtomicU64::new(0),
            handle: Mutex::new(None),
        })
    }

    /// Starts the sweep loop. The first sweep begins immediately.
    ///
    /// If a loop told to stop is still finishing its sweep, that loop keeps
    /// running instead of a second one being spawned.
    pub fn start(self: Arc<Self>) -> anyhow::Result<()> {
        let mut handle = self.loop_handle();
        self.running.store(true, Ordering::SeqCst);
        if handle.is_some() {
            debug!("SweepScheduler loop already alive.");
            return Ok(());
        }
        info!("Starting SweepScheduler loop.");
        *handle = Some(self.clone().spawn_sweep_loop());
        Ok(())
    }

    /// Stops the loop after the sweep in progress, if any, has finished.
    pub fn stop(self: Arc<Self>) -> anyhow::Result<()> {
        info!("Stopping SweepScheduler loop.");
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of sweep attempts finished since start, failed ones included.
    pub fn completed_sweeps(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    fn loop_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears the handle and returns true when the loop should exit.
    fn release_if_stopped(&self) -> bool {
        let mut handle = self.loop_handle();
        if self.running.load(Ordering::SeqCst) {
            return false;
        }
        handle.take();
        true
    }

    fn spawn_sweep_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if self.release_if_stopped() {
                    info!("Stopping sweep loop.");
                    break;
                }

                match self.checker.run_sweep().await {
                    Ok(report) => debug!("Sweep {} done.", report.sweep_id),
                    Err(e) => error!("Error running sweep: {e}"),
                }
                self.completed.fetch_add(1, Ordering::SeqCst);

                tokio::select! {
                    _ = sleep(self.interval) => {}
                    _ = self.wake.notified() => {}
                }
            }
        })
    }
}
