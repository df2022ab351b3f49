//! Background task that pulls chat updates and hands them to the processor.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use log::debug;
use log::error;
use log::info;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::bot::processor::CommandProcessor;
use crate::notify::telegram::TelegramClient;

const UPDATES_PER_POLL: u32 = 100;
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct UpdatePoller {
    client: Arc<TelegramClient>,
    processor: Arc<CommandProcessor>,
    poll_delay: Duration,
    offset: AtomicI64,
    running: AtomicBool,
    wake: Notify,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl UpdatePoller {
    pub fn new(
        client: Arc<TelegramClient>,
        processor: Arc<CommandProcessor>,
        poll_delay: Duration,
    ) -> Arc<Self> {
        info!("Initializing UpdatePoller with poll delay {:?}", poll_delay);
        Arc::new(Self {
            client,
            processor,
            poll_delay,
            offset: AtomicI64::new(0),
            running: AtomicBool::new(false),
            wake: Notify::new(),
            handle: Mutex::new(None),
        })
    }

    pub fn start(self: Arc<Self>) -> anyhow::Result<()> {
        let mut handle = self.loop_handle();
        self.running.store(true, Ordering::SeqCst);
        if handle.is_none() {
            info!("Starting UpdatePoller loop.");
            *handle = Some(self.clone().spawn_poll_loop());
        }
        Ok(())
    }

    pub fn stop(self: Arc<Self>) -> anyhow::Result<()> {
        info!("Stopping UpdatePoller loop.");
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_one();
        Ok(())
    }

    /// Next update id to request.
    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// Fetches one batch and dispatches every update in it. Returns the
    /// number of updates received.
    pub async fn poll_once(&self) -> anyhow::Result<usize> {
        let updates = self
            .client
            .get_updates(self.offset(), UPDATES_PER_POLL, LONG_POLL_TIMEOUT)
            .await?;
        let count = updates.len();
        if count > 0 {
            debug!("Received {count} updates.");
        }

        for update in updates {
            self.offset.fetch_max(update.update_id + 1, Ordering::SeqCst);
            self.processor.clone().dispatch(update).await;
        }
        Ok(count)
    }

    fn loop_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release_if_stopped(&self) -> bool {
        let mut handle = self.loop_handle();
        if self.running.load(Ordering::SeqCst) {
            return false;
        }
        handle.take();
        true
    }

    fn spawn_poll_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if self.release_if_stopped() {
                    info!("Stopping poll loop.");
                    break;
                }
                if let Err(e) = self.poll_once().await {
                    error!("Error polling updates: {e}");
                }
                tokio::select! {
                    _ = sleep(self.poll_delay) => {}
                    _ = self.wake.notified() => {}
                }
            }
        })
    }
}
