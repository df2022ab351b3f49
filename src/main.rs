//! Application entry point for seat-watch.
//!
//! Initializes all components, starts the sweep and chat loops, and waits for Ctrl+C.

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use anyhow::Result;
use dotenv::dotenv;
use log::debug;
use log::info;
use seat_watch::bot::processor::CommandProcessor;
use seat_watch::config::Config;
use seat_watch::logging::setup_logging;
use seat_watch::notify::telegram::TelegramClient;
use seat_watch::probe::banner_prober::BannerProber;
use seat_watch::repository::Repository;
use seat_watch::service::Services;
use seat_watch::task::checker::Checker;
use seat_watch::task::checker::CheckerOptionsBuilder;
use seat_watch::task::sweep_scheduler::SweepScheduler;
use seat_watch::task::update_poller::UpdatePoller;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let init_start = Instant::now();
    let config = load_config()?;

    let db = setup_database(&config, init_start).await?;
    let prober = Arc::new(BannerProber::new(
        &config.registration_url,
        &config.registration_term,
        config.probes_per_minute,
    )?);
    let telegram = Arc::new(TelegramClient::new(
        &config.telegram_api_url,
        &config.bot_token,
    )?);
    let services = Services::new(db.clone(), prober.clone(), config.probe_timeout);

    let scheduler = setup_scheduler(&config, db.clone(), prober, telegram.clone())?;
    let poller = setup_poller(telegram, &services)?;

    run(init_start).await?;

    scheduler.stop()?;
    poller.stop()?;
    db.close().await;
    Ok(())
}

fn load_config() -> Result<Arc<Config>> {
    debug!("Loading configuration...");
    let mut config = Config::new();
    config.load()?;
    let config = Arc::new(config);
    setup_logging(&config)?;
    info!("Starting seat-watch...");
    Ok(config)
}

async fn setup_database(config: &Config, init_start: Instant) -> Result<Arc<Repository>> {
    debug!("Setting up Repository...");
    let db = Arc::new(Repository::new(&config.db_url, &config.db_path).await?);

    info!("Creating tables...");
    db.create_tables().await?;
    info!(
        "Database setup complete ({:.2}s).",
        init_start.elapsed().as_secs_f64()
    );

    Ok(db)
}

fn setup_scheduler(
    config: &Config,
    db: Arc<Repository>,
    prober: Arc<BannerProber>,
    telegram: Arc<TelegramClient>,
) -> Result<Arc<SweepScheduler>> {
    debug!("Setting up SweepScheduler...");
    let options = CheckerOptionsBuilder::default()
        .probe_timeout(config.probe_timeout)
        .max_concurrent_probes(config.max_concurrent_probes)
        .delivery_failure_policy(config.delivery_failure_policy)
        .build()?;
    let checker = Arc::new(Checker::new(db, prober, telegram, options));

    let scheduler = SweepScheduler::new(checker, config.sweep_interval);
    scheduler.clone().start()?;
    Ok(scheduler)
}

fn setup_poller(telegram: Arc<TelegramClient>, services: &Services) -> Result<Arc<UpdatePoller>> {
    debug!("Setting up UpdatePoller...");
    let processor = CommandProcessor::new(services.subscription.clone(), telegram.clone());

    let poller = UpdatePoller::new(telegram, processor, Duration::from_secs(1));
    poller.clone().start()?;
    Ok(poller)
}

async fn run(init_start: Instant) -> Result<()> {
    info!(
        "seat-watch is up in {:.2}s. Press Ctrl+C to stop.",
        init_start.elapsed().as_secs_f64()
    );

    tokio::signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down.");

    Ok(())
}
