//! Business logic behind the bot commands.

use std::sync::Arc;
use std::time::Duration;

use crate::probe::Prober;
use crate::repository::tracking_store::TrackingStore;
use crate::service::subscription_service::SubscriptionService;

pub mod error;
pub mod subscription_service;

/// Container for all application services.
pub struct Services {
    pub subscription: Arc<SubscriptionService>,
}

impl Services {
    pub fn new(
        store: Arc<dyn TrackingStore>,
        prober: Arc<dyn Prober>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            subscription: Arc::new(SubscriptionService::new(store, prober, probe_timeout)),
        }
    }
}
