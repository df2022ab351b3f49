//! Subscription management for the command path.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use log::info;

use crate::entity::SubscriptionModel;
use crate::entity::UserModel;
use crate::probe::Availability;
use crate::probe::Prober;
use crate::probe::probe_with_timeout;
use crate::repository::tracking_store::TrackingStore;
use crate::service::error::ServiceError;

/// Title stored when the probe returns none.
pub const UNKNOWN_TITLE: &str = "Unknown Class";

pub struct SubscriptionService {
    store: Arc<dyn TrackingStore>,
    prober: Arc<dyn Prober>,
    probe_timeout: Duration,
}

impl SubscriptionService {
    pub fn new(
        store: Arc<dyn TrackingStore>,
        prober: Arc<dyn Prober>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            store,
            prober,
            probe_timeout,
        }
    }

    pub async fn get_or_create_user(
        &self,
        external_id: &str,
        username: Option<&str>,
    ) -> Result<UserModel, ServiceError> {
        Ok(self.store.get_or_create_user(external_id, username).await?)
    }

    /// Probes `code` once and starts tracking it for `user_id`.
    ///
    /// Nothing is written when the probe fails. Adding a code that is already
    /// tracked leaves the stored row untouched. A reactivated row gets the
    /// fresh title.
    ///
    /// # Performance
    /// * Probes: 1
    /// * DB calls: 1-2
    pub async fn add(&self, user_id: i32, code: &str) -> Result<AddResult, ServiceError> {
        let code = normalize_code(code)?;
        let availability = self.probe(code).await?;
        let title = if availability.title.is_empty() {
            UNKNOWN_TITLE
        } else {
            availability.title.as_str()
        };

        let (mut subscription, is_new) = self.store.add_subscription(user_id, code, title).await?;
        if !is_new {
            debug!("User {user_id} already tracks {code}.");
            return Ok(AddResult::AlreadyTracking { subscription });
        }

        if subscription.title != title {
            self.store.update_title(user_id, code, title).await?;
            subscription.title = title.to_string();
        }
        info!("User {user_id} is now tracking {code} ({title}).");
        Ok(AddResult::Added {
            subscription,
            availability,
        })
    }

    /// # Performance
    /// * DB calls: 1
    pub async fn remove(&self, user_id: i32, code: &str) -> Result<RemoveResult, ServiceError> {
        let code = normalize_code(code)?;
        if self.store.deactivate_subscription(user_id, code).await? {
            info!("User {user_id} stopped tracking {code}.");
            Ok(RemoveResult::Removed)
        } else {
            Ok(RemoveResult::NotTracking)
        }
    }

    /// Active subscriptions of `user_id`, ordered by code.
    pub async fn list(&self, user_id: i32) -> Result<Vec<SubscriptionModel>, ServiceError> {
        Ok(self.store.list_user_subscriptions(user_id).await?)
    }

    /// One immediate probe. Nothing is persisted.
    pub async fn check_now(&self, code: &str) -> Result<Availability, ServiceError> {
        let code = normalize_code(code)?;
        self.probe(code).await
    }

    async fn probe(&self, code: &str) -> Result<Availability, ServiceError> {
        Ok(probe_with_timeout(self.prober.as_ref(), code, self.probe_timeout).await?)
    }
}

fn normalize_code(code: &str) -> Result<&str, ServiceError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ServiceError::EmptyCode);
    }
    Ok(code)
}

#[derive(Debug)]
pub enum AddResult {
    /// A new row was created or an inactive one reactivated.
    Added {
        subscription: SubscriptionModel,
        availability: Availability,
    },
    AlreadyTracking { subscription: SubscriptionModel },
}

impl AddResult {
    pub fn is_new(&self) -> bool {
        matches!(self, AddResult::Added { .. })
    }

    pub fn subscription(&self) -> &SubscriptionModel {
        match self {
            AddResult::Added { subscription, .. } => subscription,
            AddResult::AlreadyTracking { subscription } => subscription,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RemoveResult {
    Removed,
    NotTracking,
}
