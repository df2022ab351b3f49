//! The availability sweep: probe every active subscription concurrently and
//! notify each user at most once per sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use derive_builder::Builder;
use log::debug;
use log::error;
use log::info;
use minijinja::context;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;
use tracing::info_span;
use uuid::Uuid;

use crate::entity::SubscriptionModel;
use crate::message::Messages;
use crate::notify::Notifier;
use crate::probe::Availability;
use crate::probe::Prober;
use crate::probe::error::ProbeError;
use crate::probe::probe_with_timeout;
use crate::repository::error::DatabaseError;
use crate::repository::tracking_store::TrackingStore;
use crate::task::sweep::DeliveryFailurePolicy;
use crate::task::sweep::NotifiedSet;
use crate::task::sweep::SubscriptionOutcome;
use crate::task::sweep::SweepOutcome;
use crate::task::sweep::SweepReport;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CheckerError {
    #[error("Failed to fetch active subscriptions: {0}")]
    Fetch(#[source] DatabaseError),
}

#[derive(Builder, Clone, Debug)]
#[builder(pattern = "immutable")]
pub struct CheckerOptions {
    /// Deadline for a single probe. An expired probe counts as a probe failure.
    #[builder(default = "Duration::from_secs(90)")]
    pub probe_timeout: Duration,
    /// Upper bound on probes in flight. `None` probes every subscription at once.
    #[builder(default)]
    pub max_concurrent_probes: Option<usize>,
    #[builder(default)]
    pub delivery_failure_policy: DeliveryFailurePolicy,
}

impl Default for CheckerOptions {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(90),
            max_concurrent_probes: None,
            delivery_failure_policy: DeliveryFailurePolicy::default(),
        }
    }
}

pub struct Checker {
    store: Arc<dyn TrackingStore>,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn Notifier>,
    messages: Arc<Messages>,
    options: CheckerOptions,
}

/// Shared by every task of one sweep and dropped with it.
struct SweepContext {
    store: Arc<dyn TrackingStore>,
    prober: Arc<dyn Prober>,
    notifier: Arc<dyn Notifier>,
    messages: Arc<Messages>,
    options: CheckerOptions,
    notified: NotifiedSet,
    probe_slots: Option<Semaphore>,
}

impl Checker {
    pub fn new(
        store: Arc<dyn TrackingStore>,
        prober: Arc<dyn Prober>,
        notifier: Arc<dyn Notifier>,
        options: CheckerOptions,
    ) -> Self {
        info!(
            "Initializing Checker with probe timeout {:?}, delivery failure policy {:?}",
            options.probe_timeout, options.delivery_failure_policy
        );
        Self {
            store,
            prober,
            notifier,
            messages: Arc::new(Messages::new()),
            options,
        }
    }

    pub fn options(&self) -> &CheckerOptions {
        &self.options
    }

    /// Runs one complete sweep over all active subscriptions.
    ///
    /// Only a failure to load the subscriptions is returned as an error.
    /// Everything that goes wrong for a single subscription ends up in the
    /// report instead.
    pub async fn run_sweep(&self) -> Result<SweepReport, CheckerError> {
        let sweep_id = Uuid::new_v4();
        let started_at = Utc::now();

        debug!("Sweep {sweep_id}: fetching active subscriptions.");
        let subscriptions = self
            .store
            .list_active_subscriptions()
            .await
            .map_err(CheckerError::Fetch)?;
        info!(
            "Sweep {sweep_id}: found {} active subscriptions to probe.",
            subscriptions.len()
        );

        let ctx = Arc::new(SweepContext {
            store: self.store.clone(),
            prober: self.prober.clone(),
            notifier: self.notifier.clone(),
            messages: self.messages.clone(),
            options: self.options.clone(),
            notified: NotifiedSet::new(),
            probe_slots: self
                .options
                .max_concurrent_probes
                .map(|n| Semaphore::new(n.max(1))),
        });

        // Prober and notifier logs from inside the tasks carry the sweep id
        let span = info_span!("sweep", id = %sweep_id);
        let mut tasks = JoinSet::new();
        for subscription in subscriptions {
            tasks.spawn(check_subscription(ctx.clone(), subscription).instrument(span.clone()));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Sweep {sweep_id}: subscription task did not finish: {e}"),
            }
        }

        let report = SweepReport {
            sweep_id,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        report.log();
        Ok(report)
    }
}

async fn check_subscription(
    ctx: Arc<SweepContext>,
    subscription: SubscriptionModel,
) -> SubscriptionOutcome {
    let outcome = ctx.check(&subscription).await;
    SubscriptionOutcome {
        subscription_id: subscription.id,
        user_id: subscription.user_id,
        code: subscription.code,
        outcome,
    }
}

impl SweepContext {
    async fn check(&self, subscription: &SubscriptionModel) -> SweepOutcome {
        let availability = match self.probe(&subscription.code).await {
            Ok(availability) => availability,
            Err(e) => return SweepOutcome::ProbeFailed(e),
        };
        if !availability.is_available() {
            return SweepOutcome::Unavailable;
        }
        let seats = availability.seats;

        let user_id = subscription.user_id;
        if !self.notified.claim(user_id) {
            return SweepOutcome::AlreadyNotified { seats };
        }

        let user = match self.store.get_user_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.notified.release(user_id);
                return SweepOutcome::LookupFailed(format!("user {user_id} not found"));
            }
            Err(e) => {
                self.notified.release(user_id);
                return SweepOutcome::LookupFailed(e.to_string());
            }
        };

        match self
            .deliver(&user.external_id, subscription, &availability)
            .await
        {
            Ok(()) => SweepOutcome::Notified { seats },
            Err(e) => {
                if self.options.delivery_failure_policy == DeliveryFailurePolicy::AllowRetry {
                    self.notified.release(user_id);
                }
                SweepOutcome::DeliveryFailed(e)
            }
        }
    }

    async fn probe(&self, code: &str) -> Result<Availability, ProbeError> {
        // Held until the probe returns; notification runs outside the limit
        let _permit = match &self.probe_slots {
            Some(slots) => slots.acquire().await.ok(),
            None => None,
        };
        probe_with_timeout(self.prober.as_ref(), code, self.options.probe_timeout).await
    }

    async fn deliver(
        &self,
        external_id: &str,
        subscription: &SubscriptionModel,
        availability: &Availability,
    ) -> Result<(), String> {
        let title = if subscription.title.is_empty() {
            &availability.title
        } else {
            &subscription.title
        };
        let text = self
            .messages
            .render(
                "seat_available",
                context! { code => &subscription.code, title => title, seats => availability.seats },
            )
            .map_err(|e| e.to_string())?;

        self.notifier
            .deliver(external_id, &text)
            .await
            .map_err(|e| e.to_string())
    }
}
