//! Per-sweep state and results.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use chrono::DateTime;
use chrono::Utc;
use log::debug;
use log::error;
use log::info;
use log::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::probe::error::ProbeError;

/// What happens to a user's claim when delivering their notification fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeliveryFailurePolicy {
    /// The user stays marked as notified for the rest of the sweep. A failed
    /// delivery is not retried before the next sweep.
    #[default]
    MarkNotified,
    /// The claim is released so another available subscription of the same
    /// user may attempt delivery within the same sweep.
    AllowRetry,
}

impl FromStr for DeliveryFailurePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mark_notified" => Ok(Self::MarkNotified),
            "allow_retry" => Ok(Self::AllowRetry),
            other => Err(AppError::InvalidConfig {
                key: "DELIVERY_FAILURE_POLICY".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Users already claimed for a notification in the current sweep.
///
/// Lives for exactly one sweep. The lock is never held across an `.await`.
#[derive(Default, Debug)]
pub struct NotifiedSet {
    users: Mutex<HashSet<i32>>,
}

impl NotifiedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks and inserts `user_id` in one critical section. Returns `true`
    /// when the caller won the claim and must notify the user.
    pub fn claim(&self, user_id: i32) -> bool {
        self.lock().insert(user_id)
    }

    /// Gives a claim back so a sibling task may notify the user.
    pub fn release(&self, user_id: i32) {
        self.lock().remove(&user_id);
    }

    pub fn contains(&self, user_id: i32) -> bool {
        self.lock().contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<i32>> {
        // A set of ids can't be left half-updated, so a poisoned lock is still usable
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Result of checking one subscription during a sweep.
#[derive(Debug)]
pub enum SweepOutcome {
    /// Probe succeeded with no free seats.
    Unavailable,
    /// Seats were free and this task delivered the user's notification.
    Notified { seats: u32 },
    /// Seats were free but the user was already claimed this sweep.
    AlreadyNotified { seats: u32 },
    ProbeFailed(ProbeError),
    LookupFailed(String),
    DeliveryFailed(String),
}

#[derive(Debug)]
pub struct SubscriptionOutcome {
    pub subscription_id: i32,
    pub user_id: i32,
    pub code: String,
    pub outcome: SweepOutcome,
}

/// Everything one sweep did, collected after the barrier.
#[derive(Debug)]
pub struct SweepReport {
    pub sweep_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<SubscriptionOutcome>,
}

impl SweepReport {
    pub fn probed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn notified(&self) -> usize {
        self.count(|o| matches!(o, SweepOutcome::Notified { .. }))
    }

    pub fn deduplicated(&self) -> usize {
        self.count(|o| matches!(o, SweepOutcome::AlreadyNotified { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                SweepOutcome::ProbeFailed(_)
                    | SweepOutcome::LookupFailed(_)
                    | SweepOutcome::DeliveryFailed(_)
            )
        })
    }

    /// Users whose notification was delivered in this sweep.
    pub fn notified_users(&self) -> HashSet<i32> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, SweepOutcome::Notified { .. }))
            .map(|o| o.user_id)
            .collect()
    }

    fn count(&self, pred: impl Fn(&SweepOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }

    /// Logs each failure and a one-line summary.
    pub fn log(&self) {
        for o in &self.outcomes {
            let desc = format!(
                "subscription id `{}` (code {}, user {})",
                o.subscription_id, o.code, o.user_id
            );
            match &o.outcome {
                SweepOutcome::Unavailable => debug!("Sweep {}: no seats for {desc}.", self.sweep_id),
                SweepOutcome::Notified { seats } => {
                    info!("Sweep {}: notified {desc} of {seats} seat(s).", self.sweep_id)
                }
                SweepOutcome::AlreadyNotified { .. } => {
                    debug!("Sweep {}: user already notified, skipped {desc}.", self.sweep_id)
                }
                SweepOutcome::ProbeFailed(e) => {
                    warn!("Sweep {}: probe failed for {desc}: {e}", self.sweep_id)
                }
                SweepOutcome::LookupFailed(e) => {
                    error!("Sweep {}: user lookup failed for {desc}: {e}", self.sweep_id)
                }
                SweepOutcome::DeliveryFailed(e) => {
                    error!("Sweep {}: delivery failed for {desc}: {e}", self.sweep_id)
                }
            }
        }

        info!(
            "Sweep {} finished in {:.2}s: {} probed, {} notified, {} deduplicated, {} failed.",
            self.sweep_id,
            (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0,
            self.probed(),
            self.notified(),
            self.deduplicated(),
            self.failed()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_claim_is_exclusive() {
        let set = NotifiedSet::new();
        assert!(set.claim(1));
        assert!(!set.claim(1));
        assert!(set.claim(2));
        assert_eq!(set.len(), 2);

        set.release(1);
        assert!(!set.contains(1));
        assert!(set.claim(1));
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let set = Arc::new(NotifiedSet::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let set = set.clone();
                std::thread::spawn(move || set.claim(7))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "mark_notified".parse::<DeliveryFailurePolicy>().unwrap(),
            DeliveryFailurePolicy::MarkNotified
        );
        assert_eq!(
            "allow_retry".parse::<DeliveryFailurePolicy>().unwrap(),
            DeliveryFailurePolicy::AllowRetry
        );
        assert!("sometimes".parse::<DeliveryFailurePolicy>().is_err());
    }
}
