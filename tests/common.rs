//! Common test utilities and fake collaborators.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use seat_watch::entity::SubscriptionModel;
use seat_watch::entity::UserModel;
use seat_watch::notify::Notifier;
use seat_watch::notify::error::NotifyError;
use seat_watch::probe::Availability;
use seat_watch::probe::Prober;
use seat_watch::probe::error::ProbeError;
use seat_watch::repository::Repository;
use seat_watch::repository::error::DatabaseError;
use seat_watch::repository::tracking_store::TrackingStore;
use uuid::Uuid;

/// Sets up a temporary test database.
pub async fn setup_db() -> (Arc<Repository>, PathBuf) {
    let uuid = Uuid::new_v4();
    let db_path = std::env::temp_dir().join(format!("seat-watch-test-{}.db", uuid));
    let db_url = format!("sqlite://{}", db_path.to_str().unwrap());

    let db = Repository::new(&db_url, db_path.to_str().unwrap())
        .await
        .expect("Failed to create database");

    db.create_tables().await.expect("Failed to create tables");

    (Arc::new(db), db_path)
}

/// Cleans up the test database file.
pub async fn teardown_db(db_path: PathBuf) {
    if db_path.exists() {
        let _ = std::fs::remove_file(db_path);
    }
}

// FAKE PROBER

#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum ProbeBehavior {
    Seats(u32, String),
    Fail,
    Hang,
}

/// Prober answering from a table of codes. Unknown codes are `NotFound`.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct FakeProber {
    pub state: Arc<RwLock<HashMap<String, ProbeBehavior>>>,
    pub calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_seats(&self, code: &str, seats: u32, title: &str) -> &Self {
        self.set(code, ProbeBehavior::Seats(seats, title.to_string()))
    }

    pub fn set(&self, code: &str, behavior: ProbeBehavior) -> &Self {
        self.state
            .write()
            .unwrap()
            .insert(code.to_string(), behavior);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for FakeProber {
    async fn probe(&self, code: &str) -> Result<Availability, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.state.read().unwrap().get(code).cloned();
        match behavior {
            Some(ProbeBehavior::Seats(seats, title)) => Ok(Availability { seats, title }),
            Some(ProbeBehavior::Fail) => Err(ProbeError::BadStatus { status: 503 }),
            Some(ProbeBehavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ProbeError::BadStatus { status: 504 })
            }
            None => Err(ProbeError::NotFound {
                code: code.to_string(),
            }),
        }
    }
}

// RECORDING NOTIFIER

/// Notifier that records every delivery, or fails all of them when asked to.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct RecordingNotifier {
    pub delivered: Arc<RwLock<Vec<(String, String)>>>,
    pub attempts: Arc<AtomicUsize>,
    pub fail: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.read().unwrap().clone()
    }

    pub fn delivered_to(&self, external_id: &str) -> Vec<String> {
        self.delivered()
            .into_iter()
            .filter(|(id, _)| id == external_id)
            .map(|(_, text)| text)
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, external_id: &str, text: &str) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::ApiError {
                message: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.delivered
            .write()
            .unwrap()
            .push((external_id.to_string(), text.to_string()));
        Ok(())
    }
}

// FLAKY STORE

/// Store whose subscription fetch fails a configured number of times before
/// delegating to the wrapped repository.
#[allow(dead_code)]
pub struct FlakyStore {
    pub inner: Arc<Repository>,
    pub failures_left: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: Arc<Repository>, failures: usize) -> Self {
        Self {
            inner,
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl TrackingStore for FlakyStore {
    async fn list_active_subscriptions(&self) -> Result<Vec<SubscriptionModel>, DatabaseError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DatabaseError::InternalError {
                message: "database is locked".to_string(),
            });
        }
        self.inner.list_active_subscriptions().await
    }

    async fn get_user_by_id(&self, id: i32) -> Result<Option<UserModel>, DatabaseError> {
        self.inner.get_user_by_id(id).await
    }

    async fn get_or_create_user(
        &self,
        external_id: &str,
        username: Option<&str>,
    ) -> Result<UserModel, DatabaseError> {
        self.inner.get_or_create_user(external_id, username).await
    }

    async fn add_subscription(
        &self,
        user_id: i32,
        code: &str,
        title: &str,
    ) -> Result<(SubscriptionModel, bool), DatabaseError> {
        self.inner.add_subscription(user_id, code, title).await
    }

    async fn deactivate_subscription(
        &self,
        user_id: i32,
        code: &str,
    ) -> Result<bool, DatabaseError> {
        self.inner.deactivate_subscription(user_id, code).await
    }

    async fn list_user_subscriptions(
        &self,
        user_id: i32,
    ) -> Result<Vec<SubscriptionModel>, DatabaseError> {
        self.inner.list_user_subscriptions(user_id).await
    }

    async fn update_title(
        &self,
        user_id: i32,
        code: &str,
        title: &str,
    ) -> Result<(), DatabaseError> {
        self.inner.update_title(user_id, code, title).await
    }
}

/// Creates a user and active subscriptions for `codes`, returning the user.
#[allow(dead_code)]
pub async fn track(db: &Repository, external_id: &str, codes: &[&str]) -> UserModel {
    let user = db
        .get_or_create_user(external_id, None)
        .await
        .expect("Failed to create user");
    for code in codes {
        db.add_subscription(user.id, code, &format!("Class {code}"))
            .await
            .expect("Failed to add subscription");
    }
    user
}
