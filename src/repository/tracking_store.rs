//! Storage contract used by the checker and the command path.

use async_trait::async_trait;

use crate::entity::SubscriptionModel;
use crate::entity::UserModel;
use crate::repository::Repository;
use crate::repository::error::DatabaseError;
use crate::repository::table::Table;

/// Durable subscriptions and users.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// All active subscriptions of all users.
    async fn list_active_subscriptions(&self) -> Result<Vec<SubscriptionModel>, DatabaseError>;

    async fn get_user_by_id(&self, id: i32) -> Result<Option<UserModel>, DatabaseError>;

    /// Returns the existing user for `external_id` or creates one.
    async fn get_or_create_user(
        &self,
        external_id: &str,
        username: Option<&str>,
    ) -> Result<UserModel, DatabaseError>;

    /// Makes `(user_id, code)` active. The flag is `true` when the row was
    /// created or reactivated, `false` when it was already active. An already
    /// active row keeps its title.
    async fn add_subscription(
        &self,
        user_id: i32,
        code: &str,
        title: &str,
    ) -> Result<(SubscriptionModel, bool), DatabaseError>;

    /// Returns `true` when an active row was found and deactivated.
    async fn deactivate_subscription(&self, user_id: i32, code: &str)
    -> Result<bool, DatabaseError>;

    async fn list_user_subscriptions(
        &self,
        user_id: i32,
    ) -> Result<Vec<SubscriptionModel>, DatabaseError>;

    async fn update_title(&self, user_id: i32, code: &str, title: &str)
    -> Result<(), DatabaseError>;
}

#[async_trait]
impl TrackingStore for Repository {
    async fn list_active_subscriptions(&self) -> Result<Vec<SubscriptionModel>, DatabaseError> {
        self.subscription.select_all_active().await
    }

    async fn get_user_by_id(&self, id: i32) -> Result<Option<UserModel>, DatabaseError> {
        self.user.select(&id).await
    }

    async fn get_or_create_user(
        &self,
        external_id: &str,
        username: Option<&str>,
    ) -> Result<UserModel, DatabaseError> {
        self.user.insert_or_get(external_id, username).await
    }

    async fn add_subscription(
        &self,
        user_id: i32,
        code: &str,
        title: &str,
    ) -> Result<(SubscriptionModel, bool), DatabaseError> {
        self.subscription.activate(user_id, code, title).await
    }

    async fn deactivate_subscription(
        &self,
        user_id: i32,
        code: &str,
    ) -> Result<bool, DatabaseError> {
        self.subscription.deactivate(user_id, code).await
    }

    async fn list_user_subscriptions(
        &self,
        user_id: i32,
    ) -> Result<Vec<SubscriptionModel>, DatabaseError> {
        self.subscription.select_active_by_user_id(user_id).await
    }

    async fn update_title(
        &self,
        user_id: i32,
        code: &str,
        title: &str,
    ) -> Result<(), DatabaseError> {
        self.subscription.update_title(user_id, code, title).await
    }
}
