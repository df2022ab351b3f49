//! Database entity models.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use sqlx::FromRow;

/// Someone who talks to the bot.
///
/// Created the first time a chat sends a command. Rows are never deleted.
#[derive(FromRow, Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct UserModel {
    #[serde(default)]
    pub id: i32,
    /// Messaging identity used for delivery (Telegram chat id)
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

/// A user tracking one resource code.
///
/// `(user_id, code)` is unique across all rows. Removing a subscription only
/// clears `active`, so re-adding the same code reactivates the existing row.
#[derive(FromRow, Serialize, Deserialize, Default, Clone, Debug, PartialEq)]
pub struct SubscriptionModel {
    #[serde(default)]
    pub id: i32,
    #[serde(default)]
    pub user_id: i32,
    #[serde(default)]
    pub code: String,
    /// Cached display title. Best-effort, may be stale.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}
