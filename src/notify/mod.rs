//! Outbound message delivery.

use async_trait::async_trait;

use crate::notify::error::NotifyError;

pub mod error;
pub mod telegram;

/// Delivers a text message to a user's messaging identity.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, external_id: &str, text: &str) -> Result<(), NotifyError>;
}
