//! Telegram Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use wreq::header::CONTENT_TYPE;

use crate::notify::Notifier;
use crate::notify::error::NotifyError;

/// Upper bound for a single API call. Long polls must be shorter than this.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Deserialize, Debug)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<Sender>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Chat {
    pub id: i64,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct Sender {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

pub struct TelegramClient {
    /// e.g. `https://api.telegram.org`
    pub api_url: String,
    token: String,
    client: wreq::Client,
}

impl TelegramClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Result<Self, NotifyError> {
        let client = wreq::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    /// Fetches pending updates starting at `offset`. Telegram holds the request
    /// open for up to `timeout` when nothing is pending.
    pub async fn get_updates(
        &self,
        offset: i64,
        limit: u32,
        timeout: Duration,
    ) -> Result<Vec<Update>, NotifyError> {
        let timeout = timeout.min(REQUEST_TIMEOUT.saturating_sub(Duration::from_secs(10)));
        let body = json!({ "offset": offset, "limit": limit, "timeout": timeout.as_secs() });
        let updates: Option<Vec<Update>> = self.call("getUpdates", body).await?;
        Ok(updates.unwrap_or_default())
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        if chat_id.is_empty() {
            return Err(NotifyError::InvalidRecipient {
                external_id: chat_id.to_string(),
            });
        }
        let body = json!({ "chat_id": chat_id, "text": text });
        let _: Option<serde_json::Value> = self.call("sendMessage", body).await?;
        Ok(())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<Option<T>, NotifyError> {
        let request = self
            .client
            .post(format!("{}/bot{}/{method}", self.api_url, self.token))
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        debug!("Calling Telegram method {method}");

        let response = self.client.execute(request.build()?).await?;
        let text = response.text().await?;
        let resp: ApiResponse<T> = serde_json::from_str(&text)?;

        if !resp.ok {
            return Err(NotifyError::ApiError {
                message: resp
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            });
        }
        Ok(resp.result)
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn deliver(&self, external_id: &str, text: &str) -> Result<(), NotifyError> {
        self.send_message(external_id, text).await
    }
}
