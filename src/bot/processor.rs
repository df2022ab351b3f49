//! Turns incoming chat updates into service calls and replies.

use std::sync::Arc;

use log::debug;
use log::error;
use log::info;
use minijinja::Value;
use minijinja::context;

use crate::bot::command::Command;
use crate::entity::UserModel;
use crate::message::Messages;
use crate::notify::Notifier;
use crate::notify::telegram::Update;
use crate::service::error::ServiceError;
use crate::service::subscription_service::AddResult;
use crate::service::subscription_service::RemoveResult;
use crate::service::subscription_service::SubscriptionService;
use crate::service::subscription_service::UNKNOWN_TITLE;

pub struct CommandProcessor {
    subscriptions: Arc<SubscriptionService>,
    notifier: Arc<dyn Notifier>,
    messages: Messages,
}

impl CommandProcessor {
    pub fn new(subscriptions: Arc<SubscriptionService>, notifier: Arc<dyn Notifier>) -> Arc<Self> {
        Arc::new(Self {
            subscriptions,
            notifier,
            messages: Messages::new(),
        })
    }

    /// Handles `update` without blocking the caller on slow commands.
    pub async fn dispatch(self: Arc<Self>, update: Update) {
        let slow = update
            .message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .is_some_and(|text| Command::parse(text).is_slow());

        if slow {
            tokio::spawn(async move {
                if let Err(e) = self.process(update).await {
                    error!("Error processing update: {e:#}");
                }
            });
        } else if let Err(e) = self.process(update).await {
            error!("Error processing update: {e:#}");
        }
    }

    /// Handles one update to completion. Updates without text are ignored.
    pub async fn process(&self, update: Update) -> anyhow::Result<()> {
        let Some(message) = update.message else {
            return Ok(());
        };
        let Some(text) = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(());
        };
        let chat_id = message.chat.id.to_string();
        let username = message.from.and_then(|from| from.username);

        match Command::parse(text) {
            Command::Text(text) => self.reply(&chat_id, "echo", context! { text }).await,
            command => {
                debug!("Chat {chat_id} sent {command:?}");
                let user = match self
                    .subscriptions
                    .get_or_create_user(&chat_id, username.as_deref())
                    .await
                {
                    Ok(user) => Some(user),
                    Err(e) => {
                        error!("Failed to get or create user for chat {chat_id}: {e}");
                        None
                    }
                };
                self.handle_command(&chat_id, user, command).await
            }
        }
    }

    async fn handle_command(
        &self,
        chat_id: &str,
        user: Option<UserModel>,
        command: Command,
    ) -> anyhow::Result<()> {
        match command {
            Command::Start => self.reply(chat_id, "start", context! {}).await,
            Command::Help => self.reply(chat_id, "help", context! {}).await,
            Command::Unknown(_) | Command::Text(_) => {
                self.reply(chat_id, "unknown", context! {}).await
            }
            Command::Check(code) => self.check(chat_id, &code).await,
            Command::List => match user {
                Some(user) => self.list(chat_id, user.id).await,
                None => self.user_unavailable(chat_id).await,
            },
            Command::Add(code) => match user {
                Some(user) => self.add(chat_id, user.id, &code).await,
                None => self.user_unavailable(chat_id).await,
            },
            Command::Remove(code) => match user {
                Some(user) => self.remove(chat_id, user.id, &code).await,
                None => self.user_unavailable(chat_id).await,
            },
        }
    }

    async fn add(&self, chat_id: &str, user_id: i32, code: &str) -> anyhow::Result<()> {
        let code = code.trim();
        if code.is_empty() {
            return self.reply(chat_id, "empty_code", context! {}).await;
        }
        self.reply(chat_id, "adding", context! {}).await?;

        match self.subscriptions.add(user_id, code).await {
            Ok(result) => {
                let sub = result.subscription();
                let ctx = context! { code => &sub.code, title => &sub.title };
                match result {
                    AddResult::Added { .. } => self.reply(chat_id, "added", ctx).await,
                    AddResult::AlreadyTracking { .. } => {
                        self.reply(chat_id, "already_tracking", ctx).await
                    }
                }
            }
            Err(ServiceError::ProbeError(e)) => {
                info!("Probe for {code} failed while adding: {e}");
                self.reply(chat_id, "probe_failed", context! { code, error => e.to_string() })
                    .await
            }
            Err(e) => self.fail(chat_id, e).await,
        }
    }

    async fn remove(&self, chat_id: &str, user_id: i32, code: &str) -> anyhow::Result<()> {
        let code = code.trim();
        if code.is_empty() {
            return self.reply(chat_id, "empty_code", context! {}).await;
        }
        match self.subscriptions.remove(user_id, code).await {
            Ok(RemoveResult::Removed) => self.reply(chat_id, "removed", context! { code }).await,
            Ok(RemoveResult::NotTracking) => {
                self.reply(chat_id, "not_tracking", context! { code }).await
            }
            Err(e) => self.fail(chat_id, e).await,
        }
    }

    async fn list(&self, chat_id: &str, user_id: i32) -> anyhow::Result<()> {
        match self.subscriptions.list(user_id).await {
            Ok(subs) if subs.is_empty() => self.reply(chat_id, "list_empty", context! {}).await,
            Ok(subs) => {
                let subscriptions: Vec<Value> = subs
                    .iter()
                    .map(|s| context! { code => &s.code, title => &s.title })
                    .collect();
                self.reply(chat_id, "list", context! { subscriptions }).await
            }
            Err(e) => self.fail(chat_id, e).await,
        }
    }

    async fn check(&self, chat_id: &str, code: &str) -> anyhow::Result<()> {
        let code = code.trim();
        if code.is_empty() {
            return self.reply(chat_id, "empty_code", context! {}).await;
        }
        self.reply(chat_id, "checking", context! {}).await?;

        match self.subscriptions.check_now(code).await {
            Ok(availability) => {
                let title = if availability.title.is_empty() {
                    UNKNOWN_TITLE
                } else {
                    availability.title.as_str()
                };
                self.reply(
                    chat_id,
                    "check",
                    context! { code, title, seats => availability.seats },
                )
                .await
            }
            Err(e) => {
                info!("Check for {code} failed: {e}");
                self.reply(chat_id, "check_failed", context! { code, error => e.to_string() })
                    .await
            }
        }
    }

    async fn fail(&self, chat_id: &str, e: ServiceError) -> anyhow::Result<()> {
        error!("Command for chat {chat_id} failed: {e}");
        self.reply(chat_id, "error", context! { error => e.to_string() })
            .await
    }

    async fn user_unavailable(&self, chat_id: &str) -> anyhow::Result<()> {
        self.reply(chat_id, "error", context! { error => "user unavailable" })
            .await
    }

    async fn reply(&self, chat_id: &str, template: &str, ctx: Value) -> anyhow::Result<()> {
        let text = self.messages.render(template, ctx)?;
        self.notifier.deliver(chat_id, &text).await?;
        Ok(())
    }
}
