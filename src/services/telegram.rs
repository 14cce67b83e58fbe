use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::TelegramConfig;
use crate::error::TrackerError;
use crate::models::notification::Action;
use crate::models::subscription::UserId;

/// Outbound message delivery to a user.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, user_id: UserId, text: &str, actions: &[Action]) -> Result<(), TrackerError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub message: Option<Message>,
}

/// What the command loop cares about in an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Text { user_id: UserId, text: String },
    Callback { user_id: UserId, query_id: String, data: String },
}

impl Update {
    pub fn into_inbound(self) -> Option<Inbound> {
        if let Some(message) = self.message {
            let text = message.text?;
            return Some(Inbound::Text {
                user_id: message.chat.id,
                text,
            });
        }

        let query = self.callback_query?;
        let user_id = query.message.as_ref()?.chat.id;
        Some(Inbound::Callback {
            user_id,
            query_id: query.id,
            data: query.data.unwrap_or_default(),
        })
    }
}

#[derive(Clone)]
pub struct TelegramService {
    client: Client,
    base_url: String,
    bot_token: String,
    updates_timeout: Duration,
    request_timeout: Duration,
}

impl TelegramService {
    pub fn new(config: &TelegramConfig, request_timeout: Duration) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TrackerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", config.api_url.trim_end_matches('/'), config.bot_token),
            bot_token: config.bot_token.clone(),
            updates_timeout: Duration::from_secs(config.updates_timeout_secs),
            request_timeout,
        })
    }

    // Transport errors echo the request URL, which embeds the token.
    fn redact(&self, text: &str) -> String {
        text.replace(&self.bot_token, "<token>")
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &Value,
        timeout: Duration,
    ) -> Result<T, TrackerError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| TrackerError::Channel(format!("{} failed: {}", method, self.redact(&e.to_string()))))?;

        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| TrackerError::Channel(format!("{} returned unreadable body: {}", method, e)))?;

        if !status.is_success() || !body.ok {
            return Err(TrackerError::Channel(format!(
                "{} rejected ({}): {}",
                method,
                status,
                body.description.unwrap_or_default()
            )));
        }

        body.result
            .ok_or_else(|| TrackerError::Channel(format!("{} returned no result", method)))
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TrackerError> {
        let mut payload = json!({
            "timeout": self.updates_timeout.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = json!(offset);
        }

        self.call("getUpdates", &payload, self.updates_timeout + self.request_timeout)
            .await
    }

    pub async fn send_message(
        &self,
        chat_id: UserId,
        text: &str,
        actions: &[Action],
    ) -> Result<(), TrackerError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if !actions.is_empty() {
            payload["reply_markup"] = inline_keyboard(actions);
        }

        let _: Value = self.call("sendMessage", &payload, self.request_timeout).await?;
        Ok(())
    }

    pub async fn answer_callback(&self, query_id: &str) -> Result<(), TrackerError> {
        let payload = json!({ "callback_query_id": query_id });
        let _: bool = self.call("answerCallbackQuery", &payload, self.request_timeout).await?;
        Ok(())
    }

    /// Registers the command menu shown by chat clients.
    pub async fn set_commands(&self, commands: &[(&str, &str)]) -> Result<(), TrackerError> {
        let commands: Vec<Value> = commands
            .iter()
            .map(|(command, description)| json!({ "command": command, "description": description }))
            .collect();

        let _: bool = self
            .call("setMyCommands", &json!({ "commands": commands }), self.request_timeout)
            .await?;
        log::info!("Registered {} bot commands", commands.len());
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for TelegramService {
    async fn notify(&self, user_id: UserId, text: &str, actions: &[Action]) -> Result<(), TrackerError> {
        self.send_message(user_id, text, actions).await
    }
}

/// One button per row, in order.
fn inline_keyboard(actions: &[Action]) -> Value {
    let rows: Vec<Value> = actions
        .iter()
        .map(|action| json!([{ "text": action.label, "callback_data": action.action_id }]))
        .collect();
    json!({ "inline_keyboard": rows })
}
