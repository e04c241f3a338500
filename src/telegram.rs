//! Minimal Telegram Bot API client: long-poll `getUpdates` and `sendMessage`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::TelegramConfig;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Telegram request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error: {description}")]
    Api { description: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    MarkdownV2,
}

/// Where outbound chat messages go.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), TransportError>;
}

/// Where inbound updates come from.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Updates with an id of at least `offset`; may block while long-polling.
    async fn next_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError>;
}

// Every Bot API response is wrapped in this envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, TransportError> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TransportError::Api {
                description: self
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Chat id and text, for updates that carry a text message.
    pub fn text_message(&self) -> Option<(i64, &str)> {
        let message = self.message.as_ref()?;
        let text = message.text.as_deref()?;
        Some((message.chat.id, text))
    }
}

pub struct TelegramClient {
    http: Client,
    api_base: String,
    token: String,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, TransportError> {
        // The HTTP timeout has to outlast the long poll.
        let http = Client::builder()
            .timeout(config.poll_timeout + std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            api_base: config.api_base.clone(),
            token: config.token.clone(),
            poll_timeout_secs: config.poll_timeout.as_secs(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let response: ApiResponse<Vec<Update>> = self
            .http
            .post(self.method_url("getUpdates"))
            .json(&json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"],
            }))
            .send()
            .await?
            .json()
            .await?;
        let updates = response.into_result()?;
        debug!(count = updates.len(), "Received updates");
        Ok(updates)
    }

    /// Checks the token by asking who we are.
    pub async fn get_me(&self) -> Result<String, TransportError> {
        #[derive(Deserialize)]
        struct Me {
            username: Option<String>,
        }

        let response: ApiResponse<Me> = self
            .http
            .get(self.method_url("getMe"))
            .send()
            .await?
            .json()
            .await?;
        Ok(response.into_result()?.username.unwrap_or_default())
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn next_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        self.get_updates(offset).await
    }
}

#[async_trait]
impl MessageSink for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), TransportError> {
        let mut body = json!({ "chat_id": chat_id, "text": text });
        if let Some(mode) = parse_mode {
            body["parse_mode"] = json!(mode);
        }

        let response: ApiResponse<serde_json::Value> = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;
        response.into_result().map(|_| ())
    }
}
