//! Telegram Bot API client

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::handle_response;

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Minimal Telegram Bot API client that can post text messages
#[derive(Debug, Clone)]
pub struct TelegramClient {
    base_url: String,
    bot_token: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, bot_token)
    }

    pub fn with_base_url(base_url: impl Into<String>, bot_token: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
            client: Client::new(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.bot_token, method)
    }

    /// Posts a plain-text message to a chat
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(ClientError::InvalidRequest(
                "Message text cannot be empty".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&SendMessage {
                chat_id,
                text,
                disable_web_page_preview: true,
            })
            .send()
            .await?;

        let body: ApiResponse = handle_response(response).await?;
        if !body.ok {
            return Err(ClientError::api_error(
                200,
                body.description
                    .unwrap_or_else(|| "Telegram rejected the message".to_string()),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let client = TelegramClient::with_base_url("http://localhost:9000/", "123:abc");
        assert_eq!(
            client.method_url("sendMessage"),
            "http://localhost:9000/bot123:abc/sendMessage"
        );
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_locally() {
        let client = TelegramClient::new("123:abc");
        let err = client.send_message("42", "   ").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }
}
