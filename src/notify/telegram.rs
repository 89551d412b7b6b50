//! Telegram Bot API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::notify::{NotificationSink, NotifyError, NotifyResult};

/// `sendMessage` request body.
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    reply_markup: InlineKeyboardMarkup<'a>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup<'a> {
    inline_keyboard: Vec<Vec<InlineKeyboardButton<'a>>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton<'a> {
    text: &'static str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<SentMessage>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// Sends rendered transactions to a Telegram chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    http: Client,
    api_url: String,
    bot_token: String,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, bot_token: &str, timeout: Duration) -> NotifyResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        })
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send(&self, chat_id: i64, text: &str, link_url: &str) -> NotifyResult<i64> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "MarkdownV2",
            disable_web_page_preview: true,
            reply_markup: InlineKeyboardMarkup {
                inline_keyboard: vec![vec![InlineKeyboardButton {
                    text: "Explorer",
                    url: link_url,
                }]],
            },
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NotifyError::Http(e.without_url().to_string()))?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| NotifyError::Api(format!("unreadable response (status {}): {}", status, e)))?;

        if body.ok {
            return body
                .result
                .map(|message| message.message_id)
                .ok_or_else(|| NotifyError::Api("response without message".to_string()));
        }

        if let Some(seconds) = body.parameters.and_then(|p| p.retry_after) {
            return Err(NotifyError::Throttled {
                retry_after: Duration::from_secs(seconds),
            });
        }

        Err(NotifyError::Api(format!(
            "status {}: {}",
            status,
            body.description.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_url", &self.api_url)
            .field("bot_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier(server: &MockServer) -> TelegramNotifier {
        TelegramNotifier::new(&server.uri(), "123:abc", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_send_returns_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": -100,
                "parse_mode": "MarkdownV2",
                "disable_web_page_preview": true,
                "reply_markup": {"inline_keyboard": [[{"text": "Explorer", "url": "https://tronscan.org/#/transaction/t1"}]]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": {"message_id": 77, "chat": {"id": -100}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let id = notifier(&server)
            .send(-100, "hello", "https://tronscan.org/#/transaction/t1")
            .await
            .unwrap();
        assert_eq!(id, 77);
    }

    #[tokio::test]
    async fn test_flood_wait_maps_to_throttled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 429,
                "description": "Too Many Requests: retry after 3",
                "parameters": {"retry_after": 3}
            })))
            .mount(&server)
            .await;

        let err = notifier(&server).send(1, "x", "https://x").await.unwrap_err();
        assert!(matches!(err, NotifyError::Throttled { retry_after } if retry_after == Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities"
            })))
            .mount(&server)
            .await;

        let err = notifier(&server).send(1, "x.", "https://x").await.unwrap_err();
        assert!(matches!(err, NotifyError::Api(ref msg) if msg.contains("can't parse entities")));
    }
}
