//! Telegram Bot API delivery.

use crate::domain::model::{DeliveryFailure, RecipientId};
use crate::domain::ports::{CredentialStatus, Notifier};
use crate::utils::error::{NotifierError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Token values shipped in templates and docs; never valid credentials.
pub const PLACEHOLDER_TOKENS: &[&str] = &[
    "your_bot_token_here",
    "YOUR_BOT_TOKEN",
    "ваш_токен_бота_от_BotFather",
];

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BotIdentity {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: Option<String>,
    parse_mode: Option<String>,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn new(
        api_base: &str,
        token: Option<String>,
        parse_mode: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
            parse_mode,
            timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base,
            self.token.as_deref().unwrap_or_default(),
            method
        )
    }

    /// Verifies the token with `getMe`.
    pub async fn get_me(&self) -> Result<BotIdentity> {
        if self.credential_status() != CredentialStatus::Valid {
            return Err(NotifierError::config("bot token is missing or a placeholder"));
        }

        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| NotifierError::HttpError(e.without_url()))?;

        let status = response.status();
        let body: ApiResponse<BotIdentity> = response
            .json()
            .await
            .map_err(|e| NotifierError::HttpError(e.without_url()))?;

        match body.result {
            Some(identity) if body.ok => Ok(identity),
            _ => Err(NotifierError::config(format!(
                "getMe rejected ({}): {}",
                status.as_u16(),
                body.description.unwrap_or_default()
            ))),
        }
    }
}

pub fn token_status(token: Option<&str>) -> CredentialStatus {
    match token.map(str::trim) {
        None | Some("") => CredentialStatus::Missing,
        Some(t) if t.starts_with("${") || PLACEHOLDER_TOKENS.contains(&t) => CredentialStatus::Placeholder,
        Some(_) => CredentialStatus::Valid,
    }
}

/// Maps a non-success Bot API reply onto a delivery failure.
fn classify_failure(status: u16, description: Option<String>, retry_after: Option<u64>) -> DeliveryFailure {
    let description = description.unwrap_or_else(|| "no description".to_string());
    let lowered = description.to_lowercase();

    match status {
        401 => DeliveryFailure::Unauthorized(description),
        403 => DeliveryFailure::RecipientBlocked(description),
        429 => DeliveryFailure::RateLimited { retry_after },
        400 if lowered.contains("chat not found")
            || lowered.contains("user not found")
            || lowered.contains("peer_id_invalid") =>
        {
            DeliveryFailure::InvalidRecipient(description)
        }
        _ => DeliveryFailure::Api { status, description },
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn credential_status(&self) -> CredentialStatus {
        token_status(self.token.as_deref())
    }

    async fn send(&self, recipient: RecipientId, text: &str) -> std::result::Result<(), DeliveryFailure> {
        let mut payload = serde_json::json!({
            "chat_id": recipient.0,
            "text": text,
        });
        if let Some(mode) = &self.parse_mode {
            payload["parse_mode"] = serde_json::Value::String(mode.clone());
        }

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryFailure::Timeout(self.timeout)
                } else {
                    DeliveryFailure::Network(e.without_url().to_string())
                }
            })?;

        let status = response.status().as_u16();
        // Error bodies are usually JSON but a proxy may return anything.
        let body: Option<ApiResponse<serde_json::Value>> = response.json().await.ok();

        match body {
            Some(body) if body.ok && status < 300 => Ok(()),
            Some(body) => Err(classify_failure(
                status,
                body.description,
                body.parameters.and_then(|p| p.retry_after),
            )),
            None if status < 300 => {
                tracing::warn!("⚠️ sendMessage to {} returned {} with an unreadable body, counting as sent", recipient, status);
                Ok(())
            }
            None => Err(classify_failure(status, None, None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_status() {
        assert_eq!(token_status(None), CredentialStatus::Missing);
        assert_eq!(token_status(Some("  ")), CredentialStatus::Missing);
        assert_eq!(token_status(Some("${BOT_TOKEN}")), CredentialStatus::Placeholder);
        assert_eq!(token_status(Some("your_bot_token_here")), CredentialStatus::Placeholder);
        assert_eq!(token_status(Some("ваш_токен_бота_от_BotFather")), CredentialStatus::Placeholder);
        assert_eq!(token_status(Some("123456:ABC-DEF")), CredentialStatus::Valid);
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(403, Some("Forbidden: bot was blocked by the user".into()), None),
            DeliveryFailure::RecipientBlocked(_)
        ));
        assert!(matches!(
            classify_failure(400, Some("Bad Request: chat not found".into()), None),
            DeliveryFailure::InvalidRecipient(_)
        ));
        assert_eq!(
            classify_failure(429, Some("Too Many Requests".into()), Some(7)),
            DeliveryFailure::RateLimited { retry_after: Some(7) }
        );
        assert!(matches!(classify_failure(401, None, None), DeliveryFailure::Unauthorized(_)));
        assert_eq!(
            classify_failure(400, Some("Bad Request: message is too long".into()), None),
            DeliveryFailure::Api {
                status: 400,
                description: "Bad Request: message is too long".into()
            }
        );
    }

    #[test]
    fn test_method_url_trims_trailing_slash() {
        let notifier = TelegramNotifier::new(
            "https://api.telegram.org/",
            Some("123:abc".into()),
            None,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(notifier.method_url("sendMessage"), "https://api.telegram.org/bot123:abc/sendMessage");
    }
}
