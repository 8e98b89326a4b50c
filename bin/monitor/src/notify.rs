//! Lifecycle notifications.
//!
//! Notices go to a Telegram chat when the transport is configured and are
//! silently dropped otherwise. Delivery failures are logged, never
//! propagated: a missed notice must not fail a tick.

use crate::config::TelegramSettings;
use serde::Serialize;
use std::future::Future;
use tracing::{debug, warn};

/// Notification sink for scheduler lifecycle events.
pub trait Notify: Send + Sync {
    fn notify(&self, text: &str) -> impl Future<Output = ()> + Send;
}

/// Production notifier: Telegram transport, or disabled.
pub enum Notifier {
    Telegram(TelegramNotifier),
    Disabled,
}

impl Notifier {
    pub fn from_settings(settings: Option<&TelegramSettings>) -> Self {
        match settings {
            Some(telegram) => Self::Telegram(TelegramNotifier::new(telegram.clone())),
            None => Self::Disabled,
        }
    }
}

impl Notify for Notifier {
    async fn notify(&self, text: &str) {
        match self {
            Self::Telegram(telegram) => telegram.send(text).await,
            Self::Disabled => debug!("notifications disabled, dropping notice"),
        }
    }
}

/// Telegram Bot API transport.
pub struct TelegramNotifier {
    client: reqwest::Client,
    settings: TelegramSettings,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
}

impl TelegramNotifier {
    pub fn new(settings: TelegramSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    async fn send(&self, text: &str) {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.settings.bot_token
        );
        let request = SendMessageRequest {
            chat_id: self.settings.chat_id,
            text,
            parse_mode: "Markdown",
            message_thread_id: self.settings.topic_id,
        };

        match self.client.post(&url).json(&request).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "Telegram rejected notification");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to send Telegram notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_omitted_when_absent() {
        let request = SendMessageRequest {
            chat_id: -100123,
            text: "hello",
            parse_mode: "Markdown",
            message_thread_id: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("message_thread_id"));

        let request = SendMessageRequest {
            message_thread_id: Some(42),
            ..request
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"message_thread_id\":42"));
    }
}
