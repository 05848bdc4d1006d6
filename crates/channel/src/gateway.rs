use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;

use amanah_core::config::GatewayConfig;

const API_KEY_HEADER: &str = "X-Api-Key";
const CHAT_SUFFIX: &str = "@c.us";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundImage {
    pub url: Option<String>,
    pub data_base64: Option<String>,
    pub mime_type: String,
    pub filename: String,
}

/// Best-effort delivery: failures are logged by the implementation and reported as `false`.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_message(&self, phone: &str, text: &str) -> bool;
    async fn send_image(&self, phone: &str, image: &OutboundImage, caption: &str) -> bool;
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("image has neither url nor data")]
    EmptyImage,
}

pub struct HttpGateway {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    session: String,
}

impl HttpGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            session: config.session.clone(),
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), GatewayError> {
        let mut request = self.client.post(format!("{}{path}", self.base_url)).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header(API_KEY_HEADER, api_key.expose_secret());
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(GatewayError::Status { status: status.as_u16(), body })
    }

    pub async fn try_send_message(&self, phone: &str, text: &str) -> Result<(), GatewayError> {
        self.post(
            "/api/sendText",
            json!({ "session": self.session, "chatId": chat_id(phone), "text": text }),
        )
        .await
    }

    pub async fn try_send_image(
        &self,
        phone: &str,
        image: &OutboundImage,
        caption: &str,
    ) -> Result<(), GatewayError> {
        let file = match (&image.url, &image.data_base64) {
            (Some(url), _) => {
                json!({ "mimetype": image.mime_type, "filename": image.filename, "url": url })
            }
            (None, Some(data)) => {
                json!({ "mimetype": image.mime_type, "filename": image.filename, "data": data })
            }
            (None, None) => return Err(GatewayError::EmptyImage),
        };
        self.post(
            "/api/sendImage",
            json!({
                "session": self.session,
                "chatId": chat_id(phone),
                "file": file,
                "caption": caption,
            }),
        )
        .await
    }
}

#[async_trait]
impl MessagingGateway for HttpGateway {
    async fn send_message(&self, phone: &str, text: &str) -> bool {
        match self.try_send_message(phone, text).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    event_name = "gateway.send_failed",
                    phone,
                    kind = "text",
                    error = %error,
                    "outbound message was not delivered"
                );
                false
            }
        }
    }

    async fn send_image(&self, phone: &str, image: &OutboundImage, caption: &str) -> bool {
        match self.try_send_image(phone, image, caption).await {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(
                    event_name = "gateway.send_failed",
                    phone,
                    kind = "image",
                    error = %error,
                    "outbound image was not delivered"
                );
                false
            }
        }
    }
}

/// Logs instead of delivering; used when no gateway URL is configured.
#[derive(Default)]
pub struct NoopGateway;

#[async_trait]
impl MessagingGateway for NoopGateway {
    async fn send_message(&self, phone: &str, text: &str) -> bool {
        tracing::info!(event_name = "gateway.noop", phone, chars = text.len(), "delivery disabled");
        true
    }

    async fn send_image(&self, phone: &str, image: &OutboundImage, _caption: &str) -> bool {
        tracing::info!(
            event_name = "gateway.noop",
            phone,
            filename = %image.filename,
            "delivery disabled"
        );
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SentMessage {
    Text { phone: String, text: String },
    Image { phone: String, image: OutboundImage, caption: String },
}

impl SentMessage {
    pub fn text(&self) -> &str {
        match self {
            Self::Text { text, .. } => text,
            Self::Image { caption, .. } => caption,
        }
    }
}

/// Keeps every outbound message in memory.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingGateway {
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn texts_to(&self, phone: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|message| match message {
                SentMessage::Text { phone: to, text } if to == phone => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_message(&self, phone: &str, text: &str) -> bool {
        self.sent
            .lock()
            .await
            .push(SentMessage::Text { phone: phone.to_string(), text: text.to_string() });
        true
    }

    async fn send_image(&self, phone: &str, image: &OutboundImage, caption: &str) -> bool {
        self.sent.lock().await.push(SentMessage::Image {
            phone: phone.to_string(),
            image: image.clone(),
            caption: caption.to_string(),
        });
        true
    }
}

pub fn gateway_from_config(
    config: &GatewayConfig,
) -> Result<Arc<dyn MessagingGateway>, GatewayError> {
    if config.base_url.trim().is_empty() {
        tracing::warn!(
            event_name = "gateway.disabled",
            "no gateway base url configured; replies will only be logged"
        );
        return Ok(Arc::new(NoopGateway));
    }
    Ok(Arc::new(HttpGateway::new(config)?))
}

fn chat_id(phone: &str) -> String {
    if phone.contains('@') {
        phone.to_string()
    } else {
        format!("{phone}{CHAT_SUFFIX}")
    }
}

#[cfg(test)]
mod tests {
    use amanah_core::config::AppConfig;

    use super::{chat_id, gateway_from_config, MessagingGateway, OutboundImage, RecordingGateway};

    #[test]
    fn phone_numbers_get_the_chat_suffix() {
        assert_eq!(chat_id("6281234567890"), "6281234567890@c.us");
        assert_eq!(chat_id("6281234567890@c.us"), "6281234567890@c.us");
    }

    #[tokio::test]
    async fn recording_gateway_keeps_texts_per_phone() {
        let gateway = RecordingGateway::default();
        gateway.send_message("628111", "satu").await;
        gateway.send_message("628222", "dua").await;
        gateway
            .send_image(
                "628111",
                &OutboundImage {
                    url: Some("https://cdn.example.org/qris.png".to_string()),
                    data_base64: None,
                    mime_type: "image/png".to_string(),
                    filename: "qris.png".to_string(),
                },
                "QRIS",
            )
            .await;

        assert_eq!(gateway.texts_to("628111").await, vec!["satu".to_string()]);
        assert_eq!(gateway.sent().await.len(), 3);
    }

    #[tokio::test]
    async fn empty_base_url_selects_the_noop_gateway() {
        let config = AppConfig::default();
        let gateway = gateway_from_config(&config.gateway).expect("gateway");

        assert!(gateway.send_message("628111", "halo").await);
    }
}
