use serde::{Deserialize, Serialize};

use amanah_core::domain::payment::ImageAttachment;
use amanah_core::parsers::normalize_phone;

const MESSAGE_EVENT: &str = "message";
const GROUP_SUFFIX: &str = "@g.us";
const BROADCAST_SUFFIX: &str = "@broadcast";

/// Raw webhook body as delivered by the chat provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub payload: Option<MessagePayload>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, alias = "fromName", alias = "notifyName")]
    pub from_name: Option<String>,
    #[serde(default, alias = "chatId")]
    pub chat_id: Option<String>,
    #[serde(default, alias = "fromMe")]
    pub is_from_me: bool,
    #[serde(default, alias = "media")]
    pub image: Option<ImagePayload>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, alias = "mimeType", alias = "mime_type")]
    pub mimetype: Option<String>,
}

/// A direct message that the conversation pipeline should handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: String,
    pub phone: String,
    pub sender_name: Option<String>,
    pub text: String,
    pub image: Option<ImageAttachment>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    NotAMessage,
    GroupChat,
    FromSelf,
    MissingId,
    InvalidSender,
    Empty,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAMessage => "not_a_message",
            Self::GroupChat => "group_chat",
            Self::FromSelf => "from_self",
            Self::MissingId => "missing_id",
            Self::InvalidSender => "invalid_sender",
            Self::Empty => "empty",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inbound {
    Message(InboundMessage),
    Ignored(IgnoreReason),
}

impl WebhookEvent {
    /// Decides whether the event reaches the pipeline; ignored events get the same acknowledgement.
    pub fn classify(self) -> Inbound {
        if self.event != MESSAGE_EVENT {
            return Inbound::Ignored(IgnoreReason::NotAMessage);
        }
        let Some(payload) = self.payload else {
            return Inbound::Ignored(IgnoreReason::NotAMessage);
        };
        if payload.is_from_me {
            return Inbound::Ignored(IgnoreReason::FromSelf);
        }
        let chat = payload.chat_id.as_deref().unwrap_or(&payload.from);
        if is_group_or_broadcast(chat) || is_group_or_broadcast(&payload.from) {
            return Inbound::Ignored(IgnoreReason::GroupChat);
        }
        if payload.id.trim().is_empty() {
            return Inbound::Ignored(IgnoreReason::MissingId);
        }
        let Some(phone) = normalize_phone(&payload.from) else {
            return Inbound::Ignored(IgnoreReason::InvalidSender);
        };

        let text = payload.body.unwrap_or_default().trim().to_string();
        let image = payload.image.and_then(ImagePayload::into_attachment);
        if text.is_empty() && image.is_none() {
            return Inbound::Ignored(IgnoreReason::Empty);
        }

        Inbound::Message(InboundMessage {
            message_id: payload.id,
            phone,
            sender_name: payload.from_name.filter(|name| !name.trim().is_empty()),
            text,
            image,
        })
    }
}

impl ImagePayload {
    fn into_attachment(self) -> Option<ImageAttachment> {
        let attachment = ImageAttachment {
            url: self.url.filter(|url| !url.trim().is_empty()),
            data_base64: self.data.filter(|data| !data.trim().is_empty()),
            mime_type: self.mimetype.unwrap_or_else(|| "image/jpeg".to_string()),
        };
        (!attachment.is_empty()).then_some(attachment)
    }
}

fn is_group_or_broadcast(id: &str) -> bool {
    id.ends_with(GROUP_SUFFIX) || id.ends_with(BROADCAST_SUFFIX)
}
