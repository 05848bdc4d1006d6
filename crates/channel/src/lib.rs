//! Chat transport plumbing.
//!
//! - **Webhook** (`webhook`): inbound event model and the filter that decides
//!   which events reach the conversation pipeline
//! - **Gateway** (`gateway`): outbound delivery of text and image messages

pub mod gateway;
pub mod webhook;

pub use gateway::{
    gateway_from_config, GatewayError, HttpGateway, MessagingGateway, NoopGateway, OutboundImage,
    RecordingGateway, SentMessage,
};
pub use webhook::{IgnoreReason, Inbound, InboundMessage, WebhookEvent};
