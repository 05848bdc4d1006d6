//! Inbound event pipeline: filter, dedup, session, then flow or agent.

use std::sync::Arc;
use std::time::Instant;

use amanah_channel::{
    IgnoreReason, Inbound, InboundMessage, MessagingGateway, OutboundImage, WebhookEvent,
};
use amanah_core::dedup::DedupGuard;
use amanah_core::flows::FlowEngine;
use amanah_core::session::{Session, SessionStore, Speaker};

use crate::runtime::{AgentInput, AgentRuntime};

const IMAGE_MARKER: &str = "[gambar]";

/// What happened to one webhook event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    Duplicate,
    Replied { delivered: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Outgoing {
    text: String,
    image: Option<OutboundImage>,
}

pub struct ConversationService {
    sessions: Arc<SessionStore>,
    dedup: Arc<DedupGuard>,
    engine: FlowEngine,
    agent: AgentRuntime,
    gateway: Arc<dyn MessagingGateway>,
}

impl ConversationService {
    pub fn new(
        sessions: Arc<SessionStore>,
        dedup: Arc<DedupGuard>,
        engine: FlowEngine,
        agent: AgentRuntime,
        gateway: Arc<dyn MessagingGateway>,
    ) -> Self {
        Self { sessions, dedup, engine, agent, gateway }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn dedup(&self) -> &Arc<DedupGuard> {
        &self.dedup
    }

    pub fn provider_name(&self) -> &'static str {
        self.agent.provider_name()
    }

    pub async fn handle_event(&self, event: WebhookEvent) -> EventOutcome {
        match event.classify() {
            Inbound::Message(message) => self.handle_message(message).await,
            Inbound::Ignored(reason) => {
                tracing::debug!(
                    event_name = "webhook.ignored",
                    reason = reason.as_str(),
                    "event acknowledged without processing"
                );
                EventOutcome::Ignored(reason)
            }
        }
    }

    /// Handles one direct message and sends exactly one reply.
    ///
    /// The session lock is held until the reply has been handed to the
    /// gateway, so a second message from the same phone waits for this one.
    pub async fn handle_message(&self, message: InboundMessage) -> EventOutcome {
        if self.dedup.seen(&message.message_id) {
            tracing::info!(
                event_name = "webhook.duplicate",
                correlation_id = %message.message_id,
                phone = %message.phone,
                "re-delivered message dropped"
            );
            return EventOutcome::Duplicate;
        }

        let lease = self.sessions.acquire(&message.phone);
        let mut session = lease.session.lock().await;
        session.last_activity = Instant::now();
        if lease.created {
            tracing::info!(
                event_name = "session.created",
                correlation_id = %message.message_id,
                phone = %message.phone,
                "new conversation session"
            );
        }
        if !session.donor_checked {
            self.resolve_donor(&mut session).await;
        }
        if session.donor_name.is_none() && message.sender_name.is_some() {
            session.chat_name = message.sender_name.clone();
        }

        let outgoing = self.reply_for(&mut session, &message).await;
        session.record(Speaker::Donor, donor_turn(&message));
        session.record(Speaker::Assistant, outgoing.text.clone());

        let delivered = match &outgoing.image {
            Some(image) => self.gateway.send_image(&message.phone, image, &outgoing.text).await,
            None => self.gateway.send_message(&message.phone, &outgoing.text).await,
        };
        tracing::info!(
            event_name = "conversation.replied",
            correlation_id = %message.message_id,
            phone = %message.phone,
            flow = session.flow.as_ref().map(|flow| flow.kind().as_str()).unwrap_or("none"),
            delivered,
            "reply sent"
        );
        EventOutcome::Replied { delivered }
    }

    async fn reply_for(&self, session: &mut Session, message: &InboundMessage) -> Outgoing {
        // An image during a flow ends the flow; the donor is told which one.
        let mut notice = None;
        if message.image.is_some() {
            if let Some(dropped) = session.flow.take() {
                let kind = dropped.kind();
                tracing::info!(
                    event_name = "flow.dropped_for_image",
                    correlation_id = %message.message_id,
                    phone = %session.phone,
                    flow = kind.as_str(),
                    "image received during an active flow"
                );
                notice = Some(format!(
                    "Proses {} sebelumnya kami hentikan karena Anda mengirim gambar. \
                     Silakan mulai lagi jika masih ingin melanjutkan.",
                    kind.label()
                ));
            }
        }

        if let Some(outcome) = self.engine.advance(session, &message.text).await {
            return Outgoing { text: outcome.reply().to_string(), image: None };
        }

        let reply = self
            .agent
            .respond(
                session,
                AgentInput {
                    text: &message.text,
                    image: message.image.as_ref(),
                    correlation_id: &message.message_id,
                },
            )
            .await;
        if let Some(kind) = reply.started_flow {
            tracing::info!(
                event_name = "flow.started",
                correlation_id = %message.message_id,
                phone = %session.phone,
                flow = kind.as_str(),
                tool_calls = reply.tool_calls.len(),
                "guided flow started by the agent"
            );
        }
        let text = match notice {
            Some(notice) => format!("{notice}\n\n{}", reply.text),
            None => reply.text,
        };
        Outgoing { text, image: reply.image }
    }

    async fn resolve_donor(&self, session: &mut Session) {
        match self.engine.commerce().donors.find_by_phone(&session.phone).await {
            Ok(Some(donor)) => session.remember_donor(&donor),
            Ok(None) => session.donor_checked = true,
            Err(error) => tracing::warn!(
                event_name = "donor.lookup_failed",
                phone = %session.phone,
                error = %error,
                "donor lookup failed, will retry on the next message"
            ),
        }
    }
}

fn donor_turn(message: &InboundMessage) -> String {
    match (message.text.is_empty(), message.image.is_some()) {
        (true, _) => IMAGE_MARKER.to_string(),
        (false, true) => format!("{} {IMAGE_MARKER}", message.text),
        (false, false) => message.text.clone(),
    }
}
