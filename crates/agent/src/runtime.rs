//! Bounded tool-calling loop between the model and the deterministic flows.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use amanah_channel::OutboundImage;
use amanah_core::domain::donor::NewDonor;
use amanah_core::domain::payment::{ImageAttachment, ProofStatus};
use amanah_core::domain::transaction::TransactionStatus;
use amanah_core::flows::{
    FlowEngine, FlowKind, FlowStart, FlowStartError, StartOutcome, REGISTER_FIRST,
};
use amanah_core::session::{Session, Speaker};

use crate::guardrails::{GuardrailDecision, GuardrailIntent, GuardrailPolicy, ATTACH_PROOF};
use crate::llm::{CompletionRequest, LlmProvider, ModelTurn, TranscriptItem};
use crate::prompt::{PromptContext, SystemPrompt};
use crate::tools::{catalog, facade_failure, ToolCall, ToolOutput, ToolSpec, Toolbox};

pub const APOLOGY: &str = "Mohon maaf, kami sedang mengalami kendala teknis. \
Silakan coba beberapa saat lagi.";

const FALLBACK_PROMPT: &str = "Anda adalah asisten layanan donatur. Jawab dalam Bahasa \
Indonesia dan gunakan tool yang tersedia; akhiri dengan tool reply.";

const RECENT_FOR_CONFIRMATION: usize = 10;

/// The message the model is asked to answer.
#[derive(Clone, Copy, Debug)]
pub struct AgentInput<'a> {
    pub text: &'a str,
    pub image: Option<&'a ImageAttachment>,
    pub correlation_id: &'a str,
}

/// One executed tool, kept for the duration of the request only.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolRecord {
    pub name: String,
    pub arguments: Value,
    pub result: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AgentReply {
    pub text: String,
    pub image: Option<OutboundImage>,
    pub started_flow: Option<FlowKind>,
    pub tool_calls: Vec<ToolRecord>,
}

enum Step {
    Continue(ToolOutput),
    Finish { text: String, started_flow: Option<FlowKind> },
}

pub struct AgentRuntime {
    provider: Arc<dyn LlmProvider>,
    engine: FlowEngine,
    toolbox: Toolbox,
    guardrails: GuardrailPolicy,
    prompt: SystemPrompt,
    tools: Vec<ToolSpec>,
    max_rounds: u32,
}

impl AgentRuntime {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        engine: FlowEngine,
        guardrails: GuardrailPolicy,
        max_rounds: u32,
    ) -> Result<Self, tera::Error> {
        Ok(Self {
            provider,
            toolbox: Toolbox::new(engine.commerce().clone()),
            engine,
            guardrails,
            prompt: SystemPrompt::new()?,
            tools: catalog(),
            max_rounds: max_rounds.max(1),
        })
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Runs up to `max_rounds` model turns and returns exactly one reply.
    pub async fn respond(&self, session: &mut Session, input: AgentInput<'_>) -> AgentReply {
        let system = self.system_prompt(session, input.image.is_some());
        let mut transcript = history_transcript(session);
        transcript.push(TranscriptItem::User {
            text: input.text.to_string(),
            image: input.image.cloned(),
        });

        let mut records = Vec::new();
        let mut image = None;
        let mut last_result: Option<String> = None;

        for round in 1..=self.max_rounds {
            let request = CompletionRequest {
                system: system.clone(),
                transcript: transcript.clone(),
                tools: self.tools.clone(),
            };
            let turn = match self.provider.complete(&request).await {
                Ok(turn) => turn,
                Err(error) => {
                    tracing::warn!(
                        event_name = "agent.provider_failed",
                        correlation_id = input.correlation_id,
                        provider = self.provider.name(),
                        round,
                        error = %error,
                        "model call failed, answering with an apology"
                    );
                    return reply(APOLOGY.to_string(), None, None, records);
                }
            };

            let invocation = match turn {
                ModelTurn::Reply(text) => {
                    let text = self.guard_reply(text, input.correlation_id);
                    return reply(text, image, None, records);
                }
                ModelTurn::ToolCall(invocation) => invocation,
            };

            tracing::info!(
                event_name = "agent.tool_called",
                correlation_id = input.correlation_id,
                phone = %session.phone,
                tool = %invocation.name,
                round,
                "model invoked a tool"
            );

            let result = match ToolCall::parse(&invocation) {
                Ok(call) => match self.execute(session, call, input).await {
                    Step::Finish { text, started_flow } => {
                        records.push(record(&invocation.name, &invocation.arguments, &text));
                        return reply(text, image, started_flow, records);
                    }
                    Step::Continue(output) => {
                        if output.image.is_some() {
                            image = output.image;
                        }
                        last_result = Some(output.text.clone());
                        output.text
                    }
                },
                Err(error) => {
                    tracing::warn!(
                        event_name = "agent.tool_arguments_invalid",
                        correlation_id = input.correlation_id,
                        error = %error,
                        "tool invocation rejected"
                    );
                    format!("Error: {error}. Perbaiki argumen tool lalu coba lagi.")
                }
            };

            records.push(record(&invocation.name, &invocation.arguments, &result));
            let call_id = invocation.id.clone();
            let name = invocation.name.clone();
            transcript.push(TranscriptItem::ToolCall(invocation));
            transcript.push(TranscriptItem::ToolResult { call_id, name, content: result });
        }

        tracing::warn!(
            event_name = "agent.rounds_exhausted",
            correlation_id = input.correlation_id,
            rounds = self.max_rounds,
            "tool loop hit its round cap"
        );
        let text = last_result.unwrap_or_else(|| APOLOGY.to_string());
        reply(text, image, None, records)
    }

    async fn execute(&self, session: &mut Session, call: ToolCall, input: AgentInput<'_>) -> Step {
        let toolbox = &self.toolbox;
        let output = match call {
            ToolCall::SearchPrograms { query } => toolbox.search_programs(&query).await.into(),
            ToolCall::GetProgramDetail { program_id } => {
                toolbox.program_detail(&program_id).await.into()
            }
            ToolCall::GetZakatMenu { kind } => toolbox.zakat_menu(kind).await.into(),
            ToolCall::CheckTransactionStatus { transaction_number } => toolbox
                .transaction_status(&session.phone, transaction_number.as_deref())
                .await
                .into(),
            ToolCall::CheckSavingsStatus => {
                toolbox.savings_status(session.donor_id.as_ref()).await.into()
            }
            ToolCall::GetPaymentMethods { method } => toolbox.payment_methods(method).await,
            ToolCall::RegisterDonor { name, email } => {
                self.register_donor(session, name, email).await.into()
            }
            ToolCall::ConfirmPayment { transaction_number } => {
                return self.confirm_payment(session, transaction_number, input).await;
            }
            ToolCall::StartFlow(start) => return self.start_flow(session, start, input).await,
            ToolCall::Reply { message } => {
                let text = self.guard_reply(message, input.correlation_id);
                return Step::Finish { text, started_flow: None };
            }
        };
        Step::Continue(output)
    }

    fn guard_reply(&self, text: String, correlation_id: &str) -> String {
        match self.guardrails.evaluate(&GuardrailIntent::Reply { text: &text }) {
            GuardrailDecision::Allow => text,
            GuardrailDecision::Deny { reason_code, user_message, .. }
            | GuardrailDecision::Degrade { reason_code, user_message, .. } => {
                tracing::warn!(
                    event_name = "guardrail.reply_substituted",
                    correlation_id,
                    reason_code,
                    "model reply replaced"
                );
                user_message
            }
        }
    }

    async fn start_flow(
        &self,
        session: &mut Session,
        start: FlowStart,
        input: AgentInput<'_>,
    ) -> Step {
        let kind = start.kind();
        let intent = GuardrailIntent::StartFlow { kind, donor_registered: session.is_registered() };
        if let GuardrailDecision::Deny { reason_code, user_message, .. }
        | GuardrailDecision::Degrade { reason_code, user_message, .. } =
            self.guardrails.evaluate(&intent)
        {
            tracing::info!(
                event_name = "guardrail.flow_start_denied",
                correlation_id = input.correlation_id,
                action = %intent.action_key(),
                reason_code,
                "flow start blocked"
            );
            return Step::Continue(user_message.into());
        }

        match self.engine.start(session, start).await {
            Ok(StartOutcome::Started { kind, prompt }) => {
                Step::Finish { text: prompt, started_flow: Some(kind) }
            }
            Ok(StartOutcome::Declined(message)) => Step::Continue(message.into()),
            Err(FlowStartError::NotRegistered) => Step::Continue(REGISTER_FIRST.to_string().into()),
            Err(FlowStartError::AlreadyActive(active)) => Step::Continue(
                format!(
                    "Masih ada proses {active} yang berjalan. Selesaikan dulu atau ketik *batal*."
                )
                .into(),
            ),
        }
    }

    async fn register_donor(
        &self,
        session: &mut Session,
        name: String,
        email: Option<String>,
    ) -> String {
        if session.is_registered() {
            let name = session.donor_name.clone().unwrap_or_default();
            return format!("Nomor ini sudah terdaftar sebagai donatur atas nama {name}.");
        }

        let donors = &self.toolbox.commerce().donors;
        match donors.register(NewDonor { name, phone: session.phone.clone(), email }).await {
            Ok(donor) => {
                session.remember_donor(&donor);
                tracing::info!(
                    event_name = "donor.registered",
                    phone = %session.phone,
                    donor_id = %donor.id.0,
                    "donor registered from chat"
                );
                format!(
                    "Pendaftaran berhasil. {} sekarang terdaftar sebagai donatur dan dapat \
                     melanjutkan transaksi.",
                    donor.name
                )
            }
            Err(error) => facade_failure("register_donor", error),
        }
    }

    /// Submits the attached proof. A stored proof ends the loop with the
    /// system's own receipt text.
    async fn confirm_payment(
        &self,
        session: &Session,
        number: Option<String>,
        input: AgentInput<'_>,
    ) -> Step {
        let intent = GuardrailIntent::ConfirmPayment { has_image: input.image.is_some() };
        let image = match (self.guardrails.evaluate(&intent), input.image) {
            (GuardrailDecision::Allow, Some(image)) => image,
            (GuardrailDecision::Deny { user_message, .. }, _)
            | (GuardrailDecision::Degrade { user_message, .. }, _) => {
                return Step::Continue(user_message.into());
            }
            (GuardrailDecision::Allow, None) => {
                return Step::Continue(ATTACH_PROOF.to_string().into());
            }
        };

        let number = match self.proof_target(session, number).await {
            Ok(number) => number,
            Err(message) => return Step::Continue(message.into()),
        };

        match self.toolbox.commerce().payments.submit_proof(&number, image).await {
            Ok(receipt) => {
                tracing::info!(
                    event_name = "payment.proof_submitted",
                    correlation_id = input.correlation_id,
                    transaction_number = %receipt.transaction_number,
                    status = ?receipt.status,
                    "proof of transfer stored"
                );
                let text = match receipt.status {
                    ProofStatus::AwaitingVerification => format!(
                        "Terima kasih, bukti transfer untuk transaksi {} sudah kami simpan dan \
                         akan segera diverifikasi oleh tim kami. Kami akan mengabari Anda \
                         setelah verifikasi selesai.",
                        receipt.transaction_number
                    ),
                    ProofStatus::AlreadyPaid => format!(
                        "Transaksi {} sudah tercatat lunas di sistem kami. Terima kasih.",
                        receipt.transaction_number
                    ),
                };
                Step::Finish { text, started_flow: None }
            }
            Err(error) => Step::Continue(facade_failure("confirm_payment", error).into()),
        }
    }

    /// The donor's named transaction, or their latest pending one.
    async fn proof_target(
        &self,
        session: &Session,
        number: Option<String>,
    ) -> Result<String, String> {
        let transactions = &self.toolbox.commerce().transactions;
        match number {
            Some(number) => match transactions.find_by_number(&number).await {
                Ok(Some(transaction)) if transaction.donor_phone == session.phone => {
                    Ok(transaction.transaction_number)
                }
                Ok(_) => Err(format!("Transaksi {number} tidak ditemukan untuk nomor Anda.")),
                Err(error) => Err(facade_failure("confirm_payment", error)),
            },
            None => {
                let recent = transactions
                    .list_for_phone(&session.phone, RECENT_FOR_CONFIRMATION)
                    .await
                    .map_err(|error| facade_failure("confirm_payment", error))?;
                recent
                    .into_iter()
                    .find(|transaction| transaction.status == TransactionStatus::Pending)
                    .map(|transaction| transaction.transaction_number)
                    .ok_or_else(|| {
                        "Tidak ada transaksi yang menunggu pembayaran dari nomor ini. \
                         Tanyakan nomor transaksinya kepada donatur."
                            .to_string()
                    })
            }
        }
    }

    fn system_prompt(&self, session: &Session, has_image: bool) -> String {
        let mut context = PromptContext::new(Utc::now().date_naive(), &session.phone);
        context.registered = session.is_registered();
        context.donor_name = session.display_name().unwrap_or_default().to_string();
        context.has_image = has_image;
        context.min_donation = self.engine.settings().min_donation;

        match self.prompt.render(&context) {
            Ok(prompt) => prompt,
            Err(error) => {
                tracing::error!(
                    event_name = "agent.prompt_render_failed",
                    error = %error,
                    "falling back to the static system prompt"
                );
                FALLBACK_PROMPT.to_string()
            }
        }
    }
}

fn history_transcript(session: &Session) -> Vec<TranscriptItem> {
    session
        .history()
        .map(|turn| match turn.speaker {
            Speaker::Donor => TranscriptItem::User { text: turn.text.clone(), image: None },
            Speaker::Assistant => TranscriptItem::Assistant(turn.text.clone()),
        })
        .collect()
}

fn record(name: &str, arguments: &Value, result: &str) -> ToolRecord {
    ToolRecord { name: name.to_string(), arguments: arguments.clone(), result: result.to_string() }
}

fn reply(
    text: String,
    image: Option<OutboundImage>,
    started_flow: Option<FlowKind>,
    tool_calls: Vec<ToolRecord>,
) -> AgentReply {
    AgentReply { text, image, started_flow, tool_calls }
}
