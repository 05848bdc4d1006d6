//! Conversation handling for the donor chat channel.
//!
//! Every inbound message either advances the session's active flow or goes
//! to the tool-calling [`AgentRuntime`]. The model only chooses which lookup
//! to run or which deterministic flow to start; amounts, totals and
//! transactions always come from `amanah-core`.

pub mod conversation;
pub mod guardrails;
pub mod llm;
pub mod prompt;
pub mod runtime;
pub mod tools;

pub use conversation::{ConversationService, EventOutcome};
pub use guardrails::{GuardrailDecision, GuardrailIntent, GuardrailPolicy};
pub use llm::{provider_from_config, LlmProvider, ProviderError, ScriptedProvider};
pub use runtime::{AgentInput, AgentReply, AgentRuntime, APOLOGY};
pub use tools::{catalog, ToolCall, ToolName, ToolSpec};
