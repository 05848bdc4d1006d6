//! Deterministic multi-step transaction dialogs.
//!
//! A session holds at most one [`FlowState`]. While it is set every inbound
//! text goes straight to [`FlowEngine::advance`], which moves exactly one step.
//! Only terminal steps talk to the transaction facade.

mod common;
pub mod donation;
pub mod engine;
pub mod fidyah;
pub mod qurban;
pub mod savings;
pub mod states;
pub mod zakat;

#[cfg(test)]
pub(crate) mod testing;

pub use common::{DEFAULT_DONOR_NAME, PAYMENT_CHOICES, REGISTER_FIRST};
pub use engine::{
    FlowContext, FlowEngine, FlowOutcome, FlowSettings, FlowStart, FlowStartError, StartOutcome,
};
pub use states::{ActiveFlow, FlowKind, FlowState};
