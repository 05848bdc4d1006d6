use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flows::donation::DonationStep;
use crate::flows::fidyah::FidyahStep;
use crate::flows::qurban::QurbanStep;
use crate::flows::savings::{SavingsDepositStep, SavingsOpenStep};
use crate::flows::zakat::ZakatStep;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Zakat,
    Donation,
    Fidyah,
    Qurban,
    QurbanSavings,
    QurbanSavingsDeposit,
}

impl FlowKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zakat => "zakat",
            Self::Donation => "donation",
            Self::Fidyah => "fidyah",
            Self::Qurban => "qurban",
            Self::QurbanSavings => "qurban_savings",
            Self::QurbanSavingsDeposit => "qurban_savings_deposit",
        }
    }

    /// Donor-facing name used in prompts and acknowledgements.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Zakat => "zakat",
            Self::Donation => "donasi",
            Self::Fidyah => "fidyah",
            Self::Qurban => "qurban",
            Self::QurbanSavings => "tabungan qurban",
            Self::QurbanSavingsDeposit => "setoran tabungan qurban",
        }
    }
}

/// Current step of the single active flow, with the answers collected so far.
///
/// Each variant carries only the data its own flow accumulates, so a step can
/// never read a field another flow set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "flow", content = "step", rename_all = "snake_case")]
pub enum ActiveFlow {
    Zakat(ZakatStep),
    Donation(DonationStep),
    Fidyah(FidyahStep),
    Qurban(QurbanStep),
    QurbanSavings(SavingsOpenStep),
    QurbanSavingsDeposit(SavingsDepositStep),
}

impl ActiveFlow {
    pub fn kind(&self) -> FlowKind {
        match self {
            Self::Zakat(_) => FlowKind::Zakat,
            Self::Donation(_) => FlowKind::Donation,
            Self::Fidyah(_) => FlowKind::Fidyah,
            Self::Qurban(_) => FlowKind::Qurban,
            Self::QurbanSavings(_) => FlowKind::QurbanSavings,
            Self::QurbanSavingsDeposit(_) => FlowKind::QurbanSavingsDeposit,
        }
    }

    pub fn step_name(&self) -> &'static str {
        match self {
            Self::Zakat(step) => step.name(),
            Self::Donation(step) => step.name(),
            Self::Fidyah(step) => step.name(),
            Self::Qurban(step) => step.name(),
            Self::QurbanSavings(step) => step.name(),
            Self::QurbanSavingsDeposit(step) => step.name(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    pub flow: ActiveFlow,
    pub started_at: DateTime<Utc>,
}

impl FlowState {
    pub fn new(flow: ActiveFlow, started_at: DateTime<Utc>) -> Self {
        Self { flow, started_at }
    }

    pub fn kind(&self) -> FlowKind {
        self.flow.kind()
    }

    pub fn step_name(&self) -> &'static str {
        self.flow.step_name()
    }

    /// The last step before money moves; it needs a registered donor.
    pub fn is_confirm_step(&self) -> bool {
        self.step_name() == CONFIRM_STEP
    }
}

pub const CONFIRM_STEP: &str = "confirm";
