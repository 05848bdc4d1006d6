use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::commerce::Commerce;
use crate::config::CommerceConfig;
use crate::domain::catalog::{PeriodId, ProductId, ZakatKind};
use crate::flows::common::{cancelled_message, DEFAULT_DONOR_NAME, REGISTER_FIRST};
use crate::flows::states::{ActiveFlow, FlowKind, FlowState};
use crate::flows::{donation, fidyah, qurban, savings, zakat};
use crate::nisab::NisabCalculator;
use crate::parsers::is_cancel;
use crate::session::{DonorProfile, Session};

/// Business limits the flows apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowSettings {
    pub min_donation: i64,
    pub min_savings_deposit: i64,
    /// Per-animal admin fee; shared packages split it across their slots.
    pub qurban_admin_fee: i64,
    pub fidyah_daily_rate: i64,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self::from(&crate::config::AppConfig::default().commerce)
    }
}

impl From<&CommerceConfig> for FlowSettings {
    fn from(config: &CommerceConfig) -> Self {
        Self {
            min_donation: config.min_donation,
            min_savings_deposit: config.min_savings_deposit,
            qurban_admin_fee: config.qurban_admin_fee,
            fidyah_daily_rate: config.fidyah_daily_rate,
        }
    }
}

/// Everything a step may consult besides its own state.
pub struct FlowContext<'a> {
    pub commerce: &'a Commerce,
    pub settings: &'a FlowSettings,
    pub nisab: &'a NisabCalculator,
    pub donor: &'a DonorProfile,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowOutcome {
    /// Input accepted; the flow moved to its next step.
    Continue(String),
    /// Input rejected; the step and its data are unchanged.
    Reprompt(String),
    Completed { reply: String, transaction_number: Option<String> },
    Cancelled(String),
    /// Domain rule violation or collaborator failure; no transaction exists.
    Aborted(String),
}

impl FlowOutcome {
    pub fn reply(&self) -> &str {
        match self {
            Self::Continue(text)
            | Self::Reprompt(text)
            | Self::Cancelled(text)
            | Self::Aborted(text) => text,
            Self::Completed { reply, .. } => reply,
        }
    }

    pub fn ends_flow(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Cancelled(_) | Self::Aborted(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Continue(_) => "continue",
            Self::Reprompt(_) => "reprompt",
            Self::Completed { .. } => "completed",
            Self::Cancelled(_) => "cancelled",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// Result of one step function: the next step, a re-prompt or the end.
#[derive(Debug)]
pub(crate) enum StepResult<S> {
    Advance(S, String),
    Reprompt(String),
    Finish(FlowOutcome),
}

impl<S> StepResult<S> {
    fn map<T>(self, wrap: impl FnOnce(S) -> T) -> StepResult<T> {
        match self {
            Self::Advance(step, prompt) => StepResult::Advance(wrap(step), prompt),
            Self::Reprompt(prompt) => StepResult::Reprompt(prompt),
            Self::Finish(outcome) => StepResult::Finish(outcome),
        }
    }
}

/// Result of opening a flow, after any auto-skipped steps.
#[derive(Debug)]
pub(crate) enum Opening<S> {
    Step(S, String),
    Declined(String),
}

impl<S> Opening<S> {
    fn map<T>(self, wrap: impl FnOnce(S) -> T) -> Opening<T> {
        match self {
            Self::Step(step, prompt) => Opening::Step(wrap(step), prompt),
            Self::Declined(message) => Opening::Declined(message),
        }
    }
}

impl<S> From<StepResult<S>> for Opening<S> {
    fn from(result: StepResult<S>) -> Self {
        match result {
            StepResult::Advance(step, prompt) => Opening::Step(step, prompt),
            StepResult::Reprompt(message) => Opening::Declined(message),
            StepResult::Finish(outcome) => Opening::Declined(outcome.reply().to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowStart {
    Zakat { kind: Option<ZakatKind>, amount: Option<i64> },
    Donation { campaign_id: ProductId, amount: Option<i64> },
    Fidyah,
    Qurban { period_id: Option<PeriodId> },
    QurbanSavings { period_id: Option<PeriodId> },
    QurbanSavingsDeposit,
}

impl FlowStart {
    pub fn kind(&self) -> FlowKind {
        match self {
            Self::Zakat { .. } => FlowKind::Zakat,
            Self::Donation { .. } => FlowKind::Donation,
            Self::Fidyah => FlowKind::Fidyah,
            Self::Qurban { .. } => FlowKind::Qurban,
            Self::QurbanSavings { .. } => FlowKind::QurbanSavings,
            Self::QurbanSavingsDeposit => FlowKind::QurbanSavingsDeposit,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started { kind: FlowKind, prompt: String },
    /// Nothing to start (no active period, unknown campaign, ...); the
    /// message explains why.
    Declined(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowStartError {
    #[error("a {0} flow is already active")]
    AlreadyActive(&'static str),
    #[error("donor must register before starting a flow")]
    NotRegistered,
}

#[derive(Clone)]
pub struct FlowEngine {
    commerce: Commerce,
    settings: Arc<FlowSettings>,
    nisab: Arc<NisabCalculator>,
}

impl FlowEngine {
    pub fn new(commerce: Commerce, settings: FlowSettings, nisab: Arc<NisabCalculator>) -> Self {
        Self { commerce, settings: Arc::new(settings), nisab }
    }

    pub fn commerce(&self) -> &Commerce {
        &self.commerce
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Seeds a new flow into `session` and returns its first prompt.
    pub async fn start(
        &self,
        session: &mut Session,
        request: FlowStart,
    ) -> Result<StartOutcome, FlowStartError> {
        if let Some(active) = &session.flow {
            return Err(FlowStartError::AlreadyActive(active.kind().as_str()));
        }
        if !session.is_registered() {
            return Err(FlowStartError::NotRegistered);
        }

        let donor = session.donor_profile(DEFAULT_DONOR_NAME);
        let ctx = self.context(&donor);
        let kind = request.kind();

        let opening = match request {
            FlowStart::Zakat { kind, amount } => {
                zakat::open(&ctx, kind, amount).await.map(ActiveFlow::Zakat)
            }
            FlowStart::Donation { campaign_id, amount } => {
                donation::open(&ctx, &campaign_id, amount).await.map(ActiveFlow::Donation)
            }
            FlowStart::Fidyah => fidyah::open(&ctx).await.map(ActiveFlow::Fidyah),
            FlowStart::Qurban { period_id } => {
                qurban::open(&ctx, period_id).await.map(ActiveFlow::Qurban)
            }
            FlowStart::QurbanSavings { period_id } => {
                savings::open_plan(&ctx, period_id).await.map(ActiveFlow::QurbanSavings)
            }
            FlowStart::QurbanSavingsDeposit => {
                savings::open_deposit(&ctx).await.map(ActiveFlow::QurbanSavingsDeposit)
            }
        };

        match opening {
            Opening::Step(flow, prompt) => {
                info!(
                    event_name = "flow.started",
                    phone = %session.phone,
                    flow = kind.as_str(),
                    step = flow.step_name(),
                    "flow started"
                );
                session.flow = Some(FlowState::new(flow, Utc::now()));
                Ok(StartOutcome::Started { kind, prompt })
            }
            Opening::Declined(message) => {
                info!(
                    event_name = "flow.start_declined",
                    phone = %session.phone,
                    flow = kind.as_str(),
                    "flow could not start"
                );
                Ok(StartOutcome::Declined(message))
            }
        }
    }

    /// Advances the active flow by exactly one step. Returns `None` when the
    /// session has no active flow.
    pub async fn advance(&self, session: &mut Session, input: &str) -> Option<FlowOutcome> {
        let state = session.flow.take()?;
        let kind = state.kind();
        let step = state.step_name();

        let outcome = self.step(session, state, input).await;
        info!(
            event_name = "flow.step",
            phone = %session.phone,
            flow = kind.as_str(),
            step,
            outcome = outcome.label(),
            "flow advanced"
        );
        Some(outcome)
    }

    async fn step(&self, session: &mut Session, state: FlowState, input: &str) -> FlowOutcome {
        if is_cancel(input) {
            return FlowOutcome::Cancelled(cancelled_message(state.kind()));
        }
        if state.is_confirm_step() && !session.is_registered() {
            return FlowOutcome::Aborted(REGISTER_FIRST.to_string());
        }

        let donor = session.donor_profile(DEFAULT_DONOR_NAME);
        let ctx = self.context(&donor);
        let result = match &state.flow {
            ActiveFlow::Zakat(step) => zakat::advance(step, &ctx, input).await.map(ActiveFlow::Zakat),
            ActiveFlow::Donation(step) => {
                donation::advance(step, &ctx, input).await.map(ActiveFlow::Donation)
            }
            ActiveFlow::Fidyah(step) => {
                fidyah::advance(step, &ctx, input).await.map(ActiveFlow::Fidyah)
            }
            ActiveFlow::Qurban(step) => {
                qurban::advance(step, &ctx, input).await.map(ActiveFlow::Qurban)
            }
            ActiveFlow::QurbanSavings(step) => {
                savings::advance_plan(step, &ctx, input).await.map(ActiveFlow::QurbanSavings)
            }
            ActiveFlow::QurbanSavingsDeposit(step) => savings::advance_deposit(step, &ctx, input)
                .await
                .map(ActiveFlow::QurbanSavingsDeposit),
        };

        match result {
            StepResult::Advance(flow, prompt) => {
                session.flow = Some(FlowState::new(flow, state.started_at));
                FlowOutcome::Continue(prompt)
            }
            StepResult::Reprompt(prompt) => {
                session.flow = Some(state);
                FlowOutcome::Reprompt(prompt)
            }
            StepResult::Finish(outcome) => outcome,
        }
    }

    fn context<'a>(&'a self, donor: &'a DonorProfile) -> FlowContext<'a> {
        FlowContext {
            commerce: &self.commerce,
            settings: &self.settings,
            nisab: &self.nisab,
            donor,
        }
    }
}
