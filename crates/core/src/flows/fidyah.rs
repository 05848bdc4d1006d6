use serde::{Deserialize, Serialize};

use crate::domain::catalog::{FidyahProgram, ProductType};
use crate::domain::transaction::{NewTransaction, TransactionDetails};
use crate::flows::common::{
    beneficiary_line, cancelled_message, confirm_message, create_transaction, lookup_failed,
    on_behalf_prompt, parse_on_behalf, CONFIRM_HINT, ON_BEHALF_INVALID,
};
use crate::flows::engine::{FlowContext, FlowOutcome, Opening, StepResult};
use crate::flows::states::{FlowKind, CONFIRM_STEP};
use crate::money::format_rupiah;
use crate::parsers::{classify_confirmation, parse_count, Confirmation};

const MAX_PERSONS: u32 = 20;
const MAX_DAYS: u32 = 30;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FidyahOrder {
    pub program: FidyahProgram,
    pub daily_rate: i64,
    pub person_count: u32,
    pub day_count: u32,
    pub on_behalf_of: Option<String>,
}

impl FidyahOrder {
    pub fn total(&self) -> i64 {
        i64::from(self.person_count) * i64::from(self.day_count) * self.daily_rate
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum FidyahStep {
    AskPersonCount { program: FidyahProgram, daily_rate: i64 },
    AskDayCount { program: FidyahProgram, daily_rate: i64, person_count: u32 },
    AskOnBehalf { order: FidyahOrder },
    Confirm { order: FidyahOrder },
}

impl FidyahStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AskPersonCount { .. } => "ask_person_count",
            Self::AskDayCount { .. } => "ask_day_count",
            Self::AskOnBehalf { .. } => "ask_on_behalf",
            Self::Confirm { .. } => CONFIRM_STEP,
        }
    }
}

pub(crate) async fn open(ctx: &FlowContext<'_>) -> Opening<FidyahStep> {
    let program = match ctx.commerce.catalog.fidyah_program().await {
        Ok(Some(program)) => program,
        Ok(None) => {
            return Opening::Declined(
                "Maaf, program fidyah belum dibuka saat ini.".to_string(),
            )
        }
        Err(error) => return Opening::Declined(lookup_failed(ctx, FlowKind::Fidyah, &error)),
    };
    let daily_rate = program.daily_rate.unwrap_or(ctx.settings.fidyah_daily_rate);

    let prompt = format!(
        "Fidyah dihitung {} per orang per hari puasa yang ditinggalkan.\n\n\
Untuk berapa orang fidyah ini dibayarkan?",
        format_rupiah(daily_rate)
    );
    Opening::Step(FidyahStep::AskPersonCount { program, daily_rate }, prompt)
}

pub(crate) async fn advance(
    step: &FidyahStep,
    ctx: &FlowContext<'_>,
    input: &str,
) -> StepResult<FidyahStep> {
    match step {
        FidyahStep::AskPersonCount { program, daily_rate } => {
            match parse_count(input, 1, MAX_PERSONS) {
                Some(person_count) => StepResult::Advance(
                    FidyahStep::AskDayCount {
                        program: program.clone(),
                        daily_rate: *daily_rate,
                        person_count,
                    },
                    "Berapa hari puasa yang ditinggalkan (per orang)?".to_string(),
                ),
                None => StepResult::Reprompt(format!(
                    "Mohon balas jumlah orang dengan angka 1-{MAX_PERSONS}, misalnya *1* atau *dua*."
                )),
            }
        }
        FidyahStep::AskDayCount { program, daily_rate, person_count } => {
            match parse_count(input, 1, MAX_DAYS) {
                Some(day_count) => {
                    let order = FidyahOrder {
                        program: program.clone(),
                        daily_rate: *daily_rate,
                        person_count: *person_count,
                        day_count,
                        on_behalf_of: None,
                    };
                    let prompt = format!(
                        "Total fidyah: {} orang x {} hari x {} = *{}*.\n\n{}",
                        person_count,
                        day_count,
                        format_rupiah(*daily_rate),
                        format_rupiah(order.total()),
                        on_behalf_prompt("Fidyah")
                    );
                    StepResult::Advance(FidyahStep::AskOnBehalf { order }, prompt)
                }
                None => StepResult::Reprompt(format!(
                    "Mohon balas jumlah hari dengan angka 1-{MAX_DAYS}, misalnya *7*."
                )),
            }
        }
        FidyahStep::AskOnBehalf { order } => match parse_on_behalf(input) {
            Ok(on_behalf_of) => {
                let order = FidyahOrder { on_behalf_of, ..order.clone() };
                let prompt = confirm_prompt(ctx, &order);
                StepResult::Advance(FidyahStep::Confirm { order }, prompt)
            }
            Err(()) => StepResult::Reprompt(ON_BEHALF_INVALID.to_string()),
        },
        FidyahStep::Confirm { order } => match classify_confirmation(input) {
            Confirmation::Yes => {
                let new = NewTransaction {
                    product_type: ProductType::Fidyah,
                    product_id: order.program.id.clone(),
                    quantity: order.person_count * order.day_count,
                    unit_price: order.daily_rate,
                    admin_fee: 0,
                    donor_name: ctx.donor.name.clone(),
                    donor_email: ctx.donor.email.clone(),
                    donor_phone: ctx.donor.phone.clone(),
                    donatur_id: ctx.donor.id.clone(),
                    details: Some(TransactionDetails::Fidyah {
                        person_count: order.person_count,
                        day_count: order.day_count,
                        on_behalf_of: order.on_behalf_of.clone(),
                    }),
                };
                StepResult::Finish(create_transaction(ctx, FlowKind::Fidyah, new).await)
            }
            Confirmation::No => {
                StepResult::Finish(FlowOutcome::Cancelled(cancelled_message(FlowKind::Fidyah)))
            }
            Confirmation::Unrecognized => StepResult::Reprompt(CONFIRM_HINT.to_string()),
        },
    }
}

fn confirm_prompt(ctx: &FlowContext<'_>, order: &FidyahOrder) -> String {
    let lines = vec![
        format!("Program: {}", order.program.name),
        format!("Jumlah orang: {}", order.person_count),
        format!("Jumlah hari: {}", order.day_count),
        format!("Tarif per hari: {}", format_rupiah(order.daily_rate)),
        format!("*Total fidyah: {}*", format_rupiah(order.total())),
        beneficiary_line(order.on_behalf_of.as_deref(), &ctx.donor.name),
    ];
    confirm_message("Fidyah", &lines)
}
