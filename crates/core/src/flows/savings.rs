//! Qurban savings: opening an installment plan and depositing into one.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::catalog::{PeriodId, ProductId, ProductType, QurbanPackage, QurbanPeriod};
use crate::domain::savings::{NewSavingsPlan, SavingsFrequency, SavingsPlan};
use crate::domain::transaction::{NewTransaction, TransactionDetails};
use crate::flows::common::{
    cancelled_message, confirm_message, create_transaction, lookup_failed, numbered,
    CONFIRM_HINT, REGISTER_FIRST, TRANSACTION_FAILED,
};
use crate::flows::engine::{FlowContext, FlowOutcome, Opening, StepResult};
use crate::flows::qurban::{
    active_periods, admin_fee_per_unit, available_packages, invalid_choice, package_menu,
    period_menu, preselect_period,
};
use crate::flows::states::{FlowKind, CONFIRM_STEP};
use crate::money::{ceil_div, format_rupiah};
use crate::parsers::{classify_confirmation, parse_amount, parse_count, select_index, Confirmation};

const WEEKDAYS: [&str; 7] = ["senin", "selasa", "rabu", "kamis", "jumat", "sabtu", "minggu"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsDraft {
    pub period: QurbanPeriod,
    pub package: QurbanPackage,
    pub target_amount: i64,
    pub frequency: SavingsFrequency,
    pub installment_count: u32,
    pub installment_amount: i64,
    pub installment_day: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum SavingsOpenStep {
    SelectPeriod {
        options: Vec<QurbanPeriod>,
    },
    SelectPackage {
        period: QurbanPeriod,
        options: Vec<QurbanPackage>,
    },
    AskFrequency {
        period: QurbanPeriod,
        package: QurbanPackage,
    },
    AskInstallmentCount {
        period: QurbanPeriod,
        package: QurbanPackage,
        frequency: SavingsFrequency,
    },
    AskInstallmentDay {
        period: QurbanPeriod,
        package: QurbanPackage,
        frequency: SavingsFrequency,
        installment_count: u32,
    },
    Confirm {
        draft: SavingsDraft,
    },
}

impl SavingsOpenStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectPeriod { .. } => "select_period",
            Self::SelectPackage { .. } => "select_package",
            Self::AskFrequency { .. } => "ask_frequency",
            Self::AskInstallmentCount { .. } => "ask_installment_count",
            Self::AskInstallmentDay { .. } => "ask_installment_day",
            Self::Confirm { .. } => CONFIRM_STEP,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum SavingsDepositStep {
    SelectSavings { options: Vec<SavingsPlan> },
    AskAmount { plan: SavingsPlan },
}

impl SavingsDepositStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectSavings { .. } => "select_savings",
            Self::AskAmount { .. } => "ask_amount",
        }
    }
}

pub(crate) async fn open_plan(
    ctx: &FlowContext<'_>,
    period_id: Option<PeriodId>,
) -> Opening<SavingsOpenStep> {
    let periods = match active_periods(ctx, FlowKind::QurbanSavings).await {
        Ok(periods) => periods,
        Err(message) => return Opening::Declined(message),
    };

    match preselect_period(&periods, period_id.as_ref()) {
        Some(period) => enter_packages(ctx, period).await.into(),
        None => {
            let prompt = period_menu(&periods);
            Opening::Step(SavingsOpenStep::SelectPeriod { options: periods }, prompt)
        }
    }
}

pub(crate) async fn advance_plan(
    step: &SavingsOpenStep,
    ctx: &FlowContext<'_>,
    input: &str,
) -> StepResult<SavingsOpenStep> {
    match step {
        SavingsOpenStep::SelectPeriod { options } => match select_index(input, options.len()) {
            Some(index) => enter_packages(ctx, options[index].clone()).await,
            None => StepResult::Reprompt(invalid_choice(options.len(), &period_menu(options))),
        },
        SavingsOpenStep::SelectPackage { period, options } => {
            match select_index(input, options.len()) {
                Some(index) => StepResult::Advance(
                    SavingsOpenStep::AskFrequency {
                        period: period.clone(),
                        package: options[index].clone(),
                    },
                    FREQUENCY_PROMPT.to_string(),
                ),
                None => StepResult::Reprompt(invalid_choice(
                    options.len(),
                    &package_menu(period, options, ctx.settings),
                )),
            }
        }
        SavingsOpenStep::AskFrequency { period, package } => match parse_frequency(input) {
            Some(frequency) => StepResult::Advance(
                SavingsOpenStep::AskInstallmentCount {
                    period: period.clone(),
                    package: package.clone(),
                    frequency,
                },
                installment_count_prompt(frequency),
            ),
            None => StepResult::Reprompt(format!("Pilihan tidak dikenali.\n\n{FREQUENCY_PROMPT}")),
        },
        SavingsOpenStep::AskInstallmentCount { period, package, frequency } => {
            let options = frequency.installment_options();
            let count = parse_count(input, 1, u32::MAX).filter(|count| options.contains(count));
            match count {
                Some(installment_count) => StepResult::Advance(
                    SavingsOpenStep::AskInstallmentDay {
                        period: period.clone(),
                        package: package.clone(),
                        frequency: *frequency,
                        installment_count,
                    },
                    installment_day_prompt(*frequency),
                ),
                None => StepResult::Reprompt(installment_count_prompt(*frequency)),
            }
        }
        SavingsOpenStep::AskInstallmentDay { period, package, frequency, installment_count } => {
            let Some(installment_day) = parse_installment_day(input, *frequency) else {
                return StepResult::Reprompt(installment_day_prompt(*frequency));
            };
            let target_amount = package.price + admin_fee_per_unit(package, ctx.settings);
            let draft = SavingsDraft {
                period: period.clone(),
                package: package.clone(),
                target_amount,
                frequency: *frequency,
                installment_count: *installment_count,
                installment_amount: ceil_div(target_amount, i64::from(*installment_count)),
                installment_day,
            };
            let prompt = confirm_prompt(&draft);
            StepResult::Advance(SavingsOpenStep::Confirm { draft }, prompt)
        }
        SavingsOpenStep::Confirm { draft } => match classify_confirmation(input) {
            Confirmation::Yes => StepResult::Finish(submit_plan(ctx, draft).await),
            Confirmation::No => StepResult::Finish(FlowOutcome::Cancelled(cancelled_message(
                FlowKind::QurbanSavings,
            ))),
            Confirmation::Unrecognized => StepResult::Reprompt(CONFIRM_HINT.to_string()),
        },
    }
}

async fn enter_packages(
    ctx: &FlowContext<'_>,
    period: QurbanPeriod,
) -> StepResult<SavingsOpenStep> {
    match available_packages(ctx, FlowKind::QurbanSavings, &period).await {
        Ok(options) => {
            let prompt = format!(
                "{}\n\nHarga paket akan dicicil sesuai jadwal yang Anda pilih.",
                package_menu(&period, &options, ctx.settings)
            );
            StepResult::Advance(SavingsOpenStep::SelectPackage { period, options }, prompt)
        }
        Err(message) => StepResult::Finish(FlowOutcome::Aborted(message)),
    }
}

async fn submit_plan(ctx: &FlowContext<'_>, draft: &SavingsDraft) -> FlowOutcome {
    let Some(donor_id) = ctx.donor.id.clone() else {
        return FlowOutcome::Aborted(REGISTER_FIRST.to_string());
    };
    let new = NewSavingsPlan {
        donor_id,
        donor_name: ctx.donor.name.clone(),
        donor_phone: ctx.donor.phone.clone(),
        period_id: draft.period.id.clone(),
        package_id: draft.package.id.clone(),
        package_type: draft.package.package_type,
        target_amount: draft.target_amount,
        frequency: draft.frequency,
        installment_count: draft.installment_count,
        installment_amount: draft.installment_amount,
        installment_day: draft.installment_day,
    };

    match ctx.commerce.savings.open_plan(new).await {
        Ok(plan) => FlowOutcome::Completed {
            reply: format!(
                "Alhamdulillah, tabungan qurban Anda sudah dibuka.\n\n\
No. tabungan: *{}*\nPaket: {}\nTarget: {}\nSetoran {}: {} x {}, {}.\n\n\
Ketik *setor tabungan qurban* kapan saja untuk melakukan setoran.",
                plan.savings_number,
                plan.package_name,
                format_rupiah(plan.target_amount),
                plan.frequency.label(),
                plan.installment_count,
                format_rupiah(plan.installment_amount),
                schedule_label(plan.frequency, plan.installment_day)
            ),
            transaction_number: None,
        },
        Err(source) => {
            error!(
                event_name = "flow.savings_open_failed",
                phone = %ctx.donor.phone,
                error = %source,
                "opening savings plan failed"
            );
            FlowOutcome::Aborted(TRANSACTION_FAILED.to_string())
        }
    }
}

pub(crate) async fn open_deposit(ctx: &FlowContext<'_>) -> Opening<SavingsDepositStep> {
    let Some(donor_id) = ctx.donor.id.as_ref() else {
        return Opening::Declined(REGISTER_FIRST.to_string());
    };
    let mut plans = match ctx.commerce.savings.active_plans(donor_id).await {
        Ok(plans) => plans.into_iter().filter(|plan| plan.remaining() > 0).collect::<Vec<_>>(),
        Err(error) => {
            return Opening::Declined(lookup_failed(ctx, FlowKind::QurbanSavingsDeposit, &error))
        }
    };

    match plans.len() {
        0 => Opening::Declined(
            "Anda belum memiliki tabungan qurban aktif. Ketik *buka tabungan qurban* untuk \
memulai."
                .to_string(),
        ),
        1 => {
            let plan = plans.remove(0);
            let prompt = amount_prompt(ctx, &plan);
            Opening::Step(SavingsDepositStep::AskAmount { plan }, prompt)
        }
        _ => {
            let prompt = savings_menu(&plans);
            Opening::Step(SavingsDepositStep::SelectSavings { options: plans }, prompt)
        }
    }
}

pub(crate) async fn advance_deposit(
    step: &SavingsDepositStep,
    ctx: &FlowContext<'_>,
    input: &str,
) -> StepResult<SavingsDepositStep> {
    match step {
        SavingsDepositStep::SelectSavings { options } => match select_index(input, options.len()) {
            Some(index) => {
                let plan = options[index].clone();
                let prompt = amount_prompt(ctx, &plan);
                StepResult::Advance(SavingsDepositStep::AskAmount { plan }, prompt)
            }
            None => StepResult::Reprompt(invalid_choice(options.len(), &savings_menu(options))),
        },
        SavingsDepositStep::AskAmount { plan } => {
            let amount = match classify_confirmation(input) {
                Confirmation::Yes => plan.suggested_deposit(),
                Confirmation::No => {
                    return StepResult::Finish(FlowOutcome::Cancelled(cancelled_message(
                        FlowKind::QurbanSavingsDeposit,
                    )))
                }
                Confirmation::Unrecognized => match parse_amount(input) {
                    Ok(amount) => amount,
                    Err(_) => {
                        return StepResult::Reprompt(format!(
                            "Nominal tidak dikenali.\n\n{}",
                            amount_prompt(ctx, plan)
                        ))
                    }
                },
            };

            let remaining = plan.remaining();
            if amount > remaining {
                return StepResult::Reprompt(format!(
                    "Nominal melebihi sisa tabungan Anda ({}). Silakan masukkan nominal yang lebih kecil.",
                    format_rupiah(remaining)
                ));
            }
            if amount < ctx.settings.min_savings_deposit && amount != remaining {
                return StepResult::Reprompt(format!(
                    "Mohon maaf, minimal setoran adalah {}.",
                    format_rupiah(ctx.settings.min_savings_deposit)
                ));
            }

            let new = NewTransaction {
                product_type: ProductType::QurbanSavings,
                product_id: ProductId(plan.id.0.clone()),
                quantity: 1,
                unit_price: amount,
                admin_fee: 0,
                donor_name: ctx.donor.name.clone(),
                donor_email: ctx.donor.email.clone(),
                donor_phone: ctx.donor.phone.clone(),
                donatur_id: ctx.donor.id.clone(),
                details: Some(TransactionDetails::SavingsDeposit { savings_id: plan.id.clone() }),
            };
            StepResult::Finish(create_transaction(ctx, FlowKind::QurbanSavingsDeposit, new).await)
        }
    }
}

fn parse_frequency(input: &str) -> Option<SavingsFrequency> {
    let text = input.trim().to_lowercase();
    if text == "1" || text.contains("bulan") || text == "monthly" {
        Some(SavingsFrequency::Monthly)
    } else if text == "2" || text.contains("minggu") || text == "weekly" {
        Some(SavingsFrequency::Weekly)
    } else {
        None
    }
}

fn parse_installment_day(input: &str, frequency: SavingsFrequency) -> Option<u32> {
    let max = frequency.max_installment_day();
    if let Some(day) = parse_count(input, 1, max) {
        return Some(day);
    }
    if frequency == SavingsFrequency::Weekly {
        let text = input.trim().to_lowercase();
        let text = text.strip_prefix("hari").unwrap_or(&text).trim();
        let text = if text == "jum'at" { "jumat" } else { text };
        return WEEKDAYS.iter().position(|day| *day == text).map(|index| index as u32 + 1);
    }
    None
}

fn schedule_label(frequency: SavingsFrequency, day: u32) -> String {
    match frequency {
        SavingsFrequency::Monthly => format!("setiap tanggal {day}"),
        SavingsFrequency::Weekly => {
            let name = WEEKDAYS.get(day.saturating_sub(1) as usize).copied().unwrap_or("senin");
            format!("setiap hari {name}")
        }
    }
}

fn installment_count_prompt(frequency: SavingsFrequency) -> String {
    let options = frequency
        .installment_options()
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("Mau dicicil berapa kali setoran {}? Pilihan: {options}.", frequency.label())
}

fn installment_day_prompt(frequency: SavingsFrequency) -> String {
    match frequency {
        SavingsFrequency::Monthly => {
            "Setiap tanggal berapa Anda ingin menyetor? Balas angka 1-28.".to_string()
        }
        SavingsFrequency::Weekly => {
            "Setiap hari apa Anda ingin menyetor? Balas 1-7 (1 = Senin, 7 = Minggu) atau nama harinya."
                .to_string()
        }
    }
}

fn confirm_prompt(draft: &SavingsDraft) -> String {
    let lines = vec![
        format!("Periode: {}", draft.period.name),
        format!("Paket: {}", draft.package.name),
        format!("Target tabungan (termasuk biaya admin): {}", format_rupiah(draft.target_amount)),
        format!(
            "Setoran {}: {} x *{}*",
            draft.frequency.label(),
            draft.installment_count,
            format_rupiah(draft.installment_amount)
        ),
        format!("Jadwal: {}", schedule_label(draft.frequency, draft.installment_day)),
    ];
    confirm_message("Tabungan Qurban", &lines)
}

fn amount_prompt(ctx: &FlowContext<'_>, plan: &SavingsPlan) -> String {
    format!(
        "Tabungan *{}* ({})\nTerkumpul: {} dari {}\nSisa: {}\n\n\
Balas *ya* untuk menyetor {} atau ketik nominal lain (minimal {}).",
        plan.savings_number,
        plan.package_name,
        format_rupiah(plan.collected_amount),
        format_rupiah(plan.target_amount),
        format_rupiah(plan.remaining()),
        format_rupiah(plan.suggested_deposit()),
        format_rupiah(ctx.settings.min_savings_deposit)
    )
}

fn savings_menu(plans: &[SavingsPlan]) -> String {
    format!(
        "Anda memiliki beberapa tabungan qurban aktif:\n\n{}\n\nBalas dengan nomor tabungan yang ingin disetor.",
        numbered(plans.iter().map(|plan| {
            format!(
                "{} - {} (sisa {})",
                plan.savings_number,
                plan.package_name,
                format_rupiah(plan.remaining())
            )
        }))
    )
}

const FREQUENCY_PROMPT: &str =
    "Pilih frekuensi setoran:\n\n1. Bulanan\n2. Mingguan\n\nBalas dengan nomor pilihan.";
