use serde::{Deserialize, Serialize};

use crate::domain::catalog::{Campaign, ProductId, ProductType};
use crate::domain::transaction::{NewTransaction, TransactionDetails};
use crate::flows::common::{
    cancelled_message, confirm_message, create_transaction, lookup_failed, CONFIRM_HINT,
};
use crate::flows::engine::{FlowContext, FlowOutcome, Opening, StepResult};
use crate::flows::states::{FlowKind, CONFIRM_STEP};
use crate::money::format_rupiah;
use crate::parsers::{classify_confirmation, parse_amount, Confirmation};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum DonationStep {
    AskAmount { campaign: Campaign },
    Confirm { campaign: Campaign, amount: i64 },
}

impl DonationStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AskAmount { .. } => "ask_amount",
            Self::Confirm { .. } => CONFIRM_STEP,
        }
    }
}

pub(crate) async fn open(
    ctx: &FlowContext<'_>,
    campaign_id: &ProductId,
    preset_amount: Option<i64>,
) -> Opening<DonationStep> {
    let campaign = match ctx.commerce.catalog.find_campaign(campaign_id).await {
        Ok(Some(campaign)) => campaign,
        Ok(None) => {
            return Opening::Declined(
                "Maaf, program donasi tersebut tidak ditemukan. Silakan cari program lain."
                    .to_string(),
            )
        }
        Err(error) => return Opening::Declined(lookup_failed(ctx, FlowKind::Donation, &error)),
    };

    match preset_amount {
        Some(amount) if amount >= ctx.settings.min_donation => {
            let prompt = confirm_prompt(ctx, &campaign, amount);
            Opening::Step(DonationStep::Confirm { campaign, amount }, prompt)
        }
        Some(_) => {
            let prompt = format!("{}\n\n{}", below_minimum(ctx), amount_prompt(&campaign));
            Opening::Step(DonationStep::AskAmount { campaign }, prompt)
        }
        None => {
            let prompt = amount_prompt(&campaign);
            Opening::Step(DonationStep::AskAmount { campaign }, prompt)
        }
    }
}

pub(crate) async fn advance(
    step: &DonationStep,
    ctx: &FlowContext<'_>,
    input: &str,
) -> StepResult<DonationStep> {
    match step {
        DonationStep::AskAmount { campaign } => match parse_amount(input) {
            Ok(amount) if amount >= ctx.settings.min_donation => {
                let prompt = confirm_prompt(ctx, campaign, amount);
                StepResult::Advance(DonationStep::Confirm { campaign: campaign.clone(), amount }, prompt)
            }
            Ok(_) => StepResult::Reprompt(below_minimum(ctx)),
            Err(_) => StepResult::Reprompt(
                "Nominal tidak dikenali. Tulis angka saja, misalnya *100.000* atau *100rb*."
                    .to_string(),
            ),
        },
        DonationStep::Confirm { campaign, amount } => match classify_confirmation(input) {
            Confirmation::Yes => {
                let new = NewTransaction {
                    product_type: ProductType::Campaign,
                    product_id: campaign.id.clone(),
                    quantity: 1,
                    unit_price: *amount,
                    admin_fee: 0,
                    donor_name: ctx.donor.name.clone(),
                    donor_email: ctx.donor.email.clone(),
                    donor_phone: ctx.donor.phone.clone(),
                    donatur_id: ctx.donor.id.clone(),
                    details: Some(TransactionDetails::Donation),
                };
                StepResult::Finish(create_transaction(ctx, FlowKind::Donation, new).await)
            }
            Confirmation::No => {
                StepResult::Finish(FlowOutcome::Cancelled(cancelled_message(FlowKind::Donation)))
            }
            Confirmation::Unrecognized => StepResult::Reprompt(CONFIRM_HINT.to_string()),
        },
    }
}

fn amount_prompt(campaign: &Campaign) -> String {
    format!(
        "Program: *{}*\n\nBerapa nominal donasi yang ingin Anda berikan? Contoh: *100rb* atau *250.000*",
        campaign.title
    )
}

fn below_minimum(ctx: &FlowContext<'_>) -> String {
    format!(
        "Mohon maaf, minimal donasi adalah {}. Silakan masukkan nominal yang lebih besar.",
        format_rupiah(ctx.settings.min_donation)
    )
}

fn confirm_prompt(ctx: &FlowContext<'_>, campaign: &Campaign, amount: i64) -> String {
    let lines = vec![
        format!("Program: {}", campaign.title),
        format!("Donatur: {}", ctx.donor.name),
        format!("*Nominal donasi: {}*", format_rupiah(amount)),
    ];
    confirm_message("Donasi", &lines)
}

#[cfg(test)]
mod tests {
    use crate::domain::catalog::ProductId;
    use crate::flows::engine::{FlowOutcome, FlowStart, StartOutcome};
    use crate::flows::testing::{engine, registered_session, run, FakeCommerce, CAMPAIGN_ID};

    fn donation(amount: Option<i64>) -> FlowStart {
        FlowStart::Donation { campaign_id: ProductId(CAMPAIGN_ID.to_string()), amount }
    }

    #[tokio::test]
    async fn amount_below_minimum_reprompts_without_advancing() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, donation(None)).await.expect("start donation");

        let outcomes = run(&engine, &mut session, &["5000"]).await;

        assert!(matches!(outcomes[0], FlowOutcome::Reprompt(ref text) if text.contains("Rp10.000")));
        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("ask_amount"));
    }

    #[tokio::test]
    async fn donation_with_amount_creates_transaction_on_yes() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, donation(None)).await.expect("start donation");

        let outcomes = run(&engine, &mut session, &["100rb", "ok"]).await;

        assert!(matches!(outcomes[1], FlowOutcome::Completed { .. }));
        assert_eq!(fake.created()[0].unit_price, 100_000);
    }

    #[tokio::test]
    async fn preset_amount_skips_the_amount_question() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();

        engine.start(&mut session, donation(Some(50_000))).await.expect("start donation");

        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("confirm"));
    }

    #[tokio::test]
    async fn unknown_campaign_is_declined() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        let request =
            FlowStart::Donation { campaign_id: ProductId("tidak-ada".to_string()), amount: None };

        let outcome = engine.start(&mut session, request).await.expect("start donation");

        assert!(matches!(outcome, StartOutcome::Declined(_)));
        assert!(session.flow.is_none());
    }

    #[tokio::test]
    async fn failed_creation_clears_flow_and_reports_once() {
        let fake = FakeCommerce::new();
        fake.fail_creation();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, donation(Some(50_000))).await.expect("start donation");

        let outcomes = run(&engine, &mut session, &["ya"]).await;

        assert!(matches!(outcomes[0], FlowOutcome::Aborted(ref text) if text.contains("gagal")));
        assert!(session.flow.is_none());
    }

    #[tokio::test]
    async fn cancel_works_from_every_donation_step() {
        for path in [&[][..], &["100rb"][..]] {
            let fake = FakeCommerce::new();
            let engine = engine(&fake);
            let mut session = registered_session();
            engine.start(&mut session, donation(None)).await.expect("start donation");
            run(&engine, &mut session, path).await;

            let outcome = engine.advance(&mut session, "batal").await.expect("flow active");

            assert!(matches!(outcome, FlowOutcome::Cancelled(_)));
            assert!(session.flow.is_none());
            assert!(fake.created().is_empty());
        }
    }
}
