//! Direct qurban orders, plus the period/package lookups the savings flow shares.

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::domain::catalog::{PeriodId, ProductType, QurbanPackage, QurbanPeriod};
use crate::domain::transaction::{NewTransaction, TransactionDetails};
use crate::flows::common::{
    beneficiary_line, cancelled_message, confirm_message, create_transaction, lookup_failed,
    numbered, on_behalf_prompt, parse_on_behalf, CONFIRM_HINT, ON_BEHALF_INVALID,
    TRANSACTION_FAILED,
};
use crate::flows::engine::{FlowContext, FlowOutcome, FlowSettings, Opening, StepResult};
use crate::flows::states::{FlowKind, CONFIRM_STEP};
use crate::money::{ceil_div, format_rupiah};
use crate::parsers::{classify_confirmation, parse_count, select_index, Confirmation};

const MAX_QUANTITY: u32 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QurbanOrder {
    pub period: QurbanPeriod,
    pub package: QurbanPackage,
    pub quantity: u32,
    /// Charged once per unit.
    pub admin_fee: i64,
    pub on_behalf_of: Option<String>,
}

impl QurbanOrder {
    pub fn total(&self) -> i64 {
        let quantity = i64::from(self.quantity);
        self.package.price * quantity + self.admin_fee * quantity
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum QurbanStep {
    SelectPeriod { options: Vec<QurbanPeriod> },
    SelectPackage { period: QurbanPeriod, options: Vec<QurbanPackage> },
    AskQuantity { period: QurbanPeriod, package: QurbanPackage },
    AskOnBehalf { order: QurbanOrder },
    Confirm { order: QurbanOrder },
}

impl QurbanStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectPeriod { .. } => "select_period",
            Self::SelectPackage { .. } => "select_package",
            Self::AskQuantity { .. } => "ask_quantity",
            Self::AskOnBehalf { .. } => "ask_on_behalf",
            Self::Confirm { .. } => CONFIRM_STEP,
        }
    }
}

pub(crate) async fn open(ctx: &FlowContext<'_>, period_id: Option<PeriodId>) -> Opening<QurbanStep> {
    let periods = match active_periods(ctx, FlowKind::Qurban).await {
        Ok(periods) => periods,
        Err(message) => return Opening::Declined(message),
    };

    match preselect_period(&periods, period_id.as_ref()) {
        Some(period) => enter_packages(ctx, period).await.into(),
        None => {
            let prompt = period_menu(&periods);
            Opening::Step(QurbanStep::SelectPeriod { options: periods }, prompt)
        }
    }
}

pub(crate) async fn advance(
    step: &QurbanStep,
    ctx: &FlowContext<'_>,
    input: &str,
) -> StepResult<QurbanStep> {
    match step {
        QurbanStep::SelectPeriod { options } => match select_index(input, options.len()) {
            Some(index) => enter_packages(ctx, options[index].clone()).await,
            None => StepResult::Reprompt(invalid_choice(options.len(), &period_menu(options))),
        },
        QurbanStep::SelectPackage { period, options } => match select_index(input, options.len()) {
            Some(index) => choose_package(ctx, period, &options[index]),
            None => StepResult::Reprompt(invalid_choice(
                options.len(),
                &package_menu(period, options, ctx.settings),
            )),
        },
        QurbanStep::AskQuantity { period, package } => {
            let max = package.stock.min(MAX_QUANTITY).max(1);
            match parse_count(input, 1, max) {
                Some(quantity) => {
                    let order = QurbanOrder {
                        period: period.clone(),
                        package: package.clone(),
                        quantity,
                        admin_fee: admin_fee_per_unit(package, ctx.settings),
                        on_behalf_of: None,
                    };
                    let prompt = on_behalf_prompt("Qurban");
                    StepResult::Advance(QurbanStep::AskOnBehalf { order }, prompt)
                }
                None => StepResult::Reprompt(format!(
                    "Mohon balas jumlah hewan dengan angka 1-{max}."
                )),
            }
        }
        QurbanStep::AskOnBehalf { order } => match parse_on_behalf(input) {
            Ok(on_behalf_of) => {
                let order = QurbanOrder { on_behalf_of, ..order.clone() };
                let prompt = confirm_prompt(ctx, &order);
                StepResult::Advance(QurbanStep::Confirm { order }, prompt)
            }
            Err(()) => StepResult::Reprompt(ON_BEHALF_INVALID.to_string()),
        },
        QurbanStep::Confirm { order } => match classify_confirmation(input) {
            Confirmation::Yes => submit(ctx, order).await,
            Confirmation::No => {
                StepResult::Finish(FlowOutcome::Cancelled(cancelled_message(FlowKind::Qurban)))
            }
            Confirmation::Unrecognized => StepResult::Reprompt(CONFIRM_HINT.to_string()),
        },
    }
}

fn choose_package(
    ctx: &FlowContext<'_>,
    period: &QurbanPeriod,
    package: &QurbanPackage,
) -> StepResult<QurbanStep> {
    if package.is_shared() {
        let order = QurbanOrder {
            period: period.clone(),
            package: package.clone(),
            quantity: 1,
            admin_fee: admin_fee_per_unit(package, ctx.settings),
            on_behalf_of: None,
        };
        let prompt = format!(
            "Anda memilih 1 slot {} (patungan).\n\n{}",
            package.name,
            on_behalf_prompt("Qurban")
        );
        return StepResult::Advance(QurbanStep::AskOnBehalf { order }, prompt);
    }

    let max = package.stock.min(MAX_QUANTITY);
    StepResult::Advance(
        QurbanStep::AskQuantity { period: period.clone(), package: package.clone() },
        format!("Berapa ekor {} yang ingin Anda qurbankan? (maksimal {max})", package.animal),
    )
}

/// Charges the price the donor confirmed. A package repriced since the
/// summary was shown goes back to `confirm` with the new total.
async fn submit(ctx: &FlowContext<'_>, order: &QurbanOrder) -> StepResult<QurbanStep> {
    let package = &order.package;
    let lookup = ctx.commerce.transactions.get_product(ProductType::Qurban, &package.id).await;
    let current_price = match lookup {
        Ok(Some(product)) => product.price.unwrap_or(package.price),
        Ok(None) => {
            return StepResult::Finish(FlowOutcome::Aborted(
                "Maaf, paket qurban yang Anda pilih sudah tidak tersedia. Silakan mulai lagi."
                    .to_string(),
            ))
        }
        Err(source) => {
            error!(
                event_name = "flow.product_lookup_failed",
                phone = %ctx.donor.phone,
                package = %package.id,
                error = %source,
                "qurban package price lookup failed"
            );
            return StepResult::Finish(FlowOutcome::Aborted(TRANSACTION_FAILED.to_string()));
        }
    };

    if current_price != package.price {
        info!(
            event_name = "flow.price_changed",
            phone = %ctx.donor.phone,
            package = %package.id,
            confirmed = package.price,
            current = current_price,
            "qurban package repriced before confirmation"
        );
        let order = QurbanOrder {
            package: QurbanPackage { price: current_price, ..package.clone() },
            ..order.clone()
        };
        let prompt = format!(
            "Harga {} baru saja berubah dari {} menjadi {}. Mohon periksa kembali.\n\n{}",
            package.name,
            format_rupiah(package.price),
            format_rupiah(current_price),
            confirm_prompt(ctx, &order)
        );
        return StepResult::Advance(QurbanStep::Confirm { order }, prompt);
    }

    let new = NewTransaction {
        product_type: ProductType::Qurban,
        product_id: package.id.clone(),
        quantity: order.quantity,
        unit_price: package.price,
        admin_fee: order.admin_fee,
        donor_name: ctx.donor.name.clone(),
        donor_email: ctx.donor.email.clone(),
        donor_phone: ctx.donor.phone.clone(),
        donatur_id: ctx.donor.id.clone(),
        details: Some(TransactionDetails::Qurban {
            period_id: order.period.id.clone(),
            package_type: package.package_type,
            on_behalf_of: order.on_behalf_of.clone(),
        }),
    };
    StepResult::Finish(create_transaction(ctx, FlowKind::Qurban, new).await)
}

fn confirm_prompt(ctx: &FlowContext<'_>, order: &QurbanOrder) -> String {
    let package = &order.package;
    let mut lines = vec![
        format!("Periode: {}", order.period.name),
        format!("Paket: {}", package.name),
    ];
    if package.is_shared() {
        lines.push("Jenis: patungan (1 slot)".to_string());
    } else {
        lines.push(format!("Jumlah: {} ekor x {}", order.quantity, format_rupiah(package.price)));
    }
    lines.push(format!(
        "Biaya admin: {}",
        format_rupiah(order.admin_fee * i64::from(order.quantity))
    ));
    lines.push(format!("*Total: {}*", format_rupiah(order.total())));
    lines.push(beneficiary_line(order.on_behalf_of.as_deref(), &ctx.donor.name));
    confirm_message("Qurban", &lines)
}

async fn enter_packages(ctx: &FlowContext<'_>, period: QurbanPeriod) -> StepResult<QurbanStep> {
    match available_packages(ctx, FlowKind::Qurban, &period).await {
        Ok(options) => {
            let prompt = package_menu(&period, &options, ctx.settings);
            StepResult::Advance(QurbanStep::SelectPackage { period, options }, prompt)
        }
        Err(message) => StepResult::Finish(FlowOutcome::Aborted(message)),
    }
}

/// Per-unit admin fee: the full base fee for an individual animal, the base
/// fee split across the slots (rounded up) for a shared one.
pub fn admin_fee_per_unit(package: &QurbanPackage, settings: &FlowSettings) -> i64 {
    if package.is_shared() && package.max_slots > 0 {
        ceil_div(settings.qurban_admin_fee, i64::from(package.max_slots))
    } else {
        settings.qurban_admin_fee
    }
}

pub(crate) async fn active_periods(
    ctx: &FlowContext<'_>,
    kind: FlowKind,
) -> Result<Vec<QurbanPeriod>, String> {
    match ctx.commerce.catalog.active_qurban_periods().await {
        Ok(periods) if periods.is_empty() => {
            Err("Maaf, saat ini belum ada periode qurban yang dibuka.".to_string())
        }
        Ok(periods) => Ok(periods),
        Err(error) => Err(lookup_failed(ctx, kind, &error)),
    }
}

pub(crate) async fn available_packages(
    ctx: &FlowContext<'_>,
    kind: FlowKind,
    period: &QurbanPeriod,
) -> Result<Vec<QurbanPackage>, String> {
    match ctx.commerce.catalog.qurban_packages(&period.id).await {
        Ok(packages) => {
            let available: Vec<QurbanPackage> =
                packages.into_iter().filter(QurbanPackage::is_available).collect();
            if available.is_empty() {
                Err(format!("Maaf, semua paket qurban untuk {} sudah habis.", period.name))
            } else {
                Ok(available)
            }
        }
        Err(error) => Err(lookup_failed(ctx, kind, &error)),
    }
}

/// The requested period if it is active, else the only active one.
pub(crate) fn preselect_period(
    periods: &[QurbanPeriod],
    requested: Option<&PeriodId>,
) -> Option<QurbanPeriod> {
    requested
        .and_then(|id| periods.iter().find(|period| &period.id == id))
        .or_else(|| if periods.len() == 1 { periods.first() } else { None })
        .cloned()
}

pub(crate) fn period_menu(periods: &[QurbanPeriod]) -> String {
    format!(
        "Pilih periode qurban:\n\n{}\n\nBalas dengan nomor pilihan.",
        numbered(periods.iter().map(|period| period.name.clone()))
    )
}

pub(crate) fn package_menu(
    period: &QurbanPeriod,
    packages: &[QurbanPackage],
    settings: &FlowSettings,
) -> String {
    let items = packages.iter().map(|package| {
        if package.is_shared() {
            format!(
                "{} - {} per slot + admin {} (sisa {} slot)",
                package.name,
                format_rupiah(package.price),
                format_rupiah(admin_fee_per_unit(package, settings)),
                package.slots_available
            )
        } else {
            format!(
                "{} - {} + admin {} (stok {})",
                package.name,
                format_rupiah(package.price),
                format_rupiah(admin_fee_per_unit(package, settings)),
                package.stock
            )
        }
    });
    format!(
        "Paket qurban {}:\n\n{}\n\nBalas dengan nomor paket yang Anda pilih.",
        period.name,
        numbered(items)
    )
}

pub(crate) fn invalid_choice(len: usize, menu: &str) -> String {
    format!("Pilihan tidak dikenali. Balas dengan nomor 1-{len}.\n\n{menu}")
}

#[cfg(test)]
mod tests {
    use super::{admin_fee_per_unit, QurbanStep};
    use crate::flows::engine::{FlowOutcome, FlowSettings, FlowStart, StartOutcome};
    use crate::flows::states::ActiveFlow;
    use crate::flows::testing::{
        engine, registered_session, run, second_period, shared_package, FakeCommerce,
    };

    fn qurban() -> FlowStart {
        FlowStart::Qurban { period_id: None }
    }

    #[test]
    fn shared_admin_fee_is_split_across_slots_rounded_up() {
        let settings = FlowSettings { qurban_admin_fee: 100_000, ..FlowSettings::default() };
        assert_eq!(admin_fee_per_unit(&shared_package(), &settings), 14_286);
    }

    #[tokio::test]
    async fn single_active_period_is_selected_automatically() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();

        engine.start(&mut session, qurban()).await.expect("start qurban");

        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("select_package"));
        let Some(ActiveFlow::Qurban(QurbanStep::SelectPackage { options, .. })) =
            session.flow.as_ref().map(|state| &state.flow)
        else {
            panic!("expected package selection");
        };
        assert_eq!(options.len(), 2, "sold-out packages are filtered");
    }

    #[tokio::test]
    async fn several_periods_ask_for_a_choice() {
        let fake = FakeCommerce::new();
        fake.push_period(second_period());
        let engine = engine(&fake);
        let mut session = registered_session();

        engine.start(&mut session, qurban()).await.expect("start qurban");
        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("select_period"));

        run(&engine, &mut session, &["1"]).await;
        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("select_package"));
    }

    #[tokio::test]
    async fn shared_package_skips_quantity_and_fixes_one_slot() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, qurban()).await.expect("start qurban");

        run(&engine, &mut session, &["2"]).await;

        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("ask_on_behalf"));
        assert!(matches!(
            session.flow.as_ref().map(|state| &state.flow),
            Some(ActiveFlow::Qurban(QurbanStep::AskOnBehalf { order })) if order.quantity == 1
        ));

        run(&engine, &mut session, &["Keluarga Hasan", "ya"]).await;
        let created = fake.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].quantity, 1);
        assert_eq!(created[0].admin_fee, 14_286);
        assert_eq!(created[0].subtotal(), 3_500_000 + 14_286);
    }

    #[tokio::test]
    async fn individual_package_charges_admin_fee_per_animal() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, qurban()).await.expect("start qurban");

        let outcomes = run(&engine, &mut session, &["1", "2", "saya", "ya"]).await;

        assert!(matches!(outcomes[3], FlowOutcome::Completed { .. }));
        let created = fake.created();
        assert_eq!(created[0].quantity, 2);
        assert_eq!(created[0].subtotal(), 2 * 2_800_000 + 2 * 100_000);
    }

    #[tokio::test]
    async fn repriced_package_is_confirmed_again_before_charging() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, qurban()).await.expect("start qurban");
        run(&engine, &mut session, &["1", "1", "saya"]).await;
        fake.reprice_packages(3_000_000);

        let outcomes = run(&engine, &mut session, &["ya"]).await;

        let FlowOutcome::Continue(prompt) = &outcomes[0] else {
            panic!("expected a fresh confirmation, got {:?}", outcomes[0]);
        };
        assert!(prompt.contains("Rp2.800.000"));
        assert!(prompt.contains("Rp3.100.000"), "{prompt}");
        assert!(fake.created().is_empty());
        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("confirm"));

        let outcomes = run(&engine, &mut session, &["ya"]).await;

        assert!(matches!(outcomes[0], FlowOutcome::Completed { .. }));
        let created = fake.created();
        assert_eq!(created[0].unit_price, 3_000_000);
        assert_eq!(created[0].subtotal(), 3_000_000 + 100_000);
    }

    #[tokio::test]
    async fn quantity_above_stock_reprompts() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, qurban()).await.expect("start qurban");

        let outcomes = run(&engine, &mut session, &["1", "9"]).await;

        assert!(matches!(outcomes[1], FlowOutcome::Reprompt(_)));
        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("ask_quantity"));
    }

    #[tokio::test]
    async fn no_active_period_declines_the_start() {
        let fake = FakeCommerce::new();
        fake.clear_periods();
        let engine = engine(&fake);
        let mut session = registered_session();

        let outcome = engine.start(&mut session, qurban()).await.expect("start qurban");

        assert!(matches!(outcome, StartOutcome::Declined(ref text) if text.contains("periode")));
        assert!(session.flow.is_none());
    }

    #[tokio::test]
    async fn cancel_works_from_every_qurban_step() {
        let paths: [&[&str]; 6] =
            [&[], &[], &["1"], &["1", "1"], &["1", "1", "saya"], &["2", "saya"]];
        for (index, path) in paths.iter().enumerate() {
            let fake = FakeCommerce::new();
            if index == 1 {
                fake.push_period(second_period());
            }
            let engine = engine(&fake);
            let mut session = registered_session();
            engine.start(&mut session, qurban()).await.expect("start qurban");
            run(&engine, &mut session, path).await;
            assert!(session.flow.is_some());

            let outcome = engine.advance(&mut session, "batal").await.expect("flow active");

            assert!(matches!(outcome, FlowOutcome::Cancelled(_)));
            assert!(session.flow.is_none());
            assert!(fake.created().is_empty());
        }
    }
}
