//! Zakat: pick the kind and program, run the matching calculator, confirm.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{ProductType, ZakatKind, ZakatProgram, ZakatType};
use crate::domain::transaction::{NewTransaction, TransactionDetails};
use crate::flows::common::{
    beneficiary_line, cancelled_message, confirm_message, create_transaction, lookup_failed, numbered,
    on_behalf_prompt, parse_on_behalf, parse_optional_amount, CONFIRM_HINT, ON_BEHALF_INVALID,
};
use crate::flows::engine::{FlowContext, FlowOutcome, Opening, StepResult};
use crate::flows::states::{FlowKind, CONFIRM_STEP};
use crate::money::{apply_rate, format_rupiah};
use crate::parsers::{classify_confirmation, parse_amount, parse_count, select_index, Confirmation};

const MAX_HEADCOUNT: u32 = 50;
const IRRIGATED_RATE: i64 = 5;
const RAIN_FED_RATE: i64 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZakatSelection {
    pub zakat_type: ZakatType,
    pub program: ZakatProgram,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZakatOrder {
    pub selection: ZakatSelection,
    pub quantity: u32,
    pub unit_price: i64,
    pub total: i64,
    /// Calculation lines echoed back in the confirmation message.
    pub basis: Vec<String>,
    pub on_behalf_of: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ZakatStep {
    SelectType { options: Vec<ZakatType>, preset_amount: Option<i64> },
    SelectProgram { zakat_type: ZakatType, options: Vec<ZakatProgram>, preset_amount: Option<i64> },
    AskHeadcount { selection: ZakatSelection },
    AskAssets { selection: ZakatSelection },
    AskDebts { selection: ZakatSelection, assets: i64 },
    AskIncome { selection: ZakatSelection },
    AskHarvest { selection: ZakatSelection },
    AskIrrigation { selection: ZakatSelection, harvest: i64 },
    AskOnBehalf { order: ZakatOrder },
    Confirm { order: ZakatOrder },
}

impl ZakatStep {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SelectType { .. } => "select_type",
            Self::SelectProgram { .. } => "select_program",
            Self::AskHeadcount { .. } => "ask_data_fitrah",
            Self::AskAssets { .. } => "ask_data_assets",
            Self::AskDebts { .. } => "ask_data_debts",
            Self::AskIncome { .. } => "ask_data_income",
            Self::AskHarvest { .. } => "ask_data_harvest",
            Self::AskIrrigation { .. } => "ask_data_irrigation",
            Self::AskOnBehalf { .. } => "ask_on_behalf",
            Self::Confirm { .. } => CONFIRM_STEP,
        }
    }
}

pub(crate) async fn open(
    ctx: &FlowContext<'_>,
    kind: Option<ZakatKind>,
    preset_amount: Option<i64>,
) -> Opening<ZakatStep> {
    let preset_amount = preset_amount.filter(|amount| *amount > 0);
    let types = match ctx.commerce.catalog.zakat_types().await {
        Ok(types) => types,
        Err(error) => return Opening::Declined(lookup_failed(ctx, FlowKind::Zakat, &error)),
    };
    if types.is_empty() {
        return Opening::Declined("Maaf, saat ini belum ada jenis zakat yang tersedia.".to_string());
    }

    match kind {
        Some(kind) => match types.into_iter().find(|zakat_type| zakat_type.kind == kind) {
            Some(zakat_type) => choose_type(ctx, zakat_type, preset_amount).await.into(),
            None => Opening::Declined(format!(
                "Maaf, {} belum tersedia saat ini. Ketik *zakat* untuk melihat jenis zakat lainnya.",
                kind.label()
            )),
        },
        None => {
            let prompt = type_menu(&types);
            Opening::Step(ZakatStep::SelectType { options: types, preset_amount }, prompt)
        }
    }
}

pub(crate) async fn advance(
    step: &ZakatStep,
    ctx: &FlowContext<'_>,
    input: &str,
) -> StepResult<ZakatStep> {
    match step {
        ZakatStep::SelectType { options, preset_amount } => {
            let chosen = select_index(input, options.len()).map(|index| &options[index]).or_else(
                || {
                    let kind = input.parse::<ZakatKind>().ok()?;
                    options.iter().find(|zakat_type| zakat_type.kind == kind)
                },
            );
            match chosen {
                Some(zakat_type) => choose_type(ctx, zakat_type.clone(), *preset_amount).await,
                None => StepResult::Reprompt(format!(
                    "Pilihan tidak dikenali. Balas dengan nomor 1-{}.\n\n{}",
                    options.len(),
                    type_menu(options)
                )),
            }
        }
        ZakatStep::SelectProgram { zakat_type, options, preset_amount } => {
            match select_index(input, options.len()) {
                Some(index) => {
                    let selection = ZakatSelection {
                        zakat_type: zakat_type.clone(),
                        program: options[index].clone(),
                    };
                    begin_calculation(ctx, selection, *preset_amount)
                }
                None => StepResult::Reprompt(format!(
                    "Pilihan tidak dikenali. Balas dengan nomor 1-{}.\n\n{}",
                    options.len(),
                    program_menu(zakat_type, options)
                )),
            }
        }
        ZakatStep::AskHeadcount { selection } => {
            let Some(headcount) = parse_count(input, 1, MAX_HEADCOUNT) else {
                return StepResult::Reprompt(format!(
                    "Mohon balas dengan jumlah jiwa berupa angka 1-{MAX_HEADCOUNT}, misalnya *3*."
                ));
            };
            let Some(per_head) = selection.zakat_type.per_head_amount else {
                return StepResult::Finish(FlowOutcome::Aborted(FITRAH_UNPRICED.to_string()));
            };
            let total = per_head * i64::from(headcount);
            let order = ZakatOrder {
                selection: selection.clone(),
                quantity: headcount,
                unit_price: per_head,
                total,
                basis: vec![
                    format!("Jumlah jiwa: {headcount}"),
                    format!("Besaran per jiwa: {}", format_rupiah(per_head)),
                ],
                on_behalf_of: None,
            };
            let prompt = format!(
                "Total zakat fitrah untuk {headcount} jiwa: *{}*.\n\n{}",
                format_rupiah(total),
                on_behalf_prompt("Zakat fitrah")
            );
            StepResult::Advance(ZakatStep::AskOnBehalf { order }, prompt)
        }
        ZakatStep::AskAssets { selection } => match parse_amount(input) {
            Ok(assets) => StepResult::Advance(
                ZakatStep::AskDebts { selection: selection.clone(), assets },
                debts_prompt(selection.zakat_type.kind),
            ),
            Err(_) => StepResult::Reprompt(amount_retry(&assets_prompt(selection.zakat_type.kind))),
        },
        ZakatStep::AskDebts { selection, assets } => {
            let Some(debts) = parse_optional_amount(input) else {
                return StepResult::Reprompt(amount_retry(&debts_prompt(
                    selection.zakat_type.kind,
                )));
            };
            let net = (*assets - debts).max(0);
            let basis = vec![
                format!("Total harta: {}", format_rupiah(*assets)),
                format!("Utang/kewajiban: {}", format_rupiah(debts)),
                format!("Harta bersih: {}", format_rupiah(net)),
            ];
            finish_wealth(ctx, selection, net, basis).await
        }
        ZakatStep::AskIncome { selection } => match parse_amount(input) {
            Ok(income) => {
                let basis = vec![format!("Penghasilan per bulan: {}", format_rupiah(income))];
                finish_wealth(ctx, selection, income, basis).await
            }
            Err(_) => StepResult::Reprompt(amount_retry(INCOME_PROMPT)),
        },
        ZakatStep::AskHarvest { selection } => match parse_amount(input) {
            Ok(harvest) => StepResult::Advance(
                ZakatStep::AskIrrigation { selection: selection.clone(), harvest },
                IRRIGATION_PROMPT.to_string(),
            ),
            Err(_) => StepResult::Reprompt(amount_retry(HARVEST_PROMPT)),
        },
        ZakatStep::AskIrrigation { selection, harvest } => {
            let rate = match classify_confirmation(input) {
                Confirmation::Yes => IRRIGATED_RATE,
                Confirmation::No => RAIN_FED_RATE,
                Confirmation::Unrecognized => {
                    return StepResult::Reprompt(format!(
                        "Mohon balas *ya* atau *tidak*.\n\n{IRRIGATION_PROMPT}"
                    ))
                }
            };
            let due = apply_rate(*harvest, Decimal::from(rate));
            let basis = vec![
                format!("Hasil panen: {}", format_rupiah(*harvest)),
                format!("Tarif: {rate}%"),
            ];
            due_order(ctx, selection, due, basis)
        }
        ZakatStep::AskOnBehalf { order } => match parse_on_behalf(input) {
            Ok(on_behalf_of) => {
                let order = ZakatOrder { on_behalf_of, ..order.clone() };
                let prompt = confirm_prompt(ctx, &order);
                StepResult::Advance(ZakatStep::Confirm { order }, prompt)
            }
            Err(()) => StepResult::Reprompt(ON_BEHALF_INVALID.to_string()),
        },
        ZakatStep::Confirm { order } => match classify_confirmation(input) {
            Confirmation::Yes => StepResult::Finish(submit(ctx, order).await),
            Confirmation::No => {
                StepResult::Finish(FlowOutcome::Cancelled(cancelled_message(FlowKind::Zakat)))
            }
            Confirmation::Unrecognized => StepResult::Reprompt(CONFIRM_HINT.to_string()),
        },
    }
}

async fn choose_type(
    ctx: &FlowContext<'_>,
    zakat_type: ZakatType,
    preset_amount: Option<i64>,
) -> StepResult<ZakatStep> {
    let mut programs = match ctx.commerce.catalog.zakat_programs(&zakat_type.id).await {
        Ok(programs) => programs,
        Err(error) => {
            return StepResult::Finish(FlowOutcome::Aborted(lookup_failed(
                ctx,
                FlowKind::Zakat,
                &error,
            )))
        }
    };

    match programs.len() {
        0 => StepResult::Finish(FlowOutcome::Aborted(format!(
            "Maaf, belum ada program {} yang aktif saat ini.",
            zakat_type.kind.label()
        ))),
        1 => {
            let program = programs.remove(0);
            begin_calculation(ctx, ZakatSelection { zakat_type, program }, preset_amount)
        }
        _ => {
            let prompt = program_menu(&zakat_type, &programs);
            StepResult::Advance(
                ZakatStep::SelectProgram { zakat_type, options: programs, preset_amount },
                prompt,
            )
        }
    }
}

fn begin_calculation(
    ctx: &FlowContext<'_>,
    selection: ZakatSelection,
    preset_amount: Option<i64>,
) -> StepResult<ZakatStep> {
    let kind = selection.zakat_type.kind;
    if let Some(amount) = preset_amount.filter(|_| kind != ZakatKind::Fitrah) {
        let basis = vec![format!("Nominal zakat: {}", format_rupiah(amount))];
        return due_order(ctx, &selection, amount, basis);
    }

    let header = format!("Program: {}\n\n", selection.program.name);
    match kind {
        ZakatKind::Fitrah => match selection.zakat_type.per_head_amount {
            Some(per_head) => StepResult::Advance(
                ZakatStep::AskHeadcount { selection },
                format!(
                    "{header}Besaran zakat fitrah {} per jiwa. Untuk berapa jiwa zakat fitrah ini ditunaikan?",
                    format_rupiah(per_head)
                ),
            ),
            None => StepResult::Finish(FlowOutcome::Aborted(FITRAH_UNPRICED.to_string())),
        },
        ZakatKind::Maal | ZakatKind::Bisnis | ZakatKind::Peternakan => {
            let prompt = format!("{header}{}", assets_prompt(kind));
            StepResult::Advance(ZakatStep::AskAssets { selection }, prompt)
        }
        ZakatKind::Penghasilan | ZakatKind::Profesi => {
            StepResult::Advance(ZakatStep::AskIncome { selection }, format!("{header}{INCOME_PROMPT}"))
        }
        ZakatKind::Pertanian => {
            StepResult::Advance(ZakatStep::AskHarvest { selection }, format!("{header}{HARVEST_PROMPT}"))
        }
    }
}

/// Nisab gate plus rate for wealth- and income-based kinds.
async fn finish_wealth(
    ctx: &FlowContext<'_>,
    selection: &ZakatSelection,
    wealth: i64,
    mut basis: Vec<String>,
) -> StepResult<ZakatStep> {
    let kind = selection.zakat_type.kind;
    if kind.requires_nisab() {
        let threshold = ctx.nisab.threshold_for(kind).await;
        if wealth < threshold {
            let period = if kind.is_monthly() { " per bulan" } else { "" };
            return StepResult::Finish(FlowOutcome::Aborted(format!(
                "Harta Anda ({}) belum mencapai nisab{period} sebesar {}, \
sehingga Anda belum wajib menunaikan {}. Jika ingin tetap berbagi, \
Anda bisa berinfak atau bersedekah melalui program donasi kami.",
                format_rupiah(wealth),
                format_rupiah(threshold),
                kind.label()
            )));
        }
        basis.push(format!("Nisab: {}", format_rupiah(threshold)));
    }

    let rate = selection.zakat_type.rate_percent;
    basis.push(format!("Tarif: {rate}%"));
    due_order(ctx, selection, apply_rate(wealth, rate), basis)
}

fn due_order(
    ctx: &FlowContext<'_>,
    selection: &ZakatSelection,
    due: i64,
    basis: Vec<String>,
) -> StepResult<ZakatStep> {
    if due <= 0 {
        return StepResult::Finish(FlowOutcome::Aborted(
            "Berdasarkan data yang Anda berikan, tidak ada zakat yang perlu ditunaikan.".to_string(),
        ));
    }
    let order = ZakatOrder {
        selection: selection.clone(),
        quantity: 1,
        unit_price: due,
        total: due,
        basis,
        on_behalf_of: None,
    };
    let prompt = confirm_prompt(ctx, &order);
    StepResult::Advance(ZakatStep::Confirm { order }, prompt)
}

async fn submit(ctx: &FlowContext<'_>, order: &ZakatOrder) -> FlowOutcome {
    let selection = &order.selection;
    let new = NewTransaction {
        product_type: ProductType::Zakat,
        product_id: selection.program.id.clone(),
        quantity: order.quantity,
        unit_price: order.unit_price,
        admin_fee: 0,
        donor_name: ctx.donor.name.clone(),
        donor_email: ctx.donor.email.clone(),
        donor_phone: ctx.donor.phone.clone(),
        donatur_id: ctx.donor.id.clone(),
        details: Some(TransactionDetails::Zakat {
            calculator: selection.zakat_type.kind,
            program_id: selection.program.id.clone(),
            on_behalf_of: order.on_behalf_of.clone(),
        }),
    };
    create_transaction(ctx, FlowKind::Zakat, new).await
}

fn confirm_prompt(ctx: &FlowContext<'_>, order: &ZakatOrder) -> String {
    let mut lines = vec![
        format!("Jenis: {}", order.selection.zakat_type.name),
        format!("Program: {}", order.selection.program.name),
    ];
    lines.extend(order.basis.iter().cloned());
    lines.push(format!("*Total zakat: {}*", format_rupiah(order.total)));
    lines.push(beneficiary_line(order.on_behalf_of.as_deref(), &ctx.donor.name));
    confirm_message("Zakat", &lines)
}

fn type_menu(types: &[ZakatType]) -> String {
    format!(
        "Jenis zakat apa yang ingin Anda tunaikan?\n\n{}\n\nBalas dengan nomor pilihan.",
        numbered(types.iter().map(|zakat_type| zakat_type.name.clone()))
    )
}

fn program_menu(zakat_type: &ZakatType, programs: &[ZakatProgram]) -> String {
    format!(
        "Pilih program penyaluran {}:\n\n{}\n\nBalas dengan nomor pilihan.",
        zakat_type.name,
        numbered(programs.iter().map(|program| program.name.clone()))
    )
}

fn assets_prompt(kind: ZakatKind) -> String {
    match kind {
        ZakatKind::Bisnis => "Berapa total aset usaha Anda (modal berputar, stok barang, kas, \
dan piutang lancar)? Contoh: *150jt*"
            .to_string(),
        ZakatKind::Peternakan => {
            "Berapa total nilai ternak yang Anda miliki saat ini? Contoh: *80jt*".to_string()
        }
        _ => "Berapa total harta Anda yang sudah tersimpan selama satu tahun (tabungan, emas, \
investasi)? Contoh: *120jt*"
            .to_string(),
    }
}

fn debts_prompt(kind: ZakatKind) -> String {
    let subject = if kind == ZakatKind::Bisnis { "utang usaha" } else { "utang" };
    format!("Berapa total {subject} yang jatuh tempo? Balas *0* jika tidak ada.")
}

fn amount_retry(prompt: &str) -> String {
    format!("Nominal tidak dikenali. Tulis angka saja, misalnya *5.000.000* atau *5jt*.\n\n{prompt}")
}

const INCOME_PROMPT: &str =
    "Berapa penghasilan Anda per bulan? Contoh: *8jt* atau *8.500.000*";
const HARVEST_PROMPT: &str = "Berapa nilai hasil panen Anda (dalam rupiah)? Contoh: *20jt*";
const IRRIGATION_PROMPT: &str =
    "Apakah lahan Anda diairi dengan irigasi berbayar? Balas *ya* atau *tidak* (tadah hujan).";
const FITRAH_UNPRICED: &str =
    "Maaf, besaran zakat fitrah belum ditetapkan. Silakan coba beberapa saat lagi.";

#[cfg(test)]
mod tests {
    use super::ZakatStep;
    use crate::domain::catalog::ZakatKind;
    use crate::domain::transaction::TransactionDetails;
    use crate::flows::engine::{FlowOutcome, FlowStart, StartOutcome};
    use crate::flows::states::ActiveFlow;
    use crate::flows::testing::{engine, registered_session, run, FakeCommerce};

    fn zakat(kind: Option<ZakatKind>, amount: Option<i64>) -> FlowStart {
        FlowStart::Zakat { kind, amount }
    }

    #[tokio::test]
    async fn fitrah_for_three_people_creates_one_transaction() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();

        let started = engine
            .start(&mut session, zakat(Some(ZakatKind::Fitrah), None))
            .await
            .expect("start zakat");
        assert!(matches!(started, StartOutcome::Started { .. }));
        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("ask_data_fitrah"));

        let outcomes = run(&engine, &mut session, &["3", "Ahmad", "ya"]).await;

        assert!(outcomes[0].reply().contains("Rp135.000"));
        assert!(matches!(outcomes[2], FlowOutcome::Completed { .. }));
        assert!(session.flow.is_none());

        let created = fake.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].quantity, 3);
        assert_eq!(created[0].unit_price, 45_000);
        assert_eq!(created[0].subtotal(), 135_000);
        assert!(matches!(
            created[0].details,
            Some(TransactionDetails::Zakat { ref on_behalf_of, .. })
                if on_behalf_of.as_deref() == Some("Ahmad")
        ));
    }

    #[tokio::test]
    async fn maal_below_nisab_ends_without_transaction() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, zakat(Some(ZakatKind::Maal), None)).await.expect("start");
        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("select_program"));

        let outcomes = run(&engine, &mut session, &["1", "50jt", "0"]).await;

        assert!(matches!(outcomes[2], FlowOutcome::Aborted(ref text) if text.contains("nisab")));
        assert!(session.flow.is_none());
        assert!(fake.created().is_empty());
    }

    #[tokio::test]
    async fn maal_above_nisab_charges_two_and_a_half_percent_of_net_wealth() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, zakat(Some(ZakatKind::Maal), None)).await.expect("start");

        let outcomes = run(&engine, &mut session, &["2", "120jt", "20jt", "ya"]).await;

        assert!(outcomes[2].reply().contains("Rp2.500.000"));
        let created = fake.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].unit_price, 2_500_000);
        assert_eq!(created[0].quantity, 1);
    }

    #[tokio::test]
    async fn income_uses_monthly_nisab() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, zakat(Some(ZakatKind::Penghasilan), None)).await.expect("start");

        let below = run(&engine, &mut session, &["5jt"]).await;
        assert!(matches!(below[0], FlowOutcome::Aborted(_)));

        engine.start(&mut session, zakat(Some(ZakatKind::Penghasilan), None)).await.expect("start");
        let above = run(&engine, &mut session, &["10jt"]).await;
        assert!(matches!(above[0], FlowOutcome::Continue(ref text) if text.contains("Rp250.000")));
    }

    #[tokio::test]
    async fn agriculture_rate_depends_on_irrigation() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, zakat(Some(ZakatKind::Pertanian), None)).await.expect("start");

        let outcomes = run(&engine, &mut session, &["20jt", "tidak"]).await;

        assert!(outcomes[1].reply().contains("Rp2.000.000"));
        assert!(matches!(
            session.flow.as_ref().map(|state| &state.flow),
            Some(ActiveFlow::Zakat(ZakatStep::Confirm { order })) if order.total == 2_000_000
        ));
    }

    #[tokio::test]
    async fn preset_amount_goes_straight_to_confirm() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();

        engine
            .start(&mut session, zakat(Some(ZakatKind::Penghasilan), Some(300_000)))
            .await
            .expect("start");

        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("confirm"));
    }

    #[tokio::test]
    async fn type_menu_accepts_number_or_name() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, zakat(None, None)).await.expect("start");
        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("select_type"));

        let invalid = run(&engine, &mut session, &["99"]).await;
        assert!(matches!(invalid[0], FlowOutcome::Reprompt(_)));
        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("select_type"));

        run(&engine, &mut session, &["fitrah"]).await;
        assert_eq!(session.flow.as_ref().map(|state| state.step_name()), Some("ask_data_fitrah"));
    }

    #[tokio::test]
    async fn invalid_headcount_leaves_state_untouched() {
        let fake = FakeCommerce::new();
        let engine = engine(&fake);
        let mut session = registered_session();
        engine.start(&mut session, zakat(Some(ZakatKind::Fitrah), None)).await.expect("start");
        let before = session.flow.clone();

        let outcomes = run(&engine, &mut session, &["banyak sekali"]).await;

        assert!(matches!(outcomes[0], FlowOutcome::Reprompt(_)));
        assert_eq!(session.flow, before);
    }

    #[tokio::test]
    async fn cancel_works_from_every_zakat_step() {
        let paths: &[&[&str]] = &[
            &[],
            &["1"],
            &["1", "2"],
            &["1", "2", "Ahmad"],
            &["2"],
            &["2", "2"],
            &["2", "2", "120jt"],
            &["2", "2", "120jt", "0"],
            &["3"],
            &["5"],
            &["5", "20jt"],
        ];

        for path in paths {
            let fake = FakeCommerce::new();
            let engine = engine(&fake);
            let mut session = registered_session();
            engine.start(&mut session, zakat(None, None)).await.expect("start");
            run(&engine, &mut session, path).await;
            assert!(session.flow.is_some(), "path {path:?} should leave a flow active");

            let outcome = engine.advance(&mut session, "batal").await.expect("flow active");

            assert!(matches!(outcome, FlowOutcome::Cancelled(_)), "path {path:?}");
            assert!(session.flow.is_none());
            assert!(fake.created().is_empty());
        }
    }
}
