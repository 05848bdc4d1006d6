//! In-process commerce fake for flow tests.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use crate::commerce::{
    CatalogFacade, Commerce, DonorDirectory, PaymentDirectory, SavingsFacade, TransactionFacade,
};
use crate::domain::catalog::{
    Campaign, FidyahProgram, PackageType, PeriodId, ProductId, ProductSummary, ProductType,
    QurbanPackage, QurbanPeriod, ZakatKind, ZakatProgram, ZakatType,
};
use crate::domain::donor::{Donor, DonorId, NewDonor};
use crate::domain::payment::{BankAccount, ImageAttachment, ProofReceipt, ProofStatus, QrisDetail};
use crate::domain::savings::{
    NewSavingsPlan, SavingsFrequency, SavingsId, SavingsPlan, SavingsStatus,
};
use crate::domain::transaction::{NewTransaction, Transaction, TransactionId, TransactionStatus};
use crate::errors::FacadeError;
use crate::flows::engine::{FlowEngine, FlowOutcome, FlowSettings};
use crate::nisab::NisabCalculator;
use crate::session::Session;

pub const CAMPAIGN_ID: &str = "masjid-al-ikhlas";
pub const FIDYAH_RATE: i64 = 60_000;
pub const DONOR_ID: &str = "donor-1";

#[derive(Default)]
struct State {
    periods: Vec<QurbanPeriod>,
    plans: Vec<SavingsPlan>,
    created: Vec<NewTransaction>,
    opened: Vec<NewSavingsPlan>,
    fail_creation: bool,
    price_override: Option<i64>,
}

#[derive(Clone)]
pub struct FakeCommerce {
    state: Arc<Mutex<State>>,
}

impl FakeCommerce {
    pub fn new() -> Self {
        let state = State {
            periods: vec![period("1447", "Qurban 1447 H")],
            plans: vec![savings_plan("plan-1", "TQ-0001", 1_200_000)],
            ..State::default()
        };
        Self { state: Arc::new(Mutex::new(state)) }
    }

    pub fn commerce(&self) -> Commerce {
        let shared = Arc::new(self.clone());
        Commerce {
            transactions: shared.clone(),
            catalog: shared.clone(),
            savings: shared.clone(),
            donors: shared.clone(),
            payments: shared,
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().expect("fake state lock");
        f(&mut state)
    }

    pub fn created(&self) -> Vec<NewTransaction> {
        self.with(|state| state.created.clone())
    }

    pub fn opened_plans(&self) -> Vec<NewSavingsPlan> {
        self.with(|state| state.opened.clone())
    }

    pub fn fail_creation(&self) {
        self.with(|state| state.fail_creation = true);
    }

    /// Makes `get_product` report `price` for every qurban package.
    pub fn reprice_packages(&self, price: i64) {
        self.with(|state| state.price_override = Some(price));
    }

    pub fn push_period(&self, period: QurbanPeriod) {
        self.with(|state| state.periods.push(period));
    }

    pub fn clear_periods(&self) {
        self.with(|state| state.periods.clear());
    }

    pub fn push_plan(&self, plan: SavingsPlan) {
        self.with(|state| state.plans.push(plan));
    }

    pub fn clear_plans(&self) {
        self.with(|state| state.plans.clear());
    }
}

pub fn engine(fake: &FakeCommerce) -> FlowEngine {
    let settings = FlowSettings {
        min_donation: 10_000,
        min_savings_deposit: 10_000,
        qurban_admin_fee: 100_000,
        fidyah_daily_rate: 45_000,
    };
    FlowEngine::new(
        fake.commerce(),
        settings,
        Arc::new(NisabCalculator::fixed(Decimal::new(85, 0), 1_000_000)),
    )
}

pub fn registered_session() -> Session {
    let mut session = Session::new("6281200000001", 20, Instant::now());
    session.remember_donor(&Donor {
        id: DonorId(DONOR_ID.to_string()),
        name: "Fulan".to_string(),
        phone: "6281200000001".to_string(),
        email: None,
    });
    session
}

pub async fn run(engine: &FlowEngine, session: &mut Session, inputs: &[&str]) -> Vec<FlowOutcome> {
    let mut outcomes = Vec::with_capacity(inputs.len());
    for input in inputs {
        outcomes.push(engine.advance(session, input).await.expect("flow should be active"));
    }
    outcomes
}

fn period(id: &str, name: &str) -> QurbanPeriod {
    QurbanPeriod {
        id: PeriodId(id.to_string()),
        name: name.to_string(),
        hijri_year: 1447,
        slaughter_date: None,
    }
}

pub fn second_period() -> QurbanPeriod {
    period("1447-b", "Qurban 1447 H (Gelombang 2)")
}

pub fn shared_package() -> QurbanPackage {
    QurbanPackage {
        id: ProductId("sapi-patungan".to_string()),
        period_id: PeriodId("1447".to_string()),
        name: "Sapi Patungan 1/7".to_string(),
        animal: "sapi".to_string(),
        package_type: PackageType::Shared,
        price: 3_500_000,
        stock: 0,
        max_slots: 7,
        slots_available: 3,
    }
}

fn packages(period_id: &PeriodId) -> Vec<QurbanPackage> {
    vec![
        QurbanPackage {
            id: ProductId("kambing-a".to_string()),
            period_id: period_id.clone(),
            name: "Kambing Tipe A".to_string(),
            animal: "kambing".to_string(),
            package_type: PackageType::Individual,
            price: 2_800_000,
            stock: 5,
            max_slots: 1,
            slots_available: 0,
        },
        QurbanPackage { period_id: period_id.clone(), ..shared_package() },
        QurbanPackage {
            id: ProductId("domba-b".to_string()),
            period_id: period_id.clone(),
            name: "Domba Tipe B".to_string(),
            animal: "domba".to_string(),
            package_type: PackageType::Individual,
            price: 2_400_000,
            stock: 0,
            max_slots: 1,
            slots_available: 0,
        },
    ]
}

pub fn savings_plan(id: &str, number: &str, collected: i64) -> SavingsPlan {
    SavingsPlan {
        id: SavingsId(id.to_string()),
        savings_number: number.to_string(),
        donor_id: DonorId(DONOR_ID.to_string()),
        period_id: PeriodId("1447".to_string()),
        package_id: ProductId("kambing-a".to_string()),
        package_name: "Kambing Tipe A".to_string(),
        target_amount: 3_000_000,
        collected_amount: collected,
        frequency: SavingsFrequency::Monthly,
        installment_count: 5,
        installment_amount: 600_000,
        installment_day: 5,
        status: SavingsStatus::Active,
        created_at: Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).single().unwrap_or_else(Utc::now),
    }
}

fn zakat_type(id: &str, kind: ZakatKind, per_head: Option<i64>) -> ZakatType {
    ZakatType {
        id: ProductId(id.to_string()),
        name: kind.label().to_string(),
        kind,
        rate_percent: Decimal::new(25, 1),
        per_head_amount: per_head,
    }
}

fn program(id: &str, type_id: &str, name: &str) -> ZakatProgram {
    ZakatProgram {
        id: ProductId(id.to_string()),
        zakat_type_id: ProductId(type_id.to_string()),
        name: name.to_string(),
        description: String::new(),
    }
}

#[async_trait]
impl TransactionFacade for FakeCommerce {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, FacadeError> {
        self.with(|state| {
            if state.fail_creation {
                return Err(FacadeError::Unavailable("database offline".to_string()));
            }
            state.created.push(new.clone());
            let number = format!("TRX-{:04}", state.created.len());
            Ok(Transaction {
                id: TransactionId(number.clone()),
                transaction_number: number,
                product_type: new.product_type,
                product_id: new.product_id.clone(),
                product_name: new.product_id.0.clone(),
                quantity: new.quantity,
                unit_price: new.unit_price,
                admin_fee: new.admin_fee,
                unique_code: 0,
                total_amount: new.subtotal(),
                status: TransactionStatus::Pending,
                donor_phone: new.donor_phone.clone(),
                created_at: Utc::now(),
            })
        })
    }

    async fn find_by_number(&self, _number: &str) -> Result<Option<Transaction>, FacadeError> {
        Ok(None)
    }

    async fn list_for_phone(
        &self,
        _phone: &str,
        _limit: usize,
    ) -> Result<Vec<Transaction>, FacadeError> {
        Ok(Vec::new())
    }

    async fn get_product(
        &self,
        product_type: ProductType,
        id: &ProductId,
    ) -> Result<Option<ProductSummary>, FacadeError> {
        if product_type != ProductType::Qurban {
            return Ok(None);
        }
        let package = packages(&PeriodId("1447".to_string())).into_iter().find(|p| &p.id == id);
        let price_override = self.with(|state| state.price_override);
        Ok(package.map(|package| ProductSummary {
            name: package.name,
            price: Some(price_override.unwrap_or(package.price)),
        }))
    }
}

#[async_trait]
impl CatalogFacade for FakeCommerce {
    async fn search_campaigns(&self, _query: &str) -> Result<Vec<Campaign>, FacadeError> {
        Ok(Vec::new())
    }

    async fn find_campaign(&self, id: &ProductId) -> Result<Option<Campaign>, FacadeError> {
        Ok((id.0 == CAMPAIGN_ID).then(|| Campaign {
            id: id.clone(),
            title: "Pembangunan Masjid Al-Ikhlas".to_string(),
            description: String::new(),
            target_amount: Some(500_000_000),
            collected_amount: 120_000_000,
            end_date: None,
        }))
    }

    async fn zakat_types(&self) -> Result<Vec<ZakatType>, FacadeError> {
        Ok(vec![
            zakat_type("zt-fitrah", ZakatKind::Fitrah, Some(45_000)),
            zakat_type("zt-maal", ZakatKind::Maal, None),
            zakat_type("zt-penghasilan", ZakatKind::Penghasilan, None),
            zakat_type("zt-bisnis", ZakatKind::Bisnis, None),
            zakat_type("zt-pertanian", ZakatKind::Pertanian, None),
        ])
    }

    async fn zakat_programs(&self, zakat_type: &ProductId) -> Result<Vec<ZakatProgram>, FacadeError> {
        let programs = match zakat_type.0.as_str() {
            "zt-fitrah" => vec![program("zp-fitrah", "zt-fitrah", "Zakat Fitrah Nasional")],
            "zt-maal" => vec![
                program("zp-maal-umum", "zt-maal", "Zakat Maal Umum"),
                program("zp-maal-yatim", "zt-maal", "Zakat Maal untuk Yatim"),
            ],
            other => vec![program(&format!("zp-{other}"), other, "Penyaluran Umum")],
        };
        Ok(programs)
    }

    async fn fidyah_program(&self) -> Result<Option<FidyahProgram>, FacadeError> {
        Ok(Some(FidyahProgram {
            id: ProductId("fidyah-ramadhan".to_string()),
            name: "Fidyah Ramadhan".to_string(),
            daily_rate: Some(FIDYAH_RATE),
        }))
    }

    async fn active_qurban_periods(&self) -> Result<Vec<QurbanPeriod>, FacadeError> {
        Ok(self.with(|state| state.periods.clone()))
    }

    async fn qurban_packages(&self, period: &PeriodId) -> Result<Vec<QurbanPackage>, FacadeError> {
        Ok(packages(period))
    }
}

#[async_trait]
impl SavingsFacade for FakeCommerce {
    async fn active_plans(&self, donor: &DonorId) -> Result<Vec<SavingsPlan>, FacadeError> {
        Ok(self.with(|state| {
            state.plans.iter().filter(|plan| &plan.donor_id == donor).cloned().collect()
        }))
    }

    async fn find_plan(&self, id: &SavingsId) -> Result<Option<SavingsPlan>, FacadeError> {
        Ok(self.with(|state| state.plans.iter().find(|plan| &plan.id == id).cloned()))
    }

    async fn open_plan(&self, new: NewSavingsPlan) -> Result<SavingsPlan, FacadeError> {
        self.with(|state| {
            state.opened.push(new.clone());
            let mut plan = savings_plan("plan-new", "TQ-9999", 0);
            plan.target_amount = new.target_amount;
            plan.installment_amount = new.installment_amount;
            plan.installment_count = new.installment_count;
            plan.installment_day = new.installment_day;
            plan.frequency = new.frequency;
            Ok(plan)
        })
    }
}

#[async_trait]
impl DonorDirectory for FakeCommerce {
    async fn find_by_phone(&self, _phone: &str) -> Result<Option<Donor>, FacadeError> {
        Ok(None)
    }

    async fn register(&self, new: NewDonor) -> Result<Donor, FacadeError> {
        Ok(Donor { id: DonorId(DONOR_ID.to_string()), name: new.name, phone: new.phone, email: new.email })
    }
}

#[async_trait]
impl PaymentDirectory for FakeCommerce {
    async fn bank_accounts(&self) -> Result<Vec<BankAccount>, FacadeError> {
        Ok(Vec::new())
    }

    async fn qris(&self) -> Result<Option<QrisDetail>, FacadeError> {
        Ok(None)
    }

    async fn submit_proof(
        &self,
        transaction_number: &str,
        _proof: &ImageAttachment,
    ) -> Result<ProofReceipt, FacadeError> {
        Ok(ProofReceipt {
            transaction_number: transaction_number.to_string(),
            status: ProofStatus::AwaitingVerification,
        })
    }
}
