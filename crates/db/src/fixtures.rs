use std::collections::HashSet;

use serde::Deserialize;
use thiserror::Error;

use amanah_core::commerce::{CatalogFacade, DonorDirectory, PaymentDirectory};
use amanah_core::domain::catalog::{
    Campaign, FidyahProgram, PackageType, QurbanPackage, QurbanPeriod, ZakatKind, ZakatProgram,
    ZakatType,
};
use amanah_core::domain::donor::Donor;
use amanah_core::domain::payment::{BankAccount, QrisDetail};

use crate::memory::InMemoryCommerce;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to decode demo catalog: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Demo catalog bundled with the binaries so the engine runs without a backend.
#[derive(Clone, Debug, Deserialize)]
pub struct DemoCatalog {
    pub zakat_types: Vec<ZakatType>,
    pub zakat_programs: Vec<ZakatProgram>,
    pub campaigns: Vec<Campaign>,
    pub fidyah_program: Option<FidyahProgram>,
    pub qurban_periods: Vec<QurbanPeriod>,
    pub qurban_packages: Vec<QurbanPackage>,
    pub bank_accounts: Vec<BankAccount>,
    pub qris: Option<QrisDetail>,
    #[serde(default)]
    pub donors: Vec<Donor>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub zakat_types: usize,
    pub zakat_programs: usize,
    pub campaigns: usize,
    pub qurban_packages: usize,
    pub donors: usize,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(String, bool)>,
}

impl DemoCatalog {
    pub const JSON: &'static str = include_str!("../../../config/fixtures/demo_catalog.json");

    pub fn bundled() -> Result<Self, SeedError> {
        Self::from_json(Self::JSON)
    }

    pub fn from_json(raw: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Copies every record into the in-memory stores.
    pub async fn load(self, store: &InMemoryCommerce) -> SeedResult {
        let result = SeedResult {
            zakat_types: self.zakat_types.len(),
            zakat_programs: self.zakat_programs.len(),
            campaigns: self.campaigns.len(),
            qurban_packages: self.qurban_packages.len(),
            donors: self.donors.len(),
        };

        for zakat_type in self.zakat_types {
            store.catalog.add_zakat_type(zakat_type).await;
        }
        for program in self.zakat_programs {
            store.catalog.add_zakat_program(program).await;
        }
        for campaign in self.campaigns {
            store.catalog.add_campaign(campaign).await;
        }
        if let Some(program) = self.fidyah_program {
            store.catalog.set_fidyah_program(program).await;
        }
        for period in self.qurban_periods {
            store.catalog.add_qurban_period(period).await;
        }
        for package in self.qurban_packages {
            store.catalog.add_qurban_package(package).await;
        }
        for account in self.bank_accounts {
            store.payments.add_bank_account(account).await;
        }
        if let Some(qris) = self.qris {
            store.payments.set_qris(qris).await;
        }
        for donor in self.donors {
            store.donors.insert(donor).await;
        }

        tracing::info!(
            event_name = "seed.loaded",
            zakat_types = result.zakat_types,
            campaigns = result.campaigns,
            qurban_packages = result.qurban_packages,
            "demo catalog loaded"
        );
        result
    }

    /// Cross-reference checks over the catalog itself.
    pub fn verify(&self) -> VerificationResult {
        let mut checks = Vec::new();

        let type_ids: HashSet<&str> =
            self.zakat_types.iter().map(|zakat_type| zakat_type.id.0.as_str()).collect();
        for program in &self.zakat_programs {
            checks.push((
                format!("zakat-program:{}:type", program.id),
                type_ids.contains(program.zakat_type_id.0.as_str()),
            ));
        }
        for zakat_type in &self.zakat_types {
            let has_program =
                self.zakat_programs.iter().any(|program| program.zakat_type_id == zakat_type.id);
            checks.push((format!("zakat-type:{}:program", zakat_type.id), has_program));
            if zakat_type.kind == ZakatKind::Fitrah {
                checks.push((
                    format!("zakat-type:{}:per-head", zakat_type.id),
                    zakat_type.per_head_amount.is_some_and(|amount| amount > 0),
                ));
            }
        }

        let period_ids: HashSet<&str> =
            self.qurban_periods.iter().map(|period| period.id.0.as_str()).collect();
        for package in &self.qurban_packages {
            checks.push((
                format!("qurban-package:{}:period", package.id),
                period_ids.contains(package.period_id.0.as_str()),
            ));
            let slots_ok = match package.package_type {
                PackageType::Shared => {
                    package.max_slots > 1 && package.slots_available <= package.max_slots
                }
                PackageType::Individual => package.max_slots == 1,
            };
            checks.push((format!("qurban-package:{}:slots", package.id), slots_ok));
            checks.push((format!("qurban-package:{}:price", package.id), package.price > 0));
        }

        checks.push((
            "fidyah-rate".to_string(),
            self.fidyah_program
                .as_ref()
                .is_some_and(|program| program.daily_rate.map_or(true, |rate| rate > 0)),
        ));
        checks.push((
            "payment-channel".to_string(),
            !self.bank_accounts.is_empty() || self.qris.is_some(),
        ));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        VerificationResult { all_present, checks }
    }
}

/// Confirms the stores answer for what was seeded.
pub async fn verify_loaded(
    store: &InMemoryCommerce,
    catalog: &DemoCatalog,
) -> VerificationResult {
    let mut checks = Vec::new();

    let types = store.catalog.zakat_types().await.unwrap_or_default();
    checks.push(("zakat-types".to_string(), types.len() == catalog.zakat_types.len()));

    for campaign in &catalog.campaigns {
        let found = store.catalog.find_campaign(&campaign.id).await.ok().flatten();
        checks.push((format!("campaign:{}", campaign.id), found.is_some()));
    }
    for period in &catalog.qurban_periods {
        let expected =
            catalog.qurban_packages.iter().filter(|package| package.period_id == period.id).count();
        let loaded = store.catalog.qurban_packages(&period.id).await.unwrap_or_default();
        checks.push((format!("qurban-period:{}:packages", period.id.0), loaded.len() == expected));
    }
    for donor in &catalog.donors {
        let found = store.donors.find_by_phone(&donor.phone).await.ok().flatten();
        checks.push((format!("donor:{}", donor.id.0), found.is_some()));
    }
    let accounts = store.payments.bank_accounts().await.unwrap_or_default();
    checks.push(("bank-accounts".to_string(), accounts.len() == catalog.bank_accounts.len()));

    let all_present = checks.iter().all(|(_, ok)| *ok);
    VerificationResult { all_present, checks }
}
