use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use tokio::sync::RwLock;

use amanah_core::commerce::SavingsFacade;
use amanah_core::domain::donor::DonorId;
use amanah_core::domain::savings::{NewSavingsPlan, SavingsId, SavingsPlan, SavingsStatus};
use amanah_core::errors::FacadeError;

use super::catalog::InMemoryCatalog;

#[derive(Default)]
struct SavingsData {
    plans: HashMap<String, SavingsPlan>,
    sequence: u64,
}

pub struct InMemorySavings {
    catalog: Arc<InMemoryCatalog>,
    data: RwLock<SavingsData>,
}

impl InMemorySavings {
    pub fn new(catalog: Arc<InMemoryCatalog>) -> Self {
        Self { catalog, data: RwLock::new(SavingsData::default()) }
    }

    pub async fn insert(&self, plan: SavingsPlan) {
        self.data.write().await.plans.insert(plan.id.0.clone(), plan);
    }

    /// Credits a paid deposit; the plan completes once the target is reached.
    pub async fn record_deposit(
        &self,
        id: &SavingsId,
        amount: i64,
    ) -> Result<SavingsPlan, FacadeError> {
        let mut data = self.data.write().await;
        let plan = data
            .plans
            .get_mut(&id.0)
            .ok_or_else(|| FacadeError::NotFound { entity: "savings plan", id: id.0.clone() })?;
        if plan.status != SavingsStatus::Active {
            return Err(FacadeError::Rejected(format!(
                "savings `{}` is no longer active",
                plan.savings_number
            )));
        }

        plan.collected_amount += amount;
        if plan.collected_amount >= plan.target_amount {
            plan.status = SavingsStatus::Completed;
        }
        tracing::info!(
            event_name = "savings.deposit_recorded",
            savings_id = %plan.id.0,
            amount,
            collected = plan.collected_amount,
            "savings deposit recorded"
        );
        Ok(plan.clone())
    }
}

#[async_trait]
impl SavingsFacade for InMemorySavings {
    async fn active_plans(&self, donor: &DonorId) -> Result<Vec<SavingsPlan>, FacadeError> {
        let data = self.data.read().await;
        let mut plans: Vec<SavingsPlan> = data
            .plans
            .values()
            .filter(|plan| &plan.donor_id == donor && plan.status == SavingsStatus::Active)
            .cloned()
            .collect();
        plans.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(plans)
    }

    async fn find_plan(&self, id: &SavingsId) -> Result<Option<SavingsPlan>, FacadeError> {
        Ok(self.data.read().await.plans.get(&id.0).cloned())
    }

    async fn open_plan(&self, new: NewSavingsPlan) -> Result<SavingsPlan, FacadeError> {
        if new.target_amount <= 0 || new.installment_count == 0 {
            return Err(FacadeError::Rejected(
                "savings target and installments must be positive".to_string(),
            ));
        }
        if new.installment_day == 0 || new.installment_day > new.frequency.max_installment_day() {
            return Err(FacadeError::Rejected(format!(
                "installment day {} is out of range",
                new.installment_day
            )));
        }

        let package = self.catalog.qurban_package(&new.package_id).await.ok_or_else(|| {
            FacadeError::NotFound { entity: "qurban package", id: new.package_id.0.clone() }
        })?;

        let mut data = self.data.write().await;
        data.sequence += 1;
        let now = Utc::now();
        let plan = SavingsPlan {
            id: SavingsId(format!("sv-{:05}", data.sequence)),
            savings_number: format!("TQ-{}{:04}", now.year(), data.sequence),
            donor_id: new.donor_id,
            period_id: new.period_id,
            package_id: new.package_id,
            package_name: package.name,
            target_amount: new.target_amount,
            collected_amount: 0,
            frequency: new.frequency,
            installment_count: new.installment_count,
            installment_amount: new.installment_amount,
            installment_day: new.installment_day,
            status: SavingsStatus::Active,
            created_at: now,
        };
        data.plans.insert(plan.id.0.clone(), plan.clone());
        tracing::info!(
            event_name = "savings.opened",
            savings_id = %plan.id.0,
            target = plan.target_amount,
            "savings plan opened"
        );
        Ok(plan)
    }
}
