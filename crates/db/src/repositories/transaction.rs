use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use amanah_core::commerce::{CatalogFacade, SavingsFacade, TransactionFacade};
use amanah_core::domain::catalog::{ProductId, ProductSummary, ProductType};
use amanah_core::domain::savings::SavingsId;
use amanah_core::domain::transaction::{
    NewTransaction, Transaction, TransactionDetails, TransactionId, TransactionStatus,
};
use amanah_core::errors::FacadeError;

use super::catalog::InMemoryCatalog;
use super::savings::InMemorySavings;

/// Bank transfers get a three-digit code added to the total so payments can be matched.
const UNIQUE_CODE_BASE: i64 = 100;
const UNIQUE_CODE_SPAN: u64 = 900;

struct StoredTransaction {
    transaction: Transaction,
    details: Option<TransactionDetails>,
}

#[derive(Default)]
struct TransactionData {
    records: Vec<StoredTransaction>,
    sequence: u64,
}

pub struct InMemoryTransactions {
    catalog: Arc<InMemoryCatalog>,
    savings: Arc<InMemorySavings>,
    data: RwLock<TransactionData>,
}

impl InMemoryTransactions {
    pub fn new(catalog: Arc<InMemoryCatalog>, savings: Arc<InMemorySavings>) -> Self {
        Self { catalog, savings, data: RwLock::new(TransactionData::default()) }
    }

    pub async fn len(&self) -> usize {
        self.data.read().await.records.len()
    }

    pub async fn set_status(
        &self,
        number: &str,
        status: TransactionStatus,
    ) -> Result<Transaction, FacadeError> {
        let mut data = self.data.write().await;
        let record = data
            .records
            .iter_mut()
            .find(|record| record.transaction.transaction_number == number)
            .ok_or_else(|| FacadeError::NotFound { entity: "transaction", id: number.to_string() })?;
        record.transaction.status = status;
        Ok(record.transaction.clone())
    }

    /// Marks a transaction paid and credits savings deposits to their plan.
    pub async fn mark_paid(&self, number: &str) -> Result<Transaction, FacadeError> {
        let (transaction, details) = {
            let mut data = self.data.write().await;
            let record = data
                .records
                .iter_mut()
                .find(|record| record.transaction.transaction_number == number)
                .ok_or_else(|| FacadeError::NotFound {
                    entity: "transaction",
                    id: number.to_string(),
                })?;
            if record.transaction.status == TransactionStatus::Paid {
                return Ok(record.transaction.clone());
            }
            record.transaction.status = TransactionStatus::Paid;
            (record.transaction.clone(), record.details.clone())
        };

        if let Some(TransactionDetails::SavingsDeposit { savings_id }) = details {
            let amount = transaction.unit_price * i64::from(transaction.quantity);
            self.savings.record_deposit(&savings_id, amount).await?;
        }
        tracing::info!(
            event_name = "transaction.paid",
            transaction_number = %transaction.transaction_number,
            "transaction marked paid"
        );
        Ok(transaction)
    }

    async fn product_name(&self, new: &NewTransaction) -> Result<String, FacadeError> {
        let summary = self.get_product(new.product_type, &new.product_id).await?;
        summary.map(|summary| summary.name).ok_or_else(|| FacadeError::NotFound {
            entity: new.product_type.as_str(),
            id: new.product_id.0.clone(),
        })
    }
}

#[async_trait]
impl TransactionFacade for InMemoryTransactions {
    async fn create(&self, new: NewTransaction) -> Result<Transaction, FacadeError> {
        if new.quantity == 0 || new.unit_price <= 0 || new.admin_fee < 0 {
            return Err(FacadeError::Rejected(
                "quantity and unit price must be positive".to_string(),
            ));
        }
        let product_name = self.product_name(&new).await?;
        if new.product_type == ProductType::Qurban {
            self.catalog.reserve_package(&new.product_id, new.quantity).await?;
        }

        let mut data = self.data.write().await;
        data.sequence += 1;
        let now = Utc::now();
        let unique_code = UNIQUE_CODE_BASE + (data.sequence.wrapping_mul(37) % UNIQUE_CODE_SPAN) as i64;
        let number = format!("AMN-{}-{:05}", now.format("%Y%m%d"), data.sequence);
        let transaction = Transaction {
            id: TransactionId(format!("trx-{:05}", data.sequence)),
            transaction_number: number,
            product_type: new.product_type,
            product_id: new.product_id.clone(),
            product_name,
            quantity: new.quantity,
            unit_price: new.unit_price,
            admin_fee: new.admin_fee,
            unique_code,
            total_amount: new.subtotal() + unique_code,
            status: TransactionStatus::Pending,
            donor_phone: new.donor_phone.clone(),
            created_at: now,
        };
        data.records.push(StoredTransaction { transaction: transaction.clone(), details: new.details });

        tracing::info!(
            event_name = "transaction.created",
            transaction_number = %transaction.transaction_number,
            product_type = transaction.product_type.as_str(),
            total = transaction.total_amount,
            "transaction created"
        );
        Ok(transaction)
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Transaction>, FacadeError> {
        let wanted = number.trim();
        let data = self.data.read().await;
        Ok(data
            .records
            .iter()
            .find(|record| record.transaction.transaction_number.eq_ignore_ascii_case(wanted))
            .map(|record| record.transaction.clone()))
    }

    async fn list_for_phone(
        &self,
        phone: &str,
        limit: usize,
    ) -> Result<Vec<Transaction>, FacadeError> {
        let data = self.data.read().await;
        Ok(data
            .records
            .iter()
            .rev()
            .filter(|record| record.transaction.donor_phone == phone)
            .take(limit)
            .map(|record| record.transaction.clone())
            .collect())
    }

    async fn get_product(
        &self,
        product_type: ProductType,
        id: &ProductId,
    ) -> Result<Option<ProductSummary>, FacadeError> {
        let summary = match product_type {
            ProductType::Zakat => self
                .catalog
                .zakat_program(id)
                .await
                .map(|program| ProductSummary { name: program.name, price: None }),
            ProductType::Campaign => self
                .catalog
                .find_campaign(id)
                .await?
                .map(|campaign| ProductSummary { name: campaign.title, price: None }),
            ProductType::Fidyah => self
                .catalog
                .fidyah_program()
                .await?
                .filter(|program| &program.id == id)
                .map(|program| ProductSummary { name: program.name, price: program.daily_rate }),
            ProductType::Qurban => self
                .catalog
                .qurban_package(id)
                .await
                .map(|package| ProductSummary { name: package.name, price: Some(package.price) }),
            ProductType::QurbanSavings => {
                self.savings.find_plan(&SavingsId(id.0.clone())).await?.map(|plan| ProductSummary {
                    name: format!("Tabungan Qurban {} ({})", plan.savings_number, plan.package_name),
                    price: Some(plan.installment_amount),
                })
            }
        };
        Ok(summary)
    }
}
