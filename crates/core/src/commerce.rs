//! Contracts of the external commerce collaborators.
//!
//! Persistence, payment processing and catalog administration live outside
//! this workspace; flows and tools only see these traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::catalog::{
    Campaign, FidyahProgram, PeriodId, ProductId, ProductSummary, ProductType, QurbanPackage,
    QurbanPeriod, ZakatProgram, ZakatType,
};
use crate::domain::donor::{Donor, DonorId, NewDonor};
use crate::domain::payment::{BankAccount, ImageAttachment, ProofReceipt, QrisDetail};
use crate::domain::savings::{NewSavingsPlan, SavingsId, SavingsPlan};
use crate::domain::transaction::{NewTransaction, Transaction};
use crate::errors::FacadeError;

#[async_trait]
pub trait TransactionFacade: Send + Sync {
    /// Creates a pending transaction. Shared qurban packages get their group
    /// slot assigned as part of this call.
    async fn create(&self, new: NewTransaction) -> Result<Transaction, FacadeError>;

    async fn find_by_number(&self, number: &str) -> Result<Option<Transaction>, FacadeError>;

    async fn list_for_phone(&self, phone: &str, limit: usize)
        -> Result<Vec<Transaction>, FacadeError>;

    async fn get_product(
        &self,
        product_type: ProductType,
        id: &ProductId,
    ) -> Result<Option<ProductSummary>, FacadeError>;
}

#[async_trait]
pub trait CatalogFacade: Send + Sync {
    async fn search_campaigns(&self, query: &str) -> Result<Vec<Campaign>, FacadeError>;
    async fn find_campaign(&self, id: &ProductId) -> Result<Option<Campaign>, FacadeError>;
    async fn zakat_types(&self) -> Result<Vec<ZakatType>, FacadeError>;
    async fn zakat_programs(&self, zakat_type: &ProductId)
        -> Result<Vec<ZakatProgram>, FacadeError>;
    async fn fidyah_program(&self) -> Result<Option<FidyahProgram>, FacadeError>;
    async fn active_qurban_periods(&self) -> Result<Vec<QurbanPeriod>, FacadeError>;
    async fn qurban_packages(&self, period: &PeriodId) -> Result<Vec<QurbanPackage>, FacadeError>;
}

#[async_trait]
pub trait SavingsFacade: Send + Sync {
    async fn active_plans(&self, donor: &DonorId) -> Result<Vec<SavingsPlan>, FacadeError>;
    async fn find_plan(&self, id: &SavingsId) -> Result<Option<SavingsPlan>, FacadeError>;
    async fn open_plan(&self, new: NewSavingsPlan) -> Result<SavingsPlan, FacadeError>;
}

#[async_trait]
pub trait DonorDirectory: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<Donor>, FacadeError>;
    async fn register(&self, new: NewDonor) -> Result<Donor, FacadeError>;
}

#[async_trait]
pub trait PaymentDirectory: Send + Sync {
    async fn bank_accounts(&self) -> Result<Vec<BankAccount>, FacadeError>;
    async fn qris(&self) -> Result<Option<QrisDetail>, FacadeError>;
    /// Stores proof of transfer for an operator to verify.
    async fn submit_proof(
        &self,
        transaction_number: &str,
        proof: &ImageAttachment,
    ) -> Result<ProofReceipt, FacadeError>;
}

/// Handle bundle passed to flows and tools.
#[derive(Clone)]
pub struct Commerce {
    pub transactions: Arc<dyn TransactionFacade>,
    pub catalog: Arc<dyn CatalogFacade>,
    pub savings: Arc<dyn SavingsFacade>,
    pub donors: Arc<dyn DonorDirectory>,
    pub payments: Arc<dyn PaymentDirectory>,
}
