use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use amanah_core::commerce::{PaymentDirectory, TransactionFacade};
use amanah_core::domain::payment::{
    BankAccount, ImageAttachment, ProofReceipt, ProofStatus, QrisDetail,
};
use amanah_core::domain::transaction::TransactionStatus;
use amanah_core::errors::FacadeError;

use super::transaction::InMemoryTransactions;

#[derive(Default)]
struct PaymentData {
    bank_accounts: Vec<BankAccount>,
    qris: Option<QrisDetail>,
}

pub struct InMemoryPayments {
    transactions: Arc<InMemoryTransactions>,
    data: RwLock<PaymentData>,
}

impl InMemoryPayments {
    pub fn new(transactions: Arc<InMemoryTransactions>) -> Self {
        Self { transactions, data: RwLock::new(PaymentData::default()) }
    }

    pub async fn add_bank_account(&self, account: BankAccount) {
        self.data.write().await.bank_accounts.push(account);
    }

    pub async fn set_qris(&self, qris: QrisDetail) {
        self.data.write().await.qris = Some(qris);
    }
}

#[async_trait]
impl PaymentDirectory for InMemoryPayments {
    async fn bank_accounts(&self) -> Result<Vec<BankAccount>, FacadeError> {
        Ok(self.data.read().await.bank_accounts.clone())
    }

    async fn qris(&self) -> Result<Option<QrisDetail>, FacadeError> {
        Ok(self.data.read().await.qris.clone())
    }

    async fn submit_proof(
        &self,
        transaction_number: &str,
        proof: &ImageAttachment,
    ) -> Result<ProofReceipt, FacadeError> {
        if proof.is_empty() {
            return Err(FacadeError::Rejected("proof of transfer has no image".to_string()));
        }
        let transaction =
            self.transactions.find_by_number(transaction_number).await?.ok_or_else(|| {
                FacadeError::NotFound {
                    entity: "transaction",
                    id: transaction_number.to_string(),
                }
            })?;

        let status = match transaction.status {
            TransactionStatus::Paid => ProofStatus::AlreadyPaid,
            TransactionStatus::Expired | TransactionStatus::Cancelled => {
                return Err(FacadeError::Rejected(format!(
                    "transaction `{}` is {}",
                    transaction.transaction_number,
                    transaction.status.label().to_lowercase()
                )))
            }
            TransactionStatus::Pending | TransactionStatus::AwaitingVerification => {
                self.transactions
                    .set_status(
                        &transaction.transaction_number,
                        TransactionStatus::AwaitingVerification,
                    )
                    .await?;
                ProofStatus::AwaitingVerification
            }
        };

        tracing::info!(
            event_name = "payment.proof_submitted",
            transaction_number = %transaction.transaction_number,
            status = ?status,
            "payment proof submitted"
        );
        Ok(ProofReceipt { transaction_number: transaction.transaction_number, status })
    }
}
