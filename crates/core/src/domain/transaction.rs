use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{PackageType, PeriodId, ProductId, ProductType, ZakatKind};
use crate::domain::donor::DonorId;
use crate::domain::savings::SavingsId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    AwaitingVerification,
    Paid,
    Expired,
    Cancelled,
}

impl TransactionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Menunggu pembayaran",
            Self::AwaitingVerification => "Bukti transfer sedang diverifikasi",
            Self::Paid => "Lunas",
            Self::Expired => "Kedaluwarsa",
            Self::Cancelled => "Dibatalkan",
        }
    }
}

/// Flow-specific payload forwarded to the facade with a new transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionDetails {
    Zakat { calculator: ZakatKind, program_id: ProductId, on_behalf_of: Option<String> },
    Donation,
    Fidyah { person_count: u32, day_count: u32, on_behalf_of: Option<String> },
    Qurban { period_id: PeriodId, package_type: PackageType, on_behalf_of: Option<String> },
    SavingsDeposit { savings_id: SavingsId },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub product_type: ProductType,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: i64,
    /// Per-unit admin fee; the facade charges it once per unit.
    pub admin_fee: i64,
    pub donor_name: String,
    pub donor_email: Option<String>,
    pub donor_phone: String,
    pub donatur_id: Option<DonorId>,
    pub details: Option<TransactionDetails>,
}

impl NewTransaction {
    pub fn subtotal(&self) -> i64 {
        let quantity = i64::from(self.quantity);
        self.unit_price * quantity + self.admin_fee * quantity
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub transaction_number: String,
    pub product_type: ProductType,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: i64,
    pub admin_fee: i64,
    pub unique_code: i64,
    pub total_amount: i64,
    pub status: TransactionStatus,
    pub donor_phone: String,
    pub created_at: DateTime<Utc>,
}
