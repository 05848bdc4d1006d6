use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{PackageType, PeriodId, ProductId};
use crate::domain::donor::DonorId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SavingsId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsFrequency {
    Monthly,
    Weekly,
}

impl SavingsFrequency {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Monthly => "bulanan",
            Self::Weekly => "mingguan",
        }
    }

    /// Installment counts a donor may pick for this frequency.
    pub fn installment_options(&self) -> &'static [u32] {
        match self {
            Self::Monthly => &[3, 6, 9, 12],
            Self::Weekly => &[4, 8, 12, 16, 24],
        }
    }

    /// Highest accepted installment day: day-of-month or day-of-week.
    pub fn max_installment_day(&self) -> u32 {
        match self {
            Self::Monthly => 28,
            Self::Weekly => 7,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SavingsStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavingsPlan {
    pub id: SavingsId,
    pub savings_number: String,
    pub donor_id: DonorId,
    pub period_id: PeriodId,
    pub package_id: ProductId,
    pub package_name: String,
    pub target_amount: i64,
    pub collected_amount: i64,
    pub frequency: SavingsFrequency,
    pub installment_count: u32,
    pub installment_amount: i64,
    pub installment_day: u32,
    pub status: SavingsStatus,
    pub created_at: DateTime<Utc>,
}

impl SavingsPlan {
    pub fn remaining(&self) -> i64 {
        (self.target_amount - self.collected_amount).max(0)
    }

    /// Next suggested deposit: the installment, capped by what is still owed.
    pub fn suggested_deposit(&self) -> i64 {
        self.installment_amount.min(self.remaining())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSavingsPlan {
    pub donor_id: DonorId,
    pub donor_name: String,
    pub donor_phone: String,
    pub period_id: PeriodId,
    pub package_id: ProductId,
    pub package_type: PackageType,
    pub target_amount: i64,
    pub frequency: SavingsFrequency,
    pub installment_count: u32,
    pub installment_amount: i64,
    pub installment_day: u32,
}
