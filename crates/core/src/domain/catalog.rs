use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Zakat,
    Campaign,
    Fidyah,
    Qurban,
    QurbanSavings,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zakat => "zakat",
            Self::Campaign => "campaign",
            Self::Fidyah => "fidyah",
            Self::Qurban => "qurban",
            Self::QurbanSavings => "qurban_savings",
        }
    }
}

/// Result of the facade's product lookup; `price` is absent for open-amount products.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub name: String,
    pub price: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub target_amount: Option<i64>,
    pub collected_amount: i64,
    pub end_date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZakatKind {
    Fitrah,
    Maal,
    Penghasilan,
    Profesi,
    Pertanian,
    Peternakan,
    Bisnis,
}

impl ZakatKind {
    pub const ALL: [ZakatKind; 7] = [
        Self::Fitrah,
        Self::Maal,
        Self::Penghasilan,
        Self::Profesi,
        Self::Pertanian,
        Self::Peternakan,
        Self::Bisnis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fitrah => "fitrah",
            Self::Maal => "maal",
            Self::Penghasilan => "penghasilan",
            Self::Profesi => "profesi",
            Self::Pertanian => "pertanian",
            Self::Peternakan => "peternakan",
            Self::Bisnis => "bisnis",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Fitrah => "Zakat Fitrah",
            Self::Maal => "Zakat Maal",
            Self::Penghasilan => "Zakat Penghasilan",
            Self::Profesi => "Zakat Profesi",
            Self::Pertanian => "Zakat Pertanian",
            Self::Peternakan => "Zakat Peternakan",
            Self::Bisnis => "Zakat Perniagaan",
        }
    }

    /// Kinds whose obligation only applies above the gold-based nisab.
    pub fn requires_nisab(&self) -> bool {
        matches!(self, Self::Maal | Self::Penghasilan | Self::Profesi)
    }

    /// Income kinds compare against the monthly share of the annual nisab.
    pub fn is_monthly(&self) -> bool {
        matches!(self, Self::Penghasilan | Self::Profesi)
    }
}

impl FromStr for ZakatKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let normalized = normalized.strip_prefix("zakat").unwrap_or(&normalized).trim();
        match normalized {
            "fitrah" | "fitri" => Ok(Self::Fitrah),
            "maal" | "mal" | "harta" => Ok(Self::Maal),
            "penghasilan" | "income" | "gaji" => Ok(Self::Penghasilan),
            "profesi" => Ok(Self::Profesi),
            "pertanian" | "panen" => Ok(Self::Pertanian),
            "peternakan" | "ternak" => Ok(Self::Peternakan),
            "bisnis" | "perniagaan" | "perdagangan" | "usaha" => Ok(Self::Bisnis),
            other => Err(format!("unknown zakat calculator `{other}`")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZakatType {
    pub id: ProductId,
    pub name: String,
    pub kind: ZakatKind,
    pub rate_percent: Decimal,
    pub per_head_amount: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZakatProgram {
    pub id: ProductId,
    pub zakat_type_id: ProductId,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FidyahProgram {
    pub id: ProductId,
    pub name: String,
    pub daily_rate: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QurbanPeriod {
    pub id: PeriodId,
    pub name: String,
    pub hijri_year: u32,
    pub slaughter_date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageType {
    Individual,
    /// Sold in fractional slots ("patungan") across donors sharing one animal.
    Shared,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QurbanPackage {
    pub id: ProductId,
    pub period_id: PeriodId,
    pub name: String,
    pub animal: String,
    pub package_type: PackageType,
    pub price: i64,
    pub stock: u32,
    pub max_slots: u32,
    pub slots_available: u32,
}

impl QurbanPackage {
    pub fn is_available(&self) -> bool {
        match self.package_type {
            PackageType::Individual => self.stock > 0,
            PackageType::Shared => self.slots_available > 0,
        }
    }

    pub fn is_shared(&self) -> bool {
        self.package_type == PackageType::Shared
    }
}
