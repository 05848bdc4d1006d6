use std::sync::Arc;

use amanah_core::commerce::Commerce;

use crate::fixtures::{DemoCatalog, SeedError, SeedResult};
use crate::repositories::{
    InMemoryCatalog, InMemoryDonorDirectory, InMemoryPayments, InMemorySavings,
    InMemoryTransactions,
};

/// The five facades wired over shared in-memory stores.
#[derive(Clone)]
pub struct InMemoryCommerce {
    pub catalog: Arc<InMemoryCatalog>,
    pub savings: Arc<InMemorySavings>,
    pub transactions: Arc<InMemoryTransactions>,
    pub donors: Arc<InMemoryDonorDirectory>,
    pub payments: Arc<InMemoryPayments>,
}

impl Default for InMemoryCommerce {
    fn default() -> Self {
        let catalog = Arc::new(InMemoryCatalog::default());
        let savings = Arc::new(InMemorySavings::new(catalog.clone()));
        let transactions = Arc::new(InMemoryTransactions::new(catalog.clone(), savings.clone()));
        let payments = Arc::new(InMemoryPayments::new(transactions.clone()));
        Self {
            catalog,
            savings,
            transactions,
            donors: Arc::new(InMemoryDonorDirectory::default()),
            payments,
        }
    }
}

impl InMemoryCommerce {
    /// Stores loaded with the bundled demo catalog.
    pub async fn demo() -> Result<(Self, SeedResult), SeedError> {
        let commerce = Self::default();
        let result = DemoCatalog::bundled()?.load(&commerce).await;
        Ok((commerce, result))
    }

    pub fn commerce(&self) -> Commerce {
        Commerce {
            transactions: self.transactions.clone(),
            catalog: self.catalog.clone(),
            savings: self.savings.clone(),
            donors: self.donors.clone(),
            payments: self.payments.clone(),
        }
    }
}
