//! In-memory implementations of the commerce facades.

pub mod catalog;
pub mod donor;
pub mod payment;
pub mod savings;
pub mod transaction;

pub use catalog::InMemoryCatalog;
pub use donor::InMemoryDonorDirectory;
pub use payment::InMemoryPayments;
pub use savings::InMemorySavings;
pub use transaction::InMemoryTransactions;
