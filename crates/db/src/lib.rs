pub mod fixtures;
pub mod memory;
pub mod repositories;

pub use fixtures::{verify_loaded, DemoCatalog, SeedError, SeedResult, VerificationResult};
pub use memory::InMemoryCommerce;
