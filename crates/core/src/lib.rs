pub mod commerce;
pub mod config;
pub mod dedup;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod money;
pub mod nisab;
pub mod parsers;
pub mod session;

pub use commerce::{
    CatalogFacade, Commerce, DonorDirectory, PaymentDirectory, SavingsFacade, TransactionFacade,
};
pub use dedup::DedupGuard;
pub use domain::catalog::{ProductId, ProductType, ZakatKind};
pub use domain::donor::{Donor, DonorId};
pub use domain::transaction::{NewTransaction, Transaction};
pub use errors::{ApplicationError, FacadeError};
pub use flows::{FlowEngine, FlowOutcome, FlowStart, StartOutcome};
pub use nisab::NisabCalculator;
pub use session::{Session, SessionStore};
