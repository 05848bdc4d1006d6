pub mod catalog;
pub mod donor;
pub mod payment;
pub mod savings;
pub mod transaction;
