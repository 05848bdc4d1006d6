use serde::{Deserialize, Serialize};

/// Image attached to an inbound chat message, either hosted or inline base64.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub url: Option<String>,
    pub data_base64: Option<String>,
    pub mime_type: String,
}

impl ImageAttachment {
    pub fn is_empty(&self) -> bool {
        self.url.as_deref().map_or(true, str::is_empty)
            && self.data_base64.as_deref().map_or(true, str::is_empty)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrisDetail {
    pub merchant_name: String,
    pub image_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    /// Proof stored and waiting for an operator to verify the transfer.
    AwaitingVerification,
    AlreadyPaid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofReceipt {
    pub transaction_number: String,
    pub status: ProofStatus,
}
