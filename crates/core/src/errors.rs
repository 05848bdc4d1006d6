use thiserror::Error;

/// Failure reported by an external commerce collaborator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FacadeError {
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Facade(#[from] FacadeError),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Donor-safe text; internal detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Facade(FacadeError::NotFound { .. }) => {
                "Maaf, data yang Anda cari tidak ditemukan."
            }
            Self::Facade(FacadeError::Rejected(_)) => {
                "Maaf, permintaan Anda belum dapat diproses. Silakan periksa kembali datanya."
            }
            Self::Facade(FacadeError::Unavailable(_)) | Self::Integration(_) => {
                "Maaf, layanan sedang mengalami gangguan. Silakan coba beberapa saat lagi."
            }
            Self::Configuration(_) => "Maaf, terjadi kesalahan pada sistem kami.",
        }
    }
}
