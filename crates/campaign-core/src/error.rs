//! Error taxonomy for the campaign engines.

use campaign_state::StorageError;

use crate::assets::AssetError;
use crate::electoral_list::Rejection;

/// Campaign engine errors.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    /// Validation refused the operation; nothing was written.
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),

    /// The store failed; in-memory state was rolled back or reconciled.
    #[error("store error: {0}")]
    Store(#[from] StorageError),

    #[error("asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("layout error: {0}")]
    Layout(String),

    /// The output document could not be built or serialized.
    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("export cancelled")]
    Cancelled,

    /// The single-writer task for a list is gone.
    #[error("list writer stopped")]
    WriterClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<lopdf::Error> for CampaignError {
    fn from(err: lopdf::Error) -> Self {
        CampaignError::Pdf(err.to_string())
    }
}

/// Result type for campaign engine operations.
pub type Result<T> = std::result::Result<T, CampaignError>;
