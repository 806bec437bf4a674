//! Campaign-State: data-access layer for the campaign back-office
//!
//! This crate owns every byte that goes to or comes from the database:
//! candidates, electoral-list rows, programme sections with their
//! rich-text bodies, and the site settings used to brand exports.
//!
//! ## Key Components
//!
//! - `storage_traits`: the async contract the engines consume
//! - `SurrealCampaignStore`: SurrealDB backend (memory, surrealkv, remote)
//! - `fakes::MemoryCampaignStore`: in-memory fake with write-failure injection
//! - `content`: editor JSON blocks decoded into `DocumentNode`s

mod config;
pub mod content;
mod error;
pub mod fakes;
pub mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use config::{StoreConfig, StoreTarget, DEFAULT_LOCAL_PATH};
pub use content::{parse_blocks, DocumentNode, ListStyle};
pub use error::{StateError, StorageError};
pub use schema::{
    Assignment, AssignmentId, Candidate, CandidateDocuments, CandidateId, DbSectionContent,
    FileAttachment, Gender, ListId, ProgramItem, ProgramSection, SiteSettings,
};
pub use storage_traits::{
    AssignmentStore, CandidateStore, ContentStore, DataAccess, StorageResult, SCRATCH_RANK,
};
pub use surreal_store::SurrealCampaignStore;

/// Result type for campaign-state setup operations
pub type Result<T> = std::result::Result<T, StateError>;
