//! Campaign Core Library
//!
//! The two engines behind the campaign back-office:
//!
//! - [`electoral_list`]: the 29-rank list with its alternating-gender rule,
//!   store-backed mutations with rollback, and a single-writer queue.
//! - [`compose`]: the programme PDF export (layout, table of contents,
//!   appendix index, attachment merging).

pub mod assets;
pub mod cancel;
pub mod compose;
pub mod electoral_list;
pub mod error;
pub mod metrics;
pub mod obs;
pub mod telemetry;
pub mod theme;

pub use assets::{AssetError, AssetFetcher, FetchConfig, HttpAssetFetcher, MemoryAssetFetcher};
pub use cancel::CancellationToken;
pub use compose::{
    export_file_name, ExportArtifact, ExportOptions, ExportReport, ProgramContent,
    ProgramExporter,
};
pub use electoral_list::{
    CascadePlan, ElectoralList, ListHandle, ListPositions, ListSummary, ListWriter, ParityRule,
    Rank, Rejection, LIST_SIZE,
};
pub use error::{CampaignError, Result};
pub use theme::{Rgb, SiteTheme};

/// Crate version, for log lines and the PDF producer field.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
