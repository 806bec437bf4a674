//! Storage trait definitions for the campaign back-office
//!
//! These traits are the narrow data-access contract the engines consume:
//! - `CandidateStore`: candidate records and their map coordinates
//! - `AssignmentStore`: electoral-list rows (rank ↔ candidate)
//! - `ContentStore`: programme sections, rich-text bodies, site settings
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module; `SurrealCampaignStore` is the
//! persistent backend.

use async_trait::async_trait;

use crate::content::DocumentNode;
use crate::error::StorageError;
use crate::schema::{
    Assignment, AssignmentId, Candidate, CandidateId, ListId, ProgramSection, SiteSettings,
};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Rank used to park a candidate while two ranks are exchanged.
///
/// Lies outside the valid `1..=29` range so it can never collide with a
/// real position; stores with atomic swaps never write it.
pub const SCRATCH_RANK: u32 = 1000;

// ---------------------------------------------------------------------------
// CandidateStore
// ---------------------------------------------------------------------------

/// Candidate records.
#[async_trait]
pub trait CandidateStore: Send + Sync {
    /// All candidates, assigned or not.
    async fn list_candidates(&self) -> StorageResult<Vec<Candidate>>;

    /// Record where a candidate lives (used by the team map).
    async fn update_candidate_coordinates(
        &self,
        candidate_id: &CandidateId,
        latitude: f64,
        longitude: f64,
    ) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// AssignmentStore
// ---------------------------------------------------------------------------

/// Electoral-list rows.
///
/// Guarantees:
/// - `(list_id, rank)` is unique: a write that would give a rank to a second
///   candidate fails with `StorageError::RankConflict`.
/// - `(list_id, candidate_id)` is unique: `upsert_assignment` moves an
///   existing row instead of inserting a second one.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// All rows of a list, in no particular order.
    async fn list_assignments(&self, list_id: &ListId) -> StorageResult<Vec<Assignment>>;

    /// Insert the candidate at `rank`, or move its existing row there.
    async fn upsert_assignment(
        &self,
        list_id: &ListId,
        candidate_id: &CandidateId,
        rank: u32,
    ) -> StorageResult<Assignment>;

    /// Delete a row. `StorageError::NotFound` if absent.
    async fn delete_assignment(&self, assignment_id: &AssignmentId) -> StorageResult<()>;

    /// Exchange the occupants of two ranks (`rank_b` may be empty).
    ///
    /// The default implementation parks the occupant of `rank_a` on
    /// [`SCRATCH_RANK`], moves the occupant of `rank_b` to `rank_a`, then
    /// moves the parked candidate to `rank_b`, so the rank uniqueness
    /// constraint holds after every step. Backends with transactions should
    /// override it with a single atomic write.
    async fn swap_ranks(&self, list_id: &ListId, rank_a: u32, rank_b: u32) -> StorageResult<()> {
        let rows = self.list_assignments(list_id).await?;
        let at = |rank: u32| rows.iter().find(|a| a.rank == rank).cloned();

        let first = at(rank_a).ok_or_else(|| StorageError::NotFound {
            entity: "assignment at rank",
            id: format!("{list_id}#{rank_a}"),
        })?;
        let second = at(rank_b);

        match second {
            Some(second) => {
                self.upsert_assignment(list_id, &first.candidate_id, SCRATCH_RANK)
                    .await?;
                self.upsert_assignment(list_id, &second.candidate_id, rank_a)
                    .await?;
                self.upsert_assignment(list_id, &first.candidate_id, rank_b)
                    .await?;
            }
            None => {
                self.upsert_assignment(list_id, &first.candidate_id, rank_b)
                    .await?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ContentStore
// ---------------------------------------------------------------------------

/// Programme content and site settings.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Rich-text body of a section or item. Unknown ids yield an empty body.
    async fn get_section_content(&self, content_id: &str) -> StorageResult<Vec<DocumentNode>>;

    /// Programme sections ordered by `position`.
    async fn list_sections(&self) -> StorageResult<Vec<ProgramSection>>;

    /// Site settings; defaults when none were saved.
    async fn get_site_settings(&self) -> StorageResult<SiteSettings>;
}

/// Everything the engines need from the store.
pub trait DataAccess: CandidateStore + AssignmentStore + ContentStore {}

impl<T> DataAccess for T where T: CandidateStore + AssignmentStore + ContentStore {}
