//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryCampaignStore` implements every data-access trait on plain
//! collections and enforces the same uniqueness rules as the SurrealDB
//! backend. A write budget can be set to make writes start failing, which
//! is how the engine's rollback paths are exercised.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::content::DocumentNode;
use crate::error::StorageError;
use crate::schema::*;
use crate::storage_traits::*;

#[derive(Debug, Default)]
struct Inner {
    candidates: Vec<Candidate>,
    assignments: Vec<Assignment>,
    sections: Vec<ProgramSection>,
    content: HashMap<String, Vec<DocumentNode>>,
    settings: Option<SiteSettings>,
    /// Remaining successful writes; `None` means unlimited.
    write_budget: Option<usize>,
    writes_attempted: usize,
}

impl Inner {
    fn charge_write(&mut self) -> StorageResult<()> {
        self.writes_attempted += 1;
        match self.write_budget.as_mut() {
            Some(0) => Err(StorageError::Unavailable(
                "write budget exhausted".to_string(),
            )),
            Some(n) => {
                *n -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// In-memory campaign store.
#[derive(Debug, Default)]
pub struct MemoryCampaignStore {
    inner: Mutex<Inner>,
}

impl MemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with candidates.
    pub fn with_candidates(candidates: Vec<Candidate>) -> Self {
        let store = Self::new();
        store.inner.lock().unwrap().candidates = candidates;
        store
    }

    pub fn insert_candidate(&self, candidate: Candidate) {
        self.inner.lock().unwrap().candidates.push(candidate);
    }

    pub fn insert_section(&self, section: ProgramSection) {
        self.inner.lock().unwrap().sections.push(section);
    }

    pub fn put_content(&self, content_id: impl Into<String>, blocks: Vec<DocumentNode>) {
        self.inner
            .lock()
            .unwrap()
            .content
            .insert(content_id.into(), blocks);
    }

    pub fn put_site_settings(&self, settings: SiteSettings) {
        self.inner.lock().unwrap().settings = Some(settings);
    }

    /// Allow `n` more successful writes, then fail every write with
    /// `StorageError::Unavailable`. `None` lifts the limit.
    pub fn set_write_budget(&self, budget: Option<usize>) {
        self.inner.lock().unwrap().write_budget = budget;
    }

    /// Number of write calls received (successful or not).
    pub fn writes_attempted(&self) -> usize {
        self.inner.lock().unwrap().writes_attempted
    }
}

#[async_trait]
impl CandidateStore for MemoryCampaignStore {
    async fn list_candidates(&self) -> StorageResult<Vec<Candidate>> {
        Ok(self.inner.lock().unwrap().candidates.clone())
    }

    async fn update_candidate_coordinates(
        &self,
        candidate_id: &CandidateId,
        latitude: f64,
        longitude: f64,
    ) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.charge_write()?;
        let candidate = inner
            .candidates
            .iter_mut()
            .find(|c| &c.candidate_id == candidate_id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "candidate",
                id: candidate_id.to_string(),
            })?;
        candidate.latitude = Some(latitude);
        candidate.longitude = Some(longitude);
        Ok(())
    }
}

#[async_trait]
impl AssignmentStore for MemoryCampaignStore {
    async fn list_assignments(&self, list_id: &ListId) -> StorageResult<Vec<Assignment>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .assignments
            .iter()
            .filter(|a| &a.list_id == list_id)
            .cloned()
            .collect())
    }

    async fn upsert_assignment(
        &self,
        list_id: &ListId,
        candidate_id: &CandidateId,
        rank: u32,
    ) -> StorageResult<Assignment> {
        let mut inner = self.inner.lock().unwrap();
        inner.charge_write()?;

        if let Some(holder) = inner
            .assignments
            .iter()
            .find(|a| &a.list_id == list_id && a.rank == rank && &a.candidate_id != candidate_id)
        {
            return Err(StorageError::RankConflict {
                list_id: list_id.to_string(),
                rank,
                holder: holder.candidate_id.to_string(),
            });
        }

        if let Some(existing) = inner
            .assignments
            .iter_mut()
            .find(|a| &a.list_id == list_id && &a.candidate_id == candidate_id)
        {
            existing.rank = rank;
            return Ok(existing.clone());
        }

        let row = Assignment {
            assignment_id: AssignmentId::generate(),
            list_id: list_id.clone(),
            candidate_id: candidate_id.clone(),
            rank,
        };
        inner.assignments.push(row.clone());
        Ok(row)
    }

    async fn delete_assignment(&self, assignment_id: &AssignmentId) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.charge_write()?;
        let before = inner.assignments.len();
        inner
            .assignments
            .retain(|a| &a.assignment_id != assignment_id);
        if inner.assignments.len() == before {
            return Err(StorageError::NotFound {
                entity: "assignment",
                id: assignment_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryCampaignStore {
    async fn get_section_content(&self, content_id: &str) -> StorageResult<Vec<DocumentNode>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.content.get(content_id).cloned().unwrap_or_default())
    }

    async fn list_sections(&self) -> StorageResult<Vec<ProgramSection>> {
        let mut sections = self.inner.lock().unwrap().sections.clone();
        sections.sort_by_key(|s| s.position);
        Ok(sections)
    }

    async fn get_site_settings(&self) -> StorageResult<SiteSettings> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .settings
            .clone()
            .unwrap_or_default())
    }
}
