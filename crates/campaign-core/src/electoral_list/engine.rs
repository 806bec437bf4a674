//! Store-backed electoral list.
//!
//! Every mutation is planned on a copy of the in-memory positions, written
//! to the store, and only then committed. A failed write therefore leaves
//! the pre-image in place. When a failure may have landed after some writes
//! were applied, the list is reloaded from the store so memory and store
//! agree again.

use std::sync::Arc;

use campaign_state::{
    AssignmentId, AssignmentStore, Candidate, CandidateId, CandidateStore, ListId, StorageError,
    StorageResult,
};
use tracing::{debug, instrument, warn};

use super::parity::ParityRule;
use super::positions::{CascadePlan, ListPositions, ListSummary, Rejection};
use super::rank::Rank;
use crate::error::{CampaignError, Result};
use crate::metrics::METRICS;
use crate::obs;

/// One electoral list bound to a store.
pub struct ElectoralList<S> {
    store: Arc<S>,
    list_id: ListId,
    positions: ListPositions,
}

impl<S> ElectoralList<S>
where
    S: CandidateStore + AssignmentStore,
{
    /// Build the list from the store's candidates and assignment rows.
    #[instrument(skip(store))]
    pub async fn load(store: Arc<S>, list_id: ListId) -> Result<Self> {
        let positions = fetch_positions(store.as_ref(), &list_id).await?;
        obs::emit_list_loaded(list_id.as_str(), positions.filled(), positions.pool().len());
        Ok(Self {
            store,
            list_id,
            positions,
        })
    }

    /// Discard in-memory state and rebuild from the store.
    pub async fn reload(&mut self) -> Result<()> {
        self.positions = fetch_positions(self.store.as_ref(), &self.list_id).await?;
        Ok(())
    }

    pub fn list_id(&self) -> &ListId {
        &self.list_id
    }

    pub fn positions(&self) -> &ListPositions {
        &self.positions
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn compute_parity_rule(&self) -> Option<ParityRule> {
        self.positions.compute_parity_rule()
    }

    pub fn validate_assignment(
        &self,
        candidate_id: &CandidateId,
        target: Rank,
    ) -> std::result::Result<(), Rejection> {
        self.positions.validate_assignment(candidate_id, target)
    }

    pub fn find_next_available_rank(&self, candidate_id: &CandidateId, start: u32) -> Option<Rank> {
        self.positions.find_next_available_rank(candidate_id, start)
    }

    pub fn summary(&self) -> ListSummary {
        self.positions.summary()
    }

    /// Place a candidate at `target` (from the pool or another rank).
    #[instrument(skip(self), fields(list = %self.list_id))]
    pub async fn assign(&mut self, candidate_id: &CandidateId, target: Rank) -> Result<()> {
        let mut next = self.positions.clone();
        let previous = next.assign(candidate_id, target)?;

        match self
            .store
            .upsert_assignment(&self.list_id, candidate_id, target.get())
            .await
        {
            Ok(row) => {
                next.set_assignment_id(target, row.assignment_id);
                self.positions = next;
                METRICS.inc_list_mutations();
                obs::emit_list_assigned(
                    self.list_id.as_str(),
                    candidate_id.as_str(),
                    previous.map(Rank::get),
                    target.get(),
                );
                Ok(())
            }
            Err(err) => Err(self.recover("assign", false, err).await),
        }
    }

    /// Exchange the occupants of two ranks (`b` may be empty).
    #[instrument(skip(self), fields(list = %self.list_id))]
    pub async fn swap(&mut self, a: Rank, b: Rank) -> Result<()> {
        let mut next = self.positions.clone();
        next.swap(a, b)?;

        match self.store.swap_ranks(&self.list_id, a.get(), b.get()).await {
            Ok(()) => {
                self.positions = next;
                METRICS.inc_list_mutations();
                obs::emit_list_swapped(self.list_id.as_str(), a.get(), b.get());
                Ok(())
            }
            // The store may have applied part of its write sequence.
            Err(err) => Err(self.recover("swap", true, err).await),
        }
    }

    /// Clear `rank`; its candidate goes back to the pool and is returned.
    #[instrument(skip(self), fields(list = %self.list_id))]
    pub async fn remove(&mut self, rank: Rank) -> Result<Candidate> {
        let mut next = self.positions.clone();
        let occupant = next.remove(rank)?;
        let assignment_id = self
            .resolve_assignment_id(&occupant.candidate.candidate_id, occupant.assignment_id.clone())
            .await?;

        match self.store.delete_assignment(&assignment_id).await {
            Ok(()) => {
                self.positions = next;
                METRICS.inc_list_mutations();
                obs::emit_list_removed(
                    self.list_id.as_str(),
                    occupant.candidate.candidate_id.as_str(),
                    rank.get(),
                );
                Ok(occupant.candidate)
            }
            Err(err) => Err(self.recover("remove", false, err).await),
        }
    }

    /// Place a candidate at `target`, relocating the current holder forward
    /// (or to the pool). See [`ListPositions::place_with_cascade`].
    #[instrument(skip(self), fields(list = %self.list_id))]
    pub async fn place_with_cascade(
        &mut self,
        candidate_id: &CandidateId,
        target: Rank,
    ) -> Result<CascadePlan> {
        let mut next = self.positions.clone();
        let plan = next.place_with_cascade(candidate_id, target)?;

        let mut applied = 0usize;
        match self.write_cascade(&plan, &mut next, &mut applied).await {
            Ok(()) => {
                self.positions = next;
                METRICS.inc_list_mutations();
                obs::emit_list_placed(
                    self.list_id.as_str(),
                    candidate_id.as_str(),
                    target.get(),
                    plan.displaced.as_ref().map(|d| d.candidate_id.as_str()),
                    plan.displaced.as_ref().and_then(|d| d.to).map(Rank::get),
                );
                Ok(plan)
            }
            Err(err) => Err(self.recover("place", applied > 0, err).await),
        }
    }

    /// Store writes for a cascade, ordered so `(list, rank)` stays unique
    /// after each one: the displaced holder moves or leaves first.
    async fn write_cascade(
        &self,
        plan: &CascadePlan,
        next: &mut ListPositions,
        applied: &mut usize,
    ) -> StorageResult<()> {
        let target = plan.target;

        // The holder lands on the rank the candidate just left: that is a
        // plain swap of the two rows.
        if let (Some(displaced), Some(previous)) = (&plan.displaced, plan.previous_rank) {
            if displaced.to == Some(previous) {
                *applied += 1;
                return self
                    .store
                    .swap_ranks(&self.list_id, target.get(), previous.get())
                    .await;
            }
        }

        match &plan.displaced {
            None if plan.previous_rank == Some(target) => return Ok(()),
            None => {}
            Some(displaced) => {
                match displaced.to {
                    Some(to) => {
                        debug!(candidate = %displaced.candidate_id, to = to.get(), "relocating displaced candidate");
                        self.store
                            .upsert_assignment(&self.list_id, &displaced.candidate_id, to.get())
                            .await?;
                    }
                    None => {
                        debug!(candidate = %displaced.candidate_id, "displaced candidate back to pool");
                        let assignment_id = self
                            .resolve_assignment_id(
                                &displaced.candidate_id,
                                displaced.assignment_id.clone(),
                            )
                            .await?;
                        self.store.delete_assignment(&assignment_id).await?;
                    }
                }
                *applied += 1;
            }
        }

        let row = self
            .store
            .upsert_assignment(&self.list_id, &plan.candidate_id, target.get())
            .await?;
        *applied += 1;
        next.set_assignment_id(target, row.assignment_id);
        Ok(())
    }

    /// The row id for a placed candidate, looked up in the store when the
    /// in-memory slot does not carry one.
    async fn resolve_assignment_id(
        &self,
        candidate_id: &CandidateId,
        known: Option<AssignmentId>,
    ) -> StorageResult<AssignmentId> {
        if let Some(id) = known {
            return Ok(id);
        }
        let rows = self.store.list_assignments(&self.list_id).await?;
        rows.into_iter()
            .find(|row| &row.candidate_id == candidate_id)
            .map(|row| row.assignment_id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "assignment",
                id: candidate_id.to_string(),
            })
    }

    /// Bring memory back in line with the store after a failed write.
    ///
    /// Nothing was committed in memory, so when no write was applied the
    /// pre-image is already current. Otherwise reload; if that fails too,
    /// the pre-image is kept and the error still surfaces.
    async fn recover(
        &mut self,
        op: &'static str,
        possibly_partial: bool,
        err: StorageError,
    ) -> CampaignError {
        METRICS.inc_rollbacks();
        if !possibly_partial {
            obs::emit_list_rollback(self.list_id.as_str(), op, &err);
            return CampaignError::Store(err);
        }

        match fetch_positions(self.store.as_ref(), &self.list_id).await {
            Ok(positions) => {
                self.positions = positions;
                obs::emit_list_reconciled(self.list_id.as_str(), op, &err);
            }
            Err(reload_err) => {
                warn!(list = %self.list_id, op, error = %reload_err, "reload after failed write also failed, keeping pre-image");
            }
        }
        CampaignError::Store(err)
    }
}

async fn fetch_positions<S>(store: &S, list_id: &ListId) -> Result<ListPositions>
where
    S: CandidateStore + AssignmentStore + ?Sized,
{
    let candidates = store.list_candidates().await?;
    let rows = store.list_assignments(list_id).await?;
    Ok(ListPositions::from_records(candidates, &rows))
}
