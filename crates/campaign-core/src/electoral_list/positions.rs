//! In-memory list model: 29 slots plus the pool of unassigned candidates.
//!
//! Everything here is synchronous and store-agnostic. A mutation either
//! validates and applies completely, or returns a [`Rejection`] and leaves
//! the value untouched.

use std::collections::{HashMap, HashSet};

use campaign_state::{Assignment, AssignmentId, Candidate, CandidateId, Gender};
use serde::Serialize;
use tracing::warn;

use super::parity::ParityRule;
use super::rank::{Rank, LIST_SIZE};

/// A candidate sitting on a slot, with the store row backing it if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Occupant {
    pub candidate: Candidate,
    pub assignment_id: Option<AssignmentId>,
}

/// Why an operation was refused. Nothing is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("candidate {0} is unknown")]
    UnknownCandidate(CandidateId),

    #[error("rank {rank} is already held by {holder}")]
    RankOccupied { rank: Rank, holder: String },

    #[error("{candidate} cannot take rank {rank}: a {expected} candidate is expected there")]
    ParityMismatch {
        candidate: String,
        rank: Rank,
        expected: Gender,
    },

    #[error("rank {0} is empty")]
    EmptyRank(Rank),
}

/// The occupant pushed out of the target rank by a cascade placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Displacement {
    pub candidate_id: CandidateId,
    pub assignment_id: Option<AssignmentId>,
    pub from: Rank,
    /// `None` when no later rank fits: the candidate went back to the pool.
    pub to: Option<Rank>,
}

/// What a cascade placement did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadePlan {
    pub candidate_id: CandidateId,
    pub target: Rank,
    pub previous_rank: Option<Rank>,
    pub displaced: Option<Displacement>,
}

/// Fill statistics for display next to the list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListSummary {
    pub filled: usize,
    pub free_ranks: Vec<Rank>,
    pub female: usize,
    pub male: usize,
    pub other: usize,
    pub rule: Option<ParityRule>,
    /// Binary occupants sitting on a rank the rule gives to the other gender.
    pub parity_violations: Vec<Rank>,
    /// Assigned candidates with paperwork still missing.
    pub incomplete_files: usize,
}

impl ListSummary {
    pub fn parity_holds(&self) -> bool {
        self.parity_violations.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.free_ranks.is_empty()
    }
}

/// 29 slots and a pool. A candidate is in at most one slot and never in a
/// slot and the pool at once.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPositions {
    slots: Vec<Option<Occupant>>,
    pool: Vec<Candidate>,
}

impl Default for ListPositions {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ListPositions {
    /// Empty list; every candidate starts in the pool.
    pub fn new(pool: Vec<Candidate>) -> Self {
        Self {
            slots: vec![None; usize::from(LIST_SIZE)],
            pool,
        }
    }

    /// Rebuild from persisted rows.
    ///
    /// Rows with an out-of-range rank, a rank already taken, or a candidate
    /// already placed (or unknown) are skipped with a warning; the candidate
    /// stays in the pool.
    pub fn from_records(candidates: Vec<Candidate>, assignments: &[Assignment]) -> Self {
        let by_id: HashMap<&CandidateId, &Candidate> =
            candidates.iter().map(|c| (&c.candidate_id, c)).collect();

        let mut rows: Vec<&Assignment> = assignments.iter().collect();
        rows.sort_by_key(|a| a.rank);

        let mut slots: Vec<Option<Occupant>> = vec![None; usize::from(LIST_SIZE)];
        let mut placed: HashSet<CandidateId> = HashSet::new();

        for row in rows {
            let Some(rank) = Rank::new(row.rank) else {
                warn!(candidate = %row.candidate_id, rank = row.rank, "assignment outside the list, ignored");
                continue;
            };
            if slots[rank.index()].is_some() {
                warn!(candidate = %row.candidate_id, rank = row.rank, "duplicate assignment for rank, ignored");
                continue;
            }
            if placed.contains(&row.candidate_id) {
                warn!(candidate = %row.candidate_id, rank = row.rank, "candidate assigned twice, ignored");
                continue;
            }
            let Some(candidate) = by_id.get(&row.candidate_id) else {
                warn!(candidate = %row.candidate_id, rank = row.rank, "assignment for unknown candidate, ignored");
                continue;
            };
            placed.insert(row.candidate_id.clone());
            slots[rank.index()] = Some(Occupant {
                candidate: (*candidate).clone(),
                assignment_id: Some(row.assignment_id.clone()),
            });
        }

        let pool = candidates
            .into_iter()
            .filter(|c| !placed.contains(&c.candidate_id))
            .collect();

        Self { slots, pool }
    }

    // -- reads ---------------------------------------------------------------

    pub fn occupant(&self, rank: Rank) -> Option<&Occupant> {
        self.slots[rank.index()].as_ref()
    }

    pub fn candidate_at(&self, rank: Rank) -> Option<&Candidate> {
        self.occupant(rank).map(|o| &o.candidate)
    }

    /// Every rank with its occupant, in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (Rank, Option<&Occupant>)> {
        Rank::all().zip(self.slots.iter()).map(|(r, s)| (r, s.as_ref()))
    }

    /// Occupied ranks only.
    pub fn occupied(&self) -> impl Iterator<Item = (Rank, &Occupant)> {
        self.iter().filter_map(|(r, o)| o.map(|o| (r, o)))
    }

    pub fn pool(&self) -> &[Candidate] {
        &self.pool
    }

    /// Pool ordered by last name then first name.
    pub fn pool_sorted_by_name(&self) -> Vec<&Candidate> {
        let mut pool: Vec<&Candidate> = self.pool.iter().collect();
        pool.sort_by_key(|c| c.sort_key());
        pool
    }

    pub fn rank_of(&self, candidate_id: &CandidateId) -> Option<Rank> {
        self.occupied()
            .find(|(_, o)| &o.candidate.candidate_id == candidate_id)
            .map(|(r, _)| r)
    }

    /// A candidate known to this list, placed or pooled.
    pub fn find_candidate(&self, candidate_id: &CandidateId) -> Option<&Candidate> {
        self.occupied()
            .map(|(_, o)| &o.candidate)
            .chain(self.pool.iter())
            .find(|c| &c.candidate_id == candidate_id)
    }

    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.filled() == usize::from(LIST_SIZE)
    }

    pub fn free_ranks(&self) -> Vec<Rank> {
        self.iter()
            .filter(|(_, o)| o.is_none())
            .map(|(r, _)| r)
            .collect()
    }

    // -- parity --------------------------------------------------------------

    /// Rule anchored on the lowest occupied rank, if its occupant is binary.
    pub fn compute_parity_rule(&self) -> Option<ParityRule> {
        self.rule_ignoring(None)
    }

    pub fn expected_gender_for_rank(&self, rank: Rank) -> Option<Gender> {
        self.compute_parity_rule().map(|rule| rule.expected_for(rank))
    }

    /// The rule as it would be with `ignored` lifted off the list.
    fn rule_ignoring(&self, ignored: Option<&CandidateId>) -> Option<ParityRule> {
        let (anchor_rank, anchor) = self
            .occupied()
            .find(|(_, o)| Some(&o.candidate.candidate_id) != ignored)?;
        ParityRule::from_anchor(anchor_rank, anchor.candidate.gender)
    }

    fn check_parity(
        candidate: &Candidate,
        rank: Rank,
        rule: Option<ParityRule>,
    ) -> Result<(), Rejection> {
        match rule {
            Some(rule) if !rule.admits(candidate.gender, rank) => Err(Rejection::ParityMismatch {
                candidate: candidate.display_name(),
                rank,
                expected: rule.expected_for(rank),
            }),
            _ => Ok(()),
        }
    }

    // -- validation ----------------------------------------------------------

    /// Check a direct placement of `candidate_id` at `target` against the
    /// rule of the list as it stands, the candidate itself included.
    pub fn validate_assignment(
        &self,
        candidate_id: &CandidateId,
        target: Rank,
    ) -> Result<(), Rejection> {
        self.validate_with_rule(candidate_id, target, self.compute_parity_rule())
    }

    fn validate_with_rule(
        &self,
        candidate_id: &CandidateId,
        target: Rank,
        rule: Option<ParityRule>,
    ) -> Result<(), Rejection> {
        let candidate = self
            .find_candidate(candidate_id)
            .ok_or_else(|| Rejection::UnknownCandidate(candidate_id.clone()))?;

        if let Some(holder) = self.candidate_at(target) {
            if &holder.candidate_id != candidate_id {
                return Err(Rejection::RankOccupied {
                    rank: target,
                    holder: holder.display_name(),
                });
            }
        }

        Self::check_parity(candidate, target, rule)
    }

    pub fn can_assign(&self, candidate_id: &CandidateId, target: Rank) -> bool {
        self.validate_assignment(candidate_id, target).is_ok()
    }

    /// Check a swap. Rank `a` must be occupied. With both ranks occupied,
    /// each occupant is checked at the other's rank against the current rule;
    /// with `b` empty the swap is a move and is validated as one.
    pub fn validate_swap(&self, a: Rank, b: Rank) -> Result<(), Rejection> {
        let first = self.occupant(a).ok_or(Rejection::EmptyRank(a))?;
        match self.occupant(b) {
            None => self.validate_assignment(&first.candidate.candidate_id, b),
            Some(second) => {
                let rule = self.compute_parity_rule();
                Self::check_parity(&first.candidate, b, rule)?;
                Self::check_parity(&second.candidate, a, rule)
            }
        }
    }

    // -- mutations -----------------------------------------------------------

    /// Place a pooled or already-placed candidate at `target`.
    /// Returns the rank it came from, if any.
    pub fn assign(
        &mut self,
        candidate_id: &CandidateId,
        target: Rank,
    ) -> Result<Option<Rank>, Rejection> {
        self.validate_assignment(candidate_id, target)?;
        self.place(candidate_id, target)
    }

    fn place(
        &mut self,
        candidate_id: &CandidateId,
        target: Rank,
    ) -> Result<Option<Rank>, Rejection> {
        let (occupant, previous) = self
            .lift(candidate_id)
            .ok_or_else(|| Rejection::UnknownCandidate(candidate_id.clone()))?;
        self.slots[target.index()] = Some(occupant);
        Ok(previous)
    }

    /// Record the store row now backing `rank`.
    pub fn set_assignment_id(&mut self, rank: Rank, assignment_id: AssignmentId) {
        if let Some(occupant) = self.slots[rank.index()].as_mut() {
            occupant.assignment_id = Some(assignment_id);
        }
    }

    /// Exchange the occupants of `a` and `b` (`b` may be empty).
    pub fn swap(&mut self, a: Rank, b: Rank) -> Result<(), Rejection> {
        self.validate_swap(a, b)?;
        self.slots.swap(a.index(), b.index());
        Ok(())
    }

    /// Clear `rank` and return its candidate to the pool.
    pub fn remove(&mut self, rank: Rank) -> Result<Occupant, Rejection> {
        let occupant = self.slots[rank.index()]
            .take()
            .ok_or(Rejection::EmptyRank(rank))?;
        self.pool.push(occupant.candidate.clone());
        Ok(occupant)
    }

    /// First free rank at or after `start` where the candidate satisfies the
    /// rule. Only scans forward; `None` when nothing fits (a full list
    /// included) or the candidate is unknown.
    pub fn find_next_available_rank(&self, candidate_id: &CandidateId, start: u32) -> Option<Rank> {
        let candidate = self.find_candidate(candidate_id)?;
        self.next_free_rank_for(candidate, start)
    }

    fn next_free_rank_for(&self, candidate: &Candidate, start: u32) -> Option<Rank> {
        let rule = self.compute_parity_rule();
        Rank::from_onwards(start).find(|&rank| {
            self.occupant(rank).is_none()
                && rule.map_or(true, |rule| rule.admits(candidate.gender, rank))
        })
    }

    /// Place `candidate_id` at `target`, displacing the current holder.
    ///
    /// The holder moves to the first compatible free rank after `target`, or
    /// back to the pool when there is none. At most one candidate is
    /// displaced and ranks below `target` are never considered.
    pub fn place_with_cascade(
        &mut self,
        candidate_id: &CandidateId,
        target: Rank,
    ) -> Result<CascadePlan, Rejection> {
        if self.find_candidate(candidate_id).is_none() {
            return Err(Rejection::UnknownCandidate(candidate_id.clone()));
        }
        let previous_rank = self.rank_of(candidate_id);
        let mut plan = CascadePlan {
            candidate_id: candidate_id.clone(),
            target,
            previous_rank,
            displaced: None,
        };

        if previous_rank == Some(target) {
            return Ok(plan);
        }

        // Work on a copy so a rejection leaves `self` untouched.
        let mut next = self.clone();
        let Some(holder) = next.slots[target.index()].take() else {
            self.assign(candidate_id, target)?;
            return Ok(plan);
        };

        // The mover is judged with itself and the holder lifted off the
        // list; the holder is then relocated under the resulting rule.
        let rule = next.rule_ignoring(Some(candidate_id));
        next.validate_with_rule(candidate_id, target, rule)?;
        next.place(candidate_id, target)?;

        let to = target
            .next()
            .and_then(|start| next.next_free_rank_for(&holder.candidate, start.get()));
        plan.displaced = Some(Displacement {
            candidate_id: holder.candidate.candidate_id.clone(),
            assignment_id: holder.assignment_id.clone(),
            from: target,
            to,
        });
        match to {
            Some(rank) => next.slots[rank.index()] = Some(holder),
            None => next.pool.push(holder.candidate),
        }

        *self = next;
        Ok(plan)
    }

    /// Take a candidate out of its slot or the pool.
    fn lift(&mut self, candidate_id: &CandidateId) -> Option<(Occupant, Option<Rank>)> {
        if let Some(rank) = self.rank_of(candidate_id) {
            let occupant = self.slots[rank.index()].take()?;
            return Some((occupant, Some(rank)));
        }
        let idx = self
            .pool
            .iter()
            .position(|c| &c.candidate_id == candidate_id)?;
        let candidate = self.pool.remove(idx);
        Some((
            Occupant {
                candidate,
                assignment_id: None,
            },
            None,
        ))
    }

    // -- summary -------------------------------------------------------------

    pub fn summary(&self) -> ListSummary {
        let rule = self.compute_parity_rule();
        let mut summary = ListSummary {
            filled: 0,
            free_ranks: self.free_ranks(),
            female: 0,
            male: 0,
            other: 0,
            rule,
            parity_violations: Vec::new(),
            incomplete_files: 0,
        };

        for (rank, occupant) in self.occupied() {
            let candidate = &occupant.candidate;
            summary.filled += 1;
            match candidate.gender {
                Gender::Female => summary.female += 1,
                Gender::Male => summary.male += 1,
                Gender::Other => summary.other += 1,
            }
            if let Some(rule) = rule {
                if !rule.admits(candidate.gender, rank) {
                    summary.parity_violations.push(rank);
                }
            }
            if !candidate.is_complete() {
                summary.incomplete_files += 1;
            }
        }
        summary
    }
}
