//! The alternating-gender rule derived from the lowest occupied rank.

use campaign_state::Gender;
use serde::{Deserialize, Serialize};

use super::rank::Rank;

/// Expected gender per rank-parity class.
///
/// Never stored: recomputed from the list each time it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParityRule {
    pub anchor_rank: Rank,
    pub expected_for_odd: Gender,
    pub expected_for_even: Gender,
}

impl ParityRule {
    /// Rule anchored on `gender` at `anchor_rank`; `None` for a non-binary
    /// anchor. The anchor's own parity class gets its gender, the other
    /// class the opposite.
    pub fn from_anchor(anchor_rank: Rank, gender: Gender) -> Option<Self> {
        let opposite = gender.opposite()?;
        let (expected_for_odd, expected_for_even) = if anchor_rank.is_odd() {
            (gender, opposite)
        } else {
            (opposite, gender)
        };
        Some(Self {
            anchor_rank,
            expected_for_odd,
            expected_for_even,
        })
    }

    pub fn expected_for(&self, rank: Rank) -> Gender {
        if rank.is_odd() {
            self.expected_for_odd
        } else {
            self.expected_for_even
        }
    }

    /// Non-binary genders opt out of the rule.
    pub fn admits(&self, gender: Gender, rank: Rank) -> bool {
        !gender.is_binary() || self.expected_for(rank) == gender
    }
}
