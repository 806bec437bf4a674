//! Rank newtype: a 1-based position on the electoral list.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of positions on the list.
pub const LIST_SIZE: u8 = 29;

/// A value outside `1..=LIST_SIZE` was used as a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rank {0} is outside 1..={LIST_SIZE}")]
pub struct InvalidRank(pub u32);

/// A position on the list, always within `1..=29`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Rank(u8);

impl Rank {
    pub const FIRST: Rank = Rank(1);
    pub const LAST: Rank = Rank(LIST_SIZE);

    /// `None` outside `1..=29`.
    pub fn new(value: u32) -> Option<Rank> {
        if (Rank::FIRST.get()..=Rank::LAST.get()).contains(&value) {
            Some(Rank(value as u8))
        } else {
            None
        }
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }

    pub fn is_odd(self) -> bool {
        self.0 % 2 == 1
    }

    /// The following rank, `None` after the last one.
    pub fn next(self) -> Option<Rank> {
        Rank::new(self.get() + 1)
    }

    /// Every rank, in order.
    pub fn all() -> impl Iterator<Item = Rank> {
        (Rank::FIRST.0..=Rank::LAST.0).map(Rank)
    }

    /// Ranks from `start` (inclusive) to the end. Empty when `start > 29`.
    pub fn from_onwards(start: u32) -> impl Iterator<Item = Rank> {
        let first = start.max(Rank::FIRST.get());
        (first..=Rank::LAST.get()).filter_map(Rank::new)
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0 - 1)
    }
}

impl TryFrom<u32> for Rank {
    type Error = InvalidRank;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Rank::new(value).ok_or(InvalidRank(value))
    }
}

impl From<Rank> for u32 {
    fn from(rank: Rank) -> u32 {
        rank.get()
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds() {
        assert!(Rank::new(0).is_none());
        assert!(Rank::new(30).is_none());
        assert_eq!(Rank::new(1), Some(Rank::FIRST));
        assert_eq!(Rank::new(29), Some(Rank::LAST));
        assert_eq!(Rank::try_from(1000), Err(InvalidRank(1000)));
    }

    #[test]
    fn iteration_covers_the_list() {
        assert_eq!(Rank::all().count(), 29);
        assert_eq!(Rank::from_onwards(27).map(Rank::get).collect::<Vec<_>>(), vec![27, 28, 29]);
        assert_eq!(Rank::from_onwards(30).count(), 0);
        assert_eq!(Rank::from_onwards(0).count(), 29);
        assert_eq!(Rank::LAST.next(), None);
        assert_eq!(Rank::FIRST.next().map(Rank::get), Some(2));
    }

    #[test]
    fn serde_rejects_out_of_range() {
        assert!(serde_json::from_str::<Rank>("12").is_ok());
        assert!(serde_json::from_str::<Rank>("42").is_err());
    }
}
