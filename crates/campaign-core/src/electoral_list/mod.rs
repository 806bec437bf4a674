//! Parity-constrained electoral list
//!
//! - `rank`: the `1..=29` position newtype
//! - `parity`: the alternating-gender rule
//! - `positions`: pure in-memory model and its operations
//! - `engine`: the model bound to an `AssignmentStore`, with rollback
//! - `writer`: single-writer queue in front of an engine

pub mod engine;
pub mod parity;
pub mod positions;
pub mod rank;
pub mod writer;

pub use engine::ElectoralList;
pub use parity::ParityRule;
pub use positions::{CascadePlan, Displacement, ListPositions, ListSummary, Occupant, Rejection};
pub use rank::{InvalidRank, Rank, LIST_SIZE};
pub use writer::{ListHandle, ListWriter};
