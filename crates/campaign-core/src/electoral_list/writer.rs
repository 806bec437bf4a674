//! Single-writer queue for one electoral list.
//!
//! [`ListWriter::spawn`] moves an [`ElectoralList`] onto its own Tokio task.
//! Every mutation goes through an `mpsc` channel and is answered on a
//! `oneshot`, so two gestures on the same list can never interleave their
//! store writes. [`ListHandle`] is the cheap, cloneable front end.

use campaign_state::{AssignmentStore, Candidate, CandidateId, CandidateStore};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::engine::ElectoralList;
use super::positions::{CascadePlan, ListPositions};
use super::rank::Rank;
use crate::error::{CampaignError, Result};

const QUEUE_DEPTH: usize = 32;

enum Command {
    Assign {
        candidate_id: CandidateId,
        rank: Rank,
        reply: oneshot::Sender<Result<()>>,
    },
    Swap {
        a: Rank,
        b: Rank,
        reply: oneshot::Sender<Result<()>>,
    },
    Remove {
        rank: Rank,
        reply: oneshot::Sender<Result<Candidate>>,
    },
    Place {
        candidate_id: CandidateId,
        rank: Rank,
        reply: oneshot::Sender<Result<CascadePlan>>,
    },
    Reload {
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<ListPositions>,
    },
}

/// Owns the task that serializes mutations.
pub struct ListWriter;

impl ListWriter {
    /// Start the writer task. It stops once every handle is dropped.
    pub fn spawn<S>(engine: ElectoralList<S>) -> ListHandle
    where
        S: CandidateStore + AssignmentStore + 'static,
    {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run(engine, rx));
        ListHandle { tx }
    }
}

async fn run<S>(mut engine: ElectoralList<S>, mut rx: mpsc::Receiver<Command>)
where
    S: CandidateStore + AssignmentStore,
{
    while let Some(command) = rx.recv().await {
        // A dropped reply receiver just means the caller stopped waiting.
        match command {
            Command::Assign {
                candidate_id,
                rank,
                reply,
            } => {
                let _ = reply.send(engine.assign(&candidate_id, rank).await);
            }
            Command::Swap { a, b, reply } => {
                let _ = reply.send(engine.swap(a, b).await);
            }
            Command::Remove { rank, reply } => {
                let _ = reply.send(engine.remove(rank).await);
            }
            Command::Place {
                candidate_id,
                rank,
                reply,
            } => {
                let _ = reply.send(engine.place_with_cascade(&candidate_id, rank).await);
            }
            Command::Reload { reply } => {
                let _ = reply.send(engine.reload().await);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(engine.positions().clone());
            }
        }
    }
    debug!(list = %engine.list_id(), "list writer stopped");
}

/// Cloneable handle to a running [`ListWriter`].
#[derive(Clone)]
pub struct ListHandle {
    tx: mpsc::Sender<Command>,
}

impl ListHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| CampaignError::WriterClosed)?;
        rx.await.map_err(|_| CampaignError::WriterClosed)
    }

    pub async fn assign(&self, candidate_id: CandidateId, rank: Rank) -> Result<()> {
        self.request(|reply| Command::Assign {
            candidate_id,
            rank,
            reply,
        })
        .await?
    }

    pub async fn swap(&self, a: Rank, b: Rank) -> Result<()> {
        self.request(|reply| Command::Swap { a, b, reply }).await?
    }

    pub async fn remove(&self, rank: Rank) -> Result<Candidate> {
        self.request(|reply| Command::Remove { rank, reply }).await?
    }

    pub async fn place_with_cascade(
        &self,
        candidate_id: CandidateId,
        rank: Rank,
    ) -> Result<CascadePlan> {
        self.request(|reply| Command::Place {
            candidate_id,
            rank,
            reply,
        })
        .await?
    }

    pub async fn reload(&self) -> Result<()> {
        self.request(|reply| Command::Reload { reply }).await?
    }

    /// Current positions, after every previously queued mutation.
    pub async fn snapshot(&self) -> Result<ListPositions> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}
