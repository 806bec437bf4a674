use std::sync::Arc;

use campaign_core::electoral_list::{ElectoralList, ListWriter, Rank, Rejection};
use campaign_core::CampaignError;
use campaign_state::fakes::MemoryCampaignStore;
use campaign_state::{AssignmentStore, Candidate, CandidateId, Gender, ListId};

fn rank(n: u32) -> Rank {
    Rank::new(n).unwrap()
}

fn id(s: &str) -> CandidateId {
    CandidateId::new(s)
}

fn roster() -> Vec<Candidate> {
    vec![
        Candidate::new("a", "Alice", "Arnaud", Gender::Female),
        Candidate::new("b", "Bruno", "Bernard", Gender::Male),
        Candidate::new("c", "Chloé", "Carpentier", Gender::Female),
        Candidate::new("d", "David", "Durand", Gender::Male),
        Candidate::new("e", "Eden", "Eymard", Gender::Other),
    ]
}

async fn setup() -> (Arc<MemoryCampaignStore>, ElectoralList<MemoryCampaignStore>) {
    campaign_core::telemetry::init_tracing(false, tracing::Level::DEBUG);
    let store = Arc::new(MemoryCampaignStore::with_candidates(roster()));
    let list = ElectoralList::load(Arc::clone(&store), ListId::new("municipales"))
        .await
        .unwrap();
    (store, list)
}

async fn stored_ranks(store: &MemoryCampaignStore) -> Vec<(String, u32)> {
    let mut rows: Vec<(String, u32)> = store
        .list_assignments(&ListId::new("municipales"))
        .await
        .unwrap()
        .into_iter()
        .map(|a| (a.candidate_id.as_str().to_string(), a.rank))
        .collect();
    rows.sort_by_key(|(_, r)| *r);
    rows
}

#[tokio::test]
async fn test_worked_example() {
    let (store, mut list) = setup().await;

    // No rule yet: anything goes.
    assert!(list.compute_parity_rule().is_none());
    list.assign(&id("a"), rank(3)).await.unwrap();

    let rule = list.compute_parity_rule().unwrap();
    assert_eq!(rule.expected_for(rank(1)), Gender::Female);
    assert_eq!(rule.expected_for(rank(8)), Gender::Male);

    let err = list.assign(&id("b"), rank(7)).await.unwrap_err();
    assert!(matches!(
        err,
        CampaignError::Rejected(Rejection::ParityMismatch { .. })
    ));

    list.assign(&id("b"), rank(8)).await.unwrap();

    let before = list.positions().clone();
    let err = list.swap(rank(3), rank(8)).await.unwrap_err();
    assert!(matches!(err, CampaignError::Rejected(_)));
    assert_eq!(list.positions(), &before);

    assert_eq!(
        stored_ranks(&store).await,
        vec![("a".to_string(), 3), ("b".to_string(), 8)]
    );
}

#[tokio::test]
async fn test_occupied_rank_is_rejected_without_write() {
    let (store, mut list) = setup().await;
    list.assign(&id("a"), rank(1)).await.unwrap();
    let writes = store.writes_attempted();

    let err = list.assign(&id("c"), rank(1)).await.unwrap_err();
    assert!(matches!(
        err,
        CampaignError::Rejected(Rejection::RankOccupied { .. })
    ));
    assert_eq!(store.writes_attempted(), writes);
}

#[tokio::test]
async fn test_anchor_keeps_its_parity_class() {
    let (store, mut list) = setup().await;
    list.assign(&id("a"), rank(3)).await.unwrap();
    let before = list.positions().clone();
    let writes = store.writes_attempted();

    let err = list.assign(&id("a"), rank(4)).await.unwrap_err();
    assert!(matches!(
        err,
        CampaignError::Rejected(Rejection::ParityMismatch { .. })
    ));
    assert_eq!(list.positions(), &before);
    assert_eq!(store.writes_attempted(), writes);

    // A non-binary neighbour below the move does not lift the rule either.
    list.assign(&id("e"), rank(4)).await.unwrap();
    let writes = store.writes_attempted();
    let err = list.assign(&id("a"), rank(6)).await.unwrap_err();
    assert!(matches!(
        err,
        CampaignError::Rejected(Rejection::ParityMismatch { .. })
    ));
    assert_eq!(store.writes_attempted(), writes);

    list.assign(&id("a"), rank(5)).await.unwrap();
    assert_eq!(
        stored_ranks(&store).await,
        vec![("e".to_string(), 4), ("a".to_string(), 5)]
    );
}

#[tokio::test]
async fn test_non_binary_candidate_skips_the_gender_check() {
    let (_store, mut list) = setup().await;
    list.assign(&id("a"), rank(1)).await.unwrap();
    list.assign(&id("e"), rank(3)).await.unwrap();
    list.assign(&id("e"), rank(4)).await.unwrap();
    assert_eq!(list.positions().rank_of(&id("e")), Some(rank(4)));
}

#[tokio::test]
async fn test_failed_write_restores_pre_image() {
    let (store, mut list) = setup().await;
    list.assign(&id("a"), rank(3)).await.unwrap();
    let before = list.positions().clone();

    store.set_write_budget(Some(0));
    let err = list.assign(&id("b"), rank(8)).await.unwrap_err();
    assert!(matches!(err, CampaignError::Store(_)));
    assert_eq!(list.positions(), &before);

    let err = list.remove(rank(3)).await.unwrap_err();
    assert!(matches!(err, CampaignError::Store(_)));
    assert_eq!(list.positions(), &before);

    store.set_write_budget(None);
    assert_eq!(stored_ranks(&store).await, vec![("a".to_string(), 3)]);
}

#[tokio::test]
async fn test_interrupted_swap_reconciles_with_store() {
    let (store, mut list) = setup().await;
    list.assign(&id("a"), rank(1)).await.unwrap();
    list.assign(&id("c"), rank(3)).await.unwrap();

    // The scratch-rank swap needs three writes; let only the first through.
    store.set_write_budget(Some(1));
    let err = list.swap(rank(1), rank(3)).await.unwrap_err();
    assert!(matches!(err, CampaignError::Store(_)));

    // "a" is parked on the scratch rank in the store, so after reloading it
    // is back in the pool and memory matches the store again.
    assert_eq!(list.positions().rank_of(&id("a")), None);
    assert_eq!(list.positions().rank_of(&id("c")), Some(rank(3)));
    assert!(list.positions().pool().iter().any(|c| c.candidate_id == id("a")));
}

#[tokio::test]
async fn test_swap_into_empty_rank_is_a_move() {
    let (store, mut list) = setup().await;
    list.assign(&id("a"), rank(1)).await.unwrap();
    list.assign(&id("b"), rank(2)).await.unwrap();

    list.swap(rank(1), rank(5)).await.unwrap();
    assert_eq!(list.positions().rank_of(&id("a")), Some(rank(5)));
    assert_eq!(
        stored_ranks(&store).await,
        vec![("b".to_string(), 2), ("a".to_string(), 5)]
    );

    let err = list.swap(rank(9), rank(2)).await.unwrap_err();
    assert!(matches!(
        err,
        CampaignError::Rejected(Rejection::EmptyRank(_))
    ));
}

#[tokio::test]
async fn test_remove_returns_candidate_to_pool() {
    let (store, mut list) = setup().await;
    list.assign(&id("d"), rank(2)).await.unwrap();
    let removed = list.remove(rank(2)).await.unwrap();
    assert_eq!(removed.candidate_id, id("d"));
    assert_eq!(list.positions().filled(), 0);
    assert_eq!(list.positions().pool().len(), 5);
    assert!(stored_ranks(&store).await.is_empty());
}

#[tokio::test]
async fn test_cascade_moves_holder_forward() {
    let (store, mut list) = setup().await;
    list.assign(&id("a"), rank(1)).await.unwrap();
    list.assign(&id("b"), rank(2)).await.unwrap();
    list.assign(&id("c"), rank(3)).await.unwrap();

    let plan = list.place_with_cascade(&id("d"), rank(2)).await.unwrap();
    let displaced = plan.displaced.unwrap();
    assert_eq!(displaced.candidate_id, id("b"));
    assert_eq!(displaced.to, Some(rank(4)));

    assert_eq!(
        stored_ranks(&store).await,
        vec![
            ("a".to_string(), 1),
            ("d".to_string(), 2),
            ("c".to_string(), 3),
            ("b".to_string(), 4),
        ]
    );
    assert!(list.summary().parity_holds());
}

#[tokio::test]
async fn test_cascade_into_vacated_rank_uses_swap() {
    let (store, mut list) = setup().await;
    list.assign(&id("a"), rank(1)).await.unwrap();
    list.assign(&id("b"), rank(2)).await.unwrap();
    list.assign(&id("d"), rank(4)).await.unwrap();

    let plan = list.place_with_cascade(&id("d"), rank(2)).await.unwrap();
    assert_eq!(plan.previous_rank, Some(rank(4)));
    assert_eq!(plan.displaced.unwrap().to, Some(rank(4)));
    assert_eq!(
        stored_ranks(&store).await,
        vec![
            ("a".to_string(), 1),
            ("d".to_string(), 2),
            ("b".to_string(), 4),
        ]
    );
}

#[tokio::test]
async fn test_cascade_without_room_sends_holder_to_pool() {
    let (store, mut list) = setup().await;
    list.assign(&id("a"), rank(1)).await.unwrap();
    list.assign(&id("b"), rank(28)).await.unwrap();

    // Rank 29 expects a woman, so "b" has nowhere to go but the pool.
    let plan = list.place_with_cascade(&id("d"), rank(28)).await.unwrap();
    assert_eq!(plan.displaced.unwrap().to, None);
    assert!(list.positions().pool().iter().any(|c| c.candidate_id == id("b")));
    assert_eq!(
        stored_ranks(&store).await,
        vec![("a".to_string(), 1), ("d".to_string(), 28)]
    );
}

#[tokio::test]
async fn test_cascade_failure_after_first_write_reloads() {
    let (store, mut list) = setup().await;
    list.assign(&id("a"), rank(1)).await.unwrap();
    list.assign(&id("b"), rank(2)).await.unwrap();

    // Moving "b" to 4 succeeds, placing "d" at 2 fails.
    store.set_write_budget(Some(1));
    let err = list.place_with_cascade(&id("d"), rank(2)).await.unwrap_err();
    assert!(matches!(err, CampaignError::Store(_)));
    store.set_write_budget(None);

    assert_eq!(list.positions().rank_of(&id("b")), Some(rank(4)));
    assert_eq!(list.positions().rank_of(&id("d")), None);
    assert_eq!(
        stored_ranks(&store).await,
        vec![("a".to_string(), 1), ("b".to_string(), 4)]
    );
}

#[tokio::test]
async fn test_writer_serializes_concurrent_gestures() {
    campaign_core::telemetry::init_tracing(false, tracing::Level::INFO);
    let mut people = Vec::new();
    for i in 0..5 {
        people.push(Candidate::new(format!("f{i}"), "F", format!("F{i}"), Gender::Female));
        people.push(Candidate::new(format!("m{i}"), "M", format!("M{i}"), Gender::Male));
    }
    let store = Arc::new(MemoryCampaignStore::with_candidates(people));
    let list = ElectoralList::load(Arc::clone(&store), ListId::new("municipales"))
        .await
        .unwrap();
    let handle = ListWriter::spawn(list);

    let mut tasks = Vec::new();
    for i in 0..5u32 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move {
            h.assign(CandidateId::new(format!("f{i}")), rank(2 * i + 1)).await
        }));
        let h = handle.clone();
        tasks.push(tokio::spawn(async move {
            h.assign(CandidateId::new(format!("m{i}")), rank(2 * i + 2)).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.filled(), 10);
    assert!(snapshot.pool().is_empty());
    assert!(snapshot.summary().parity_holds());
    assert_eq!(stored_ranks(&store).await.len(), 10);

    // Cascades only look forward: "f1" skips the rank "f0" just vacated
    // and lands on the next free odd rank.
    let plan = handle
        .place_with_cascade(CandidateId::new("f0"), rank(3))
        .await
        .unwrap();
    assert_eq!(plan.displaced.unwrap().to, Some(rank(11)));
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.occupant(rank(1)).is_none());
    assert!(snapshot.summary().parity_holds());
}
