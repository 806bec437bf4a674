//! Trait contract tests for CandidateStore, AssignmentStore and ContentStore.
//!
//! These tests verify the behavioral contracts of the storage traits
//! using the in-memory fake. Any conforming implementation must pass these.

use campaign_state::fakes::MemoryCampaignStore;
use campaign_state::storage_traits::*;
use campaign_state::{
    Candidate, CandidateId, DocumentNode, Gender, ListId, ProgramSection, SiteSettings,
    StorageError,
};

fn list() -> ListId {
    ListId::new("municipales-2026")
}

fn cid(s: &str) -> CandidateId {
    CandidateId::new(s)
}

// ===========================================================================
// AssignmentStore contract tests
// ===========================================================================

#[tokio::test]
async fn upsert_creates_row() {
    let store = MemoryCampaignStore::new();
    let row = store.upsert_assignment(&list(), &cid("a"), 1).await.unwrap();

    assert_eq!(row.rank, 1);
    assert_eq!(row.candidate_id, cid("a"));
    assert_eq!(store.list_assignments(&list()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn upsert_moves_existing_row_instead_of_duplicating() {
    let store = MemoryCampaignStore::new();
    let first = store.upsert_assignment(&list(), &cid("a"), 1).await.unwrap();
    let moved = store.upsert_assignment(&list(), &cid("a"), 7).await.unwrap();

    assert_eq!(first.assignment_id, moved.assignment_id);
    let rows = store.list_assignments(&list()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].rank, 7);
}

#[tokio::test]
async fn upsert_rejects_taken_rank() {
    let store = MemoryCampaignStore::new();
    store.upsert_assignment(&list(), &cid("a"), 3).await.unwrap();
    let err = store
        .upsert_assignment(&list(), &cid("b"), 3)
        .await
        .unwrap_err();

    match err {
        StorageError::RankConflict { rank, holder, .. } => {
            assert_eq!(rank, 3);
            assert_eq!(holder, "a");
        }
        other => panic!("expected RankConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn lists_are_isolated() {
    let store = MemoryCampaignStore::new();
    let other = ListId::new("communautaire");
    store.upsert_assignment(&list(), &cid("a"), 1).await.unwrap();
    store.upsert_assignment(&other, &cid("b"), 1).await.unwrap();

    assert_eq!(store.list_assignments(&list()).await.unwrap().len(), 1);
    assert_eq!(store.list_assignments(&other).await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_missing_assignment_is_not_found() {
    let store = MemoryCampaignStore::new();
    let row = store.upsert_assignment(&list(), &cid("a"), 1).await.unwrap();
    store.delete_assignment(&row.assignment_id).await.unwrap();

    let err = store.delete_assignment(&row.assignment_id).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn default_swap_exchanges_occupants() {
    let store = MemoryCampaignStore::new();
    store.upsert_assignment(&list(), &cid("a"), 2).await.unwrap();
    store.upsert_assignment(&list(), &cid("b"), 5).await.unwrap();

    store.swap_ranks(&list(), 2, 5).await.unwrap();

    let rows = store.list_assignments(&list()).await.unwrap();
    let rank_of = |c: &str| rows.iter().find(|r| r.candidate_id == cid(c)).unwrap().rank;
    assert_eq!(rank_of("a"), 5);
    assert_eq!(rank_of("b"), 2);
    assert!(rows.iter().all(|r| r.rank != SCRATCH_RANK));
}

#[tokio::test]
async fn default_swap_into_empty_rank_is_a_move() {
    let store = MemoryCampaignStore::new();
    store.upsert_assignment(&list(), &cid("a"), 2).await.unwrap();
    let before = store.writes_attempted();

    store.swap_ranks(&list(), 2, 9).await.unwrap();

    assert_eq!(store.writes_attempted() - before, 1);
    let rows = store.list_assignments(&list()).await.unwrap();
    assert_eq!(rows[0].rank, 9);
}

#[tokio::test]
async fn swap_from_empty_rank_is_not_found() {
    let store = MemoryCampaignStore::new();
    let err = store.swap_ranks(&list(), 4, 5).await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[tokio::test]
async fn exhausted_write_budget_fails_writes() {
    let store = MemoryCampaignStore::new();
    store.set_write_budget(Some(1));

    store.upsert_assignment(&list(), &cid("a"), 1).await.unwrap();
    let err = store
        .upsert_assignment(&list(), &cid("b"), 2)
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Unavailable(_)));
    assert_eq!(store.list_assignments(&list()).await.unwrap().len(), 1);

    store.set_write_budget(None);
    store.upsert_assignment(&list(), &cid("b"), 2).await.unwrap();
}

// ===========================================================================
// CandidateStore contract tests
// ===========================================================================

#[tokio::test]
async fn coordinates_update_known_candidate() {
    let store =
        MemoryCampaignStore::with_candidates(vec![Candidate::new("a", "Ana", "Diaz", Gender::Female)]);
    store
        .update_candidate_coordinates(&cid("a"), 43.6, 1.44)
        .await
        .unwrap();

    let candidates = store.list_candidates().await.unwrap();
    assert_eq!(candidates[0].latitude, Some(43.6));
    assert_eq!(candidates[0].longitude, Some(1.44));
}

#[tokio::test]
async fn coordinates_for_unknown_candidate_not_found() {
    let store = MemoryCampaignStore::new();
    let err = store
        .update_candidate_coordinates(&cid("ghost"), 0.0, 0.0)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

// ===========================================================================
// ContentStore contract tests
// ===========================================================================

#[tokio::test]
async fn sections_come_back_in_position_order() {
    let store = MemoryCampaignStore::new();
    for (id, pos) in [("mobilite", 2), ("ecologie", 0), ("culture", 1)] {
        store.insert_section(ProgramSection {
            section_id: id.into(),
            title: id.into(),
            position: pos,
            image_url: None,
            items: vec![],
            attachments: vec![],
        });
    }

    let ids: Vec<String> = store
        .list_sections()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.section_id)
        .collect();
    assert_eq!(ids, vec!["ecologie", "culture", "mobilite"]);
}

#[tokio::test]
async fn unknown_content_is_empty() {
    let store = MemoryCampaignStore::new();
    store.put_content("ecologie", vec![DocumentNode::paragraph("Des arbres.")]);

    assert_eq!(store.get_section_content("ecologie").await.unwrap().len(), 1);
    assert!(store.get_section_content("absent").await.unwrap().is_empty());
}

#[tokio::test]
async fn site_settings_default_until_saved() {
    let store = MemoryCampaignStore::new();
    assert_eq!(store.get_site_settings().await.unwrap(), SiteSettings::default());

    let custom = SiteSettings {
        organization_name: "Ensemble pour Lanvallay".into(),
        ..SiteSettings::default()
    };
    store.put_site_settings(custom.clone());
    assert_eq!(store.get_site_settings().await.unwrap(), custom);
}
