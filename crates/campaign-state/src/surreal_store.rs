//! SurrealDB-backed implementation of the data-access traits
//!
//! Records are written as-is and read back with `OMIT id`, so the plain
//! record types double as row types. Rank uniqueness is enforced twice: an
//! explicit pre-check that produces `StorageError::RankConflict`, and the
//! `(list_id, rank)` unique index as the last line of defence.

use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::config::{StoreConfig, StoreTarget};
use crate::content::{parse_blocks, DocumentNode};
use crate::error::{StateError, StorageError};
use crate::migrations;
use crate::schema::{
    Assignment, AssignmentId, Candidate, CandidateId, DbSectionContent, ListId, ProgramSection,
    SiteSettings,
};
use crate::storage_traits::{
    AssignmentStore, CandidateStore, ContentStore, StorageResult, SCRATCH_RANK,
};

/// SurrealDB-backed campaign store.
#[derive(Clone)]
pub struct SurrealCampaignStore {
    db: Surreal<Any>,
}

#[derive(Debug, Deserialize)]
struct CandidateIdRow {
    #[allow(dead_code)]
    candidate_id: String,
}

impl SurrealCampaignStore {
    /// Create an in-memory instance for testing.
    pub async fn in_memory() -> crate::Result<Self> {
        Self::connect(&StoreConfig::in_memory()).await
    }

    /// Create from environment variables (see [`StoreConfig::from_env`]).
    pub async fn from_env() -> crate::Result<Self> {
        Self::connect(&StoreConfig::from_env()).await
    }

    /// Connect, authenticate if needed, select namespace/database and run
    /// the schema migrations.
    #[instrument(skip(config), fields(namespace = %config.namespace, database = %config.database))]
    pub async fn connect(config: &StoreConfig) -> crate::Result<Self> {
        if let Some(path) = config.local_path() {
            std::fs::create_dir_all(path).map_err(|e| {
                StateError::Connection(format!(
                    "Failed to create database directory {}: {}",
                    path, e
                ))
            })?;
        }

        let db = match &config.target {
            StoreTarget::Remote {
                endpoint,
                username,
                password,
                is_root,
            } => {
                let db = surrealdb::engine::any::connect(endpoint.as_str())
                    .await
                    .map_err(|e| {
                        StateError::Connection(format!("Failed to connect to {}: {}", endpoint, e))
                    })?;
                if *is_root {
                    db.signin(Root {
                        username: username.as_str(),
                        password: password.as_str(),
                    })
                    .await
                    .map_err(|e| StateError::Connection(format!("Root auth failed: {e}")))?;
                } else {
                    db.signin(Database {
                        namespace: config.namespace.as_str(),
                        database: config.database.as_str(),
                        username: username.as_str(),
                        password: password.as_str(),
                    })
                    .await
                    .map_err(|e| StateError::Connection(format!("DB auth failed: {e}")))?;
                }
                db
            }
            StoreTarget::Url(url) => surrealdb::engine::any::connect(url.as_str())
                .await
                .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?,
        };

        db.use_ns(config.namespace.as_str())
            .use_db(config.database.as_str())
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        migrations::init_schema(&db).await?;

        info!("SurrealCampaignStore connected");
        Ok(Self { db })
    }

    // -- seeding -------------------------------------------------------------

    /// Insert or replace a candidate (keyed by `candidate_id`).
    pub async fn put_candidate(&self, candidate: &Candidate) -> StorageResult<()> {
        self.db
            .query("DELETE candidates WHERE candidate_id = $cid")
            .query("CREATE candidates CONTENT $candidate RETURN NONE")
            .bind(("cid", candidate.candidate_id.0.clone()))
            .bind(("candidate", candidate.clone()))
            .await?
            .check()?;
        Ok(())
    }

    /// Insert or replace a programme section (keyed by `section_id`).
    pub async fn put_section(&self, section: &ProgramSection) -> StorageResult<()> {
        self.db
            .query("DELETE program_sections WHERE section_id = $sid")
            .query("CREATE program_sections CONTENT $section RETURN NONE")
            .bind(("sid", section.section_id.clone()))
            .bind(("section", section.clone()))
            .await?
            .check()?;
        Ok(())
    }

    /// Store the rich-text body of a section or item.
    pub async fn put_content(
        &self,
        content_id: &str,
        blocks: &serde_json::Value,
    ) -> StorageResult<()> {
        let row = DbSectionContent {
            content_id: content_id.to_string(),
            blocks_json: serde_json::to_string(blocks)?,
        };
        self.db
            .query("DELETE section_content WHERE content_id = $cid")
            .query("CREATE section_content CONTENT $row RETURN NONE")
            .bind(("cid", content_id.to_string()))
            .bind(("row", row))
            .await?
            .check()?;
        Ok(())
    }

    /// Save the site settings singleton.
    pub async fn put_site_settings(&self, settings: &SiteSettings) -> StorageResult<()> {
        self.db
            .query("UPSERT site_settings:site CONTENT $settings RETURN NONE")
            .bind(("settings", settings.clone()))
            .await?
            .check()?;
        Ok(())
    }

    // -- private helpers -----------------------------------------------------

    async fn assignment_at(&self, list_id: &ListId, rank: u32) -> StorageResult<Option<Assignment>> {
        let mut res = self
            .db
            .query("SELECT * OMIT id FROM list_assignments WHERE list_id = $list AND rank = $rank")
            .bind(("list", list_id.0.clone()))
            .bind(("rank", rank))
            .await?;
        let rows: Vec<Assignment> = res.take(0)?;
        Ok(rows.into_iter().next())
    }

    async fn assignment_of(
        &self,
        list_id: &ListId,
        candidate_id: &CandidateId,
    ) -> StorageResult<Option<Assignment>> {
        let mut res = self
            .db
            .query(
                "SELECT * OMIT id FROM list_assignments WHERE list_id = $list AND candidate_id = $cid",
            )
            .bind(("list", list_id.0.clone()))
            .bind(("cid", candidate_id.0.clone()))
            .await?;
        let rows: Vec<Assignment> = res.take(0)?;
        Ok(rows.into_iter().next())
    }
}

#[async_trait]
impl CandidateStore for SurrealCampaignStore {
    async fn list_candidates(&self) -> StorageResult<Vec<Candidate>> {
        let mut res = self
            .db
            .query("SELECT * OMIT id FROM candidates ORDER BY last_name ASC")
            .await?;
        let rows: Vec<Candidate> = res.take(0)?;
        Ok(rows)
    }

    async fn update_candidate_coordinates(
        &self,
        candidate_id: &CandidateId,
        latitude: f64,
        longitude: f64,
    ) -> StorageResult<()> {
        let mut res = self
            .db
            .query(
                "UPDATE candidates SET latitude = $lat, longitude = $lng \
                 WHERE candidate_id = $cid RETURN candidate_id",
            )
            .bind(("lat", latitude))
            .bind(("lng", longitude))
            .bind(("cid", candidate_id.0.clone()))
            .await?;
        let rows: Vec<CandidateIdRow> = res.take(0)?;
        if rows.is_empty() {
            return Err(StorageError::NotFound {
                entity: "candidate",
                id: candidate_id.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AssignmentStore for SurrealCampaignStore {
    async fn list_assignments(&self, list_id: &ListId) -> StorageResult<Vec<Assignment>> {
        let mut res = self
            .db
            .query("SELECT * OMIT id FROM list_assignments WHERE list_id = $list ORDER BY rank ASC")
            .bind(("list", list_id.0.clone()))
            .await?;
        let rows: Vec<Assignment> = res.take(0)?;
        Ok(rows)
    }

    async fn upsert_assignment(
        &self,
        list_id: &ListId,
        candidate_id: &CandidateId,
        rank: u32,
    ) -> StorageResult<Assignment> {
        if let Some(holder) = self.assignment_at(list_id, rank).await? {
            if &holder.candidate_id != candidate_id {
                return Err(StorageError::RankConflict {
                    list_id: list_id.to_string(),
                    rank,
                    holder: holder.candidate_id.to_string(),
                });
            }
        }

        match self.assignment_of(list_id, candidate_id).await? {
            Some(existing) => {
                debug!(list = %list_id, candidate = %candidate_id, from = existing.rank, to = rank, "moving assignment");
                self.db
                    .query("UPDATE list_assignments SET rank = $rank WHERE assignment_id = $aid RETURN NONE")
                    .bind(("rank", rank))
                    .bind(("aid", existing.assignment_id.0.clone()))
                    .await?
                    .check()?;
                Ok(Assignment { rank, ..existing })
            }
            None => {
                let row = Assignment {
                    assignment_id: AssignmentId::generate(),
                    list_id: list_id.clone(),
                    candidate_id: candidate_id.clone(),
                    rank,
                };
                debug!(list = %list_id, candidate = %candidate_id, rank, "creating assignment");
                self.db
                    .query("CREATE list_assignments CONTENT $row RETURN NONE")
                    .bind(("row", row.clone()))
                    .await?
                    .check()?;
                Ok(row)
            }
        }
    }

    async fn delete_assignment(&self, assignment_id: &AssignmentId) -> StorageResult<()> {
        let mut res = self
            .db
            .query("SELECT * OMIT id FROM list_assignments WHERE assignment_id = $aid")
            .bind(("aid", assignment_id.0.clone()))
            .await?;
        let rows: Vec<Assignment> = res.take(0)?;
        if rows.is_empty() {
            return Err(StorageError::NotFound {
                entity: "assignment",
                id: assignment_id.to_string(),
            });
        }

        self.db
            .query("DELETE list_assignments WHERE assignment_id = $aid")
            .bind(("aid", assignment_id.0.clone()))
            .await?
            .check()?;
        Ok(())
    }

    /// One transaction; the scratch rank keeps every statement inside it
    /// valid against the unique index.
    async fn swap_ranks(&self, list_id: &ListId, rank_a: u32, rank_b: u32) -> StorageResult<()> {
        if self.assignment_at(list_id, rank_a).await?.is_none() {
            return Err(StorageError::NotFound {
                entity: "assignment at rank",
                id: format!("{list_id}#{rank_a}"),
            });
        }

        let sql = r#"
            BEGIN TRANSACTION;
            UPDATE list_assignments SET rank = $scratch WHERE list_id = $list AND rank = $a;
            UPDATE list_assignments SET rank = $a WHERE list_id = $list AND rank = $b;
            UPDATE list_assignments SET rank = $b WHERE list_id = $list AND rank = $scratch;
            COMMIT TRANSACTION;
        "#;

        self.db
            .query(sql)
            .bind(("list", list_id.0.clone()))
            .bind(("a", rank_a))
            .bind(("b", rank_b))
            .bind(("scratch", SCRATCH_RANK))
            .await?
            .check()?;
        debug!(list = %list_id, rank_a, rank_b, "swapped ranks");
        Ok(())
    }
}

#[async_trait]
impl ContentStore for SurrealCampaignStore {
    async fn get_section_content(&self, content_id: &str) -> StorageResult<Vec<DocumentNode>> {
        let mut res = self
            .db
            .query("SELECT * OMIT id FROM section_content WHERE content_id = $cid")
            .bind(("cid", content_id.to_string()))
            .await?;
        let rows: Vec<DbSectionContent> = res.take(0)?;
        match rows.into_iter().next() {
            Some(row) => {
                let value: serde_json::Value = serde_json::from_str(&row.blocks_json)?;
                Ok(parse_blocks(&value))
            }
            None => Ok(Vec::new()),
        }
    }

    async fn list_sections(&self) -> StorageResult<Vec<ProgramSection>> {
        let mut res = self
            .db
            .query("SELECT * OMIT id FROM program_sections ORDER BY position ASC")
            .await?;
        let rows: Vec<ProgramSection> = res.take(0)?;
        Ok(rows)
    }

    async fn get_site_settings(&self) -> StorageResult<SiteSettings> {
        let mut res = self
            .db
            .query("SELECT * OMIT id FROM site_settings:site")
            .await?;
        let rows: Vec<SiteSettings> = res.take(0)?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }
}
