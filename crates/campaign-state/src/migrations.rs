//! SurrealDB schema migrations and initialization
//!
//! This module sets up every campaign table with the constraints the
//! engines rely on (rank uniqueness above all).

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all campaign tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing campaign SurrealDB schema");

    init_candidates_table(db).await?;
    init_list_assignments_table(db).await?;
    init_content_tables(db).await?;

    info!("Campaign schema initialization complete");
    Ok(())
}

/// Initialize `candidates` table
///
/// Schema:
/// ```text
/// TABLE candidates {
///   candidate_id:  STRING (unique)
///   first_name:    STRING
///   last_name:     STRING (indexed)
///   gender:        STRING (female | male | other)
///   birth_date:    STRING? (YYYY-MM-DD)
///   profession:    STRING
///   documents:     OBJECT
///   latitude:      FLOAT?
///   longitude:     FLOAT?
/// }
/// ```
async fn init_candidates_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing candidates table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS candidates SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_candidate_id ON TABLE candidates COLUMNS candidate_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_last_name ON TABLE candidates COLUMNS last_name;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ candidates table initialized");
    Ok(())
}

/// Initialize `list_assignments` table
///
/// Schema:
/// ```text
/// TABLE list_assignments {
///   assignment_id:  STRING (unique)
///   list_id:        STRING
///   candidate_id:   STRING
///   rank:           INT
/// }
/// ```
///
/// Constraints:
/// - `(list_id, rank)` is unique: one candidate per position
/// - `(list_id, candidate_id)` is unique: one position per candidate
async fn init_list_assignments_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing list_assignments table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS list_assignments SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_assignment_id ON TABLE list_assignments COLUMNS assignment_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_list_rank ON TABLE list_assignments COLUMNS list_id, rank UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_list_candidate ON TABLE list_assignments COLUMNS list_id, candidate_id UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ list_assignments table initialized");
    Ok(())
}

/// Initialize programme tables (`program_sections`, `section_content`,
/// `site_settings`)
async fn init_content_tables(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing content tables");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS program_sections SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_section_id ON TABLE program_sections COLUMNS section_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_section_position ON TABLE program_sections COLUMNS position;

        DEFINE TABLE IF NOT EXISTS section_content SCHEMALESS;
        DEFINE INDEX IF NOT EXISTS idx_content_id ON TABLE section_content COLUMNS content_id UNIQUE;

        DEFINE TABLE IF NOT EXISTS site_settings SCHEMALESS;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ content tables initialized");
    Ok(())
}
