//! Structured observability hooks for list mutations and exports.
//!
//! This module provides:
//! - Export-scoped tracing spans via the `ExportSpan` RAII guard
//! - Emission functions with stable `event = "..."` names
//!
//! Events are emitted at `info!` level (failures at `warn!`). Filter with
//! `RUST_LOG`; use `--json` on the CLI for machine-readable lines.

use tracing::{info, warn};

/// RAII guard that enters an export-scoped tracing span.
///
/// # Example
///
/// ```ignore
/// let _span = ExportSpan::enter("programme-complet-2026-03-01");
/// // every log line now carries export = "programme-complet-2026-03-01"
/// ```
pub struct ExportSpan {
    _span: tracing::span::EnteredSpan,
}

impl ExportSpan {
    pub fn enter(export: &str) -> Self {
        let span = tracing::info_span!("campaign.export", export = %export);
        Self {
            _span: span.entered(),
        }
    }
}

// ---------------------------------------------------------------------------
// Electoral list
// ---------------------------------------------------------------------------

pub fn emit_list_loaded(list_id: &str, filled: usize, pool: usize) {
    info!(event = "list.loaded", list_id = %list_id, filled = filled, pool = pool);
}

pub fn emit_list_assigned(list_id: &str, candidate_id: &str, from: Option<u32>, to: u32) {
    info!(
        event = "list.assigned",
        list_id = %list_id,
        candidate_id = %candidate_id,
        from = ?from,
        to = to,
    );
}

pub fn emit_list_swapped(list_id: &str, rank_a: u32, rank_b: u32) {
    info!(event = "list.swapped", list_id = %list_id, rank_a = rank_a, rank_b = rank_b);
}

pub fn emit_list_removed(list_id: &str, candidate_id: &str, rank: u32) {
    info!(event = "list.removed", list_id = %list_id, candidate_id = %candidate_id, rank = rank);
}

/// Emit event: cascade placement, with where the displaced holder went.
pub fn emit_list_placed(
    list_id: &str,
    candidate_id: &str,
    rank: u32,
    displaced: Option<&str>,
    displaced_to: Option<u32>,
) {
    info!(
        event = "list.placed",
        list_id = %list_id,
        candidate_id = %candidate_id,
        rank = rank,
        displaced = ?displaced,
        displaced_to = ?displaced_to,
    );
}

/// Emit event: a store write failed before anything was applied.
pub fn emit_list_rollback(list_id: &str, op: &str, error: &dyn std::fmt::Display) {
    warn!(event = "list.rolled_back", list_id = %list_id, op = %op, error = %error);
}

/// Emit event: a store write failed mid-sequence; state was reloaded.
pub fn emit_list_reconciled(list_id: &str, op: &str, error: &dyn std::fmt::Display) {
    warn!(event = "list.reconciled", list_id = %list_id, op = %op, error = %error);
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

pub fn emit_export_started(file_name: &str, sections: usize) {
    info!(event = "export.started", file_name = %file_name, sections = sections);
}

pub fn emit_export_finished(
    file_name: &str,
    duration_ms: u64,
    total_pages: usize,
    images_skipped: usize,
    attachments_merged: usize,
) {
    info!(
        event = "export.finished",
        file_name = %file_name,
        duration_ms = duration_ms,
        total_pages = total_pages,
        images_skipped = images_skipped,
        attachments_merged = attachments_merged,
    );
}

/// Emit event: an image or attachment was left out (warning level).
pub fn emit_asset_skipped(kind: &str, url: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "export.asset_skipped", kind = %kind, url = %url, reason = %reason);
}

pub fn emit_attachment_merged(name: &str, pages: usize) {
    info!(event = "export.attachment_merged", name = %name, pages = pages);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_span_create() {
        let _span = ExportSpan::enter("programme-complet-2026-01-01");
        emit_list_placed("l", "a", 3, Some("b"), None);
    }
}
