//! Campaign back-office CLI
//!
//! The `campaign` command drives the two engines against the configured
//! SurrealDB store.
//!
//! ## Commands
//!
//! - `seed`: load candidates, programme sections and settings from a JSON file
//! - `list`: show or edit the electoral list (assign, swap, remove, place)
//! - `candidate locate`: record a candidate's coordinates
//! - `export`: build the programme PDF

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use campaign_core::{
    CancellationToken, ElectoralList, ExportOptions, HttpAssetFetcher, ListPositions,
    ProgramExporter, Rank,
};
use campaign_state::{
    Candidate, CandidateId, CandidateStore, ListId, ProgramSection, SiteSettings,
    SurrealCampaignStore,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "campaign")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Electoral list and programme export tools", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load candidates, sections, bodies and settings from a JSON file
    Seed {
        /// Seed file
        file: PathBuf,
    },

    /// Inspect or edit an electoral list
    List {
        /// List identifier
        #[arg(long, env = "CAMPAIGN_LIST", default_value = "municipales")]
        list: String,

        #[command(subcommand)]
        action: ListAction,
    },

    /// Candidate records
    Candidate {
        #[command(subcommand)]
        action: CandidateAction,
    },

    /// Build the complete programme PDF
    Export {
        /// Directory the PDF is written to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Generation date (YYYY-MM-DD), today by default
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Do not append PDF attachments
        #[arg(long)]
        no_merge: bool,

        /// Print the export report as JSON
        #[arg(long)]
        report: bool,
    },
}

#[derive(Subcommand)]
enum ListAction {
    /// Print the 29 ranks, the pool and the parity rule
    Show {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Place a candidate on a free rank
    Assign {
        candidate: String,
        #[arg(value_parser = parse_rank)]
        rank: Rank,
    },
    /// Exchange the occupants of two ranks
    Swap {
        #[arg(value_parser = parse_rank)]
        a: Rank,
        #[arg(value_parser = parse_rank)]
        b: Rank,
    },
    /// Send a rank's occupant back to the pool
    Remove {
        #[arg(value_parser = parse_rank)]
        rank: Rank,
    },
    /// Place a candidate, moving the current holder to the next compatible rank
    Place {
        candidate: String,
        #[arg(value_parser = parse_rank)]
        rank: Rank,
    },
    /// First free rank a candidate may take
    NextRank {
        candidate: String,
        /// Rank to start scanning from
        #[arg(long, default_value = "1")]
        from: u32,
    },
}

#[derive(Subcommand)]
enum CandidateAction {
    /// Record where a candidate lives
    Locate {
        candidate: String,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_rank(s: &str) -> std::result::Result<Rank, String> {
    let value: u32 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    Rank::new(value).ok_or_else(|| format!("rank must be between 1 and 29, got {value}"))
}

/// Contents of a `seed` file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SeedFile {
    settings: Option<SiteSettings>,
    candidates: Vec<Candidate>,
    sections: Vec<ProgramSection>,
    /// Editor JSON keyed by section or item id.
    content: BTreeMap<String, Value>,
}

fn read_seed(path: &Path) -> Result<SeedFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse seed file: {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    campaign_core::telemetry::init_tracing(cli.json, level);

    let store = Arc::new(
        SurrealCampaignStore::from_env()
            .await
            .context("Failed to connect to campaign database")?,
    );

    match cli.command {
        Commands::Seed { file } => cmd_seed(&store, &file).await,
        Commands::List { list, action } => {
            let mut engine = ElectoralList::load(Arc::clone(&store), ListId::new(&list))
                .await
                .with_context(|| format!("Failed to load list '{list}'"))?;
            cmd_list(&mut engine, action).await
        }
        Commands::Candidate { action } => match action {
            CandidateAction::Locate { candidate, lat, lng } => {
                cmd_locate(store.as_ref(), &candidate, lat, lng).await
            }
        },
        Commands::Export {
            out,
            date,
            no_merge,
            report,
        } => cmd_export(store, &out, date, no_merge, report).await,
    }
}

async fn cmd_seed(store: &SurrealCampaignStore, path: &Path) -> Result<()> {
    let seed = read_seed(path)?;

    if let Some(settings) = &seed.settings {
        store
            .put_site_settings(settings)
            .await
            .context("Failed to save site settings")?;
    }
    for candidate in &seed.candidates {
        store
            .put_candidate(candidate)
            .await
            .with_context(|| format!("Failed to save candidate '{}'", candidate.candidate_id))?;
    }
    for section in &seed.sections {
        store
            .put_section(section)
            .await
            .with_context(|| format!("Failed to save section '{}'", section.section_id))?;
    }
    for (content_id, blocks) in &seed.content {
        store
            .put_content(content_id, blocks)
            .await
            .with_context(|| format!("Failed to save content '{content_id}'"))?;
    }

    println!(
        "Seeded {} candidate(s), {} section(s), {} content bodies",
        seed.candidates.len(),
        seed.sections.len(),
        seed.content.len()
    );
    Ok(())
}

async fn cmd_list(engine: &mut ElectoralList<SurrealCampaignStore>, action: ListAction) -> Result<()> {
    match action {
        ListAction::Show { format } => {
            match format {
                OutputFormat::Text => print!("{}", render_list(engine.positions())),
                OutputFormat::Json => {
                    let view = ListView::from_positions(engine.positions());
                    println!("{}", serde_json::to_string_pretty(&view)?);
                }
            }
            Ok(())
        }
        ListAction::Assign { candidate, rank } => {
            engine
                .assign(&CandidateId::new(&candidate), rank)
                .await
                .with_context(|| format!("Cannot assign '{candidate}' to rank {rank}"))?;
            println!("Assigned {candidate} to rank {rank}");
            Ok(())
        }
        ListAction::Swap { a, b } => {
            engine
                .swap(a, b)
                .await
                .with_context(|| format!("Cannot swap ranks {a} and {b}"))?;
            println!("Swapped ranks {a} and {b}");
            Ok(())
        }
        ListAction::Remove { rank } => {
            let removed = engine
                .remove(rank)
                .await
                .with_context(|| format!("Cannot clear rank {rank}"))?;
            println!("Removed {} from rank {rank}", removed.display_name());
            Ok(())
        }
        ListAction::Place { candidate, rank } => {
            let plan = engine
                .place_with_cascade(&CandidateId::new(&candidate), rank)
                .await
                .with_context(|| format!("Cannot place '{candidate}' at rank {rank}"))?;
            println!("Placed {candidate} at rank {rank}");
            if let Some(displaced) = plan.displaced {
                match displaced.to {
                    Some(to) => println!("  {} moved from {} to {to}", displaced.candidate_id, displaced.from),
                    None => println!(
                        "  {} moved from {} back to the pool (no compatible rank left)",
                        displaced.candidate_id, displaced.from
                    ),
                }
            }
            Ok(())
        }
        ListAction::NextRank { candidate, from } => {
            match engine.find_next_available_rank(&CandidateId::new(&candidate), from) {
                Some(rank) => println!("{rank}"),
                None => {
                    warn!(candidate = %candidate, from, "no compatible free rank");
                    println!("none");
                }
            }
            Ok(())
        }
    }
}

async fn cmd_locate(
    store: &SurrealCampaignStore,
    candidate: &str,
    lat: f64,
    lng: f64,
) -> Result<()> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        anyhow::bail!("Coordinates out of range: {lat}, {lng}");
    }
    store
        .update_candidate_coordinates(&CandidateId::new(candidate), lat, lng)
        .await
        .with_context(|| format!("Failed to locate candidate '{candidate}'"))?;
    println!("Located {candidate} at {lat:.5}, {lng:.5}");
    Ok(())
}

async fn cmd_export(
    store: Arc<SurrealCampaignStore>,
    out: &Path,
    date: Option<NaiveDate>,
    no_merge: bool,
    print_report: bool,
) -> Result<()> {
    let fetcher = Arc::new(HttpAssetFetcher::from_env().context("Failed to build HTTP client")?);
    let mut options = ExportOptions::from_env().with_merge_attachments(!no_merge);
    if let Some(date) = date {
        options = options.with_generated_on(date);
    }
    let exporter = ProgramExporter::new(store, fetcher, options);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling export");
            on_interrupt.cancel();
        }
    });

    let artifact = exporter
        .export(|step| info!(step, "export progress"), &cancel)
        .await
        .context("Export failed")?;
    let path = artifact
        .write_to(out)
        .await
        .with_context(|| format!("Failed to write PDF into {}", out.display()))?;

    if print_report {
        println!("{}", serde_json::to_string_pretty(&artifact.report)?);
    }
    let report = &artifact.report;
    println!(
        "Wrote {} ({} page(s), {} attachment(s) merged)",
        path.display(),
        report.total_pages,
        report.attachments_merged.len()
    );
    if !report.images_skipped.is_empty() || !report.attachments_skipped.is_empty() {
        println!(
            "  skipped: {} image(s), {} attachment(s)",
            report.images_skipped.len(),
            report.attachments_skipped.len()
        );
    }
    Ok(())
}

/// Serializable snapshot for `list show --format json`.
#[derive(Serialize)]
struct ListView {
    ranks: Vec<RankView>,
    pool: Vec<String>,
    summary: campaign_core::ListSummary,
}

#[derive(Serialize)]
struct RankView {
    rank: u32,
    candidate_id: Option<String>,
    name: Option<String>,
    gender: Option<String>,
}

impl ListView {
    fn from_positions(positions: &ListPositions) -> Self {
        let ranks = positions
            .iter()
            .map(|(rank, occupant)| {
                let candidate = occupant.map(|o| &o.candidate);
                RankView {
                    rank: rank.get(),
                    candidate_id: candidate.map(|c| c.candidate_id.to_string()),
                    name: candidate.map(Candidate::display_name),
                    gender: candidate.map(|c| c.gender.to_string()),
                }
            })
            .collect();
        let pool = positions
            .pool_sorted_by_name()
            .into_iter()
            .map(|c| c.candidate_id.to_string())
            .collect();
        Self {
            ranks,
            pool,
            summary: positions.summary(),
        }
    }
}

fn render_list(positions: &ListPositions) -> String {
    let summary = positions.summary();
    let mut out = String::new();

    match summary.rule {
        Some(rule) => out.push_str(&format!(
            "Parity: odd ranks {}, even ranks {} (anchored at {})\n",
            rule.expected_for_odd, rule.expected_for_even, rule.anchor_rank
        )),
        None => out.push_str("Parity: no rule yet\n"),
    }
    for (rank, occupant) in positions.iter() {
        match occupant {
            Some(o) => {
                let flag = if summary.parity_violations.contains(&rank) {
                    "  !"
                } else {
                    ""
                };
                out.push_str(&format!(
                    "{:>2}. {} ({}){}\n",
                    rank.get(),
                    o.candidate.display_name(),
                    o.candidate.gender,
                    flag
                ));
            }
            None => out.push_str(&format!("{:>2}. -\n", rank.get())),
        }
    }
    out.push_str(&format!(
        "{}/29 filled, {} female, {} male, {} other, {} incomplete file(s)\n",
        summary.filled, summary.female, summary.male, summary.other, summary.incomplete_files
    ));

    let pool = positions.pool_sorted_by_name();
    if !pool.is_empty() {
        out.push_str("Pool:\n");
        for candidate in pool {
            out.push_str(&format!(
                "  {} [{}] ({})\n",
                candidate.display_name(),
                candidate.candidate_id,
                candidate.gender
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_state::{Assignment, AssignmentId, Gender};

    #[test]
    fn test_rank_argument_is_bounded() {
        assert_eq!(parse_rank("12").unwrap().get(), 12);
        assert!(parse_rank("0").is_err());
        assert!(parse_rank("30").is_err());
        assert!(parse_rank("douze").is_err());
    }

    #[test]
    fn test_cli_parses_list_commands() {
        let cli = Cli::try_parse_from(["campaign", "list", "--list", "europeennes", "place", "c7", "4"])
            .unwrap();
        match cli.command {
            Commands::List {
                list,
                action: ListAction::Place { candidate, rank },
            } => {
                assert_eq!(list, "europeennes");
                assert_eq!(candidate, "c7");
                assert_eq!(rank.get(), 4);
            }
            _ => panic!("expected list place"),
        }

        assert!(Cli::try_parse_from(["campaign", "list", "swap", "1", "40"]).is_err());
    }

    #[test]
    fn test_cli_parses_export_date() {
        let cli = Cli::try_parse_from([
            "campaign", "--json", "export", "--date", "2026-03-09", "--no-merge",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Export { date, no_merge, .. } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 3, 9));
                assert!(no_merge);
            }
            _ => panic!("expected export"),
        }
    }

    #[test]
    fn test_seed_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(
            &path,
            r#"{
                "settings": { "organization_name": "Ensemble", "document_title": "Programme 2026" },
                "candidates": [
                    { "candidate_id": "c1", "first_name": "Alice", "last_name": "Arnaud", "gender": "female" },
                    { "candidate_id": "c2", "first_name": "Sam", "last_name": "Morel", "gender": "" }
                ],
                "sections": [ { "section_id": "s1", "title": "Mobilité" } ],
                "content": { "s1": [ { "type": "paragraph", "data": { "text": "Bonjour" } } ] }
            }"#,
        )
        .unwrap();

        let seed = read_seed(&path).unwrap();
        assert_eq!(seed.candidates.len(), 2);
        assert_eq!(seed.candidates[1].gender, Gender::Other);
        assert_eq!(seed.sections[0].title, "Mobilité");
        assert_eq!(seed.settings.unwrap().primary_color, "#1d4e89");
        assert!(seed.content.contains_key("s1"));

        let err = read_seed(&dir.path().join("absent.json")).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read seed file"));
    }

    #[test]
    fn test_render_list_marks_pool_and_rule() {
        let candidates = vec![
            Candidate::new("c1", "Alice", "Arnaud", Gender::Female),
            Candidate::new("c2", "Bruno", "Bernard", Gender::Male),
        ];
        let rows = vec![Assignment {
            assignment_id: AssignmentId("row-1".to_string()),
            list_id: ListId::new("municipales"),
            candidate_id: CandidateId::new("c1"),
            rank: 3,
        }];
        let positions = ListPositions::from_records(candidates, &rows);

        let text = render_list(&positions);
        assert!(text.contains("Parity: odd ranks female, even ranks male"));
        assert!(text.contains(" 3. Alice ARNAUD (female)"));
        assert!(text.contains("Pool:\n  Bruno BERNARD [c2] (male)"));

        let view = ListView::from_positions(&positions);
        assert_eq!(view.ranks.len(), 29);
        assert_eq!(view.ranks[2].candidate_id.as_deref(), Some("c1"));
        assert_eq!(view.pool, vec!["c2".to_string()]);
    }
}
