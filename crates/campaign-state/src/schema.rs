//! Record types shared by every store implementation
//!
//! Records:
//! - `Candidate`: a person who may sit on the electoral list
//! - `Assignment`: one (list, rank, candidate) row
//! - `ProgramSection` / `ProgramItem`: programme structure for the export
//! - `SiteSettings`: organisation-wide settings (names, colours)
//!
//! Records are stored in SurrealDB as-is (selected with `OMIT id`); only the
//! rich-text content has a dedicated row shape, `DbSectionContent`.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Candidate identifier as issued by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        CandidateId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Electoral list identifier (one campaign may prepare several lists).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListId(pub String);

impl ListId {
    pub fn new(id: impl Into<String>) -> Self {
        ListId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ListId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a persisted assignment row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(pub String);

impl AssignmentId {
    /// Generate a new random AssignmentId
    pub fn generate() -> Self {
        AssignmentId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// Declared gender of a candidate.
///
/// Anything other than `female` / `male` (including an empty or unknown value)
/// deserializes to `Other`, which opts the candidate out of the parity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    #[serde(other)]
    Other,
}

impl Gender {
    /// `true` for `Female` and `Male`.
    pub fn is_binary(self) -> bool {
        matches!(self, Gender::Female | Gender::Male)
    }

    /// The other binary gender; `None` for `Other`.
    pub fn opposite(self) -> Option<Gender> {
        match self {
            Gender::Female => Some(Gender::Male),
            Gender::Male => Some(Gender::Female),
            Gender::Other => None,
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Gender::Female => "female",
            Gender::Male => "male",
            Gender::Other => "other",
        };
        f.write_str(s)
    }
}

/// Paperwork collected for a candidate before the list can be filed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateDocuments {
    pub has_id_document: bool,
    pub has_signed_charter: bool,
    pub has_photo: bool,
    pub has_voter_certificate: bool,
}

/// A person who may be placed on an electoral list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub candidate_id: CandidateId,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub profession: String,
    #[serde(default)]
    pub documents: CandidateDocuments,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Candidate {
    /// Create a candidate with no paperwork and no coordinates.
    pub fn new(
        candidate_id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        gender: Gender,
    ) -> Self {
        Self {
            candidate_id: CandidateId::new(candidate_id),
            first_name: first_name.into(),
            last_name: last_name.into(),
            gender,
            birth_date: None,
            profession: String::new(),
            documents: CandidateDocuments::default(),
            latitude: None,
            longitude: None,
        }
    }

    /// "First LAST" as printed on the list.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name.to_uppercase())
    }

    /// Key used to sort the pool for display (last name, then first name).
    pub fn sort_key(&self) -> (String, String) {
        (self.last_name.to_lowercase(), self.first_name.to_lowercase())
    }

    /// Age in full years on `on`, if a birth date is known.
    pub fn age_on(&self, on: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        if on < birth {
            return None;
        }
        let mut years = on.year() - birth.year();
        if (on.month(), on.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }

    /// Names of the documents still missing.
    pub fn missing_documents(&self) -> Vec<&'static str> {
        let d = &self.documents;
        let mut missing = Vec::new();
        if !d.has_id_document {
            missing.push("id_document");
        }
        if !d.has_signed_charter {
            missing.push("signed_charter");
        }
        if !d.has_photo {
            missing.push("photo");
        }
        if !d.has_voter_certificate {
            missing.push("voter_certificate");
        }
        missing
    }

    /// All paperwork collected.
    pub fn is_complete(&self) -> bool {
        self.missing_documents().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// A persisted (list, rank, candidate) row.
///
/// `rank` is a raw integer: the engine only ever produces `1..=29`, but the
/// store may briefly hold a scratch rank while a swap is in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub assignment_id: AssignmentId,
    pub list_id: ListId,
    pub candidate_id: CandidateId,
    pub rank: u32,
}

// ---------------------------------------------------------------------------
// Programme
// ---------------------------------------------------------------------------

/// A downloadable file attached to a section or an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub name: String,
    pub url: String,
}

/// An ordered sub-item of a programme section (a concrete proposal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramItem {
    pub item_id: String,
    pub title: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub attachments: Vec<FileAttachment>,
}

/// A top-level programme section.
///
/// The rich-text body is not embedded: it is fetched with
/// `ContentStore::get_section_content(section_id)`; items use their
/// `item_id` in the same keyspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSection {
    pub section_id: String,
    pub title: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub items: Vec<ProgramItem>,
    #[serde(default)]
    pub attachments: Vec<FileAttachment>,
}

impl ProgramSection {
    /// Items in display order.
    pub fn ordered_items(&self) -> Vec<&ProgramItem> {
        let mut items: Vec<&ProgramItem> = self.items.iter().collect();
        items.sort_by_key(|i| i.position);
        items
    }
}

// ---------------------------------------------------------------------------
// Site settings
// ---------------------------------------------------------------------------

/// Organisation-wide settings edited in the back-office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub organization_name: String,
    pub document_title: String,
    pub slogan: Option<String>,
    pub primary_color: String,
    pub secondary_color: String,
    pub accent_color: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            organization_name: "Liste citoyenne".to_string(),
            document_title: "Programme".to_string(),
            slogan: None,
            primary_color: "#1d4e89".to_string(),
            secondary_color: "#00b2ca".to_string(),
            accent_color: "#f79256".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// SurrealDB rows
// ---------------------------------------------------------------------------

/// `section_content` row; the editor JSON is kept verbatim as a string so
/// unknown block shapes survive the round trip untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbSectionContent {
    pub content_id: String,
    pub blocks_json: String,
}
