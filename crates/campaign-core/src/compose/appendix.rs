//! Appendix index: every file attached anywhere in the programme.

use campaign_state::{FileAttachment, ProgramSection};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Pdf,
    Image,
    Other,
}

impl AttachmentKind {
    /// Classify by the extension of the URL path (query and fragment ignored),
    /// falling back to the display name.
    pub fn classify(attachment: &FileAttachment) -> Self {
        match extension(&attachment.url).or_else(|| extension(&attachment.name)) {
            Some(ext) => Self::from_extension(&ext),
            None => AttachmentKind::Other,
        }
    }

    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => AttachmentKind::Pdf,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "bmp" => AttachmentKind::Image,
            _ => AttachmentKind::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttachmentKind::Pdf => "PDF",
            AttachmentKind::Image => "Image",
            AttachmentKind::Other => "Fichier",
        }
    }
}

fn extension(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppendixEntry {
    /// 1-based.
    pub number: usize,
    pub name: String,
    pub url: String,
    pub section_title: String,
    pub item_title: Option<String>,
    pub kind: AttachmentKind,
}

impl AppendixEntry {
    /// `"Section"` or `"Section › Item"`.
    pub fn owner(&self) -> String {
        match &self.item_title {
            Some(item) => format!("{} \u{203a} {}", self.section_title, item),
            None => self.section_title.clone(),
        }
    }
}

/// Flatten attachments in document order: per section, its own files first,
/// then each item's files in item order.
pub fn collect_appendix(sections: &[ProgramSection]) -> Vec<AppendixEntry> {
    let mut entries = Vec::new();
    let mut push = |attachment: &FileAttachment, section: &str, item: Option<&str>| {
        entries.push(AppendixEntry {
            number: entries.len() + 1,
            name: attachment.name.clone(),
            url: attachment.url.clone(),
            section_title: section.to_string(),
            item_title: item.map(str::to_string),
            kind: AttachmentKind::classify(attachment),
        });
    };

    for section in sections {
        for attachment in &section.attachments {
            push(attachment, &section.title, None);
        }
        for item in section.ordered_items() {
            for attachment in &item.attachments {
                push(attachment, &section.title, Some(&item.title));
            }
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_state::ProgramItem;

    fn file(name: &str, url: &str) -> FileAttachment {
        FileAttachment {
            name: name.into(),
            url: url.into(),
        }
    }

    #[test]
    fn classifies_by_extension() {
        let kind = |url: &str| AttachmentKind::classify(&file("x", url));
        assert_eq!(kind("https://cdn/x/budget.PDF?token=1"), AttachmentKind::Pdf);
        assert_eq!(kind("https://cdn/x/plan.jpeg#top"), AttachmentKind::Image);
        assert_eq!(kind("https://cdn/x/tableau.xlsx"), AttachmentKind::Other);
        assert_eq!(kind("https://cdn.example.org/download"), AttachmentKind::Other);
        assert_eq!(
            AttachmentKind::classify(&file("charte.pdf", "https://cdn/blob/123")),
            AttachmentKind::Pdf
        );
    }

    #[test]
    fn document_order_and_numbering() {
        let sections = vec![
            ProgramSection {
                section_id: "s1".into(),
                title: "Mobilité".into(),
                position: 1,
                image_url: None,
                items: vec![
                    ProgramItem {
                        item_id: "i2".into(),
                        title: "Vélo".into(),
                        position: 2,
                        image_url: None,
                        attachments: vec![file("pistes.pdf", "/f/pistes.pdf")],
                    },
                    ProgramItem {
                        item_id: "i1".into(),
                        title: "Bus".into(),
                        position: 1,
                        image_url: None,
                        attachments: vec![file("lignes.png", "/f/lignes.png")],
                    },
                ],
                attachments: vec![file("synthese.pdf", "/f/synthese.pdf")],
            },
            ProgramSection {
                section_id: "s2".into(),
                title: "Écoles".into(),
                position: 2,
                image_url: None,
                items: vec![],
                attachments: vec![file("carte.odt", "/f/carte.odt")],
            },
        ];

        let entries = collect_appendix(&sections);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["synthese.pdf", "lignes.png", "pistes.pdf", "carte.odt"]);
        assert_eq!(
            entries.iter().map(|e| e.number).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
        assert_eq!(entries[1].owner(), "Mobilité \u{203a} Bus");
        assert_eq!(entries[3].kind, AttachmentKind::Other);
    }
}
