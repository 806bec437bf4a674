//! Rich-text content blocks
//!
//! The back-office editor stores a section body as a JSON array of blocks
//! shaped `{ "type": "...", "data": { ... } }` (optionally wrapped in
//! `{ "blocks": [...] }`). [`DocumentNode`] is the closed view of those blocks;
//! block types the export does not know become [`DocumentNode::Other`] and
//! are rendered from their plain text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ordered or bulleted list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListStyle {
    Ordered,
    Unordered,
}

/// One rich-text block. Text fields may contain inline markup
/// (`<b>`, `<i>`, `<br>`, entities).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawBlock", into = "RawBlock")]
pub enum DocumentNode {
    Paragraph {
        text: String,
    },
    Header {
        text: String,
        level: u8,
    },
    List {
        style: ListStyle,
        items: Vec<String>,
    },
    Quote {
        text: String,
        caption: Option<String>,
    },
    /// Any block type without a dedicated layout.
    Other {
        kind: String,
        data: Value,
    },
}

impl DocumentNode {
    pub fn paragraph(text: impl Into<String>) -> Self {
        DocumentNode::Paragraph { text: text.into() }
    }

    pub fn header(text: impl Into<String>, level: u8) -> Self {
        DocumentNode::Header {
            text: text.into(),
            level,
        }
    }

    /// Every string the block carries, joined with spaces.
    pub fn plain_text(&self) -> String {
        match self {
            DocumentNode::Paragraph { text } | DocumentNode::Header { text, .. } => text.clone(),
            DocumentNode::List { items, .. } => items.join(" "),
            DocumentNode::Quote { text, caption } => match caption {
                Some(c) if !c.is_empty() => format!("{text} {c}"),
                _ => text.clone(),
            },
            DocumentNode::Other { data, .. } => {
                let mut parts = Vec::new();
                collect_strings(data, &mut parts);
                parts.join(" ")
            }
        }
    }
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => out.push(s.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}

/// Wire shape of a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

fn str_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// List items are plain strings in older editor versions and
/// `{ "content": "...", "items": [...] }` objects (nested lists) in newer ones.
fn list_items(data: &Value) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(items) = data.get("items").and_then(Value::as_array) {
        for item in items {
            match item {
                Value::String(s) => out.push(s.clone()),
                Value::Object(_) => {
                    out.push(str_field(item, "content"));
                    out.extend(list_items(item));
                }
                _ => {}
            }
        }
    }
    out
}

impl From<RawBlock> for DocumentNode {
    fn from(raw: RawBlock) -> Self {
        let data = raw.data;
        match raw.kind.as_str() {
            "paragraph" => DocumentNode::Paragraph {
                text: str_field(&data, "text"),
            },
            "header" => DocumentNode::Header {
                text: str_field(&data, "text"),
                level: data
                    .get("level")
                    .and_then(Value::as_u64)
                    .map(|l| l.clamp(1, 6) as u8)
                    .unwrap_or(2),
            },
            "list" => DocumentNode::List {
                style: match data.get("style").and_then(Value::as_str) {
                    Some("ordered") => ListStyle::Ordered,
                    _ => ListStyle::Unordered,
                },
                items: list_items(&data),
            },
            "quote" => DocumentNode::Quote {
                text: str_field(&data, "text"),
                caption: data
                    .get("caption")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            _ => DocumentNode::Other {
                kind: raw.kind,
                data,
            },
        }
    }
}

impl From<DocumentNode> for RawBlock {
    fn from(node: DocumentNode) -> Self {
        match node {
            DocumentNode::Paragraph { text } => RawBlock {
                kind: "paragraph".into(),
                data: serde_json::json!({ "text": text }),
            },
            DocumentNode::Header { text, level } => RawBlock {
                kind: "header".into(),
                data: serde_json::json!({ "text": text, "level": level }),
            },
            DocumentNode::List { style, items } => RawBlock {
                kind: "list".into(),
                data: serde_json::json!({ "style": style, "items": items }),
            },
            DocumentNode::Quote { text, caption } => RawBlock {
                kind: "quote".into(),
                data: serde_json::json!({ "text": text, "caption": caption }),
            },
            DocumentNode::Other { kind, data } => RawBlock { kind, data },
        }
    }
}

/// Parse stored content: either a bare block array or `{ "blocks": [...] }`.
///
/// Malformed entries are skipped; a value that is neither shape yields an
/// empty body.
pub fn parse_blocks(value: &Value) -> Vec<DocumentNode> {
    let blocks = match value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("blocks").and_then(Value::as_array) {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    blocks
        .iter()
        .filter_map(|b| match serde_json::from_value::<DocumentNode>(b.clone()) {
            Ok(node) => Some(node),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed content block");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_blocks_map_to_variants() {
        let nodes = parse_blocks(&json!({
            "time": 1700000000,
            "blocks": [
                { "type": "header", "data": { "text": "Nos priorités", "level": 2 } },
                { "type": "paragraph", "data": { "text": "Une ville <b>apaisée</b>." } },
                { "type": "list", "data": { "style": "ordered", "items": ["Vélo", "Bus"] } },
                { "type": "quote", "data": { "text": "Agir local", "caption": "La tête de liste" } }
            ]
        }));

        assert_eq!(nodes.len(), 4);
        assert_eq!(nodes[0], DocumentNode::header("Nos priorités", 2));
        assert_eq!(nodes[1], DocumentNode::paragraph("Une ville <b>apaisée</b>."));
        assert_eq!(
            nodes[2],
            DocumentNode::List {
                style: ListStyle::Ordered,
                items: vec!["Vélo".into(), "Bus".into()],
            }
        );
        assert!(matches!(nodes[3], DocumentNode::Quote { .. }));
    }

    #[test]
    fn unknown_block_falls_back_to_other_with_plain_text() {
        let nodes = parse_blocks(&json!([
            { "type": "table", "data": { "content": [["Budget", "2 M€"], ["Délai", "2027"]] } }
        ]));
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            DocumentNode::Other { kind, .. } => assert_eq!(kind, "table"),
            other => panic!("expected Other, got {other:?}"),
        }
        assert_eq!(nodes[0].plain_text(), "Budget 2 M€ Délai 2027");
    }

    #[test]
    fn nested_list_items_are_flattened() {
        let nodes = parse_blocks(&json!([
            { "type": "list", "data": { "style": "unordered", "items": [
                { "content": "Parent", "items": [ { "content": "Child", "items": [] } ] }
            ] } }
        ]));
        match &nodes[0] {
            DocumentNode::List { items, style } => {
                assert_eq!(*style, ListStyle::Unordered);
                assert_eq!(items, &vec!["Parent".to_string(), "Child".to_string()]);
            }
            other => panic!("expected List, got {other:?}"),
        }
    }

    #[test]
    fn non_block_values_yield_empty_body() {
        assert!(parse_blocks(&json!("plain string")).is_empty());
        assert!(parse_blocks(&json!({ "no_blocks": true })).is_empty());
    }

    #[test]
    fn serializes_back_to_wire_shape() {
        let node = DocumentNode::header("Titre", 3);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "header");
        assert_eq!(value["data"]["level"], 3);
    }
}
