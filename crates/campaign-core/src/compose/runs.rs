//! Inline runs: editor markup split into uniformly styled spans.
//!
//! The rich-text editor stores paragraph text as a small HTML subset:
//! `<b>`/`<strong>`, `<i>`/`<em>`, `<br>`, plus entities. Every other tag
//! is dropped and its text kept; a `<` that opens no tag stays literal.

use scraper::{ElementRef, Html, Node};

use super::fonts::FontStyle;

/// A contiguous span of text sharing one style, or a forced line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    pub line_break: bool,
}

impl InlineRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled(text, false, false)
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self::styled(text, true, false)
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self::styled(text, false, true)
    }

    pub fn styled(text: impl Into<String>, bold: bool, italic: bool) -> Self {
        Self {
            text: text.into(),
            bold,
            italic,
            line_break: false,
        }
    }

    pub fn line_break() -> Self {
        Self {
            text: String::new(),
            bold: false,
            italic: false,
            line_break: true,
        }
    }

    pub fn style(&self) -> FontStyle {
        FontStyle::from_flags(self.bold, self.italic)
    }
}

/// Split markup into runs. Adjacent runs of the same style are merged;
/// newlines count as line breaks.
pub fn parse_inline(markup: &str) -> Vec<InlineRun> {
    let fragment = Html::parse_fragment(markup);
    let mut out = Runs::default();
    walk(fragment.root_element(), false, false, &mut out);
    out.0
}

fn walk(element: ElementRef<'_>, bold: bool, italic: bool, out: &mut Runs) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.text(text, bold, italic),
            Node::Element(inner) => {
                let (bold, italic) = match inner.name() {
                    "b" | "strong" => (true, italic),
                    "i" | "em" => (bold, true),
                    "br" => {
                        out.line_break();
                        continue;
                    }
                    _ => (bold, italic),
                };
                if let Some(inner) = ElementRef::wrap(child) {
                    walk(inner, bold, italic, out);
                }
            }
            _ => {}
        }
    }
}

/// Same runs with every span forced bold (headings) or italic (quotes).
pub fn restyle(runs: Vec<InlineRun>, bold: bool, italic: bool) -> Vec<InlineRun> {
    runs.into_iter()
        .map(|mut run| {
            run.bold |= bold;
            run.italic |= italic;
            run
        })
        .collect()
}

#[derive(Default)]
struct Runs(Vec<InlineRun>);

impl Runs {
    fn text(&mut self, raw: &str, bold: bool, italic: bool) {
        if raw.is_empty() {
            return;
        }
        let mut pieces = raw.split('\n').peekable();
        while let Some(piece) = pieces.next() {
            self.push(piece, bold, italic);
            if pieces.peek().is_some() {
                self.line_break();
            }
        }
    }

    fn push(&mut self, text: &str, bold: bool, italic: bool) {
        if text.is_empty() {
            return;
        }
        if let Some(prev) = self.0.last_mut() {
            if !prev.line_break && prev.bold == bold && prev.italic == italic {
                prev.text.push_str(text);
                return;
            }
        }
        self.0.push(InlineRun::styled(text, bold, italic));
    }

    fn line_break(&mut self) {
        self.0.push(InlineRun::line_break());
    }
}
