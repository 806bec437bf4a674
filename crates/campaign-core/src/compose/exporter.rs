//! Programme export: load content, fetch assets, lay out, serialize, merge.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use campaign_state::ContentStore;
use chrono::{Local, NaiveDate};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, instrument};

use super::appendix::AttachmentKind;
use super::document::{
    ComposedDocument, DocumentComposer, ExportLabels, FontSizes, ItemContent, ProgramContent,
    SectionContent,
};
use super::fonts::HelveticaMetrics;
use super::layout::PageGeometry;
use super::pdf::{merge_documents, render_pdf, stamp_footers, FooterStyle};
use super::toc::TocEntry;
use crate::assets::AssetFetcher;
use crate::cancel::CancellationToken;
use crate::metrics::METRICS;
use crate::obs::{self, ExportSpan};
use crate::theme::SiteTheme;
use crate::Result;

/// `programme-complet-<YYYY-MM-DD>.pdf`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("programme-complet-{}.pdf", date.format("%Y-%m-%d"))
}

/// Export configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub geometry: PageGeometry,
    pub sizes: FontSizes,
    /// Tallest an image may be drawn, in points.
    pub image_max_height: f32,
    /// Asset fetches in flight at once.
    pub fetch_concurrency: usize,
    /// Date printed on the cover and in the file name; today when unset.
    pub generated_on: Option<NaiveDate>,
    pub labels: ExportLabels,
    /// Append PDF attachments after the primary pages.
    pub merge_attachments: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            sizes: FontSizes::default(),
            image_max_height: 260.0,
            fetch_concurrency: 4,
            generated_on: None,
            labels: ExportLabels::default(),
            merge_attachments: true,
        }
    }
}

impl ExportOptions {
    /// Defaults, with `CAMPAIGN_EXPORT_CONCURRENCY` and
    /// `CAMPAIGN_EXPORT_IMAGE_MAX_HEIGHT` applied when set.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(n) = std::env::var("CAMPAIGN_EXPORT_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            options = options.with_fetch_concurrency(n);
        }
        if let Some(h) = std::env::var("CAMPAIGN_EXPORT_IMAGE_MAX_HEIGHT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            options.image_max_height = h;
        }
        options
    }

    pub fn with_generated_on(mut self, date: NaiveDate) -> Self {
        self.generated_on = Some(date);
        self
    }

    pub fn with_fetch_concurrency(mut self, n: usize) -> Self {
        self.fetch_concurrency = n.max(1);
        self
    }

    pub fn with_merge_attachments(mut self, merge: bool) -> Self {
        self.merge_attachments = merge;
        self
    }

    pub fn with_labels(mut self, labels: ExportLabels) -> Self {
        self.labels = labels;
        self
    }
}

/// What went into the artifact and what was left out.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub sections_rendered: usize,
    pub primary_pages: usize,
    pub total_pages: usize,
    pub images_placed: usize,
    pub images_skipped: Vec<String>,
    pub attachments_merged: Vec<(String, usize)>,
    pub attachments_skipped: Vec<(String, String)>,
    pub toc: Vec<TocEntry>,
}

/// The finished download.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub report: ExportReport,
}

impl ExportArtifact {
    /// Write the PDF into `dir` under its file name.
    pub async fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

/// Builds the complete programme PDF from a content store.
pub struct ProgramExporter<D, F> {
    store: Arc<D>,
    fetcher: Arc<F>,
    options: ExportOptions,
}

impl<D, F> ProgramExporter<D, F>
where
    D: ContentStore,
    F: AssetFetcher,
{
    pub fn new(store: Arc<D>, fetcher: Arc<F>, options: ExportOptions) -> Self {
        Self {
            store,
            fetcher,
            options,
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Settings, sections in position order, and every body.
    #[instrument(skip(self))]
    pub async fn load_content(&self) -> Result<ProgramContent> {
        let settings = self.store.get_site_settings().await?;
        let mut sections = self.store.list_sections().await?;
        sections.sort_by_key(|s| s.position);

        let mut out = Vec::with_capacity(sections.len());
        for section in sections {
            let body = self.store.get_section_content(&section.section_id).await?;
            let mut items = Vec::with_capacity(section.items.len());
            for item in section.ordered_items() {
                let item_body = self.store.get_section_content(&item.item_id).await?;
                items.push(ItemContent {
                    item: item.clone(),
                    body: item_body,
                });
            }
            out.push(SectionContent {
                section,
                body,
                items,
            });
        }

        Ok(ProgramContent {
            theme: SiteTheme::from_settings(&settings),
            sections: out,
        })
    }

    /// Fetch `urls` concurrently. Failed fetches are logged and left out.
    async fn fetch_images(
        &self,
        urls: &[String],
        progress: &mut dyn FnMut(&str),
        cancel: &CancellationToken,
    ) -> Result<HashMap<String, Vec<u8>>> {
        let total = urls.len();
        let mut fetches = stream::iter(urls.iter().cloned())
            .map(|url| {
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    let res = fetcher.fetch_binary(&url).await;
                    (url, res)
                }
            })
            .buffer_unordered(self.options.fetch_concurrency.max(1));

        let mut images = HashMap::with_capacity(total);
        let mut done = 0;
        while let Some((url, res)) = fetches.next().await {
            cancel.check()?;
            done += 1;
            progress(&format!("Chargement des images ({done}/{total})"));
            match res {
                Ok(bytes) => {
                    METRICS.inc_assets_fetched();
                    images.insert(url, bytes);
                }
                Err(e) => {
                    METRICS.inc_assets_skipped();
                    obs::emit_asset_skipped("image", &url, &e);
                }
            }
        }
        Ok(images)
    }

    /// Lay out `content` with already fetched `images`.
    pub fn compose(
        &self,
        content: &ProgramContent,
        images: &HashMap<String, Vec<u8>>,
        generated_on: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<ComposedDocument> {
        let composer = DocumentComposer {
            geometry: self.options.geometry,
            sizes: self.options.sizes,
            labels: &self.options.labels,
            theme: &content.theme,
            measurer: &HelveticaMetrics,
            image_max_height: self.options.image_max_height,
            generated_on,
        };
        composer.compose(content, images, cancel)
    }

    /// `"<title> | <org> - Page n/total"` in the bottom margin.
    fn footer_style(&self, theme: &SiteTheme) -> FooterStyle {
        FooterStyle {
            size: self.options.sizes.footer,
            color: theme.muted,
            baseline: self.options.geometry.margin_bottom / 2.0,
        }
    }

    /// Run the whole export. `progress` receives coarse milestone messages;
    /// `cancel` is honoured between sections and between attachments.
    #[instrument(skip_all)]
    pub async fn export<P>(&self, mut progress: P, cancel: &CancellationToken) -> Result<ExportArtifact>
    where
        P: FnMut(&str),
    {
        let started = Instant::now();
        let generated_on = self
            .options
            .generated_on
            .unwrap_or_else(|| Local::now().date_naive());
        let file_name = export_file_name(generated_on);
        let _span = ExportSpan::enter(&file_name);

        progress("Préparation du contenu");
        let content = self.load_content().await?;
        obs::emit_export_started(&file_name, content.sections.len());
        cancel.check()?;

        let images = self
            .fetch_images(&content.image_urls(), &mut progress, cancel)
            .await?;

        progress("Mise en page");
        let composed = self.compose(&content, &images, generated_on, cancel)?;
        let primary = render_pdf(&composed.canvas, &content.theme.document_title)?;
        let primary_pages = composed.canvas.page_count();

        let mut report = ExportReport {
            sections_rendered: composed.sections_rendered,
            primary_pages,
            total_pages: primary_pages,
            images_placed: composed.images_placed,
            images_skipped: composed.images_skipped.clone(),
            toc: composed.toc.entries().to_vec(),
            ..ExportReport::default()
        };

        let bytes = if self.options.merge_attachments {
            self.merge_attachments(primary, &composed, &mut report, &mut progress, cancel)
                .await?
        } else {
            primary
        };
        let theme = &content.theme;
        let bytes = stamp_footers(&bytes, self.footer_style(theme), &HelveticaMetrics, |page, total| {
            theme.footer_text(page, total)
        })?;

        progress("Téléchargement prêt");
        METRICS.inc_exports();
        obs::emit_export_finished(
            &file_name,
            started.elapsed().as_millis() as u64,
            report.total_pages,
            report.images_skipped.len(),
            report.attachments_merged.len(),
        );
        info!(file_name = %file_name, bytes = bytes.len(), "export ready");

        Ok(ExportArtifact {
            file_name,
            bytes,
            report,
        })
    }

    /// Fetch the PDF attachments (in appendix order) and append them.
    async fn merge_attachments(
        &self,
        primary: Vec<u8>,
        composed: &ComposedDocument,
        report: &mut ExportReport,
        progress: &mut dyn FnMut(&str),
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let pdfs: Vec<(String, String)> = composed
            .appendix
            .iter()
            .filter(|e| e.kind == AttachmentKind::Pdf)
            .map(|e| (e.name.clone(), e.url.clone()))
            .collect();
        if pdfs.is_empty() {
            return Ok(primary);
        }

        let total = pdfs.len();
        let mut fetches = stream::iter(pdfs)
            .map(|(name, url)| {
                let fetcher = Arc::clone(&self.fetcher);
                async move {
                    let res = fetcher.fetch_binary(&url).await;
                    (name, url, res)
                }
            })
            .buffered(self.options.fetch_concurrency.max(1));

        let mut fetched = Vec::with_capacity(total);
        let mut done = 0;
        while let Some((name, url, res)) = fetches.next().await {
            cancel.check()?;
            done += 1;
            progress(&format!(
                "Fusion de la pièce jointe \u{ab} {name} \u{bb} ({done}/{total})"
            ));
            match res {
                Ok(bytes) => {
                    METRICS.inc_assets_fetched();
                    fetched.push((name, bytes));
                }
                Err(e) => {
                    METRICS.inc_assets_skipped();
                    obs::emit_asset_skipped("attachment", &url, &e);
                    report.attachments_skipped.push((name, e.to_string()));
                }
            }
        }
        cancel.check()?;

        let outcome = merge_documents(&primary, &fetched)?;
        for _ in &outcome.skipped {
            METRICS.inc_assets_skipped();
        }
        report.attachments_merged = outcome.merged;
        report.attachments_skipped.extend(outcome.skipped);
        report.total_pages = outcome.total_pages;
        Ok(outcome.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_pattern() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(export_file_name(date), "programme-complet-2026-03-09.pdf");
    }

    #[test]
    fn options_builders() {
        let o = ExportOptions::default()
            .with_fetch_concurrency(0)
            .with_merge_attachments(false);
        assert_eq!(o.fetch_concurrency, 1);
        assert!(!o.merge_attachments);
        assert!(o.generated_on.is_none());
    }
}
