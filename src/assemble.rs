//! Document assembly: page list snapshot in, finished PDF out.
//!
//! [`generate`] walks the pages strictly in position order and appends one
//! PDF page each. Asset resolution (fetch + decode) for upcoming pages runs
//! ahead of the drawing cursor, bounded by [`ReportConfig::prefetch`]; the
//! `buffered` combinator yields results in input order, so a slow asset never
//! lets a later page overtake it.
//!
//! A page whose asset cannot be resolved is drawn blank and recorded in
//! [`GeneratedDocument::diagnostics`]. Only an empty input or a serialisation
//! failure aborts the run.

use crate::config::ReportConfig;
use crate::error::{AssetResolutionError, ErrorKind, ReportError, ResolveError};
use crate::layout::compute_placement;
use crate::output::{report_filename, GeneratedDocument, GenerationStats, PageOutcome};
use crate::page_list::{PageId, ReportMeta, ReportPage};
use crate::pipeline::encode::{prepare_image_async, PreparedImage};
use crate::pipeline::input::AssetResolver;
use crate::pipeline::pdf::{PageDraw, PdfReport};
use crate::progress::percent;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Observable state of a generation run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GenerationState {
    #[default]
    Idle,
    Running {
        /// 0-based index of the page being drawn.
        page_index: usize,
        progress_percent: u8,
    },
    Completed {
        filename: String,
        page_count: usize,
        failed_pages: usize,
    },
    Failed {
        kind: ErrorKind,
        reason: String,
    },
}

impl GenerationState {
    pub fn is_running(&self) -> bool {
        matches!(self, GenerationState::Running { .. })
    }
}

/// Assemble `pages` into a PDF.
///
/// `pages` is treated as an immutable snapshot; the caller keeps ownership of
/// its live list. `meta`, when it has any non-blank field, becomes a header
/// line on the first page and the document information dictionary.
///
/// # Errors
/// * [`ReportError::EmptyReport`] when `pages` is empty; nothing is fetched.
/// * [`ReportError::PdfEncode`] when the document cannot be serialised.
///
/// Per-page resolution failures are returned in
/// [`GeneratedDocument::diagnostics`], never as `Err`.
pub async fn generate<R: AssetResolver>(
    pages: &[ReportPage],
    meta: Option<&ReportMeta>,
    resolver: &R,
    config: &ReportConfig,
) -> Result<GeneratedDocument, ReportError> {
    if pages.is_empty() {
        return Err(ReportError::EmptyReport);
    }

    let started = Instant::now();
    let created = Utc::now();
    let filename = report_filename(created);
    let total = pages.len();
    let geometry = config.geometry();

    let mut ordered: Vec<&ReportPage> = pages.iter().collect();
    ordered.sort_by_key(|p| p.position);

    info!("Generating {} ({} pages)", filename, total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(total);
    }

    let header = meta.and_then(ReportMeta::header_line);
    let mut pdf = PdfReport::new(geometry, config.caption_font_size, config.caption_gray);
    pdf.set_info(meta, created);

    // Futures are built up front from owned inputs; nothing runs until the
    // stream polls them.
    let fetches: Vec<_> = ordered
        .iter()
        .enumerate()
        .map(|(index, page)| {
            resolve_page(index, page.id, page.asset.identifier.clone(), resolver, config)
        })
        .collect();
    let mut resolved = pin!(stream::iter(fetches).buffered(config.prefetch.max(1)));

    let mut outcomes = Vec::with_capacity(total);
    let mut diagnostics = Vec::new();

    for (index, page) in ordered.iter().enumerate() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(index, total);
        }

        let result = resolved.next().await.ok_or_else(|| {
            ReportError::Internal(format!("resolution stream ended before page {index}"))
        })?;

        let header = if index == 0 { header.as_deref() } else { None };
        let mut outcome = PageOutcome {
            page_id: page.id,
            position: index,
            identifier: page.asset.identifier.clone(),
            drawn: false,
            captioned: false,
            source_size: None,
        };

        let prepared = result.and_then(|image| {
            compute_placement(&geometry, image.source_width as f64, image.source_height as f64)
                .map(|placement| (image, placement))
                .ok_or_else(|| AssetResolutionError::DecodeFailed {
                    page_id: page.id,
                    position: index,
                    identifier: page.asset.identifier.clone(),
                    detail: "image has no drawable area".to_string(),
                })
        });

        match prepared {
            Ok((image, placement)) => {
                outcome.drawn = true;
                outcome.captioned = placement.caption_baseline_y.is_some();
                outcome.source_size = Some((image.source_width, image.source_height));
                pdf.add_page(PageDraw {
                    image: Some((&image, &placement)),
                    caption: Some(page.caption()),
                    header,
                })?;
                debug!(
                    "Page {}/{} drawn: {} at {:.1}x{:.1} mm",
                    index + 1,
                    total,
                    page.asset.identifier,
                    placement.draw_width,
                    placement.draw_height
                );
            }
            Err(e) => {
                warn!("Page {}/{} left blank: {}", index + 1, total, e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_page_error(index, total, &e.to_string());
                }
                pdf.add_page(PageDraw {
                    header,
                    ..PageDraw::default()
                })?;
                diagnostics.push(e);
            }
        }
        outcomes.push(outcome);

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_complete(index, total, percent(index + 1, total));
        }
    }

    let page_count = pdf.page_count();
    let bytes = tokio::task::spawn_blocking(move || pdf.finish())
        .await
        .map_err(|e| ReportError::Internal(format!("PDF writer task panicked: {e}")))??;

    let drawn = outcomes.iter().filter(|o| o.drawn).count();
    let stats = GenerationStats {
        total_pages: total,
        drawn_pages: drawn,
        failed_pages: diagnostics.len(),
        document_bytes: bytes.len(),
        total_duration_ms: started.elapsed().as_millis() as u64,
    };

    info!(
        "Generated {}: {}/{} pages drawn, {} bytes, {}ms",
        filename, drawn, total, stats.document_bytes, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_complete(total, drawn);
    }

    Ok(GeneratedDocument {
        filename,
        bytes,
        page_count,
        pages: outcomes,
        diagnostics,
        stats,
    })
}

/// Fetch and decode one page's asset.
async fn resolve_page<R: AssetResolver>(
    index: usize,
    page_id: PageId,
    identifier: String,
    resolver: &R,
    config: &ReportConfig,
) -> Result<PreparedImage, AssetResolutionError> {
    let secs = config.fetch_timeout_secs;

    let bytes = match tokio::time::timeout(Duration::from_secs(secs), resolver.fetch(&identifier)).await {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            return Err(AssetResolutionError::FetchFailed {
                page_id,
                position: index,
                detail: describe(&e),
                identifier,
            })
        }
        Err(_) => {
            return Err(AssetResolutionError::Timeout {
                page_id,
                position: index,
                identifier,
                secs,
            })
        }
    };

    prepare_image_async(bytes, config.max_image_pixels, config.jpeg_quality)
        .await
        .map_err(|detail| AssetResolutionError::DecodeFailed {
            page_id,
            position: index,
            identifier,
            detail,
        })
}

fn describe(e: &ResolveError) -> String {
    match e {
        ResolveError::Io { source, .. } => format!("{e} ({:?})", source.kind()),
        _ => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::page_list::PageList;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::collections::HashMap;
    use std::io::Cursor;

    struct MapResolver(HashMap<String, Vec<u8>>);

    impl AssetResolver for MapResolver {
        async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, ResolveError> {
            self.0
                .get(identifier)
                .cloned()
                .ok_or_else(|| ResolveError::NotFound {
                    identifier: identifier.to_string(),
                })
        }
    }

    struct StalledResolver;

    impl AssetResolver for StalledResolver {
        async fn fetch(&self, _identifier: &str) -> Result<Vec<u8>, ResolveError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Vec::new())
        }
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    fn list(names: &[&str]) -> PageList {
        let mut list = PageList::new();
        for name in names {
            list.add(&Asset::new(*name, *name)).unwrap();
        }
        list
    }

    #[tokio::test]
    async fn empty_input_fails_fast() {
        let resolver = MapResolver(HashMap::new());
        let err = generate(&[], None, &resolver, &ReportConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::EmptyReport));
    }

    #[tokio::test]
    async fn missing_asset_becomes_blank_page() {
        let list = list(&["a.png", "gone.png"]);
        let resolver = MapResolver(HashMap::from([("a.png".to_string(), png(30, 20))]));

        let doc = generate(list.pages(), None, &resolver, &ReportConfig::default())
            .await
            .unwrap();

        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.diagnostics.len(), 1);
        assert_eq!(doc.diagnostics[0].page_id(), list.pages()[1].id);
        assert!(matches!(doc.diagnostics[0], AssetResolutionError::FetchFailed { .. }));
        assert!(doc.pages[0].drawn && doc.pages[0].captioned);
        assert!(!doc.pages[1].drawn);
        assert_eq!(doc.stats.drawn_pages, 1);
        assert!(doc.filename.starts_with("walk-report-"));
        assert!(doc.filename.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn undecodable_bytes_are_a_decode_failure() {
        let list = list(&["bad.jpg"]);
        let resolver = MapResolver(HashMap::from([("bad.jpg".to_string(), b"not a jpeg".to_vec())]));

        let doc = generate(list.pages(), None, &resolver, &ReportConfig::default())
            .await
            .unwrap();
        assert_eq!(doc.page_count, 1);
        assert!(matches!(doc.diagnostics[0], AssetResolutionError::DecodeFailed { .. }));
    }

    #[tokio::test]
    async fn slow_fetch_times_out() {
        let list = list(&["slow.png"]);
        let config = ReportConfig::builder().fetch_timeout_secs(1).build().unwrap();

        let doc = generate(list.pages(), None, &StalledResolver, &config).await.unwrap();
        assert!(matches!(
            doc.diagnostics[0],
            AssetResolutionError::Timeout { secs: 1, .. }
        ));
    }

    #[test]
    fn state_serializes_with_tag() {
        let s = GenerationState::Running {
            page_index: 1,
            progress_percent: 50,
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"state\":\"running\""), "got {json}");
        assert!(s.is_running());
        assert!(!GenerationState::Idle.is_running());
    }
}
