//! Output types returned by report generation and the output sink.

use crate::error::AssetResolutionError;
use crate::page_list::PageId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A finished report, held in memory until a sink stores it.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    /// `walk-report-<timestamp>.pdf`, see [`report_filename`].
    pub filename: String,
    pub bytes: Vec<u8>,
    /// One per report page, including blank ones.
    pub page_count: usize,
    /// Per-page outcomes in document order.
    pub pages: Vec<PageOutcome>,
    /// Pages whose asset could not be resolved; those pages are blank.
    pub diagnostics: Vec<AssetResolutionError>,
    pub stats: GenerationStats,
}

impl GeneratedDocument {
    /// True when every page got its image.
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// What happened to one page during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutcome {
    pub page_id: PageId,
    pub position: usize,
    pub identifier: String,
    /// Whether the image was placed.
    pub drawn: bool,
    /// Whether a caption was drawn (layout may suppress it).
    pub captioned: bool,
    /// Source pixel size, when the asset decoded.
    pub source_size: Option<(u32, u32)>,
}

/// Aggregate statistics for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    pub total_pages: usize,
    pub drawn_pages: usize,
    pub failed_pages: usize,
    /// Bytes of the serialised PDF.
    pub document_bytes: usize,
    pub total_duration_ms: u64,
}

/// Where a sink put a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Final name; may differ from the generated filename after collision handling.
    pub stored_name: String,
    pub url: String,
}

/// One entry of a sink listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocumentInfo {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub url: String,
}

/// `walk-report-<ISO 8601 timestamp with ':' and '.' removed>.pdf`.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
/// assert_eq!(
///     walk_report::output::report_filename(at),
///     "walk-report-2024-03-09T140507000Z.pdf"
/// );
/// ```
pub fn report_filename(at: DateTime<Utc>) -> String {
    let stamp: String = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .chars()
        .filter(|c| *c != ':' && *c != '.')
        .collect();
    format!("walk-report-{stamp}.pdf")
}
