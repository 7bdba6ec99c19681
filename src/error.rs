//! Error types for the walk-report library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ReportError`] is **fatal**: the operation cannot proceed at all
//!   (non-image asset added, bad reorder, empty report, the sink refused the
//!   document). Returned as `Err(ReportError)`.
//!
//! * [`AssetResolutionError`] is **non-fatal**: a single page's asset could
//!   not be fetched or decoded, but every other page is fine. Stored in the
//!   run diagnostics of [`crate::output::GeneratedDocument`]; the page is
//!   rendered blank and generation continues.
//!
//! [`ResolveError`] is what an [`crate::pipeline::input::AssetResolver`]
//! returns; the assembler wraps it with page context.

use crate::page_list::PageId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All fatal errors returned by the walk-report library.
///
/// Per-page asset failures use [`AssetResolutionError`] and never surface
/// here.
#[derive(Debug, Error)]
pub enum ReportError {
    // ── Page list errors ──────────────────────────────────────────────────
    /// Only image assets may become report pages.
    #[error("Asset '{identifier}' is not an image and cannot be added to the report")]
    InvalidAsset { identifier: String },

    /// The proposed order is not a permutation of the current pages.
    #[error("Invalid reorder: {reason}")]
    InvalidReorder { reason: String },

    /// A serialised page list breaks the list's rules (duplicate pages or
    /// assets, non-image assets).
    #[error("Invalid page list: {reason}")]
    InvalidPageList { reason: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// Generation needs at least one page.
    #[error("Report has no pages; add at least one image before generating")]
    EmptyReport,

    /// Another generation run from the same session has not finished yet.
    #[error("A report is already being generated for this session")]
    GenerationInProgress,

    /// The PDF object graph could not be serialised.
    #[error("Failed to encode PDF: {0}")]
    PdfEncode(String),

    // ── Output sink errors ────────────────────────────────────────────────
    /// The finished document could not be persisted.
    #[error("Failed to store report '{name}': {source}")]
    SinkWrite {
        name: String,
        #[source]
        source: std::io::Error,
    },

    // ── Asset source errors ───────────────────────────────────────────────
    /// No asset with this identifier exists.
    #[error("Asset not found: '{identifier}'")]
    AssetNotFound { identifier: String },

    /// Identifiers are bare file names; separators and `..` are refused.
    #[error("Invalid asset identifier '{identifier}'")]
    InvalidIdentifier { identifier: String },

    /// Upload exceeded the configured size limit.
    #[error("Upload '{name}' is {size} bytes; the limit is {limit} bytes")]
    UploadTooLarge { name: String, size: u64, limit: u64 },

    /// Listing, writing or deleting assets failed at the I/O layer.
    #[error("Asset storage error: {source}")]
    AssetSource {
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`ReportError`], for callers that only need to
/// decide how to present a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidAsset,
    InvalidReorder,
    InvalidPageList,
    EmptyReport,
    SinkWrite,
    Busy,
    AssetSource,
    Config,
    Internal,
}

impl ReportError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReportError::InvalidAsset { .. } => ErrorKind::InvalidAsset,
            ReportError::InvalidReorder { .. } => ErrorKind::InvalidReorder,
            ReportError::InvalidPageList { .. } => ErrorKind::InvalidPageList,
            ReportError::EmptyReport => ErrorKind::EmptyReport,
            ReportError::SinkWrite { .. } => ErrorKind::SinkWrite,
            ReportError::GenerationInProgress => ErrorKind::Busy,
            ReportError::AssetNotFound { .. }
            | ReportError::InvalidIdentifier { .. }
            | ReportError::UploadTooLarge { .. }
            | ReportError::AssetSource { .. } => ErrorKind::AssetSource,
            ReportError::InvalidConfig(_) => ErrorKind::Config,
            ReportError::PdfEncode(_) | ReportError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// A non-fatal failure to obtain one page's image.
///
/// The page still occupies its slot in the document, blank.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum AssetResolutionError {
    /// The resolver could not produce the asset bytes.
    #[error("Page {position} ({identifier}): fetch failed: {detail}")]
    FetchFailed {
        page_id: PageId,
        position: usize,
        identifier: String,
        detail: String,
    },

    /// Bytes arrived but are not a decodable image.
    #[error("Page {position} ({identifier}): decode failed: {detail}")]
    DecodeFailed {
        page_id: PageId,
        position: usize,
        identifier: String,
        detail: String,
    },

    /// The resolver did not answer within the fetch timeout.
    #[error("Page {position} ({identifier}): fetch timed out after {secs}s")]
    Timeout {
        page_id: PageId,
        position: usize,
        identifier: String,
        secs: u64,
    },
}

impl AssetResolutionError {
    /// The page this failure belongs to.
    pub fn page_id(&self) -> PageId {
        match self {
            AssetResolutionError::FetchFailed { page_id, .. }
            | AssetResolutionError::DecodeFailed { page_id, .. }
            | AssetResolutionError::Timeout { page_id, .. } => *page_id,
        }
    }

    /// 0-based position of the page in the generated document.
    pub fn position(&self) -> usize {
        match self {
            AssetResolutionError::FetchFailed { position, .. }
            | AssetResolutionError::DecodeFailed { position, .. }
            | AssetResolutionError::Timeout { position, .. } => *position,
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            AssetResolutionError::FetchFailed { identifier, .. }
            | AssetResolutionError::DecodeFailed { identifier, .. }
            | AssetResolutionError::Timeout { identifier, .. } => identifier,
        }
    }
}

/// Error returned by an asset resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("asset '{identifier}' does not exist")]
    NotFound { identifier: String },

    #[error("I/O error reading '{identifier}': {source}")]
    Io {
        identifier: String,
        #[source]
        source: std::io::Error,
    },

    #[error("download of '{url}' failed: {reason}")]
    Http { url: String, reason: String },

    #[error("invalid asset identifier '{identifier}'")]
    InvalidIdentifier { identifier: String },
}
