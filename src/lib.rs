//! # walk-report
//!
//! Turn the photos from a site walk into a paginated PDF report: one image per
//! page, scaled to fit and centred, with its file name (or a note) as the
//! caption.
//!
//! ## Pipeline Overview
//!
//! ```text
//! AssetSource ──▶ PageList ──▶ generate ─────────────────────▶ OutputSink
//!  (list,          (add,        │
//!   upload,         remove,     ├─ 1. Input   fetch bytes (AssetResolver), prefetched
//!   delete)         reorder,    ├─ 2. Encode  decode + JPEG re-encode (spawn_blocking)
//!                   notes)      ├─ 3. Layout  scale-to-fit, centre, caption baseline
//!                               └─ 4. PDF     one page per report page (lopdf)
//! ```
//!
//! A page whose asset cannot be fetched or decoded stays in the document as a
//! blank page and is listed in the run diagnostics; only an empty report or a
//! failing sink aborts a run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use walk_report::{
//!     AssetSource, DirectoryAssetSource, DirectoryResolver, DirectorySink, ReportConfig,
//!     ReportSession,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = DirectoryAssetSource::new("uploads");
//!     let session = ReportSession::new(ReportConfig::default());
//!
//!     for asset in source.list().await?.iter().filter(|a| a.is_image()) {
//!         session.add(asset)?;
//!     }
//!
//!     let run = session
//!         .generate_and_store(&DirectoryResolver::new("uploads"), &DirectorySink::new("pdfs"))
//!         .await?;
//!     println!("{}", run.stored.url);
//!     for failure in &run.document.diagnostics {
//!         eprintln!("warning: {failure}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `walk-report` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! walk-report = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod assemble;
pub mod asset;
mod atomic_write;
pub mod config;
pub mod error;
pub mod layout;
pub mod output;
pub mod page_list;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod session;
pub mod sink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use assemble::{generate, GenerationState};
pub use asset::{Asset, AssetKind, AssetRef};
pub use config::{PageSize, ReportConfig, ReportConfigBuilder};
pub use error::{AssetResolutionError, ErrorKind, ReportError, ResolveError};
pub use layout::{compute_placement, PageGeometry, Placement};
pub use output::{GeneratedDocument, GenerationStats, PageOutcome, StoredDocument, StoredDocumentInfo};
pub use page_list::{PageId, PageList, ReportMeta, ReportPage};
pub use pipeline::input::{AssetResolver, DirectoryResolver, HttpResolver};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::{AssetSource, DirectoryAssetSource};
pub use session::{GenerationRun, ReportSession};
pub use sink::{DirectorySink, OutputSink};
