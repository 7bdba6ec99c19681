//! Progress-callback trait for per-page generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::ReportConfigBuilder::progress_callback`] to receive events
//! as the assembler draws each page. Progress is for feedback only; nothing in
//! the assembler depends on what a callback does.
//!
//! # Example
//!
//! ```rust
//! use walk_report::{GenerationProgressCallback, ReportConfig};
//! use std::sync::{Arc, atomic::{AtomicU8, Ordering}};
//!
//! struct Percent(AtomicU8);
//!
//! impl GenerationProgressCallback for Percent {
//!     fn on_page_complete(&self, _index: usize, _total: usize, percent: u8) {
//!         self.0.store(percent, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ReportConfig::builder()
//!     .progress_callback(Arc::new(Percent(AtomicU8::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the assembler as it processes each page.
///
/// Pages are drawn one at a time in position order, so events for a run
/// arrive sequentially. All methods have default no-op implementations so
/// callers only override what they care about.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once before the first page is drawn.
    fn on_generation_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when the assembler moves its cursor to a page.
    ///
    /// # Arguments
    /// * `index`: 0-based page position
    /// * `total`: pages in the run
    fn on_page_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called after a page is finished, whether or not its image resolved.
    ///
    /// # Arguments
    /// * `percent`: `round(100 * completed / total)`
    fn on_page_complete(&self, index: usize, total: usize, percent: u8) {
        let _ = (index, total, percent);
    }

    /// Called when a page's asset could not be resolved; the page is left
    /// blank. `on_page_complete` still follows.
    fn on_page_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every page has been drawn.
    ///
    /// # Arguments
    /// * `drawn_pages`: pages whose image was placed
    fn on_generation_complete(&self, total_pages: usize, drawn_pages: usize) {
        let _ = (total_pages, drawn_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReportConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;

/// `round(100 * completed / total)`, saturating at 100.
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let p = (100.0 * completed as f64 / total as f64).round();
    p.clamp(0.0, 100.0) as u8
}
