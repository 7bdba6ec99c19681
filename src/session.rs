//! A report-building session: the live page list plus one generation run at a
//! time.
//!
//! [`ReportSession`] is the explicitly owned replacement for a process-wide
//! selection. Mutations take a short lock, so each add/remove/reorder is
//! observed whole. [`ReportSession::generate_and_store`] works on a copy of
//! the list taken at the start of the run; edits made while it runs go to the
//! live list only.
//!
//! # Example
//!
//! ```rust,no_run
//! use walk_report::{Asset, DirectoryResolver, DirectorySink, ReportConfig, ReportSession};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = ReportSession::new(ReportConfig::default());
//! session.add(&Asset::new("file-1700000000000-a.jpg", "gate.jpg"))?;
//!
//! let run = session
//!     .generate_and_store(&DirectoryResolver::new("uploads"), &DirectorySink::new("pdfs"))
//!     .await?;
//! println!("{} ({} pages)", run.stored.url, run.document.page_count);
//! # Ok(())
//! # }
//! ```

use crate::asset::Asset;
use crate::assemble::{self, GenerationState};
use crate::config::ReportConfig;
use crate::error::ReportError;
use crate::output::{GeneratedDocument, StoredDocument};
use crate::page_list::{PageId, PageList, ReportMeta, ReportPage};
use crate::pipeline::input::AssetResolver;
use crate::progress::{percent, GenerationProgressCallback, ProgressCallback};
use crate::sink::OutputSink;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// A stored report together with the in-memory document it came from.
#[derive(Debug, Clone)]
pub struct GenerationRun {
    pub document: GeneratedDocument,
    pub stored: StoredDocument,
}

/// Owns the live page list, optional header metadata and the run state.
pub struct ReportSession {
    pages: Mutex<PageList>,
    meta: Mutex<Option<ReportMeta>>,
    state: Arc<Mutex<GenerationState>>,
    in_flight: AtomicBool,
    config: ReportConfig,
}

impl Default for ReportSession {
    fn default() -> Self {
        Self::new(ReportConfig::default())
    }
}

impl ReportSession {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            pages: Mutex::new(PageList::new()),
            meta: Mutex::new(None),
            state: Arc::new(Mutex::new(GenerationState::Idle)),
            in_flight: AtomicBool::new(false),
            config,
        }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    // ── Page list ─────────────────────────────────────────────────────────

    /// See [`PageList::add`].
    pub fn add(&self, asset: &Asset) -> Result<Option<PageId>, ReportError> {
        self.pages.lock().add(asset)
    }

    pub fn remove(&self, id: PageId) -> Option<ReportPage> {
        self.pages.lock().remove(id)
    }

    /// See [`PageList::reorder`].
    pub fn reorder(&self, new_order: &[PageId]) -> Result<(), ReportError> {
        self.pages.lock().reorder(new_order)
    }

    pub fn set_note(&self, id: PageId, note: Option<String>) -> bool {
        self.pages.lock().set_note(id, note)
    }

    pub fn clear(&self) {
        self.pages.lock().clear();
    }

    /// Copy of the current pages in position order.
    pub fn snapshot(&self) -> Vec<ReportPage> {
        self.pages.lock().pages().to_vec()
    }

    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.lock().is_empty()
    }

    // ── Metadata ──────────────────────────────────────────────────────────

    /// Set the report header; an all-blank value clears it.
    pub fn set_meta(&self, meta: Option<ReportMeta>) {
        *self.meta.lock() = meta.filter(|m| !m.is_empty());
    }

    pub fn meta(&self) -> Option<ReportMeta> {
        self.meta.lock().clone()
    }

    // ── Generation ────────────────────────────────────────────────────────

    pub fn state(&self) -> GenerationState {
        self.state.lock().clone()
    }

    pub fn is_generating(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Generate a report from the current pages and store it through `sink`.
    ///
    /// The sink is called exactly once, and only when assembly succeeded. On
    /// success the generated pages are removed from the live list if
    /// [`ReportConfig::clear_after_generate`] is set.
    ///
    /// Dropping the returned future abandons the run: the state returns to
    /// [`GenerationState::Idle`] and the live list is left as it is.
    ///
    /// # Errors
    /// * [`ReportError::GenerationInProgress`] if a run is already in flight.
    /// * [`ReportError::EmptyReport`] if there are no pages.
    /// * [`ReportError::SinkWrite`] if the sink could not store the document.
    pub async fn generate_and_store<R, S>(&self, resolver: &R, sink: &S) -> Result<GenerationRun, ReportError>
    where
        R: AssetResolver,
        S: OutputSink,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ReportError::GenerationInProgress);
        }
        let mut guard = RunGuard {
            session: self,
            settled: false,
        };

        let snapshot = self.snapshot();
        let meta = self.meta();
        if snapshot.is_empty() {
            guard.settled = true;
            return Err(self.fail(ReportError::EmptyReport));
        }

        info!("Starting report run with {} pages", snapshot.len());
        *self.state.lock() = GenerationState::Running {
            page_index: 0,
            progress_percent: 0,
        };

        let mut config = self.config.clone();
        config.progress_callback = Some(Arc::new(StateTracker {
            state: Arc::clone(&self.state),
            inner: self.config.progress_callback.clone(),
        }));

        let document = match assemble::generate(&snapshot, meta.as_ref(), resolver, &config).await {
            Ok(document) => document,
            Err(e) => {
                guard.settled = true;
                return Err(self.fail(e));
            }
        };
        if !document.diagnostics.is_empty() {
            warn!(
                "{} of {} pages were left blank",
                document.diagnostics.len(),
                document.page_count
            );
        }

        let stored = match sink.store(&document).await {
            Ok(stored) => stored,
            Err(source) => {
                guard.settled = true;
                return Err(self.fail(ReportError::SinkWrite {
                    name: document.filename.clone(),
                    source,
                }));
            }
        };

        if self.config.clear_after_generate {
            let ids: HashSet<PageId> = snapshot.iter().map(|p| p.id).collect();
            self.pages.lock().remove_all(&ids);
        }

        *self.state.lock() = GenerationState::Completed {
            filename: stored.stored_name.clone(),
            page_count: document.page_count,
            failed_pages: document.diagnostics.len(),
        };
        guard.settled = true;
        info!("Report stored as {}", stored.url);

        Ok(GenerationRun { document, stored })
    }

    fn fail(&self, error: ReportError) -> ReportError {
        *self.state.lock() = GenerationState::Failed {
            kind: error.kind(),
            reason: error.to_string(),
        };
        error
    }
}

/// Releases the in-flight flag; an unsettled run reverts the state to idle.
struct RunGuard<'a> {
    session: &'a ReportSession,
    settled: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Report run abandoned");
            *self.session.state.lock() = GenerationState::Idle;
        }
        self.session.in_flight.store(false, Ordering::Release);
    }
}

/// Mirrors assembler progress into the session state, then forwards to the
/// caller's callback.
struct StateTracker {
    state: Arc<Mutex<GenerationState>>,
    inner: Option<ProgressCallback>,
}

impl GenerationProgressCallback for StateTracker {
    fn on_generation_start(&self, total_pages: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_generation_start(total_pages);
        }
    }

    fn on_page_start(&self, index: usize, total: usize) {
        *self.state.lock() = GenerationState::Running {
            page_index: index,
            progress_percent: percent(index, total),
        };
        if let Some(ref cb) = self.inner {
            cb.on_page_start(index, total);
        }
    }

    fn on_page_complete(&self, index: usize, total: usize, progress: u8) {
        *self.state.lock() = GenerationState::Running {
            page_index: index,
            progress_percent: progress,
        };
        if let Some(ref cb) = self.inner {
            cb.on_page_complete(index, total, progress);
        }
    }

    fn on_page_error(&self, index: usize, total: usize, error: &str) {
        if let Some(ref cb) = self.inner {
            cb.on_page_error(index, total, error);
        }
    }

    fn on_generation_complete(&self, total_pages: usize, drawn_pages: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_generation_complete(total_pages, drawn_pages);
        }
    }
}
