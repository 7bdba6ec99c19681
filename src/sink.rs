//! Output sinks: where finished reports go.
//!
//! The assembler never touches storage. A [`crate::session::ReportSession`]
//! hands each successful [`GeneratedDocument`] to an [`OutputSink`] exactly
//! once; a sink error fails the whole run.

use crate::atomic_write::write_no_clobber;
use crate::output::{GeneratedDocument, StoredDocument, StoredDocumentInfo};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Persists generated documents and lists what has been stored.
pub trait OutputSink: Send + Sync {
    /// Store `document`; the returned name may differ from
    /// `document.filename` if the sink had to avoid a collision.
    fn store(&self, document: &GeneratedDocument) -> impl Future<Output = io::Result<StoredDocument>> + Send;

    /// Stored documents, newest first.
    fn list(&self) -> impl Future<Output = io::Result<Vec<StoredDocumentInfo>>> + Send;
}

/// Writes reports into a directory, served under `url_prefix`.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    url_prefix: String,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: "/pdfs".to_string(),
        }
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.url_prefix.trim_end_matches('/'), name)
    }
}

impl OutputSink for DirectorySink {
    async fn store(&self, document: &GeneratedDocument) -> io::Result<StoredDocument> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let dir = self.dir.clone();
        let filename = document.filename.clone();
        let bytes = document.bytes.clone();
        let stored_name = tokio::task::spawn_blocking(move || write_no_clobber(&dir, &filename, &bytes))
            .await
            .map_err(|e| io::Error::other(format!("sink task panicked: {e}")))??;

        debug!("Stored {} in {}", stored_name, self.dir.display());
        Ok(StoredDocument {
            url: self.url_for(&stored_name),
            stored_name,
        })
    }

    async fn list(&self) -> io::Result<Vec<StoredDocumentInfo>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut docs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.to_ascii_lowercase().ends_with(".pdf") {
                continue;
            }
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let last_modified: DateTime<Utc> = meta.modified()?.into();
            docs.push(StoredDocumentInfo {
                url: self.url_for(&name),
                name,
                size: meta.len(),
                last_modified,
            });
        }
        docs.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(docs)
    }
}
