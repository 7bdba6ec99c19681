//! Asset sources: listing, uploading and deleting the media a report is built
//! from.
//!
//! [`DirectoryAssetSource`] keeps every asset as a file in one uploads
//! directory. Stored names are generated (`file-<unix millis>-<random>.<ext>`)
//! so two uploads of `IMG_0001.jpg` never collide; the stored name is the
//! asset identifier.

use crate::asset::{Asset, AssetKind};
use crate::atomic_write::write_no_clobber;
use crate::error::ReportError;
use crate::pipeline::input::is_safe_file_name;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Largest accepted upload: 50 MiB.
pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Lists, accepts and removes assets.
pub trait AssetSource: Send + Sync {
    /// Every asset, newest first.
    fn list(&self) -> impl Future<Output = Result<Vec<Asset>, ReportError>> + Send;

    /// Store `bytes` as a new asset. `display_name` is the caller's file name;
    /// its extension decides the asset kind.
    fn upload(&self, bytes: Vec<u8>, display_name: &str) -> impl Future<Output = Result<Asset, ReportError>> + Send;

    fn delete(&self, identifier: &str) -> impl Future<Output = Result<(), ReportError>> + Send;
}

/// Assets stored as files in a single directory.
#[derive(Debug, Clone)]
pub struct DirectoryAssetSource {
    dir: PathBuf,
    url_prefix: String,
    max_upload_bytes: u64,
}

impl DirectoryAssetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: "/uploads".to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AssetSource for DirectoryAssetSource {
    async fn list(&self) -> Result<Vec<Asset>, ReportError> {
        let dir = self.dir.clone();
        let prefix = self.url_prefix.clone();
        let mut assets = tokio::task::spawn_blocking(move || scan_dir(&dir, &prefix))
            .await
            .map_err(|e| ReportError::Internal(format!("listing task panicked: {e}")))?
            .map_err(|source| ReportError::AssetSource { source })?;

        assets.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| b.identifier.cmp(&a.identifier))
        });
        debug!("Listed {} assets in {}", assets.len(), self.dir.display());
        Ok(assets)
    }

    async fn upload(&self, bytes: Vec<u8>, display_name: &str) -> Result<Asset, ReportError> {
        let size = bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(ReportError::UploadTooLarge {
                name: display_name.to_string(),
                size,
                limit: self.max_upload_bytes,
            });
        }

        let io_err = |source| ReportError::AssetSource { source };
        tokio::fs::create_dir_all(&self.dir).await.map_err(io_err)?;

        let dir = self.dir.clone();
        let prefix = self.url_prefix.clone();
        let name = stored_name(display_name, Utc::now());
        let mut asset = tokio::task::spawn_blocking(move || {
            let identifier = write_no_clobber(&dir, &name, &bytes)?;
            describe_file(&dir.join(&identifier), identifier, &prefix)
        })
        .await
        .map_err(|e| ReportError::Internal(format!("upload task panicked: {e}")))?
        .map_err(io_err)?;
        asset.display_name = display_name.to_string();

        info!("Uploaded {} as {} ({} bytes)", display_name, asset.identifier, size);
        Ok(asset)
    }

    async fn delete(&self, identifier: &str) -> Result<(), ReportError> {
        if !is_safe_file_name(identifier) || identifier.starts_with('.') {
            return Err(ReportError::InvalidIdentifier {
                identifier: identifier.to_string(),
            });
        }
        match tokio::fs::remove_file(self.dir.join(identifier)).await {
            Ok(()) => {
                info!("Deleted asset {}", identifier);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ReportError::AssetNotFound {
                identifier: identifier.to_string(),
            }),
            Err(source) => Err(ReportError::AssetSource { source }),
        }
    }
}

/// `file-<unix millis>-<random>.<lowercased extension of display_name>`.
fn stored_name(display_name: &str, now: DateTime<Utc>) -> String {
    let ext = Path::new(display_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("file-{}-{}{}", now.timestamp_millis(), Uuid::new_v4().simple(), ext)
}

fn scan_dir(dir: &Path, url_prefix: &str) -> io::Result<Vec<Asset>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut assets = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // In-progress uploads and other hidden files.
        if name.starts_with('.') || !entry.file_type()?.is_file() {
            continue;
        }
        assets.push(describe_file(&entry.path(), name, url_prefix)?);
    }
    Ok(assets)
}

/// Metadata for one stored file. Blocking: reads the image header.
fn describe_file(path: &Path, name: String, url_prefix: &str) -> io::Result<Asset> {
    let meta = std::fs::metadata(path)?;
    let kind = AssetKind::from_name(&name);
    let (pixel_width, pixel_height) = if kind == AssetKind::Image {
        match image::image_dimensions(path) {
            Ok((w, h)) => (Some(w), Some(h)),
            Err(_) => (None, None),
        }
    } else {
        (None, None)
    };

    Ok(Asset {
        url: format!("{}/{}", url_prefix.trim_end_matches('/'), name),
        display_name: name.clone(),
        identifier: name,
        kind,
        size_bytes: meta.len(),
        last_modified: meta.modified()?.into(),
        pixel_width,
        pixel_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([0, 0, 0])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn stored_names_keep_extension() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let name = stored_name("IMG_0001.JPG", at);
        assert!(name.starts_with("file-1700000000123-"), "got {name}");
        assert!(name.ends_with(".jpg"));
        assert_ne!(name, stored_name("IMG_0001.JPG", at));
        assert!(!stored_name("README", at).contains('.'));
    }

    #[tokio::test]
    async fn upload_list_delete() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryAssetSource::new(dir.path());

        let photo = source.upload(png(8, 6), "north-fence.png").await.unwrap();
        assert_eq!(photo.display_name, "north-fence.png");
        assert!(photo.is_image());
        assert_eq!((photo.pixel_width, photo.pixel_height), (Some(8), Some(6)));
        assert_eq!(photo.url, format!("/uploads/{}", photo.identifier));

        let memo = source.upload(b"ID3".to_vec(), "memo.mp3").await.unwrap();
        assert_eq!(memo.kind, AssetKind::Audio);
        assert_eq!(memo.pixel_width, None);

        let listed = source.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|a| a.identifier == photo.identifier));

        source.delete(&photo.identifier).await.unwrap();
        assert_eq!(source.list().await.unwrap().len(), 1);
        assert!(matches!(
            source.delete(&photo.identifier).await,
            Err(ReportError::AssetNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_oversized_uploads_and_bad_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryAssetSource::new(dir.path()).with_max_upload_bytes(4);

        let err = source.upload(vec![0; 5], "big.jpg").await.unwrap_err();
        assert!(matches!(err, ReportError::UploadTooLarge { size: 5, limit: 4, .. }));

        assert!(matches!(
            source.delete("../etc/passwd").await,
            Err(ReportError::InvalidIdentifier { .. })
        ));
    }

    #[tokio::test]
    async fn uploads_leave_only_stored_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryAssetSource::new(dir.path().join("uploads"));

        let a = source.upload(png(4, 4), "a.png").await.unwrap();
        let b = source.upload(png(4, 4), "a.png").await.unwrap();
        assert_ne!(a.identifier, b.identifier);

        let mut on_disk: Vec<String> = std::fs::read_dir(source.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        on_disk.sort();
        let mut expected = vec![a.identifier, b.identifier];
        expected.sort();
        assert_eq!(on_disk, expected);
    }

    #[tokio::test]
    async fn upload_into_unwritable_location_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("uploads");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let source = DirectoryAssetSource::new(&blocker);

        let err = source.upload(png(4, 4), "a.png").await.unwrap_err();
        assert!(matches!(err, ReportError::AssetSource { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn double_dots_inside_a_name_are_allowed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("north..wall.png"), png(3, 2)).unwrap();
        let source = DirectoryAssetSource::new(dir.path());

        let listed = source.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].identifier, "north..wall.png");
        assert_eq!(listed[0].pixel_width, Some(3));

        source.delete("north..wall.png").await.unwrap();
        assert!(source.list().await.unwrap().is_empty());
        assert!(matches!(
            source.delete("..").await,
            Err(ReportError::InvalidIdentifier { .. })
        ));
    }

    #[tokio::test]
    async fn missing_directory_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryAssetSource::new(dir.path().join("uploads"));
        assert!(source.list().await.unwrap().is_empty());
    }
}
