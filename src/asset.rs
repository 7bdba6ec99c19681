//! Asset metadata as listed by an asset source.
//!
//! An [`Asset`] is immutable once listed. Report pages never own assets; they
//! hold an [`AssetRef`] (identifier plus the display name used for captions).

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static IMAGE_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|gif|bmp|webp)$").unwrap());

static AUDIO_EXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mp3|wav|m4a|ogg|webm|aac)$").unwrap());

/// What kind of media an asset holds, decided by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Audio,
    Other,
}

impl AssetKind {
    /// Classify a file name by its extension (case-insensitive).
    pub fn from_name(name: &str) -> Self {
        if IMAGE_EXT.is_match(name) {
            AssetKind::Image
        } else if AUDIO_EXT.is_match(name) {
            AssetKind::Audio
        } else {
            AssetKind::Other
        }
    }
}

/// A discovered or uploaded media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Unique, stable identifier (the stored file name or a source URL).
    pub identifier: String,
    /// Name shown to users and used as the default caption.
    pub display_name: String,
    pub kind: AssetKind,
    /// Where a client can fetch the raw file.
    pub url: String,
    pub size_bytes: u64,
    pub last_modified: DateTime<Utc>,
    /// Pixel width, when known (read from the image header or after decode).
    pub pixel_width: Option<u32>,
    pub pixel_height: Option<u32>,
}

impl Asset {
    /// Build an asset whose kind is derived from `identifier`.
    pub fn new(identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self {
            kind: AssetKind::from_name(&identifier),
            url: identifier.clone(),
            display_name: display_name.into(),
            identifier,
            size_bytes: 0,
            last_modified: Utc::now(),
            pixel_width: None,
            pixel_height: None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == AssetKind::Image
    }

    /// A non-owning reference suitable for a report page.
    pub fn to_ref(&self) -> AssetRef {
        AssetRef {
            identifier: self.identifier.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Weak reference from a report page to an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub identifier: String,
    pub display_name: String,
}

/// Keep only image assets, preserving order.
pub fn images(assets: &[Asset]) -> Vec<&Asset> {
    assets.iter().filter(|a| a.is_image()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(AssetKind::from_name("site-01.JPG"), AssetKind::Image);
        assert_eq!(AssetKind::from_name("a.jpeg"), AssetKind::Image);
        assert_eq!(AssetKind::from_name("roof.webp"), AssetKind::Image);
        assert_eq!(AssetKind::from_name("memo.m4a"), AssetKind::Audio);
        assert_eq!(AssetKind::from_name("notes.txt"), AssetKind::Other);
        assert_eq!(AssetKind::from_name("png"), AssetKind::Other);
        assert_eq!(AssetKind::from_name("photo.png.bak"), AssetKind::Other);
    }

    #[test]
    fn images_filters_non_images() {
        let assets = vec![
            Asset::new("a.png", "a.png"),
            Asset::new("b.wav", "b.wav"),
            Asset::new("c.gif", "c.gif"),
        ];
        let ids: Vec<_> = images(&assets).iter().map(|a| a.identifier.as_str()).collect();
        assert_eq!(ids, vec!["a.png", "c.gif"]);
    }

    #[test]
    fn to_ref_copies_identity() {
        let a = Asset::new("x.jpg", "Front elevation");
        let r = a.to_ref();
        assert_eq!(r.identifier, "x.jpg");
        assert_eq!(r.display_name, "Front elevation");
    }
}
