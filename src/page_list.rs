//! The ordered list of report pages being assembled into one document.
//!
//! [`PageList`] is an explicitly owned value: whoever drives report building
//! holds it (usually through [`crate::session::ReportSession`]). Every
//! mutation leaves `position` values as a contiguous `0..len` sequence that
//! matches iteration order, and no two pages reference the same asset.

use crate::asset::{Asset, AssetKind, AssetRef};
use crate::error::ReportError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Opaque page identifier, generated when a page is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page-{}", self.0.simple())
    }
}

/// One page of the report: one image plus an optional caption override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPage {
    pub id: PageId,
    pub asset: AssetRef,
    /// 0-based render order.
    pub position: usize,
    /// Replaces the asset's display name as the caption when set.
    pub note: Option<String>,
}

impl ReportPage {
    /// Text drawn under the image.
    pub fn caption(&self) -> &str {
        self.note.as_deref().unwrap_or(&self.asset.display_name)
    }
}

/// Optional plain-text report header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub title: Option<String>,
    pub location: Option<String>,
    pub date_time: Option<String>,
    pub crew_names: Option<String>,
}

impl ReportMeta {
    pub fn is_empty(&self) -> bool {
        self.fields().next().is_none()
    }

    /// Single header line: present fields joined with " | ".
    pub fn header_line(&self) -> Option<String> {
        let parts: Vec<&str> = self.fields().collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" | "))
        }
    }

    fn fields(&self) -> impl Iterator<Item = &str> {
        [
            &self.title,
            &self.location,
            &self.date_time,
            &self.crew_names,
        ]
        .into_iter()
        .filter_map(|f| f.as_deref().map(str::trim))
        .filter(|s| !s.is_empty())
    }
}

/// Ordered, duplicate-free sequence of [`ReportPage`]s.
///
/// Serialises as a plain array of pages. Deserialising goes through
/// [`PageList::try_from`], so a saved list is checked against the same rules
/// as one built with [`PageList::add`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ReportPage>", into = "Vec<ReportPage>")]
pub struct PageList {
    pages: Vec<ReportPage>,
}

impl PageList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pages(&self) -> &[ReportPage] {
        &self.pages
    }

    pub fn get(&self, id: PageId) -> Option<&ReportPage> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn contains_asset(&self, identifier: &str) -> bool {
        self.pages.iter().any(|p| p.asset.identifier == identifier)
    }

    /// Append a page for `asset`.
    ///
    /// Returns the new page's id, or `None` when the asset is already on a
    /// page (the list is left unchanged). Non-image assets are refused.
    pub fn add(&mut self, asset: &Asset) -> Result<Option<PageId>, ReportError> {
        if !asset.is_image() {
            return Err(ReportError::InvalidAsset {
                identifier: asset.identifier.clone(),
            });
        }
        if self.contains_asset(&asset.identifier) {
            debug!("Asset {} already in report, ignoring add", asset.identifier);
            return Ok(None);
        }

        let id = PageId::new();
        self.pages.push(ReportPage {
            id,
            asset: asset.to_ref(),
            position: self.pages.len(),
            note: None,
        });
        Ok(Some(id))
    }

    /// Delete a page. Returns the removed page, if it existed.
    pub fn remove(&mut self, id: PageId) -> Option<ReportPage> {
        let idx = self.pages.iter().position(|p| p.id == id)?;
        let removed = self.pages.remove(idx);
        self.reindex();
        Some(removed)
    }

    /// Replace the order with `new_order`, which must name every current
    /// page exactly once. On error the list is unchanged.
    pub fn reorder(&mut self, new_order: &[PageId]) -> Result<(), ReportError> {
        if new_order.len() != self.pages.len() {
            return Err(ReportError::InvalidReorder {
                reason: format!(
                    "expected {} page ids, got {}",
                    self.pages.len(),
                    new_order.len()
                ),
            });
        }

        let mut seen = HashSet::with_capacity(new_order.len());
        for id in new_order {
            if !seen.insert(*id) {
                return Err(ReportError::InvalidReorder {
                    reason: format!("page {id} listed more than once"),
                });
            }
            if self.get(*id).is_none() {
                return Err(ReportError::InvalidReorder {
                    reason: format!("page {id} is not in the report"),
                });
            }
        }

        // Every id is known and distinct, so each lookup below succeeds.
        let mut old = std::mem::take(&mut self.pages);
        let mut reordered = Vec::with_capacity(old.len());
        for id in new_order {
            if let Some(idx) = old.iter().position(|p| p.id == *id) {
                reordered.push(old.swap_remove(idx));
            }
        }
        self.pages = reordered;
        self.reindex();
        Ok(())
    }

    /// Set or clear a page's caption override. Returns `false` if the page
    /// does not exist. Blank notes clear the override.
    pub fn set_note(&mut self, id: PageId, note: Option<String>) -> bool {
        match self.pages.iter_mut().find(|p| p.id == id) {
            Some(page) => {
                page.note = note.filter(|n| !n.trim().is_empty());
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Remove every page whose id is in `ids`; used to consume a generated
    /// snapshot without touching pages added afterwards.
    pub(crate) fn remove_all(&mut self, ids: &HashSet<PageId>) {
        self.pages.retain(|p| !ids.contains(&p.id));
        self.reindex();
    }

    fn reindex(&mut self) {
        for (i, page) in self.pages.iter_mut().enumerate() {
            page.position = i;
        }
    }
}

impl TryFrom<Vec<ReportPage>> for PageList {
    type Error = ReportError;

    /// Rebuild a list from stored pages.
    ///
    /// Pages are ordered by their stored `position` (ties keep input order)
    /// and then renumbered `0..len`. Blank notes are dropped.
    ///
    /// # Errors
    /// [`ReportError::InvalidPageList`] when a page id or asset appears twice,
    /// or a page references a non-image asset.
    fn try_from(mut pages: Vec<ReportPage>) -> Result<Self, Self::Error> {
        let mut ids = HashSet::with_capacity(pages.len());
        let mut assets = HashSet::with_capacity(pages.len());
        for page in &pages {
            if !ids.insert(page.id) {
                return Err(ReportError::InvalidPageList {
                    reason: format!("{} appears more than once", page.id),
                });
            }
            if !assets.insert(page.asset.identifier.as_str()) {
                return Err(ReportError::InvalidPageList {
                    reason: format!("asset '{}' is on more than one page", page.asset.identifier),
                });
            }
            if AssetKind::from_name(&page.asset.identifier) != AssetKind::Image {
                return Err(ReportError::InvalidPageList {
                    reason: format!("asset '{}' is not an image", page.asset.identifier),
                });
            }
        }

        pages.sort_by_key(|p| p.position);
        for page in &mut pages {
            page.note = page.note.take().filter(|n| !n.trim().is_empty());
        }
        let mut list = Self { pages };
        list.reindex();
        Ok(list)
    }
}

impl From<PageList> for Vec<ReportPage> {
    fn from(list: PageList) -> Self {
        list.pages
    }
}
