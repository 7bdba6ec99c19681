//! Scale-to-fit placement of one image on a fixed-size page.
//!
//! All values are millimetres in a top-left page coordinate system (y grows
//! downwards), matching how the page is described to users. The PDF writer
//! converts to points and flips the y axis.
//!
//! The image is first fitted to the available width; if that makes it taller
//! than the available height it is re-fitted to the height instead. It is
//! centred horizontally and top-aligned at the margin. The caption baseline
//! sits a fixed gap below the image and is dropped when it would land inside
//! the bottom safety band.

use serde::{Deserialize, Serialize};

/// Fixed page description used for every page of a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    /// Distance from the image's bottom edge to the caption baseline.
    pub caption_gap: f64,
    /// Captions whose baseline falls within this distance of the page bottom
    /// are not drawn.
    pub bottom_safety: f64,
}

impl PageGeometry {
    /// A4 portrait, 10 mm margins, 5 mm caption gap and safety band.
    pub const A4: PageGeometry = PageGeometry {
        width: 210.0,
        height: 297.0,
        margin: 10.0,
        caption_gap: 5.0,
        bottom_safety: 5.0,
    };

    pub fn available_width(&self) -> f64 {
        self.width - 2.0 * self.margin
    }

    pub fn available_height(&self) -> f64 {
        self.height - 2.0 * self.margin
    }
}

/// Where to draw one image (and its caption) on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub draw_x: f64,
    pub draw_y: f64,
    pub draw_width: f64,
    pub draw_height: f64,
    /// Left edge of the caption text (the page margin).
    pub caption_x: f64,
    /// `None` when the caption would fall into the bottom safety band.
    pub caption_baseline_y: Option<f64>,
}

/// Compute the placement of a `source_width × source_height` pixel image.
///
/// Returns `None` when either source dimension is not positive or the page
/// leaves no room inside its margins.
pub fn compute_placement(
    geometry: &PageGeometry,
    source_width: f64,
    source_height: f64,
) -> Option<Placement> {
    let available_width = geometry.available_width();
    let available_height = geometry.available_height();
    if !(source_width > 0.0 && source_height > 0.0) {
        return None;
    }
    if !(available_width > 0.0 && available_height > 0.0) {
        return None;
    }

    let aspect_ratio = source_height / source_width;

    let mut width = available_width;
    let mut height = width * aspect_ratio;
    if height > available_height {
        height = available_height;
        width = height / aspect_ratio;
    }

    let draw_x = (geometry.width - width) / 2.0;
    let draw_y = geometry.margin;

    let baseline = draw_y + height + geometry.caption_gap;
    let caption_baseline_y = (baseline < geometry.height - geometry.bottom_safety).then_some(baseline);

    Some(Placement {
        draw_x,
        draw_y,
        draw_width: width,
        draw_height: height,
        caption_x: geometry.margin,
        caption_baseline_y,
    })
}
