//! In-memory PDF writer: one page per report page.
//!
//! Built directly on the `lopdf` object model. Each page gets its own
//! resource dictionary with at most one image XObject (`/Im0`) and the shared
//! Helvetica font (`/F1`). Coordinates arrive in millimetres from the top-left
//! corner (see [`crate::layout`]) and are converted to PDF points with the
//! origin at the bottom-left.

use crate::error::ReportError;
use crate::layout::{PageGeometry, Placement};
use crate::page_list::ReportMeta;
use crate::pipeline::encode::PreparedImage;
use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

/// Points per millimetre.
pub const MM_TO_PT: f64 = 72.0 / 25.4;

const FONT_NAME: &[u8] = b"F1";
const IMAGE_NAME: &[u8] = b"Im0";
const HEADER_FONT_SIZE: f32 = 8.0;

/// What to draw on one page. Every part is optional; an empty value yields a
/// blank page.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageDraw<'a> {
    pub image: Option<(&'a PreparedImage, &'a Placement)>,
    pub caption: Option<&'a str>,
    /// Plain-text line in the top margin.
    pub header: Option<&'a str>,
}

/// Accumulates pages, then serialises the document.
pub struct PdfReport {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
    geometry: PageGeometry,
    caption_font_size: f32,
    caption_gray: f32,
}

impl PdfReport {
    pub fn new(geometry: PageGeometry, caption_font_size: f32, caption_gray: u8) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        Self {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
            geometry,
            caption_font_size,
            caption_gray: caption_gray as f32 / 255.0,
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Fill the document information dictionary.
    pub fn set_info(&mut self, meta: Option<&ReportMeta>, created: DateTime<Utc>) {
        let mut info = dictionary! {
            "Creator" => Object::string_literal("walk-report"),
            "Producer" => Object::string_literal(concat!("walk-report ", env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Object::string_literal(created.format("D:%Y%m%d%H%M%SZ").to_string()),
        };
        if let Some(meta) = meta {
            let fields = [
                ("Title", &meta.title),
                ("Subject", &meta.location),
                ("Author", &meta.crew_names),
                ("Keywords", &meta.date_time),
            ];
            for (key, value) in fields {
                if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                    info.set(key, Object::string_literal(win_ansi(v)));
                }
            }
        }
        let info_id = self.doc.add_object(info);
        self.doc.trailer.set("Info", info_id);
    }

    /// Append one page.
    pub fn add_page(&mut self, draw: PageDraw<'_>) -> Result<(), ReportError> {
        let g = self.geometry;
        let mut operations = Vec::new();
        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => self.font_id },
        };

        if let Some((image, placement)) = draw.image {
            let image_id = self.doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                image.jpeg.clone(),
            ));
            resources.set("XObject", dictionary! { "Im0" => image_id });

            let x = placement.draw_x * MM_TO_PT;
            let y = (g.height - placement.draw_y - placement.draw_height) * MM_TO_PT;
            let w = placement.draw_width * MM_TO_PT;
            let h = placement.draw_height * MM_TO_PT;
            operations.push(Operation::new("q", vec![]));
            operations.push(Operation::new(
                "cm",
                vec![real(w), real(0.0), real(0.0), real(h), real(x), real(y)],
            ));
            operations.push(Operation::new("Do", vec![Object::Name(IMAGE_NAME.to_vec())]));
            operations.push(Operation::new("Q", vec![]));

            if let (Some(text), Some(baseline)) = (draw.caption, placement.caption_baseline_y) {
                operations.extend(self.text_ops(
                    text,
                    placement.caption_x,
                    baseline,
                    self.caption_font_size,
                ));
            }
        }

        if let Some(header) = draw.header {
            // Needs room above the image for an 8 pt line.
            if g.margin >= 4.0 {
                operations.extend(self.text_ops(header, g.margin, g.margin * 0.7, HEADER_FONT_SIZE));
            }
        }

        let content = Content { operations }
            .encode()
            .map_err(|e| ReportError::PdfEncode(format!("content stream: {e}")))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                real(0.0),
                real(0.0),
                real(g.width * MM_TO_PT),
                real(g.height * MM_TO_PT),
            ],
            "Resources" => resources,
            "Contents" => content_id,
        });
        self.kids.push(page_id.into());
        debug!("PDF page {} added", self.kids.len());
        Ok(())
    }

    /// Serialise the document.
    pub fn finish(mut self) -> Result<Vec<u8>, ReportError> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| ReportError::PdfEncode(e.to_string()))?;
        Ok(bytes)
    }

    fn text_ops(&self, text: &str, x_mm: f64, baseline_mm: f64, size: f32) -> Vec<Operation> {
        let x = x_mm * MM_TO_PT;
        let y = (self.geometry.height - baseline_mm) * MM_TO_PT;
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(FONT_NAME.to_vec()), Object::Real(size)]),
            Operation::new("g", vec![Object::Real(self.caption_gray)]),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new("Tj", vec![Object::string_literal(win_ansi(text))]),
            Operation::new("ET", vec![]),
        ]
    }
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// Map text onto the single-byte WinAnsi range the base-14 font can show.
/// Latin-1 characters pass through; anything else becomes `?`.
pub fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter(|c| !c.is_control())
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::compute_placement;
    use crate::pipeline::encode::prepare_image;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn prepared(w: u32, h: u32) -> PreparedImage {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([90, 120, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        prepare_image(&buf, 2400, 85).unwrap()
    }

    #[test]
    fn win_ansi_maps_latin1_and_replaces_rest() {
        assert_eq!(win_ansi("IMG_0001.jpg"), b"IMG_0001.jpg".to_vec());
        assert_eq!(win_ansi("café"), vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(win_ansi("東京"), b"??".to_vec());
        assert_eq!(win_ansi("a\nb"), b"ab".to_vec());
    }

    #[test]
    fn writes_loadable_document_with_one_image_per_page() {
        let g = PageGeometry::A4;
        let mut pdf = PdfReport::new(g, 10.0, 100);
        pdf.set_info(
            Some(&ReportMeta {
                title: Some("Walk".into()),
                ..Default::default()
            }),
            Utc::now(),
        );

        let img = prepared(20, 10);
        let placement = compute_placement(&g, 20.0, 10.0).unwrap();
        pdf.add_page(PageDraw {
            image: Some((&img, &placement)),
            caption: Some("first (north)"),
            header: Some("Walk"),
        })
        .unwrap();
        pdf.add_page(PageDraw::default()).unwrap();
        assert_eq!(pdf.page_count(), 2);

        let bytes = pdf.finish().unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);

        let first = doc.get_dictionary(pages[&1]).unwrap();
        let resources = first.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(resources.get(b"XObject").is_ok());

        let second = doc.get_dictionary(pages[&2]).unwrap();
        let resources = second.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(resources.get(b"XObject").is_err());
    }
}
