//! Pipeline stages for turning report pages into a PDF.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and a backend (e.g. where asset bytes come from) can be
//! swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ (layout) ──▶ pdf
//! (fetch)   (decode,    placement    (page objects,
//!            JPEG)                    captions)
//! ```
//!
//! 1. [`input`]: fetch raw asset bytes through an [`input::AssetResolver`]
//!    (uploads directory, HTTP, or a caller-supplied implementation)
//! 2. [`encode`]: decode, downscale and re-encode as baseline JPEG; runs in
//!    `spawn_blocking` because decoding large photos is CPU-bound
//! 3. [`pdf`]: append one page per report page to an in-memory PDF

pub mod encode;
pub mod input;
pub mod pdf;
