//! Integration tests for report generation.
//!
//! Everything runs against in-memory resolvers or scratch directories; fixture
//! images are generated on the fly, and produced PDFs are inspected with
//! `lopdf`.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::Document;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use walk_report::{
    generate, Asset, AssetResolutionError, AssetResolver, AssetSource, DirectoryAssetSource,
    DirectoryResolver, DirectorySink, GenerationProgressCallback, GenerationState,
    NoopProgressCallback, OutputSink, PageList, ReportConfig, ReportError, ReportMeta,
    ReportSession, ResolveError,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Route library logs through the test harness; `RUST_LOG` overrides the
/// default filter.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("walk_report=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([120, 130, 140])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

/// Serves fixed bytes after a per-asset delay and records completion order.
#[derive(Default)]
struct FixtureResolver {
    assets: HashMap<String, (Vec<u8>, Duration)>,
    completed: Mutex<Vec<String>>,
}

impl FixtureResolver {
    fn with(mut self, id: &str, bytes: Vec<u8>, delay_ms: u64) -> Self {
        self.assets
            .insert(id.to_string(), (bytes, Duration::from_millis(delay_ms)));
        self
    }
}

impl AssetResolver for FixtureResolver {
    async fn fetch(&self, identifier: &str) -> Result<Vec<u8>, ResolveError> {
        let (bytes, delay) = self
            .assets
            .get(identifier)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound {
                identifier: identifier.to_string(),
            })?;
        tokio::time::sleep(delay).await;
        self.completed.lock().push(identifier.to_string());
        Ok(bytes)
    }
}

fn page_list(ids: &[&str]) -> PageList {
    let mut list = PageList::new();
    for id in ids {
        list.add(&Asset::new(*id, *id)).unwrap();
    }
    list
}

/// Pixel width of the image on each page, `None` for blank pages.
fn image_widths(pdf: &[u8]) -> Vec<Option<i64>> {
    let doc = Document::load_mem(pdf).unwrap();
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let page = doc.get_dictionary(page_id).unwrap();
            let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
            let xobjects = resources.get(b"XObject").ok()?.as_dict().unwrap();
            let image_ref = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
            let stream = doc.get_object(image_ref).unwrap().as_stream().unwrap();
            Some(stream.dict.get(b"Width").unwrap().as_i64().unwrap())
        })
        .collect()
}

#[derive(Default)]
struct RecordingCallback {
    percents: Mutex<Vec<u8>>,
    errors: AtomicUsize,
    started_with: AtomicUsize,
}

impl GenerationProgressCallback for RecordingCallback {
    fn on_generation_start(&self, total_pages: usize) {
        self.started_with.store(total_pages, Ordering::SeqCst);
    }

    fn on_page_complete(&self, _index: usize, _total: usize, percent: u8) {
        self.percents.lock().push(percent);
    }

    fn on_page_error(&self, _index: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

// ── Assembler ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_asset_leaves_one_blank_page_and_one_diagnostic() {
    init_tracing();
    let list = page_list(&["a.png", "b.png", "c.png"]);
    let resolver = FixtureResolver::default()
        .with("a.png", png(30, 10), 0)
        .with("b.png", b"corrupt".to_vec(), 0)
        .with("c.png", png(50, 10), 0);

    let doc = tokio_test::assert_ok!(
        generate(list.pages(), None, &resolver, &ReportConfig::default()).await
    );

    assert_eq!(doc.page_count, 3);
    assert_eq!(doc.diagnostics.len(), 1);
    assert_eq!(doc.diagnostics[0].page_id(), list.pages()[1].id);
    assert_eq!(doc.diagnostics[0].position(), 1);
    assert!(matches!(doc.diagnostics[0], AssetResolutionError::DecodeFailed { .. }));
    assert_eq!(image_widths(&doc.bytes), vec![Some(30), None, Some(50)]);
}

#[tokio::test]
async fn empty_report_is_rejected_before_anything_is_fetched() {
    let resolver = FixtureResolver::default().with("a.png", png(10, 10), 0);
    let err = tokio_test::assert_err!(generate(&[], None, &resolver, &ReportConfig::default()).await);
    assert!(matches!(err, ReportError::EmptyReport));
    assert!(resolver.completed.lock().is_empty());
}

#[tokio::test]
async fn pages_keep_list_order_when_assets_resolve_out_of_order() {
    let list = page_list(&["a.png", "b.png", "c.png"]);
    let resolver = FixtureResolver::default()
        .with("a.png", png(30, 10), 0)
        .with("b.png", png(40, 10), 300)
        .with("c.png", png(50, 10), 10);
    let config = ReportConfig::builder().prefetch(3).build().unwrap();

    let doc = generate(list.pages(), None, &resolver, &config).await.unwrap();

    // C finished before B...
    let completed = resolver.completed.lock().clone();
    let pos = |id: &str| completed.iter().position(|c| c == id).unwrap();
    assert!(pos("c.png") < pos("b.png"), "completion order: {completed:?}");
    // ...but the document is still A, B, C.
    assert_eq!(image_widths(&doc.bytes), vec![Some(30), Some(40), Some(50)]);
}

#[tokio::test]
async fn reordered_list_changes_document_order() {
    let mut list = page_list(&["a.png", "b.png"]);
    let ids: Vec<_> = list.pages().iter().rev().map(|p| p.id).collect();
    list.reorder(&ids).unwrap();

    let resolver = FixtureResolver::default()
        .with("a.png", png(30, 10), 0)
        .with("b.png", png(40, 10), 0);
    let doc = generate(list.pages(), None, &resolver, &ReportConfig::default())
        .await
        .unwrap();
    assert_eq!(image_widths(&doc.bytes), vec![Some(40), Some(30)]);
}

#[tokio::test]
async fn progress_is_reported_after_every_page() {
    let list = page_list(&["a.png", "missing.png", "c.png"]);
    let resolver = FixtureResolver::default()
        .with("a.png", png(10, 10), 0)
        .with("c.png", png(10, 10), 0);
    let recorder = Arc::new(RecordingCallback::default());
    let config = ReportConfig::builder()
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    generate(list.pages(), None, &resolver, &config).await.unwrap();

    assert_eq!(recorder.started_with.load(Ordering::SeqCst), 3);
    assert_eq!(*recorder.percents.lock(), vec![33, 67, 100]);
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn header_goes_on_first_page_and_into_info() {
    let list = page_list(&["a.png", "b.png"]);
    let resolver = FixtureResolver::default()
        .with("a.png", png(10, 10), 0)
        .with("b.png", png(10, 10), 0);
    let meta = ReportMeta {
        title: Some("North yard".into()),
        location: Some("Pier 4".into()),
        ..Default::default()
    };

    let out = generate(list.pages(), Some(&meta), &resolver, &ReportConfig::default())
        .await
        .unwrap();

    let doc = Document::load_mem(&out.bytes).unwrap();
    let pages = doc.get_pages();
    let contains = |haystack: &[u8], needle: &[u8]| haystack.windows(needle.len()).any(|w| w == needle);

    let first = doc.get_page_content(pages[&1]).unwrap();
    let second = doc.get_page_content(pages[&2]).unwrap();
    assert!(contains(&first, b"North yard | Pier 4"));
    assert!(!contains(&second, b"North yard"));

    let info_ref = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
    let info = doc.get_dictionary(info_ref).unwrap();
    assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"North yard");
    assert_eq!(info.get(b"Subject").unwrap().as_str().unwrap(), b"Pier 4");
}

#[tokio::test]
async fn note_replaces_file_name_as_caption() {
    let mut list = page_list(&["IMG_0042.png"]);
    let id = list.pages()[0].id;
    list.set_note(id, Some("Crack above gate".into()));

    let resolver = FixtureResolver::default().with("IMG_0042.png", png(20, 10), 0);
    let out = generate(list.pages(), None, &resolver, &ReportConfig::default())
        .await
        .unwrap();

    let doc = Document::load_mem(&out.bytes).unwrap();
    let content = doc.get_page_content(doc.get_pages()[&1]).unwrap();
    let text = String::from_utf8_lossy(&content);
    assert!(text.contains("Crack above gate"));
    assert!(!text.contains("IMG_0042"));
}

#[tokio::test]
async fn generation_future_is_send() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.png"), png(12, 8)).unwrap();
    let pages = page_list(&["a.png"]).pages().to_vec();
    let resolver = DirectoryResolver::new(dir.path());
    let config = ReportConfig::builder()
        .progress_callback(Arc::new(NoopProgressCallback))
        .build()
        .unwrap();

    let handle = tokio::spawn(async move { generate(&pages, None, &resolver, &config).await });
    let doc = handle.await.unwrap().unwrap();
    assert_eq!(doc.page_count, 1);
}

// ── Session + directory backends ─────────────────────────────────────────────

#[tokio::test]
async fn upload_build_and_list_reports_on_disk() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let uploads = root.path().join("uploads");
    let pdfs = root.path().join("pdfs");

    let source = DirectoryAssetSource::new(&uploads);
    let gate = source.upload(png(64, 48), "gate.png").await.unwrap();
    let fence = source.upload(png(48, 64), "fence.png").await.unwrap();
    let memo = source.upload(b"ID3".to_vec(), "memo.mp3").await.unwrap();

    let session = ReportSession::new(ReportConfig::default());
    session.add(&gate).unwrap();
    session.add(&fence).unwrap();
    assert_eq!(session.add(&gate).unwrap(), None);
    assert!(matches!(session.add(&memo), Err(ReportError::InvalidAsset { .. })));

    let sink = DirectorySink::new(&pdfs);
    let run = session
        .generate_and_store(&DirectoryResolver::new(&uploads), &sink)
        .await
        .unwrap();

    assert!(run.document.is_complete());
    assert!(run.stored.url.starts_with("/pdfs/walk-report-"));
    assert!(session.is_empty());
    assert!(matches!(session.state(), GenerationState::Completed { page_count: 2, .. }));

    let listed = sink.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, run.stored.stored_name);

    let on_disk = std::fs::read(pdfs.join(&run.stored.stored_name)).unwrap();
    assert_eq!(image_widths(&on_disk), vec![Some(64), Some(48)]);
}

#[tokio::test]
async fn deleted_asset_still_yields_a_blank_page() {
    init_tracing();
    let root = tempfile::tempdir().unwrap();
    let source = DirectoryAssetSource::new(root.path());
    let a = source.upload(png(10, 10), "a.png").await.unwrap();
    let b = source.upload(png(20, 10), "b.png").await.unwrap();

    let session = ReportSession::default();
    session.add(&a).unwrap();
    session.add(&b).unwrap();
    source.delete(&a.identifier).await.unwrap();

    let run = session
        .generate_and_store(
            &DirectoryResolver::new(root.path()),
            &DirectorySink::new(root.path().join("out")),
        )
        .await
        .unwrap();

    assert_eq!(run.document.page_count, 2);
    assert_eq!(run.document.diagnostics.len(), 1);
    assert!(matches!(
        run.document.diagnostics[0],
        AssetResolutionError::FetchFailed { .. }
    ));
    assert!(matches!(
        session.state(),
        GenerationState::Completed { failed_pages: 1, .. }
    ));
}

#[test]
fn callbacks_are_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();
    assert_send_sync::<RecordingCallback>();
    assert_send_sync::<ReportSession>();
}
