//! CLI binary for walk-report.
//!
//! A thin shim over the library crate: manages the uploads directory, builds
//! a report from selected assets and lists stored reports.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use walk_report::asset::images;
use walk_report::{
    Asset, AssetResolutionError, AssetResolver, AssetSource, DirectoryAssetSource, DirectoryResolver,
    DirectorySink, GenerationProgressCallback, HttpResolver, OutputSink, PageSize, ProgressCallback,
    ReportConfig, ReportMeta, ReportSession, StoredDocument,
};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Renders a progress bar while pages are drawn and prints a line for every
/// page left blank.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        self.bar.set_prefix("Building");
    }

    fn on_page_start(&self, index: usize, _total: usize) {
        self.bar.set_message(format!("page {}", index + 1));
    }

    fn on_page_complete(&self, _index: usize, _total: usize, percent: u8) {
        self.bar.inc(1);
        self.bar.set_message(format!("{percent}%"));
    }

    fn on_page_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            index + 1,
            total,
            red(&msg)
        ));
    }

    fn on_generation_complete(&self, _total_pages: usize, _drawn_pages: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Add photos to the uploads directory
  walk-report upload IMG_0001.jpg IMG_0002.jpg

  # Build a report from every image, oldest first
  walk-report build --title "North yard" --crew "A. Lee, R. Diaz"

  # Build from specific assets, in this order, with a caption override
  walk-report build file-1700000000000-ab12.jpg file-1700000000500-cd34.jpg \
      --note file-1700000000500-cd34.jpg="Crack above gate"

  # Fetch assets from a running upload server instead of the local directory
  walk-report build --base-url http://localhost:5001/uploads

  # List generated reports as JSON
  walk-report reports --json

ENVIRONMENT VARIABLES:
  WALK_REPORT_UPLOADS      Uploads directory (default: uploads)
  WALK_REPORT_PDFS         Reports directory (default: pdfs)
  WALK_REPORT_BASE_URL     Fetch assets over HTTP from this base URL
  RUST_LOG                 Overrides --verbose / --quiet log filtering
"#;

/// Assemble site-walk photos into captioned PDF reports.
#[derive(Parser, Debug)]
#[command(
    name = "walk-report",
    version,
    about = "Assemble site-walk photos into captioned PDF reports",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding uploaded assets.
    #[arg(long, global = true, env = "WALK_REPORT_UPLOADS", default_value = "uploads")]
    uploads_dir: PathBuf,

    /// Directory receiving generated reports.
    #[arg(long, global = true, env = "WALK_REPORT_PDFS", default_value = "pdfs")]
    pdfs_dir: PathBuf,

    /// Print machine-readable JSON.
    #[arg(long, global = true, env = "WALK_REPORT_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "WALK_REPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "WALK_REPORT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List assets in the uploads directory, newest first.
    Assets,

    /// Copy files into the uploads directory.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Delete an asset by identifier.
    Delete { identifier: String },

    /// List generated reports, newest first.
    Reports,

    /// Build and store one report.
    Build(BuildArgs),
}

#[derive(clap::Args, Debug)]
struct BuildArgs {
    /// Asset identifiers, in page order. Default: every image, oldest first.
    ids: Vec<String>,

    /// Caption override for one asset, as ID=TEXT. Repeatable.
    #[arg(long = "note", value_name = "ID=TEXT")]
    notes: Vec<String>,

    /// Report title (header line and PDF Title).
    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    location: Option<String>,

    /// Free-form date/time text for the header.
    #[arg(long)]
    date_time: Option<String>,

    /// Crew names for the header.
    #[arg(long)]
    crew: Option<String>,

    /// Fetch assets over HTTP from this base URL instead of the uploads directory.
    #[arg(long, env = "WALK_REPORT_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "WALK_REPORT_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Margin on every side, in millimetres.
    #[arg(long, env = "WALK_REPORT_MARGIN_MM", default_value_t = 10.0)]
    margin_mm: f64,

    /// Pages resolved ahead of the one being drawn.
    #[arg(long, env = "WALK_REPORT_PREFETCH", default_value_t = 2)]
    prefetch: usize,

    /// JPEG quality for embedded images (1–100).
    #[arg(long, env = "WALK_REPORT_JPEG_QUALITY", default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Longest edge of an embedded image, in pixels.
    #[arg(long, env = "WALK_REPORT_MAX_PIXELS", default_value_t = 2400)]
    max_pixels: u32,

    /// Per-asset fetch timeout in seconds.
    #[arg(long, env = "WALK_REPORT_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Disable progress bar.
    #[arg(long, env = "WALK_REPORT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
        }
    }
}

/// JSON shape of a `build` result.
#[derive(Serialize)]
struct BuildSummary<'a> {
    stored: &'a StoredDocument,
    page_count: usize,
    drawn_pages: usize,
    diagnostics: &'a [AssetResolutionError],
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let source = DirectoryAssetSource::new(&cli.uploads_dir);
    let sink = DirectorySink::new(&cli.pdfs_dir);

    match &cli.command {
        Command::Assets => {
            let assets = source.list().await.context("Failed to list assets")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&assets)?);
            } else if assets.is_empty() {
                eprintln!("{}", dim("No assets."));
            } else {
                for a in &assets {
                    let dims = match (a.pixel_width, a.pixel_height) {
                        (Some(w), Some(h)) => format!("{w}x{h}"),
                        _ => "-".to_string(),
                    };
                    println!(
                        "{:<48} {:<6} {:>10} {:>11}  {}",
                        a.identifier,
                        format!("{:?}", a.kind).to_lowercase(),
                        human_bytes(a.size_bytes),
                        dims,
                        dim(&a.last_modified.format("%Y-%m-%d %H:%M").to_string()),
                    );
                }
            }
        }

        Command::Upload { files } => {
            let mut uploaded = Vec::with_capacity(files.len());
            for path in files {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let name = display_name(path);
                let asset = source
                    .upload(bytes, &name)
                    .await
                    .with_context(|| format!("Failed to upload {}", path.display()))?;
                if !cli.json && !cli.quiet {
                    eprintln!("{} {} → {}", green("✓"), name, bold(&asset.identifier));
                }
                uploaded.push(asset);
            }
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&uploaded)?);
            }
        }

        Command::Delete { identifier } => {
            source
                .delete(identifier)
                .await
                .with_context(|| format!("Failed to delete {identifier}"))?;
            if !cli.quiet {
                eprintln!("{} deleted {}", green("✓"), identifier);
            }
        }

        Command::Reports => {
            let reports = sink.list().await.context("Failed to list reports")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else if reports.is_empty() {
                eprintln!("{}", dim("No reports."));
            } else {
                for r in &reports {
                    println!(
                        "{:<48} {:>10}  {}  {}",
                        r.name,
                        human_bytes(r.size),
                        dim(&r.last_modified.format("%Y-%m-%d %H:%M").to_string()),
                        r.url
                    );
                }
            }
        }

        Command::Build(args) => {
            // The resolver is a generic parameter, so each backend gets its
            // own monomorphised run.
            match args.base_url {
                Some(ref base) => {
                    let resolver = HttpResolver::new(base.as_str(), args.fetch_timeout)
                        .context("Failed to create HTTP client")?;
                    run_build(&cli, args, &source, &sink, &resolver).await?;
                }
                None => {
                    let resolver = DirectoryResolver::new(&cli.uploads_dir);
                    run_build(&cli, args, &source, &sink, &resolver).await?;
                }
            }
        }
    }

    Ok(())
}

async fn run_build<R: AssetResolver>(
    cli: &Cli,
    args: &BuildArgs,
    source: &DirectoryAssetSource,
    sink: &DirectorySink,
    resolver: &R,
) -> Result<()> {
    let show_progress = !cli.quiet && !cli.json && !args.no_progress;
    let progress = show_progress.then(CliProgressCallback::new);

    let session = ReportSession::new(build_config(args, progress.clone().map(|p| p as ProgressCallback))?);

    // ── Select pages ─────────────────────────────────────────────────────
    let assets = source.list().await.context("Failed to list assets")?;
    let selected: Vec<&Asset> = if args.ids.is_empty() {
        // Listing is newest first; reports read oldest first.
        images(&assets).into_iter().rev().collect()
    } else {
        args.ids
            .iter()
            .map(|id| {
                assets
                    .iter()
                    .find(|a| &a.identifier == id)
                    .with_context(|| format!("No asset named '{id}' in {}", cli.uploads_dir.display()))
            })
            .collect::<Result<_>>()?
    };
    for asset in selected {
        session.add(asset)?;
    }

    for note in &args.notes {
        let (id, text) = note
            .split_once('=')
            .with_context(|| format!("Invalid --note '{note}': expected ID=TEXT"))?;
        let page = session
            .snapshot()
            .into_iter()
            .find(|p| p.asset.identifier == id)
            .with_context(|| format!("--note refers to '{id}', which is not in the report"))?;
        session.set_note(page.id, Some(text.to_string()));
    }

    session.set_meta(Some(ReportMeta {
        title: args.title.clone(),
        location: args.location.clone(),
        date_time: args.date_time.clone(),
        crew_names: args.crew.clone(),
    }));

    if session.is_empty() {
        bail!("No images to build a report from in {}", cli.uploads_dir.display());
    }

    // ── Generate + store ─────────────────────────────────────────────────
    let run = session
        .generate_and_store(resolver, sink)
        .await
        .context("Report generation failed")?;
    let doc = &run.document;

    if cli.json {
        let summary = BuildSummary {
            stored: &run.stored,
            page_count: doc.page_count,
            drawn_pages: doc.stats.drawn_pages,
            diagnostics: &doc.diagnostics,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if !cli.quiet {
        let path = cli.pdfs_dir.join(&run.stored.stored_name);
        eprintln!(
            "{}  {}/{} pages  {}ms  →  {}",
            if doc.is_complete() {
                green("✔")
            } else {
                yellow("⚠")
            },
            doc.stats.drawn_pages,
            doc.page_count,
            doc.stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
        // The progress bar already printed one line per failure.
        let already_shown = progress
            .as_ref()
            .map(|p| p.errors.load(Ordering::SeqCst))
            .unwrap_or(0);
        if !doc.diagnostics.is_empty() && already_shown == 0 {
            eprintln!("{}", yellow(&format!("{} pages left blank:", doc.diagnostics.len())));
            for d in &doc.diagnostics {
                eprintln!("  {} {}", yellow("•"), d);
            }
        }
    }
    Ok(())
}

/// Map CLI args to `ReportConfig`.
fn build_config(args: &BuildArgs, progress: Option<ProgressCallback>) -> Result<ReportConfig> {
    let mut builder = ReportConfig::builder()
        .page_size(args.page_size.clone().into())
        .margin_mm(args.margin_mm)
        .prefetch(args.prefetch)
        .jpeg_quality(args.jpeg_quality)
        .max_image_pixels(args.max_pixels)
        .fetch_timeout_secs(args.fetch_timeout);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
