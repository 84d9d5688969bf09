//! CLI binary for cbr2pdf.
//!
//! A thin shim over the library crate that maps CLI flags and the
//! `WIDTH`/`HEIGHT` environment to a `ConversionConfig`, runs one
//! conversion, and translates the outcome into a fixed exit status.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use cbr2pdf::{
    convert, default_destination, inspect, Cbr2PdfError, ConversionConfig,
    ConversionProgressCallback, FailurePolicy, PageOrder, ProgressCallback, RenderedPageInfo,
    Resolution, DEFAULT_HEIGHT, DEFAULT_WIDTH, HEIGHT_ENV, WIDTH_ENV,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── Exit statuses ────────────────────────────────────────────────────────────

const EXIT_HELP: u8 = 1;
const EXIT_CONFIG: u8 = 253;
const EXIT_CONVERSION: u8 = 254;
const EXIT_USAGE: u8 = 255;

const HELP_TOKENS: [&str; 3] = ["-h", "--help", "-?"];

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress callback: a live progress bar plus one log line per
/// page, rendered with [indicatif].
struct CliProgressCallback {
    bar: ProgressBar,
    /// Wall-clock start of the page currently being rendered.
    page_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Start as a spinner; `on_conversion_start` switches to a bar once the
    /// page count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting archive…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            page_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    /// Clear the bar if the run ended without `on_conversion_complete`
    /// (a failure, or inspect-only mode).
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn page_elapsed(&self) -> f64 {
        self.page_started
            .lock()
            .ok()
            .and_then(|mut started| started.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_pages} images…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize, source: &Path) {
        if let Ok(mut started) = self.page_started.lock() {
            *started = Some(Instant::now());
        }
        self.bar
            .set_message(format!("page {page_num} ({})", source.display()));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, info: &RenderedPageInfo) {
        let elapsed = self.page_elapsed();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{}x{} px", info.pixel_width, info.pixel_height)),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, source: &Path, error: &str) {
        let elapsed = self.page_elapsed();
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            page_num,
            total,
            bold(&source.display().to_string()),
            red(&msg),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_finalize_start(&self, destination: &Path) {
        self.bar.set_prefix("Writing");
        self.bar
            .set_message(format!("generating {}", destination.display()));
    }

    fn on_conversion_complete(&self, total_pages: usize, appended_pages: usize) {
        self.bar.finish_and_clear();
        let skipped = self.errors.load(Ordering::SeqCst);

        if skipped == 0 {
            eprintln!(
                "{} {} pages converted successfully",
                green("✔"),
                bold(&appended_pages.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages converted  ({} skipped)",
                cyan("⚠"),
                bold(&appended_pages.to_string()),
                total_pages,
                red(&skipped.to_string()),
            );
        }
    }
}

// ── Plain-text progress (--no-progress) ──────────────────────────────────────

/// Line-oriented progress for dumb terminals and log capture.
struct PlainProgressCallback;

impl ConversionProgressCallback for PlainProgressCallback {
    fn on_page_start(&self, page_num: usize, total: usize, source: &Path) {
        print!("Processing image {} ({}/{})...\r", source.display(), page_num, total);
        let _ = io::stdout().flush();
    }

    fn on_page_error(&self, page_num: usize, total: usize, source: &Path, _error: &str) {
        println!("\nFailed to add image {} ({}/{})!", source.display(), page_num, total);
    }

    fn on_finalize_start(&self, destination: &Path) {
        println!("\nPlease wait - generating {}", destination.display());
    }
}

// ── Arguments ────────────────────────────────────────────────────────────────

/// Convert CBR/CBZ comic archives to PDF sized for an e-reader screen.
#[derive(Parser, Debug)]
#[command(
    name = "cbr2pdf",
    version,
    about = "Convert CBR/CBZ comic archives to PDF sized for an e-reader screen",
    disable_help_flag = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// Comic archive to convert (.cbr / .cbz / .cbt / .cb7).
    source: Option<PathBuf>,

    /// Output PDF. Defaults to the source path with a `.pdf` extension.
    destination: Option<PathBuf>,

    /// Order pages with numeric runs compared by value (2.jpg before 10.jpg).
    #[arg(long)]
    natural_sort: bool,

    /// Leave out pages that fail to render instead of aborting.
    #[arg(long)]
    skip_bad_pages: bool,

    /// JPEG quality of the re-encoded pages (1–100).
    #[arg(long, default_value_t = 90,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Print the conversion result as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// List the pages of the archive in order; do not convert.
    #[arg(long)]
    inspect_only: bool,

    /// Print plain progress lines instead of a progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

fn wants_help(args: &[OsString]) -> bool {
    args.iter()
        .skip(1)
        .any(|a| HELP_TOKENS.iter().any(|token| a.as_os_str() == *token))
}

fn program_name(args: &[OsString]) -> String {
    args.first()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cbr2pdf".to_string())
}

fn print_usage(program: &str) {
    println!(
        "{program} - a utility for converting CBR/CBZ/CBT/CB7 to PDF.\n\n\
         Usage: {program} <source file> [destination file] [options]\n\n\
         Environment:    {WIDTH_ENV}  ... X resolution of your reader (default {DEFAULT_WIDTH})\n\
         \x20               {HEIGHT_ENV} ... Y resolution of your reader (default {DEFAULT_HEIGHT})\n\n\
         Options:\n\
         \x20 --natural-sort      order 2.jpg before 10.jpg\n\
         \x20 --skip-bad-pages    leave out unreadable pages instead of aborting\n\
         \x20 --quality <1-100>   JPEG quality of the output pages (default 90)\n\
         \x20 --inspect-only      list pages in order without converting\n\
         \x20 --json              print the result as JSON\n\
         \x20 --no-progress       plain progress lines instead of a progress bar\n\
         \x20 -v, --verbose       debug logging\n\
         \x20 -q, --quiet         errors only\n\
         \x20 -h, --help, -?      show this help\n\n\
         Examples:\n\
         \x20         {program} my-favorite-comicbook.cbr output.pdf                         # Pocketbook Touch HD 3\n\
         \x20         {WIDTH_ENV}=758 {HEIGHT_ENV}=1024 {program} my-favorite-comicbook.cbr output.pdf   # Pocketbook Touch Lux 4\n"
    );
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<OsString> = std::env::args_os().collect();

    // The environment is checked before anything else, help included.
    let resolution = match Resolution::from_env() {
        Ok(resolution) => resolution,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    if wants_help(&args) {
        print_usage(&program_name(&args));
        return ExitCode::from(EXIT_HELP);
    }

    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayVersion => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let Some(source) = cli.source.clone() else {
        eprintln!(
            "An error has occurred: Missing mandatory argument: source file\n\
             Run with --help to display usage"
        );
        return ExitCode::from(EXIT_USAGE);
    };

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar provides all the feedback that matters; keep library
    // INFO logs out of its way unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let bar = show_progress.then(CliProgressCallback::new_dynamic);
    let progress_cb: Option<ProgressCallback> = if cli.quiet || cli.json {
        None
    } else if let Some(bar) = &bar {
        Some(Arc::clone(bar) as Arc<dyn ConversionProgressCallback>)
    } else {
        Some(Arc::new(PlainProgressCallback) as Arc<dyn ConversionProgressCallback>)
    };

    let config = match build_config(&cli, resolution, progress_cb) {
        Ok(config) => config,
        Err(e) => {
            if let Some(bar) = &bar {
                bar.abandon();
            }
            eprintln!("{e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    // ── Run ──────────────────────────────────────────────────────────────
    let result = run(&cli, &source, &config).await;
    if let Some(bar) = &bar {
        bar.abandon();
    }
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} Conversion failed: {e:#}", red("✘"));
            ExitCode::from(EXIT_CONVERSION)
        }
    }
}

/// Map the resolved resolution and CLI flags to a `ConversionConfig`.
fn build_config(
    cli: &Cli,
    resolution: Resolution,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig, Cbr2PdfError> {
    let mut builder = ConversionConfig::builder()
        .resolution(resolution)
        .jpeg_quality(cli.quality);

    if cli.natural_sort {
        builder = builder.page_order(PageOrder::Natural);
    }
    if cli.skip_bad_pages {
        builder = builder.failure_policy(FailurePolicy::SkipPage);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build()
}

async fn run(cli: &Cli, source: &Path, config: &ConversionConfig) -> Result<()> {
    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let listing = inspect(source, config)
            .await
            .context("Failed to inspect archive")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&listing).context("Failed to serialise listing")?
            );
        } else {
            println!("File:   {}", source.display());
            println!("Pages:  {}", listing.page_count());
            for (i, page) in listing.pages.iter().enumerate() {
                println!("  {:>4}  {}", i + 1, page.display());
            }
        }
        return Ok(());
    }

    // ── Conversion ───────────────────────────────────────────────────────
    let destination = cli
        .destination
        .clone()
        .unwrap_or_else(|| default_destination(source));

    let output = convert(source, &destination, config).await?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} pages  {}  {}ms  →  {}",
            if stats.skipped_pages == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.appended_pages,
            stats.total_images,
            dim(&format!("{} bytes", stats.output_bytes)),
            stats.total_duration_ms,
            bold(&output.destination.display().to_string()),
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn help_tokens_are_found_anywhere_after_the_program() {
        assert!(wants_help(&args(&["cbr2pdf", "book.cbz", "-?"])));
        assert!(wants_help(&args(&["cbr2pdf", "--help"])));
        assert!(!wants_help(&args(&["-h"])));
        assert!(!wants_help(&args(&["cbr2pdf", "book.cbz", "--quiet"])));
    }

    #[test]
    fn program_name_is_the_file_name() {
        assert_eq!(program_name(&args(&["/usr/local/bin/cbr2pdf"])), "cbr2pdf");
        assert_eq!(program_name(&[]), "cbr2pdf");
    }

    #[test]
    fn failed_run_clears_the_progress_bar() {
        let cb = CliProgressCallback::new_dynamic();
        cb.on_conversion_start(3);
        cb.on_page_start(1, 3, Path::new("001.jpg"));
        cb.on_page_error(1, 3, Path::new("001.jpg"), "cannot decode");
        assert!(!cb.bar.is_finished());

        cb.abandon();
        assert!(cb.bar.is_finished());
        // Idempotent after a completed run too.
        cb.abandon();
    }

    #[test]
    fn completed_run_finishes_the_bar_once() {
        let cb = CliProgressCallback::new_dynamic();
        cb.on_conversion_start(1);
        cb.on_conversion_complete(1, 1);
        assert!(cb.bar.is_finished());
        cb.abandon();
        assert!(cb.bar.is_finished());
    }
}
