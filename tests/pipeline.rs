//! Integration tests for the conversion pipeline.
//!
//! Every test builds its own archive from generated images (the RAR case
//! uses a small committed fixture), converts it with the production
//! collaborators, and reads the resulting PDF back with `lopdf`.

use cbr2pdf::{
    convert, convert_sync, default_destination, inspect, Cbr2PdfError, ConversionConfig,
    ConversionOutput, ConversionProgressCallback, FailurePolicy, PageOrder, RenderedPageInfo,
    Resolution, PAGE_DENSITY_DIVISOR,
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn encoded(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    buf
}

fn jpeg(w: u32, h: u32) -> Vec<u8> {
    encoded(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 120, 40]))),
        ImageFormat::Jpeg,
    )
}

fn png(w: u32, h: u32) -> Vec<u8> {
    encoded(
        DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 200, 90]))),
        ImageFormat::Png,
    )
}

fn gray_jpeg(w: u32, h: u32) -> Vec<u8> {
    encoded(
        DynamicImage::ImageLuma8(GrayImage::from_pixel(w, h, Luma([128]))),
        ImageFormat::Jpeg,
    )
}

fn write_cbz(path: &Path, entries: &[(&str, Vec<u8>)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// A temp directory holding the archive, the output, and a private scratch
/// root so leftover workspaces are observable.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("scratch")).unwrap();
        Self { dir }
    }

    fn archive(&self, entries: &[(&str, Vec<u8>)]) -> PathBuf {
        let path = self.dir.path().join("book.cbz");
        write_cbz(&path, entries);
        path
    }

    fn dest(&self) -> PathBuf {
        self.dir.path().join("book.pdf")
    }

    fn scratch_root(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    fn config(&self, resolution: Resolution) -> ConversionConfig {
        ConversionConfig::builder()
            .resolution(resolution)
            .scratch_root(self.scratch_root())
            .build()
            .unwrap()
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch_root()).unwrap().next().is_none()
    }
}

/// Per page, in document order: MediaBox size and embedded image size.
fn pdf_pages(path: &Path) -> Vec<((f32, f32), (i64, i64), String)> {
    let doc = lopdf::Document::load(path).unwrap();
    doc.get_pages()
        .values()
        .map(|id| {
            let page = doc.get_object(*id).unwrap().as_dict().unwrap();
            let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
            let media = (mb[2].as_float().unwrap(), mb[3].as_float().unwrap());

            let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
            let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
            let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
            let stream = doc.get_object(image_id).unwrap().as_stream().unwrap();
            let width = stream.dict.get(b"Width").unwrap().as_i64().unwrap();
            let height = stream.dict.get(b"Height").unwrap().as_i64().unwrap();
            let cs = stream.dict.get(b"ColorSpace").unwrap().as_name().unwrap();
            let cs = String::from_utf8_lossy(cs).into_owned();

            (media, (width, height), cs)
        })
        .collect()
}

fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 0.01,
        "expected {expected}, got {actual}"
    );
}

// ── Scenario tests ───────────────────────────────────────────────────────────

#[test]
fn converts_mixed_orientations_in_order() {
    let ws = Workspace::new();
    let src = ws.archive(&[
        ("003.jpg", jpeg(30, 40)),
        ("001.jpg", jpeg(50, 100)),
        ("002.png", png(200, 100)),
        ("ComicInfo.xml", b"<ComicInfo/>".to_vec()),
    ]);
    let config = ws.config(Resolution::new(100, 200));

    let out = convert_sync(&src, ws.dest(), &config).unwrap();
    assert_eq!(out.stats.total_images, 3);
    assert_eq!(out.stats.appended_pages, 3);
    assert!(out.stats.output_bytes > 0);

    let pages = pdf_pages(&ws.dest());
    let expected_px = [(100, 200), (100, 50), (150, 200)];
    assert_eq!(pages.len(), 3);
    for (((w_pt, h_pt), px, _), (ew, eh)) in pages.iter().zip(expected_px) {
        assert_eq!(*px, (ew, eh));
        assert_close(*w_pt, ew as f32 / PAGE_DENSITY_DIVISOR);
        assert_close(*h_pt, eh as f32 / PAGE_DENSITY_DIVISOR);
    }

    let sources: Vec<_> = out.pages.iter().map(|p| p.source.clone()).collect();
    assert_eq!(
        sources,
        ["001.jpg", "002.png", "003.jpg"].map(PathBuf::from)
    );
    assert!(ws.scratch_is_empty());
}

#[test]
fn unpadded_names_sort_lexicographically_by_default() {
    let ws = Workspace::new();
    // Distinct heights identify each source page in the output.
    let src = ws.archive(&[
        ("1.jpg", jpeg(100, 10)),
        ("10.jpg", jpeg(100, 20)),
        ("2.jpg", jpeg(100, 30)),
    ]);
    let config = ws.config(Resolution::new(100, 1000));

    convert_sync(&src, ws.dest(), &config).unwrap();
    let heights: Vec<i64> = pdf_pages(&ws.dest()).iter().map(|p| p.1 .1).collect();
    assert_eq!(heights, [10, 20, 30]);

    let mut natural = config.clone();
    natural.page_order = PageOrder::Natural;
    let dest = ws.dir.path().join("natural.pdf");
    convert_sync(&src, &dest, &natural).unwrap();
    let heights: Vec<i64> = pdf_pages(&dest).iter().map(|p| p.1 .1).collect();
    assert_eq!(heights, [10, 30, 20]);
}

#[test]
fn nested_directories_are_part_of_the_order() {
    let ws = Workspace::new();
    let src = ws.archive(&[
        ("Chapter B/01.JPG", jpeg(100, 20)),
        ("chapter a/02.jpeg", jpeg(100, 10)),
        ("chapter a/01.jpg", jpeg(100, 5)),
    ]);
    let config = ws.config(Resolution::new(100, 1000));

    let out = convert_sync(&src, ws.dest(), &config).unwrap();
    let heights: Vec<i64> = pdf_pages(&ws.dest()).iter().map(|p| p.1 .1).collect();
    assert_eq!(heights, [5, 10, 20]);
    assert_eq!(out.pages[2].source, PathBuf::from("Chapter B/01.JPG"));
}

#[test]
fn grayscale_pages_stay_grayscale() {
    let ws = Workspace::new();
    let src = ws.archive(&[("001.jpg", gray_jpeg(40, 80)), ("002.jpg", jpeg(40, 80))]);
    let config = ws.config(Resolution::new(100, 200));

    convert_sync(&src, ws.dest(), &config).unwrap();
    let spaces: Vec<String> = pdf_pages(&ws.dest()).into_iter().map(|p| p.2).collect();
    assert_eq!(spaces, ["DeviceGray", "DeviceRGB"]);
}

#[test]
fn conversion_is_deterministic() {
    let ws = Workspace::new();
    let src = ws.archive(&[("a.jpg", jpeg(64, 96)), ("b.png", png(96, 64))]);
    let config = ws.config(Resolution::new(120, 160));

    let other = ws.dir.path().join("again.pdf");
    convert_sync(&src, ws.dest(), &config).unwrap();
    convert_sync(&src, &other, &config).unwrap();

    let first = pdf_pages(&ws.dest());
    let second = pdf_pages(&other);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.1, b.1);
        assert_close(a.0 .0, b.0 .0);
        assert_close(a.0 .1, b.0 .1);
    }
}

#[test]
fn archive_without_images_is_an_empty_archive_error() {
    let ws = Workspace::new();
    let src = ws.archive(&[("readme.txt", b"no pictures here".to_vec())]);
    let config = ws.config(Resolution::default());

    let err = convert_sync(&src, ws.dest(), &config).unwrap_err();
    assert!(matches!(err, Cbr2PdfError::EmptyArchive { .. }), "{err:?}");
    assert!(!ws.dest().exists());
    assert!(ws.scratch_is_empty());
}

#[test]
fn source_equal_to_destination_is_rejected_untouched() {
    let ws = Workspace::new();
    let src = ws.archive(&[("001.jpg", jpeg(10, 10))]);
    let before = std::fs::read(&src).unwrap();
    let config = ws.config(Resolution::default());

    let err = convert_sync(&src, &src, &config).unwrap_err();
    assert!(matches!(err, Cbr2PdfError::SameSourceAndDestination { .. }));
    assert_eq!(std::fs::read(&src).unwrap(), before);
    assert!(ws.scratch_is_empty());
}

#[test]
fn corrupt_page_aborts_and_names_it() {
    let ws = Workspace::new();
    let src = ws.archive(&[
        ("001.jpg", jpeg(20, 40)),
        ("002.jpg", b"\xFF\xD8\xFF\xE0 not really a jpeg".to_vec()),
        ("003.jpg", jpeg(20, 40)),
    ]);
    let config = ws.config(Resolution::new(100, 200));

    let err = convert_sync(&src, ws.dest(), &config).unwrap_err();
    match &err {
        Cbr2PdfError::PageFailed {
            page, total, path, ..
        } => {
            assert_eq!((*page, *total), (2, 3));
            assert_eq!(path, &PathBuf::from("002.jpg"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("002.jpg"));
    assert!(!ws.dest().exists());
    assert!(ws.scratch_is_empty());
}

#[test]
fn skip_policy_writes_the_good_pages() {
    let ws = Workspace::new();
    let src = ws.archive(&[
        ("001.jpg", jpeg(20, 40)),
        ("002.jpg", b"garbage".to_vec()),
        ("003.png", png(40, 20)),
    ]);
    let mut config = ws.config(Resolution::new(100, 200));
    config.failure_policy = FailurePolicy::SkipPage;

    let out = convert_sync(&src, ws.dest(), &config).unwrap();
    assert_eq!(out.stats.appended_pages, 2);
    assert_eq!(out.stats.skipped_pages, 1);
    assert!(!out.pages[1].is_appended());
    assert_eq!(pdf_pages(&ws.dest()).len(), 2);
}

#[test]
fn unknown_and_missing_archives_fail_cleanly() {
    let ws = Workspace::new();
    let config = ws.config(Resolution::default());

    let bogus = ws.dir.path().join("notes.cbr");
    std::fs::write(&bogus, b"just some text").unwrap();
    let err = convert_sync(&bogus, ws.dest(), &config).unwrap_err();
    assert!(matches!(err, Cbr2PdfError::UnsupportedArchive { .. }), "{err:?}");

    let missing = ws.dir.path().join("missing.cbz");
    let err = convert_sync(&missing, ws.dest(), &config).unwrap_err();
    assert!(matches!(err, Cbr2PdfError::ArchiveNotFound { .. }), "{err:?}");

    assert!(!ws.dest().exists());
    assert!(ws.scratch_is_empty());
}

#[test]
fn zip_named_cbr_is_still_converted() {
    let ws = Workspace::new();
    let src = ws.dir.path().join("actually-zip.cbr");
    write_cbz(&src, &[("001.jpg", jpeg(10, 20))]);
    let config = ws.config(Resolution::new(100, 200));

    let dest = default_destination(&src);
    assert_eq!(dest, ws.dir.path().join("actually-zip.pdf"));
    convert_sync(&src, &dest, &config).unwrap();
    assert_eq!(pdf_pages(&dest).len(), 1);
}

#[test]
fn tar_archive_is_converted() {
    let ws = Workspace::new();
    let src = ws.dir.path().join("book.cbt");
    let mut tar = tar::Builder::new(std::fs::File::create(&src).unwrap());
    for (name, data) in [("pages/002.jpg", jpeg(60, 30)), ("pages/001.jpg", jpeg(30, 60))] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        tar.append_data(&mut header, name, data.as_slice()).unwrap();
    }
    tar.finish().unwrap();
    drop(tar);
    let config = ws.config(Resolution::new(100, 200));

    let out = convert_sync(&src, ws.dest(), &config).unwrap();
    assert_eq!(out.pages[0].source, PathBuf::from("pages/001.jpg"));
    let sizes: Vec<(i64, i64)> = pdf_pages(&ws.dest()).iter().map(|p| p.1).collect();
    assert_eq!(sizes, [(100, 200), (100, 50)]);
    assert!(ws.scratch_is_empty());
}

#[cfg(feature = "rar")]
#[test]
fn rar_archive_is_converted() {
    let ws = Workspace::new();
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/book.cbr");
    let config = ws.config(Resolution::new(100, 200));

    let out = convert_sync(&src, ws.dest(), &config).unwrap();
    assert_eq!(out.stats.total_images, 2);
    let sources: Vec<_> = out.pages.iter().map(|p| p.source.clone()).collect();
    assert_eq!(sources, ["pages/001.png", "pages/002.png"].map(PathBuf::from));

    let pages = pdf_pages(&ws.dest());
    let sizes: Vec<(i64, i64)> = pages.iter().map(|p| p.1).collect();
    assert_eq!(sizes, [(100, 200), (100, 50)]);
    assert!(pages.iter().all(|p| p.2 == "DeviceGray"));
    assert!(ws.scratch_is_empty());
}

// ── Progress events ──────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingCallback {
    events: Mutex<Vec<String>>,
}

impl RecordingCallback {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl ConversionProgressCallback for RecordingCallback {
    fn on_conversion_start(&self, total_pages: usize) {
        self.push(format!("start {total_pages}"));
    }

    fn on_page_start(&self, page_num: usize, total_pages: usize, source: &Path) {
        self.push(format!("page {page_num}/{total_pages} {}", source.display()));
    }

    fn on_page_complete(&self, page_num: usize, _total_pages: usize, info: &RenderedPageInfo) {
        self.push(format!("done {page_num} {}x{}", info.pixel_width, info.pixel_height));
    }

    fn on_page_error(&self, page_num: usize, _total_pages: usize, source: &Path, _error: &str) {
        self.push(format!("error {page_num} {}", source.display()));
    }

    fn on_finalize_start(&self, _destination: &Path) {
        self.push("finalize".to_string());
    }

    fn on_conversion_complete(&self, total_pages: usize, appended_pages: usize) {
        self.push(format!("complete {appended_pages}/{total_pages}"));
    }
}

#[test]
fn progress_events_follow_page_order() {
    let ws = Workspace::new();
    let src = ws.archive(&[("b.jpg", jpeg(20, 10)), ("a.jpg", jpeg(10, 20))]);
    let recorder = Arc::new(RecordingCallback::default());
    let config = ConversionConfig::builder()
        .resolution(Resolution::new(100, 200))
        .scratch_root(ws.scratch_root())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    convert_sync(&src, ws.dest(), &config).unwrap();
    assert_eq!(
        *recorder.events.lock().unwrap(),
        [
            "start 2",
            "page 1/2 a.jpg",
            "done 1 100x200",
            "page 2/2 b.jpg",
            "done 2 100x50",
            "finalize",
            "complete 2/2",
        ]
    );
}

#[test]
fn failing_page_is_the_last_page_event() {
    let ws = Workspace::new();
    let src = ws.archive(&[
        ("1.jpg", jpeg(10, 20)),
        ("2.jpg", b"broken".to_vec()),
        ("3.jpg", jpeg(10, 20)),
    ]);
    let recorder = Arc::new(RecordingCallback::default());
    let config = ConversionConfig::builder()
        .resolution(Resolution::new(100, 200))
        .scratch_root(ws.scratch_root())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    convert_sync(&src, ws.dest(), &config).unwrap_err();
    let events = recorder.events.lock().unwrap();
    assert_eq!(events.last().map(String::as_str), Some("error 2 2.jpg"));
    assert!(!events.iter().any(|e| e == "finalize"));
}

// ── Async entry points ───────────────────────────────────────────────────────

#[tokio::test]
async fn async_convert_matches_blocking_convert() {
    let ws = Workspace::new();
    let src = ws.archive(&[("001.jpg", jpeg(30, 60)), ("002.jpg", jpeg(60, 30))]);
    let config = ws.config(Resolution::new(100, 200));

    let out = convert(&src, ws.dest(), &config).await.unwrap();
    assert_eq!(out.stats.appended_pages, 2);
    assert_eq!(pdf_pages(&ws.dest()).len(), 2);

    let json = serde_json::to_string(&out).unwrap();
    let back: ConversionOutput = serde_json::from_str(&json).unwrap();
    assert_eq!(back.pages.len(), 2);
    assert_eq!(back.destination, ws.dest());
}

#[tokio::test]
async fn inspect_lists_pages_without_writing() {
    let ws = Workspace::new();
    let src = ws.archive(&[
        ("10.jpg", jpeg(4, 4)),
        ("2.jpg", jpeg(4, 4)),
        ("cover.png", png(4, 4)),
        ("info.txt", b"x".to_vec()),
    ]);
    let config = ws.config(Resolution::default());

    let listing = inspect(&src, &config).await.unwrap();
    assert_eq!(listing.page_count(), 3);
    assert_eq!(
        listing.pages,
        ["10.jpg", "2.jpg", "cover.png"].map(PathBuf::from)
    );
    assert!(!ws.dest().exists());
    assert!(ws.scratch_is_empty());
}
