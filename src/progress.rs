//! Progress-callback trait for per-page conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline appends each page.
//!
//! Pages are processed strictly in order, one at a time, so events for page
//! `k` always arrive before events for page `k + 1`.
//!
//! # Example
//!
//! ```rust
//! use cbr2pdf::{ConversionConfig, ConversionProgressCallback, RenderedPageInfo};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     appended: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, info: &RenderedPageInfo) {
//!         self.appended.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} → {}x{} px", page_num, total_pages, info.pixel_width, info.pixel_height);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { appended: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::render::RenderedPageInfo;
use std::path::Path;
use std::sync::Arc;

/// Called by the conversion pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `Send + Sync` is required because the blocking
/// pipeline runs on a tokio blocking thread.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the images were located and before the first page
    /// is rendered.
    ///
    /// # Arguments
    /// * `total_pages` — number of images that will be processed
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a page is decoded.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed position in reading order
    /// * `total_pages` — total images found
    /// * `source`      — path of the image inside the archive
    fn on_page_start(&self, page_num: usize, total_pages: usize, source: &Path) {
        let _ = (page_num, total_pages, source);
    }

    /// Called when a page has been appended to the document.
    fn on_page_complete(&self, page_num: usize, total_pages: usize, info: &RenderedPageInfo) {
        let _ = (page_num, total_pages, info);
    }

    /// Called when a page fails. Under the default abort policy this is the
    /// last per-page event of the run.
    fn on_page_error(&self, page_num: usize, total_pages: usize, source: &Path, error: &str) {
        let _ = (page_num, total_pages, source, error);
    }

    /// Called once all pages are appended, just before the document is
    /// serialised to `destination`.
    fn on_finalize_start(&self, destination: &Path) {
        let _ = destination;
    }

    /// Called once after the document was written.
    ///
    /// # Arguments
    /// * `total_pages`    — images found
    /// * `appended_pages` — pages present in the written document
    fn on_conversion_complete(&self, total_pages: usize, appended_pages: usize) {
        let _ = (total_pages, appended_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
        appended_total: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_conversion_start(&self, total_pages: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_start(&self, _page_num: usize, _total_pages: usize, _source: &Path) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _info: &RenderedPageInfo) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _source: &Path, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_conversion_complete(&self, _total_pages: usize, appended_pages: usize) {
            self.appended_total.store(appended_pages, Ordering::SeqCst);
        }
    }

    fn info() -> RenderedPageInfo {
        RenderedPageInfo {
            pixel_width: 1072,
            pixel_height: 1448,
            page_width_pt: 602.2,
            page_height_pt: 813.5,
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(5);
        cb.on_page_start(1, 5, Path::new("001.jpg"));
        cb.on_page_complete(1, 5, &info());
        cb.on_page_error(2, 5, Path::new("002.jpg"), "corrupt");
        cb.on_finalize_start(Path::new("out.pdf"));
        cb.on_conversion_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            started_total: AtomicUsize::new(0),
            appended_total: AtomicUsize::new(0),
        };

        tracker.on_conversion_start(3);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);

        tracker.on_page_start(1, 3, Path::new("a.jpg"));
        tracker.on_page_complete(1, 3, &info());
        tracker.on_page_start(2, 3, Path::new("b.jpg"));
        tracker.on_page_complete(2, 3, &info());
        tracker.on_page_start(3, 3, Path::new("c.jpg"));
        tracker.on_page_error(3, 3, Path::new("c.jpg"), "decode failed");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);

        tracker.on_conversion_complete(3, 2);
        assert_eq!(tracker.appended_total.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ConversionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_conversion_start(10);
        cb.on_page_start(1, 10, Path::new("x.png"));
        cb.on_page_complete(1, 10, &info());
    }
}
