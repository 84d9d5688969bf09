//! Document assembly: append rendered pages, then write the PDF once.
//!
//! The document accumulates in memory and touches the destination exactly
//! once, in [`Document::finalize`]: bytes go to a temp file in the
//! destination's directory which is then renamed over the destination. A
//! failed or interrupted run therefore never leaves a truncated PDF behind,
//! and an existing file at the destination survives a failed run intact.

use crate::error::{Cbr2PdfError, PageError};
use crate::pipeline::render::{RenderedPage, RenderedPageInfo};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, ObjectId, Stream};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// An in-progress output document.
pub trait DocumentWriter {
    /// Add one page sized to `page.info`, filled entirely by its image.
    fn append_page(&mut self, page: RenderedPage) -> Result<(), String>;

    /// Pages appended so far.
    fn page_count(&self) -> usize;

    /// Serialise the complete document.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, String>;
}

/// Creates empty documents.
pub trait DocumentBackend: Send + Sync {
    fn create(&self, title: &str) -> Box<dyn DocumentWriter>;
}

/// Production backend writing PDF through `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfBackend;

impl DocumentBackend for LopdfBackend {
    fn create(&self, title: &str) -> Box<dyn DocumentWriter> {
        Box::new(LopdfWriter::new(title))
    }
}

/// PDF writer: one `/Page` per image, the image drawn as a `DCTDecode`
/// XObject stretched over the full `MediaBox` from the origin.
pub struct LopdfWriter {
    doc: lopdf::Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    title: String,
}

impl LopdfWriter {
    pub fn new(title: &str) -> Self {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            title: title.to_string(),
        }
    }
}

impl DocumentWriter for LopdfWriter {
    fn append_page(&mut self, page: RenderedPage) -> Result<(), String> {
        let RenderedPage { image, info, .. } = page;
        let RenderedPageInfo {
            page_width_pt: w,
            page_height_pt: h,
            ..
        } = info;

        let xobject = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width),
                "Height" => i64::from(image.height),
                "ColorSpace" => image.color_space.pdf_name(),
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.data,
        )
        .with_compression(false);
        let image_id = self.doc.add_object(xobject);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content.encode().map_err(|e| e.to_string())?;
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.kids.len()
    }

    fn finish(self: Box<Self>) -> Result<Vec<u8>, String> {
        let LopdfWriter {
            mut doc,
            pages_id,
            kids,
            title,
        } = *self;

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(title),
            "Producer" => Object::string_literal(concat!("cbr2pdf ", env!("CARGO_PKG_VERSION"))),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);
        doc.compress();

        let mut buf = Vec::new();
        doc.save_to(&mut buf).map_err(|e| e.to_string())?;
        Ok(buf)
    }
}

// ── Document lifecycle ───────────────────────────────────────────────────

/// The output document of one run, owned by the orchestrator.
pub struct Document {
    writer: Box<dyn DocumentWriter>,
}

impl Document {
    /// Start an empty document.
    pub fn create(backend: &dyn DocumentBackend, title: &str) -> Self {
        Self {
            writer: backend.create(title),
        }
    }

    /// Append `page` after every previously appended page.
    pub fn append_page(&mut self, page: RenderedPage) -> Result<(), PageError> {
        let path = page.source.path.clone();
        self.writer
            .append_page(page)
            .map_err(|detail| PageError::Append { path, detail })
    }

    pub fn page_count(&self) -> usize {
        self.writer.page_count()
    }

    /// Serialise the document and atomically replace `destination`.
    ///
    /// Returns the number of bytes written.
    pub fn finalize(self, destination: &Path) -> Result<u64, Cbr2PdfError> {
        let pages = self.writer.page_count();
        let bytes = self
            .writer
            .finish()
            .map_err(|detail| Cbr2PdfError::FinalizeFailed {
                path: destination.to_path_buf(),
                detail,
            })?;
        debug!("Serialised {} pages → {} bytes", pages, bytes.len());

        write_atomically(destination, &bytes)?;
        info!("Wrote {} ({} pages)", destination.display(), pages);
        Ok(bytes.len() as u64)
    }
}

/// Write `bytes` to a sibling temp file, then rename it onto `destination`.
fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<(), Cbr2PdfError> {
    let write_failed = |source: std::io::Error| Cbr2PdfError::OutputWriteFailed {
        path: destination.to_path_buf(),
        source,
    };

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_failed)?;

    // The temp file is removed on drop if anything below fails.
    let mut tmp = NamedTempFile::new_in(parent).map_err(write_failed)?;
    tmp.write_all(bytes).map_err(write_failed)?;
    tmp.as_file().sync_all().map_err(write_failed)?;
    tmp.persist(destination)
        .map_err(|e| write_failed(e.error))?;
    Ok(())
}
