//! Pipeline stages for comic-archive-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step and owns the
//! capability trait for its external collaborator, so tests can swap in fakes
//! that skip real decompression, decoding and PDF serialisation.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ locate ──▶ render ──▶ assemble
//! (zip/rar)   (walkdir)  (image)    (lopdf)
//! ```
//!
//! 1. [`extract`]  — unpack the archive into a run-scoped scratch directory
//! 2. [`locate`]   — find supported images and put them in reading order
//! 3. [`render`]   — decode one image, bind it to the target resolution,
//!    resample, re-encode, and compute its physical page size
//! 4. [`encode`]   — the `image`-crate codec used by `render`
//! 5. [`assemble`] — append rendered pages to the document and write it
//!    to the destination without ever leaving a half-written file

pub mod assemble;
pub mod encode;
pub mod extract;
pub mod locate;
pub mod render;
