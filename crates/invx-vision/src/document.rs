//! Document sniffing and staging.
//!
//! Staging splits a document into the pages sent to a backend. Multi-page PDFs
//! become single-page PDFs and oversized images are downscaled. Anything written
//! lives in a temporary directory that is removed when the [`StagedDocument`]
//! is dropped.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::GenericImageView;
use lopdf::{Document, Object, ObjectId, dictionary};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::{Result, VisionError};

pub const PDF_MIME: &str = "application/pdf";
pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";

/// Number of header bytes inspected when sniffing.
pub const SNIFF_LEN: usize = 512;

/// Identify a MIME type from the leading bytes of a file.
///
/// Only the header is trusted; file names are never consulted.
pub fn sniff_mime(header: &[u8]) -> &'static str {
    match header {
        [] => "application/x-empty",
        [0x25, 0x50, 0x44, 0x46, ..] => PDF_MIME,
        [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, ..] => PNG_MIME,
        [0xFF, 0xD8, 0xFF, ..] => JPEG_MIME,
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => "image/tiff",
        [b'B', b'M', ..] => "image/bmp",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        // OLE2 compound file (legacy Office documents)
        [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, ..] => "application/msword",
        [b'P', b'K', 0x03, 0x04, ..] => "application/zip",
        [b'{', b'\\', b'r', b't', b'f', ..] => "text/rtf",
        _ if is_likely_text(header) => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Sniff the MIME type of a file from its header.
pub fn sniff_file(path: &Path) -> std::io::Result<&'static str> {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(sniff_mime(&header))
}

/// Valid UTF-8 (allowing a cut final character) that is mostly printable.
fn is_likely_text(bytes: &[u8]) -> bool {
    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) if e.error_len().is_none() => {
            // Sniff window ended inside a multi-byte character.
            match std::str::from_utf8(&bytes[..e.valid_up_to()]) {
                Ok(text) => text,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    let total = text.chars().count();
    if total == 0 {
        return false;
    }
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    printable as f64 / total as f64 > 0.95
}

/// One unit of work for a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Page number (1-indexed).
    pub number: u32,
    /// MIME type of the page payload.
    pub mime: &'static str,
    /// File holding the payload.
    pub path: PathBuf,
}

impl Page {
    pub fn new(number: u32, mime: &'static str, path: PathBuf) -> Self {
        Self { number, mime, path }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime == PDF_MIME
    }

    /// File name presented to backends that want one.
    pub fn file_name(&self) -> String {
        let extension = match self.mime {
            PDF_MIME => "pdf",
            PNG_MIME => "png",
            JPEG_MIME => "jpg",
            _ => "bin",
        };
        format!("page-{}.{}", self.number, extension)
    }

    /// Base64 of the payload.
    pub fn encoded(&self) -> Result<String> {
        let data = std::fs::read(&self.path)?;
        Ok(STANDARD.encode(data))
    }

    /// `data:` URL of the payload.
    pub fn data_url(&self) -> Result<String> {
        Ok(format!("data:{};base64,{}", self.mime, self.encoded()?))
    }
}

/// Limits applied while staging.
#[derive(Debug, Clone, Copy)]
pub struct StagingOptions {
    /// Maximum pages to send (0 = unlimited).
    pub max_pages: usize,
    /// Longer image side above which images are downscaled (0 = never).
    pub max_image_dimension: u32,
}

impl Default for StagingOptions {
    fn default() -> Self {
        Self {
            max_pages: 0,
            max_image_dimension: 2048,
        }
    }
}

/// A document prepared for upload.
#[derive(Debug)]
pub struct StagedDocument {
    pages: Vec<Page>,
    workdir: Option<TempDir>,
}

impl StagedDocument {
    /// Split a document into pages, writing intermediate files when needed.
    pub fn stage(path: &Path, options: &StagingOptions) -> Result<Self> {
        let mime = sniff_file(path)?;
        match mime {
            PDF_MIME => Self::stage_pdf(path, options),
            PNG_MIME | JPEG_MIME => Self::stage_image(path, mime, options),
            other => Err(VisionError::Document(format!(
                "cannot stage content of type {}",
                other
            ))),
        }
    }

    /// Pages in document order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Directory holding intermediate files, if any were written.
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_ref().map(|dir| dir.path())
    }

    /// Remove intermediate files now, logging instead of failing.
    pub fn cleanup(mut self) {
        if let Some(dir) = self.workdir.take() {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!("Removed staging directory {}", path.display()),
                Err(e) => warn!("Failed to remove staging directory {}: {}", path.display(), e),
            }
        }
    }

    fn whole(path: &Path, mime: &'static str) -> Self {
        Self {
            pages: vec![Page::new(1, mime, path.to_path_buf())],
            workdir: None,
        }
    }

    fn stage_pdf(path: &Path, options: &StagingOptions) -> Result<Self> {
        let data = std::fs::read(path)?;
        let document = match Document::load_mem(&data) {
            Ok(document) => document,
            Err(e) => {
                warn!("Could not split PDF ({}), sending it whole", e);
                return Ok(Self::whole(path, PDF_MIME));
            }
        };

        let page_ids = document.get_pages();
        if page_ids.len() <= 1 {
            return Ok(Self::whole(path, PDF_MIME));
        }

        let limit = if options.max_pages == 0 {
            page_ids.len()
        } else {
            options.max_pages.min(page_ids.len())
        };
        if limit < page_ids.len() {
            warn!(
                "PDF has {} pages, only the first {} will be sent",
                page_ids.len(),
                limit
            );
        }

        let workdir = tempfile::Builder::new().prefix("invx-").tempdir()?;
        let mut pages = Vec::with_capacity(limit);

        for (&number, &page_id) in page_ids.iter().take(limit) {
            let mut single = single_page(&document, page_id).map_err(|e| {
                VisionError::Document(format!("failed to extract page {}: {}", number, e))
            })?;

            let out = workdir.path().join(format!("page-{:04}.pdf", number));
            single.save(&out).map_err(|e| {
                VisionError::Document(format!("failed to write page {}: {}", number, e))
            })?;
            pages.push(Page::new(number, PDF_MIME, out));
        }

        debug!(
            "Split PDF into {} pages under {}",
            pages.len(),
            workdir.path().display()
        );

        Ok(Self {
            pages,
            workdir: Some(workdir),
        })
    }

    fn stage_image(path: &Path, mime: &'static str, options: &StagingOptions) -> Result<Self> {
        let max = options.max_image_dimension;
        if max == 0 {
            return Ok(Self::whole(path, mime));
        }

        // Decode by content; the extension may not match
        let unreadable =
            |e: image::ImageError| VisionError::Document(format!("unreadable image: {}", e));
        let (width, height) = image::ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(unreadable)?;
        if width <= max && height <= max {
            return Ok(Self::whole(path, mime));
        }

        let image = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(unreadable)?;
        let resized = image.resize(max, max, image::imageops::FilterType::Lanczos3);
        let (new_width, new_height) = resized.dimensions();

        let workdir = tempfile::Builder::new().prefix("invx-").tempdir()?;
        let out = workdir.path().join("page-0001.png");
        resized
            .save_with_format(&out, image::ImageFormat::Png)
            .map_err(|e| VisionError::Document(format!("failed to write image: {}", e)))?;

        debug!(
            "Downscaled image {}x{} -> {}x{}",
            width, height, new_width, new_height
        );

        Ok(Self {
            pages: vec![Page::new(1, PNG_MIME, out)],
            workdir: Some(workdir),
        })
    }
}

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITED_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Build a one-page document holding only the objects `page_id` refers to.
fn single_page(source: &Document, page_id: ObjectId) -> lopdf::Result<Document> {
    let mut page = source.get_dictionary(page_id)?.clone();

    // Inherited attributes are copied down since the old page tree is dropped
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    while let Some(id) = parent {
        let node = source.get_dictionary(id)?;
        for key in INHERITED_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    page.remove(b"Parent");

    let mut out = Document::with_version(source.version.clone());
    let mut pending: Vec<ObjectId> = Vec::new();
    collect_dictionary(&page, &mut pending);
    while let Some(id) = pending.pop() {
        if id == page_id || out.objects.contains_key(&id) {
            continue;
        }
        // Dangling references are left for the reader to ignore
        let Ok(object) = source.get_object(id) else {
            continue;
        };
        collect_references(object, &mut pending);
        out.objects.insert(id, object.clone());
    }

    let pages_id = (source.max_id + 1, 0);
    let catalog_id = (source.max_id + 2, 0);
    page.set("Parent", pages_id);
    out.objects.insert(page_id, Object::Dictionary(page));
    out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1i64,
        }),
    );
    out.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        }),
    );
    out.trailer.set("Root", catalog_id);
    out.max_id = catalog_id.0;
    Ok(out)
}

/// Push every object id referenced by `object`.
fn collect_references(object: &Object, pending: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => pending.push(*id),
        Object::Array(items) => {
            for item in items {
                collect_references(item, pending);
            }
        }
        Object::Dictionary(dict) => collect_dictionary(dict, pending),
        Object::Stream(stream) => collect_dictionary(&stream.dict, pending),
        _ => {}
    }
}

/// Links back up a tree (`Parent`) are not followed.
fn collect_dictionary(dict: &lopdf::Dictionary, pending: &mut Vec<ObjectId>) {
    for (key, value) in dict.iter() {
        if key.as_slice() != b"Parent" {
            collect_references(value, pending);
        }
    }
}

/// Write a PDF with `count` blank pages.
#[cfg(test)]
pub(crate) fn write_test_pdf(path: &Path, count: u32) {
    use lopdf::Stream;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = (0..count)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
            .into()
        })
        .collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => i64::from(count),
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}
