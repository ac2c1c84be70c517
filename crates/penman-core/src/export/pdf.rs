//! Paginated PDF from a single raster image.
//!
//! The bitmap is placed at full page width and slid upward one page height
//! per page, so every page shows the next slice of the same image.

use std::fmt::Write as _;

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;

use super::{ExportError, ExportErrorKind};

/// Page width in millimetres.
pub const PAGE_WIDTH_MM: f64 = 210.0;
/// Page height in millimetres, also the pagination step.
pub const PAGE_HEIGHT_MM: f64 = 295.0;

const JPEG_QUALITY: u8 = 92;
const PT_PER_MM: f64 = 72.0 / 25.4;

/// Height in millimetres of a `width`×`height` image drawn at page width.
pub fn image_height_mm(width: u32, height: u32) -> f64 {
    f64::from(height) * PAGE_WIDTH_MM / f64::from(width)
}

/// Vertical image offset, in millimetres from the page top, for each page.
///
/// The first page draws the image at 0. While image height remains after
/// subtracting a page, another page is added at `remaining - image_height`.
pub fn paginate(width: u32, height: u32) -> Vec<f64> {
    let image_height = image_height_mm(width, height);
    let mut offsets = vec![0.0];
    let mut remaining = image_height - PAGE_HEIGHT_MM;
    while remaining >= 0.0 {
        offsets.push(remaining - image_height);
        remaining -= PAGE_HEIGHT_MM;
    }
    offsets
}

/// Encodes the bitmap as baseline JPEG.
///
/// # Errors
/// Returns an error if encoding fails.
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode_image(image)
        .map_err(|e| ExportError::new(ExportErrorKind::Rasterize, format!("encode JPEG: {e}")))?;
    Ok(out)
}

/// Builds a PDF with one page per offset from [`paginate`].
///
/// # Errors
/// Returns an error if the image is empty or cannot be encoded.
pub fn render_pdf(image: &RgbImage) -> Result<Vec<u8>, ExportError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(ExportError::new(
            ExportErrorKind::Rasterize,
            "cannot paginate an empty image",
        ));
    }
    let jpeg = encode_jpeg(image)?;
    let offsets = paginate(width, height);
    Ok(write_pdf(&jpeg, width, height, &offsets))
}

/// Minimal PDF 1.4 writer: catalog, page tree, one shared DCT image.
fn write_pdf(jpeg: &[u8], width: u32, height: u32, offsets: &[f64]) -> Vec<u8> {
    const CATALOG: usize = 1;
    const PAGES: usize = 2;
    const IMAGE: usize = 3;
    const FIRST_PAGE: usize = 4;

    let mut pdf = PdfWriter::new();
    let page_ids: Vec<usize> = (0..offsets.len()).map(|i| FIRST_PAGE + 2 * i).collect();

    pdf.object(CATALOG, &format!("<< /Type /Catalog /Pages {PAGES} 0 R >>"));

    let kids = page_ids
        .iter()
        .fold(String::new(), |mut acc, id| {
            let _ = write!(acc, "{id} 0 R ");
            acc
        });
    pdf.object(
        PAGES,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.trim_end(),
            page_ids.len()
        ),
    );

    pdf.stream(
        IMAGE,
        &format!(
            "/Type /XObject /Subtype /Image /Width {width} /Height {height} \
             /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode"
        ),
        jpeg,
    );

    let page_w = PAGE_WIDTH_MM * PT_PER_MM;
    let page_h = PAGE_HEIGHT_MM * PT_PER_MM;
    let image_h_mm = image_height_mm(width, height);
    for (page_id, offset) in page_ids.iter().zip(offsets) {
        let content_id = page_id + 1;
        pdf.object(
            *page_id,
            &format!(
                "<< /Type /Page /Parent {PAGES} 0 R /MediaBox [0 0 {page_w:.2} {page_h:.2}] \
                 /Resources << /XObject << /Im0 {IMAGE} 0 R >> >> /Contents {content_id} 0 R >>"
            ),
        );

        // PDF space grows upward from the bottom edge.
        let y = (PAGE_HEIGHT_MM - offset - image_h_mm) * PT_PER_MM;
        let draw = format!(
            "q {:.2} 0 0 {:.2} 0 {:.2} cm /Im0 Do Q",
            page_w,
            image_h_mm * PT_PER_MM,
            y
        );
        pdf.stream(content_id, "", draw.as_bytes());
    }

    pdf.finish(CATALOG)
}

struct PdfWriter {
    buf: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            buf,
            offsets: Vec::new(),
        }
    }

    fn object(&mut self, id: usize, body: &str) {
        self.offsets.push((id, self.buf.len()));
        self.buf
            .extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    fn stream(&mut self, id: usize, dict: &str, data: &[u8]) {
        self.offsets.push((id, self.buf.len()));
        let sep = if dict.is_empty() { "" } else { " " };
        self.buf.extend_from_slice(
            format!("{id} 0 obj\n<< {dict}{sep}/Length {} >>\nstream\n", data.len()).as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn finish(mut self, root: usize) -> Vec<u8> {
        self.offsets.sort_unstable();
        let count = self.offsets.len() + 1;
        let xref_at = self.buf.len();

        let mut xref = format!("xref\n0 {count}\n0000000000 65535 f \n");
        for (_, offset) in &self.offsets {
            let _ = write!(xref, "{offset:010} 00000 n \n");
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {count} /Root {root} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        );
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}
