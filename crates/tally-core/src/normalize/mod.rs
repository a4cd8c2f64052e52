pub mod pdftoppm;

use crate::error::TallyError;
use crate::model::{Frame, MediaKind, SubmittedDocument};

/// Trait for PDF rasterization backends.
pub trait PdfRasterizer: Send + Sync {
    /// Render every page of the PDF, returning one Frame per page in page order.
    fn rasterize(&self, pdf_bytes: &[u8], page_count: usize) -> Result<Vec<Frame>, TallyError>;

    /// Name of this rasterization backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// Turns submitted images and PDFs into OCR-ready frames.
pub struct Normalizer {
    rasterizer: Box<dyn PdfRasterizer>,
}

impl Normalizer {
    pub fn new(rasterizer: Box<dyn PdfRasterizer>) -> Self {
        Normalizer { rasterizer }
    }

    pub fn rasterizer_name(&self) -> &str {
        self.rasterizer.backend_name()
    }

    /// Decode a document into frames: one for an image, one per page for a PDF.
    pub fn normalize(&self, doc: &SubmittedDocument) -> Result<Vec<Frame>, TallyError> {
        match doc.kind {
            MediaKind::Image => Ok(vec![decode_image(&doc.bytes, 1)?]),
            MediaKind::Pdf => {
                let page_count = count_pdf_pages(&doc.bytes)?;
                if page_count == 0 {
                    return Err(TallyError::EmptyDocument);
                }

                let frames = self.rasterizer.rasterize(&doc.bytes, page_count)?;
                if frames.len() != page_count {
                    return Err(TallyError::UnsupportedFormat(format!(
                        "{} rendered {} page(s) of a {}-page PDF",
                        self.rasterizer.backend_name(),
                        frames.len(),
                        page_count
                    )));
                }

                tracing::debug!(
                    pages = page_count,
                    backend = self.rasterizer.backend_name(),
                    "rasterized PDF"
                );
                Ok(frames)
            }
        }
    }
}

/// Decode raster image bytes (format sniffed from content) into an RGB frame.
pub fn decode_image(bytes: &[u8], page_number: usize) -> Result<Frame, TallyError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| TallyError::UnsupportedFormat(format!("image decode failed: {e}")))?;
    Ok(Frame::new(page_number, img.to_rgb8()))
}

/// Count the pages of a PDF, rejecting bytes that are not a PDF.
pub fn count_pdf_pages(bytes: &[u8]) -> Result<usize, TallyError> {
    let doc = lopdf::Document::load_mem(bytes)
        .map_err(|e| TallyError::UnsupportedFormat(format!("not a valid PDF: {e}")))?;
    Ok(doc.get_pages().len())
}


#[cfg(test)]
mod tests {
    use super::test_support::{pdf_bytes, png_bytes};
    use super::*;
    use image::{Rgb, RgbImage};

    struct BlankRasterizer;

    impl PdfRasterizer for BlankRasterizer {
        fn rasterize(&self, _pdf: &[u8], page_count: usize) -> Result<Vec<Frame>, TallyError> {
            Ok((1..=page_count)
                .map(|n| Frame::new(n, RgbImage::from_pixel(4, 4, Rgb([255u8, 255, 255]))))
                .collect())
        }

        fn backend_name(&self) -> &str {
            "blank"
        }
    }

    struct ShortRasterizer;

    impl PdfRasterizer for ShortRasterizer {
        fn rasterize(&self, _pdf: &[u8], _page_count: usize) -> Result<Vec<Frame>, TallyError> {
            Ok(vec![])
        }

        fn backend_name(&self) -> &str {
            "short"
        }
    }

    #[test]
    fn test_image_yields_one_frame() {
        let normalizer = Normalizer::new(Box::new(BlankRasterizer));
        let doc = SubmittedDocument::new(png_bytes(12, 8), MediaKind::Image);
        let frames = normalizer.normalize(&doc).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].page_number, 1);
        assert_eq!((frames[0].width(), frames[0].height()), (12, 8));
        assert_eq!(frames[0].pixels().len(), 12 * 8 * 3);
    }

    #[test]
    fn test_garbage_image_is_unsupported() {
        let normalizer = Normalizer::new(Box::new(BlankRasterizer));
        let doc = SubmittedDocument::new(b"definitely not a png".to_vec(), MediaKind::Image);
        assert!(matches!(
            normalizer.normalize(&doc),
            Err(TallyError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_pdf_yields_frame_per_page_in_order() {
        let normalizer = Normalizer::new(Box::new(BlankRasterizer));
        let doc = SubmittedDocument::new(pdf_bytes(3), MediaKind::Pdf);
        let frames = normalizer.normalize(&doc).unwrap();
        let pages: Vec<usize> = frames.iter().map(|f| f.page_number).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[test]
    fn test_malformed_pdf_is_unsupported() {
        let normalizer = Normalizer::new(Box::new(BlankRasterizer));
        let doc = SubmittedDocument::new(b"%PDF-garbage".to_vec(), MediaKind::Pdf);
        assert!(matches!(
            normalizer.normalize(&doc),
            Err(TallyError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_zero_page_pdf_is_empty() {
        let normalizer = Normalizer::new(Box::new(BlankRasterizer));
        let doc = SubmittedDocument::new(pdf_bytes(0), MediaKind::Pdf);
        assert!(matches!(
            normalizer.normalize(&doc),
            Err(TallyError::EmptyDocument)
        ));
    }

    #[test]
    fn test_page_count_mismatch_rejected() {
        let normalizer = Normalizer::new(Box::new(ShortRasterizer));
        let doc = SubmittedDocument::new(pdf_bytes(2), MediaKind::Pdf);
        assert!(matches!(
            normalizer.normalize(&doc),
            Err(TallyError::UnsupportedFormat(_))
        ));
    }
}
