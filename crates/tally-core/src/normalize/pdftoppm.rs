use crate::error::TallyError;
use crate::model::Frame;
use crate::normalize::{decode_image, PdfRasterizer};
use std::path::{Path, PathBuf};
use std::process::Command;

pub const DEFAULT_DPI: u32 = 200;

/// PDF rasterization backend using pdftoppm (from poppler-utils).
///
/// Renders each page to PNG at the configured resolution and decodes the
/// results in page order.
pub struct PdftoppmRasterizer {
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        PdftoppmRasterizer { dpi }
    }

    /// Check if pdftoppm is available on the system.
    pub fn is_available() -> bool {
        Command::new("pdftoppm")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_DPI)
    }
}

impl PdfRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf_bytes: &[u8], page_count: usize) -> Result<Vec<Frame>, TallyError> {
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join("input.pdf");
        std::fs::write(&input, pdf_bytes)?;
        let prefix = workdir.path().join("page");

        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(&input)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TallyError::RasterizerUnavailable
                } else {
                    TallyError::Io(e)
                }
            })?;

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(TallyError::RasterizerFailed { code, stderr });
        }

        let pages = rendered_pages(workdir.path())?;
        if pages.len() != page_count {
            tracing::warn!(
                expected = page_count,
                rendered = pages.len(),
                "pdftoppm page count differs from PDF page tree"
            );
        }

        pages
            .iter()
            .enumerate()
            .map(|(i, path)| {
                let bytes = std::fs::read(path)?;
                decode_image(&bytes, i + 1)
            })
            .collect()
    }

    fn backend_name(&self) -> &str {
        "pdftoppm"
    }
}

/// List `page-N.png` files in a directory, ordered by page number.
///
/// pdftoppm zero-pads the page number to the width of the page count, so
/// ordering is done on the parsed number rather than the file name.
fn rendered_pages(dir: &Path) -> Result<Vec<PathBuf>, TallyError> {
    let mut numbered: Vec<(usize, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(n) = page_number_from_name(name) {
            numbered.push((n, path));
        }
    }
    numbered.sort_by_key(|(n, _)| *n);
    Ok(numbered.into_iter().map(|(_, p)| p).collect())
}

fn page_number_from_name(name: &str) -> Option<usize> {
    name.strip_prefix("page-")?.strip_suffix(".png")?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number_from_name() {
        assert_eq!(page_number_from_name("page-1.png"), Some(1));
        assert_eq!(page_number_from_name("page-010.png"), Some(10));
        assert_eq!(page_number_from_name("input.pdf"), None);
        assert_eq!(page_number_from_name("page-x.png"), None);
    }

    #[test]
    fn test_rendered_pages_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-2.png", "page-1.png", "input.pdf"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let pages = rendered_pages(dir.path()).unwrap();
        let names: Vec<String> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-2.png", "page-10.png"]);
    }
}
