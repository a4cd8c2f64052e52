use crate::model::Frame;
use crate::ocr::{
    command_available, frame_to_temp_png, run_engine_command, EngineFailure, OcrEngine,
    DEFAULT_ENGINE_TIMEOUT,
};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

/// OCR backend using the tesseract command-line tool.
///
/// Runs `tesseract <image> stdout -l <lang>` on a temporary PNG of the frame.
pub struct TesseractEngine {
    binary: PathBuf,
    lang: String,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(lang: &str) -> Self {
        TesseractEngine {
            binary: PathBuf::from("tesseract"),
            lang: lang.to_string(),
            timeout: DEFAULT_ENGINE_TIMEOUT,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        command_available(&self.binary, "--version")
    }

    fn recognize(&self, frame: &Frame) -> Result<String, EngineFailure> {
        let png = frame_to_temp_png(frame)?;
        let mut cmd = Command::new(&self.binary);
        cmd.arg(png.path()).arg("stdout").arg("-l").arg(&self.lang);
        run_engine_command(self.name(), &mut cmd, self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_missing_binary_is_unavailable() {
        let engine = TesseractEngine::new("eng").with_binary("/nonexistent/tesseract-bin");
        assert!(!engine.is_available());
    }

    #[test]
    fn test_missing_binary_fails_recognition() {
        let engine = TesseractEngine::new("eng").with_binary("/nonexistent/tesseract-bin");
        let frame = Frame::new(1, RgbImage::from_pixel(2, 2, Rgb([255u8, 255, 255])));
        assert!(matches!(
            engine.recognize(&frame),
            Err(EngineFailure::NotInstalled(_))
        ));
    }
}
