use crate::model::Frame;
use crate::ocr::{
    command_available, frame_to_temp_png, run_engine_command, EngineFailure, OcrEngine,
    DEFAULT_ENGINE_TIMEOUT,
};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

/// OCR backend using the EasyOCR command-line tool.
///
/// EasyOCR loads its detection and recognition models on every run, so
/// calls are serialized.
pub struct EasyOcrEngine {
    binary: PathBuf,
    lang: String,
    timeout: Duration,
}

impl EasyOcrEngine {
    /// `lang` may be a tesseract-style code ("eng"); it is mapped to EasyOCR's
    /// two-letter codes where they differ.
    pub fn new(lang: &str) -> Self {
        EasyOcrEngine {
            binary: PathBuf::from("easyocr"),
            lang: easyocr_lang(lang).to_string(),
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

impl OcrEngine for EasyOcrEngine {
    fn name(&self) -> &str {
        "easyocr"
    }

    fn is_available(&self) -> bool {
        command_available(&self.binary, "--help")
    }

    fn recognize(&self, frame: &Frame) -> Result<String, EngineFailure> {
        let png = frame_to_temp_png(frame)?;
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-l")
            .arg(&self.lang)
            .arg("-f")
            .arg(png.path())
            .arg("--detail")
            .arg("0")
            .arg("--gpu")
            .arg("False");
        let stdout = run_engine_command(self.name(), &mut cmd, self.timeout)?;
        Ok(join_detections(&stdout))
    }

    fn concurrent_safe(&self) -> bool {
        false
    }
}

/// Keep one detection per line, dropping blank ones.
fn join_detections(stdout: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn easyocr_lang(lang: &str) -> &str {
    match lang {
        "eng" => "en",
        "deu" => "de",
        "fra" => "fr",
        "spa" => "es",
        "ita" => "it",
        "nld" => "nl",
        "por" => "pt",
        "chi_sim" => "ch_sim",
        other => other,
    }
}
