pub mod easyocr;
pub mod tesseract;

use crate::error::TallyError;
use crate::model::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub use easyocr::EasyOcrEngine;
pub use tesseract::TesseractEngine;

/// How long one engine run may take on one frame before it is killed.
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(90);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a single engine could not produce text for a frame.
#[derive(Debug, thiserror::Error)]
pub enum EngineFailure {
    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("{engine} exited with code {code}: {stderr}")]
    Exited {
        engine: String,
        code: i32,
        stderr: String,
    },

    #[error("{engine} did not finish within {after:?}")]
    TimedOut { engine: String, after: Duration },

    #[error("{0} produced output that is not valid UTF-8")]
    InvalidOutput(String),

    #[error("failed to write frame for OCR: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A text recognition backend.
pub trait OcrEngine: Send + Sync {
    /// Engine identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Capability probe, evaluated once when the adapter is built.
    fn is_available(&self) -> bool;

    /// Recognize the text in one frame. An empty string is a valid result.
    fn recognize(&self, frame: &Frame) -> Result<String, EngineFailure>;

    /// Whether several frames may be recognized at the same time.
    fn concurrent_safe(&self) -> bool {
        true
    }
}

/// Built-in engines, selectable by name in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    EasyOcr,
    Tesseract,
}

impl EngineKind {
    pub fn build(&self, lang: &str, timeout: Duration) -> Box<dyn OcrEngine> {
        match self {
            EngineKind::EasyOcr => Box::new(EasyOcrEngine::new(lang).with_timeout(timeout)),
            EngineKind::Tesseract => Box::new(TesseractEngine::new(lang).with_timeout(timeout)),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::EasyOcr => write!(f, "easyocr"),
            EngineKind::Tesseract => write!(f, "tesseract"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easyocr" => Ok(EngineKind::EasyOcr),
            "tesseract" => Ok(EngineKind::Tesseract),
            other => Err(format!(
                "unknown OCR engine '{other}'. Available: easyocr, tesseract"
            )),
        }
    }
}

struct EngineSlot {
    engine: Box<dyn OcrEngine>,
    /// Held for one recognition call when the engine is not concurrent-safe.
    lock: Option<Mutex<()>>,
}

impl EngineSlot {
    fn new(engine: Box<dyn OcrEngine>) -> Self {
        let lock = if engine.concurrent_safe() {
            None
        } else {
            Some(Mutex::new(()))
        };
        EngineSlot { engine, lock }
    }

    fn recognize(&self, frame: &Frame) -> Result<String, EngineFailure> {
        let _guard = self
            .lock
            .as_ref()
            .map(|m| m.lock().unwrap_or_else(|poisoned| poisoned.into_inner()));
        self.engine.recognize(frame)
    }
}

/// Primary/secondary OCR with a single static fallback.
pub struct OcrAdapter {
    slots: Vec<EngineSlot>,
    unavailable: Vec<String>,
}

impl OcrAdapter {
    /// Probe candidates in preference order and keep the first two that are
    /// available as primary and secondary.
    pub fn probe(candidates: Vec<Box<dyn OcrEngine>>) -> Self {
        let mut slots = Vec::new();
        let mut unavailable = Vec::new();

        for engine in candidates {
            if slots.len() == 2 {
                tracing::debug!(engine = engine.name(), "ignoring extra OCR engine");
                continue;
            }
            if engine.is_available() {
                tracing::info!(engine = engine.name(), "OCR engine available");
                slots.push(EngineSlot::new(engine));
            } else {
                tracing::warn!(engine = engine.name(), "OCR engine unavailable, skipping");
                unavailable.push(engine.name().to_string());
            }
        }

        OcrAdapter { slots, unavailable }
    }

    /// Names of the engines in use, primary first.
    pub fn engine_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.engine.name()).collect()
    }

    /// Recognize one frame, falling back to the secondary engine once.
    pub fn recognize(&self, frame: &Frame) -> Result<String, TallyError> {
        let mut attempted: Vec<String> = self
            .unavailable
            .iter()
            .map(|name| format!("{name} (unavailable)"))
            .collect();

        for slot in &self.slots {
            match slot.recognize(frame) {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(
                        engine = slot.engine.name(),
                        page = frame.page_number,
                        error = %e,
                        "OCR engine failed"
                    );
                    attempted.push(format!("{} ({e})", slot.engine.name()));
                }
            }
        }

        Err(TallyError::OcrEngineUnavailable { attempted })
    }

    /// Recognize frames in order and join their text with a blank line.
    pub fn recognize_frames(&self, frames: &[Frame]) -> Result<String, TallyError> {
        let mut texts = Vec::with_capacity(frames.len());
        for frame in frames {
            texts.push(self.recognize(frame)?);
        }
        Ok(texts.join("\n\n"))
    }
}

/// Check whether a command-line engine responds to a harmless invocation.
pub(crate) fn command_available(binary: &Path, probe_arg: &str) -> bool {
    Command::new(binary)
        .arg(probe_arg)
        .output()
        .map(|o| o.status.success() || !o.stderr.is_empty())
        .unwrap_or(false)
}

/// Write a frame to a temporary PNG for engines that read from disk.
pub(crate) fn frame_to_temp_png(frame: &Frame) -> Result<tempfile::NamedTempFile, EngineFailure> {
    let tmp = tempfile::Builder::new()
        .prefix("tally-frame-")
        .suffix(".png")
        .tempfile()?;
    frame
        .image
        .save_with_format(tmp.path(), image::ImageFormat::Png)
        .map_err(|e| EngineFailure::Encode(e.to_string()))?;
    Ok(tmp)
}

/// Run an engine command and return its stdout as UTF-8 text.
///
/// The child is killed once `timeout` elapses.
pub(crate) fn run_engine_command(
    engine: &str,
    command: &mut Command,
    timeout: Duration,
) -> Result<String, EngineFailure> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineFailure::NotInstalled(engine.to_string())
            } else {
                EngineFailure::Io(e)
            }
        })?;

    // Drained on separate threads; a full pipe would block the child.
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                tracing::warn!(engine, error = %e, "could not kill timed-out OCR engine");
            }
            child.wait()?;
            return Err(EngineFailure::TimedOut {
                engine: engine.to_string(),
                after: timeout,
            });
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = collect(stdout);
    let stderr = collect(stderr);

    if !status.success() {
        return Err(EngineFailure::Exited {
            engine: engine.to_string(),
            code: status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });
    }

    String::from_utf8(stdout).map_err(|_| EngineFailure::InvalidOutput(engine.to_string()))
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buf) {
            tracing::debug!(error = %e, "engine pipe closed early");
        }
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeEngine {
        name: &'static str,
        available: bool,
        result: Result<&'static str, ()>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeEngine {
        fn new(name: &'static str, available: bool, result: Result<&'static str, ()>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                FakeEngine {
                    name,
                    available,
                    result,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl OcrEngine for FakeEngine {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn recognize(&self, _frame: &Frame) -> Result<String, EngineFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .map(str::to_string)
                .map_err(|_| EngineFailure::InvalidOutput(self.name.to_string()))
        }
    }

    fn frame() -> Frame {
        Frame::new(1, RgbImage::from_pixel(2, 2, Rgb([0u8, 0, 0])))
    }

    #[test]
    fn test_primary_used_when_available() {
        let (a, a_calls) = FakeEngine::new("a", true, Ok("from a"));
        let (b, b_calls) = FakeEngine::new("b", true, Ok("from b"));
        let adapter = OcrAdapter::probe(vec![Box::new(a), Box::new(b)]);
        assert_eq!(adapter.recognize(&frame()).unwrap(), "from a");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unavailable_primary_falls_back_once() {
        let (a, a_calls) = FakeEngine::new("a", false, Ok("from a"));
        let (b, b_calls) = FakeEngine::new("b", true, Ok("from b"));
        let adapter = OcrAdapter::probe(vec![Box::new(a), Box::new(b)]);
        assert_eq!(adapter.engine_names(), vec!["b"]);
        assert_eq!(adapter.recognize(&frame()).unwrap(), "from b");
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_primary_falls_back_once() {
        let (a, a_calls) = FakeEngine::new("a", true, Err(()));
        let (b, b_calls) = FakeEngine::new("b", true, Ok("from b"));
        let adapter = OcrAdapter::probe(vec![Box::new(a), Box::new(b)]);
        assert_eq!(adapter.recognize(&frame()).unwrap(), "from b");
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_both_failing_reports_unavailable_without_retry() {
        let (a, a_calls) = FakeEngine::new("a", true, Err(()));
        let (b, b_calls) = FakeEngine::new("b", true, Err(()));
        let adapter = OcrAdapter::probe(vec![Box::new(a), Box::new(b)]);
        match adapter.recognize(&frame()) {
            Err(TallyError::OcrEngineUnavailable { attempted }) => assert_eq!(attempted.len(), 2),
            other => panic!("expected OcrEngineUnavailable, got {other:?}"),
        }
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_available_engine() {
        let (a, a_calls) = FakeEngine::new("a", false, Ok("x"));
        let (b, b_calls) = FakeEngine::new("b", false, Ok("y"));
        let adapter = OcrAdapter::probe(vec![Box::new(a), Box::new(b)]);
        assert!(matches!(
            adapter.recognize(&frame()),
            Err(TallyError::OcrEngineUnavailable { .. })
        ));
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_third_engine_ignored() {
        let (a, _) = FakeEngine::new("a", true, Err(()));
        let (b, _) = FakeEngine::new("b", true, Err(()));
        let (c, c_calls) = FakeEngine::new("c", true, Ok("c"));
        let adapter = OcrAdapter::probe(vec![Box::new(a), Box::new(b), Box::new(c)]);
        assert!(adapter.recognize(&frame()).is_err());
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_text_is_not_an_error() {
        let (a, _) = FakeEngine::new("a", true, Ok(""));
        let adapter = OcrAdapter::probe(vec![Box::new(a)]);
        assert_eq!(adapter.recognize(&frame()).unwrap(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_output_is_engine_failure() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(r"printf '\377\376'");
        assert!(matches!(
            run_engine_command("sh", &mut cmd, DEFAULT_ENGINE_TIMEOUT),
            Err(EngineFailure::InvalidOutput(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_engine_failure() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo broken >&2; exit 3");
        match run_engine_command("sh", &mut cmd, DEFAULT_ENGINE_TIMEOUT) {
            Err(EngineFailure::Exited { code, stderr, .. }) => {
                assert_eq!(code, 3);
                assert_eq!(stderr, "broken");
            }
            other => panic!("expected Exited, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_utf8_output_is_returned() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf 'Name: Jane'");
        assert_eq!(run_engine_command("sh", &mut cmd, DEFAULT_ENGINE_TIMEOUT).unwrap(), "Name: Jane");
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_engine_is_killed() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exec sleep 10");
        let started = Instant::now();
        match run_engine_command("sh", &mut cmd, Duration::from_millis(200)) {
            Err(EngineFailure::TimedOut { after, .. }) => {
                assert_eq!(after, Duration::from_millis(200))
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_engine_kind_parse() {
        assert_eq!("EasyOCR".parse::<EngineKind>(), Ok(EngineKind::EasyOcr));
        assert_eq!(" tesseract ".parse::<EngineKind>(), Ok(EngineKind::Tesseract));
        assert!("paddle".parse::<EngineKind>().is_err());
    }
}
