use crate::error::TallyError;
use crate::format::{Column, DEFAULT_COLUMNS, DEFAULT_PLACEHOLDER};
use crate::normalize::pdftoppm::DEFAULT_DPI;
use crate::ocr::{EngineKind, DEFAULT_ENGINE_TIMEOUT};
use crate::roster::RosterConfig;
use crate::rules::builtin;
use crate::rules::schema::RuleSetDef;
use std::time::Duration;

/// Everything the pipeline needs, built once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// OCR engines in order of preference.
    pub engines: Vec<EngineKind>,
    /// Tesseract-style language code, e.g. "eng".
    pub ocr_lang: String,
    /// Limit for one engine run on one frame.
    pub ocr_timeout: Duration,
    pub pdf_dpi: u32,
    pub ruleset: RuleSetDef,
    pub columns: Vec<Column>,
    pub placeholder: String,
    /// Roster parsing is skipped when `None`.
    pub roster: Option<RosterConfig>,
}

impl PipelineConfig {
    /// Defaults with the builtin field ruleset.
    pub fn with_defaults() -> Result<Self, TallyError> {
        Ok(PipelineConfig {
            engines: vec![EngineKind::EasyOcr, EngineKind::Tesseract],
            ocr_lang: "eng".to_string(),
            ocr_timeout: DEFAULT_ENGINE_TIMEOUT,
            pdf_dpi: DEFAULT_DPI,
            ruleset: builtin::load_preset("default")?,
            columns: DEFAULT_COLUMNS.to_vec(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            roster: Some(RosterConfig::default()),
        })
    }

    pub fn home_base(&self) -> &str {
        self.roster.as_ref().map(|r| r.home_base.as_str()).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::with_defaults().unwrap();
        assert_eq!(config.engines, vec![EngineKind::EasyOcr, EngineKind::Tesseract]);
        assert_eq!(config.pdf_dpi, 200);
        assert_eq!(config.ocr_timeout, Duration::from_secs(90));
        assert_eq!(config.columns.first(), Some(&Column::Name));
        assert_eq!(config.home_base(), "SIN");
        assert!(!config.ruleset.rules.is_empty());
    }
}
