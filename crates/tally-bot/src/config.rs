use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tally_core::format::parse_columns;
use tally_core::ocr::EngineKind;
use tally_core::roster::RosterConfig;
use tally_core::PipelineConfig;

/// Process-wide settings read from the environment (after `.env`).
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_token: Option<String>,
    /// Route segment without the leading slash.
    pub webhook_path: String,
    pub port: u16,
    /// Chats allowed to submit. `None` accepts everyone.
    pub trusted_ids: Option<HashSet<i64>>,
    pub sheet_id: Option<String>,
    pub sheet_name: String,
    pub roster_sheet_name: Option<String>,
    pub google_creds_b64: Option<String>,
    pub google_credentials_file: Option<PathBuf>,
    pub pipeline_timeout: Duration,
    pub pipeline: PipelineConfig,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut pipeline = PipelineConfig::with_defaults()?;

        if let Some(engines) = get("OCR_ENGINES") {
            pipeline.engines = engines
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<EngineKind>().map_err(|e| anyhow!(e)))
                .collect::<Result<Vec<_>>>()
                .context("invalid OCR_ENGINES")?;
            if pipeline.engines.is_empty() {
                bail!("OCR_ENGINES must name at least one engine");
            }
        }
        if let Some(lang) = get("OCR_LANG") {
            pipeline.ocr_lang = lang;
        }
        if let Some(secs) = get("OCR_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .context("OCR_TIMEOUT_SECS must be a number of seconds")?;
            pipeline.ocr_timeout = Duration::from_secs(secs);
        }
        if let Some(dpi) = get("PDF_DPI") {
            pipeline.pdf_dpi = dpi.parse().context("PDF_DPI must be a positive integer")?;
        }
        if let Some(path) = get("RULES_FILE") {
            pipeline.ruleset = tally_core::rules::load_ruleset(Path::new(&path))?;
        }
        if let Some(columns) = get("SHEET_COLUMNS") {
            pipeline.columns = parse_columns(&columns)
                .map_err(|e| anyhow!(e))
                .context("invalid SHEET_COLUMNS")?;
        }
        if let Some(placeholder) = get("MISSING_PLACEHOLDER") {
            pipeline.placeholder = placeholder;
        }

        let defaults = RosterConfig::default();
        pipeline.roster = Some(RosterConfig {
            carrier: get("CARRIER_CODE").unwrap_or(defaults.carrier),
            home_base: get("HOME_BASE").unwrap_or(defaults.home_base),
        });

        let trusted_ids = get("TRUSTED_IDS")
            .map(|ids| parse_trusted_ids(&ids))
            .transpose()?;

        let port = match get("PORT") {
            Some(p) => p.parse().context("PORT must be a port number")?,
            None => 8000,
        };
        let timeout_secs: u64 = match get("PIPELINE_TIMEOUT_SECS") {
            Some(s) => s.parse().context("PIPELINE_TIMEOUT_SECS must be a number of seconds")?,
            None => 120,
        };

        Ok(BotConfig {
            telegram_token: get("TELEGRAM_BOT_TOKEN"),
            webhook_path: get("WEBHOOK_PATH")
                .map(|p| p.trim_matches('/').to_string())
                .unwrap_or_else(|| "webhook".to_string()),
            port,
            trusted_ids,
            sheet_id: get("SHEET_ID"),
            sheet_name: get("SHEET_NAME").unwrap_or_else(|| "Sheet1".to_string()),
            roster_sheet_name: get("ROSTER_SHEET_NAME"),
            google_creds_b64: get("GOOGLE_CREDS_B64"),
            google_credentials_file: get("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from),
            pipeline_timeout: Duration::from_secs(timeout_secs),
            pipeline,
        })
    }

    pub fn require_token(&self) -> Result<&str> {
        self.telegram_token
            .as_deref()
            .ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN must be set"))
    }

    pub fn is_trusted(&self, chat_id: i64) -> bool {
        match &self.trusted_ids {
            Some(ids) => ids.contains(&chat_id),
            None => true,
        }
    }
}

fn parse_trusted_ids(ids: &str) -> Result<HashSet<i64>> {
    ids.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .with_context(|| format!("TRUSTED_IDS entry '{s}' is not a chat id"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<BotConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = config(&[]).unwrap();
        assert_eq!(c.webhook_path, "webhook");
        assert_eq!(c.port, 8000);
        assert_eq!(c.sheet_name, "Sheet1");
        assert_eq!(c.pipeline_timeout, Duration::from_secs(120));
        assert!(c.trusted_ids.is_none());
        assert!(c.is_trusted(1));
        assert!(c.require_token().is_err());
        assert_eq!(c.pipeline.engines, vec![EngineKind::EasyOcr, EngineKind::Tesseract]);
    }

    #[test]
    fn test_overrides() {
        let c = config(&[
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("WEBHOOK_PATH", "/hook-secret/"),
            ("PORT", "9000"),
            ("TRUSTED_IDS", "11, -22,"),
            ("OCR_ENGINES", "tesseract"),
            ("PDF_DPI", "300"),
            ("OCR_TIMEOUT_SECS", "30"),
            ("SHEET_COLUMNS", "sender,name"),
            ("HOME_BASE", "HKG"),
            ("CARRIER_CODE", "CX"),
            ("MISSING_PLACEHOLDER", "?"),
        ])
        .unwrap();
        assert_eq!(c.require_token().unwrap(), "123:abc");
        assert_eq!(c.webhook_path, "hook-secret");
        assert_eq!(c.port, 9000);
        assert!(c.is_trusted(-22));
        assert!(!c.is_trusted(33));
        assert_eq!(c.pipeline.engines, vec![EngineKind::Tesseract]);
        assert_eq!(c.pipeline.pdf_dpi, 300);
        assert_eq!(c.pipeline.ocr_timeout, Duration::from_secs(30));
        assert_eq!(c.pipeline.columns.len(), 2);
        assert_eq!(c.pipeline.home_base(), "HKG");
        assert_eq!(c.pipeline.placeholder, "?");
    }

    #[test]
    fn test_blank_values_are_unset() {
        let c = config(&[("SHEET_NAME", "  "), ("TRUSTED_IDS", "")]).unwrap();
        assert_eq!(c.sheet_name, "Sheet1");
        assert!(c.trusted_ids.is_none());
    }

    #[test]
    fn test_rules_file_replaces_default_ruleset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"{"name": "Site", "version": "1", "rules": [{"field": "project", "pattern": "Job (\\w+)"}]}"#,
        )
        .unwrap();

        let c = config(&[("RULES_FILE", path.to_str().unwrap())]).unwrap();
        assert_eq!(c.pipeline.ruleset.name, "Site");
        assert_eq!(c.pipeline.ruleset.rules.len(), 1);

        assert!(config(&[("RULES_FILE", "/nonexistent/rules.json")]).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(config(&[("OCR_ENGINES", "paddle")]).is_err());
        assert!(config(&[("TRUSTED_IDS", "abc")]).is_err());
        assert!(config(&[("SHEET_COLUMNS", "salary")]).is_err());
        assert!(config(&[("PORT", "eighty")]).is_err());
        assert!(config(&[("OCR_TIMEOUT_SECS", "soon")]).is_err());
    }
}
