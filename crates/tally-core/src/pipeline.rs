use crate::config::PipelineConfig;
use crate::error::TallyError;
use crate::extract::FieldExtractor;
use crate::format::RecordFormatter;
use crate::model::{OutputPayload, SubmissionMeta, SubmittedDocument, TimesheetRecord};
use crate::normalize::pdftoppm::PdftoppmRasterizer;
use crate::normalize::{Normalizer, PdfRasterizer};
use crate::ocr::{OcrAdapter, OcrEngine};
use crate::roster::RosterParser;
use crate::rules::validate_ruleset;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Follow-up sent when the reply went out but the sheet append did not.
pub const APPEND_FAILED_MESSAGE: &str = "Parsed but failed to append to sheet.";

/// How far a submission got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Received,
    Normalized,
    Recognized,
    Extracted,
    Formatted,
    Delivered,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Received => "received",
            Stage::Normalized => "normalized",
            Stage::Recognized => "recognized",
            Stage::Extracted => "extracted",
            Stage::Formatted => "formatted",
            Stage::Delivered => "delivered",
            Stage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of running one document through the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedSubmission {
    pub record: TimesheetRecord,
    pub payload: OutputPayload,
    /// Number of frames recognized.
    pub frames: usize,
}

/// Where the outcome of a submission goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    /// Chat the reply is sent to.
    pub chat: String,
    pub worksheet: String,
    /// Per-day roster rows are appended here when set.
    pub roster_worksheet: Option<String>,
}

/// Sends text back to the submitter.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send_reply(&self, chat: &str, text: &str) -> Result<(), TallyError>;
}

/// Appends rows to a worksheet.
#[async_trait]
pub trait RowSink: Send + Sync {
    async fn append_rows(&self, worksheet: &str, rows: &[Vec<String>]) -> Result<(), TallyError>;
}

/// Normalize → recognize → extract → format, for one document at a time.
pub struct Pipeline {
    normalizer: Normalizer,
    ocr: OcrAdapter,
    extractor: FieldExtractor,
    formatter: RecordFormatter,
}

impl Pipeline {
    pub fn new(
        config: &PipelineConfig,
        rasterizer: Box<dyn PdfRasterizer>,
        engines: Vec<Box<dyn OcrEngine>>,
    ) -> Result<Self, TallyError> {
        validate_ruleset(&config.ruleset)?;

        let mut extractor = FieldExtractor::from_ruleset(&config.ruleset)?;
        if let Some(roster) = &config.roster {
            extractor = extractor.with_roster(RosterParser::new(roster.clone()));
        }

        Ok(Pipeline {
            normalizer: Normalizer::new(rasterizer),
            ocr: OcrAdapter::probe(engines),
            extractor,
            formatter: RecordFormatter::new(
                config.columns.clone(),
                config.placeholder.clone(),
                config.home_base(),
            ),
        })
    }

    /// Pipeline with pdftoppm and the configured built-in engines.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, TallyError> {
        let engines = config
            .engines
            .iter()
            .map(|kind| kind.build(&config.ocr_lang, config.ocr_timeout))
            .collect();
        Self::new(
            config,
            Box::new(PdftoppmRasterizer::new(config.pdf_dpi)),
            engines,
        )
    }

    pub fn engine_names(&self) -> Vec<&str> {
        self.ocr.engine_names()
    }

    pub fn rasterizer_name(&self) -> &str {
        self.normalizer.rasterizer_name()
    }

    /// Run the blocking part of the pipeline on one document.
    pub fn process(
        &self,
        doc: &SubmittedDocument,
        meta: &SubmissionMeta,
    ) -> Result<ProcessedSubmission, TallyError> {
        tracing::debug!(
            stage = %Stage::Received,
            kind = %doc.kind,
            bytes = doc.bytes.len(),
            sender = %meta.sender,
            "submission received"
        );

        let frames = self.normalizer.normalize(doc)?;
        tracing::debug!(stage = %Stage::Normalized, frames = frames.len(), "document normalized");

        let text = self.ocr.recognize_frames(&frames)?;
        tracing::debug!(stage = %Stage::Recognized, chars = text.len(), "text recognized");

        let record = self.extractor.extract(&text);
        tracing::debug!(
            stage = %Stage::Extracted,
            empty = record.is_empty(),
            duties = record.duties.len(),
            "fields extracted"
        );

        let payload = self.formatter.render(&record, meta);
        tracing::debug!(stage = %Stage::Formatted, "output rendered");

        Ok(ProcessedSubmission {
            record,
            payload,
            frames: frames.len(),
        })
    }
}

/// Hand a processed submission (or its failure) to the reply and row sinks.
///
/// A failed submission gets its user-facing message and never reaches the
/// sheet. Rows are only appended after the reply went out.
pub async fn deliver(
    outcome: &Result<ProcessedSubmission, TallyError>,
    target: &DeliveryTarget,
    replies: &dyn ReplySink,
    rows: Option<&dyn RowSink>,
) -> Stage {
    let processed = match outcome {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(chat = %target.chat, error = %e, "submission failed");
            if let Err(send_err) = replies.send_reply(&target.chat, &e.user_message()).await {
                tracing::error!(chat = %target.chat, error = %send_err, "could not send failure reply");
            }
            return Stage::Failed;
        }
    };

    if let Err(e) = replies.send_reply(&target.chat, &processed.payload.reply).await {
        tracing::error!(chat = %target.chat, error = %e, "could not send reply");
        return Stage::Failed;
    }

    let Some(sink) = rows else {
        return Stage::Delivered;
    };

    if let Err(e) = append_outputs(sink, target, &processed.payload).await {
        tracing::error!(
            chat = %target.chat,
            worksheet = %target.worksheet,
            error = %e,
            "failed to append to sheet"
        );
        if let Err(send_err) = replies.send_reply(&target.chat, APPEND_FAILED_MESSAGE).await {
            tracing::error!(chat = %target.chat, error = %send_err, "could not send follow-up");
        }
        return Stage::Failed;
    }

    tracing::info!(chat = %target.chat, worksheet = %target.worksheet, "submission delivered");
    Stage::Delivered
}

async fn append_outputs(
    sink: &dyn RowSink,
    target: &DeliveryTarget,
    payload: &OutputPayload,
) -> Result<(), TallyError> {
    sink.append_rows(&target.worksheet, std::slice::from_ref(&payload.row))
        .await?;

    if let Some(roster_ws) = &target.roster_worksheet {
        if !payload.roster_rows.is_empty() {
            sink.append_rows(roster_ws, &payload.roster_rows).await?;
        }
    }
    Ok(())
}
