use chrono::{DateTime, NaiveDate, Utc};
use image::RgbImage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Pdf,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Pdf => write!(f, "pdf"),
        }
    }
}

impl MediaKind {
    /// Guess the kind from a file name extension.
    pub fn from_file_name(name: &str) -> Option<MediaKind> {
        let ext = name.rsplit_once('.')?.1.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(MediaKind::Pdf),
            "png" | "jpg" | "jpeg" | "webp" | "tif" | "tiff" | "bmp" | "gif" => {
                Some(MediaKind::Image)
            }
            _ => None,
        }
    }

    pub fn from_mime(mime: &str) -> Option<MediaKind> {
        let lower = mime.trim().to_lowercase();
        if lower == "application/pdf" {
            Some(MediaKind::Pdf)
        } else if lower.starts_with("image/") {
            Some(MediaKind::Image)
        } else {
            None
        }
    }
}

/// An incoming file together with its declared kind.
#[derive(Debug, Clone)]
pub struct SubmittedDocument {
    pub bytes: Vec<u8>,
    pub kind: MediaKind,
    pub file_name: Option<String>,
}

impl SubmittedDocument {
    pub fn new(bytes: Vec<u8>, kind: MediaKind) -> Self {
        SubmittedDocument {
            bytes,
            kind,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// A single decoded page or image, ready for OCR.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 1-based position in the source document.
    pub page_number: usize,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(page_number: usize, image: RgbImage) -> Self {
        Frame { page_number, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// One duty line from an airline roster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyEntry {
    /// Roster date token as printed, e.g. "01Mar26".
    pub start_date: String,
    pub flight_number: Option<String>,
    /// "AAA-BBB".
    pub sector: Option<String>,
    /// "FLY" for flights, "SSnn" for standby.
    pub duty_type: String,
    pub rpt: Option<String>,
    pub std: Option<String>,
    pub sta: Option<String>,
}

impl DutyEntry {
    pub fn origin(&self) -> Option<&str> {
        self.sector.as_deref().and_then(|s| s.split_once('-')).map(|(o, _)| o)
    }

    pub fn destination(&self) -> Option<&str> {
        self.sector.as_deref().and_then(|s| s.split_once('-')).map(|(_, d)| d)
    }

    pub fn is_flight(&self) -> bool {
        self.duty_type == "FLY"
    }

    pub fn is_standby(&self) -> bool {
        self.duty_type.starts_with("SS")
    }
}

/// Structured result of parsing one timesheet.
///
/// Every extracted field is independently present or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimesheetRecord {
    pub employee_name: Option<String>,
    pub work_date: Option<NaiveDate>,
    pub hours: Option<Decimal>,
    pub project: Option<String>,
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duties: Vec<DutyEntry>,
    pub raw_text: String,
}

impl TimesheetRecord {
    /// True when no field was matched and no duties were found.
    pub fn is_empty(&self) -> bool {
        self.employee_name.is_none()
            && self.work_date.is_none()
            && self.hours.is_none()
            && self.project.is_none()
            && self.period.is_none()
            && self.duties.is_empty()
    }
}

/// Who sent a submission and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionMeta {
    pub sender: String,
    pub received_at: DateTime<Utc>,
}

impl SubmissionMeta {
    pub fn new(sender: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        SubmissionMeta {
            sender: sender.into(),
            received_at,
        }
    }
}

/// Rendered output handed to the delivery collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPayload {
    pub reply: String,
    pub row: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roster_rows: Vec<Vec<String>>,
}
