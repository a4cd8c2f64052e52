use crate::model::{OutputPayload, SubmissionMeta, TimesheetRecord};
use crate::roster::{group_trips, trip_lines, trips_to_message, trips_to_sheet_rows};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest raw-text cell written to the sheet, in characters.
pub const RAW_TEXT_LIMIT: usize = 2000;

pub const DEFAULT_PLACEHOLDER: &str = "not found";

/// Spreadsheet column, in the order it appears in the output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Name,
    Date,
    Hours,
    Project,
    Period,
    Flights,
    ReceivedAt,
    Sender,
    RawText,
}

pub const DEFAULT_COLUMNS: &[Column] = &[
    Column::Name,
    Column::Date,
    Column::Hours,
    Column::Project,
    Column::Period,
    Column::ReceivedAt,
    Column::Sender,
    Column::Flights,
    Column::RawText,
];

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Name => "name",
            Column::Date => "date",
            Column::Hours => "hours",
            Column::Project => "project",
            Column::Period => "period",
            Column::Flights => "flights",
            Column::ReceivedAt => "received_at",
            Column::Sender => "sender",
            Column::RawText => "raw_text",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(Column::Name),
            "date" => Ok(Column::Date),
            "hours" => Ok(Column::Hours),
            "project" => Ok(Column::Project),
            "period" => Ok(Column::Period),
            "flights" => Ok(Column::Flights),
            "received_at" => Ok(Column::ReceivedAt),
            "sender" => Ok(Column::Sender),
            "raw_text" => Ok(Column::RawText),
            other => Err(format!("unknown column '{other}'")),
        }
    }
}

/// Renders a record into the chat reply and sheet rows.
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    columns: Vec<Column>,
    placeholder: String,
    home_base: String,
}

impl RecordFormatter {
    pub fn new(columns: Vec<Column>, placeholder: impl Into<String>, home_base: impl Into<String>) -> Self {
        RecordFormatter {
            columns,
            placeholder: placeholder.into(),
            home_base: home_base.into(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn render(&self, record: &TimesheetRecord, meta: &SubmissionMeta) -> OutputPayload {
        let trips = group_trips(&record.duties, &self.home_base);
        let flights = trip_lines(&trips, &self.home_base);

        let mut reply = self.reply_text(record);
        if !flights.is_empty() {
            reply.push_str("\n\n");
            reply.push_str(&trips_to_message(&trips, &self.home_base));
        }

        let row = self
            .columns
            .iter()
            .map(|col| match col {
                Column::Name => record.employee_name.clone().unwrap_or_default(),
                Column::Date => date_cell(record),
                Column::Hours => hours_cell(record),
                Column::Project => record.project.clone().unwrap_or_default(),
                Column::Period => record.period.clone().unwrap_or_default(),
                Column::Flights => flights.join(" | "),
                Column::ReceivedAt => meta.received_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                Column::Sender => meta.sender.clone(),
                Column::RawText => truncate_chars(&record.raw_text, RAW_TEXT_LIMIT).to_string(),
            })
            .collect();

        OutputPayload {
            reply,
            row,
            roster_rows: trips_to_sheet_rows(&trips, &self.home_base),
        }
    }

    fn reply_text(&self, record: &TimesheetRecord) -> String {
        let or_placeholder = |v: String| {
            if v.is_empty() {
                self.placeholder.clone()
            } else {
                v
            }
        };

        format!(
            "Timesheet parsed\nName: {}\nDate: {}\nHours: {}\nProject: {}\nPeriod: {}",
            or_placeholder(record.employee_name.clone().unwrap_or_default()),
            or_placeholder(date_cell(record)),
            or_placeholder(hours_cell(record)),
            or_placeholder(record.project.clone().unwrap_or_default()),
            or_placeholder(record.period.clone().unwrap_or_default()),
        )
    }
}

impl Default for RecordFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_COLUMNS.to_vec(), DEFAULT_PLACEHOLDER, "SIN")
    }
}

fn date_cell(record: &TimesheetRecord) -> String {
    record
        .work_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn hours_cell(record: &TimesheetRecord) -> String {
    record.hours.map(|h| h.normalize().to_string()).unwrap_or_default()
}

/// Parse a comma-separated column list such as `name,date,hours`.
pub fn parse_columns(list: &str) -> Result<Vec<Column>, String> {
    let columns = list
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(Column::from_str)
        .collect::<Result<Vec<_>, _>>()?;
    if columns.is_empty() {
        return Err("column list is empty".to_string());
    }
    Ok(columns)
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
