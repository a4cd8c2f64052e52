//! Airline duty-roster parsing.
//!
//! Roster exports list one duty day per block: a line carrying the day token
//! (`01Mar26`) followed by flight lines (`SQ 336 SIN-CDG 2235 2335 0640`) or a
//! standby code (`SS60`). OCR often breaks one flight over two lines, which
//! shows up as two entries for the same flight where the first lacks an
//! arrival time; those are merged back together.

pub mod trips;

use crate::model::DutyEntry;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use trips::{
    group_trips, trip_lines, trip_summary, trips_to_message, trips_to_sheet_rows, Trip,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Two-letter airline designator that prefixes flight numbers.
    pub carrier: String,
    /// Station trips start from and return to.
    pub home_base: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        RosterConfig {
            carrier: "SQ".to_string(),
            home_base: "SIN".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RosterParser {
    config: RosterConfig,
    day_token: Regex,
    flight_token: Regex,
    sector: Regex,
    time: Regex,
    standby: Regex,
}

impl RosterParser {
    pub fn new(config: RosterConfig) -> Self {
        let flight = format!(r"{}\s?\d+", regex::escape(&config.carrier));
        RosterParser {
            day_token: Regex::new(r"\d{2}[A-Za-z]{3}\d{2}").expect("static regex"),
            flight_token: Regex::new(&flight).expect("escaped carrier regex"),
            sector: Regex::new(r"[A-Z]{3}-[A-Z]{3}").expect("static regex"),
            time: Regex::new(r"\b\d{4}\b").expect("static regex"),
            standby: Regex::new(r"SS\d+").expect("static regex"),
            config,
        }
    }

    pub fn config(&self) -> &RosterConfig {
        &self.config
    }

    /// Parse all duty entries in the text, merging flights split across lines.
    pub fn parse(&self, text: &str) -> Vec<DutyEntry> {
        let mut entries = Vec::new();
        for (day, lines) in self.split_into_days(text) {
            entries.extend(self.parse_day(day, &lines));
        }
        merge_split_flights(entries)
    }

    /// Group non-empty lines into blocks, each starting at a day token.
    /// Lines before the first day token are dropped.
    fn split_into_days<'a>(&self, text: &'a str) -> Vec<(&'a str, Vec<&'a str>)> {
        let mut days: Vec<(&str, Vec<&str>)> = Vec::new();

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some(m) = self.day_token.find(line) {
                days.push((m.as_str(), vec![line]));
            } else if let Some((_, lines)) = days.last_mut() {
                lines.push(line);
            }
        }

        days
    }

    fn parse_day(&self, day: &str, lines: &[&str]) -> Vec<DutyEntry> {
        let text = lines.join("\n");
        let mut entries = Vec::new();

        let tokens: Vec<regex::Match> = self.flight_token.find_iter(&text).collect();
        for (i, token) in tokens.iter().enumerate() {
            let section_end = tokens.get(i + 1).map(|m| m.start()).unwrap_or(text.len());
            let section = &text[token.end()..section_end];

            let Some(sector) = self.sector.find(section) else {
                continue;
            };

            let times: Vec<&str> = self.time.find_iter(section).map(|m| m.as_str()).collect();
            let sta = times.get(2).or(times.last());

            entries.push(DutyEntry {
                start_date: day.to_string(),
                flight_number: Some(token.as_str().split_whitespace().collect()),
                sector: Some(sector.as_str().to_string()),
                duty_type: "FLY".to_string(),
                rpt: times.first().map(|t| t.to_string()),
                std: times.get(1).map(|t| t.to_string()),
                sta: sta.map(|t| t.to_string()),
            });
        }

        if let Some(code) = self.standby.find(&text) {
            let times: Vec<&str> = self.time.find_iter(&text).map(|m| m.as_str()).collect();
            entries.push(DutyEntry {
                start_date: day.to_string(),
                flight_number: None,
                sector: None,
                duty_type: code.as_str().to_string(),
                rpt: times.first().map(|t| t.to_string()),
                std: None,
                sta: times.get(2).map(|t| t.to_string()),
            });
        }

        entries
    }
}

impl Default for RosterParser {
    fn default() -> Self {
        Self::new(RosterConfig::default())
    }
}

/// Merge consecutive entries for the same flight and sector when the first
/// one is missing its arrival time.
pub fn merge_split_flights(entries: Vec<DutyEntry>) -> Vec<DutyEntry> {
    let mut merged: Vec<DutyEntry> = Vec::with_capacity(entries.len());

    for e in entries {
        if let Some(prev) = merged.last_mut() {
            let same_flight = e.flight_number.is_some()
                && prev.flight_number == e.flight_number
                && prev.sector == e.sector;
            if same_flight && prev.sta.is_none() {
                if e.sta.is_some() {
                    prev.sta = e.sta;
                }
                if prev.rpt.is_none() && e.rpt.is_some() {
                    prev.rpt = e.rpt;
                }
                continue;
            }
        }
        merged.push(e);
    }

    merged
}
