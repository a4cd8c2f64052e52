use crate::error::TallyError;
use crate::model::TimesheetRecord;
use crate::roster::RosterParser;
use crate::rules::schema::{Field, FieldRuleDef, RuleSetDef};
use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Date layouts tried, in order, when converting a matched date.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d%b%y", "%d %b %Y", "%d %B %Y"];

/// A compiled `{field, pattern}` rule.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: Field,
    pattern: Regex,
}

impl FieldRule {
    pub fn new(field: Field, pattern: &str) -> Result<Self, TallyError> {
        let pattern = Regex::new(pattern).map_err(|e| {
            TallyError::RulesetInvalid(format!("invalid pattern for {field}: {e}"))
        })?;
        Ok(FieldRule { field, pattern })
    }

    pub fn from_def(def: &FieldRuleDef) -> Result<Self, TallyError> {
        Self::new(def.field, &def.pattern)
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Value of the first match in the text, by position.
    ///
    /// Uses the `value` group if the pattern has one, else group 1, else the
    /// whole match. Blank values count as no match.
    pub fn extract_first(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let m = caps
            .name("value")
            .or_else(|| caps.get(1))
            .or_else(|| caps.get(0))?;
        let value = m.as_str().trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

/// Applies field rules (and optionally the roster parser) to OCR text.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    rules: Vec<FieldRule>,
    roster: Option<RosterParser>,
}

impl FieldExtractor {
    pub fn new(rules: Vec<FieldRule>) -> Self {
        FieldExtractor {
            rules,
            roster: None,
        }
    }

    pub fn from_ruleset(ruleset: &RuleSetDef) -> Result<Self, TallyError> {
        let rules = ruleset
            .rules
            .iter()
            .map(FieldRule::from_def)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    pub fn with_roster(mut self, roster: RosterParser) -> Self {
        self.roster = Some(roster);
        self
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Build a record from raw text. Never fails; unmatched fields stay `None`.
    ///
    /// CRLF line endings are folded to `\n` first so `$`-anchored rules
    /// match whatever line endings the OCR engine produced.
    pub fn extract(&self, text: &str) -> TimesheetRecord {
        let text = &text.replace("\r\n", "\n");
        let mut record = TimesheetRecord {
            raw_text: text.to_string(),
            ..TimesheetRecord::default()
        };

        // Several rules may target one field; the first that yields a
        // convertible value wins.
        for rule in &self.rules {
            match rule.field {
                Field::Name if record.employee_name.is_none() => {
                    record.employee_name = rule.extract_first(text);
                }
                Field::Date if record.work_date.is_none() => {
                    record.work_date = rule.extract_first(text).and_then(|v| parse_date(&v));
                }
                Field::Hours if record.hours.is_none() => {
                    record.hours = rule.extract_first(text).and_then(|v| parse_hours(&v));
                }
                Field::Project if record.project.is_none() => {
                    record.project = rule.extract_first(text);
                }
                Field::Period if record.period.is_none() => {
                    record.period = rule.extract_first(text);
                }
                _ => {}
            }
        }

        if let Some(roster) = &self.roster {
            record.duties = roster.parse(text);
        }

        record
    }
}

/// Parse a matched date in any of the supported layouts.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse an hours figure, accepting a decimal comma.
pub fn parse_hours(s: &str) -> Option<Decimal> {
    let normalized = s.trim().replace(',', ".");
    Decimal::from_str(&normalized).ok()
}
