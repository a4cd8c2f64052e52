use serde::{Deserialize, Serialize};
use std::fmt;

/// Timesheet fields a rule can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Date,
    Hours,
    Project,
    Period,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Name,
        Field::Date,
        Field::Hours,
        Field::Project,
        Field::Period,
    ];
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Name => "name",
            Field::Date => "date",
            Field::Hours => "hours",
            Field::Project => "project",
            Field::Period => "period",
        };
        f.pad(name)
    }
}

/// An ordered set of field extraction rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    pub rules: Vec<FieldRuleDef>,
}

/// A single pattern rule. The value is the `value` capture group, else
/// group 1, else the whole match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRuleDef {
    pub field: Field,
    pub pattern: String,
    #[serde(default)]
    pub note: Option<String>,
}
