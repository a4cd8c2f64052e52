use crate::error::TallyError;
use crate::rules::parse_ruleset_str;
use crate::rules::schema::RuleSetDef;

const DEFAULT_FIELDS_JSON: &str = include_str!("../../../../rules/default-fields.json");

/// Available predefined rulesets.
pub const PRESETS: &[&str] = &["default"];

/// Load a predefined ruleset by name.
pub fn load_preset(name: &str) -> Result<RuleSetDef, TallyError> {
    match name {
        "default" => parse_ruleset_str(DEFAULT_FIELDS_JSON),
        _ => Err(TallyError::RulesetInvalid(format!(
            "unknown preset '{}'. Available: {}",
            name,
            PRESETS.join(", ")
        ))),
    }
}
