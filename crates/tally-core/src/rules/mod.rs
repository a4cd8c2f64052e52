pub mod builtin;
pub mod schema;

use crate::error::TallyError;
use regex::Regex;
use schema::RuleSetDef;
use std::path::Path;

/// Load a ruleset from a JSON file.
pub fn load_ruleset(path: &Path) -> Result<RuleSetDef, TallyError> {
    let content = std::fs::read_to_string(path).map_err(|e| TallyError::RulesetLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_ruleset(&content, path)
}

/// Parse a ruleset from a JSON string.
pub fn parse_ruleset(json: &str, source: &Path) -> Result<RuleSetDef, TallyError> {
    let ruleset: RuleSetDef = serde_json::from_str(json).map_err(|e| TallyError::RulesetLoad {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    validate_ruleset(&ruleset)?;
    Ok(ruleset)
}

/// Parse a ruleset from a JSON string (no file path context).
pub fn parse_ruleset_str(json: &str) -> Result<RuleSetDef, TallyError> {
    let ruleset: RuleSetDef = serde_json::from_str(json).map_err(TallyError::Json)?;
    validate_ruleset(&ruleset)?;
    Ok(ruleset)
}

/// Validate that a ruleset is well-formed and every pattern compiles.
pub fn validate_ruleset(ruleset: &RuleSetDef) -> Result<(), TallyError> {
    if ruleset.rules.is_empty() {
        return Err(TallyError::RulesetInvalid("rules must not be empty".into()));
    }

    for (i, rule) in ruleset.rules.iter().enumerate() {
        if rule.pattern.trim().is_empty() {
            return Err(TallyError::RulesetInvalid(format!(
                "rule #{} ({}) has an empty pattern",
                i + 1,
                rule.field
            )));
        }

        Regex::new(&rule.pattern).map_err(|e| {
            TallyError::RulesetInvalid(format!(
                "rule #{} ({}) has an invalid pattern: {}",
                i + 1,
                rule.field,
                e
            ))
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_ruleset() {
        let json = r#"{
            "name": "Test",
            "version": "1.0",
            "rules": [
                { "field": "name", "pattern": "Name: (\\w+)" }
            ]
        }"#;
        let rs = parse_ruleset_str(json).unwrap();
        assert_eq!(rs.name, "Test");
        assert_eq!(rs.rules.len(), 1);
    }

    #[test]
    fn test_empty_rules_rejected() {
        let json = r#"{ "name": "Bad", "version": "1.0", "rules": [] }"#;
        assert!(parse_ruleset_str(json).is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "rules": [ { "field": "salary", "pattern": "x" } ]
        }"#;
        assert!(parse_ruleset_str(json).is_err());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "rules": [ { "field": "hours", "pattern": "(unclosed" } ]
        }"#;
        assert!(matches!(
            parse_ruleset_str(json),
            Err(TallyError::RulesetInvalid(_))
        ));
    }

    #[test]
    fn test_load_custom_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crew.json");
        std::fs::write(
            &path,
            r#"{
                "name": "Crew",
                "version": "2",
                "rules": [
                    { "field": "name", "pattern": "Crew member: (?P<value>.+)" },
                    { "field": "hours", "pattern": "Block (\\d+)" }
                ]
            }"#,
        )
        .unwrap();

        let rs = load_ruleset(&path).unwrap();
        assert_eq!(rs.name, "Crew");
        assert_eq!(rs.rules.len(), 2);
        assert_eq!(rs.rules[1].field, schema::Field::Hours);
    }

    #[test]
    fn test_load_file_with_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ \"name\": ").unwrap();
        assert!(matches!(
            load_ruleset(&path),
            Err(TallyError::RulesetLoad { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_ruleset(Path::new("/nonexistent/rules.json")).unwrap_err();
        assert!(matches!(err, TallyError::RulesetLoad { .. }));
    }
}
