use std::path::Path;
use tally_core::error::TallyError;
use tally_core::rules::builtin;
use tally_core::rules::schema::Field;

pub fn list() -> Result<(), TallyError> {
    println!("Available predefined rulesets:\n");
    for name in builtin::PRESETS {
        let rs = builtin::load_preset(name)?;
        println!("  {:<10} {} (v{})", name, rs.name, rs.version);
        if let Some(ref desc) = rs.description {
            println!("             {}", desc);
        }
        println!();
    }
    Ok(())
}

pub fn show(preset: &str) -> Result<(), TallyError> {
    let rs = builtin::load_preset(preset)?;

    println!("{} (version {})\n", rs.name, rs.version);
    if let Some(ref desc) = rs.description {
        println!("{}\n", desc);
    }

    println!("Rules are tried in order; the first match in the text wins.\n");
    for (i, rule) in rs.rules.iter().enumerate() {
        println!("  {:>2}. {:<8} {}", i + 1, rule.field, rule.pattern);
        if let Some(ref note) = rule.note {
            println!("      {:<8} {}", "", note);
        }
    }
    println!();
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), TallyError> {
    let rs = tally_core::rules::load_ruleset(file)?;

    println!("Ruleset '{}' (v{}) is valid.", rs.name, rs.version);
    println!("  Rules: {}", rs.rules.len());

    let missing: Vec<String> = Field::ALL
        .iter()
        .filter(|f| !rs.rules.iter().any(|r| r.field == **f))
        .map(|f| f.to_string())
        .collect();

    if !missing.is_empty() {
        println!("\nWarnings:");
        println!("  - no rule for: {}", missing.join(", "));
    }
    Ok(())
}
