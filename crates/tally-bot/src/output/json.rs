use tally_core::error::TallyError;
use tally_core::ProcessedSubmission;

pub fn print(processed: &ProcessedSubmission) -> Result<(), TallyError> {
    let json = serde_json::to_string_pretty(processed)?;
    println!("{json}");
    Ok(())
}
