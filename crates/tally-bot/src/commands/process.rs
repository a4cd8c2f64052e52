use crate::config::BotConfig;
use crate::output;
use crate::server::sheets_client;
use anyhow::{anyhow, Context};
use chrono::Utc;
use std::path::PathBuf;
use tally_core::{MediaKind, Pipeline, SubmissionMeta, SubmittedDocument};

/// Run the pipeline on a local file, optionally appending the result.
pub async fn run(
    input_file: PathBuf,
    chat: Option<String>,
    append: bool,
    output_format: &str,
) -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;

    let file_name = input_file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let kind = MediaKind::from_file_name(&file_name)
        .ok_or_else(|| anyhow!("unsupported file type '{file_name}'; expected an image or a PDF"))?;
    let bytes = std::fs::read(&input_file)
        .with_context(|| format!("failed to read {}", input_file.display()))?;

    let doc = SubmittedDocument::new(bytes, kind).with_file_name(file_name);
    let meta = SubmissionMeta::new(chat.unwrap_or_else(|| "local".to_string()), Utc::now());

    let pipeline = Pipeline::from_config(&config.pipeline)?;
    let processed = tokio::task::spawn_blocking(move || pipeline.process(&doc, &meta)).await??;

    match output_format {
        "json" => output::json::print(&processed)?,
        _ => output::table::print(&processed, &config.pipeline.columns),
    }

    if append {
        let sheets = sheets_client(&config)?
            .ok_or_else(|| anyhow!("--append needs SHEET_ID and Google credentials"))?;
        sheets
            .append(&config.sheet_name, std::slice::from_ref(&processed.payload.row))
            .await?;
        eprintln!("Appended 1 row to '{}'", config.sheet_name);

        if let Some(roster_ws) = &config.roster_sheet_name {
            if !processed.payload.roster_rows.is_empty() {
                sheets.append(roster_ws, &processed.payload.roster_rows).await?;
                eprintln!(
                    "Appended {} roster row(s) to '{}'",
                    processed.payload.roster_rows.len(),
                    roster_ws
                );
            }
        }
    }

    Ok(())
}
