use tally_core::format::Column;
use tally_core::ProcessedSubmission;

pub fn print(processed: &ProcessedSubmission, columns: &[Column]) {
    print!("{}", format_processed(processed, columns));
}

pub fn format_processed(processed: &ProcessedSubmission, columns: &[Column]) -> String {
    let mut out = String::new();

    out.push_str(&processed.payload.reply);
    out.push_str("\n\n");

    out.push_str(&format!("Row ({} page(s) read):\n", processed.frames));
    let width = columns.iter().map(|c| c.as_str().len()).max().unwrap_or(8);
    for (col, value) in columns.iter().zip(&processed.payload.row) {
        let shown = match col {
            Column::RawText => format!("<{} chars>", value.chars().count()),
            _ if value.is_empty() => "-".to_string(),
            _ => value.clone(),
        };
        out.push_str(&format!("  {:<width$}  {}\n", col.as_str(), shown, width = width));
    }

    if !processed.payload.roster_rows.is_empty() {
        out.push_str(&format!(
            "\nRoster rows ({}):\n",
            processed.payload.roster_rows.len()
        ));
        for row in &processed.payload.roster_rows {
            let cells: Vec<&str> = row.iter().take(8).map(String::as_str).collect();
            out.push_str(&format!("  {}\n", cells.join(" | ")));
        }
    }

    out
}
