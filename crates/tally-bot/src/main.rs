mod commands;
mod config;
mod logging;
mod output;
mod server;
mod sheets;
mod telegram;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Telegram bot that reads timesheets and rosters and logs them to Google Sheets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve,
    /// Run the OCR pipeline on a local image or PDF
    Process {
        /// Path to an image or PDF
        input_file: PathBuf,

        /// Sender recorded in the row (default: "local")
        #[arg(long)]
        chat: Option<String>,

        /// Append the row to the configured spreadsheet
        #[arg(long)]
        append: bool,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,
    },
    /// Register <BASE_URL>/<WEBHOOK_PATH> as the bot's webhook
    SetWebhook {
        /// Public HTTPS base URL of this server
        base_url: String,
    },
    /// Inspect field extraction rulesets
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand)]
enum RulesAction {
    /// List predefined rulesets
    List,
    /// Print the rules of a preset in order
    Show {
        /// Preset name (e.g., "default")
        preset: String,
    },
    /// Validate a custom rule file
    Validate {
        /// Path to JSON rule file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve => commands::serve::run().await,
        Commands::Process {
            input_file,
            chat,
            append,
            output,
        } => commands::process::run(input_file, chat, append, &output).await,
        Commands::SetWebhook { base_url } => commands::set_webhook::run(&base_url).await,
        Commands::Rules { action } => match action {
            RulesAction::List => commands::rules::list(),
            RulesAction::Show { preset } => commands::rules::show(&preset),
            RulesAction::Validate { file } => commands::rules::validate(&file),
        }
        .map_err(anyhow::Error::from),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
