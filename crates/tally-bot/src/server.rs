use crate::config::BotConfig;
use crate::sheets::{ServiceAccountKey, SheetsClient};
use crate::telegram::{TelegramClient, Update};
use anyhow::Context;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tally_core::{
    deliver, DeliveryTarget, Pipeline, ProcessedSubmission, RowSink, Stage, SubmissionMeta,
    SubmittedDocument, TallyError,
};
use tower_http::trace::TraceLayer;

pub const FILE_ACCESS_FAILED: &str = "Sorry, couldn't access the file.";
pub const DOWNLOAD_FAILED: &str = "Failed to download file.";
pub const UNSUPPORTED_DOCUMENT: &str =
    "Sorry, I can only read photos, image files and PDFs. Please resend the timesheet in one of those formats.";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BotConfig>,
    pub pipeline: Arc<Pipeline>,
    pub telegram: Arc<TelegramClient>,
    pub sheets: Option<Arc<SheetsClient>>,
}

impl AppState {
    /// Wire up the pipeline and API clients from configuration.
    pub fn from_config(config: BotConfig) -> anyhow::Result<Self> {
        let telegram = TelegramClient::new(config.require_token()?);
        let pipeline = Pipeline::from_config(&config.pipeline)?;
        tracing::info!(
            engines = ?pipeline.engine_names(),
            rasterizer = pipeline.rasterizer_name(),
            "pipeline ready"
        );
        if pipeline.engine_names().is_empty() {
            tracing::warn!("no OCR engine is available; every submission will fail");
        }

        let sheets = sheets_client(&config)?;
        if sheets.is_none() {
            tracing::warn!("SHEET_ID not set, rows will not be appended");
        }

        Ok(AppState {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            telegram: Arc::new(telegram),
            sheets: sheets.map(Arc::new),
        })
    }

    fn row_sink(&self) -> Option<&dyn RowSink> {
        self.sheets.as_deref().map(|s| s as &dyn RowSink)
    }
}

/// Sheets client if a spreadsheet is configured.
pub fn sheets_client(config: &BotConfig) -> anyhow::Result<Option<SheetsClient>> {
    let Some(sheet_id) = &config.sheet_id else {
        return Ok(None);
    };
    let key = ServiceAccountKey::load(
        config.google_creds_b64.as_deref(),
        config.google_credentials_file.as_deref(),
    )
    .context("SHEET_ID is set but Google credentials could not be loaded")?;
    Ok(Some(SheetsClient::new(key, sheet_id.clone())))
}

pub fn router(state: AppState) -> Router {
    let webhook = format!("/{}", state.config.webhook_path);
    Router::new()
        .route(&webhook, post(webhook_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: BotConfig) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let webhook_path = config.webhook_path.clone();
    let app = router(AppState::from_config(config)?);

    tracing::info!(%addr, path = %format!("/{webhook_path}"), "listening for Telegram updates");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn ack(ok: bool) -> Json<Value> {
    Json(json!({ "ok": ok }))
}

async fn webhook_handler(State(state): State<AppState>, Json(update): Json<Update>) -> Json<Value> {
    let Some(message) = update.message else {
        return ack(true);
    };
    let chat_id = message.chat.id;

    if !state.config.is_trusted(chat_id) {
        tracing::warn!(chat = chat_id, update = update.update_id, "ignoring update from untrusted chat");
        return ack(true);
    }

    let Some(attachment) = message.attachment() else {
        return ack(true);
    };
    let chat = chat_id.to_string();
    tracing::info!(
        chat = chat_id,
        message = message.message_id,
        from = message.from.as_ref().and_then(|u| u.username.as_deref()).unwrap_or("-"),
        file_name = attachment.file_name.as_deref().unwrap_or("-"),
        "received attachment"
    );

    let Some(kind) = attachment.kind else {
        notify(&state, &chat, UNSUPPORTED_DOCUMENT).await;
        return ack(false);
    };

    let file_path = match state.telegram.get_file(&attachment.file_id).await {
        Ok(file) => file.file_path,
        Err(e) => {
            tracing::error!(chat = chat_id, error = %e, "getFile failed");
            None
        }
    };
    let Some(file_path) = file_path else {
        notify(&state, &chat, FILE_ACCESS_FAILED).await;
        return ack(false);
    };

    let bytes = match state.telegram.download(&file_path).await {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => {
            tracing::error!(chat = chat_id, "downloaded file is empty");
            notify(&state, &chat, DOWNLOAD_FAILED).await;
            return ack(false);
        }
        Err(e) => {
            tracing::error!(chat = chat_id, error = %e, "file download failed");
            notify(&state, &chat, DOWNLOAD_FAILED).await;
            return ack(false);
        }
    };

    let mut doc = SubmittedDocument::new(bytes, kind);
    if let Some(name) = attachment.file_name {
        doc = doc.with_file_name(name);
    }
    let meta = SubmissionMeta::new(chat.clone(), Utc::now());
    let outcome = process(&state, doc, meta).await;

    let target = DeliveryTarget {
        chat,
        worksheet: state.config.sheet_name.clone(),
        roster_worksheet: state.config.roster_sheet_name.clone(),
    };
    let stage = deliver(&outcome, &target, state.telegram.as_ref(), state.row_sink()).await;
    ack(stage == Stage::Delivered)
}

/// Run the blocking pipeline off the async runtime, bounded by the timeout.
///
/// Timing out only stops waiting: the blocking task keeps running until
/// its current engine call returns. Each engine call is itself capped by
/// `OCR_TIMEOUT_SECS`, which is what frees a stuck engine's lock.
async fn process(
    state: &AppState,
    doc: SubmittedDocument,
    meta: SubmissionMeta,
) -> Result<ProcessedSubmission, TallyError> {
    let pipeline = Arc::clone(&state.pipeline);
    let timeout = state.config.pipeline_timeout;
    let task = tokio::task::spawn_blocking(move || pipeline.process(&doc, &meta));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => Err(TallyError::Internal(join_err.to_string())),
        Err(_) => Err(TallyError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

async fn notify(state: &AppState, chat: &str, text: &str) {
    if let Err(e) = state.telegram.send_message(chat, text).await {
        tracing::error!(chat, error = %e, "could not send message");
    }
}
