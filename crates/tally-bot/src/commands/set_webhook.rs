use crate::config::BotConfig;
use crate::telegram::TelegramClient;

/// Point Telegram at `<base_url>/<WEBHOOK_PATH>`.
pub async fn run(base_url: &str) -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;
    let url = webhook_url(base_url, &config.webhook_path);

    TelegramClient::new(config.require_token()?)
        .set_webhook(&url)
        .await?;

    println!("Webhook set to {url}");
    Ok(())
}

fn webhook_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}
