use crate::config::BotConfig;
use crate::server;

pub async fn run() -> anyhow::Result<()> {
    let config = BotConfig::from_env()?;
    server::run(config).await
}
