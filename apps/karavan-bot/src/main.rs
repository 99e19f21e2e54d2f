use dotenvy::dotenv;
use teloxide::prelude::*;

mod bot;
mod config;
mod error;
mod panel;
mod services;
mod state;
mod wizard;

use crate::config::BotConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    log::info!("Starting Karavan bot...");

    let config = BotConfig::from_env()?;
    if config.admin_ids.is_empty() {
        log::warn!("ADMIN_IDS is empty: nobody can approve payments or manage servers");
    }

    let pool = karavan_db::connect(&config.database_url).await?;
    let bot = Bot::new(config.bot_token.clone());
    let state = AppState::new(pool, config);

    let (_tx, rx) = tokio::sync::broadcast::channel(1);
    bot::run_bot(bot, rx, state).await;

    Ok(())
}
