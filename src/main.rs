mod app;
mod bot;
mod config;
mod db;
mod engine;
mod models;
mod repository;
mod telemetry;
#[cfg(test)]
mod testing;
mod util;

use anyhow::Result;
use teloxide::prelude::Bot;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
  telemetry::init()?;
  let config = config::Config::from_env()?;
  let admin_count = config.admins.len();
  info!(
    admin_count,
    supergroup_chat_id = config.settings.supergroup_chat_id,
    "starting bot"
  );

  let bot = Bot::new(config.bot_token.clone());
  let db = db::Db::connect(&config.database_url).await?;
  let app = app::App::new(bot, db, config)?;
  app.run().await
}
