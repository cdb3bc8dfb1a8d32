use std::env;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;

const DEFAULT_BIO_LIMIT: usize = 4000;
const DEFAULT_EVENT_LIST_LIMIT: i64 = 10;
const DEFAULT_REFRESH_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
  pub bot_token: String,
  pub database_url: String,
  pub admins: Vec<i64>,
  pub settings: Settings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub supergroup_chat_id: i64,
  pub announcement_topic_id: i32,
  pub intro_topic_id: i32,
  pub admin_notify_chat_id: i64,
  pub bio_limit: usize,
  pub event_list_limit: i64,
  pub refresh_delay: Duration,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    let bot_token = env::var("BOT_TOKEN")
      .or_else(|_| env::var("TELOXIDE_TOKEN"))
      .context("BOT_TOKEN or TELOXIDE_TOKEN must be set")?;
    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let admins_raw = env::var("ADMIN_IDS").unwrap_or_default();
    let admins = parse_admins(&admins_raw);

    let supergroup_chat_id = env::var("SUPERGROUP_CHAT_ID")
      .context("SUPERGROUP_CHAT_ID must be set")?
      .trim()
      .parse::<i64>()
      .context("SUPERGROUP_CHAT_ID must be a chat id")?;
    let admin_notify_chat_id = match optional_var::<i64>("ADMIN_NOTIFY_CHAT_ID")? {
      Some(chat_id) => chat_id,
      None => admins.first().copied().unwrap_or_default(),
    };

    let settings = Settings {
      supergroup_chat_id,
      announcement_topic_id: optional_var("ANNOUNCEMENT_TOPIC_ID")?.unwrap_or_default(),
      intro_topic_id: optional_var("INTRO_TOPIC_ID")?.unwrap_or_default(),
      admin_notify_chat_id,
      bio_limit: optional_var("PROFILE_BIO_LIMIT")?.unwrap_or(DEFAULT_BIO_LIMIT),
      event_list_limit: optional_var("EVENT_LIST_LIMIT")?.unwrap_or(DEFAULT_EVENT_LIST_LIMIT),
      refresh_delay: Duration::from_millis(optional_var("REFRESH_DELAY_MS")?.unwrap_or(DEFAULT_REFRESH_DELAY_MS)),
    };

    Ok(Self {
      bot_token,
      database_url,
      admins,
      settings,
    })
  }
}

fn optional_var<T>(name: &str) -> Result<Option<T>>
where
  T: std::str::FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  parse_optional(name, env::var(name).ok().as_deref())
}

fn parse_optional<T>(name: &str, raw: Option<&str>) -> Result<Option<T>>
where
  T: std::str::FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  match raw.map(str::trim) {
    Some(value) if !value.is_empty() => value
      .parse::<T>()
      .map(Some)
      .with_context(|| format!("{name} has an invalid value")),
    _ => Ok(None),
  }
}

fn parse_admins(raw: &str) -> Vec<i64> {
  raw
    .split(',')
    .filter_map(|id| {
      let trimmed = id.trim();
      if trimmed.is_empty() {
        return None;
      }
      match trimmed.parse::<i64>() {
        Ok(value) => Some(value),
        Err(err) => {
          tracing::warn!(value = trimmed, error = %err, "invalid ADMIN_IDS entry");
          None
        },
      }
    })
    .collect()
}
