use chrono::DateTime;
use chrono::NaiveDateTime;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static DATE_PATTERN: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^\d{2}\.\d{2}\.\d{4} \d{2}:\d{2}$").expect("valid regex"));
static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://\S+$").expect("valid regex"));

pub const DATE_FORMAT: &str = "%d.%m.%Y %H:%M";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
  #[error("date must match DD.MM.YYYY HH:MM")]
  InvalidDate,
  #[error("selection must be a number from 1 to {max}")]
  InvalidSelection { max: usize },
  #[error("value must be a number")]
  NotANumber,
}

/// Parses `DD.MM.YYYY HH:MM` as UTC, rejecting impossible calendar dates.
pub fn parse_event_date(input: &str) -> Result<DateTime<Utc>, InputError> {
  let input = input.trim();
  if !DATE_PATTERN.is_match(input) {
    return Err(InputError::InvalidDate);
  }
  NaiveDateTime::parse_from_str(input, DATE_FORMAT)
    .map(|naive| naive.and_utc())
    .map_err(|_| InputError::InvalidDate)
}

pub fn format_event_date(at: DateTime<Utc>) -> String {
  at.format(DATE_FORMAT).to_string()
}

/// Parses a 1-based menu choice such as `2` or `/2` and returns its 0-based index.
pub fn parse_menu_selection(input: &str, max: usize) -> Result<usize, InputError> {
  let choice: usize = strip_command_slash(input)
    .parse()
    .map_err(|_| InputError::InvalidSelection { max })?;
  if (1 ..= max).contains(&choice) {
    Ok(choice - 1)
  } else {
    Err(InputError::InvalidSelection { max })
  }
}

pub fn parse_id(input: &str) -> Result<i64, InputError> {
  strip_command_slash(input)
    .parse()
    .map_err(|_| InputError::NotANumber)
}

fn strip_command_slash(input: &str) -> &str {
  let trimmed = input.trim();
  trimmed.strip_prefix('/').unwrap_or(trimmed).trim()
}

pub fn utf16_len(text: &str) -> usize {
  text.encode_utf16().count()
}

pub fn is_http_link(text: &str) -> bool {
  LINK_PATTERN.is_match(text.trim())
}

pub fn normalize_username(input: &str) -> String {
  input.trim().trim_start_matches('@').to_string()
}
