use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
  kind: &'static str,
  value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
  ClubCall,
  Meetup,
  Workshop,
  ReadingClub,
  Conference,
}

impl EventType {
  pub const ALL: [EventType; 5] = [
    Self::ClubCall,
    Self::Meetup,
    Self::Workshop,
    Self::ReadingClub,
    Self::Conference,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::ClubCall => "club-call",
      Self::Meetup => "meetup",
      Self::Workshop => "workshop",
      Self::ReadingClub => "reading-club",
      Self::Conference => "conference",
    }
  }

  pub fn display_name(self) -> &'static str {
    match self {
      Self::ClubCall => "club call",
      Self::Meetup => "meetup",
      Self::Workshop => "workshop",
      Self::ReadingClub => "reading club",
      Self::Conference => "conference",
    }
  }

  pub fn emoji(self) -> &'static str {
    match self {
      Self::ClubCall => "💬",
      Self::Meetup => "🎙",
      Self::Workshop => "⚙️",
      Self::ReadingClub => "📚",
      Self::Conference => "👥",
    }
  }
}

impl fmt::Display for EventType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for EventType {
  type Err = UnknownVariant;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|kind| kind.as_str() == value)
      .ok_or_else(|| UnknownVariant {
        kind: "event type",
        value: value.to_string(),
      })
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
  Actual,
  Finished,
}

impl EventStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Actual => "actual",
      Self::Finished => "finished",
    }
  }

  pub fn emoji(self) -> &'static str {
    match self {
      Self::Actual => "🔄",
      Self::Finished => "✅",
    }
  }
}

impl FromStr for EventStatus {
  type Err = UnknownVariant;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value {
      "actual" => Ok(Self::Actual),
      "finished" => Ok(Self::Finished),
      other => Err(UnknownVariant {
        kind: "event status",
        value: other.to_string(),
      }),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRow {
  pub id: i64,
  pub name: String,
  pub event_type: EventType,
  pub status: EventStatus,
  pub started_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventChange {
  Name(String),
  StartedAt(DateTime<Utc>),
  Type(EventType),
  Status(EventStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TopicRow {
  pub id: i64,
  pub topic: String,
  pub user_nickname: String,
  pub event_id: i64,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRow {
  pub id: i64,
  pub tg_id: i64, // telegram user id
  pub firstname: String,
  pub lastname: String,
  pub tg_username: String,
  pub has_coffee_ban: bool,
  pub created_at: DateTime<Utc>,
}

impl UserRow {
  pub fn full_name(&self) -> String {
    if self.lastname.is_empty() {
      self.firstname.clone()
    } else {
      format!("{} {}", self.firstname, self.lastname)
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserChange {
  Firstname(String),
  Lastname(String),
  Username(String),
  CoffeeBan(bool),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProfileRow {
  pub id: i64,
  pub user_id: i64,
  pub bio: String,
  pub published_message_id: Option<i64>,
  pub created_at: DateTime<Utc>,
}

/// A profile is published only once every public field is filled in.
pub fn is_profile_complete(user: &UserRow, profile: &ProfileRow) -> bool {
  !user.firstname.trim().is_empty() && !user.lastname.trim().is_empty() && !profile.bio.trim().is_empty()
}
