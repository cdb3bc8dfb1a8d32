//! Per-user wizard sessions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use crate::engine::StateId;
use crate::engine::WizardId;

pub type UserId = i64;

const PREVIOUS_MESSAGE_ID_KEY: &str = "__previous_message_id";
const PREVIOUS_CHAT_ID_KEY: &str = "__previous_chat_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionValue {
  Text(String),
  Int(i64),
  Flag(bool),
  Time(DateTime<Utc>),
}

impl SessionValue {
  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(value) => Some(value),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Self::Int(value) => Some(*value),
      _ => None,
    }
  }

  pub fn as_flag(&self) -> Option<bool> {
    match self {
      Self::Flag(value) => Some(*value),
      _ => None,
    }
  }

  pub fn as_time(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Time(value) => Some(*value),
      _ => None,
    }
  }
}

impl From<String> for SessionValue {
  fn from(value: String) -> Self {
    Self::Text(value)
  }
}

impl From<&str> for SessionValue {
  fn from(value: &str) -> Self {
    Self::Text(value.to_string())
  }
}

impl From<i64> for SessionValue {
  fn from(value: i64) -> Self {
    Self::Int(value)
  }
}

impl From<i32> for SessionValue {
  fn from(value: i32) -> Self {
    Self::Int(i64::from(value))
  }
}

impl From<bool> for SessionValue {
  fn from(value: bool) -> Self {
    Self::Flag(value)
  }
}

impl From<DateTime<Utc>> for SessionValue {
  fn from(value: DateTime<Utc>) -> Self {
    Self::Time(value)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
  pub wizard: WizardId,
  pub state: StateId,
}

#[derive(Debug, Default)]
struct Session {
  position: Option<Position>,
  data: HashMap<String, SessionValue>,
  cancel: CancellationToken,
}

/// Thread-safe store of every user's session.
#[derive(Clone, Default)]
pub struct SessionStore {
  sessions: Arc<DashMap<UserId, Session>>,
}

impl SessionStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, user_id: UserId, key: &str) -> Option<SessionValue> {
    self
      .sessions
      .get(&user_id)
      .and_then(|session| session.data.get(key).cloned())
  }

  pub fn set(&self, user_id: UserId, key: impl Into<String>, value: impl Into<SessionValue>) {
    self
      .sessions
      .entry(user_id)
      .or_default()
      .data
      .insert(key.into(), value.into());
  }

  pub fn remove(&self, user_id: UserId, key: &str) -> Option<SessionValue> {
    self
      .sessions
      .get_mut(&user_id)
      .and_then(|mut session| session.data.remove(key))
  }

  pub fn clear(&self, user_id: UserId) {
    self.sessions.remove(&user_id);
  }

  pub fn set_previous_message_info(&self, user_id: UserId, message_id: i32, chat_id: i64) {
    let mut session = self.sessions.entry(user_id).or_default();
    session
      .data
      .insert(PREVIOUS_MESSAGE_ID_KEY.to_string(), SessionValue::from(message_id));
    session
      .data
      .insert(PREVIOUS_CHAT_ID_KEY.to_string(), SessionValue::from(chat_id));
  }

  /// Returns `(message_id, chat_id)` of the last tracked prompt, or zeros when
  /// there is nothing to clean up.
  pub fn get_previous_message_info(&self, user_id: UserId) -> (i32, i64) {
    let message_id = self
      .get(user_id, PREVIOUS_MESSAGE_ID_KEY)
      .and_then(|value| value.as_int())
      .and_then(|value| i32::try_from(value).ok())
      .unwrap_or(0);
    let chat_id = self
      .get(user_id, PREVIOUS_CHAT_ID_KEY)
      .and_then(|value| value.as_int())
      .unwrap_or(0);
    (message_id, chat_id)
  }

  pub fn forget_previous_message(&self, user_id: UserId) {
    if let Some(mut session) = self.sessions.get_mut(&user_id) {
      session.data.remove(PREVIOUS_MESSAGE_ID_KEY);
      session.data.remove(PREVIOUS_CHAT_ID_KEY);
    }
  }

  pub fn position(&self, user_id: UserId) -> Option<Position> {
    self.sessions.get(&user_id).and_then(|session| session.position)
  }

  pub fn cancellation(&self, user_id: UserId) -> CancellationToken {
    self.sessions.entry(user_id).or_default().cancel.clone()
  }

  pub fn abort(&self, user_id: UserId) -> bool {
    match self.sessions.get(&user_id) {
      Some(session) => {
        session.cancel.cancel();
        true
      },
      None => false,
    }
  }

  /// Removes the session only if its token has fired, leaving a session
  /// started after the abort untouched.
  pub(crate) fn discard_aborted(&self, user_id: UserId) {
    self.sessions.remove_if(&user_id, |_, session| session.cancel.is_cancelled());
  }

  pub(crate) fn enter(&self, user_id: UserId, position: Position) {
    self.sessions.entry(user_id).or_default().position = Some(position);
  }

  /// Moves a session `wizard` already owns to `state`. Returns `false` when the
  /// session was cleared or taken over while the handler ran.
  pub(crate) fn advance(&self, user_id: UserId, wizard: WizardId, state: StateId) -> bool {
    match self.sessions.get_mut(&user_id) {
      Some(mut session) if session.position.is_some_and(|current| current.wizard == wizard) => {
        session.position = Some(Position { wizard, state });
        true
      },
      _ => false,
    }
  }

  #[cfg(test)]
  pub(crate) fn data(&self, user_id: UserId) -> HashMap<String, SessionValue> {
    self
      .sessions
      .get(&user_id)
      .map(|session| session.data.clone())
      .unwrap_or_default()
  }

  #[cfg(test)]
  pub(crate) fn contains(&self, user_id: UserId) -> bool {
    self.sessions.contains_key(&user_id)
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use chrono::Utc;

  use super::Position;
  use super::SessionStore;
  use super::SessionValue;

  #[test]
  fn set_creates_session_and_overwrites() {
    let store = SessionStore::new();
    assert!(store.get(1, "name").is_none());

    store.set(1, "name", "first");
    store.set(1, "name", "second");
    assert_eq!(store.get(1, "name"), Some(SessionValue::Text("second".into())));
  }

  #[test]
  fn typed_accessors_reject_other_variants() {
    let value = SessionValue::from(42_i64);
    assert_eq!(value.as_int(), Some(42));
    assert!(value.as_text().is_none());
    assert!(value.as_flag().is_none());

    let at = Utc.with_ymd_and_hms(2030, 12, 31, 10, 0, 0).unwrap();
    assert_eq!(SessionValue::from(at).as_time(), Some(at));
  }

  #[test]
  fn clear_is_idempotent() {
    let store = SessionStore::new();
    store.set(7, "eventName", "Demo Talk");
    store.clear(7);
    store.clear(7);
    assert!(!store.contains(7));
    assert!(store.get(7, "eventName").is_none());
  }

  #[test]
  fn previous_message_info_defaults_to_zero() {
    let store = SessionStore::new();
    assert_eq!(store.get_previous_message_info(3), (0, 0));

    store.set_previous_message_info(3, 55, -100);
    assert_eq!(store.get_previous_message_info(3), (55, -100));

    store.forget_previous_message(3);
    assert_eq!(store.get_previous_message_info(3), (0, 0));
  }

  #[test]
  fn users_are_isolated() {
    let store = SessionStore::new();
    store.set(1, "key", 1_i64);
    store.set(2, "key", 2_i64);
    store.clear(1);
    assert!(store.get(1, "key").is_none());
    assert_eq!(store.get(2, "key").and_then(|v| v.as_int()), Some(2));
  }

  #[test]
  fn advance_ignores_cleared_or_foreign_sessions() {
    let store = SessionStore::new();
    assert!(!store.advance(9, "profile", "menu"));
    assert!(store.position(9).is_none());

    store.enter(9, Position {
      wizard: "profile",
      state: "menu",
    });
    assert!(!store.advance(9, "event_setup", "ask_name"));
    assert!(store.advance(9, "profile", "await_bio"));
    assert_eq!(store.position(9).map(|p| p.state), Some("await_bio"));
  }

  #[test]
  fn discard_aborted_spares_fresh_sessions() {
    let store = SessionStore::new();
    store.set(5, "key", 1_i64);
    store.discard_aborted(5);
    assert!(store.contains(5));

    store.abort(5);
    store.discard_aborted(5);
    assert!(!store.contains(5));
  }

  #[test]
  fn advance_does_not_adopt_a_positionless_session() {
    let store = SessionStore::new();
    store.set_previous_message_info(9, 12, 9);
    assert!(!store.advance(9, "profile", "menu"));
    assert!(store.position(9).is_none());
  }

  #[test]
  fn abort_fires_current_token_only() {
    let store = SessionStore::new();
    assert!(!store.abort(4));

    let token = store.cancellation(4);
    assert!(store.abort(4));
    assert!(token.is_cancelled());

    store.clear(4);
    assert!(!store.cancellation(4).is_cancelled());
  }
}
