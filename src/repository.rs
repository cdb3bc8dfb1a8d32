//! Storage seams the wizards talk to.

use anyhow::Result;
use async_trait::async_trait;

use crate::engine::Sender;
use crate::models::EventChange;
use crate::models::EventRow;
use crate::models::EventType;
use crate::models::ProfileRow;
use crate::models::TopicRow;
use crate::models::UserChange;
use crate::models::UserRow;

#[async_trait]
pub trait EventRepository: Send + Sync {
  async fn create(&self, name: &str, event_type: EventType) -> Result<i64>;

  async fn get_by_id(&self, id: i64) -> Result<Option<EventRow>>;

  async fn last_events(&self, limit: i64) -> Result<Vec<EventRow>>;

  async fn last_actual_events(&self, limit: i64) -> Result<Vec<EventRow>>;

  async fn update(&self, id: i64, change: EventChange) -> Result<()>;
}

#[async_trait]
pub trait TopicRepository: Send + Sync {
  async fn create(&self, topic: &str, user_nickname: &str, event_id: i64) -> Result<i64>;

  async fn get_by_id(&self, id: i64) -> Result<Option<TopicRow>>;

  async fn list_by_event(&self, event_id: i64) -> Result<Vec<TopicRow>>;

  async fn delete(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
  /// Finds the user by telegram id, creating the record from `sender` if absent.
  async fn get_or_create(&self, sender: &Sender) -> Result<UserRow>;

  async fn get_by_id(&self, id: i64) -> Result<Option<UserRow>>;

  async fn get_by_tg_id(&self, tg_id: i64) -> Result<Option<UserRow>>;

  async fn get_by_username(&self, username: &str) -> Result<Option<UserRow>>;

  async fn search_by_name(&self, firstname: &str, lastname: &str) -> Result<Option<UserRow>>;

  async fn create(&self, tg_id: i64, firstname: &str, lastname: &str, username: &str) -> Result<UserRow>;

  async fn update(&self, id: i64, change: UserChange) -> Result<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
  async fn get_or_create(&self, user_id: i64) -> Result<ProfileRow>;

  async fn get_or_create_with_bio(&self, user_id: i64, bio: &str) -> Result<ProfileRow>;

  async fn get_by_id(&self, id: i64) -> Result<Option<ProfileRow>>;

  async fn get_by_user_id(&self, user_id: i64) -> Result<Option<ProfileRow>>;

  async fn update_bio(&self, id: i64, bio: &str) -> Result<()>;

  async fn set_published_message_id(&self, id: i64, message_id: i64) -> Result<()>;
}
