use anyhow::Result;
use async_trait::async_trait;
use sqlx::Pool;
use sqlx::Postgres;
use sqlx::Row;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::postgres::PgRow;
use tracing::instrument;

use crate::engine::Sender;
use crate::models::EventChange;
use crate::models::EventRow;
use crate::models::EventStatus;
use crate::models::EventType;
use crate::models::ProfileRow;
use crate::models::TopicRow;
use crate::models::UserChange;
use crate::models::UserRow;
use crate::repository::EventRepository;
use crate::repository::ProfileRepository;
use crate::repository::TopicRepository;
use crate::repository::UserRepository;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const EVENT_COLUMNS: &str = "id, name, type, status, started_at, created_at";
const USER_COLUMNS: &str = "id, tg_id, firstname, lastname, tg_username, has_coffee_ban, created_at";
const PROFILE_COLUMNS: &str = "id, user_id, bio, published_message_id, created_at";

#[derive(Clone)]
pub struct Db {
  pool: Pool<Postgres>,
}

impl Db {
  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    MIGRATOR.run(&pool).await?;
    Ok(Self { pool })
  }
}

fn event_from_row(row: &PgRow) -> Result<EventRow> {
  Ok(EventRow {
    id: row.try_get("id")?,
    name: row.try_get("name")?,
    event_type: row.try_get::<String, _>("type")?.parse::<EventType>()?,
    status: row.try_get::<String, _>("status")?.parse::<EventStatus>()?,
    started_at: row.try_get("started_at")?,
    created_at: row.try_get("created_at")?,
  })
}

#[async_trait]
impl EventRepository for Db {
  #[instrument(skip(self))]
  async fn create(&self, name: &str, event_type: EventType) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>("INSERT INTO events (name, type, status) VALUES ($1, $2, $3) RETURNING id")
      .bind(name)
      .bind(event_type.as_str())
      .bind(EventStatus::Actual.as_str())
      .fetch_one(&self.pool)
      .await?;
    Ok(id)
  }

  #[instrument(skip(self))]
  async fn get_by_id(&self, id: i64) -> Result<Option<EventRow>> {
    let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    row.as_ref().map(event_from_row).transpose()
  }

  #[instrument(skip(self))]
  async fn last_events(&self, limit: i64) -> Result<Vec<EventRow>> {
    let rows = sqlx::query(&format!(
      "SELECT {EVENT_COLUMNS} FROM events ORDER BY created_at DESC, id DESC LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(event_from_row).collect()
  }

  #[instrument(skip(self))]
  async fn last_actual_events(&self, limit: i64) -> Result<Vec<EventRow>> {
    let rows = sqlx::query(&format!(
      "SELECT {EVENT_COLUMNS} FROM events WHERE status = $1 ORDER BY started_at ASC NULLS LAST, id ASC LIMIT $2"
    ))
    .bind(EventStatus::Actual.as_str())
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    rows.iter().map(event_from_row).collect()
  }

  #[instrument(skip(self))]
  async fn update(&self, id: i64, change: EventChange) -> Result<()> {
    let query = match &change {
      EventChange::Name(name) => sqlx::query("UPDATE events SET name = $2 WHERE id = $1").bind(id).bind(name),
      EventChange::StartedAt(at) => sqlx::query("UPDATE events SET started_at = $2 WHERE id = $1")
        .bind(id)
        .bind(*at),
      EventChange::Type(kind) => sqlx::query("UPDATE events SET type = $2 WHERE id = $1")
        .bind(id)
        .bind(kind.as_str()),
      EventChange::Status(status) => sqlx::query("UPDATE events SET status = $2 WHERE id = $1")
        .bind(id)
        .bind(status.as_str()),
    };
    query.execute(&self.pool).await?;
    Ok(())
  }
}

#[async_trait]
impl TopicRepository for Db {
  #[instrument(skip(self))]
  async fn create(&self, topic: &str, user_nickname: &str, event_id: i64) -> Result<i64> {
    let id = sqlx::query_scalar::<_, i64>(
      "INSERT INTO topics (topic, user_nickname, event_id) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(topic)
    .bind(user_nickname)
    .bind(event_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(id)
  }

  #[instrument(skip(self))]
  async fn get_by_id(&self, id: i64) -> Result<Option<TopicRow>> {
    let topic = sqlx::query_as::<_, TopicRow>(
      "SELECT id, topic, user_nickname, event_id, created_at FROM topics WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(topic)
  }

  #[instrument(skip(self))]
  async fn list_by_event(&self, event_id: i64) -> Result<Vec<TopicRow>> {
    let topics = sqlx::query_as::<_, TopicRow>(
      "SELECT id, topic, user_nickname, event_id, created_at FROM topics WHERE event_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(event_id)
    .fetch_all(&self.pool)
    .await?;
    Ok(topics)
  }

  #[instrument(skip(self))]
  async fn delete(&self, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM topics WHERE id = $1")
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}

#[async_trait]
impl UserRepository for Db {
  #[instrument(skip(self, sender), fields(tg_id = sender.id))]
  async fn get_or_create(&self, sender: &Sender) -> Result<UserRow> {
    if let Some(existing) = self.get_by_tg_id(sender.id).await? {
      return Ok(existing);
    }
    UserRepository::create(
      self,
      sender.id,
      &sender.first_name,
      sender.last_name.as_deref().unwrap_or_default(),
      sender.username.as_deref().unwrap_or_default(),
    )
    .await
  }

  #[instrument(skip(self))]
  async fn get_by_id(&self, id: i64) -> Result<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(user)
  }

  #[instrument(skip(self))]
  async fn get_by_tg_id(&self, tg_id: i64) -> Result<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE tg_id = $1"))
      .bind(tg_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(user)
  }

  #[instrument(skip(self))]
  async fn get_by_username(&self, username: &str) -> Result<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(&format!(
      "SELECT {USER_COLUMNS} FROM users WHERE LOWER(tg_username) = LOWER($1) LIMIT 1"
    ))
    .bind(username)
    .fetch_optional(&self.pool)
    .await?;
    Ok(user)
  }

  #[instrument(skip(self))]
  async fn search_by_name(&self, firstname: &str, lastname: &str) -> Result<Option<UserRow>> {
    let user = sqlx::query_as::<_, UserRow>(&format!(
      "SELECT {USER_COLUMNS} FROM users WHERE LOWER(firstname) = LOWER($1) AND LOWER(lastname) = LOWER($2) LIMIT 1"
    ))
    .bind(firstname)
    .bind(lastname)
    .fetch_optional(&self.pool)
    .await?;
    Ok(user)
  }

  #[instrument(skip(self))]
  async fn create(&self, tg_id: i64, firstname: &str, lastname: &str, username: &str) -> Result<UserRow> {
    let user = sqlx::query_as::<_, UserRow>(&format!(
      r#"
      INSERT INTO users (tg_id, firstname, lastname, tg_username)
      VALUES ($1, $2, $3, $4)
      ON CONFLICT (tg_id) DO UPDATE SET tg_id = EXCLUDED.tg_id
      RETURNING {USER_COLUMNS}
      "#
    ))
    .bind(tg_id)
    .bind(firstname)
    .bind(lastname)
    .bind(username)
    .fetch_one(&self.pool)
    .await?;
    Ok(user)
  }

  #[instrument(skip(self))]
  async fn update(&self, id: i64, change: UserChange) -> Result<()> {
    let query = match &change {
      UserChange::Firstname(value) => sqlx::query("UPDATE users SET firstname = $2 WHERE id = $1")
        .bind(id)
        .bind(value),
      UserChange::Lastname(value) => sqlx::query("UPDATE users SET lastname = $2 WHERE id = $1")
        .bind(id)
        .bind(value),
      UserChange::Username(value) => sqlx::query("UPDATE users SET tg_username = $2 WHERE id = $1")
        .bind(id)
        .bind(value),
      UserChange::CoffeeBan(banned) => sqlx::query("UPDATE users SET has_coffee_ban = $2 WHERE id = $1")
        .bind(id)
        .bind(*banned),
    };
    query.execute(&self.pool).await?;
    Ok(())
  }
}

#[async_trait]
impl ProfileRepository for Db {
  #[instrument(skip(self))]
  async fn get_or_create(&self, user_id: i64) -> Result<ProfileRow> {
    self.get_or_create_with_bio(user_id, "").await
  }

  #[instrument(skip(self, bio))]
  async fn get_or_create_with_bio(&self, user_id: i64, bio: &str) -> Result<ProfileRow> {
    sqlx::query("INSERT INTO profiles (user_id, bio) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING")
      .bind(user_id)
      .bind(bio)
      .execute(&self.pool)
      .await?;
    let profile = sqlx::query_as::<_, ProfileRow>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"))
      .bind(user_id)
      .fetch_one(&self.pool)
      .await?;
    Ok(profile)
  }

  #[instrument(skip(self))]
  async fn get_by_id(&self, id: i64) -> Result<Option<ProfileRow>> {
    let profile = sqlx::query_as::<_, ProfileRow>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1"))
      .bind(id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(profile)
  }

  #[instrument(skip(self))]
  async fn get_by_user_id(&self, user_id: i64) -> Result<Option<ProfileRow>> {
    let profile = sqlx::query_as::<_, ProfileRow>(&format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"))
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(profile)
  }

  #[instrument(skip(self, bio))]
  async fn update_bio(&self, id: i64, bio: &str) -> Result<()> {
    sqlx::query("UPDATE profiles SET bio = $2 WHERE id = $1")
      .bind(id)
      .bind(bio)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  #[instrument(skip(self))]
  async fn set_published_message_id(&self, id: i64, message_id: i64) -> Result<()> {
    sqlx::query("UPDATE profiles SET published_message_id = $2 WHERE id = $1")
      .bind(id)
      .bind(message_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }
}
