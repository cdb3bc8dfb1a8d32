//! In-memory collaborators and a dispatch harness for wizard tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::bot::AppContext;
use crate::bot::access::PermissionGate;
use crate::bot::wizards::build_registry;
use crate::config::Settings;
use crate::engine::DispatchError;
use crate::engine::DispatchOutcome;
use crate::engine::Dispatcher;
use crate::engine::ForwardOrigin;
use crate::engine::InboundEvent;
use crate::engine::MessageRef;
use crate::engine::Prompt;
use crate::engine::Sender;
use crate::engine::SessionStore;
use crate::engine::StateId;
use crate::engine::Transition;
use crate::engine::Transport;
use crate::engine::TransportError;
use crate::engine::WizardId;
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

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
  Send(i64, String),
  Delete(i64, i32),
  Strip(i64, i32),
  Edit(i64, i32, String),
  Pin(i64, i32),
  Answer(String),
}

/// Records every transport call; sent messages get ids 1, 2, 3...
#[derive(Default)]
pub struct RecordingTransport {
  calls: Mutex<Vec<TransportCall>>,
  prompts: Mutex<Vec<(i64, Prompt)>>,
  last_id: AtomicI32,
}

impl RecordingTransport {
  pub fn calls(&self) -> Vec<TransportCall> {
    self.calls.lock().unwrap().clone()
  }

  pub fn sent_texts(&self) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter_map(|call| match call {
        TransportCall::Send(_, text) => Some(text),
        _ => None,
      })
      .collect()
  }

  pub fn sent(&self) -> Vec<(i64, Prompt)> {
    self.prompts.lock().unwrap().clone()
  }

  fn record(&self, call: TransportCall) {
    self.calls.lock().unwrap().push(call);
  }
}

#[async_trait]
impl Transport for RecordingTransport {
  async fn send_prompt(&self, chat_id: i64, prompt: &Prompt) -> Result<MessageRef, TransportError> {
    let message_id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
    self.record(TransportCall::Send(chat_id, prompt.text.clone()));
    self.prompts.lock().unwrap().push((chat_id, prompt.clone()));
    Ok(MessageRef::new(chat_id, message_id))
  }

  async fn delete_prompt(&self, message: MessageRef) -> Result<(), TransportError> {
    self.record(TransportCall::Delete(message.chat_id, message.message_id));
    Ok(())
  }

  async fn strip_keyboard(&self, message: MessageRef) -> Result<(), TransportError> {
    self.record(TransportCall::Strip(message.chat_id, message.message_id));
    Ok(())
  }

  async fn edit_prompt(&self, message: MessageRef, prompt: &Prompt) -> Result<(), TransportError> {
    self.record(TransportCall::Edit(message.chat_id, message.message_id, prompt.text.clone()));
    Ok(())
  }

  async fn pin(&self, message: MessageRef) -> Result<(), TransportError> {
    self.record(TransportCall::Pin(message.chat_id, message.message_id));
    Ok(())
  }

  async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
    self.record(TransportCall::Answer(callback_id.to_string()));
    Ok(())
  }
}

pub struct StaticPermissions {
  admins: HashSet<i64>,
  members: HashSet<i64>,
}

impl StaticPermissions {
  pub fn new(admins: impl IntoIterator<Item = i64>, members: impl IntoIterator<Item = i64>) -> Self {
    Self {
      admins: admins.into_iter().collect(),
      members: members.into_iter().collect(),
    }
  }
}

#[async_trait]
impl PermissionGate for StaticPermissions {
  async fn is_admin(&self, user_id: i64) -> bool {
    self.admins.contains(&user_id)
  }

  async fn is_club_member(&self, user_id: i64) -> bool {
    self.members.contains(&user_id)
  }
}

#[derive(Default)]
struct Tables {
  events: Vec<EventRow>,
  event_changes: Vec<(i64, EventChange)>,
  topics: Vec<TopicRow>,
  users: Vec<UserRow>,
  user_changes: Vec<(i64, UserChange)>,
  profiles: Vec<ProfileRow>,
  next_id: i64,
}

impl Tables {
  fn next_id(&mut self) -> i64 {
    self.next_id += 1;
    self.next_id
  }
}

#[derive(Default)]
pub struct MemoryDb {
  tables: Mutex<Tables>,
}

impl MemoryDb {
  pub fn events(&self) -> Vec<EventRow> {
    self.tables.lock().unwrap().events.clone()
  }

  pub fn event_changes(&self) -> Vec<(i64, EventChange)> {
    self.tables.lock().unwrap().event_changes.clone()
  }

  pub fn topics(&self) -> Vec<TopicRow> {
    self.tables.lock().unwrap().topics.clone()
  }

  pub fn users(&self) -> Vec<UserRow> {
    self.tables.lock().unwrap().users.clone()
  }

  pub fn user_changes(&self) -> Vec<(i64, UserChange)> {
    self.tables.lock().unwrap().user_changes.clone()
  }

  pub fn profiles(&self) -> Vec<ProfileRow> {
    self.tables.lock().unwrap().profiles.clone()
  }

  pub fn insert_event(&self, name: &str, event_type: EventType, status: EventStatus) -> i64 {
    let mut tables = self.tables.lock().unwrap();
    let id = tables.next_id();
    tables.events.push(EventRow {
      id,
      name: name.to_string(),
      event_type,
      status,
      started_at: None,
      created_at: Utc::now(),
    });
    id
  }

  pub fn insert_topic(&self, event_id: i64, topic: &str) -> i64 {
    let mut tables = self.tables.lock().unwrap();
    let id = tables.next_id();
    tables.topics.push(TopicRow {
      id,
      topic: topic.to_string(),
      user_nickname: "@someone".to_string(),
      event_id,
      created_at: Utc::now(),
    });
    id
  }

  pub fn insert_user(&self, tg_id: i64, firstname: &str, lastname: &str, username: &str) -> UserRow {
    let mut tables = self.tables.lock().unwrap();
    let user = UserRow {
      id: tables.next_id(),
      tg_id,
      firstname: firstname.to_string(),
      lastname: lastname.to_string(),
      tg_username: username.to_string(),
      has_coffee_ban: false,
      created_at: Utc::now(),
    };
    tables.users.push(user.clone());
    user
  }

  pub fn insert_profile(&self, user_id: i64, bio: &str) -> ProfileRow {
    let mut tables = self.tables.lock().unwrap();
    let profile = ProfileRow {
      id: tables.next_id(),
      user_id,
      bio: bio.to_string(),
      published_message_id: None,
      created_at: Utc::now(),
    };
    tables.profiles.push(profile.clone());
    profile
  }
}

#[async_trait]
impl EventRepository for MemoryDb {
  async fn create(&self, name: &str, event_type: EventType) -> Result<i64> {
    Ok(self.insert_event(name, event_type, EventStatus::Actual))
  }

  async fn get_by_id(&self, id: i64) -> Result<Option<EventRow>> {
    Ok(self.events().into_iter().find(|event| event.id == id))
  }

  async fn last_events(&self, limit: i64) -> Result<Vec<EventRow>> {
    Ok(self.events().into_iter().rev().take(limit as usize).collect())
  }

  async fn last_actual_events(&self, limit: i64) -> Result<Vec<EventRow>> {
    Ok(
      self
        .events()
        .into_iter()
        .filter(|event| event.status == EventStatus::Actual)
        .take(limit as usize)
        .collect(),
    )
  }

  async fn update(&self, id: i64, change: EventChange) -> Result<()> {
    let mut tables = self.tables.lock().unwrap();
    if let Some(event) = tables.events.iter_mut().find(|event| event.id == id) {
      match &change {
        EventChange::Name(name) => event.name = name.clone(),
        EventChange::StartedAt(at) => event.started_at = Some(*at),
        EventChange::Type(kind) => event.event_type = *kind,
        EventChange::Status(status) => event.status = *status,
      }
    }
    tables.event_changes.push((id, change));
    Ok(())
  }
}

#[async_trait]
impl TopicRepository for MemoryDb {
  async fn create(&self, topic: &str, user_nickname: &str, event_id: i64) -> Result<i64> {
    let id = self.insert_topic(event_id, topic);
    let mut tables = self.tables.lock().unwrap();
    if let Some(row) = tables.topics.iter_mut().find(|row| row.id == id) {
      row.user_nickname = user_nickname.to_string();
    }
    Ok(id)
  }

  async fn get_by_id(&self, id: i64) -> Result<Option<TopicRow>> {
    Ok(self.topics().into_iter().find(|topic| topic.id == id))
  }

  async fn list_by_event(&self, event_id: i64) -> Result<Vec<TopicRow>> {
    Ok(
      self
        .topics()
        .into_iter()
        .filter(|topic| topic.event_id == event_id)
        .collect(),
    )
  }

  async fn delete(&self, id: i64) -> Result<()> {
    self.tables.lock().unwrap().topics.retain(|topic| topic.id != id);
    Ok(())
  }
}

#[async_trait]
impl UserRepository for MemoryDb {
  async fn get_or_create(&self, sender: &Sender) -> Result<UserRow> {
    if let Some(user) = self.get_by_tg_id(sender.id).await? {
      return Ok(user);
    }
    Ok(self.insert_user(
      sender.id,
      &sender.first_name,
      sender.last_name.as_deref().unwrap_or_default(),
      sender.username.as_deref().unwrap_or_default(),
    ))
  }

  async fn get_by_id(&self, id: i64) -> Result<Option<UserRow>> {
    Ok(self.users().into_iter().find(|user| user.id == id))
  }

  async fn get_by_tg_id(&self, tg_id: i64) -> Result<Option<UserRow>> {
    Ok(self.users().into_iter().find(|user| user.tg_id == tg_id))
  }

  async fn get_by_username(&self, username: &str) -> Result<Option<UserRow>> {
    Ok(
      self
        .users()
        .into_iter()
        .find(|user| user.tg_username.eq_ignore_ascii_case(username)),
    )
  }

  async fn search_by_name(&self, firstname: &str, lastname: &str) -> Result<Option<UserRow>> {
    Ok(self.users().into_iter().find(|user| {
      user.firstname.eq_ignore_ascii_case(firstname) && user.lastname.eq_ignore_ascii_case(lastname)
    }))
  }

  async fn create(&self, tg_id: i64, firstname: &str, lastname: &str, username: &str) -> Result<UserRow> {
    if let Some(user) = self.get_by_tg_id(tg_id).await? {
      return Ok(user);
    }
    Ok(self.insert_user(tg_id, firstname, lastname, username))
  }

  async fn update(&self, id: i64, change: UserChange) -> Result<()> {
    let mut tables = self.tables.lock().unwrap();
    if let Some(user) = tables.users.iter_mut().find(|user| user.id == id) {
      match &change {
        UserChange::Firstname(value) => user.firstname = value.clone(),
        UserChange::Lastname(value) => user.lastname = value.clone(),
        UserChange::Username(value) => user.tg_username = value.clone(),
        UserChange::CoffeeBan(banned) => user.has_coffee_ban = *banned,
      }
    }
    tables.user_changes.push((id, change));
    Ok(())
  }
}

#[async_trait]
impl ProfileRepository for MemoryDb {
  async fn get_or_create(&self, user_id: i64) -> Result<ProfileRow> {
    self.get_or_create_with_bio(user_id, "").await
  }

  async fn get_or_create_with_bio(&self, user_id: i64, bio: &str) -> Result<ProfileRow> {
    if let Some(profile) = self.get_by_user_id(user_id).await? {
      return Ok(profile);
    }
    Ok(self.insert_profile(user_id, bio))
  }

  async fn get_by_id(&self, id: i64) -> Result<Option<ProfileRow>> {
    Ok(self.profiles().into_iter().find(|profile| profile.id == id))
  }

  async fn get_by_user_id(&self, user_id: i64) -> Result<Option<ProfileRow>> {
    Ok(self.profiles().into_iter().find(|profile| profile.user_id == user_id))
  }

  async fn update_bio(&self, id: i64, bio: &str) -> Result<()> {
    let mut tables = self.tables.lock().unwrap();
    if let Some(profile) = tables.profiles.iter_mut().find(|profile| profile.id == id) {
      profile.bio = bio.to_string();
    }
    Ok(())
  }

  async fn set_published_message_id(&self, id: i64, message_id: i64) -> Result<()> {
    let mut tables = self.tables.lock().unwrap();
    if let Some(profile) = tables.profiles.iter_mut().find(|profile| profile.id == id) {
      profile.published_message_id = Some(message_id);
    }
    Ok(())
  }
}

pub const ADMIN: i64 = 100;
pub const MEMBER: i64 = 200;
pub const GUEST: i64 = 300;

pub fn test_settings() -> Settings {
  Settings {
    supergroup_chat_id: -1001000,
    announcement_topic_id: 5,
    intro_topic_id: 7,
    admin_notify_chat_id: ADMIN,
    bio_limit: 40,
    event_list_limit: 10,
    refresh_delay: Duration::ZERO,
  }
}

pub struct Harness {
  pub dispatcher: Dispatcher<AppContext>,
  pub transport: Arc<RecordingTransport>,
  pub db: Arc<MemoryDb>,
  next_message_id: AtomicI32,
  next_callback_id: AtomicI32,
}

impl Harness {
  pub fn new() -> Self {
    let db = Arc::new(MemoryDb::default());
    let context = AppContext {
      events: db.clone(),
      topics: db.clone(),
      users: db.clone(),
      profiles: db.clone(),
      access: Arc::new(StaticPermissions::new([ADMIN], [MEMBER])),
      settings: test_settings(),
    };
    let transport = Arc::new(RecordingTransport::default());
    let registry = build_registry().expect("wizard tables are consistent");
    let dispatcher = Dispatcher::new(registry, SessionStore::new(), transport.clone(), Arc::new(context));
    Self {
      dispatcher,
      transport,
      db,
      next_message_id: AtomicI32::new(1000),
      next_callback_id: AtomicI32::new(0),
    }
  }

  pub fn admin(&self) -> i64 {
    ADMIN
  }

  pub fn member(&self) -> i64 {
    MEMBER
  }

  pub fn guest(&self) -> i64 {
    GUEST
  }

  pub fn sender(user: i64) -> Sender {
    Sender {
      id: user,
      username: Some(format!("user{user}")),
      first_name: "Test".to_string(),
      last_name: None,
    }
  }

  pub fn text_event(&self, user: i64, text: &str) -> InboundEvent {
    let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
    InboundEvent::text(Self::sender(user), user, message_id, text)
  }

  pub async fn dispatch(&self, event: InboundEvent) -> Result<DispatchOutcome, DispatchError> {
    self.dispatcher.dispatch(event).await
  }

  pub async fn send(&self, user: i64, text: &str) -> Option<Transition> {
    let event = self.text_event(user, text);
    transition(self.dispatch(event).await.expect("dispatch succeeds"))
  }

  pub async fn click(&self, user: i64, data: &str) -> Option<Transition> {
    let id = self.next_callback_id.fetch_add(1, Ordering::SeqCst);
    let event = InboundEvent::callback(Self::sender(user), user, None, format!("cb{id}"), data);
    transition(self.dispatch(event).await.expect("dispatch succeeds"))
  }

  pub async fn forward(&self, user: i64, text: &str, origin: ForwardOrigin) -> Option<Transition> {
    let mut event = self.text_event(user, text);
    event.forwarded_from = Some(origin);
    transition(self.dispatch(event).await.expect("dispatch succeeds"))
  }

  pub fn position(&self, user: i64) -> Option<(WizardId, StateId)> {
    self
      .dispatcher
      .sessions()
      .position(user)
      .map(|position| (position.wizard, position.state))
  }

  pub fn session_text(&self, user: i64, key: &str) -> Option<String> {
    self
      .dispatcher
      .sessions()
      .get(user, key)
      .and_then(|value| value.as_text().map(str::to_string))
  }

  pub fn session_int(&self, user: i64, key: &str) -> Option<i64> {
    self.dispatcher.sessions().get(user, key).and_then(|value| value.as_int())
  }

  pub fn last_text(&self) -> String {
    self.transport.sent_texts().pop().unwrap_or_default()
  }
}

fn transition(outcome: DispatchOutcome) -> Option<Transition> {
  match outcome {
    DispatchOutcome::Handled { transition, .. } => Some(transition),
    DispatchOutcome::Ignored => None,
  }
}
