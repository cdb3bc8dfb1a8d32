use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::engine::cleanup;
use crate::engine::event::InboundEvent;
use crate::engine::event::Sender;
use crate::engine::registry::CleanupPolicy;
use crate::engine::session::SessionStore;
use crate::engine::session::SessionValue;
use crate::engine::session::UserId;
use crate::engine::transport::MessageRef;
use crate::engine::transport::Prompt;
use crate::engine::transport::Transport;
use crate::engine::transport::TransportError;

pub struct Turn<C> {
  services: Arc<C>,
  event: InboundEvent,
  sessions: SessionStore,
  transport: Arc<dyn Transport>,
  policy: CleanupPolicy,
  cancel: CancellationToken,
}

impl<C> Turn<C> {
  pub(crate) fn new(
    services: Arc<C>,
    event: InboundEvent,
    sessions: SessionStore,
    transport: Arc<dyn Transport>,
    policy: CleanupPolicy,
  ) -> Self {
    let cancel = sessions.cancellation(event.user_id());
    Self {
      services,
      event,
      sessions,
      transport,
      policy,
      cancel,
    }
  }

  pub fn services(&self) -> &C {
    &self.services
  }

  pub fn event(&self) -> &InboundEvent {
    &self.event
  }

  pub fn sender(&self) -> &Sender {
    &self.event.sender
  }

  pub fn user_id(&self) -> UserId {
    self.event.user_id()
  }

  pub fn chat_id(&self) -> i64 {
    self.event.chat_id
  }

  pub fn text(&self) -> Option<&str> {
    self.event.message_text().map(str::trim)
  }

  pub fn callback_data(&self) -> Option<&str> {
    self.event.callback_data()
  }

  pub fn get(&self, key: &str) -> Option<SessionValue> {
    self.sessions.get(self.user_id(), key)
  }

  pub fn get_text(&self, key: &str) -> Option<String> {
    match self.get(key) {
      Some(SessionValue::Text(value)) => Some(value),
      _ => None,
    }
  }

  pub fn get_int(&self, key: &str) -> Option<i64> {
    self.get(key).and_then(|value| value.as_int())
  }

  pub fn set(&self, key: impl Into<String>, value: impl Into<SessionValue>) {
    if self.cancel.is_cancelled() {
      debug!(user_id = self.user_id(), "session aborted, write dropped");
      return;
    }
    self.sessions.set(self.user_id(), key, value);
  }

  pub fn remove(&self, key: &str) -> Option<SessionValue> {
    self.sessions.remove(self.user_id(), key)
  }

  pub fn cancellation(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn transport(&self) -> &dyn Transport {
    self.transport.as_ref()
  }

  /// Sends an interactive prompt, retiring the previous one first, and tracks
  /// the new message for the next cleanup. Nothing is sent once the session
  /// was aborted.
  pub async fn prompt(&self, prompt: Prompt) -> Option<MessageRef> {
    if self.cancel.is_cancelled() {
      debug!(user_id = self.user_id(), "session aborted, prompt dropped");
      return None;
    }
    self.retire_previous_prompt().await;
    let sent = self.reply(prompt).await?;
    self
      .sessions
      .set_previous_message_info(self.user_id(), sent.message_id, sent.chat_id);
    Some(sent)
  }

  pub async fn retire_previous_prompt(&self) {
    cleanup::retire_previous_prompt(&self.sessions, self.transport.as_ref(), self.user_id(), self.policy).await;
  }

  pub async fn reply(&self, prompt: Prompt) -> Option<MessageRef> {
    match self.transport.send_prompt(self.chat_id(), &prompt).await {
      Ok(sent) => Some(sent),
      Err(err) => {
        warn!(user_id = self.user_id(), chat_id = self.chat_id(), error = %err, "failed to send message");
        None
      },
    }
  }

  pub async fn send_to(&self, chat_id: i64, prompt: &Prompt) -> Result<MessageRef, TransportError> {
    self.transport.send_prompt(chat_id, prompt).await
  }

  pub async fn delete(&self, message: MessageRef) {
    if message.is_empty() {
      return;
    }
    if let Err(err) = self.transport.delete_prompt(message).await {
      debug!(chat_id = message.chat_id, message_id = message.message_id, error = %err, "failed to delete message");
    }
  }

  pub async fn delete_input(&self) {
    if self.event.callback_id().is_some() {
      return;
    }
    if let Some(message_id) = self.event.message_id {
      self.delete(MessageRef::new(self.chat_id(), message_id)).await;
    }
  }

  pub async fn notify_on_error<T>(&self, result: anyhow::Result<T>, notice: &str) -> anyhow::Result<T> {
    if result.is_err() {
      self.reply(Prompt::plain(notice)).await;
    }
    result
  }
}
