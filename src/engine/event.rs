use crate::engine::session::UserId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
  pub id: UserId,
  pub username: Option<String>,
  pub first_name: String,
  pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOrigin {
  User(Sender),
  HiddenUser(String),
  Chat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
  /// A chat message. `text` is `None` for media without a caption.
  Message { text: Option<String> },
  Callback { id: String, data: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
  pub sender: Sender,
  pub chat_id: i64,
  pub chat_is_private: bool,
  pub message_id: Option<i32>,
  pub payload: Payload,
  pub forwarded_from: Option<ForwardOrigin>,
}

impl InboundEvent {
  pub fn text(sender: Sender, chat_id: i64, message_id: i32, text: impl Into<String>) -> Self {
    Self {
      chat_is_private: chat_id == sender.id,
      sender,
      chat_id,
      message_id: Some(message_id),
      payload: Payload::Message {
        text: Some(text.into()),
      },
      forwarded_from: None,
    }
  }

  pub fn callback(
    sender: Sender,
    chat_id: i64,
    message_id: Option<i32>,
    id: impl Into<String>,
    data: impl Into<String>,
  ) -> Self {
    Self {
      chat_is_private: chat_id == sender.id,
      sender,
      chat_id,
      message_id,
      payload: Payload::Callback {
        id: id.into(),
        data: data.into(),
      },
      forwarded_from: None,
    }
  }

  pub fn user_id(&self) -> UserId {
    self.sender.id
  }

  pub fn message_text(&self) -> Option<&str> {
    match &self.payload {
      Payload::Message { text } => text.as_deref(),
      Payload::Callback { .. } => None,
    }
  }

  pub fn callback_data(&self) -> Option<&str> {
    match &self.payload {
      Payload::Callback { data, .. } => Some(data),
      Payload::Message { .. } => None,
    }
  }

  pub fn callback_id(&self) -> Option<&str> {
    match &self.payload {
      Payload::Callback { id, .. } => Some(id),
      Payload::Message { .. } => None,
    }
  }

  pub fn command(&self) -> Option<&str> {
    let text = self.message_text()?.trim_start();
    let body = text.strip_prefix('/')?;
    let word = body.split_whitespace().next()?;
    let name = word.split('@').next().unwrap_or(word);
    (!name.is_empty()).then_some(name)
  }

  pub fn is_command(&self, name: &str) -> bool {
    self.command().is_some_and(|command| command.eq_ignore_ascii_case(name))
  }
}

#[cfg(test)]
mod tests {
  use super::InboundEvent;
  use super::Sender;

  fn sender() -> Sender {
    Sender {
      id: 10,
      first_name: "Ada".into(),
      ..Sender::default()
    }
  }

  #[test]
  fn extracts_command_names() {
    let event = InboundEvent::text(sender(), 10, 1, "/eventSetup@club_bot extra");
    assert_eq!(event.command(), Some("eventSetup"));
    assert!(event.is_command("eventsetup"));

    let plain = InboundEvent::text(sender(), 10, 2, "Demo Talk");
    assert!(plain.command().is_none());

    let slash = InboundEvent::text(sender(), 10, 3, "/");
    assert!(slash.command().is_none());
  }

  #[test]
  fn numeric_selection_is_a_command_shape() {
    let event = InboundEvent::text(sender(), 10, 1, "/2");
    assert_eq!(event.command(), Some("2"));
  }

  #[test]
  fn private_chat_follows_sender_id() {
    assert!(InboundEvent::text(sender(), 10, 1, "hi").chat_is_private);
    assert!(!InboundEvent::text(sender(), -100, 1, "hi").chat_is_private);
  }
}
