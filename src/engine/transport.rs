use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MessageRef {
  pub chat_id: i64,
  pub message_id: i32,
}

impl MessageRef {
  pub fn new(chat_id: i64, message_id: i32) -> Self {
    Self { chat_id, message_id }
  }

  pub fn is_empty(&self) -> bool {
    self.chat_id == 0 || self.message_id == 0
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextFormat {
  #[default]
  Plain,
  Html,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
  Callback { label: String, data: String },
  Url { label: String, url: String },
}

impl Button {
  pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
    Self::Callback {
      label: label.into(),
      data: data.into(),
    }
  }

  pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
    Self::Url {
      label: label.into(),
      url: url.into(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
  pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn row(mut self, buttons: Vec<Button>) -> Self {
    if !buttons.is_empty() {
      self.rows.push(buttons);
    }
    self
  }

  pub fn button(self, button: Button) -> Self {
    self.row(vec![button])
  }

  pub fn is_empty(&self) -> bool {
    self.rows.is_empty()
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
  pub text: String,
  pub format: TextFormat,
  pub keyboard: Option<Keyboard>,
  pub thread_id: Option<i32>,
  pub disable_preview: bool,
}

impl Prompt {
  pub fn plain(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      ..Self::default()
    }
  }

  pub fn html(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      format: TextFormat::Html,
      ..Self::default()
    }
  }

  pub fn keyboard(mut self, keyboard: Keyboard) -> Self {
    self.keyboard = Some(keyboard);
    self
  }

  /// Posts into a forum thread; `0` means the general thread.
  pub fn in_thread(mut self, thread_id: i32) -> Self {
    self.thread_id = (thread_id != 0).then_some(thread_id);
    self
  }

  pub fn without_preview(mut self, disabled: bool) -> Self {
    self.disable_preview = disabled;
    self
  }
}

#[derive(Debug, Error)]
pub enum TransportError {
  #[error("message is not modified")]
  NotModified,
  #[error("message not found")]
  NotFound,
  #[error("transport request failed: {0}")]
  Request(#[source] Box<dyn std::error::Error + Send + Sync>),
}

#[async_trait]
pub trait Transport: Send + Sync {
  async fn send_prompt(&self, chat_id: i64, prompt: &Prompt) -> Result<MessageRef, TransportError>;

  async fn delete_prompt(&self, message: MessageRef) -> Result<(), TransportError>;

  /// Removes the inline keyboard but keeps the text.
  async fn strip_keyboard(&self, message: MessageRef) -> Result<(), TransportError>;

  async fn edit_prompt(&self, message: MessageRef, prompt: &Prompt) -> Result<(), TransportError>;

  async fn pin(&self, message: MessageRef) -> Result<(), TransportError>;

  async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;
}
