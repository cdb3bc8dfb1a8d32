//! Bridges teloxide types to the engine: [`TelegramTransport`] carries prompts
//! out, and the `*_event` functions turn updates into [`InboundEvent`]s.

use async_trait::async_trait;
use teloxide::ApiError;
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::types::CallbackQueryId;
use teloxide::types::ChatId;
use teloxide::types::InlineKeyboardButton;
use teloxide::types::InlineKeyboardMarkup;
use teloxide::types::LinkPreviewOptions;
use teloxide::types::Message;
use teloxide::types::MessageId;
use teloxide::types::MessageOrigin;
use teloxide::types::ParseMode;
use teloxide::types::ThreadId;
use teloxide::types::User;

use crate::engine::Button;
use crate::engine::ForwardOrigin;
use crate::engine::InboundEvent;
use crate::engine::Keyboard;
use crate::engine::MessageRef;
use crate::engine::Payload;
use crate::engine::Prompt;
use crate::engine::Sender;
use crate::engine::TextFormat;
use crate::engine::Transport;
use crate::engine::TransportError;

pub struct TelegramTransport {
  bot: Bot,
}

impl TelegramTransport {
  pub fn new(bot: Bot) -> Self {
    Self { bot }
  }
}

fn map_error(err: RequestError) -> TransportError {
  match err {
    RequestError::Api(ApiError::MessageNotModified) => TransportError::NotModified,
    RequestError::Api(ApiError::MessageToDeleteNotFound | ApiError::MessageToEditNotFound) => {
      TransportError::NotFound
    },
    other => TransportError::Request(Box::new(other)),
  }
}

fn markup(keyboard: &Keyboard) -> InlineKeyboardMarkup {
  let rows = keyboard.rows.iter().map(|row| {
    row
      .iter()
      .filter_map(|button| match button {
        Button::Callback { label, data } => Some(InlineKeyboardButton::callback(label.clone(), data.clone())),
        Button::Url { label, url } => url
          .parse()
          .ok()
          .map(|url| InlineKeyboardButton::url(label.clone(), url)),
      })
      .collect::<Vec<_>>()
  });
  InlineKeyboardMarkup::new(rows)
}

fn preview_options(prompt: &Prompt) -> Option<LinkPreviewOptions> {
  prompt.disable_preview.then_some(LinkPreviewOptions {
    is_disabled: true,
    url: None,
    prefer_small_media: false,
    prefer_large_media: false,
    show_above_text: false,
  })
}

#[async_trait]
impl Transport for TelegramTransport {
  async fn send_prompt(&self, chat_id: i64, prompt: &Prompt) -> Result<MessageRef, TransportError> {
    let mut request = self.bot.send_message(ChatId(chat_id), prompt.text.clone());
    if prompt.format == TextFormat::Html {
      request = request.parse_mode(ParseMode::Html);
    }
    if let Some(keyboard) = &prompt.keyboard {
      request = request.reply_markup(markup(keyboard));
    }
    if let Some(thread_id) = prompt.thread_id {
      request = request.message_thread_id(ThreadId(MessageId(thread_id)));
    }
    if let Some(options) = preview_options(prompt) {
      request = request.link_preview_options(options);
    }
    let sent = request.await.map_err(map_error)?;
    Ok(MessageRef::new(sent.chat.id.0, sent.id.0))
  }

  async fn delete_prompt(&self, message: MessageRef) -> Result<(), TransportError> {
    self
      .bot
      .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
      .await
      .map_err(map_error)?;
    Ok(())
  }

  async fn strip_keyboard(&self, message: MessageRef) -> Result<(), TransportError> {
    self
      .bot
      .edit_message_reply_markup(ChatId(message.chat_id), MessageId(message.message_id))
      .await
      .map_err(map_error)?;
    Ok(())
  }

  async fn edit_prompt(&self, message: MessageRef, prompt: &Prompt) -> Result<(), TransportError> {
    let mut request = self
      .bot
      .edit_message_text(ChatId(message.chat_id), MessageId(message.message_id), prompt.text.clone());
    if prompt.format == TextFormat::Html {
      request = request.parse_mode(ParseMode::Html);
    }
    if let Some(keyboard) = &prompt.keyboard {
      request = request.reply_markup(markup(keyboard));
    }
    if let Some(options) = preview_options(prompt) {
      request = request.link_preview_options(options);
    }
    request.await.map_err(map_error)?;
    Ok(())
  }

  async fn pin(&self, message: MessageRef) -> Result<(), TransportError> {
    self
      .bot
      .pin_chat_message(ChatId(message.chat_id), MessageId(message.message_id))
      .await
      .map_err(map_error)?;
    Ok(())
  }

  async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
    self
      .bot
      .answer_callback_query(CallbackQueryId(callback_id.to_string()))
      .await
      .map_err(map_error)?;
    Ok(())
  }
}

fn sender(user: &User) -> Sender {
  Sender {
    id: user.id.0 as i64,
    username: user.username.clone(),
    first_name: user.first_name.clone(),
    last_name: user.last_name.clone(),
  }
}

/// Messages without a sender (channel posts) carry nothing to route.
pub fn message_event(msg: &Message) -> Option<InboundEvent> {
  let user = msg.from.as_ref()?;
  let forwarded_from = msg.forward_origin().map(|origin| match origin {
    MessageOrigin::User { sender_user, .. } => ForwardOrigin::User(sender(sender_user)),
    MessageOrigin::HiddenUser { sender_user_name, .. } => ForwardOrigin::HiddenUser(sender_user_name.clone()),
    _ => ForwardOrigin::Chat,
  });
  Some(InboundEvent {
    sender: sender(user),
    chat_id: msg.chat.id.0,
    chat_is_private: msg.chat.is_private(),
    message_id: Some(msg.id.0),
    payload: Payload::Message {
      text: msg.text().or(msg.caption()).map(str::to_string),
    },
    forwarded_from,
  })
}

pub fn callback_event(query: &CallbackQuery) -> InboundEvent {
  let user = sender(&query.from);
  let (chat_id, chat_is_private, message_id) = match &query.message {
    Some(message) => (message.chat().id.0, message.chat().is_private(), Some(message.id().0)),
    None => (user.id, true, None),
  };
  InboundEvent {
    sender: user,
    chat_id,
    chat_is_private,
    message_id,
    payload: Payload::Callback {
      id: query.id.0.clone(),
      data: query.data.clone().unwrap_or_default(),
    },
    forwarded_from: None,
  }
}
