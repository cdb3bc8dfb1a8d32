use std::sync::Arc;

use anyhow::Result;
use teloxide::dispatching::Dispatcher as UpdateDispatcher;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::dispatching::UpdateHandler;
use teloxide::dptree;
use teloxide::prelude::Bot;
use teloxide::prelude::Requester;
use teloxide::types::CallbackQuery;
use teloxide::types::ChatId;
use teloxide::types::Message;
use teloxide::types::Update;
use teloxide::types::UpdateKind;
use teloxide::utils::command::BotCommands;
use tracing::info;
use tracing::instrument;

use crate::bot::AppContext;
use crate::bot::Command;
use crate::bot::access::TelegramPermissions;
use crate::bot::telegram::TelegramTransport;
use crate::bot::telegram::callback_event;
use crate::bot::telegram::message_event;
use crate::bot::wizards::build_registry;
use crate::config::Config;
use crate::db::Db;
use crate::engine::CANCEL_COMMAND;
use crate::engine::Dispatcher;
use crate::engine::InboundEvent;
use crate::engine::SessionStore;

type WizardDispatcher = Dispatcher<AppContext>;

pub struct App {
  bot: Bot,
  dispatcher: Arc<WizardDispatcher>,
}

impl App {
  pub fn new(bot: Bot, db: Db, config: Config) -> Result<Self> {
    let access = Arc::new(TelegramPermissions::new(
      bot.clone(),
      config.admins,
      config.settings.supergroup_chat_id,
    ));
    let context = AppContext::new(db, access, config.settings);
    let registry = build_registry()?;
    let transport = Arc::new(TelegramTransport::new(bot.clone()));
    let dispatcher = Dispatcher::new(registry, SessionStore::new(), transport, Arc::new(context));
    Ok(Self {
      bot,
      dispatcher: Arc::new(dispatcher),
    })
  }

  pub async fn run(self) -> Result<()> {
    self.bot.set_my_commands(Command::bot_commands()).await?;
    let me = self.bot.get_me().await?;
    info!(username = me.username(), "bot commands registered");

    UpdateDispatcher::builder(self.bot.clone(), schema())
      .dependencies(dptree::deps![self.dispatcher.clone()])
      .distribution_function(queue_key)
      .enable_ctrlc_handler()
      .build()
      .dispatch()
      .await;

    Ok(())
  }
}

fn schema() -> UpdateHandler<anyhow::Error> {
  dptree::entry()
    .branch(Update::filter_message().endpoint(handle_message))
    .branch(Update::filter_callback_query().endpoint(handle_callback))
}

fn is_cancel(event: &InboundEvent) -> bool {
  event.is_command(CANCEL_COMMAND)
}

/// Updates of one chat are handled in order. `/cancel` skips the queue so it
/// can interrupt a handler that is still running for the same chat.
fn queue_key(update: &Update) -> Option<ChatId> {
  if let UpdateKind::Message(message) = &update.kind
    && message_event(message).is_some_and(|event| is_cancel(&event))
  {
    return None;
  }
  update.chat().map(|chat| chat.id)
}

#[instrument(skip(msg, dispatcher), fields(chat_id = msg.chat.id.0))]
async fn handle_message(msg: Message, dispatcher: Arc<WizardDispatcher>) -> Result<()> {
  let Some(event) = message_event(&msg) else {
    return Ok(());
  };
  if is_cancel(&event) && dispatcher.abort(event.user_id()) {
    info!(user_id = event.user_id(), "cancel requested, running work aborted");
  }
  dispatcher.dispatch(event).await?;
  Ok(())
}

#[instrument(skip(query, dispatcher), fields(user_id = query.from.id.0))]
async fn handle_callback(query: CallbackQuery, dispatcher: Arc<WizardDispatcher>) -> Result<()> {
  dispatcher.dispatch(callback_event(&query)).await?;
  Ok(())
}
