use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::engine::registry::CleanupPolicy;
use crate::engine::registry::Handler;
use crate::engine::registry::Transition;
use crate::engine::registry::handler;
use crate::engine::session::SessionStore;
use crate::engine::session::UserId;
use crate::engine::transport::MessageRef;
use crate::engine::transport::Prompt;
use crate::engine::transport::Transport;
use crate::engine::transport::TransportError;
use crate::engine::turn::Turn;

pub(crate) async fn retire_previous_prompt(
  sessions: &SessionStore,
  transport: &dyn Transport,
  user_id: UserId,
  policy: CleanupPolicy,
) {
  let (message_id, chat_id) = sessions.get_previous_message_info(user_id);
  let previous = MessageRef::new(chat_id, message_id);
  if previous.is_empty() {
    return;
  }

  let result = match policy {
    CleanupPolicy::Delete => transport.delete_prompt(previous).await,
    CleanupPolicy::StripKeyboard => transport.strip_keyboard(previous).await,
  };
  match result {
    Ok(()) | Err(TransportError::NotModified) => {
      debug!(user_id, chat_id, message_id, ?policy, "retired previous prompt");
    },
    Err(err) => warn!(user_id, chat_id, message_id, error = %err, "failed to retire previous prompt"),
  }
  sessions.forget_previous_message(user_id);
}

pub(crate) fn cancel_handler<C: Send + Sync + 'static>(notice: &'static str) -> Handler<C> {
  handler(move |turn: Turn<C>| async move {
    turn.cancellation().cancel();
    turn.retire_previous_prompt().await;
    turn.reply(Prompt::plain(notice)).await;
    info!(user_id = turn.user_id(), "wizard canceled");
    Ok(Transition::End)
  })
}
