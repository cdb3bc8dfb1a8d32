use teloxide::utils::html::escape;
use tracing::warn;

use crate::bot::BotTurn;
use crate::bot::BotWizard;
use crate::bot::StepResult;
use crate::bot::commands;
use crate::bot::format;
use crate::engine::Button;
use crate::engine::Keyboard;
use crate::engine::Matcher;
use crate::engine::Prompt;
use crate::engine::Transition;

const AWAIT_HELP: &str = "await_help";
const HELP_CALLBACK: &str = "start_help";

pub fn wizard() -> BotWizard {
  BotWizard::new("start", commands::START, greet)
    .cancellable(None, "Okay, maybe later.")
    .enters(&[AWAIT_HELP])
    .state(AWAIT_HELP, |s| s.on(Matcher::Callback(HELP_CALLBACK), show_help))
}

async fn greet(turn: BotTurn) -> StepResult {
  if !turn.event().chat_is_private {
    return Ok(Transition::End);
  }
  let services = turn.services();
  if let Err(err) = services.users.get_or_create(turn.sender()).await {
    warn!(user_id = turn.user_id(), error = %err, "failed to record user");
  }

  let mut greeting = String::from("Welcome");
  if !turn.sender().first_name.is_empty() {
    greeting.push_str(&format!(", <b>{}</b>", escape(&turn.sender().first_name)));
  }
  greeting.push_str("! 🎓");

  let user_id = turn.user_id();
  let member = services.access.is_admin(user_id).await || services.access.is_club_member(user_id).await;
  let text = if member {
    format!(
      "{greeting}\n\nI'm the club assistant: events, topics for upcoming calls and member profiles. 🤖\n\nUse /{} to see what I can do for you!",
      commands::HELP
    )
  } else {
    format!("{greeting}\n\nI'm the club assistant. 🤖\n\nJoin the club group to get access to events, topics and member profiles!")
  };
  let keyboard = Keyboard::new().button(Button::callback("📋 Show commands", HELP_CALLBACK));
  turn.reply(Prompt::html(text).keyboard(keyboard)).await;
  Ok(Transition::Advance(AWAIT_HELP))
}

async fn show_help(turn: BotTurn) -> StepResult {
  let is_admin = turn.services().access.is_admin(turn.user_id()).await;
  turn.reply(Prompt::html(format::help_text(is_admin))).await;
  Ok(Transition::End)
}
