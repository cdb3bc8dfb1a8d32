use crate::bot::BotTurn;
use crate::bot::BotWizard;
use crate::bot::StepResult;
use crate::bot::commands;
use crate::bot::format;
use crate::engine::Prompt;
use crate::engine::Transition;

pub fn wizard() -> BotWizard {
  BotWizard::new("help", commands::HELP, help)
}

async fn help(turn: BotTurn) -> StepResult {
  if !turn.event().chat_is_private {
    return Ok(Transition::End);
  }
  let is_admin = turn.services().access.is_admin(turn.user_id()).await;
  turn.reply(Prompt::html(format::help_text(is_admin))).await;
  Ok(Transition::End)
}
