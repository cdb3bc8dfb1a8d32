use chrono::Utc;

use crate::bot::BotTurn;
use crate::bot::BotWizard;
use crate::bot::StepResult;
use crate::bot::access::admit;
use crate::bot::commands;
use crate::bot::format;
use crate::engine::Prompt;
use crate::engine::Transition;

pub fn wizard() -> BotWizard {
  BotWizard::new("events", commands::EVENTS, list_events)
}

async fn list_events(turn: BotTurn) -> StepResult {
  if !admit(&turn, commands::EVENTS).await {
    return Ok(Transition::End);
  }
  let services = turn.services();
  let lookup = services.events.last_actual_events(services.settings.event_list_limit).await;
  let events = turn
    .notify_on_error(lookup, "Error retrieving the list of events.")
    .await?;
  if events.is_empty() {
    turn
      .reply(Prompt::plain("There are no upcoming events at the moment."))
      .await;
    return Ok(Transition::End);
  }
  let mut text = format::event_list_for_members(&events, "📅 Upcoming events", Utc::now());
  text.push_str(&format!(
    "\nSuggest topics and questions for these events with /{}.",
    commands::TOPIC_ADD
  ));
  turn.reply(Prompt::html(text)).await;
  Ok(Transition::End)
}
