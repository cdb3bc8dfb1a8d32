use crate::bot::BotTurn;
use crate::bot::BotWizard;
use crate::bot::StepResult;
use crate::bot::access::admit;
use crate::bot::commands;
use crate::bot::format;
use crate::bot::keyboards;
use crate::bot::wizards::pick_event;
use crate::engine::CleanupPolicy;
use crate::engine::Matcher;
use crate::engine::Prompt;
use crate::engine::Transition;

const SELECT_EVENT: &str = "select_event";
const CANCEL_CALLBACK: &str = "topics_cancel";

pub fn wizard() -> BotWizard {
  BotWizard::new("topics", commands::TOPICS, start)
    .cleanup(CleanupPolicy::StripKeyboard)
    .cancellable(Some(CANCEL_CALLBACK), "Topic viewing canceled.")
    .enters(&[SELECT_EVENT])
    .state(SELECT_EVENT, |s| s.on(Matcher::Text, show_topics))
}

async fn start(turn: BotTurn) -> StepResult {
  if !admit(&turn, commands::TOPICS).await {
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
  let text = format::event_list_for_topics(&events, "Select the event ID to view its topics and questions");
  turn
    .prompt(Prompt::html(text).keyboard(keyboards::cancel(CANCEL_CALLBACK)))
    .await;
  Ok(Transition::Advance(SELECT_EVENT))
}

async fn show_topics(turn: BotTurn) -> StepResult {
  let Some(event) = pick_event(&turn, keyboards::cancel(CANCEL_CALLBACK)).await? else {
    return Ok(Transition::Stay);
  };
  let lookup = turn.services().topics.list_by_event(event.id).await;
  let topics = turn
    .notify_on_error(lookup, "Error retrieving topics for this event.")
    .await?;
  turn.retire_previous_prompt().await;
  turn
    .reply(Prompt::html(format::topic_list_for_members(&topics, &event)))
    .await;
  Ok(Transition::End)
}

#[cfg(test)]
mod tests {
  use crate::engine::Transition;
  use crate::models::EventStatus;
  use crate::models::EventType;
  use crate::testing::Harness;
  use crate::testing::TransportCall;

  #[tokio::test]
  async fn lists_topics_of_the_chosen_event() {
    let harness = Harness::new();
    let member = harness.member();
    let id = harness.db.insert_event("Meetup", EventType::Meetup, EventStatus::Actual);
    harness.db.insert_topic(id, "Error handling");

    harness.send(member, "/topics").await;
    assert_eq!(harness.send(member, &format!("/{id}")).await, Some(Transition::End));

    assert!(harness.last_text().contains("Error handling"));
    assert!(harness.transport.calls().contains(&TransportCall::Strip(member, 1)));
  }
}
