use tracing::info;

use crate::bot::BotTurn;
use crate::bot::BotWizard;
use crate::bot::StepResult;
use crate::bot::access::admit;
use crate::bot::commands;
use crate::bot::format;
use crate::bot::keyboards;
use crate::bot::wizards::lost_context;
use crate::bot::wizards::pick_event;
use crate::engine::CleanupPolicy;
use crate::engine::Matcher;
use crate::engine::Prompt;
use crate::engine::Transition;
use crate::util::parse_id;

const SELECT_EVENT: &str = "select_event";
const DELETE_TOPIC: &str = "delete_topic";

const CANCEL_CALLBACK: &str = "show_topics_cancel";
const EVENT_ID_KEY: &str = "showTopicsEventId";

const DELETE_HINT: &str = "\nSend a topic ID to delete it, or use the cancel button.";

pub fn wizard() -> BotWizard {
  BotWizard::new("show_topics", commands::SHOW_TOPICS, start)
    .cleanup(CleanupPolicy::StripKeyboard)
    .cancellable(Some(CANCEL_CALLBACK), "Topic management finished.")
    .enters(&[SELECT_EVENT])
    .state(SELECT_EVENT, |s| s.on(Matcher::Text, select_event).to(&[DELETE_TOPIC]))
    .state(DELETE_TOPIC, |s| s.on(Matcher::Text, delete_topic))
}

async fn start(turn: BotTurn) -> StepResult {
  if !admit(&turn, commands::SHOW_TOPICS).await {
    return Ok(Transition::End);
  }
  let services = turn.services();
  let lookup = services.events.last_events(services.settings.event_list_limit).await;
  let events = turn
    .notify_on_error(lookup, "Error retrieving the list of events.")
    .await?;
  if events.is_empty() {
    turn.reply(Prompt::plain("There are no events yet.")).await;
    return Ok(Transition::End);
  }
  let text = format::event_list_for_admin(&events, "Latest events", "view its topics");
  turn
    .prompt(Prompt::html(text).keyboard(keyboards::cancel(CANCEL_CALLBACK)))
    .await;
  Ok(Transition::Advance(SELECT_EVENT))
}

async fn select_event(turn: BotTurn) -> StepResult {
  let Some(event) = pick_event(&turn, keyboards::cancel(CANCEL_CALLBACK)).await? else {
    return Ok(Transition::Stay);
  };
  let lookup = turn.services().topics.list_by_event(event.id).await;
  let topics = turn
    .notify_on_error(lookup, "Error retrieving topics for this event.")
    .await?;
  if topics.is_empty() {
    turn.retire_previous_prompt().await;
    turn
      .reply(Prompt::html(format::topic_list_for_admin(&topics, &event)))
      .await;
    return Ok(Transition::End);
  }
  turn.set(EVENT_ID_KEY, event.id);
  let text = format::topic_list_for_admin(&topics, &event) + DELETE_HINT;
  turn
    .prompt(Prompt::html(text).keyboard(keyboards::cancel(CANCEL_CALLBACK)))
    .await;
  Ok(Transition::Advance(DELETE_TOPIC))
}

async fn delete_topic(turn: BotTurn) -> StepResult {
  let Ok(topic_id) = parse_id(turn.text().unwrap_or_default()) else {
    turn
      .prompt(Prompt::plain("Invalid ID format. Please send a numeric topic ID.").keyboard(keyboards::cancel(CANCEL_CALLBACK)))
      .await;
    return Ok(Transition::Stay);
  };
  let Some(event_id) = turn.get_int(EVENT_ID_KEY) else {
    return lost_context(&turn, EVENT_ID_KEY, commands::SHOW_TOPICS).await;
  };
  let services = turn.services();

  let lookup = services.topics.get_by_id(topic_id).await;
  let topic = turn
    .notify_on_error(lookup, "Error retrieving the topic.")
    .await?;
  if topic.is_none_or(|topic| topic.event_id != event_id) {
    turn
      .prompt(
        Prompt::plain(format!(
          "Topic with ID {topic_id} was not found for this event. Please send an ID from the list."
        ))
        .keyboard(keyboards::cancel(CANCEL_CALLBACK)),
      )
      .await;
    return Ok(Transition::Stay);
  }

  let deleted = services.topics.delete(topic_id).await;
  turn
    .notify_on_error(deleted, "An error occurred while deleting the topic.")
    .await?;
  info!(user_id = turn.user_id(), event_id, topic_id, "topic deleted");

  let lookup = services.events.get_by_id(event_id).await;
  let Some(event) = turn.notify_on_error(lookup, "Error retrieving the event.").await? else {
    return lost_context(&turn, EVENT_ID_KEY, commands::SHOW_TOPICS).await;
  };
  let lookup = services.topics.list_by_event(event_id).await;
  let remaining = turn
    .notify_on_error(lookup, "Error retrieving topics for this event.")
    .await?;
  if remaining.is_empty() {
    turn.retire_previous_prompt().await;
    turn
      .reply(Prompt::plain(format!(
        "✅ Topic {topic_id} deleted. No topics left for this event."
      )))
      .await;
    return Ok(Transition::End);
  }
  let text = format!(
    "✅ Topic {topic_id} deleted.\n\n{}{DELETE_HINT}",
    format::topic_list_for_admin(&remaining, &event)
  );
  turn
    .prompt(Prompt::html(text).keyboard(keyboards::cancel(CANCEL_CALLBACK)))
    .await;
  Ok(Transition::Stay)
}
