use teloxide::utils::html::escape;
use tracing::info;
use tracing::warn;

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

const SELECT_EVENT: &str = "select_event";
const ENTER_TOPIC: &str = "enter_topic";

const CANCEL_CALLBACK: &str = "topic_add_cancel";

const EVENT_ID_KEY: &str = "topicAddEventId";
const EVENT_NAME_KEY: &str = "topicAddEventName";

pub fn wizard() -> BotWizard {
  BotWizard::new("topic_add", commands::TOPIC_ADD, start)
    .cleanup(CleanupPolicy::StripKeyboard)
    .cancellable(Some(CANCEL_CALLBACK), "Topic addition canceled.")
    .enters(&[SELECT_EVENT])
    .state(SELECT_EVENT, |s| s.on(Matcher::Text, select_event).to(&[ENTER_TOPIC]))
    .state(ENTER_TOPIC, |s| s.on(Matcher::Text, enter_topic))
}

async fn start(turn: BotTurn) -> StepResult {
  if !admit(&turn, commands::TOPIC_ADD).await {
    return Ok(Transition::End);
  }
  let services = turn.services();
  let lookup = services.events.last_actual_events(services.settings.event_list_limit).await;
  let events = turn
    .notify_on_error(lookup, "Error retrieving the list of events.")
    .await?;
  if events.is_empty() {
    turn
      .reply(Prompt::plain("No events available for adding topics and questions."))
      .await;
    return Ok(Transition::End);
  }
  let text = format::event_list_for_topics(&events, "Select the event ID you want to add topics or questions to");
  turn
    .prompt(Prompt::html(text).keyboard(keyboards::cancel(CANCEL_CALLBACK)))
    .await;
  Ok(Transition::Advance(SELECT_EVENT))
}

async fn select_event(turn: BotTurn) -> StepResult {
  let Some(event) = pick_event(&turn, keyboards::cancel(CANCEL_CALLBACK)).await? else {
    return Ok(Transition::Stay);
  };
  turn.set(EVENT_ID_KEY, event.id);
  turn.set(EVENT_NAME_KEY, event.name.clone());
  turn
    .prompt(
      Prompt::html(format!(
        "Send me topics and questions for the event <b>{}</b>:",
        escape(&event.name)
      ))
      .keyboard(keyboards::cancel(CANCEL_CALLBACK)),
    )
    .await;
  Ok(Transition::Advance(ENTER_TOPIC))
}

async fn enter_topic(turn: BotTurn) -> StepResult {
  let topic = turn.text().unwrap_or_default().to_string();
  if topic.is_empty() {
    turn
      .prompt(
        Prompt::plain("Topic cannot be empty. Please enter the topic text or cancel the operation.")
          .keyboard(keyboards::cancel(CANCEL_CALLBACK)),
      )
      .await;
    return Ok(Transition::Stay);
  }
  let Some(event_id) = turn.get_int(EVENT_ID_KEY) else {
    return lost_context(&turn, EVENT_ID_KEY, commands::TOPIC_ADD).await;
  };
  let nickname = match &turn.sender().username {
    Some(username) => format!("@{username}"),
    None => "not specified".to_string(),
  };

  let services = turn.services();
  let created = services.topics.create(&topic, &nickname, event_id).await;
  let topic_id = turn.notify_on_error(created, "Oops! Something went wrong...").await?;
  info!(user_id = turn.user_id(), event_id, topic_id, "topic added");

  let admin_chat = services.settings.admin_notify_chat_id;
  if admin_chat != 0 {
    let event_name = turn.get_text(EVENT_NAME_KEY).unwrap_or_default();
    let notice = Prompt::html(format!(
      "🔔 <b>New topic added</b>\n\n<i>Event:</i> {}\n<i>Author:</i> {}\n<i>Topic:</i> {}\n\nManage topics with /{}",
      escape(&event_name),
      escape(&nickname),
      escape(&topic),
      commands::SHOW_TOPICS
    ));
    if let Err(err) = turn.send_to(admin_chat, &notice).await {
      warn!(admin_chat, error = %err, "failed to notify admins about new topic");
    }
  }

  turn.retire_previous_prompt().await;
  turn
    .reply(Prompt::plain(format!(
      "Added!\nUse /{} to view all topics and questions for the event, or /{} to add more.",
      commands::TOPICS,
      commands::TOPIC_ADD
    )))
    .await;
  Ok(Transition::End)
}

#[cfg(test)]
mod tests {
  use crate::engine::Transition;
  use crate::models::EventStatus;
  use crate::models::EventType;
  use crate::testing::ADMIN;
  use crate::testing::Harness;

  #[tokio::test]
  async fn member_adds_topic_and_admin_is_notified() {
    let harness = Harness::new();
    let member = harness.member();
    let id = harness.db.insert_event("Reading club", EventType::ReadingClub, EventStatus::Actual);

    harness.send(member, "/topicAdd").await;
    harness.send(member, &format!("/{id}")).await;
    assert_eq!(harness.send(member, "").await, Some(Transition::Stay));
    assert_eq!(harness.send(member, "Async traits?").await, Some(Transition::End));

    let topics = harness.db.topics();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].topic, "Async traits?");
    assert_eq!(topics[0].user_nickname, format!("@user{member}"));
    assert_eq!(topics[0].event_id, id);

    let notified = harness
      .transport
      .sent()
      .into_iter()
      .any(|(chat, prompt)| chat == ADMIN && prompt.text.contains("New topic added"));
    assert!(notified);
  }

  #[tokio::test]
  async fn guests_are_refused() {
    let harness = Harness::new();
    let guest = harness.guest();

    assert_eq!(harness.send(guest, "/topicAdd").await, Some(Transition::End));
    assert_eq!(harness.last_text(), "This command is only available to group members.");
  }

  #[tokio::test]
  async fn finished_events_are_not_offered() {
    let harness = Harness::new();
    let member = harness.member();
    harness.db.insert_event("Past", EventType::Meetup, EventStatus::Finished);

    assert_eq!(harness.send(member, "/topicAdd").await, Some(Transition::End));
    assert_eq!(harness.last_text(), "No events available for adding topics and questions.");
  }
}
