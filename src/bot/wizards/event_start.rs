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
use crate::models::EventChange;
use crate::models::EventRow;
use crate::models::EventStatus;
use crate::models::EventType;
use crate::util::is_http_link;

const SELECT_EVENT: &str = "select_event";
const ENTER_LINK: &str = "enter_link";
const CONFIRM: &str = "confirm";

const CONFIRM_CALLBACK: &str = "event_start_confirm";
const CANCEL_CALLBACK: &str = "event_start_cancel";

const EVENT_ID_KEY: &str = "eventStartId";
const LINK_KEY: &str = "eventStartLink";

pub fn wizard() -> BotWizard {
  BotWizard::new("event_start", commands::EVENT_START, start)
    .cleanup(CleanupPolicy::StripKeyboard)
    .cancellable(Some(CANCEL_CALLBACK), "Event start canceled.")
    .enters(&[SELECT_EVENT])
    .state(SELECT_EVENT, |s| s.on(Matcher::Text, select_event).to(&[ENTER_LINK]))
    .state(ENTER_LINK, |s| s.on(Matcher::Text, enter_link).to(&[CONFIRM]))
    .state(CONFIRM, |s| {
      s.on(Matcher::Callback(CONFIRM_CALLBACK), confirm)
        .on(Matcher::Text, text_during_confirmation)
    })
}

async fn start(turn: BotTurn) -> StepResult {
  if !admit(&turn, commands::EVENT_START).await {
    return Ok(Transition::End);
  }
  let services = turn.services();
  let lookup = services.events.last_actual_events(services.settings.event_list_limit).await;
  let events = turn
    .notify_on_error(lookup, "An error occurred while retrieving the list of events.")
    .await?;
  if events.is_empty() {
    turn.reply(Prompt::plain("There are no upcoming events to start.")).await;
    return Ok(Transition::End);
  }
  let text = format::event_list_for_admin(&events, "Upcoming events", "start");
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
  turn
    .prompt(
      Prompt::html(format!(
        "Send the link participants will use to join <b>{}</b>:",
        escape(&event.name)
      ))
      .keyboard(keyboards::cancel(CANCEL_CALLBACK)),
    )
    .await;
  Ok(Transition::Advance(ENTER_LINK))
}

async fn enter_link(turn: BotTurn) -> StepResult {
  let link = turn.text().unwrap_or_default().to_string();
  if !is_http_link(&link) {
    turn
      .prompt(
        Prompt::plain("Invalid link. The link must start with http:// or https://. Please send it again:")
          .keyboard(keyboards::cancel(CANCEL_CALLBACK)),
      )
      .await;
    return Ok(Transition::Stay);
  }
  turn.set(LINK_KEY, link.clone());
  turn
    .prompt(
      Prompt::html(format!(
        "Start the event with link {}?\n\nThe announcement will be posted and pinned in the club group.",
        escape(&link)
      ))
      .keyboard(keyboards::confirm_cancel(CONFIRM_CALLBACK, CANCEL_CALLBACK))
      .without_preview(true),
    )
    .await;
  Ok(Transition::Advance(CONFIRM))
}

async fn text_during_confirmation(turn: BotTurn) -> StepResult {
  turn
    .reply(Prompt::plain(format!(
      "Please click one of the buttons above, or use /{} to cancel.",
      commands::CANCEL
    )))
    .await;
  Ok(Transition::Stay)
}

fn announcement(event: &EventRow) -> String {
  let mut text = format!(
    "🔴 <b>EVENT STARTING!</b> 🔴\n\n{} <b>{}</b>\n",
    event.event_type.emoji(),
    escape(&event.name)
  );
  if event.event_type == EventType::ClubCall {
    text.push_str("💡 Club calls are open to every member, bring your questions!\n");
  }
  text.push_str("\nUse the button below to join ⬇️");
  text
}

async fn confirm(turn: BotTurn) -> StepResult {
  let Some(event_id) = turn.get_int(EVENT_ID_KEY) else {
    return lost_context(&turn, EVENT_ID_KEY, commands::EVENT_START).await;
  };
  let Some(link) = turn.get_text(LINK_KEY) else {
    return lost_context(&turn, LINK_KEY, commands::EVENT_START).await;
  };
  let services = turn.services();
  let lookup = services.events.get_by_id(event_id).await;
  let Some(event) = turn
    .notify_on_error(lookup, "An error occurred while retrieving the event.")
    .await?
  else {
    return lost_context(&turn, EVENT_ID_KEY, commands::EVENT_START).await;
  };

  let updated = services
    .events
    .update(event_id, EventChange::Status(EventStatus::Finished))
    .await;
  turn
    .notify_on_error(updated, "An error occurred while updating the event status.")
    .await?;

  let settings = &services.settings;
  let post = Prompt::html(announcement(&event))
    .keyboard(keyboards::link("🔗 Join", &link))
    .in_thread(settings.announcement_topic_id);
  let sent = turn.send_to(settings.supergroup_chat_id, &post).await;
  let sent = turn
    .notify_on_error(sent.map_err(anyhow::Error::from), "Failed to post the announcement. Please try again.")
    .await?;
  if let Err(err) = turn.transport().pin(sent).await {
    warn!(event_id, error = %err, "failed to pin announcement");
  }
  info!(user_id = turn.user_id(), event_id, "event started");

  turn.retire_previous_prompt().await;
  turn
    .reply(Prompt::html(format!(
      "✅ <b>Event successfully started!</b>\n\n🎯 <b>{}</b> <i>(ID: {})</i>\n\n📢 Link sent to the announcements thread.",
      escape(&event.name),
      event.id
    )))
    .await;
  Ok(Transition::End)
}

#[cfg(test)]
mod tests {
  use crate::engine::Transition;
  use crate::models::EventChange;
  use crate::models::EventStatus;
  use crate::models::EventType;
  use crate::testing::Harness;
  use crate::testing::TransportCall;
  use crate::testing::test_settings;

  #[tokio::test]
  async fn confirmed_start_announces_pins_and_finishes() {
    let harness = Harness::new();
    let admin = harness.admin();
    let id = harness.db.insert_event("Weekly call", EventType::ClubCall, EventStatus::Actual);

    harness.send(admin, "/eventStart").await;
    harness.send(admin, &id.to_string()).await;
    assert_eq!(harness.send(admin, "meet.example.com").await, Some(Transition::Stay));
    assert_eq!(
      harness.send(admin, "https://meet.example.com/abc").await,
      Some(Transition::Advance("confirm"))
    );
    assert_eq!(harness.send(admin, "yes").await, Some(Transition::Stay));
    assert!(harness.last_text().contains("click one of the buttons"));

    assert_eq!(harness.click(admin, "event_start_confirm").await, Some(Transition::End));

    let settings = test_settings();
    let (chat, post) = harness
      .transport
      .sent()
      .into_iter()
      .find(|(_, prompt)| prompt.text.contains("EVENT STARTING"))
      .expect("announcement posted");
    assert_eq!(chat, settings.supergroup_chat_id);
    assert_eq!(post.thread_id, Some(settings.announcement_topic_id));
    assert!(
      harness
        .transport
        .calls()
        .iter()
        .any(|call| matches!(call, TransportCall::Pin(chat, _) if *chat == settings.supergroup_chat_id))
    );
    assert_eq!(harness.db.event_changes(), vec![(id, EventChange::Status(EventStatus::Finished))]);
    assert!(harness.position(admin).is_none());
  }

  #[tokio::test]
  async fn cancel_button_leaves_event_untouched() {
    let harness = Harness::new();
    let admin = harness.admin();
    let id = harness.db.insert_event("Weekly call", EventType::ClubCall, EventStatus::Actual);

    harness.send(admin, "/eventStart").await;
    harness.send(admin, &id.to_string()).await;
    harness.send(admin, "https://meet.example.com/abc").await;
    assert_eq!(harness.click(admin, "event_start_cancel").await, Some(Transition::End));

    assert!(harness.db.event_changes().is_empty());
    assert_eq!(harness.last_text(), "Event start canceled.");
  }
}
