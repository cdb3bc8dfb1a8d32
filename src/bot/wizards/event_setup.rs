use teloxide::utils::html::escape;
use tracing::info;

use crate::bot::BotTurn;
use crate::bot::BotWizard;
use crate::bot::StepResult;
use crate::bot::access::admit;
use crate::bot::commands;
use crate::bot::format;
use crate::bot::keyboards;
use crate::bot::wizards::lost_context;
use crate::engine::CleanupPolicy;
use crate::engine::Matcher;
use crate::engine::Prompt;
use crate::engine::Transition;
use crate::models::EventChange;
use crate::models::EventType;
use crate::util::format_event_date;
use crate::util::parse_event_date;
use crate::util::parse_menu_selection;

const ASK_NAME: &str = "ask_name";
const ASK_TYPE: &str = "ask_type";
const ASK_STARTED_AT: &str = "ask_started_at";

const CANCEL_CALLBACK: &str = "event_setup_cancel";

const NAME_KEY: &str = "eventName";
const EVENT_ID_KEY: &str = "eventId";

pub fn wizard() -> BotWizard {
  BotWizard::new("event_setup", commands::EVENT_SETUP, start)
    .cleanup(CleanupPolicy::StripKeyboard)
    .cancellable(Some(CANCEL_CALLBACK), "Event creation canceled.")
    .enters(&[ASK_NAME])
    .state(ASK_NAME, |s| s.on(Matcher::Text, handle_name).to(&[ASK_TYPE]))
    .state(ASK_TYPE, |s| s.on(Matcher::Text, handle_type).to(&[ASK_STARTED_AT]))
    .state(ASK_STARTED_AT, |s| s.on(Matcher::Text, handle_started_at))
}

async fn start(turn: BotTurn) -> StepResult {
  if !admit(&turn, commands::EVENT_SETUP).await {
    return Ok(Transition::End);
  }
  turn
    .prompt(Prompt::plain("Please enter a name for the new event:").keyboard(keyboards::cancel(CANCEL_CALLBACK)))
    .await;
  Ok(Transition::Advance(ASK_NAME))
}

async fn handle_name(turn: BotTurn) -> StepResult {
  let name = turn.text().unwrap_or_default().to_string();
  if name.is_empty() {
    turn
      .prompt(
        Prompt::plain("Name cannot be empty. Please enter a name for the event or use the cancel button.")
          .keyboard(keyboards::cancel(CANCEL_CALLBACK)),
      )
      .await;
    return Ok(Transition::Stay);
  }
  turn.set(NAME_KEY, name);
  turn
    .prompt(
      Prompt::plain(format!("Select the event type (send a number):\n{}", format::event_type_options()))
        .keyboard(keyboards::cancel(CANCEL_CALLBACK)),
    )
    .await;
  Ok(Transition::Advance(ASK_TYPE))
}

async fn handle_type(turn: BotTurn) -> StepResult {
  let Ok(index) = parse_menu_selection(turn.text().unwrap_or_default(), EventType::ALL.len()) else {
    turn
      .prompt(
        Prompt::plain(format!(
          "Invalid selection. Please send a number from 1 to {}, or use the cancel button.",
          EventType::ALL.len()
        ))
        .keyboard(keyboards::cancel(CANCEL_CALLBACK)),
      )
      .await;
    return Ok(Transition::Stay);
  };
  let Some(name) = turn.get_text(NAME_KEY) else {
    return lost_context(&turn, NAME_KEY, commands::EVENT_SETUP).await;
  };
  let event_type = EventType::ALL[index];
  let created = turn.services().events.create(&name, event_type).await;
  let event_id = turn
    .notify_on_error(created, "An error occurred while creating the event record.")
    .await?;
  info!(user_id = turn.user_id(), event_id, event_type = %event_type, "event created");
  turn.set(EVENT_ID_KEY, event_id);
  turn
    .prompt(
      Prompt::plain("When does the event start? Send the date and time in DD.MM.YYYY HH:MM format (UTC):")
        .keyboard(keyboards::cancel(CANCEL_CALLBACK)),
    )
    .await;
  Ok(Transition::Advance(ASK_STARTED_AT))
}

async fn handle_started_at(turn: BotTurn) -> StepResult {
  let Ok(started_at) = parse_event_date(turn.text().unwrap_or_default()) else {
    turn
      .prompt(
        Prompt::plain("Invalid date format. Please send the date and time as DD.MM.YYYY HH:MM, e.g. 31.12.2030 18:00.")
          .keyboard(keyboards::cancel(CANCEL_CALLBACK)),
      )
      .await;
    return Ok(Transition::Stay);
  };
  let Some(event_id) = turn.get_int(EVENT_ID_KEY) else {
    return lost_context(&turn, EVENT_ID_KEY, commands::EVENT_SETUP).await;
  };
  let updated = turn
    .services()
    .events
    .update(event_id, EventChange::StartedAt(started_at))
    .await;
  turn
    .notify_on_error(updated, "An error occurred while saving the start date.")
    .await?;

  let name = turn.get_text(NAME_KEY).unwrap_or_default();
  turn.retire_previous_prompt().await;
  turn
    .reply(Prompt::html(format!(
      "✅ Event <b>{}</b> created with ID {event_id}, starting <b>{}</b> UTC.\n\nTo edit the event use /{}.\nTo see all commands use /{}.",
      escape(&name),
      format_event_date(started_at),
      commands::EVENT_EDIT,
      commands::HELP
    )))
    .await;
  Ok(Transition::End)
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use chrono::Utc;

  use crate::engine::Transition;
  use crate::models::EventChange;
  use crate::models::EventType;
  use crate::testing::Harness;

  #[tokio::test]
  async fn empty_name_stays_then_valid_name_advances() {
    let harness = Harness::new();
    let admin = harness.admin();

    harness.send(admin, "/eventSetup").await;
    assert_eq!(harness.position(admin), Some(("event_setup", "ask_name")));

    let outcome = harness.send(admin, "   ").await;
    assert_eq!(outcome, Some(Transition::Stay));
    assert!(harness.last_text().contains("Name cannot be empty"));

    let outcome = harness.send(admin, "Demo Talk").await;
    assert_eq!(outcome, Some(Transition::Advance("ask_type")));
    assert_eq!(harness.session_text(admin, "eventName").as_deref(), Some("Demo Talk"));
  }

  #[tokio::test]
  async fn full_setup_creates_event_with_date() {
    let harness = Harness::new();
    let admin = harness.admin();

    harness.send(admin, "/eventSetup").await;
    harness.send(admin, "Demo Talk").await;
    assert_eq!(harness.send(admin, "9").await, Some(Transition::Stay));
    assert_eq!(harness.send(admin, "/3").await, Some(Transition::Advance("ask_started_at")));

    let events = harness.db.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "Demo Talk");
    assert_eq!(events[0].event_type, EventType::Workshop);

    assert_eq!(harness.send(admin, "tomorrow").await, Some(Transition::Stay));
    assert_eq!(harness.send(admin, "31.12.2030 18:00").await, Some(Transition::End));

    let at = Utc.with_ymd_and_hms(2030, 12, 31, 18, 0, 0).unwrap();
    assert_eq!(harness.db.event_changes(), vec![(events[0].id, EventChange::StartedAt(at))]);
    assert!(harness.last_text().contains("Demo Talk"));
    assert!(harness.position(admin).is_none());
  }

  #[tokio::test]
  async fn members_cannot_create_events() {
    let harness = Harness::new();
    let member = harness.member();

    harness.send(member, "/eventSetup").await;
    assert!(harness.position(member).is_none());
    assert_eq!(harness.last_text(), "This command is only available to administrators.");
  }

  #[tokio::test]
  async fn cancel_after_type_keeps_created_event() {
    let harness = Harness::new();
    let admin = harness.admin();

    harness.send(admin, "/eventSetup").await;
    harness.send(admin, "Demo Talk").await;
    harness.send(admin, "1").await;
    assert_eq!(harness.send(admin, "/cancel").await, Some(Transition::End));

    assert!(harness.position(admin).is_none());
    assert_eq!(harness.db.events().len(), 1);
    assert_eq!(harness.last_text(), "Event creation canceled.");
  }
}
