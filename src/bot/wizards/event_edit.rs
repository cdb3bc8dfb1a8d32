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
use crate::bot::wizards::pick_event;
use crate::engine::CleanupPolicy;
use crate::engine::Matcher;
use crate::engine::Prompt;
use crate::engine::Transition;
use crate::models::EventChange;
use crate::models::EventRow;
use crate::models::EventType;
use crate::util::format_event_date;
use crate::util::parse_event_date;
use crate::util::parse_menu_selection;

const SELECT_EVENT: &str = "select_event";
const SELECT_FIELD: &str = "select_field";
const EDIT_NAME: &str = "edit_name";
const EDIT_STARTED_AT: &str = "edit_started_at";
const EDIT_TYPE: &str = "edit_type";

const CANCEL_CALLBACK: &str = "event_edit_cancel";
const EVENT_ID_KEY: &str = "eventEditId";

pub fn wizard() -> BotWizard {
  BotWizard::new("event_edit", commands::EVENT_EDIT, start)
    .cleanup(CleanupPolicy::StripKeyboard)
    .cancellable(Some(CANCEL_CALLBACK), "Event editing canceled.")
    .enters(&[SELECT_EVENT])
    .state(SELECT_EVENT, |s| s.on(Matcher::Text, select_event).to(&[SELECT_FIELD]))
    .state(SELECT_FIELD, |s| {
      s.on(Matcher::Text, select_field)
        .to(&[EDIT_NAME, EDIT_STARTED_AT, EDIT_TYPE])
    })
    .state(EDIT_NAME, |s| s.on(Matcher::Text, edit_name))
    .state(EDIT_STARTED_AT, |s| s.on(Matcher::Text, edit_started_at))
    .state(EDIT_TYPE, |s| s.on(Matcher::Text, edit_type))
}

fn ask(text: impl Into<String>) -> Prompt {
  Prompt::html(text).keyboard(keyboards::cancel(CANCEL_CALLBACK))
}

async fn start(turn: BotTurn) -> StepResult {
  if !admit(&turn, commands::EVENT_EDIT).await {
    return Ok(Transition::End);
  }
  let services = turn.services();
  let lookup = services.events.last_events(services.settings.event_list_limit).await;
  let events = turn
    .notify_on_error(lookup, "An error occurred while retrieving the list of events.")
    .await?;
  if events.is_empty() {
    turn.reply(Prompt::plain("No events available for editing.")).await;
    return Ok(Transition::End);
  }
  let title = format!("Last {} events:", events.len());
  turn
    .prompt(ask(format::event_list_for_admin(&events, &title, "edit")))
    .await;
  Ok(Transition::Advance(SELECT_EVENT))
}

async fn select_event(turn: BotTurn) -> StepResult {
  let Some(event) = pick_event(&turn, keyboards::cancel(CANCEL_CALLBACK)).await? else {
    return Ok(Transition::Stay);
  };
  turn.set(EVENT_ID_KEY, event.id);
  turn
    .prompt(ask(format!(
      "Editing <b>{}</b>\n\nWhat do you want to edit?\n/1. Name\n/2. Start date\n/3. Type\n\nSend a number:",
      escape(&event.name)
    )))
    .await;
  Ok(Transition::Advance(SELECT_FIELD))
}

async fn selected_event(turn: &BotTurn) -> anyhow::Result<Option<EventRow>> {
  let Some(event_id) = turn.get_int(EVENT_ID_KEY) else {
    return Ok(None);
  };
  let lookup = turn.services().events.get_by_id(event_id).await;
  turn
    .notify_on_error(lookup, "An error occurred while retrieving the selected event.")
    .await
}

async fn select_field(turn: BotTurn) -> StepResult {
  let Ok(choice) = parse_menu_selection(turn.text().unwrap_or_default(), 3) else {
    turn
      .prompt(ask("Invalid selection. Please send a number from 1 to 3, or use the cancel button."))
      .await;
    return Ok(Transition::Stay);
  };
  let Some(event) = selected_event(&turn).await? else {
    return lost_context(&turn, EVENT_ID_KEY, commands::EVENT_EDIT).await;
  };
  let (text, next) = match choice {
    0 => (
      format!("Current name: <b>{}</b>\n\nSend the new name:", escape(&event.name)),
      EDIT_NAME,
    ),
    1 => {
      let current = event
        .started_at
        .map(format_event_date)
        .unwrap_or_else(|| "not set".to_string());
      (
        format!(
          "Current start date: <code>{current}</code> (UTC)\n\nSend the new date and time in DD.MM.YYYY HH:MM format (UTC):"
        ),
        EDIT_STARTED_AT,
      )
    },
    _ => (
      format!(
        "Current type: <b>{}</b>\n\nAvailable types:\n{}\n\nSend the new type or its number:",
        event.event_type,
        format::event_type_options()
      ),
      EDIT_TYPE,
    ),
  };
  turn.prompt(ask(text)).await;
  Ok(Transition::Advance(next))
}

async fn save(turn: &BotTurn, change: EventChange, summary: String) -> StepResult {
  let Some(event_id) = turn.get_int(EVENT_ID_KEY) else {
    return lost_context(turn, EVENT_ID_KEY, commands::EVENT_EDIT).await;
  };
  let updated = turn.services().events.update(event_id, change).await;
  turn
    .notify_on_error(updated, "An error occurred while updating the event.")
    .await?;
  info!(user_id = turn.user_id(), event_id, "event updated");
  turn.retire_previous_prompt().await;
  turn
    .reply(Prompt::html(format!(
      "✅ Event {event_id}: {summary}\n\nTo continue editing use /{}.\nTo see all commands use /{}.",
      commands::EVENT_EDIT,
      commands::HELP
    )))
    .await;
  Ok(Transition::End)
}

async fn edit_name(turn: BotTurn) -> StepResult {
  let name = turn.text().unwrap_or_default().to_string();
  if name.is_empty() {
    turn
      .prompt(ask("Name cannot be empty. Please send a new name or use the cancel button:"))
      .await;
    return Ok(Transition::Stay);
  }
  let summary = format!("name updated to <b>{}</b>", escape(&name));
  save(&turn, EventChange::Name(name), summary).await
}

async fn edit_started_at(turn: BotTurn) -> StepResult {
  let Ok(started_at) = parse_event_date(turn.text().unwrap_or_default()) else {
    turn
      .prompt(ask(
        "Invalid date format. Please send the date and time as <b>DD.MM.YYYY HH:MM</b> (UTC) or use the cancel button.",
      ))
      .await;
    return Ok(Transition::Stay);
  };
  let summary = format!("start date updated to <b>{} UTC</b>", format_event_date(started_at));
  save(&turn, EventChange::StartedAt(started_at), summary).await
}

fn parse_event_type(input: &str) -> Option<EventType> {
  parse_menu_selection(input, EventType::ALL.len())
    .ok()
    .map(|index| EventType::ALL[index])
    .or_else(|| input.trim().to_ascii_lowercase().parse().ok())
}

async fn edit_type(turn: BotTurn) -> StepResult {
  let Some(event_type) = parse_event_type(turn.text().unwrap_or_default()) else {
    turn
      .prompt(ask(format!(
        "Unknown type. Please send one of:\n{}\n\nor use the cancel button.",
        format::event_type_options()
      )))
      .await;
    return Ok(Transition::Stay);
  };
  let summary = format!("type updated to <b>{event_type}</b>");
  save(&turn, EventChange::Type(event_type), summary).await
}
