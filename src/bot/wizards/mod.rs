//! Every conversation the bot runs, described as engine wizard tables.

mod admin_profiles;
mod event_edit;
mod event_setup;
mod event_start;
mod events;
mod help;
mod profile;
mod show_topics;
mod start;
mod topic_add;
mod topics;

use anyhow::Result;
use tracing::warn;

use crate::bot::BotTurn;
use crate::bot::StepResult;
use crate::bot::commands;
use crate::bot::context::AppContext;
use crate::engine::Keyboard;
use crate::engine::Prompt;
use crate::engine::Registry;
use crate::engine::RegistryError;
use crate::engine::Transition;
use crate::models::EventRow;
use crate::util::parse_id;

pub fn build_registry() -> Result<Registry<AppContext>, RegistryError> {
  let known = commands::known_commands();
  let mut registry = Registry::new(known.iter().map(String::as_str));
  for wizard in [
    start::wizard(),
    help::wizard(),
    events::wizard(),
    event_setup::wizard(),
    event_edit::wizard(),
    event_start::wizard(),
    topic_add::wizard(),
    topics::wizard(),
    show_topics::wizard(),
    profile::wizard(),
    admin_profiles::wizard(),
  ] {
    registry.register(wizard)?;
  }
  Ok(registry)
}

async fn lost_context(turn: &BotTurn, key: &str, restart: &str) -> StepResult {
  warn!(user_id = turn.user_id(), key, "session data missing");
  turn.retire_previous_prompt().await;
  turn
    .reply(Prompt::plain(format!(
      "An internal error occurred: the dialog data was lost. Please start over with /{restart}."
    )))
    .await;
  Ok(Transition::End)
}

/// Resolves the event id the user typed. Malformed or unknown ids re-prompt
/// with `keyboard` and yield `None`.
async fn pick_event(turn: &BotTurn, keyboard: Keyboard) -> Result<Option<EventRow>> {
  let input = turn.text().unwrap_or_default();
  let Ok(id) = parse_id(input) else {
    turn
      .prompt(Prompt::plain("Invalid ID format. Please send a numeric event ID.").keyboard(keyboard))
      .await;
    return Ok(None);
  };
  let lookup = turn.services().events.get_by_id(id).await;
  let event = turn
    .notify_on_error(lookup, "An error occurred while looking up the event.")
    .await?;
  if event.is_none() {
    turn
      .prompt(Prompt::plain(format!("Event with ID {id} was not found. Please send an ID from the list.")).keyboard(keyboard))
      .await;
  }
  Ok(event)
}

#[cfg(test)]
mod tests {
  use super::build_registry;
  use crate::engine::CANCEL_COMMAND;
  use crate::engine::Matcher;
  use crate::engine::Transition;
  use crate::engine::session::Position;
  use crate::testing::ADMIN;
  use crate::testing::Harness;

  #[test]
  fn registry_accepts_every_wizard() {
    let registry = build_registry().expect("wizard tables are consistent");
    assert_eq!(registry.wizards().count(), 11);
  }

  #[tokio::test]
  async fn cancel_ends_every_state_of_every_wizard() {
    let registry = build_registry().expect("wizard tables are consistent");
    for wizard in registry.wizards() {
      for state in wizard.state_names() {
        let routes = registry.lookup(wizard.name(), state).unwrap_or_default();
        assert_eq!(
          routes.first().map(|route| route.matcher),
          Some(Matcher::Command(CANCEL_COMMAND)),
          "{}/{state}",
          wizard.name()
        );

        let harness = Harness::new();
        harness.dispatcher.sessions().enter(ADMIN, Position {
          wizard: wizard.name(),
          state,
        });
        assert_eq!(harness.send(ADMIN, "/cancel").await, Some(Transition::End), "{}/{state}", wizard.name());
        assert!(harness.position(ADMIN).is_none(), "{}/{state}", wizard.name());
      }
    }
  }
}
