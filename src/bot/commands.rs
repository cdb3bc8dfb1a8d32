use teloxide::utils::command::BotCommands;

pub const START: &str = "start";
pub const HELP: &str = "help";
pub const CANCEL: &str = "cancel";
pub const EVENTS: &str = "events";
pub const TOPICS: &str = "topics";
pub const TOPIC_ADD: &str = "topicAdd";
pub const PROFILE: &str = "profile";
pub const EVENT_SETUP: &str = "eventSetup";
pub const EVENT_EDIT: &str = "eventEdit";
pub const EVENT_START: &str = "eventStart";
pub const SHOW_TOPICS: &str = "showTopics";
pub const PROFILES_MANAGER: &str = "profilesManager";

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "camelCase", description = "Available commands:")]
pub enum Command {
  /// Welcome message
  Start,
  /// Show the command list
  Help,
  /// Force-cancel any active dialog
  Cancel,
  /// View upcoming events
  Events,
  /// View topics and questions for upcoming events
  Topics,
  /// Suggest a topic or question for an event
  TopicAdd,
  /// Manage your profile and search members
  Profile,
  /// Create a new event
  EventSetup,
  /// Edit an event
  EventEdit,
  /// Start an event
  EventStart,
  /// View topics with delete option
  ShowTopics,
  /// Manage member profiles
  ProfilesManager,
}

/// Every command name the bot understands, without the leading slash.
pub fn known_commands() -> Vec<String> {
  Command::bot_commands()
    .into_iter()
    .map(|command| command.command.trim_start_matches('/').to_string())
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn constants_cover_the_command_enum() {
    let known: Vec<String> = known_commands().iter().map(|c| c.to_ascii_lowercase()).collect();
    let constants = [
      START,
      HELP,
      CANCEL,
      EVENTS,
      TOPICS,
      TOPIC_ADD,
      PROFILE,
      EVENT_SETUP,
      EVENT_EDIT,
      EVENT_START,
      SHOW_TOPICS,
      PROFILES_MANAGER,
    ];
    assert_eq!(known.len(), constants.len());
    for name in constants {
      assert!(known.contains(&name.to_ascii_lowercase()), "missing /{name}");
    }
  }

  #[test]
  fn cancel_matches_engine_exit() {
    assert_eq!(CANCEL, crate::engine::CANCEL_COMMAND);
  }
}
