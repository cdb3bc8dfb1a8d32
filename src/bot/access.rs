use std::collections::HashSet;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::types::UserId;
use tracing::warn;

use crate::bot::BotTurn;
use crate::bot::commands;
use crate::engine::Prompt;

const ADMIN_ONLY: &str = "This command is only available to administrators.";
const MEMBERS_ONLY: &str = "This command is only available to group members.";
const PRIVATE_ONLY: &str = "This command only works in a private chat with me. Please message me directly.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Anyone,
  Member,
  Admin,
}

pub fn required_access(command: &str) -> Access {
  match command {
    commands::EVENTS | commands::TOPICS | commands::TOPIC_ADD | commands::PROFILE => Access::Member,
    commands::EVENT_SETUP
    | commands::EVENT_EDIT
    | commands::EVENT_START
    | commands::SHOW_TOPICS
    | commands::PROFILES_MANAGER => Access::Admin,
    _ => Access::Anyone,
  }
}

#[async_trait]
pub trait PermissionGate: Send + Sync {
  async fn is_admin(&self, user_id: i64) -> bool;

  async fn is_club_member(&self, user_id: i64) -> bool;

  async fn is_authorized(&self, user_id: i64, command: &str) -> bool {
    match required_access(command) {
      Access::Anyone => true,
      Access::Member => self.is_admin(user_id).await || self.is_club_member(user_id).await,
      Access::Admin => self.is_admin(user_id).await,
    }
  }
}

pub struct TelegramPermissions {
  bot: Bot,
  admins: HashSet<i64>,
  supergroup_chat_id: i64,
}

impl TelegramPermissions {
  pub fn new(bot: Bot, admins: Vec<i64>, supergroup_chat_id: i64) -> Self {
    Self {
      bot,
      admins: admins.into_iter().collect(),
      supergroup_chat_id,
    }
  }
}

#[async_trait]
impl PermissionGate for TelegramPermissions {
  async fn is_admin(&self, user_id: i64) -> bool {
    self.admins.contains(&user_id)
  }

  async fn is_club_member(&self, user_id: i64) -> bool {
    let Ok(tg_user) = u64::try_from(user_id) else {
      return false;
    };
    match self
      .bot
      .get_chat_member(ChatId(self.supergroup_chat_id), UserId(tg_user))
      .await
    {
      Ok(member) => member.is_present(),
      Err(err) => {
        warn!(user_id, error = %err, "failed to check group membership");
        false
      },
    }
  }
}

/// Entry guard shared by the wizards: private chat only, then the access
/// level of `command`. Tells the user why when it refuses.
pub async fn admit(turn: &BotTurn, command: &str) -> bool {
  let user_id = turn.user_id();
  if !turn.event().chat_is_private {
    turn.reply(Prompt::plain(PRIVATE_ONLY)).await;
    return false;
  }
  if turn.services().access.is_authorized(user_id, command).await {
    return true;
  }
  let notice = match required_access(command) {
    Access::Admin => ADMIN_ONLY,
    _ => MEMBERS_ONLY,
  };
  warn!(user_id, command, "command refused");
  turn.reply(Prompt::plain(notice)).await;
  false
}

#[cfg(test)]
mod tests {
  use super::Access;
  use super::PermissionGate;
  use super::required_access;
  use crate::bot::commands;
  use crate::testing::StaticPermissions;

  #[test]
  fn commands_map_to_access_levels() {
    assert_eq!(required_access(commands::START), Access::Anyone);
    assert_eq!(required_access(commands::HELP), Access::Anyone);
    assert_eq!(required_access(commands::TOPIC_ADD), Access::Member);
    assert_eq!(required_access(commands::PROFILE), Access::Member);
    assert_eq!(required_access(commands::EVENT_START), Access::Admin);
    assert_eq!(required_access(commands::PROFILES_MANAGER), Access::Admin);
  }

  #[tokio::test]
  async fn admins_pass_member_checks() {
    let gate = StaticPermissions::new([1], [2]);
    assert!(gate.is_authorized(1, commands::EVENTS).await);
    assert!(gate.is_authorized(2, commands::EVENTS).await);
    assert!(!gate.is_authorized(3, commands::EVENTS).await);
    assert!(gate.is_authorized(3, commands::START).await);
    assert!(!gate.is_authorized(2, commands::EVENT_SETUP).await);
  }
}
