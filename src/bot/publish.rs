use anyhow::Result;
use tracing::info;
use tracing::warn;

use crate::bot::BotTurn;
use crate::bot::format;
use crate::config::Settings;
use crate::engine::MessageRef;
use crate::engine::Prompt;
use crate::engine::TransportError;
use crate::models::ProfileRow;
use crate::models::UserRow;
use crate::models::is_profile_complete;

/// Posts the member card to the intro thread, or edits the existing post in
/// place, and records the message id. `None` means the profile is incomplete.
pub async fn publish_profile(
  turn: &BotTurn,
  user: &UserRow,
  profile: &ProfileRow,
  without_preview: bool,
) -> Result<Option<i64>> {
  if !is_profile_complete(user, profile) {
    return Ok(None);
  }
  let settings = &turn.services().settings;
  let prompt = Prompt::html(format::public_profile(user, profile)).without_preview(without_preview);

  if let Some(existing) = profile.published_message_id
    && let Ok(message_id) = i32::try_from(existing)
  {
    let target = MessageRef::new(settings.supergroup_chat_id, message_id);
    match turn.transport().edit_prompt(target, &prompt).await {
      Ok(()) | Err(TransportError::NotModified) => return Ok(Some(existing)),
      Err(err) => warn!(user_id = user.tg_id, message_id, error = %err, "published profile not editable, posting anew"),
    }
  }

  let sent = turn
    .send_to(settings.supergroup_chat_id, &prompt.in_thread(settings.intro_topic_id))
    .await?;
  let message_id = i64::from(sent.message_id);
  turn
    .services()
    .profiles
    .set_published_message_id(profile.id, message_id)
    .await?;
  info!(user_id = user.tg_id, message_id, "profile published");
  Ok(Some(message_id))
}

pub fn published_notice(settings: &Settings, message_id: i64) -> String {
  format!(
    "\n✅ Profile <a href='{}'>published</a> in the \"Intro\" channel.",
    format::message_link(settings.supergroup_chat_id, message_id)
  )
}

/// Re-publishes after a field change. Failures are logged and yield no notice,
/// the saved field stays saved either way.
pub async fn republish_after_save(turn: &BotTurn, user_id: i64, without_preview: bool) -> String {
  match republish(turn, user_id, without_preview).await {
    Ok(Some(message_id)) => published_notice(&turn.services().settings, message_id),
    Ok(None) => String::new(),
    Err(err) => {
      warn!(user_id, error = %err, "failed to publish profile");
      String::new()
    },
  }
}

async fn republish(turn: &BotTurn, user_id: i64, without_preview: bool) -> Result<Option<i64>> {
  let services = turn.services();
  let Some(user) = services.users.get_by_id(user_id).await? else {
    return Ok(None);
  };
  let profile = services.profiles.get_or_create(user.id).await?;
  publish_profile(turn, &user, &profile, without_preview).await
}
