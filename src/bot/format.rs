use std::fmt::Write;

use chrono::DateTime;
use chrono::Utc;
use teloxide::utils::html::escape;

use crate::bot::commands;
use crate::config::Settings;
use crate::models::EventRow;
use crate::models::EventType;
use crate::models::ProfileRow;
use crate::models::TopicRow;
use crate::models::UserRow;

const LIST_DATE_FORMAT: &str = "%d.%m.%Y at %H:%M UTC";
const TOPIC_DATE_FORMAT: &str = "%d.%m.%Y";

fn started_at(event: &EventRow) -> String {
  event
    .started_at
    .map(|at| at.format(LIST_DATE_FORMAT).to_string())
    .unwrap_or_else(|| "not set".to_string())
}

/// Short countdown for events in the coming week, e.g. `in 2h 5min`.
pub fn time_until(at: DateTime<Utc>, now: DateTime<Utc>) -> Option<String> {
  if at <= now {
    return None;
  }
  let left = at - now;
  let hours = left.num_hours();
  if left <= chrono::Duration::hours(24) {
    let mins = left.num_minutes() % 60;
    if hours > 0 {
      Some(format!("in {hours}h {mins}min"))
    } else {
      Some(format!("in {mins}min"))
    }
  } else if left <= chrono::Duration::days(7) {
    Some(format!("in {}d {}h", hours / 24, hours % 24))
  } else {
    None
  }
}

pub fn event_list_for_admin(events: &[EventRow], title: &str, action: &str) -> String {
  let mut out = format!("<b>{}</b>\n", escape(title));
  for event in events {
    let _ = write!(
      out,
      "\n{} ID /{}: <b>{}</b>\n└ {} <i>when</i>: <b>{}</b>\n",
      event.event_type.emoji(),
      event.id,
      escape(&event.name),
      event.status.emoji(),
      started_at(event),
    );
  }
  let _ = write!(out, "\nPlease send the event ID to {action}.");
  out
}

pub fn event_list_for_topics(events: &[EventRow], title: &str) -> String {
  let mut out = format!("{}:\n", escape(title));
  for event in events {
    let _ = write!(
      out,
      "\n{} <i>{}</i>: <b>{}</b>\n└   <i>ID</i> /{}, <i>when</i>: {}\n",
      event.event_type.emoji(),
      event.event_type.display_name(),
      escape(&event.name),
      event.id,
      started_at(event),
    );
  }
  out
}

pub fn event_list_for_members(events: &[EventRow], title: &str, now: DateTime<Utc>) -> String {
  let mut out = format!("{}:\n", escape(title));
  for event in events {
    let mut when = started_at(event);
    if let Some(countdown) = event.started_at.and_then(|at| time_until(at, now)) {
      let _ = write!(when, " <i>({countdown})</i>");
    }
    let _ = write!(
      out,
      "\n{} <i>{}</i>: <b>{}</b>\n└   <i>when</i>: {}\n",
      event.event_type.emoji(),
      event.event_type.display_name(),
      escape(&event.name),
      when,
    );
  }
  out
}

pub fn event_type_options() -> String {
  EventType::ALL
    .iter()
    .enumerate()
    .map(|(index, kind)| format!("/{}. {} {}", index + 1, kind.emoji(), kind.as_str()))
    .collect::<Vec<_>>()
    .join("\n")
}

fn event_heading(event: &EventRow) -> String {
  format!(
    "{} Event ({}): <b>{}</b>",
    event.event_type.emoji(),
    event.event_type.display_name(),
    escape(&event.name)
  )
}

pub fn topic_list_for_members(topics: &[TopicRow], event: &EventRow) -> String {
  let mut out = format!("{}\n", event_heading(event));
  if topics.is_empty() {
    let _ = write!(
      out,
      "\n🔍 No topics or questions for this event yet.\nUse /{} to add one.",
      commands::TOPIC_ADD
    );
    return out;
  }
  let _ = writeln!(out, "📋 Topics and questions found: <b>{}</b>\n", topics.len());
  let entries: Vec<String> = topics
    .iter()
    .map(|topic| {
      format!(
        "<i>{}</i> <blockquote expandable>{}</blockquote>\n",
        topic.created_at.format(TOPIC_DATE_FORMAT),
        escape(&topic.topic)
      )
    })
    .collect();
  out.push_str(&entries.join("\n"));
  let _ = write!(
    out,
    "\nUse /{} to add new topics and questions, or /{} to view topics for another event.",
    commands::TOPIC_ADD,
    commands::TOPICS
  );
  out
}

pub fn topic_list_for_admin(topics: &[TopicRow], event: &EventRow) -> String {
  let mut out = format!("{}\n\n", event_heading(event));
  if topics.is_empty() {
    out.push_str("No topics or questions for this event yet.");
    return out;
  }
  for topic in topics {
    let _ = write!(
      out,
      "ID:<code>{}</code> / <i>{}</i> / {}\n<blockquote expandable>{}</blockquote>\n",
      topic.id,
      topic.created_at.format(TOPIC_DATE_FORMAT),
      escape(&topic.user_nickname),
      escape(&topic.topic),
    );
  }
  out
}

/// `https://t.me/c/...` link to a message in the club supergroup.
pub fn message_link(chat_id: i64, message_id: i64) -> String {
  let raw = chat_id.to_string();
  let short = raw.strip_prefix("-100").unwrap_or(raw.trim_start_matches('-'));
  format!("https://t.me/c/{short}/{message_id}")
}

pub fn intro_topic_link(settings: &Settings) -> String {
  message_link(settings.supergroup_chat_id, i64::from(settings.intro_topic_id))
}

fn name_line(user: &UserRow) -> String {
  let username = if user.tg_username.is_empty() {
    String::new()
  } else {
    format!(" (@{})", escape(&user.tg_username))
  };
  format!(
    "🖐 <b><a href=\"tg://user?id={}\">{}</a></b>{}\n",
    user.tg_id,
    escape(&user.full_name()),
    username
  )
}

pub fn profile_view(user: &UserRow, profile: Option<&ProfileRow>) -> String {
  let Some(profile) = profile else {
    return "This member has no profile yet.".to_string();
  };
  public_profile(user, profile)
}

pub fn public_profile(user: &UserRow, profile: &ProfileRow) -> String {
  let mut out = name_line(user);
  if !profile.bio.is_empty() {
    let _ = write!(out, "\n<blockquote>About</blockquote>\n{}\n", escape(&profile.bio));
  }
  out
}

pub fn profile_manager_view(user: &UserRow, profile: &ProfileRow, settings: &Settings) -> String {
  let mut out = name_line(user);
  if !profile.bio.is_empty() {
    let _ = write!(
      out,
      "\n<i>About:</i><blockquote expandable>{}</blockquote>",
      escape(&profile.bio)
    );
  }
  let coffee = if user.has_coffee_ban {
    "❌ Banned"
  } else {
    "✅ Allowed"
  };
  let _ = write!(out, "\n\n<i>Coffee meetings:</i> {coffee}");
  let _ = write!(out, "\n<i>Telegram ID:</i> <code>{}</code>", user.tg_id);
  if let Some(message_id) = profile.published_message_id {
    let _ = write!(
      out,
      "\n<i>Profile link:</i> {}",
      message_link(settings.supergroup_chat_id, message_id)
    );
  }
  out
}

fn field_status(done: bool, label: &str, value: Option<&str>) -> String {
  match (done, value) {
    (true, Some(value)) => format!("└ ✅ {label} <i>({})</i>", escape(value)),
    (true, None) => format!("└ ✅ {label}"),
    (false, _) => format!("└ ❌ {label}"),
  }
}

pub fn missing_fields(user: &UserRow, profile: &ProfileRow) -> Vec<&'static str> {
  let mut missing = Vec::new();
  if user.firstname.trim().is_empty() {
    missing.push("First Name");
  }
  if user.lastname.trim().is_empty() {
    missing.push("Last Name");
  }
  if profile.bio.trim().is_empty() {
    missing.push("Bio");
  }
  missing
}

pub fn profile_menu(user: &UserRow, profile: &ProfileRow, settings: &Settings) -> String {
  let mut out = String::from("<b>Profile</b>\n\nHere you can edit your profile and search for other members by name or username.");
  let _ = write!(
    out,
    "\n\n<blockquote>⚠️ Your profile will be automatically published in the \"<a href='{}'>Intro</a>\" channel once all fields are filled in.</blockquote>",
    intro_topic_link(settings)
  );
  out.push_str("\n\nField statuses:\n");
  let lines = [
    field_status(!user.firstname.is_empty(), "First Name", Some(&user.firstname)),
    field_status(!user.lastname.is_empty(), "Last Name", Some(&user.lastname)),
    field_status(!profile.bio.is_empty(), "Bio", None),
  ];
  out.push_str(&lines.join("\n"));
  if let Some(message_id) = profile.published_message_id {
    let _ = write!(
      out,
      "\n\n👉 <a href='{}'>Link</a> to your profile.",
      message_link(settings.supergroup_chat_id, message_id)
    );
  }
  out
}

pub fn help_text(is_admin: bool) -> String {
  let mut out = format!(
    "<b>📋 Bot Features</b>\n\n<b>🏠 Basic Commands</b>\n└ /{} - Welcome message\n└ /{} - Show this command list\n└ /{} - Force-cancel any active dialog\n\n",
    commands::START,
    commands::HELP,
    commands::CANCEL
  );
  let _ = write!(
    out,
    "<b>👤 Profile</b>\n└ /{} - Manage your profile, search members, publish your info in the Intro channel\n\n",
    commands::PROFILE
  );
  let _ = write!(
    out,
    "<b>📅 Events</b>\n└ /{} - View upcoming events\n└ /{} - View topics and questions for upcoming events\n└ /{} - Suggest a topic or question for an event",
    commands::EVENTS,
    commands::TOPICS,
    commands::TOPIC_ADD
  );
  if is_admin {
    let _ = write!(
      out,
      "\n\n<b>🔐 Admin Commands</b>\n└ /{} - Start an event\n└ /{} - Create a new event\n└ /{} - Edit an event\n└ /{} - View topics with <b>delete option</b>\n└ /{} - Manage member profiles",
      commands::EVENT_START,
      commands::EVENT_SETUP,
      commands::EVENT_EDIT,
      commands::SHOW_TOPICS,
      commands::PROFILES_MANAGER
    );
  }
  out
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use chrono::TimeZone;
  use chrono::Utc;

  use super::*;
  use crate::models::EventStatus;

  fn event(name: &str, started_at: Option<DateTime<Utc>>) -> EventRow {
    EventRow {
      id: 7,
      name: name.to_string(),
      event_type: EventType::Workshop,
      status: EventStatus::Actual,
      started_at,
      created_at: Utc::now(),
    }
  }

  #[test]
  fn countdown_covers_the_coming_week() {
    let now = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();
    assert_eq!(time_until(now + Duration::minutes(42), now).as_deref(), Some("in 42min"));
    assert_eq!(time_until(now + Duration::minutes(125), now).as_deref(), Some("in 2h 5min"));
    assert_eq!(time_until(now + Duration::hours(50), now).as_deref(), Some("in 2d 2h"));
    assert_eq!(time_until(now + Duration::days(9), now), None);
    assert_eq!(time_until(now - Duration::minutes(1), now), None);
  }

  #[test]
  fn admin_list_escapes_names_and_shows_ids() {
    let at = Utc.with_ymd_and_hms(2030, 12, 31, 10, 0, 0).unwrap();
    let text = event_list_for_admin(&[event("Rust <3", Some(at))], "Latest events", "edit");
    assert!(text.contains("ID /7: <b>Rust &lt;3</b>"));
    assert!(text.contains("31.12.2030 at 10:00 UTC"));
    assert!(text.ends_with("Please send the event ID to edit."));
  }

  #[test]
  fn member_list_marks_unset_dates() {
    let text = event_list_for_members(&[event("Demo", None)], "Upcoming", Utc::now());
    assert!(text.contains("<i>when</i>: not set"));
  }

  #[test]
  fn type_options_are_numbered_from_one() {
    let options = event_type_options();
    assert!(options.starts_with("/1. 💬 club-call"));
    assert!(options.contains("/5. 👥 conference"));
  }

  #[test]
  fn empty_topic_list_points_to_topic_add() {
    let text = topic_list_for_members(&[], &event("Demo", None));
    assert!(text.contains("No topics or questions"));
    assert!(text.contains("/topicAdd"));
  }

  #[test]
  fn message_links_drop_the_supergroup_prefix() {
    assert_eq!(message_link(-1001234567890, 42), "https://t.me/c/1234567890/42");
    assert_eq!(message_link(-987, 5), "https://t.me/c/987/5");
  }

  #[test]
  fn help_shows_admin_section_only_to_admins() {
    assert!(!help_text(false).contains("Admin Commands"));
    assert!(help_text(true).contains("/profilesManager"));
  }
}
