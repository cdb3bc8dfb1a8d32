use anyhow::Result;
use teloxide::utils::html::escape;
use tracing::debug;
use tracing::info;

use crate::bot::AppContext;
use crate::bot::BotTurn;
use crate::bot::BotWizard;
use crate::bot::StepResult;
use crate::bot::access::admit;
use crate::bot::commands;
use crate::bot::format;
use crate::bot::keyboards;
use crate::bot::publish::republish_after_save;
use crate::engine::Button;
use crate::engine::CleanupPolicy;
use crate::engine::Keyboard;
use crate::engine::Matcher;
use crate::engine::Prompt;
use crate::engine::Transition;
use crate::models::ProfileRow;
use crate::models::UserChange;
use crate::models::UserRow;
use crate::util::normalize_username;
use crate::util::utf16_len;

const VIEW_OPTIONS: &str = "view_options";
const AWAIT_SEARCH: &str = "await_search";
const AWAIT_BIO: &str = "await_bio";
const AWAIT_FIRSTNAME: &str = "await_firstname";
const AWAIT_LASTNAME: &str = "await_lastname";

const CALLBACK_PREFIX: &str = "profile_";
const MENU_CALLBACK: &str = "profile_start";
const EDIT_MENU_CALLBACK: &str = "profile_edit_menu";
const SEARCH_CALLBACK: &str = "profile_search";
const EDIT_BIO_CALLBACK: &str = "profile_edit_bio";
const EDIT_FIRSTNAME_CALLBACK: &str = "profile_edit_firstname";
const EDIT_LASTNAME_CALLBACK: &str = "profile_edit_lastname";
const CANCEL_CALLBACK: &str = "profile_cancel";

const MAX_NAME_LEN: usize = 30;

pub fn wizard() -> BotWizard {
  BotWizard::new("profile", commands::PROFILE, start)
    .cleanup(CleanupPolicy::Delete)
    .cancellable(Some(CANCEL_CALLBACK), "Profile session ended.")
    .enters(&[VIEW_OPTIONS])
    .state(VIEW_OPTIONS, |s| {
      s.on(Matcher::CallbackPrefix(CALLBACK_PREFIX), menu_button)
        .to(&[AWAIT_SEARCH, AWAIT_BIO, AWAIT_FIRSTNAME, AWAIT_LASTNAME])
    })
    .state(AWAIT_SEARCH, |s| {
      s.on(Matcher::Callback(MENU_CALLBACK), menu_button)
        .on(Matcher::Text, search)
        .to(&[VIEW_OPTIONS])
    })
    .state(AWAIT_BIO, |s| {
      s.on(Matcher::Callback(EDIT_MENU_CALLBACK), menu_button)
        .on(Matcher::Text, save_bio)
        .to(&[VIEW_OPTIONS])
    })
    .state(AWAIT_FIRSTNAME, |s| {
      s.on(Matcher::Callback(EDIT_MENU_CALLBACK), menu_button)
        .on(Matcher::Text, save_firstname)
        .to(&[VIEW_OPTIONS])
    })
    .state(AWAIT_LASTNAME, |s| {
      s.on(Matcher::Callback(EDIT_MENU_CALLBACK), menu_button)
        .on(Matcher::Text, save_lastname)
        .to(&[VIEW_OPTIONS])
    })
    .fallback(discard)
}

fn main_keyboard() -> Keyboard {
  Keyboard::new()
    .button(Button::callback("✏️ Edit", EDIT_MENU_CALLBACK))
    .button(Button::callback("🔎 Search profile by name/username", SEARCH_CALLBACK))
    .button(Button::callback("❌ Cancel", CANCEL_CALLBACK))
}

fn edit_keyboard() -> Keyboard {
  Keyboard::new()
    .row(vec![
      Button::callback("👤 First Name", EDIT_FIRSTNAME_CALLBACK),
      Button::callback("👤 Last Name", EDIT_LASTNAME_CALLBACK),
    ])
    .button(Button::callback("📝 Bio", EDIT_BIO_CALLBACK))
    .row(vec![
      Button::callback("◀️ Back", MENU_CALLBACK),
      Button::callback("❌ Cancel", CANCEL_CALLBACK),
    ])
}

fn field_keyboard() -> Keyboard {
  keyboards::back_cancel(EDIT_MENU_CALLBACK, CANCEL_CALLBACK)
}

async fn load_own(turn: &BotTurn) -> Result<(UserRow, ProfileRow)> {
  let services = turn.services();
  let user = services.users.get_or_create(turn.sender()).await?;
  let profile = services.profiles.get_or_create(user.id).await?;
  Ok((user, profile))
}

async fn own_profile(turn: &BotTurn) -> Result<(UserRow, ProfileRow)> {
  let loaded = load_own(turn).await;
  turn
    .notify_on_error(loaded, "An error occurred while loading your profile.")
    .await
}

async fn start(turn: BotTurn) -> StepResult {
  if !admit(&turn, commands::PROFILE).await {
    return Ok(Transition::End);
  }
  show_menu(&turn).await
}

async fn show_menu(turn: &BotTurn) -> StepResult {
  let (user, profile) = own_profile(turn).await?;
  let text = format::profile_menu(&user, &profile, &turn.services().settings);
  turn
    .prompt(Prompt::html(text).keyboard(main_keyboard()).without_preview(true))
    .await;
  Ok(Transition::Advance(VIEW_OPTIONS))
}

async fn menu_button(turn: BotTurn) -> StepResult {
  let data = turn.callback_data().unwrap_or_default();
  match data {
    MENU_CALLBACK => show_menu(&turn).await,
    EDIT_MENU_CALLBACK => {
      turn
        .prompt(
          Prompt::html("<b>Profile → Edit</b>\n\nChoose what you want to change:").keyboard(edit_keyboard()),
        )
        .await;
      Ok(Transition::Advance(VIEW_OPTIONS))
    },
    SEARCH_CALLBACK => {
      turn
        .prompt(
          Prompt::html(
            "Enter the user's Telegram username <i>(with or without @)</i>, or their first and last name <i>(separated by a space)</i>:",
          )
          .keyboard(keyboards::back_cancel(MENU_CALLBACK, CANCEL_CALLBACK)),
        )
        .await;
      Ok(Transition::Advance(AWAIT_SEARCH))
    },
    EDIT_FIRSTNAME_CALLBACK => {
      let (user, _) = own_profile(&turn).await?;
      ask_field(&turn, "First Name", &user.firstname, "first name").await;
      Ok(Transition::Advance(AWAIT_FIRSTNAME))
    },
    EDIT_LASTNAME_CALLBACK => {
      let (user, _) = own_profile(&turn).await?;
      ask_field(&turn, "Last Name", &user.lastname, "last name").await;
      Ok(Transition::Advance(AWAIT_LASTNAME))
    },
    EDIT_BIO_CALLBACK => {
      let (_, profile) = own_profile(&turn).await?;
      let current = if profile.bio.is_empty() {
        "<i>not set</i>".to_string()
      } else {
        format!("<blockquote expandable>{}</blockquote>", escape(&profile.bio))
      };
      let text = format!(
        "<b>Profile → Edit → Bio</b>\n\nCurrent bio:\n{current}\n\nSend a short bio, up to {} characters:",
        turn.services().settings.bio_limit
      );
      turn.prompt(Prompt::html(text).keyboard(field_keyboard())).await;
      Ok(Transition::Advance(AWAIT_BIO))
    },
    other => {
      debug!(user_id = turn.user_id(), data = other, "unknown profile button");
      Ok(Transition::Stay)
    },
  }
}

async fn ask_field(turn: &BotTurn, title: &str, current: &str, noun: &str) {
  let current = if current.is_empty() {
    "<i>not set</i>".to_string()
  } else {
    format!("<code>{}</code>", escape(current))
  };
  turn
    .prompt(
      Prompt::html(format!(
        "<b>Profile → Edit → {title}</b>\n\nCurrent value: {current}\n\nSend the new {noun}:"
      ))
      .keyboard(field_keyboard()),
    )
    .await;
}

async fn find_member(services: &AppContext, query: &str) -> Result<Option<UserRow>> {
  let query = normalize_username(query);
  if let Some(user) = services.users.get_by_username(&query).await? {
    return Ok(Some(user));
  }
  let mut words = query.split_whitespace();
  let Some(firstname) = words.next() else {
    return Ok(None);
  };
  let lastname = words.collect::<Vec<_>>().join(" ");
  services.users.search_by_name(firstname, &lastname).await
}

async fn search(turn: BotTurn) -> StepResult {
  let query = turn.text().unwrap_or_default().to_string();
  if query.is_empty() {
    return Ok(Transition::Stay);
  }
  let services = turn.services();

  let lookup = tokio::select! {
    biased;
    () = turn.cancellation().cancelled() => {
      info!(user_id = turn.user_id(), "profile search interrupted");
      return Ok(Transition::End);
    },
    found = find_member(services, &query) => found,
  };
  let found = turn
    .notify_on_error(lookup, "An error occurred while searching. Please try again.")
    .await?;
  turn.delete_input().await;

  let Some(user) = found else {
    turn
      .prompt(
        Prompt::html(format!("User {} not found. Please try again", escape(&query)))
          .keyboard(keyboards::back_cancel(MENU_CALLBACK, CANCEL_CALLBACK)),
      )
      .await;
    return Ok(Transition::Stay);
  };

  let lookup = services.profiles.get_by_user_id(user.id).await;
  let profile = turn
    .notify_on_error(lookup, "An error occurred while loading the profile.")
    .await?;
  turn
    .prompt(
      Prompt::html(format::profile_view(&user, profile.as_ref()))
        .keyboard(keyboards::back_cancel(MENU_CALLBACK, CANCEL_CALLBACK)),
    )
    .await;
  Ok(Transition::Advance(VIEW_OPTIONS))
}

async fn saved(turn: &BotTurn, title: &str, confirmation: &str, user_id: i64) -> StepResult {
  let notice = republish_after_save(turn, user_id, true).await;
  turn.delete_input().await;
  turn
    .prompt(
      Prompt::html(format!("<b>Profile → Edit → {title}</b>\n\n✅ {confirmation}{notice}"))
        .keyboard(field_keyboard())
        .without_preview(true),
    )
    .await;
  Ok(Transition::Advance(VIEW_OPTIONS))
}

async fn save_name(turn: BotTurn, field: NameField) -> StepResult {
  let value = turn.text().unwrap_or_default().to_string();
  if value.is_empty() {
    turn
      .prompt(Prompt::plain(format!("The {} cannot be empty. Please send it again:", field.noun())).keyboard(field_keyboard()))
      .await;
    return Ok(Transition::Stay);
  }
  if value.chars().count() > MAX_NAME_LEN {
    turn
      .prompt(
        Prompt::plain(format!(
          "The {} is too long. Please enter a shorter name (max {MAX_NAME_LEN} characters):",
          field.noun()
        ))
        .keyboard(field_keyboard()),
      )
      .await;
    return Ok(Transition::Stay);
  }

  let (user, _) = own_profile(&turn).await?;
  let change = match field {
    NameField::First => UserChange::Firstname(value),
    NameField::Last => UserChange::Lastname(value),
  };
  let updated = turn.services().users.update(user.id, change).await;
  turn
    .notify_on_error(updated, "An error occurred while saving. Please try again.")
    .await?;
  info!(user_id = turn.user_id(), field = field.noun(), "profile name saved");
  saved(&turn, field.title(), field.confirmation(), user.id).await
}

#[derive(Debug, Clone, Copy)]
enum NameField {
  First,
  Last,
}

impl NameField {
  fn noun(self) -> &'static str {
    match self {
      Self::First => "first name",
      Self::Last => "last name",
    }
  }

  fn title(self) -> &'static str {
    match self {
      Self::First => "First Name",
      Self::Last => "Last Name",
    }
  }

  fn confirmation(self) -> &'static str {
    match self {
      Self::First => "First name saved!",
      Self::Last => "Last name saved!",
    }
  }
}

async fn save_firstname(turn: BotTurn) -> StepResult {
  save_name(turn, NameField::First).await
}

async fn save_lastname(turn: BotTurn) -> StepResult {
  save_name(turn, NameField::Last).await
}

async fn save_bio(turn: BotTurn) -> StepResult {
  let bio = turn.text().unwrap_or_default().to_string();
  if bio.is_empty() {
    turn
      .prompt(Prompt::plain("Bio cannot be empty. Please send it again:").keyboard(field_keyboard()))
      .await;
    return Ok(Transition::Stay);
  }
  let limit = turn.services().settings.bio_limit;
  let length = utf16_len(&bio);
  if length > limit {
    turn
      .prompt(
        Prompt::html(format!(
          "Current length: {length} characters\n\nYour bio is too long. Please shorten it to {limit} characters and send again:"
        ))
        .keyboard(field_keyboard()),
      )
      .await;
    return Ok(Transition::Stay);
  }

  let (user, profile) = own_profile(&turn).await?;
  let updated = turn.services().profiles.update_bio(profile.id, &bio).await;
  turn
    .notify_on_error(updated, "An error occurred while saving. Please try again.")
    .await?;
  info!(user_id = turn.user_id(), length, "profile bio saved");
  saved(&turn, "Bio", "Bio saved!", user.id).await
}

async fn discard(turn: BotTurn) -> StepResult {
  turn.delete_input().await;
  Ok(Transition::Stay)
}
