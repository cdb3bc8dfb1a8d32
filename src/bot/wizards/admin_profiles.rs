//! Admin-side profile manager: find or create a member record, edit any
//! field on their behalf and publish the card to the intro thread.

use anyhow::Result;
use teloxide::utils::html::escape;
use tracing::info;

use crate::bot::BotTurn;
use crate::bot::BotWizard;
use crate::bot::StepResult;
use crate::bot::access::admit;
use crate::bot::commands;
use crate::bot::format;
use crate::bot::keyboards;
use crate::bot::publish::publish_profile;
use crate::bot::publish::published_notice;
use crate::bot::wizards::lost_context;
use crate::engine::Button;
use crate::engine::CleanupPolicy;
use crate::engine::ForwardOrigin;
use crate::engine::Keyboard;
use crate::engine::Matcher;
use crate::engine::Prompt;
use crate::engine::Transition;
use crate::models::ProfileRow;
use crate::models::UserChange;
use crate::models::UserRow;
use crate::util::normalize_username;
use crate::util::parse_id;
use crate::util::utf16_len;

const MAIN_MENU: &str = "main_menu";
const AWAIT_SEARCH_USERNAME: &str = "await_search_username";
const AWAIT_SEARCH_ID: &str = "await_search_id";
const AWAIT_SEARCH_NAME: &str = "await_search_name";
const AWAIT_FORWARD: &str = "await_forward";
const AWAIT_CREATE_ID: &str = "await_create_id";
const EDIT_PROFILE: &str = "edit_profile";
const AWAIT_FIRSTNAME: &str = "await_firstname";
const AWAIT_LASTNAME: &str = "await_lastname";
const AWAIT_USERNAME: &str = "await_username";
const AWAIT_BIO: &str = "await_bio";
const AWAIT_COFFEE_BAN: &str = "await_coffee_ban";

const MENU_TARGETS: &[&str] = &[
  MAIN_MENU,
  AWAIT_SEARCH_USERNAME,
  AWAIT_SEARCH_ID,
  AWAIT_SEARCH_NAME,
  AWAIT_FORWARD,
  AWAIT_CREATE_ID,
  EDIT_PROFILE,
  AWAIT_FIRSTNAME,
  AWAIT_LASTNAME,
  AWAIT_USERNAME,
  AWAIT_BIO,
  AWAIT_COFFEE_BAN,
];

const CALLBACK_PREFIX: &str = "admin_profiles_";
const MENU_CALLBACK: &str = "admin_profiles_start";
const SEARCH_USERNAME_CALLBACK: &str = "admin_profiles_search_username";
const SEARCH_ID_CALLBACK: &str = "admin_profiles_search_id";
const SEARCH_NAME_CALLBACK: &str = "admin_profiles_search_name";
const CREATE_FORWARD_CALLBACK: &str = "admin_profiles_create_forward";
const CREATE_ID_CALLBACK: &str = "admin_profiles_create_id";
const EDIT_MENU_CALLBACK: &str = "admin_profiles_edit_menu";
const EDIT_FIRSTNAME_CALLBACK: &str = "admin_profiles_edit_firstname";
const EDIT_LASTNAME_CALLBACK: &str = "admin_profiles_edit_lastname";
const EDIT_USERNAME_CALLBACK: &str = "admin_profiles_edit_username";
const EDIT_BIO_CALLBACK: &str = "admin_profiles_edit_bio";
const EDIT_COFFEE_CALLBACK: &str = "admin_profiles_edit_coffee";
const COFFEE_TOGGLE_CALLBACK: &str = "admin_profiles_coffee_toggle";
const PUBLISH_CALLBACK: &str = "admin_profiles_publish";
const PUBLISH_NO_PREVIEW_CALLBACK: &str = "admin_profiles_publish_no_preview";
const CANCEL_CALLBACK: &str = "admin_profiles_cancel";

const USER_ID_KEY: &str = "adminProfilesUserId";
const PROFILE_ID_KEY: &str = "adminProfilesProfileId";

const MENU_HEADER: &str = "Admin Menu \"Profile Manager\"";
const EDIT_HEADER: &str = "Profile Manager → Edit";
const PUBLISH_HEADER: &str = "Profile Manager → Publish";

const MAX_NAME_LEN: usize = 30;
const MAX_USERNAME_LEN: usize = 32;

pub fn wizard() -> BotWizard {
  let buttons = Matcher::CallbackPrefix(CALLBACK_PREFIX);
  BotWizard::new("admin_profiles", commands::PROFILES_MANAGER, start)
    .cleanup(CleanupPolicy::Delete)
    .cancellable(Some(CANCEL_CALLBACK), "Admin profile management session ended.")
    .enters(&[MAIN_MENU])
    .state(MAIN_MENU, |s| s.on(buttons, menu_button).to(MENU_TARGETS))
    .state(AWAIT_SEARCH_USERNAME, |s| {
      s.on(buttons, menu_button)
        .on(Matcher::Text, search_by_username)
        .to(MENU_TARGETS)
    })
    .state(AWAIT_SEARCH_ID, |s| {
      s.on(buttons, menu_button)
        .on(Matcher::Text, search_by_tg_id)
        .to(MENU_TARGETS)
    })
    .state(AWAIT_SEARCH_NAME, |s| {
      s.on(buttons, menu_button)
        .on(Matcher::Text, search_by_full_name)
        .to(MENU_TARGETS)
    })
    .state(AWAIT_FORWARD, |s| {
      s.on(buttons, menu_button)
        .on(Matcher::AnyMessage, create_from_forward)
        .to(MENU_TARGETS)
    })
    .state(AWAIT_CREATE_ID, |s| {
      s.on(buttons, menu_button)
        .on(Matcher::Text, create_by_tg_id)
        .to(MENU_TARGETS)
    })
    .state(EDIT_PROFILE, |s| s.on(buttons, menu_button).to(MENU_TARGETS))
    .state(AWAIT_FIRSTNAME, |s| {
      s.on(buttons, menu_button)
        .on(Matcher::Text, save_firstname)
        .to(MENU_TARGETS)
    })
    .state(AWAIT_LASTNAME, |s| {
      s.on(buttons, menu_button)
        .on(Matcher::Text, save_lastname)
        .to(MENU_TARGETS)
    })
    .state(AWAIT_USERNAME, |s| {
      s.on(buttons, menu_button)
        .on(Matcher::Text, save_username)
        .to(MENU_TARGETS)
    })
    .state(AWAIT_BIO, |s| {
      s.on(buttons, menu_button)
        .on(Matcher::Text, save_bio)
        .to(MENU_TARGETS)
    })
    .state(AWAIT_COFFEE_BAN, |s| s.on(buttons, menu_button).to(MENU_TARGETS))
}

fn header(title: &str, body: impl AsRef<str>) -> String {
  format!("<b>{title}</b>\n\n{}", body.as_ref())
}

fn main_keyboard() -> Keyboard {
  Keyboard::new()
    .button(Button::callback("📝 Search by Telegram Username", SEARCH_USERNAME_CALLBACK))
    .button(Button::callback("🔍 Search by Telegram ID", SEARCH_ID_CALLBACK))
    .button(Button::callback("🔍 Search by full name", SEARCH_NAME_CALLBACK))
    .button(Button::callback("➕ Create profile (via forward)", CREATE_FORWARD_CALLBACK))
    .button(Button::callback("🆔 Create profile by Telegram ID", CREATE_ID_CALLBACK))
    .button(Button::callback("❌ Cancel", CANCEL_CALLBACK))
}

fn edit_keyboard() -> Keyboard {
  Keyboard::new()
    .row(vec![
      Button::callback("👤 First Name", EDIT_FIRSTNAME_CALLBACK),
      Button::callback("👤 Last Name", EDIT_LASTNAME_CALLBACK),
      Button::callback("👤 Username", EDIT_USERNAME_CALLBACK),
    ])
    .row(vec![
      Button::callback("📝 Bio", EDIT_BIO_CALLBACK),
      Button::callback("☕️ Coffee?", EDIT_COFFEE_CALLBACK),
    ])
    .row(vec![
      Button::callback("📢 Publish (+ preview)", PUBLISH_CALLBACK),
      Button::callback("📢 Publish (- preview)", PUBLISH_NO_PREVIEW_CALLBACK),
    ])
    .row(vec![
      Button::callback("◀️ Back", MENU_CALLBACK),
      Button::callback("❌ Cancel", CANCEL_CALLBACK),
    ])
}

fn back_to_menu() -> Keyboard {
  keyboards::back_cancel(MENU_CALLBACK, CANCEL_CALLBACK)
}

fn back_to_edit() -> Keyboard {
  keyboards::back_cancel(EDIT_MENU_CALLBACK, CANCEL_CALLBACK)
}

fn coffee_keyboard(banned: bool) -> Keyboard {
  let label = if banned { "✅ Allow" } else { "❌ Ban" };
  Keyboard::new()
    .button(Button::callback(label, COFFEE_TOGGLE_CALLBACK))
    .row(vec![
      Button::callback("◀️ Back", EDIT_MENU_CALLBACK),
      Button::callback("❌ Cancel", CANCEL_CALLBACK),
    ])
}

async fn start(turn: BotTurn) -> StepResult {
  if !admit(&turn, commands::PROFILES_MANAGER).await {
    return Ok(Transition::End);
  }
  show_main_menu(&turn).await
}

async fn show_main_menu(turn: &BotTurn) -> StepResult {
  turn.remove(USER_ID_KEY);
  turn.remove(PROFILE_ID_KEY);
  turn
    .prompt(
      Prompt::html(header(
        MENU_HEADER,
        "Here you can edit user profiles or create a new profile based on a forwarded message.",
      ))
      .keyboard(main_keyboard()),
    )
    .await;
  Ok(Transition::Advance(MAIN_MENU))
}

async fn ask(turn: &BotTurn, title: &str, body: &str, keyboard: Keyboard, next: &'static str) -> StepResult {
  turn.prompt(Prompt::html(header(title, body)).keyboard(keyboard)).await;
  Ok(Transition::Advance(next))
}

async fn menu_button(turn: BotTurn) -> StepResult {
  let data = turn.callback_data().unwrap_or_default();
  match data {
    MENU_CALLBACK => show_main_menu(&turn).await,
    SEARCH_USERNAME_CALLBACK => {
      ask(
        &turn,
        MENU_HEADER,
        "Enter the username (with or without @) to search:",
        back_to_menu(),
        AWAIT_SEARCH_USERNAME,
      )
      .await
    },
    SEARCH_ID_CALLBACK => {
      ask(
        &turn,
        "Profile Manager → Search by ID",
        "Enter the Telegram user ID to search for a profile:",
        back_to_menu(),
        AWAIT_SEARCH_ID,
      )
      .await
    },
    SEARCH_NAME_CALLBACK => {
      ask(
        &turn,
        "Profile Manager → Search by Name",
        "Enter the user's first and last name (separated by a space) to search for a profile:",
        back_to_menu(),
        AWAIT_SEARCH_NAME,
      )
      .await
    },
    CREATE_FORWARD_CALLBACK => {
      ask(
        &turn,
        MENU_HEADER,
        "Forward me a message from the user for whom you want to create a profile:",
        back_to_menu(),
        AWAIT_FORWARD,
      )
      .await
    },
    CREATE_ID_CALLBACK => {
      ask(
        &turn,
        "Profile Manager → Create by ID",
        "Enter the Telegram user ID to create a profile:",
        back_to_menu(),
        AWAIT_CREATE_ID,
      )
      .await
    },
    EDIT_MENU_CALLBACK => show_edit_menu(&turn).await,
    EDIT_FIRSTNAME_CALLBACK | EDIT_LASTNAME_CALLBACK | EDIT_USERNAME_CALLBACK | EDIT_BIO_CALLBACK | EDIT_COFFEE_CALLBACK => {
      ask_field(&turn, data).await
    },
    COFFEE_TOGGLE_CALLBACK => toggle_coffee_ban(&turn).await,
    PUBLISH_CALLBACK => publish(&turn, false).await,
    PUBLISH_NO_PREVIEW_CALLBACK => publish(&turn, true).await,
    other => {
      info!(user_id = turn.user_id(), data = other, "unknown profile manager button");
      Ok(Transition::Stay)
    },
  }
}

async fn open_profile(turn: &BotTurn, user: &UserRow) -> StepResult {
  let created = turn.services().profiles.get_or_create(user.id).await;
  let profile = turn
    .notify_on_error(created, "An error occurred while retrieving or creating the profile.")
    .await?;
  turn.set(USER_ID_KEY, user.id);
  turn.set(PROFILE_ID_KEY, profile.id);
  turn.delete_input().await;
  show_edit_menu(turn).await
}

async fn load_selected(turn: &BotTurn) -> Result<Option<(UserRow, ProfileRow)>> {
  let (Some(user_id), Some(profile_id)) = (turn.get_int(USER_ID_KEY), turn.get_int(PROFILE_ID_KEY)) else {
    return Ok(None);
  };
  let services = turn.services();
  let Some(user) = services.users.get_by_id(user_id).await? else {
    return Ok(None);
  };
  let Some(profile) = services.profiles.get_by_id(profile_id).await? else {
    return Ok(None);
  };
  Ok(Some((user, profile)))
}

async fn selected(turn: &BotTurn) -> Result<Option<(UserRow, ProfileRow)>> {
  let loaded = load_selected(turn).await;
  turn
    .notify_on_error(loaded, "An error occurred while retrieving the profile.")
    .await
}

async fn show_edit_menu(turn: &BotTurn) -> StepResult {
  let Some((user, profile)) = selected(turn).await? else {
    return lost_context(turn, USER_ID_KEY, commands::PROFILES_MANAGER).await;
  };
  let view = format::profile_manager_view(&user, &profile, &turn.services().settings);
  turn
    .prompt(
      Prompt::html(header(EDIT_HEADER, view))
        .keyboard(edit_keyboard())
        .without_preview(true),
    )
    .await;
  Ok(Transition::Advance(EDIT_PROFILE))
}

fn current_value(value: &str) -> String {
  format!("Current value: <code>{}</code>", escape(value))
}

async fn ask_field(turn: &BotTurn, data: &str) -> StepResult {
  let Some((user, profile)) = selected(turn).await? else {
    return lost_context(turn, USER_ID_KEY, commands::PROFILES_MANAGER).await;
  };
  let (title, current, call_to_action, next) = match data {
    EDIT_FIRSTNAME_CALLBACK => (
      "Profile Manager → Edit → First Name",
      current_value(&user.firstname),
      "Enter a new value for the <b>first name</b> field".to_string(),
      AWAIT_FIRSTNAME,
    ),
    EDIT_LASTNAME_CALLBACK => (
      "Profile Manager → Edit → Last Name",
      current_value(&user.lastname),
      "Enter a new value for the <b>last name</b> field".to_string(),
      AWAIT_LASTNAME,
    ),
    EDIT_USERNAME_CALLBACK => (
      "Profile Manager → Edit → Username",
      current_value(&user.tg_username),
      "Enter a new value for the <b>username</b> field (without @)".to_string(),
      AWAIT_USERNAME,
    ),
    EDIT_BIO_CALLBACK => (
      "Profile Manager → Edit → Bio",
      format!("Current value: <pre>{}</pre>", escape(&profile.bio)),
      format!(
        "Enter a new value for the <b>bio</b> field (up to {} characters)",
        turn.services().settings.bio_limit
      ),
      AWAIT_BIO,
    ),
    _ => {
      let status = if user.has_coffee_ban {
        "❌ Banned"
      } else {
        "✅ Allowed"
      };
      return ask(
        turn,
        "Profile Manager → Coffee Meetings Ban",
        &format!("Current value: {status}\n\nClick the button to change the coffee meetings status"),
        coffee_keyboard(user.has_coffee_ban),
        AWAIT_COFFEE_BAN,
      )
      .await;
    },
  };
  ask(turn, title, &format!("{current}\n\n{call_to_action}"), back_to_edit(), next).await
}

async fn search_by_username(turn: BotTurn) -> StepResult {
  let username = normalize_username(turn.text().unwrap_or_default());
  let lookup = turn.services().users.get_by_username(&username).await;
  let found = turn
    .notify_on_error(lookup, "An error occurred while searching for the user.")
    .await?;
  match found {
    Some(user) => open_profile(&turn, &user).await,
    None => {
      turn
        .prompt(
          Prompt::html(header(
            MENU_HEADER,
            format!("User <b>{}</b> not found.\n\nTry again, or go back:", escape(&username)),
          ))
          .keyboard(back_to_menu()),
        )
        .await;
      Ok(Transition::Stay)
    },
  }
}

async fn read_tg_id(turn: &BotTurn, title: &str) -> Option<i64> {
  let input = turn.text().unwrap_or_default();
  match parse_id(input) {
    Ok(id) => Some(id),
    Err(_) => {
      turn
        .prompt(
          Prompt::html(header(
            title,
            format!(
              "Invalid ID format: <b>{}</b>. Enter a numeric Telegram user ID:",
              escape(input)
            ),
          ))
          .keyboard(back_to_menu()),
        )
        .await;
      None
    },
  }
}

async fn search_by_tg_id(turn: BotTurn) -> StepResult {
  let title = "Profile Manager → Search by ID";
  let Some(tg_id) = read_tg_id(&turn, title).await else {
    return Ok(Transition::Stay);
  };
  let lookup = turn.services().users.get_by_tg_id(tg_id).await;
  let found = turn
    .notify_on_error(lookup, "An error occurred while searching for the user.")
    .await?;
  let Some(user) = found else {
    turn
      .prompt(
        Prompt::html(header(
          title,
          format!("User with ID <b>{tg_id}</b> not found.\n\nTry again, or go back:"),
        ))
        .keyboard(back_to_menu()),
      )
      .await;
    return Ok(Transition::Stay);
  };
  open_profile(&turn, &user).await
}

async fn search_by_full_name(turn: BotTurn) -> StepResult {
  let title = "Profile Manager → Search by Name";
  let input = turn.text().unwrap_or_default().to_string();
  let words: Vec<&str> = input.split_whitespace().collect();
  let [firstname, rest @ ..] = words.as_slice() else {
    return invalid_name(&turn, title, &input).await;
  };
  if rest.is_empty() {
    return invalid_name(&turn, title, &input).await;
  }
  let lastname = rest.join(" ");

  let lookup = turn.services().users.search_by_name(firstname, &lastname).await;
  let found = turn
    .notify_on_error(lookup, "An error occurred while searching for the user.")
    .await?;
  let Some(user) = found else {
    turn
      .prompt(
        Prompt::html(header(
          title,
          format!(
            "User with name <b>{} {}</b> not found.\n\nTry again, or go back:",
            escape(firstname),
            escape(&lastname)
          ),
        ))
        .keyboard(back_to_menu()),
      )
      .await;
    return Ok(Transition::Stay);
  };
  open_profile(&turn, &user).await
}

async fn invalid_name(turn: &BotTurn, title: &str, input: &str) -> StepResult {
  turn
    .prompt(
      Prompt::html(header(
        title,
        format!(
          "Invalid name format: <b>{}</b>.\n\nPlease enter the user's first and last name separated by a space:",
          escape(input)
        ),
      ))
      .keyboard(back_to_menu()),
    )
    .await;
  Ok(Transition::Stay)
}

async fn create_from_forward(turn: BotTurn) -> StepResult {
  let author = match &turn.event().forwarded_from {
    Some(ForwardOrigin::User(author)) => author.clone(),
    other => {
      let mut text = header(
        MENU_HEADER,
        "This is not a forwarded message from a user. Please forward a message from the user for whom you want to create a profile:",
      );
      if matches!(other, Some(ForwardOrigin::HiddenUser(_))) {
        text.push_str("\n\n<i>A message from a hidden user cannot be used to create a profile.</i>");
      }
      turn.prompt(Prompt::html(text).keyboard(back_to_menu())).await;
      return Ok(Transition::Stay);
    },
  };

  let services = turn.services();
  let created = services.users.get_or_create(&author).await;
  let user = turn
    .notify_on_error(created, "An error occurred while creating the user.")
    .await?;
  let bio = turn.text().unwrap_or_default().to_string();
  let created = services.profiles.get_or_create_with_bio(user.id, &bio).await;
  turn
    .notify_on_error(created, "An error occurred while creating the profile.")
    .await?;
  info!(user_id = turn.user_id(), member_id = author.id, "profile created from forwarded message");
  open_profile(&turn, &user).await
}

async fn create_by_tg_id(turn: BotTurn) -> StepResult {
  let Some(tg_id) = read_tg_id(&turn, "Profile Manager → Create by ID").await else {
    return Ok(Transition::Stay);
  };
  let users = &turn.services().users;
  let lookup = match users.get_by_tg_id(tg_id).await {
    Ok(Some(user)) => Ok(user),
    Ok(None) => users.create(tg_id, "", "", "").await,
    Err(err) => Err(err),
  };
  let user = turn
    .notify_on_error(lookup, "An error occurred while retrieving or creating the user.")
    .await?;
  info!(user_id = turn.user_id(), member_id = tg_id, "profile opened by telegram id");
  open_profile(&turn, &user).await
}

async fn value_saved(turn: &BotTurn) -> StepResult {
  turn.delete_input().await;
  let confirmation = turn.reply(Prompt::plain("✅ Value saved successfully!")).await;
  let aborted = tokio::select! {
    biased;
    () = turn.cancellation().cancelled() => true,
    () = tokio::time::sleep(turn.services().settings.refresh_delay) => false,
  };
  if let Some(message) = confirmation {
    turn.delete(message).await;
  }
  if aborted {
    info!(user_id = turn.user_id(), "profile manager closed during refresh delay");
    return Ok(Transition::End);
  }
  show_edit_menu(turn).await
}

async fn update_user(turn: &BotTurn, change: UserChange) -> StepResult {
  let Some(user_id) = turn.get_int(USER_ID_KEY) else {
    return lost_context(turn, USER_ID_KEY, commands::PROFILES_MANAGER).await;
  };
  let updated = turn.services().users.update(user_id, change).await;
  turn
    .notify_on_error(updated, "An error occurred while saving the value.")
    .await?;
  info!(user_id = turn.user_id(), member_id = user_id, "member record updated");
  value_saved(turn).await
}

async fn too_long(turn: &BotTurn, title: &str, message: String) -> StepResult {
  turn
    .prompt(Prompt::html(header(title, message)).keyboard(back_to_edit()))
    .await;
  Ok(Transition::Stay)
}

async fn save_firstname(turn: BotTurn) -> StepResult {
  let value = turn.text().unwrap_or_default().to_string();
  if value.chars().count() > MAX_NAME_LEN {
    return too_long(
      &turn,
      "Profile Manager → Edit → First Name",
      format!("First name is too long. Please enter a shorter first name (no more than {MAX_NAME_LEN} characters):"),
    )
    .await;
  }
  update_user(&turn, UserChange::Firstname(value)).await
}

async fn save_lastname(turn: BotTurn) -> StepResult {
  let value = turn.text().unwrap_or_default().to_string();
  if value.chars().count() > MAX_NAME_LEN {
    return too_long(
      &turn,
      "Profile Manager → Edit → Last Name",
      format!("Last name is too long. Please enter a shorter last name (no more than {MAX_NAME_LEN} characters):"),
    )
    .await;
  }
  update_user(&turn, UserChange::Lastname(value)).await
}

async fn save_username(turn: BotTurn) -> StepResult {
  let value = normalize_username(turn.text().unwrap_or_default());
  if value.chars().count() > MAX_USERNAME_LEN {
    return too_long(
      &turn,
      "Profile Manager → Edit → Username",
      format!("Username is too long. Please enter a shorter username (no more than {MAX_USERNAME_LEN} characters):"),
    )
    .await;
  }
  update_user(&turn, UserChange::Username(value)).await
}

async fn save_bio(turn: BotTurn) -> StepResult {
  let bio = turn.text().unwrap_or_default().to_string();
  let limit = turn.services().settings.bio_limit;
  let length = utf16_len(&bio);
  if length > limit {
    return too_long(
      &turn,
      "Profile Manager → Edit → Bio",
      format!("Current length: {length} characters\n\nPlease shorten to {limit} characters and send again:"),
    )
    .await;
  }
  let Some(profile_id) = turn.get_int(PROFILE_ID_KEY) else {
    return lost_context(&turn, PROFILE_ID_KEY, commands::PROFILES_MANAGER).await;
  };
  let updated = turn.services().profiles.update_bio(profile_id, &bio).await;
  turn
    .notify_on_error(updated, "An error occurred while saving the value.")
    .await?;
  info!(user_id = turn.user_id(), profile_id, length, "member bio updated");
  value_saved(&turn).await
}

async fn toggle_coffee_ban(turn: &BotTurn) -> StepResult {
  let Some((user, _)) = selected(turn).await? else {
    return lost_context(turn, USER_ID_KEY, commands::PROFILES_MANAGER).await;
  };
  update_user(turn, UserChange::CoffeeBan(!user.has_coffee_ban)).await
}

async fn publish(turn: &BotTurn, without_preview: bool) -> StepResult {
  let Some((user, profile)) = selected(turn).await? else {
    return lost_context(turn, USER_ID_KEY, commands::PROFILES_MANAGER).await;
  };
  let settings = &turn.services().settings;
  let published = publish_profile(turn, &user, &profile, without_preview).await;
  let published = turn
    .notify_on_error(published, "An error occurred while publishing the profile.")
    .await?;

  let body = match published {
    Some(message_id) => {
      info!(user_id = turn.user_id(), member_id = user.tg_id, message_id, "profile published by admin");
      format!("✅ User profile successfully published!{}", published_notice(settings, message_id))
    },
    None => {
      let missing = format::missing_fields(&user, &profile)
        .into_iter()
        .map(|field| format!("└ ❌ {field}"))
        .collect::<Vec<_>>()
        .join("\n");
      format!(
        "⚠️ The user profile is incomplete.\n\nTo publish it in the \"<a href='{}'>Intro</a>\" channel, the following must be provided:\n{missing}",
        format::intro_topic_link(settings)
      )
    },
  };
  turn
    .prompt(
      Prompt::html(header(PUBLISH_HEADER, body))
        .keyboard(back_to_edit())
        .without_preview(true),
    )
    .await;
  Ok(Transition::Advance(EDIT_PROFILE))
}
