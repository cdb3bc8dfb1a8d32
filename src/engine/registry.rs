//! Static wizard tables.
//!
//! Each wizard is described once at startup: the command that starts it, its
//! named states with ordered `(matcher, handler)` routes, and global exits that
//! are tried before any state route. [`Registry::register`] rejects tables that
//! are internally inconsistent.

use std::collections::HashMap;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::engine::CANCEL_COMMAND;
use crate::engine::StateId;
use crate::engine::WizardId;
use crate::engine::cleanup;
use crate::engine::event::InboundEvent;
use crate::engine::event::Payload;
use crate::engine::turn::Turn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  Advance(StateId),
  Stay,
  End,
}

pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Transition>>;
pub type Handler<C> = Arc<dyn Fn(Turn<C>) -> HandlerFuture + Send + Sync>;

pub fn handler<C, F, Fut>(f: F) -> Handler<C>
where
  C: Send + Sync + 'static,
  F: Fn(Turn<C>) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = anyhow::Result<Transition>> + Send + 'static,
{
  Arc::new(move |turn: Turn<C>| -> HandlerFuture { Box::pin(f(turn)) })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
  Command(&'static str),
  /// Any message that carries text, commands included.
  Text,
  AnyMessage,
  Callback(&'static str),
  CallbackPrefix(&'static str),
}

impl Matcher {
  pub fn matches(&self, event: &InboundEvent) -> bool {
    match self {
      Self::Command(name) => event.is_command(name),
      Self::Text => event.message_text().is_some(),
      Self::AnyMessage => matches!(event.payload, Payload::Message { .. }),
      Self::Callback(data) => event.callback_data() == Some(*data),
      Self::CallbackPrefix(prefix) => event.callback_data().is_some_and(|data| data.starts_with(prefix)),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CleanupPolicy {
  #[default]
  Delete,
  StripKeyboard,
}

pub struct Route<C> {
  pub matcher: Matcher,
  pub handler: Handler<C>,
  pub exit: bool,
}

pub struct StateBuilder<C> {
  routes: Vec<Route<C>>,
  targets: Vec<StateId>,
}

impl<C: Send + Sync + 'static> StateBuilder<C> {
  pub fn on<F, Fut>(mut self, matcher: Matcher, f: F) -> Self
  where
    F: Fn(Turn<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Transition>> + Send + 'static,
  {
    self.routes.push(Route {
      matcher,
      handler: handler(f),
      exit: false,
    });
    self
  }

  /// States this state's handlers may advance to.
  pub fn to(mut self, targets: &[StateId]) -> Self {
    self.targets.extend_from_slice(targets);
    self
  }
}

pub struct WizardDefinition<C> {
  name: WizardId,
  command: &'static str,
  entry: Handler<C>,
  states: Vec<(StateId, Vec<Route<C>>)>,
  targets: Vec<StateId>,
  exits: Vec<Route<C>>,
  fallback: Option<Handler<C>>,
  cleanup: CleanupPolicy,
}

impl<C: Send + Sync + 'static> WizardDefinition<C> {
  pub fn new<F, Fut>(name: WizardId, command: &'static str, entry: F) -> Self
  where
    F: Fn(Turn<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Transition>> + Send + 'static,
  {
    Self {
      name,
      command,
      entry: handler(entry),
      states: Vec::new(),
      targets: Vec::new(),
      exits: Vec::new(),
      fallback: None,
      cleanup: CleanupPolicy::default(),
    }
  }

  pub fn cleanup(mut self, policy: CleanupPolicy) -> Self {
    self.cleanup = policy;
    self
  }

  pub fn enters(mut self, targets: &[StateId]) -> Self {
    self.targets.extend_from_slice(targets);
    self
  }

  pub fn state(mut self, name: StateId, build: impl FnOnce(StateBuilder<C>) -> StateBuilder<C>) -> Self {
    let state = build(StateBuilder {
      routes: Vec::new(),
      targets: Vec::new(),
    });
    self.states.push((name, state.routes));
    self.targets.extend(state.targets);
    self
  }

  pub fn exit<F, Fut>(mut self, matcher: Matcher, f: F) -> Self
  where
    F: Fn(Turn<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Transition>> + Send + 'static,
  {
    self.exits.push(Route {
      matcher,
      handler: handler(f),
      exit: true,
    });
    self
  }

  /// Wires `/cancel` and, when given, a cancel button as global exits.
  pub fn cancellable(mut self, button: Option<&'static str>, notice: &'static str) -> Self {
    let mut matchers = vec![Matcher::Command(CANCEL_COMMAND)];
    matchers.extend(button.map(Matcher::Callback));
    for matcher in matchers {
      self.exits.push(Route {
        matcher,
        handler: cleanup::cancel_handler(notice),
        exit: true,
      });
    }
    self
  }

  pub fn fallback<F, Fut>(mut self, f: F) -> Self
  where
    F: Fn(Turn<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Transition>> + Send + 'static,
  {
    self.fallback = Some(handler(f));
    self
  }
}

impl<C> WizardDefinition<C> {
  pub fn name(&self) -> WizardId {
    self.name
  }

  pub fn command(&self) -> &'static str {
    self.command
  }

  pub fn entry(&self) -> &Handler<C> {
    &self.entry
  }

  pub fn fallback_handler(&self) -> Option<&Handler<C>> {
    self.fallback.as_ref()
  }

  pub fn cleanup_policy(&self) -> CleanupPolicy {
    self.cleanup
  }

  pub fn has_state(&self, state: &str) -> bool {
    self.states.iter().any(|(name, _)| *name == state)
  }

  pub fn state_names(&self) -> impl Iterator<Item = StateId> + '_ {
    self.states.iter().map(|(name, _)| *name)
  }

  fn routes(&self, state: &str) -> Option<&[Route<C>]> {
    self
      .states
      .iter()
      .find(|(name, _)| *name == state)
      .map(|(_, routes)| routes.as_slice())
  }

  fn commands(&self) -> impl Iterator<Item = &'static str> + '_ {
    let routed = self
      .exits
      .iter()
      .chain(self.states.iter().flat_map(|(_, routes)| routes.iter()))
      .filter_map(|route| match route.matcher {
        Matcher::Command(name) => Some(name),
        _ => None,
      });
    std::iter::once(self.command).chain(routed)
  }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
  #[error("wizard {0} is already registered")]
  DuplicateWizard(WizardId),
  #[error("command /{command} already starts wizard {wizard}")]
  DuplicateEntry { command: String, wizard: WizardId },
  #[error("wizard {wizard} declares state {state} more than once")]
  DuplicateState { wizard: WizardId, state: StateId },
  #[error("wizard {wizard} references unknown command /{command}")]
  UnknownCommand { wizard: WizardId, command: String },
  #[error("wizard {wizard} advances to undeclared state {state}")]
  UnknownState { wizard: WizardId, state: StateId },
}

pub struct Registry<C> {
  known_commands: HashSet<String>,
  wizards: Vec<WizardDefinition<C>>,
  by_name: HashMap<WizardId, usize>,
}

impl<C> Registry<C> {
  /// `known_commands` is the full command vocabulary of the bot; entries and
  /// exits may only use commands from it.
  pub fn new<'a>(known_commands: impl IntoIterator<Item = &'a str>) -> Self {
    Self {
      known_commands: known_commands.into_iter().map(|c| c.to_ascii_lowercase()).collect(),
      wizards: Vec::new(),
      by_name: HashMap::new(),
    }
  }

  pub fn register(&mut self, wizard: WizardDefinition<C>) -> Result<(), RegistryError> {
    if self.by_name.contains_key(wizard.name) {
      return Err(RegistryError::DuplicateWizard(wizard.name));
    }

    if let Some(existing) = self
      .wizards
      .iter()
      .find(|other| other.command.eq_ignore_ascii_case(wizard.command))
    {
      return Err(RegistryError::DuplicateEntry {
        command: wizard.command.to_string(),
        wizard: existing.name,
      });
    }

    let mut seen = HashSet::new();
    for state in wizard.state_names() {
      if !seen.insert(state) {
        return Err(RegistryError::DuplicateState {
          wizard: wizard.name,
          state,
        });
      }
    }

    if let Some(&state) = wizard.targets.iter().find(|target| !wizard.has_state(target)) {
      return Err(RegistryError::UnknownState {
        wizard: wizard.name,
        state,
      });
    }

    if let Some(command) = wizard
      .commands()
      .find(|command| !self.known_commands.contains(&command.to_ascii_lowercase()))
    {
      return Err(RegistryError::UnknownCommand {
        wizard: wizard.name,
        command: command.to_string(),
      });
    }

    self.by_name.insert(wizard.name, self.wizards.len());
    self.wizards.push(wizard);
    Ok(())
  }

  pub fn wizard(&self, name: &str) -> Option<&WizardDefinition<C>> {
    self.by_name.get(name).map(|&index| &self.wizards[index])
  }

  /// Global exits first, then the state's own routes, both in declaration order.
  pub fn lookup(&self, wizard: &str, state: &str) -> Option<Vec<&Route<C>>> {
    let definition = self.wizard(wizard)?;
    let routes = definition.routes(state)?;
    Some(definition.exits.iter().chain(routes.iter()).collect())
  }

  pub fn entry_for(&self, event: &InboundEvent) -> Option<&WizardDefinition<C>> {
    let command = event.command()?;
    self
      .wizards
      .iter()
      .find(|wizard| wizard.command.eq_ignore_ascii_case(command))
  }

  pub fn wizards(&self) -> impl Iterator<Item = &WizardDefinition<C>> {
    self.wizards.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::Matcher;
  use super::Registry;
  use super::RegistryError;
  use super::Transition;
  use super::WizardDefinition;
  use crate::engine::event::InboundEvent;
  use crate::engine::event::Sender;
  use crate::engine::turn::Turn;

  type Ctx = ();

  async fn stay(_: Turn<Ctx>) -> anyhow::Result<Transition> {
    Ok(Transition::Stay)
  }

  fn sender() -> Sender {
    Sender {
      id: 1,
      ..Sender::default()
    }
  }

  fn wizard(name: &'static str, command: &'static str) -> WizardDefinition<Ctx> {
    WizardDefinition::new(name, command, stay)
      .enters(&["first"])
      .state("first", |s| {
        s.on(Matcher::Callback("pick"), stay)
          .on(Matcher::Text, stay)
          .to(&["second"])
      })
      .state("second", |s| s.on(Matcher::Text, stay))
      .cancellable(Some("cancel_button"), "Canceled.")
  }

  #[test]
  fn rejects_transitions_to_undeclared_states() {
    let mut registry = Registry::new(["setup", "cancel"]);
    let typo = WizardDefinition::new("setup", "setup", stay)
      .enters(&["ask_name"])
      .state("ask_name", |s| s.on(Matcher::Text, stay).to(&["ask_tpye"]))
      .state("ask_type", |s| s.on(Matcher::Text, stay));
    assert_eq!(
      registry.register(typo),
      Err(RegistryError::UnknownState {
        wizard: "setup",
        state: "ask_tpye"
      })
    );

    let bad_entry = WizardDefinition::new("setup", "setup", stay).enters(&["missing"]);
    assert!(matches!(
      registry.register(bad_entry),
      Err(RegistryError::UnknownState { state: "missing", .. })
    ));
    assert!(registry.register(wizard("setup", "setup")).is_ok());
  }

  #[test]
  fn rejects_duplicate_states() {
    let mut registry = Registry::new(["setup", "cancel"]);
    let broken = WizardDefinition::new("setup", "setup", stay)
      .state("ask", |s| s)
      .state("ask", |s| s);
    assert_eq!(
      registry.register(broken),
      Err(RegistryError::DuplicateState {
        wizard: "setup",
        state: "ask"
      })
    );
  }

  #[test]
  fn rejects_unknown_commands() {
    let mut registry = Registry::new(["setup"]);
    let result = registry.register(wizard("setup", "setup"));
    assert_eq!(
      result,
      Err(RegistryError::UnknownCommand {
        wizard: "setup",
        command: "cancel".into()
      })
    );

    let mut registry = Registry::new(["cancel"]);
    assert!(matches!(
      registry.register(wizard("setup", "setup")),
      Err(RegistryError::UnknownCommand { .. })
    ));
  }

  #[test]
  fn rejects_duplicate_wizards_and_entries() {
    let mut registry = Registry::new(["setup", "edit", "cancel"]);
    registry.register(wizard("setup", "setup")).unwrap();
    assert_eq!(
      registry.register(wizard("setup", "edit")),
      Err(RegistryError::DuplicateWizard("setup"))
    );
    assert!(matches!(
      registry.register(wizard("other", "SETUP")),
      Err(RegistryError::DuplicateEntry { .. })
    ));
  }

  #[test]
  fn lookup_lists_exits_before_state_routes() {
    let mut registry = Registry::new(["setup", "cancel"]);
    registry.register(wizard("setup", "setup")).unwrap();

    let routes = registry.lookup("setup", "first").unwrap();
    let matchers: Vec<Matcher> = routes.iter().map(|route| route.matcher).collect();
    assert_eq!(matchers, vec![
      Matcher::Command("cancel"),
      Matcher::Callback("cancel_button"),
      Matcher::Callback("pick"),
      Matcher::Text,
    ]);
    assert!(routes[0].exit && routes[1].exit && !routes[2].exit);

    assert!(registry.lookup("setup", "missing").is_none());
    assert!(registry.lookup("missing", "first").is_none());
  }

  #[test]
  fn states_are_scoped_by_wizard() {
    let mut registry = Registry::new(["setup", "edit", "cancel"]);
    registry.register(wizard("setup", "setup")).unwrap();
    registry
      .register(WizardDefinition::new("edit", "edit", stay).state("first", |s| s.on(Matcher::AnyMessage, stay)))
      .unwrap();

    let setup = registry.lookup("setup", "first").unwrap();
    let edit = registry.lookup("edit", "first").unwrap();
    assert_eq!(setup.len(), 4);
    assert_eq!(edit.len(), 1);
    assert_eq!(edit[0].matcher, Matcher::AnyMessage);
  }

  #[test]
  fn finds_entry_wizard_by_command() {
    let mut registry = Registry::new(["setup", "cancel"]);
    registry.register(wizard("setup", "setup")).unwrap();

    let entry = InboundEvent::text(sender(), 1, 1, "/Setup");
    assert_eq!(registry.entry_for(&entry).map(|w| w.name()), Some("setup"));

    let text = InboundEvent::text(sender(), 1, 2, "setup");
    assert!(registry.entry_for(&text).is_none());
  }

  #[test]
  fn matchers_distinguish_payloads() {
    let text = InboundEvent::text(sender(), 1, 1, "/cancel now");
    let callback = InboundEvent::callback(sender(), 1, Some(5), "q1", "profile_edit_bio");

    assert!(Matcher::Command("cancel").matches(&text));
    assert!(Matcher::Text.matches(&text));
    assert!(Matcher::AnyMessage.matches(&text));
    assert!(!Matcher::Callback("profile_edit_bio").matches(&text));

    assert!(Matcher::Callback("profile_edit_bio").matches(&callback));
    assert!(Matcher::CallbackPrefix("profile_").matches(&callback));
    assert!(!Matcher::Text.matches(&callback));
    assert!(!Matcher::AnyMessage.matches(&callback));
  }
}
