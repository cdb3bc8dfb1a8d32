use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::engine::StateId;
use crate::engine::WizardId;
use crate::engine::event::InboundEvent;
use crate::engine::registry::Handler;
use crate::engine::registry::Registry;
use crate::engine::registry::Transition;
use crate::engine::registry::WizardDefinition;
use crate::engine::session::Position;
use crate::engine::session::SessionStore;
use crate::engine::session::UserId;
use crate::engine::transport::Transport;
use crate::engine::turn::Turn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
  Ignored,
  Handled { wizard: WizardId, transition: Transition },
}

#[derive(Debug, Error)]
pub enum DispatchError {
  #[error(transparent)]
  Handler(#[from] anyhow::Error),
  #[error("wizard {wizard} has no state named {state}")]
  UndeclaredState { wizard: WizardId, state: StateId },
}

pub struct Dispatcher<C> {
  registry: Arc<Registry<C>>,
  sessions: SessionStore,
  transport: Arc<dyn Transport>,
  services: Arc<C>,
}

impl<C> Clone for Dispatcher<C> {
  fn clone(&self) -> Self {
    Self {
      registry: self.registry.clone(),
      sessions: self.sessions.clone(),
      transport: self.transport.clone(),
      services: self.services.clone(),
    }
  }
}

impl<C: Send + Sync + 'static> Dispatcher<C> {
  pub fn new(registry: Registry<C>, sessions: SessionStore, transport: Arc<dyn Transport>, services: Arc<C>) -> Self {
    Self {
      registry: Arc::new(registry),
      sessions,
      transport,
      services,
    }
  }

  pub fn sessions(&self) -> &SessionStore {
    &self.sessions
  }

  /// Signals the user's in-flight handler, if any, to stop waiting.
  pub fn abort(&self, user_id: UserId) -> bool {
    self.sessions.abort(user_id)
  }

  #[instrument(skip(self, event), fields(user_id = event.user_id(), chat_id = event.chat_id))]
  pub async fn dispatch(&self, event: InboundEvent) -> Result<DispatchOutcome, DispatchError> {
    let callback_id = event.callback_id().map(str::to_string);
    let outcome = self.route(event).await;

    if let Some(id) = callback_id
      && let Err(err) = self.transport.answer_callback(&id).await
    {
      warn!(callback_id = %id, error = %err, "failed to answer callback query");
    }

    outcome
  }

  async fn route(&self, event: InboundEvent) -> Result<DispatchOutcome, DispatchError> {
    let user_id = event.user_id();
    let Some(position) = self.sessions.position(user_id) else {
      return match self.registry.entry_for(&event) {
        Some(wizard) => self.start(wizard, event).await,
        None => {
          debug!(user_id, "no active wizard, event ignored");
          Ok(DispatchOutcome::Ignored)
        },
      };
    };

    let Some(wizard) = self.registry.wizard(position.wizard) else {
      warn!(user_id, wizard = position.wizard, "session points at an unregistered wizard");
      self.sessions.clear(user_id);
      return Ok(DispatchOutcome::Ignored);
    };

    let routes = self.registry.lookup(position.wizard, position.state).unwrap_or_default();
    let matched = routes.iter().find(|route| route.matcher.matches(&event));

    let handler = match (matched, self.registry.entry_for(&event)) {
      (Some(route), _) if route.exit => route.handler.clone(),
      (_, Some(next)) => {
        info!(user_id, from = wizard.name(), to = next.name(), "entry command restarts session");
        self.sessions.abort(user_id);
        return self.start(next, event).await;
      },
      (Some(route), None) => route.handler.clone(),
      (None, None) => match wizard.fallback_handler() {
        Some(fallback) => fallback.clone(),
        None => {
          debug!(user_id, wizard = wizard.name(), state = position.state, "no route matched");
          return Ok(DispatchOutcome::Ignored);
        },
      },
    };

    self.run(wizard, Some(position), handler, event).await
  }

  async fn start(&self, wizard: &WizardDefinition<C>, event: InboundEvent) -> Result<DispatchOutcome, DispatchError> {
    let user_id = event.user_id();
    self.sessions.clear(user_id);
    info!(user_id, wizard = wizard.name(), "starting wizard");
    let outcome = self.run(wizard, None, wizard.entry().clone(), event).await;
    if outcome.is_err() {
      self.sessions.clear(user_id);
    }
    outcome
  }

  async fn run(
    &self,
    wizard: &WizardDefinition<C>,
    position: Option<Position>,
    handler: Handler<C>,
    event: InboundEvent,
  ) -> Result<DispatchOutcome, DispatchError> {
    let user_id = event.user_id();
    let turn = Turn::new(
      self.services.clone(),
      event,
      self.sessions.clone(),
      self.transport.clone(),
      wizard.cleanup_policy(),
    );

    let cancel = turn.cancellation().clone();

    let transition = handler(turn).await.map_err(|err| {
      warn!(user_id, wizard = wizard.name(), state = ?position.map(|p| p.state), error = %err, "wizard handler failed");
      DispatchError::Handler(err)
    })?;

    // The session was cancelled or restarted while the handler ran.
    if cancel.is_cancelled() {
      if transition != Transition::End {
        debug!(user_id, wizard = wizard.name(), ?transition, "session aborted, transition dropped");
      }
      self.sessions.discard_aborted(user_id);
      return Ok(DispatchOutcome::Handled {
        wizard: wizard.name(),
        transition: Transition::End,
      });
    }

    match transition {
      Transition::Advance(state) => {
        if !wizard.has_state(state) {
          error!(user_id, wizard = wizard.name(), state, "handler advanced to an undeclared state");
          return Err(DispatchError::UndeclaredState {
            wizard: wizard.name(),
            state,
          });
        }
        match position {
          Some(_) => {
            if !self.sessions.advance(user_id, wizard.name(), state) {
              debug!(user_id, wizard = wizard.name(), state, "session ended while handler ran");
            }
          },
          None => self.sessions.enter(user_id, Position {
            wizard: wizard.name(),
            state,
          }),
        }
      },
      // A wizard that has not entered any state has nothing to stay in.
      Transition::Stay if position.is_none() => self.sessions.clear(user_id),
      Transition::Stay => {},
      Transition::End => self.sessions.clear(user_id),
    }

    debug!(user_id, wizard = wizard.name(), ?transition, "transition applied");
    Ok(DispatchOutcome::Handled {
      wizard: wizard.name(),
      transition,
    })
  }
}
