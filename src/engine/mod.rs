//! Conversation engine shared by every wizard.
//!
//! The [`SessionStore`] remembers which wizard and state each user is in, the
//! [`Registry`] holds the validated state tables, and the [`Dispatcher`] routes
//! one inbound event to one handler and applies the [`Transition`] it returns.

mod cleanup;
pub mod dispatcher;
pub mod event;
pub mod registry;
pub mod session;
pub mod transport;
pub mod turn;

pub type WizardId = &'static str;
pub type StateId = &'static str;

pub const CANCEL_COMMAND: &str = "cancel";

pub use dispatcher::DispatchError;
pub use dispatcher::DispatchOutcome;
pub use dispatcher::Dispatcher;
pub use event::ForwardOrigin;
pub use event::InboundEvent;
pub use event::Payload;
pub use event::Sender;
pub use registry::CleanupPolicy;
pub use registry::Matcher;
pub use registry::Registry;
pub use registry::RegistryError;
pub use registry::Transition;
pub use registry::WizardDefinition;
pub use session::SessionStore;
pub use session::SessionValue;
pub use transport::Button;
pub use transport::Keyboard;
pub use transport::MessageRef;
pub use transport::Prompt;
pub use transport::TextFormat;
pub use transport::Transport;
pub use transport::TransportError;
pub use turn::Turn;
