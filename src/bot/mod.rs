pub mod access;
pub mod commands;
pub mod context;
pub mod format;
pub mod keyboards;
pub mod publish;
pub mod telegram;
pub mod wizards;

use crate::engine::Transition;
use crate::engine::Turn;
use crate::engine::WizardDefinition;

pub type BotTurn = Turn<AppContext>;
pub type BotWizard = WizardDefinition<AppContext>;
pub type StepResult = anyhow::Result<Transition>;

pub use commands::Command;
pub use context::AppContext;
