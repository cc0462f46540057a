use crate::state::{WizardPhase, WizardStep};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot {action} while the wizard is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: WizardPhase,
    },
    #[error("{step} step is incomplete: {field} is required")]
    StepIncomplete {
        step: WizardStep,
        field: &'static str,
    },
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    pub(crate) fn invalid(action: &'static str, phase: WizardPhase) -> Self {
        Self::InvalidTransition { action, phase }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// `.context()` for foreign results: the message is prefixed to the source.
pub trait Context<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        let ctx = context.into();
        self.map_err(|source| Error::message(format!("{ctx}: {source}")))
    }
}
