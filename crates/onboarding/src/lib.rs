//! Business-number onboarding wizard.
//!
//! Flow: welcome → country → number → business type → business search →
//! submit → success or error.

pub mod error;
pub mod form;
pub mod service;
pub mod state;
pub mod submission;
pub mod wizard;

pub use {
    error::{Context, Error, Result},
    form::{BusinessInfo, FormData, FormUpdate},
    service::{OnboardingService, WizardSnapshot},
    state::{SubmissionPhase, SubmissionState, WizardController, WizardPhase, WizardStep},
    submission::{HttpTransport, SubmissionFailure, SubmissionResult, Submitter},
};
