//! Shared onboarding service: one controller behind one lock.
//!
//! Hosts that drive the wizard from several tasks go through this type so
//! every mutation is serialized. The lock is released while a submission is
//! in flight; the controller's own guard rejects a second submit meanwhile.

use {serde::Serialize, tokio::sync::Mutex, tracing::info};

use crate::{
    error::Result,
    form::{FormData, FormUpdate},
    state::{SubmissionState, WizardController, WizardPhase, WizardStep},
    submission::Submitter,
};

/// Everything a view needs to render the current screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    /// Serialized as `not_started`, `in_progress`, `submitting`, `success`
    /// or `error`.
    pub phase: WizardPhase,
    pub step: Option<WizardStep>,
    pub step_number: Option<usize>,
    pub total_steps: usize,
    pub prompt: Option<&'static str>,
    pub can_advance: bool,
    pub form: FormData,
    pub submission: SubmissionState,
}

impl WizardSnapshot {
    fn of(controller: &WizardController) -> Self {
        let phase = controller.phase();
        let step = match phase {
            WizardPhase::InProgress(step) => Some(step),
            _ => None,
        };
        Self {
            phase,
            step,
            step_number: step.map(WizardStep::number),
            total_steps: WizardStep::COUNT,
            prompt: step.map(WizardStep::prompt),
            can_advance: controller.can_advance(),
            form: controller.form().clone(),
            submission: controller.submission().clone(),
        }
    }
}

/// Live onboarding service backed by a [`WizardController`] and a
/// [`Submitter`].
#[derive(Debug)]
pub struct OnboardingService {
    controller: Mutex<WizardController>,
    submitter: Submitter,
}

impl OnboardingService {
    pub fn new(submitter: Submitter) -> Self {
        Self {
            controller: Mutex::new(WizardController::new()),
            submitter,
        }
    }

    pub async fn status(&self) -> WizardSnapshot {
        WizardSnapshot::of(&*self.controller.lock().await)
    }

    pub async fn start(&self) -> Result<WizardSnapshot> {
        let mut c = self.controller.lock().await;
        c.start()?;
        info!("onboarding started");
        Ok(WizardSnapshot::of(&c))
    }

    pub async fn update(&self, update: FormUpdate) -> Result<WizardSnapshot> {
        let mut c = self.controller.lock().await;
        c.update(update)?;
        Ok(WizardSnapshot::of(&c))
    }

    /// Advance to the next step.
    pub async fn next(&self) -> Result<WizardSnapshot> {
        let mut c = self.controller.lock().await;
        c.advance()?;
        Ok(WizardSnapshot::of(&c))
    }

    /// Go back one step.
    pub async fn back(&self) -> Result<WizardSnapshot> {
        let mut c = self.controller.lock().await;
        c.retreat()?;
        Ok(WizardSnapshot::of(&c))
    }

    /// Submit the form. Request failures show up in the returned snapshot's
    /// error phase; `Err` is reserved for calls the wizard cannot accept.
    pub async fn submit(&self) -> Result<WizardSnapshot> {
        let ticket = self.controller.lock().await.begin_submission()?;

        let outcome = self.submitter.submit(&ticket.form).await;

        let mut c = self.controller.lock().await;
        if !c.finish_submission(&ticket, outcome) {
            info!(
                attempt = ticket.attempt(),
                "wizard was reset during submission"
            );
        }
        Ok(WizardSnapshot::of(&c))
    }

    pub async fn retry(&self) -> Result<WizardSnapshot> {
        let mut c = self.controller.lock().await;
        c.retry()?;
        Ok(WizardSnapshot::of(&c))
    }

    /// Start over. Does not cancel a submission already in flight.
    pub async fn reset(&self) -> WizardSnapshot {
        let mut c = self.controller.lock().await;
        c.reset();
        info!("onboarding reset");
        WizardSnapshot::of(&c)
    }
}
