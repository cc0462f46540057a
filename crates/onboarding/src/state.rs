//! Pure state machine for the onboarding wizard. No I/O.
//!
//! `NotStarted → InProgress(step) → Submitting → Success | Error`, with
//! `Error → InProgress(last)` on retry and any phase back to `NotStarted` on
//! reset.

use std::fmt;

use {
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::{
    error::{Error, Result},
    form::{FormData, FormUpdate},
    submission::{SubmissionFailure, SubmissionResult},
};

/// Steps in the onboarding wizard, in order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Country,
    Number,
    BusinessType,
    BusinessSearch,
}

impl WizardStep {
    pub const ALL: [Self; 4] = [
        Self::Country,
        Self::Number,
        Self::BusinessType,
        Self::BusinessSearch,
    ];
    pub const COUNT: usize = Self::ALL.len();
    pub const FIRST: Self = Self::Country;
    pub const LAST: Self = Self::BusinessSearch;

    /// 1-based position, as shown in "Step n of 4".
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn from_number(number: usize) -> Option<Self> {
        number
            .checked_sub(1)
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn prev(self) -> Option<Self> {
        Self::from_number(self.number() - 1)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Country => "Country",
            Self::Number => "Number",
            Self::BusinessType => "Business type",
            Self::BusinessSearch => "Business",
        }
    }

    /// The prompt text to display for this step.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Country => "Which country will your business number be in?",
            Self::Number => "Pick the phone number you want to use:",
            Self::BusinessType => "What type of business do you run?",
            Self::BusinessSearch => "Find your business:",
        }
    }

    /// Name of the form field this step requires, in payload spelling.
    pub fn required_field(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Number => "selectedNumber",
            Self::BusinessType => "businessType",
            Self::BusinessSearch => "businessSearch.name",
        }
    }

    /// Whether `form` carries a non-blank value for this step's field.
    pub fn is_satisfied_by(self, form: &FormData) -> bool {
        let value = match self {
            Self::Country => Some(form.country.as_str()),
            Self::Number => Some(form.selected_number.as_str()),
            Self::BusinessType => Some(form.business_type.as_str()),
            Self::BusinessSearch => form.business_name(),
        };
        value.is_some_and(|v| !v.trim().is_empty())
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Submission lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    #[default]
    Idle,
    Submitting,
    Success,
    Error,
}

/// Outcome fields of the current submission attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionState {
    pub phase: SubmissionPhase,
    /// Set only in [`SubmissionPhase::Error`].
    pub error_message: Option<String>,
    /// Set only in [`SubmissionPhase::Success`].
    pub generated_number: Option<String>,
    /// Set only in [`SubmissionPhase::Success`].
    pub agent_name: Option<String>,
}

impl SubmissionState {
    fn submitting() -> Self {
        Self {
            phase: SubmissionPhase::Submitting,
            ..Self::default()
        }
    }

    fn succeeded(result: SubmissionResult) -> Self {
        Self {
            phase: SubmissionPhase::Success,
            error_message: None,
            generated_number: Some(result.generated_number),
            agent_name: Some(result.agent_name),
        }
    }

    fn failed(message: String) -> Self {
        Self {
            phase: SubmissionPhase::Error,
            error_message: Some(message),
            ..Self::default()
        }
    }
}

/// Overall wizard phase, derived from the controller's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardPhase {
    NotStarted,
    InProgress(WizardStep),
    Submitting,
    Success,
    Error,
}

impl WizardPhase {
    pub fn name(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress(_) => "in_progress",
            Self::Submitting => "submitting",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Serialized as its [`WizardPhase::name`]; the active step is reported
/// separately.
impl Serialize for WizardPhase {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

impl fmt::Display for WizardPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::InProgress(step) => write!(
                f,
                "in progress (step {} of {})",
                step.number(),
                WizardStep::COUNT
            ),
            Self::Submitting => write!(f, "submitting"),
            Self::Success => write!(f, "finished"),
            Self::Error => write!(f, "showing an error"),
        }
    }
}

/// Handed out by [`WizardController::begin_submission`]. Carries the payload
/// to send and identifies the attempt, so a result that arrives after a
/// reset is recognised as stale.
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    attempt: u64,
    pub form: FormData,
}

impl SubmissionTicket {
    pub fn attempt(&self) -> u64 {
        self.attempt
    }
}

/// Owns the form and the step/submission state.
#[derive(Debug, Clone, Default)]
pub struct WizardController {
    started: bool,
    step: WizardStep,
    form: FormData,
    submission: SubmissionState,
    /// Monotonic across resets.
    attempt: u64,
}

impl WizardController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> WizardPhase {
        if !self.started {
            return WizardPhase::NotStarted;
        }
        match self.submission.phase {
            SubmissionPhase::Idle => WizardPhase::InProgress(self.step),
            SubmissionPhase::Submitting => WizardPhase::Submitting,
            SubmissionPhase::Success => WizardPhase::Success,
            SubmissionPhase::Error => WizardPhase::Error,
        }
    }

    /// The active step, or `None` before the wizard is started.
    pub fn step(&self) -> Option<WizardStep> {
        self.started.then_some(self.step)
    }

    pub fn form(&self) -> &FormData {
        &self.form
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    pub fn is_step_valid(&self, step: WizardStep) -> bool {
        step.is_satisfied_by(&self.form)
    }

    /// Whether the primary action (next, or submit on the last step) is
    /// currently allowed.
    pub fn can_advance(&self) -> bool {
        matches!(self.phase(), WizardPhase::InProgress(step) if self.is_step_valid(step))
    }

    fn require_in_progress(&self, action: &'static str) -> Result<WizardStep> {
        match self.phase() {
            WizardPhase::InProgress(step) => Ok(step),
            phase => Err(Error::invalid(action, phase)),
        }
    }

    fn require_valid(&self, step: WizardStep) -> Result<()> {
        if self.is_step_valid(step) {
            Ok(())
        } else {
            Err(Error::StepIncomplete {
                step,
                field: step.required_field(),
            })
        }
    }

    /// Leave the welcome screen and open the first step with an empty form.
    pub fn start(&mut self) -> Result<WizardStep> {
        match self.phase() {
            WizardPhase::NotStarted => {},
            phase => return Err(Error::invalid("start", phase)),
        }
        self.started = true;
        self.step = WizardStep::FIRST;
        self.form = FormData::default();
        self.submission = SubmissionState::default();
        debug!(step = %self.step, "wizard started");
        Ok(self.step)
    }

    /// Merge `update` into the form without moving between steps.
    pub fn update(&mut self, update: FormUpdate) -> Result<()> {
        self.require_in_progress("update the form")?;
        self.form.merge(update);
        Ok(())
    }

    /// Move to the next step. Staying put on the last step is not an error;
    /// submitting is a separate action.
    pub fn advance(&mut self) -> Result<WizardStep> {
        let step = self.require_in_progress("advance")?;
        let Some(next) = step.next() else {
            return Ok(step);
        };
        self.require_valid(step)?;
        self.step = next;
        debug!(from = %step, to = %next, "wizard advanced");
        Ok(next)
    }

    /// Move to the previous step; a no-op on the first one.
    pub fn retreat(&mut self) -> Result<WizardStep> {
        let step = self.require_in_progress("go back")?;
        if let Some(prev) = step.prev() {
            self.step = prev;
            debug!(from = %step, to = %prev, "wizard retreated");
        }
        Ok(self.step)
    }

    /// Enter `Submitting` and hand out the payload for the request.
    ///
    /// Only allowed on the last step with a complete form. A second call
    /// while a request is in flight is rejected with
    /// [`Error::AlreadySubmitting`].
    pub fn begin_submission(&mut self) -> Result<SubmissionTicket> {
        match self.phase() {
            WizardPhase::InProgress(WizardStep::BusinessSearch) => {},
            WizardPhase::Submitting => return Err(Error::AlreadySubmitting),
            phase => return Err(Error::invalid("submit", phase)),
        }
        self.require_valid(WizardStep::LAST)?;

        self.attempt += 1;
        self.submission = SubmissionState::submitting();
        debug!(attempt = self.attempt, "submission started");
        Ok(SubmissionTicket {
            attempt: self.attempt,
            form: self.form.clone(),
        })
    }

    /// Record the outcome of the request behind `ticket`.
    ///
    /// Returns `false` and changes nothing when the ticket is stale, i.e. the
    /// wizard was reset (or resubmitted) while the request was in flight.
    pub fn finish_submission(
        &mut self,
        ticket: &SubmissionTicket,
        outcome: std::result::Result<SubmissionResult, SubmissionFailure>,
    ) -> bool {
        if ticket.attempt != self.attempt || self.submission.phase != SubmissionPhase::Submitting {
            debug!(
                attempt = ticket.attempt,
                current = self.attempt,
                "discarding stale submission outcome"
            );
            return false;
        }
        self.submission = match outcome {
            Ok(result) => SubmissionState::succeeded(result),
            Err(failure) => SubmissionState::failed(failure.to_string()),
        };
        debug!(attempt = ticket.attempt, phase = ?self.submission.phase, "submission finished");
        true
    }

    /// Leave the error screen and return to the last step for another try.
    pub fn retry(&mut self) -> Result<WizardStep> {
        match self.phase() {
            WizardPhase::Error => {},
            phase => return Err(Error::invalid("retry", phase)),
        }
        self.submission = SubmissionState::default();
        self.step = WizardStep::LAST;
        debug!("submission reset for retry");
        Ok(self.step)
    }

    /// Start over: back to the welcome screen with everything cleared.
    pub fn reset(&mut self) {
        self.started = false;
        self.step = WizardStep::FIRST;
        self.form = FormData::default();
        self.submission = SubmissionState::default();
        debug!("wizard reset");
    }
}
