//! Config schema types (submission endpoint, timing, result handling, UI).
use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Endpoint used when nothing else is configured. It echoes the request
/// body back, which is enough to exercise the whole flow.
pub const DEFAULT_ENDPOINT: &str = "https://httpbin.org/post";

/// Agent name reported when the backend does not assign one.
pub const DEFAULT_AGENT_NAME: &str = "Ava";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DialtoneConfig {
    pub submission: SubmissionConfig,
    pub ui: UiConfig,
}

/// Where the onboarding form is sent and how the reply is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionConfig {
    pub endpoint: String,
    /// Request timeout. `None` leaves the HTTP client's default in place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Pause before the request goes out, so the "building" screen is visible.
    pub submit_delay_ms: u64,
    /// Pause after a successful reply before reporting success.
    pub settle_delay_ms: u64,
    pub result_source: ResultSource,
    pub agent_name: String,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            timeout_secs: None,
            submit_delay_ms: 2_000,
            settle_delay_ms: 1_500,
            result_source: ResultSource::default(),
            agent_name: DEFAULT_AGENT_NAME.into(),
        }
    }
}

impl SubmissionConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn submit_delay(&self) -> Duration {
        Duration::from_millis(self.submit_delay_ms)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// How the assigned number and agent are obtained after a successful
/// submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    /// Read `{number, agentName}` from the reply, synthesizing when absent.
    #[default]
    Auto,
    /// Require `{number, agentName}` in the reply.
    Response,
    /// Always synthesize locally.
    Synthesized,
}

/// Presentation preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub theme: Theme,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    #[must_use]
    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme \"{other}\" (expected light or dark)")),
        }
    }
}
