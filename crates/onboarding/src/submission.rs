//! Sending the completed form and turning the reply into a result.

use std::{sync::Arc, time::Duration};

use {
    async_trait::async_trait,
    dialtone_config::{ResultSource, SubmissionConfig},
    rand::Rng,
    serde::Deserialize,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Context, Result},
    form::FormData,
    state::{SubmissionPhase, WizardController},
};

/// Why a submission attempt ended in the error phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionFailure {
    /// The request never produced an HTTP response.
    #[error("{0}")]
    Transport(String),
    /// The endpoint answered with a non-2xx status.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("invalid submission response: {0}")]
    InvalidResponse(String),
}

impl SubmissionFailure {
    /// `Submission failed: {status} {statusText}`, plus ` - {body}` when the
    /// body has content.
    pub fn from_status(status: u16, status_text: &str, body: &str) -> Self {
        let mut message = format!("Submission failed: {status}");
        if !status_text.is_empty() {
            message.push(' ');
            message.push_str(status_text);
        }
        let body = body.trim_end();
        if !body.is_empty() {
            message.push_str(" - ");
            message.push_str(body);
        }
        Self::Status { status, message }
    }
}

/// Raw reply from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Delivers the form payload to the backend.
#[async_trait]
pub trait SubmissionTransport: Send + Sync {
    async fn post_json(
        &self,
        endpoint: &str,
        payload: &FormData,
    ) -> std::result::Result<TransportResponse, SubmissionFailure>;
}

/// JSON-over-HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a client; `timeout` of `None` keeps reqwest's default.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SubmissionTransport for HttpTransport {
    async fn post_json(
        &self,
        endpoint: &str,
        payload: &FormData,
    ) -> std::result::Result<TransportResponse, SubmissionFailure> {
        let resp = self
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await
            .map_err(|e| SubmissionFailure::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), bytes = body.len(), "submission response");

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

/// Number and agent assigned to the business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub generated_number: String,
    pub agent_name: String,
}

/// Reply schema understood from the backend.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmissionResponse {
    number: String,
    #[serde(alias = "agent_name")]
    agent_name: String,
}

fn parse_response(body: &str) -> std::result::Result<SubmissionResult, String> {
    let parsed: SubmissionResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;
    if parsed.number.trim().is_empty() {
        return Err("empty number".into());
    }
    if parsed.agent_name.trim().is_empty() {
        return Err("empty agentName".into());
    }
    Ok(SubmissionResult {
        generated_number: parsed.number,
        agent_name: parsed.agent_name,
    })
}

/// A phone-number-shaped string: `+` and ten digits, no leading zero.
pub fn synthesize_number() -> String {
    let n: u64 = rand::rng().random_range(1_000_000_000..10_000_000_000);
    format!("+{n}")
}

/// Turn a transport reply into an outcome according to `source`.
pub fn interpret(
    response: &TransportResponse,
    source: ResultSource,
    agent_name: &str,
) -> std::result::Result<SubmissionResult, SubmissionFailure> {
    if !response.is_success() {
        return Err(SubmissionFailure::from_status(
            response.status,
            &response.status_text,
            &response.body,
        ));
    }

    let synthesized = || SubmissionResult {
        generated_number: synthesize_number(),
        agent_name: agent_name.to_string(),
    };

    match source {
        ResultSource::Synthesized => Ok(synthesized()),
        ResultSource::Response => {
            parse_response(&response.body).map_err(SubmissionFailure::InvalidResponse)
        },
        ResultSource::Auto => Ok(parse_response(&response.body).unwrap_or_else(|reason| {
            debug!(%reason, "response has no assignment, synthesizing one");
            synthesized()
        })),
    }
}

/// Sends forms to the configured endpoint. One request per call, no retries.
#[derive(Clone)]
pub struct Submitter {
    transport: Arc<dyn SubmissionTransport>,
    settings: SubmissionConfig,
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Submitter {
    pub fn new(transport: Arc<dyn SubmissionTransport>, settings: SubmissionConfig) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// HTTP submitter for the given settings.
    pub fn from_config(settings: &SubmissionConfig) -> Result<Self> {
        let transport = HttpTransport::new(settings.timeout())?;
        Ok(Self::new(Arc::new(transport), settings.clone()))
    }

    pub async fn submit(
        &self,
        form: &FormData,
    ) -> std::result::Result<SubmissionResult, SubmissionFailure> {
        pause(self.settings.submit_delay()).await;

        info!(endpoint = %self.settings.endpoint, "submitting onboarding form");
        let outcome = self
            .transport
            .post_json(&self.settings.endpoint, form)
            .await
            .and_then(|resp| {
                interpret(
                    &resp,
                    self.settings.result_source,
                    &self.settings.agent_name,
                )
            });

        match &outcome {
            Ok(result) => {
                info!(
                    number = %result.generated_number,
                    agent = %result.agent_name,
                    "submission succeeded"
                );
                pause(self.settings.settle_delay()).await;
            },
            Err(e) => warn!(error = %e, "submission failed"),
        }
        outcome
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

impl WizardController {
    /// Submit the form and wait for the outcome.
    ///
    /// Failures of the request itself end up in the error phase and are not
    /// returned; `Err` means the wizard was not in a state that allows
    /// submitting.
    pub async fn submit(&mut self, submitter: &Submitter) -> Result<SubmissionPhase> {
        let ticket = self.begin_submission()?;
        let outcome = submitter.submit(&ticket.form).await;
        self.finish_submission(&ticket, outcome);
        Ok(self.submission().phase)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use {super::*, serde_json::json};

    use crate::{
        error::Error,
        form::{BusinessInfo, FormUpdate},
        state::{WizardPhase, WizardStep},
    };

    /// Transport that replays canned replies and records what it was sent.
    pub(crate) struct FakeTransport {
        replies: Mutex<Vec<std::result::Result<TransportResponse, SubmissionFailure>>>,
        pub(crate) calls: AtomicUsize,
        pub(crate) last_payload: Mutex<Option<FormData>>,
    }

    impl FakeTransport {
        /// Replies are handed out in order; the last one repeats.
        pub(crate) fn new(
            replies: Vec<std::result::Result<TransportResponse, SubmissionFailure>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                calls: AtomicUsize::new(0),
                last_payload: Mutex::new(None),
            })
        }

        pub(crate) fn status(status: u16, status_text: &str, body: &str) -> Arc<Self> {
            Self::new(vec![Ok(reply(status, status_text, body))])
        }
    }

    #[async_trait]
    impl SubmissionTransport for FakeTransport {
        async fn post_json(
            &self,
            _endpoint: &str,
            payload: &FormData,
        ) -> std::result::Result<TransportResponse, SubmissionFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_payload.lock().unwrap() = Some(payload.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.remove(0)
            } else {
                replies[0].clone()
            }
        }
    }

    pub(crate) fn reply(status: u16, status_text: &str, body: &str) -> TransportResponse {
        TransportResponse {
            status,
            status_text: status_text.into(),
            body: body.into(),
        }
    }

    pub(crate) fn instant_settings() -> SubmissionConfig {
        SubmissionConfig {
            endpoint: "http://backend.test/onboard".into(),
            submit_delay_ms: 0,
            settle_delay_ms: 0,
            ..SubmissionConfig::default()
        }
    }

    pub(crate) fn submitter(transport: Arc<FakeTransport>) -> Submitter {
        Submitter::new(transport, instant_settings())
    }

    fn filled_wizard() -> WizardController {
        let mut w = WizardController::new();
        w.start().unwrap();
        w.update(FormUpdate::default().country("US")).unwrap();
        w.advance().unwrap();
        w.update(FormUpdate::default().selected_number("+15551234567"))
            .unwrap();
        w.advance().unwrap();
        w.update(FormUpdate::default().business_type("retail"))
            .unwrap();
        w.advance().unwrap();
        w.update(FormUpdate::default().business_search(BusinessInfo::named("Acme")))
            .unwrap();
        w
    }

    fn assert_phone_shaped(number: &str) {
        let re = regex::Regex::new(r"^\+\d{10}$").unwrap();
        assert!(re.is_match(number), "not phone shaped: {number}");
    }

    #[test]
    fn status_message_format() {
        let f = SubmissionFailure::from_status(500, "Internal Server Error", "boom\n");
        assert_eq!(f.to_string(), "Submission failed: 500 Internal Server Error - boom");

        let f = SubmissionFailure::from_status(404, "Not Found", "");
        assert_eq!(f.to_string(), "Submission failed: 404 Not Found");

        let f = SubmissionFailure::from_status(599, "", "");
        assert_eq!(f.to_string(), "Submission failed: 599");
    }

    #[test]
    fn synthesized_numbers_are_phone_shaped() {
        for _ in 0..50 {
            assert_phone_shaped(&synthesize_number());
        }
    }

    #[test]
    fn auto_prefers_response_fields() {
        let resp = reply(201, "Created", r#"{"number": "+442071234567", "agentName": "Max"}"#);
        let result = interpret(&resp, ResultSource::Auto, "Ava").unwrap();
        assert_eq!(result.generated_number, "+442071234567");
        assert_eq!(result.agent_name, "Max");
    }

    #[test]
    fn auto_accepts_snake_case_agent() {
        let resp = reply(200, "OK", r#"{"number": "+15550001111", "agent_name": "Zoe"}"#);
        let result = interpret(&resp, ResultSource::Auto, "Ava").unwrap();
        assert_eq!(result.agent_name, "Zoe");
    }

    #[test]
    fn auto_synthesizes_for_echo_responses() {
        let resp = reply(200, "OK", r#"{"json": {"country": "US"}}"#);
        let result = interpret(&resp, ResultSource::Auto, "Ava").unwrap();
        assert_phone_shaped(&result.generated_number);
        assert_eq!(result.agent_name, "Ava");
    }

    #[test]
    fn response_source_requires_schema() {
        let resp = reply(200, "OK", "{}");
        let err = interpret(&resp, ResultSource::Response, "Ava").unwrap_err();
        assert!(matches!(err, SubmissionFailure::InvalidResponse(_)));

        let resp = reply(200, "OK", r#"{"number": " ", "agentName": "Max"}"#);
        assert!(interpret(&resp, ResultSource::Response, "Ava").is_err());
    }

    #[test]
    fn synthesized_source_ignores_body() {
        let resp = reply(200, "OK", r#"{"number": "+442071234567", "agentName": "Max"}"#);
        let result = interpret(&resp, ResultSource::Synthesized, "Ava").unwrap();
        assert_eq!(result.agent_name, "Ava");
        assert_ne!(result.generated_number, "+442071234567");
    }

    #[test]
    fn non_2xx_is_failure_even_with_schema() {
        let resp = reply(302, "Found", r#"{"number": "+1", "agentName": "Max"}"#);
        let err = interpret(&resp, ResultSource::Auto, "Ava").unwrap_err();
        assert!(matches!(err, SubmissionFailure::Status { status: 302, .. }));
    }

    #[tokio::test]
    async fn end_to_end_success() {
        let transport = FakeTransport::status(200, "OK", "");
        let submitter = submitter(transport.clone());

        let mut w = filled_wizard();
        let phase = w.submit(&submitter).await.unwrap();

        assert_eq!(phase, SubmissionPhase::Success);
        assert_eq!(w.phase(), WizardPhase::Success);
        let s = w.submission();
        assert_phone_shaped(s.generated_number.as_deref().unwrap());
        assert_eq!(s.agent_name.as_deref(), Some("Ava"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        let sent = transport.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(&sent, w.form());
    }

    #[tokio::test]
    async fn server_error_surfaces_status_and_body() {
        let transport = FakeTransport::status(500, "Internal Server Error", "boom");
        let mut w = filled_wizard();
        let phase = w.submit(&submitter(transport)).await.unwrap();

        assert_eq!(phase, SubmissionPhase::Error);
        let msg = w.submission().error_message.clone().unwrap();
        assert!(msg.contains("500"), "{msg}");
        assert!(msg.contains("boom"), "{msg}");
        assert!(w.submission().generated_number.is_none());
        assert!(w.submission().agent_name.is_none());
    }

    #[tokio::test]
    async fn transport_failure_surfaces_message() {
        let transport = FakeTransport::new(vec![Err(SubmissionFailure::Transport(
            "network unreachable".into(),
        ))]);
        let mut w = filled_wizard();
        w.submit(&submitter(transport)).await.unwrap();

        assert_eq!(w.phase(), WizardPhase::Error);
        assert_eq!(
            w.submission().error_message.as_deref(),
            Some("network unreachable")
        );
    }

    #[tokio::test]
    async fn retry_after_error_then_success() {
        let transport = FakeTransport::new(vec![
            Ok(reply(503, "Service Unavailable", "")),
            Ok(reply(200, "OK", "")),
        ]);
        let submitter = submitter(transport.clone());
        let mut w = filled_wizard();

        assert_eq!(w.submit(&submitter).await.unwrap(), SubmissionPhase::Error);
        w.retry().unwrap();
        assert!(w.submission().error_message.is_none());
        assert_eq!(w.step(), Some(WizardStep::BusinessSearch));
        assert!(w.can_advance());

        assert_eq!(w.submit(&submitter).await.unwrap(), SubmissionPhase::Success);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_submit_sends_nothing() {
        let transport = FakeTransport::status(200, "OK", "");
        let mut w = WizardController::new();
        w.start().unwrap();
        let err = w.submit(&submitter(transport.clone())).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn http_transport_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/onboard")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(json!({
                "country": "US",
                "selectedNumber": "+15551234567",
                "businessType": "retail",
                "businessSearch": {"name": "Acme"},
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"number": "+13105550199", "agentName": "Ava"}"#)
            .create_async()
            .await;

        let settings = SubmissionConfig {
            endpoint: format!("{}/onboard", server.url()),
            ..instant_settings()
        };
        let submitter = Submitter::from_config(&settings).unwrap();

        let mut w = filled_wizard();
        w.submit(&submitter).await.unwrap();
        mock.assert_async().await;

        assert_eq!(w.phase(), WizardPhase::Success);
        assert_eq!(
            w.submission().generated_number.as_deref(),
            Some("+13105550199")
        );
    }

    #[tokio::test]
    async fn http_transport_reports_status_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", mockito::Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let transport = HttpTransport::new(Some(Duration::from_secs(5))).unwrap();
        let resp = transport
            .post_json(&server.url(), &FormData::default())
            .await
            .unwrap();
        assert_eq!(resp.status, 500);
        assert_eq!(resp.status_text, "Internal Server Error");
        assert_eq!(resp.body, "boom");

        let err = interpret(&resp, ResultSource::Auto, "Ava").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Submission failed: 500 Internal Server Error - boom"
        );
    }

    #[tokio::test]
    async fn http_transport_connection_refused() {
        // Grab a free port, then close it so nothing is listening.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let transport = HttpTransport::new(Some(Duration::from_secs(5))).unwrap();
        let err = transport
            .post_json(&format!("http://127.0.0.1:{port}/"), &FormData::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionFailure::Transport(ref m) if !m.is_empty()));
    }
}
