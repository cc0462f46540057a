//! Terminal onboarding wizard on top of [`OnboardingService`].

use std::{
    io::{BufRead, IsTerminal, Write},
    time::Duration,
};

use {
    dialtone_config::{DialtoneConfig, Theme},
    tracing::debug,
};

use crate::{
    error::Error,
    form::{BusinessInfo, FormUpdate},
    service::{OnboardingService, WizardSnapshot},
    state::{WizardPhase, WizardStep},
    submission::Submitter,
};

/// How a terminal session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed {
        generated_number: String,
        agent_name: String,
    },
    Cancelled,
    /// The user quit from the error screen.
    Failed(String),
}

/// ANSI colors for headings, highlights and errors.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    heading: &'static str,
    accent: &'static str,
    error: &'static str,
    reset: &'static str,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                heading: "\x1b[1;34m",
                accent: "\x1b[36m",
                error: "\x1b[31m",
                reset: "\x1b[0m",
            },
            Theme::Dark => Self {
                heading: "\x1b[1;96m",
                accent: "\x1b[93m",
                error: "\x1b[91m",
                reset: "\x1b[0m",
            },
        }
    }

    pub fn plain() -> Self {
        Self {
            heading: "",
            accent: "",
            error: "",
            reset: "",
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Run the interactive onboarding wizard in the terminal.
pub async fn run_onboarding(config: &DialtoneConfig) -> anyhow::Result<SessionOutcome> {
    let submitter = Submitter::from_config(&config.submission)?;
    let service = OnboardingService::new(submitter);

    let mut stdout = std::io::stdout();
    let palette = if stdout.is_terminal() {
        Palette::for_theme(config.ui.theme)
    } else {
        Palette::plain()
    };
    let stdin = std::io::stdin();
    let mut reader = stdin.lock();

    run_session(&service, palette, &mut reader, &mut stdout).await
}

/// Drive `service` from line input until the user finishes or quits.
///
/// End of input counts as quitting.
pub async fn run_session<R: BufRead, W: Write>(
    service: &OnboardingService,
    palette: Palette,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<SessionOutcome> {
    loop {
        let snap = service.status().await;
        match snap.phase {
            WizardPhase::NotStarted => {
                writeln!(out, "{}Welcome!{}", palette.heading, palette.reset)?;
                writeln!(
                    out,
                    "Let's get started with setting up your business number."
                )?;
                match ask(input, out, "Press Enter to get started, or type 'quit'.")? {
                    Some(line) if !is_quit(&line) => {
                        service.start().await?;
                    },
                    _ => return Ok(SessionOutcome::Cancelled),
                }
            },
            WizardPhase::InProgress(WizardStep::BusinessSearch) => {
                if let Flow::Quit = business_step(service, palette, &snap, input, out).await? {
                    return Ok(SessionOutcome::Cancelled);
                }
            },
            WizardPhase::InProgress(step) => {
                if let Flow::Quit = field_step(service, palette, step, &snap, input, out).await? {
                    return Ok(SessionOutcome::Cancelled);
                }
            },
            WizardPhase::Submitting => {
                // Another caller owns the request; wait for it to land.
                tokio::time::sleep(Duration::from_millis(100)).await;
            },
            WizardPhase::Success => {
                let number = snap.submission.generated_number.unwrap_or_default();
                let agent = snap.submission.agent_name.unwrap_or_default();
                writeln!(out, "{}Setup Complete!{}", palette.heading, palette.reset)?;
                writeln!(out, "  Your Number: {}{number}{}", palette.accent, palette.reset)?;
                writeln!(out, "  AI Agent:    {}{agent}{}", palette.accent, palette.reset)?;
                writeln!(out, "Your business number and AI agent are ready!")?;
                match ask(
                    input,
                    out,
                    "Type 'new' to start a new setup, or press Enter to finish.",
                )? {
                    Some(line) if line.eq_ignore_ascii_case("new") => {
                        service.reset().await;
                    },
                    _ => {
                        return Ok(SessionOutcome::Completed {
                            generated_number: number,
                            agent_name: agent,
                        });
                    },
                }
            },
            WizardPhase::Error => {
                let message = snap
                    .submission
                    .error_message
                    .unwrap_or_else(|| "An unexpected error occurred.".into());
                writeln!(out, "{}Submission Failed{}", palette.heading, palette.reset)?;
                writeln!(out, "  {}{message}{}", palette.error, palette.reset)?;
                match ask(
                    input,
                    out,
                    "Type 'retry' to try again, 'over' to start over, or 'quit'.",
                )?
                .map(|answer| answer.to_ascii_lowercase())
                .as_deref()
                {
                    Some("retry") => {
                        service.retry().await?;
                    },
                    Some("over") => {
                        service.reset().await;
                    },
                    None | Some("quit") => return Ok(SessionOutcome::Failed(message)),
                    Some(other) => {
                        debug!(input = other, "unrecognised choice on error screen");
                        writeln!(out, "Please type retry, over or quit.")?;
                    },
                }
            },
        }
    }
}

fn progress<W: Write>(out: &mut W, palette: Palette, step: WizardStep) -> std::io::Result<()> {
    writeln!(
        out,
        "{}Step {} of {}{} · {}",
        palette.heading,
        step.number(),
        WizardStep::COUNT,
        palette.reset,
        step.title()
    )
}

async fn field_step<R: BufRead, W: Write>(
    service: &OnboardingService,
    palette: Palette,
    step: WizardStep,
    snap: &WizardSnapshot,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<Flow> {
    progress(out, palette, step)?;
    let current = match step {
        WizardStep::Country => &snap.form.country,
        WizardStep::Number => &snap.form.selected_number,
        _ => &snap.form.business_type,
    };
    let question = if current.is_empty() {
        step.prompt().to_string()
    } else {
        format!("{} [{current}]", step.prompt())
    };

    let Some(line) = ask(input, out, &question)? else {
        return Ok(Flow::Quit);
    };
    match line.to_ascii_lowercase().as_str() {
        "quit" => return Ok(Flow::Quit),
        "back" => {
            service.back().await?;
            return Ok(Flow::Continue);
        },
        "reset" => {
            service.reset().await;
            return Ok(Flow::Continue);
        },
        _ => {},
    }

    if !line.is_empty() {
        let update = match step {
            WizardStep::Country => FormUpdate::default().country(line),
            WizardStep::Number => FormUpdate::default().selected_number(line),
            _ => FormUpdate::default().business_type(line),
        };
        service.update(update).await?;
    }
    advance(service, palette, out).await?;
    Ok(Flow::Continue)
}

async fn advance<W: Write>(
    service: &OnboardingService,
    palette: Palette,
    out: &mut W,
) -> anyhow::Result<()> {
    match service.next().await {
        Ok(_) => Ok(()),
        Err(Error::StepIncomplete { field, .. }) => {
            writeln!(out, "{}{field} is required.{}", palette.error, palette.reset)?;
            Ok(())
        },
        Err(e) => Err(e.into()),
    }
}

async fn business_step<R: BufRead, W: Write>(
    service: &OnboardingService,
    palette: Palette,
    snap: &WizardSnapshot,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<Flow> {
    progress(out, palette, WizardStep::BusinessSearch)?;
    writeln!(out, "{}", WizardStep::BusinessSearch.prompt())?;
    let existing = snap.form.business_search.clone().unwrap_or_default();

    let Some(name) = ask(input, out, &with_current("Business name", &existing.name))? else {
        return Ok(Flow::Quit);
    };
    match name.to_ascii_lowercase().as_str() {
        "quit" => return Ok(Flow::Quit),
        "back" => {
            service.back().await?;
            return Ok(Flow::Continue);
        },
        "reset" => {
            service.reset().await;
            return Ok(Flow::Continue);
        },
        _ => {},
    }
    let name = if name.is_empty() { existing.name.clone() } else { name };
    if name.is_empty() {
        writeln!(
            out,
            "{}{} is required.{}",
            palette.error,
            WizardStep::BusinessSearch.required_field(),
            palette.reset
        )?;
        return Ok(Flow::Continue);
    }

    let current_address = existing.address.clone().unwrap_or_default();
    let Some(address) = ask(input, out, &with_current("Address (optional)", &current_address))?
    else {
        return Ok(Flow::Quit);
    };
    let current_website = existing.website.clone().unwrap_or_default();
    let Some(website) = ask(input, out, &with_current("Website (optional)", &current_website))?
    else {
        return Ok(Flow::Quit);
    };

    let business = BusinessInfo::named(name)
        .with_address(if address.is_empty() { current_address } else { address })
        .with_website(if website.is_empty() { current_website } else { website });
    service
        .update(FormUpdate::default().business_search(business))
        .await?;

    // Only an empty line confirms.
    loop {
        let Some(answer) = ask(
            input,
            out,
            "Press Enter to build your number, or type 'back' to go back.",
        )?
        else {
            return Ok(Flow::Quit);
        };
        match answer.to_ascii_lowercase().as_str() {
            "" => {
                writeln!(out, "Building your number...")?;
                out.flush()?;
                service.submit().await?;
                return Ok(Flow::Continue);
            },
            "quit" => return Ok(Flow::Quit),
            "back" => {
                service.back().await?;
                return Ok(Flow::Continue);
            },
            "reset" => {
                service.reset().await;
                return Ok(Flow::Continue);
            },
            other => {
                debug!(input = other, "unrecognised choice on confirm screen");
                writeln!(out, "Please press Enter, or type back, reset or quit.")?;
            },
        }
    }
}

fn with_current(label: &str, current: &str) -> String {
    if current.is_empty() {
        format!("{label}:")
    } else {
        format!("{label} [{current}]:")
    }
}

fn is_quit(line: &str) -> bool {
    line.eq_ignore_ascii_case("quit")
}

/// Print `question`, then read one trimmed line. `None` on end of input.
fn ask<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    question: &str,
) -> std::io::Result<Option<String>> {
    writeln!(out, "{question}")?;
    write!(out, "> ")?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        writeln!(out)?;
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{io::Cursor, sync::atomic::Ordering};

    use super::*;
    use crate::submission::{
        SubmissionFailure,
        tests::{FakeTransport, reply, submitter},
    };

    async fn run(transport: std::sync::Arc<FakeTransport>, script: &str) -> (SessionOutcome, String) {
        let svc = OnboardingService::new(submitter(transport));
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        let outcome = run_session(&svc, Palette::plain(), &mut input, &mut out)
            .await
            .unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn happy_path_completes() {
        let transport = FakeTransport::status(200, "OK", "");
        let script = "\nUS\n+15551234567\nretail\nAcme\n1 Main St\n\n\n\n";
        let (outcome, out) = run(transport.clone(), script).await;

        let SessionOutcome::Completed {
            generated_number,
            agent_name,
        } = outcome
        else {
            panic!("expected completion, got {outcome:?}\n{out}");
        };
        assert!(generated_number.starts_with('+'));
        assert_eq!(generated_number.len(), 11);
        assert_eq!(agent_name, "Ava");
        assert!(out.contains("Step 1 of 4"));
        assert!(out.contains("Step 4 of 4"));
        assert!(out.contains("Building your number..."));
        assert!(out.contains("Setup Complete!"));

        let sent = transport.last_payload.lock().unwrap().clone().unwrap();
        assert_eq!(sent.country, "US");
        let business = sent.business_search.unwrap();
        assert_eq!(business.name, "Acme");
        assert_eq!(business.address.as_deref(), Some("1 Main St"));
        assert!(business.website.is_none());
    }

    #[tokio::test]
    async fn empty_answer_is_rejected() {
        let transport = FakeTransport::status(200, "OK", "");
        let (outcome, out) = run(transport, "\n\nquit\n").await;
        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert!(out.contains("country is required."));
    }

    #[tokio::test]
    async fn back_returns_to_previous_value() {
        let transport = FakeTransport::status(200, "OK", "");
        let (outcome, out) = run(transport, "\nUS\nback\nquit\n").await;
        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert!(out.contains("Which country will your business number be in? [US]"));
    }

    #[tokio::test]
    async fn error_then_retry_succeeds() {
        let transport = FakeTransport::new(vec![
            Ok(reply(500, "Internal Server Error", "boom")),
            Ok(reply(200, "OK", "")),
        ]);
        let script = "\nUS\n+15551234567\nretail\nAcme\n\n\n\nretry\n\n\n\n\n\n";
        let (outcome, out) = run(transport.clone(), script).await;

        assert!(matches!(outcome, SessionOutcome::Completed { .. }), "{out}");
        assert!(out.contains("Submission failed: 500 Internal Server Error - boom"));
        assert!(out.contains("Business name [Acme]:"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn quitting_from_error_reports_failure() {
        let transport = FakeTransport::new(vec![Err(SubmissionFailure::Transport(
            "connection refused".into(),
        ))]);
        let script = "\nUS\n+15551234567\nretail\nAcme\n\n\n\nquit\n";
        let (outcome, _) = run(transport, script).await;
        assert_eq!(
            outcome,
            SessionOutcome::Failed("connection refused".into())
        );
    }

    #[tokio::test]
    async fn start_over_after_success() {
        let transport = FakeTransport::status(200, "OK", "");
        let script = "\nUS\n+15551234567\nretail\nAcme\n\n\n\nnew\nquit\n";
        let (outcome, out) = run(transport, script).await;
        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(out.matches("Welcome!").count(), 2);
    }

    #[tokio::test]
    async fn end_of_input_cancels() {
        let transport = FakeTransport::status(200, "OK", "");
        let (outcome, _) = run(transport.clone(), "").await;
        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reset_on_confirm_screen_sends_nothing() {
        let transport = FakeTransport::status(200, "OK", "");
        let script = "\nUS\n+15551234567\nretail\nAcme\n\n\nreset\nquit\n";
        let (outcome, out) = run(transport.clone(), script).await;

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert_eq!(out.matches("Welcome!").count(), 2);
        assert!(!out.contains("Building your number..."));
    }

    #[tokio::test]
    async fn unrecognised_confirmation_prompts_again() {
        let transport = FakeTransport::status(200, "OK", "");
        let script = "\nUS\n+15551234567\nretail\nAcme\n\n\nno\nBACK\nquit\n";
        let (outcome, out) = run(transport.clone(), script).await;

        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        assert!(out.contains("Please press Enter, or type back, reset or quit."));
        assert!(out.contains("Step 3 of 4"));
        assert!(out.contains("What type of business do you run? [retail]"));
    }

    #[tokio::test]
    async fn error_screen_accepts_any_case() {
        let transport = FakeTransport::new(vec![
            Ok(reply(503, "Service Unavailable", "")),
            Ok(reply(200, "OK", "")),
        ]);
        let script = "\nUS\n+15551234567\nretail\nAcme\n\n\n\nRetry\n\n\n\n\n\n";
        let (outcome, out) = run(transport.clone(), script).await;

        assert!(matches!(outcome, SessionOutcome::Completed { .. }), "{out}");
        assert!(!out.contains("Please type retry, over or quit."));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn palettes_differ_by_theme() {
        let light = Palette::for_theme(Theme::Light);
        let dark = Palette::for_theme(Theme::Dark);
        assert_ne!(light.heading, dark.heading);
        assert_eq!(Palette::plain().reset, "");
    }
}
