use {
    anyhow::Result,
    clap::Subcommand,
    dialtone_config::validate::{self, Diagnostic, Severity, ValidationResult},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report problems.
    Check {
        /// Also show informational notes.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration, env overrides included.
    Show,
    /// Print the file the configuration is read from and saved to.
    Path,
}

pub fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => {
            let result = validate::validate(None);
            eprint!("{}", render_report(&result, verbose));
            if result.has_errors() {
                std::process::exit(1);
            }
        },
        ConfigAction::Show => {
            let config = dialtone_config::discover_and_load();
            print!("{}", toml::to_string_pretty(&config)?);
        },
        ConfigAction::Path => {
            println!(
                "{}",
                dialtone_config::find_or_default_config_path().display()
            );
        },
    }
    Ok(())
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "\x1b[1;31m",
        Severity::Warning => "\x1b[1;33m",
        Severity::Info => "\x1b[1;36m",
    }
}

fn render_line(d: &Diagnostic) -> String {
    let location = if d.path.is_empty() {
        String::new()
    } else {
        format!(" {}:", d.path)
    };
    format!(
        "  {}{}\x1b[0m [{}]{location} {}\n",
        severity_color(d.severity),
        d.severity,
        d.category,
        d.message
    )
}

/// Diagnostics ordered by severity, followed by a one-line summary.
fn render_report(result: &ValidationResult, verbose: bool) -> String {
    let mut report = match result.config_path {
        Some(ref path) => format!("Checking {}\n\n", path.display()),
        None => "No config file found; checking defaults.\n\n".to_string(),
    };

    let mut shown: Vec<&Diagnostic> = result
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .collect();
    shown.sort_by_key(|d| d.severity);
    for d in &shown {
        report.push_str(&render_line(d));
    }
    if !shown.is_empty() {
        report.push('\n');
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors + warnings == 0 {
        report.push_str("Config OK.\n");
    } else {
        report.push_str(&format!("{errors} error(s), {warnings} warning(s)\n"));
    }
    report
}
