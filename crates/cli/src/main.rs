mod config_commands;
mod theme_commands;

use {
    clap::{Parser, Subcommand},
    dialtone_onboarding::wizard::{SessionOutcome, run_onboarding},
    tracing::{debug, info},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "dialtone",
    about = "Set up a business phone number and AI agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Custom config directory (overrides default ~/.config/dialtone/).
    #[arg(long, global = true, env = "DIALTONE_CONFIG_DIR")]
    config_dir: Option<std::path::PathBuf>,

    /// Submission endpoint (overrides config and DIALTONE_ENDPOINT).
    #[arg(long, global = true)]
    endpoint: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the onboarding wizard (default when no subcommand is provided).
    Onboard,
    /// Show or change the color theme.
    Theme {
        #[command(subcommand)]
        action: Option<theme_commands::ThemeAction>,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

/// Logs go to stderr so they never interleave with the wizard's prompts.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn onboard(endpoint: Option<String>) -> anyhow::Result<()> {
    let mut config = dialtone_config::discover_and_load();
    if let Some(endpoint) = endpoint {
        config.submission.endpoint = endpoint;
    }
    debug!(endpoint = %config.submission.endpoint, "starting onboarding");

    match run_onboarding(&config).await? {
        SessionOutcome::Completed {
            generated_number,
            agent_name,
        } => {
            info!(number = %generated_number, agent = %agent_name, "onboarding complete");
        },
        SessionOutcome::Cancelled => println!("Setup cancelled."),
        SessionOutcome::Failed(message) => {
            eprintln!("Setup did not finish: {message}");
            std::process::exit(1);
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "dialtone starting");

    if let Some(ref dir) = cli.config_dir {
        dialtone_config::set_config_dir(dir.clone());
    }

    match cli.command {
        None | Some(Commands::Onboard) => onboard(cli.endpoint).await,
        Some(Commands::Theme { action }) => theme_commands::handle_theme(action),
        Some(Commands::Config { action }) => config_commands::handle_config(action),
    }
}
