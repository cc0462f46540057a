use {anyhow::Result, clap::Subcommand, dialtone_config::Theme};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum ThemeAction {
    /// Print the current theme (default).
    Show,
    /// Switch to the light theme.
    Light,
    /// Switch to the dark theme.
    Dark,
    /// Flip between light and dark.
    Toggle,
}

pub fn handle_theme(action: Option<ThemeAction>) -> Result<()> {
    match action.unwrap_or(ThemeAction::Show) {
        ThemeAction::Show => {
            println!("{}", dialtone_config::discover_and_load().ui.theme);
        },
        action => {
            let (theme, path) = apply(action)?;
            println!("Theme set to {theme} ({})", path.display());
        },
    }
    Ok(())
}

/// Persist the theme chosen by `action` and return it with the file written.
fn apply(action: ThemeAction) -> Result<(Theme, std::path::PathBuf)> {
    let mut chosen = Theme::default();
    let path = dialtone_config::update_config(|cfg| {
        cfg.ui.theme = next_theme(cfg.ui.theme, action);
        chosen = cfg.ui.theme;
    })?;
    Ok((chosen, path))
}

fn next_theme(current: Theme, action: ThemeAction) -> Theme {
    match action {
        ThemeAction::Show => current,
        ThemeAction::Light => Theme::Light,
        ThemeAction::Dark => Theme::Dark,
        ThemeAction::Toggle => current.toggled(),
    }
}
