//! Shared helpers for CLI commands.

use std::time::Duration;

use anyhow::{Context, Result};
use console::{StyledObject, style};
use indicatif::{ProgressBar, ProgressStyle};
use qcloud_auth::AuthConfig;
use qcloud_auth::config::PASSWORD_ENV;
use qcloud_sdk::{ClientConfig, Environment, JobResult, Sdk, Status};

/// Options shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub env: Option<Environment>,
    pub project_id: Option<String>,
    pub username: Option<String>,
    pub token: Option<String>,
}

/// Client configuration from the environment, overridden by flags.
///
/// `--env` replaces `QCLOUD_ENV`; the URL overrides still apply on top.
pub fn client_config(globals: &GlobalArgs) -> Result<ClientConfig> {
    let mut config =
        ClientConfig::from_env_with(globals.env).context("Invalid client configuration")?;
    if let Some(project_id) = &globals.project_id {
        config = config.with_project_id(project_id.clone());
    }
    Ok(config)
}

/// Credentials from flags; a token takes precedence over a username.
pub fn auth_config(globals: &GlobalArgs) -> Option<AuthConfig> {
    if let Some(token) = &globals.token {
        return Some(AuthConfig::token(token.clone()));
    }
    let username = globals.username.as_ref()?;
    match std::env::var(PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => Some(AuthConfig::password(username, password)),
        _ => Some(AuthConfig::prompted(username)),
    }
}

/// Connect with credentials, failing early when none are configured.
pub async fn connect(globals: &GlobalArgs) -> Result<Sdk> {
    let config = client_config(globals)?;
    let auth = auth_config(globals).ok_or_else(|| {
        anyhow::anyhow!(
            "No credentials configured. Pass --token or --username, or set QCLOUD_TOKEN / QCLOUD_USERNAME"
        )
    })?;
    Sdk::new(config, Some(auth))
        .await
        .context("Failed to connect")
}

/// Connect with credentials if any are configured, anonymously otherwise.
pub async fn connect_optional(globals: &GlobalArgs) -> Result<Sdk> {
    let config = client_config(globals)?;
    Sdk::new(config, auth_config(globals))
        .await
        .context("Failed to connect")
}

/// A steadily ticking spinner on stderr.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Status colored by outcome.
pub fn styled_status(status: &Status) -> StyledObject<String> {
    let name = status.to_string();
    match status {
        Status::Done => style(name).green().bold(),
        Status::Error | Status::Canceled | Status::TimedOut => style(name).red().bold(),
        Status::Pending | Status::Paused => style(name).yellow().bold(),
        _ => style(name).cyan().bold(),
    }
}

/// Print a result histogram (shared by result and wait).
pub fn print_results(result: &JobResult) {
    let Some(counts) = result.counts() else {
        println!(
            "\n{} Results have no counter; use --format json to see them",
            style("!").yellow().bold()
        );
        return;
    };

    let mut sorted: Vec<(String, u64)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    let total: u64 = sorted.iter().map(|(_, n)| n).sum();

    println!("\n{} Results ({} shots):", style("✓").green().bold(), total);

    for (bitstring, count) in sorted.iter().take(16) {
        let prob = *count as f64 / total.max(1) as f64 * 100.0;
        let bar: String = "█".repeat((prob / 2.0).round() as usize);

        println!(
            "  {}: {:>6} ({:>5.2}%) {}",
            style(bitstring).cyan(),
            count,
            prob,
            style(bar).green()
        );
    }

    if sorted.len() > 16 {
        println!("  ... and {} more outcomes", sorted.len() - 16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_beats_username() {
        let globals = GlobalArgs {
            username: Some("me@example.com".into()),
            token: Some("abc".into()),
            ..Default::default()
        };
        let auth = auth_config(&globals).unwrap();
        assert!(!auth.is_password());
    }

    #[test]
    fn test_no_credentials() {
        assert!(auth_config(&GlobalArgs::default()).is_none());
    }

    #[test]
    fn test_env_flag_overrides_endpoints() {
        let globals = GlobalArgs {
            env: Some(Environment::Dev),
            project_id: Some("p-9".into()),
            ..Default::default()
        };
        let config = client_config(&globals).unwrap();
        assert_eq!(config.endpoints, Environment::Dev.endpoints());
        assert_eq!(config.project_id.as_deref(), Some("p-9"));
    }
}
