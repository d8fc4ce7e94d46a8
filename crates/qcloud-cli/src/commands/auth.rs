//! Auth command implementation.
//!
//! Check the configured credentials against the identity provider.

use anyhow::{Context, Result};
use console::style;
use qcloud_auth::jwt::expiry_from_jwt;

use super::common::{GlobalArgs, auth_config, client_config, connect};

/// Print a bearer token, for use with other tools.
pub async fn execute_token(globals: &GlobalArgs) -> Result<()> {
    let sdk = connect(globals).await?;
    let token = sdk
        .user_token()
        .await
        .context("Failed to obtain a token")?
        .ok_or_else(|| anyhow::anyhow!("No token available"))?;
    println!("{token}");
    Ok(())
}

/// Show the environment and whether the credentials work.
pub async fn execute_status(globals: &GlobalArgs) -> Result<()> {
    let config = client_config(globals)?;

    println!("{} Authentication status:\n", style("→").cyan().bold());
    println!("  Core API:     {}", style(&config.endpoints.core).dim());
    println!("  Account API:  {}", style(&config.endpoints.account).dim());
    println!(
        "  Project:      {}",
        config
            .project_id
            .as_deref()
            .map_or_else(|| style("not set").yellow(), |p| style(p).green())
    );

    let Some(auth) = auth_config(globals) else {
        println!("  Credentials:  {}", style("none").yellow());
        println!(
            "\n  Set QCLOUD_TOKEN, or QCLOUD_USERNAME and QCLOUD_PASSWORD, to authenticate."
        );
        return Ok(());
    };

    let kind = if auth.is_password() {
        "username / password"
    } else {
        "bearer token"
    };
    println!("  Credentials:  {}", style(kind).cyan());

    let sdk = connect(globals).await?;
    let token = sdk.user_token().await?.unwrap_or_default();

    println!("\n{} Credentials accepted", style("✓").green().bold());
    match expiry_from_jwt(&token) {
        Some(expiry) => println!(
            "  Token expires: {}",
            style(expiry.format("%Y-%m-%d %H:%M:%S UTC")).yellow()
        ),
        None => println!("  Token expires: {}", style("unknown").dim()),
    }

    Ok(())
}
