//! Wait command implementation.
//!
//! Poll a resource until it settles, then print its outcome.

use std::time::Duration;

use anyhow::Result;
use console::style;
use qcloud_sdk::{SdkError, Status, WaitOptions};

use super::common::{GlobalArgs, client_config, auth_config, print_results, spinner, styled_status};
use crate::Resource;

/// Execute the wait command.
pub async fn execute(globals: &GlobalArgs, resource: Resource, id: &str, timeout: u64) -> Result<()> {
    let auth = auth_config(globals)
        .ok_or_else(|| anyhow::anyhow!("No credentials configured. Pass --token or --username"))?;
    let config = client_config(globals)?;
    let wait = WaitOptions {
        timeout: Some(Duration::from_secs(timeout)),
        ..config.wait.clone()
    };
    let sdk = qcloud_sdk::Sdk::new(config.with_wait(wait), Some(auth)).await?;

    println!(
        "{} Waiting for {:?} {} (timeout: {}s)",
        style("→").cyan().bold(),
        resource,
        style(id).dim(),
        timeout
    );
    let progress = spinner("Waiting to finish...");

    let outcome: Result<Status, SdkError> = match resource {
        Resource::Batch => sdk.wait_for_batch(id).await.map(|b| b.status),
        Resource::Job => sdk.wait_for_job(id).await.map(|j| j.status),
        Resource::Workload => sdk.wait_for_workload(id).await.map(|w| w.status),
    };
    progress.finish_and_clear();

    let status = match outcome {
        Ok(status) => status,
        Err(SdkError::Timeout { .. }) => anyhow::bail!(
            "Timeout after {timeout}s. Use 'qcloud status {} {id}' to check later.",
            format!("{resource:?}").to_lowercase()
        ),
        Err(e) => return Err(e.into()),
    };

    println!(
        "{} Finished with status {}",
        if status.is_success() {
            style("✓").green().bold()
        } else {
            style("✗").red().bold()
        },
        styled_status(&status)
    );

    if resource == Resource::Job && status.is_success() {
        if let Some(result) = sdk.get_job_results(id).await? {
            print_results(&result);
        }
    }

    Ok(())
}
