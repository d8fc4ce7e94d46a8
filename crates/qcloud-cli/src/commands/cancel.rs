//! Cancel command implementation.

use anyhow::Result;
use console::style;

use super::common::{GlobalArgs, connect, styled_status};
use crate::Resource;

/// Execute the cancel command.
pub async fn execute(globals: &GlobalArgs, resource: Resource, id: &str) -> Result<()> {
    let sdk = connect(globals).await?;

    let (kind, status) = match resource {
        Resource::Batch => ("Batch", sdk.cancel_batch(id).await?.status),
        Resource::Job => ("Job", sdk.cancel_job(id).await?.status),
        Resource::Workload => ("Workload", sdk.cancel_workload(id).await?.status),
    };

    println!(
        "{} {} {} is now {}",
        style("✓").green().bold(),
        kind,
        style(id).dim(),
        styled_status(&status)
    );
    Ok(())
}
