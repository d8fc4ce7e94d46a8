//! Status command implementation.

use anyhow::Result;
use console::style;

use super::common::{GlobalArgs, connect, styled_status};
use crate::Resource;

/// Execute the status command.
pub async fn execute(globals: &GlobalArgs, resource: Resource, id: &str) -> Result<()> {
    let sdk = connect(globals).await?;

    match resource {
        Resource::Batch => {
            let batch = sdk.get_batch(id).await?;
            println!(
                "{} Batch {}: {}",
                style("→").cyan().bold(),
                style(&batch.id).dim(),
                styled_status(&batch.status)
            );
            if let Some(device) = &batch.device_type {
                println!("  Device:   {device}");
            }
            if let Some(open) = batch.open {
                println!("  Open:     {open}");
            }
            if let Some(created) = &batch.created_at {
                println!("  Created:  {created}");
            }
            if !batch.jobs_count_per_status.is_empty() {
                let mut counts: Vec<_> = batch.jobs_count_per_status.iter().collect();
                counts.sort();
                println!("  Jobs:     {}", batch.jobs_count);
                for (status, count) in counts {
                    println!("    {status:<10} {count}");
                }
            }
        }
        Resource::Job => {
            let job = sdk.get_job(id, false).await?;
            println!(
                "{} Job {}: {}",
                style("→").cyan().bold(),
                style(&job.id).dim(),
                styled_status(&job.status)
            );
            if let Some(batch_id) = &job.batch_id {
                println!("  Batch:    {batch_id}");
            }
            println!("  Runs:     {}", job.runs);
            if let Some(errors) = job.errors.as_ref().filter(|e| !e.is_empty()) {
                println!("  Errors:");
                for error in errors {
                    println!("    {}", style(error).red());
                }
            }
        }
        Resource::Workload => {
            let workload = sdk.get_workload(id, false).await?;
            println!(
                "{} Workload {}: {}",
                style("→").cyan().bold(),
                style(&workload.id).dim(),
                styled_status(&workload.status)
            );
            if let Some(backend) = &workload.backend {
                println!("  Backend:  {backend}");
            }
        }
    }

    Ok(())
}
