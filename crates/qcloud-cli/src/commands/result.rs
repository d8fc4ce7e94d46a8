//! Result command implementation.
//!
//! Download and display the results of a finished job.

use anyhow::Result;
use console::style;

use super::common::{GlobalArgs, connect, print_results};

/// Execute the result command.
pub async fn execute(globals: &GlobalArgs, job_id: &str, format: &str) -> Result<()> {
    let sdk = connect(globals).await?;

    let Some(result) = sdk.get_job_results(job_id).await? else {
        let job = sdk.get_job(job_id, false).await?;
        anyhow::bail!(
            "No results available yet for job {job_id} (status {})",
            job.status
        );
    };

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&result)
                .map_err(|e| anyhow::anyhow!("JSON serialization failed: {e}"))?;
            println!("{json}");
        }
        "table" => {
            println!(
                "{} Results for job {}",
                style("→").cyan().bold(),
                style(job_id).dim()
            );
            print_results(&result);
        }
        other => anyhow::bail!("Unknown format: '{other}'. Available: table, json"),
    }

    Ok(())
}
