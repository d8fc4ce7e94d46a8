//! Submit command implementation.
//!
//! Create a batch from a serialized sequence file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use qcloud_sdk::{BatchRequest, CreateJob, DeviceType};
use tracing::debug;

use super::common::{GlobalArgs, connect, spinner, styled_status};

/// What to submit besides the sequence itself.
#[derive(Debug, Clone)]
pub struct SubmitOptions {
    pub runs: u64,
    pub jobs: u32,
    pub device: DeviceType,
    pub open: bool,
    pub tags: Vec<String>,
    pub wait: bool,
}

/// Read a serialized sequence, rejecting empty files.
pub fn load_sequence(path: &str) -> Result<String> {
    if !Path::new(path).exists() {
        anyhow::bail!("File not found: {path}");
    }
    let sequence =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {path}"))?;
    if sequence.trim().is_empty() {
        anyhow::bail!("Sequence file is empty: {path}");
    }
    debug!(path, bytes = sequence.len(), "loaded sequence");
    Ok(sequence)
}

/// Execute the submit command.
pub async fn execute(globals: &GlobalArgs, sequence_path: &str, options: SubmitOptions) -> Result<()> {
    if options.runs == 0 {
        anyhow::bail!("--runs must be at least 1");
    }
    if options.jobs == 0 && !options.open {
        anyhow::bail!("A closed batch needs at least one job");
    }

    let sequence = load_sequence(sequence_path)?;
    let sdk = connect(globals).await?;

    let request = BatchRequest::new(sequence)
        .with_jobs((0..options.jobs).map(|_| CreateJob::new(options.runs)))
        .on_device(options.device)
        .with_tags(options.tags);
    let request = if options.open { request.open() } else { request };

    println!(
        "{} Submitting {} job(s) x {} runs to {}",
        style("→").cyan().bold(),
        options.jobs,
        options.runs,
        style(options.device).yellow()
    );

    let batch = if options.wait {
        let progress = spinner("Waiting for jobs to finish...");
        let batch = sdk.create_batch(request, true).await;
        progress.finish_and_clear();
        batch?
    } else {
        sdk.create_batch(request, false).await?
    };

    println!(
        "{} Batch {} is {}",
        style("✓").green().bold(),
        style(&batch.id).bold(),
        styled_status(&batch.status)
    );

    if !batch.jobs.is_empty() {
        println!();
        for job in &batch.jobs {
            println!("  {}  {}", style(&job.id).dim(), styled_status(&job.status));
        }
    }

    if !options.wait {
        println!(
            "\n  Follow it with: qcloud wait batch {}",
            style(&batch.id).cyan()
        );
    }

    Ok(())
}
