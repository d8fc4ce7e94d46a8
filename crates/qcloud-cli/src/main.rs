//! qcloud command-line interface
//!
//! Submit pulse-sequence batches to the quantum cloud and follow them to
//! completion.
//!
//! ```text
//! qcloud submit --sequence bell.json --runs 500 --emulator emu-free --wait
//! qcloud status batch 6b9d5d4e-...
//! qcloud result 1f0e...
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use qcloud_sdk::{DeviceType, Environment};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::GlobalArgs;
use commands::{auth, cancel, devices, projects, result, status, submit, wait};

/// qcloud - submit and track quantum jobs on the cloud
#[derive(Parser)]
#[command(name = "qcloud")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Target environment (prod, preprod, dev, sa-prod, sa-preprod)
    #[arg(long, global = true)]
    env: Option<Environment>,

    /// Project to submit work to
    #[arg(long, global = true, env = "QCLOUD_PROJECT_ID")]
    project_id: Option<String>,

    /// Account email; the password is read from QCLOUD_PASSWORD or prompted
    #[arg(long, global = true, env = "QCLOUD_USERNAME", conflicts_with = "token")]
    username: Option<String>,

    /// Pre-issued bearer token
    #[arg(long, global = true, env = "QCLOUD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Kind of resource a command acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resource {
    Batch,
    Job,
    Workload,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect credentials
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Submit a serialized sequence as a new batch
    Submit {
        /// Serialized sequence file
        #[arg(short, long)]
        sequence: String,

        /// Runs per job
        #[arg(short, long, default_value = "100")]
        runs: u64,

        /// Number of identical jobs to create
        #[arg(long, default_value = "1")]
        jobs: u32,

        /// Run on an emulator instead of the QPU (emu-free, emu-tn, emu-mps, emu-sv, emu-fresnel)
        #[arg(short, long)]
        emulator: Option<DeviceType>,

        /// Leave the batch open for more jobs
        #[arg(long)]
        open: bool,

        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Wait for every job to finish
        #[arg(short, long)]
        wait: bool,
    },

    /// Show the status of a batch, job or workload
    Status {
        #[arg(value_enum)]
        resource: Resource,

        /// Resource ID
        id: String,
    },

    /// Wait for a batch, job or workload to finish
    Wait {
        #[arg(value_enum)]
        resource: Resource,

        /// Resource ID
        id: String,

        /// Timeout in seconds
        #[arg(short, long, default_value = "86400")]
        timeout: u64,
    },

    /// Download the results of a job
    Result {
        /// Job ID
        job_id: String,

        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Cancel a batch, job or workload
    Cancel {
        #[arg(value_enum)]
        resource: Resource,

        /// Resource ID
        id: String,
    },

    /// List device types and their specs
    Devices {
        /// Print the full specs of this device type
        #[arg(short = 't', long = "type")]
        device_type: Option<String>,
    },

    /// List the active projects of the account
    Projects,
}

#[derive(Subcommand)]
enum AuthAction {
    /// Print a bearer token for the configured credentials
    Token,

    /// Show which credentials and environment are in use
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let globals = GlobalArgs {
        env: cli.env,
        project_id: cli.project_id,
        username: cli.username,
        token: cli.token,
    };

    let result = match cli.command {
        Commands::Auth { action } => match action {
            AuthAction::Token => auth::execute_token(&globals).await,
            AuthAction::Status => auth::execute_status(&globals).await,
        },

        Commands::Submit {
            sequence,
            runs,
            jobs,
            emulator,
            open,
            tags,
            wait: do_wait,
        } => {
            let options = submit::SubmitOptions {
                runs,
                jobs,
                device: emulator.unwrap_or_default(),
                open,
                tags,
                wait: do_wait,
            };
            submit::execute(&globals, &sequence, options).await
        }

        Commands::Status { resource, id } => status::execute(&globals, resource, &id).await,

        Commands::Wait {
            resource,
            id,
            timeout,
        } => wait::execute(&globals, resource, &id, timeout).await,

        Commands::Result { job_id, format } => result::execute(&globals, &job_id, &format).await,

        Commands::Cancel { resource, id } => cancel::execute(&globals, resource, &id).await,

        Commands::Devices { device_type } => {
            devices::execute(&globals, device_type.as_deref()).await
        }

        Commands::Projects => projects::execute(&globals).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
