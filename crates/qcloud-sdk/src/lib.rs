//! qcloud SDK
//!
//! Async client for submitting pulse-sequence batches to a quantum cloud
//! and tracking them to completion.
//!
//! # Overview
//!
//! - [`Sdk`] is the facade: batches, jobs, workloads, device specs, projects
//! - [`CloudClient`] sends requests, retries transient failures, and
//!   refreshes a rejected bearer token once
//! - [`ClientConfig`] selects the [`Environment`] and carries the project,
//!   timeouts, [`RetryPolicy`] and [`WaitOptions`]
//!
//! Authentication lives in [`qcloud_auth`]; pass an [`AuthConfig`] to
//! [`Sdk::new`] or a ready provider to [`Sdk::with_provider`].
//!
//! # Example
//!
//! ```ignore
//! use qcloud_sdk::{AuthConfig, BatchRequest, ClientConfig, CreateJob, DeviceType, Sdk};
//!
//! let config = ClientConfig::from_env()?.with_project_id("my-project");
//! let sdk = Sdk::new(config, AuthConfig::from_env()?).await?;
//!
//! let request = BatchRequest::new(serialized_sequence)
//!     .with_job(CreateJob::new(100))
//!     .on_device(DeviceType::EmuFree);
//! let batch = sdk.create_batch(request, true).await?;
//!
//! for job in &batch.jobs {
//!     if let Some(result) = sdk.get_job_results(&job.id).await? {
//!         println!("{}: {:?}", job.id, result.counts());
//!     }
//! }
//! ```

pub mod api;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod filters;
pub mod model;
pub mod retry;
mod sdk;
pub mod wait;

pub use api::CloudClient;
pub use config::ClientConfig;
pub use endpoints::{Endpoints, Environment};
pub use error::{SdkError, SdkResult};
pub use filters::{
    BatchFilters, CancelJobFilters, JobFilters, PaginationParams, RebatchFilters,
};
pub use model::{
    Batch, BatchCancellation, BatchRequest, BatchStatus, CreateJob, DeviceSpecs, DeviceType,
    JSend, Job, JobCancellation, JobResult, JobStatus, Page, Pagination, Project, QueuePriority,
    Status, Workload, WorkloadRequest, WorkloadStatus,
};
pub use retry::RetryPolicy;
pub use sdk::Sdk;
pub use wait::WaitOptions;

pub use qcloud_auth::{self, AuthConfig, AuthError, TokenProvider};
