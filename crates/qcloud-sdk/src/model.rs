//! Resource types exchanged with the cloud service.
//!
//! Only the fields the client routes or polls on are typed; anything else
//! the service returns is kept in `extra` so it survives a round trip.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Statuses ───────────────────────────────────────────────────────

/// Lifecycle status shared by batches, jobs and workloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Pending,
    Running,
    Done,
    Error,
    Canceled,
    TimedOut,
    Paused,
    /// A status this client does not know about.
    Unknown(String),
}

pub type BatchStatus = Status;
pub type JobStatus = Status;
pub type WorkloadStatus = Status;

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Error => "ERROR",
            Self::Canceled => "CANCELED",
            Self::TimedOut => "TIMED_OUT",
            Self::Paused => "PAUSED",
            Self::Unknown(s) => s,
        }
    }

    /// Queued or executing.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Anything that is not pending, unknown statuses included.
    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl From<String> for Status {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "DONE" => Self::Done,
            "ERROR" => Self::Error,
            "CANCELED" => Self::Canceled,
            "TIMED_OUT" => Self::TimedOut,
            "PAUSED" => Self::Paused,
            _ => Self::Unknown(s),
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        match status {
            Status::Unknown(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl FromStr for Status {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_ascii_uppercase()))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling queue of a batch. `High` runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueuePriority {
    Low,
    Medium,
    High,
}

impl QueuePriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

/// Target a batch runs on: the QPU or one of the emulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    #[default]
    Fresnel,
    EmuFree,
    EmuTn,
    EmuMps,
    EmuSv,
    EmuFresnel,
}

impl DeviceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fresnel => "FRESNEL",
            Self::EmuFree => "EMU_FREE",
            Self::EmuTn => "EMU_TN",
            Self::EmuMps => "EMU_MPS",
            Self::EmuSv => "EMU_SV",
            Self::EmuFresnel => "EMU_FRESNEL",
        }
    }

    pub fn is_emulator(self) -> bool {
        !matches!(self, Self::Fresnel)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "FRESNEL" => Ok(Self::Fresnel),
            "EMU_FREE" => Ok(Self::EmuFree),
            "EMU_TN" => Ok(Self::EmuTn),
            "EMU_MPS" => Ok(Self::EmuMps),
            "EMU_SV" => Ok(Self::EmuSv),
            "EMU_FRESNEL" => Ok(Self::EmuFresnel),
            other => Err(format!("unknown device type '{other}'")),
        }
    }
}

// ─── Envelope ───────────────────────────────────────────────────────

/// JSend response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct JSend<T> {
    pub status: String,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

/// Position of a page within a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Items matching the query across all pages.
    pub total: u64,
    pub offset: u64,
}

// ─── Resources ──────────────────────────────────────────────────────

/// A group of jobs sharing one serialized sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub status: BatchStatus,
    #[serde(default)]
    pub open: Option<bool>,
    #[serde(default)]
    pub complete: Option<bool>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub start_datetime: Option<String>,
    #[serde(default)]
    pub end_datetime: Option<String>,
    #[serde(default)]
    pub device_status: Option<String>,
    #[serde(default)]
    pub webhook: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub jobs_count: u64,
    #[serde(default)]
    pub jobs_count_per_status: FxHashMap<String, u64>,
    #[serde(default)]
    pub configuration: Option<Value>,
    #[serde(default)]
    pub backend_configuration: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub sequence_builder: Option<String>,
    /// Jobs in creation order, when the service includes them.
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Batch {
    /// Whether any job of the batch is still queued or running.
    ///
    /// Falls back to the batch status when no jobs are attached.
    pub fn has_pending_jobs(&self) -> bool {
        if self.jobs.is_empty() {
            return self.status.is_pending();
        }
        self.jobs.iter().any(|job| job.status.is_pending())
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }
}

/// A single execution request inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub runs: u64,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub start_timestamp: Option<String>,
    #[serde(default)]
    pub end_timestamp: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
    #[serde(default)]
    pub variables: Option<Value>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A non-batch computation on a named backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workload {
    pub id: String,
    pub status: WorkloadStatus,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub workload_type: Option<String>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub start_timestamp: Option<String>,
    #[serde(default)]
    pub end_timestamp: Option<String>,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Downloaded results of a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobResult {
    /// Bitstring histogram.
    #[serde(default)]
    pub counter: Option<Value>,
    /// Per-shot samples.
    #[serde(default)]
    pub raw: Option<Value>,
    /// Any other result types.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobResult {
    /// The counter as bitstring → count, if it has that shape.
    pub fn counts(&self) -> Option<FxHashMap<String, u64>> {
        let counter = self.counter.as_ref()?.as_object()?;
        counter
            .iter()
            .map(|(bits, n)| n.as_u64().map(|n| (bits.clone(), n)))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResultsLink {
    #[serde(default)]
    pub results_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PublicDeviceSpec {
    pub device_type: String,
    pub specs: String,
}

/// Device type → serialized device specification.
pub type DeviceSpecs = FxHashMap<String, String>;

/// A project the user belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Outcome of a bulk batch cancellation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchCancellation {
    #[serde(default)]
    pub batches: Vec<Batch>,
    /// Batch id → reason it could not be cancelled.
    #[serde(default)]
    pub errors: FxHashMap<String, String>,
}

/// Outcome of a bulk job cancellation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobCancellation {
    #[serde(default)]
    pub jobs: Vec<Job>,
    /// Job id → reason it could not be cancelled.
    #[serde(default)]
    pub errors: FxHashMap<String, String>,
}

// ─── Requests ───────────────────────────────────────────────────────

/// A job to create inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateJob {
    pub runs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

impl CreateJob {
    pub fn new(runs: u64) -> Self {
        Self {
            runs,
            variables: None,
        }
    }

    /// Values for a parametrized sequence.
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }
}

/// Body of a batch creation request.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest {
    pub sequence_builder: String,
    pub jobs: Vec<CreateJob>,
    pub open: bool,
    pub device_type: DeviceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_configuration: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    /// Filled in from the client configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl BatchRequest {
    /// A closed batch on the QPU running `serialized_sequence`.
    pub fn new(serialized_sequence: impl Into<String>) -> Self {
        Self {
            sequence_builder: serialized_sequence.into(),
            jobs: Vec::new(),
            open: false,
            device_type: DeviceType::default(),
            configuration: None,
            backend_configuration: None,
            tags: Vec::new(),
            webhook: None,
            project_id: None,
        }
    }

    pub fn with_job(mut self, job: CreateJob) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn with_jobs(mut self, jobs: impl IntoIterator<Item = CreateJob>) -> Self {
        self.jobs.extend(jobs);
        self
    }

    /// Keep the batch open so more jobs can be added later.
    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn on_device(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Emulator-specific configuration.
    pub fn with_configuration(mut self, configuration: Value) -> Self {
        self.configuration = Some(configuration);
        self
    }

    pub fn with_backend_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.backend_configuration = Some(configuration.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_webhook(mut self, webhook: impl Into<String>) -> Self {
        self.webhook = Some(webhook.into());
        self
    }
}

/// Body of a workload creation request.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadRequest {
    pub workload_type: String,
    pub backend: String,
    pub config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl WorkloadRequest {
    pub fn new(workload_type: impl Into<String>, backend: impl Into<String>, config: Value) -> Self {
        Self {
            workload_type: workload_type.into(),
            backend: backend.into(),
            config,
            project_id: None,
        }
    }
}
