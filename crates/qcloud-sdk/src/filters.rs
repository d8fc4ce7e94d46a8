//! Query filters and pagination for listing endpoints.
//!
//! Every filter field is optional. A field holding one value and a field
//! holding several both serialize as repeated query keys, and the service
//! matches any of them. Id-like fields must be UUIDs; this is checked when
//! the query is built, before anything is sent.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{SdkError, SdkResult};
use crate::model::{QueuePriority, Status};

/// Query string pairs, keys possibly repeated.
pub type Query = Vec<(&'static str, String)>;

/// Largest page the service returns.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Offset and page size for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationParams {
    offset: u32,
    limit: u32,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: MAX_PAGE_SIZE,
        }
    }
}

impl PaginationParams {
    /// Fails unless `offset >= 0` and `0 < limit <= 100`.
    pub fn new(offset: i64, limit: i64) -> SdkResult<Self> {
        let offset = u32::try_from(offset).map_err(|_| {
            SdkError::InvalidFilter(format!("offset must be 0 or greater, got {offset}"))
        })?;
        if limit <= 0 || limit > i64::from(MAX_PAGE_SIZE) {
            return Err(SdkError::InvalidFilter(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"
            )));
        }
        Ok(Self {
            offset,
            limit: limit as u32,
        })
    }

    /// First page of at most `limit` items.
    pub fn first(limit: i64) -> SdkResult<Self> {
        Self::new(0, limit)
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// The page after this one.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }

    pub(crate) fn append_to(&self, query: &mut Query) {
        query.push(("offset", self.offset.to_string()));
        query.push(("limit", self.limit.to_string()));
    }
}

struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    fn new() -> Self {
        Self { query: Vec::new() }
    }

    fn uuids(mut self, key: &'static str, values: &[String]) -> SdkResult<Self> {
        for value in values {
            Uuid::parse_str(value).map_err(|_| {
                SdkError::InvalidFilter(format!("{key}: cannot convert '{value}' to UUID"))
            })?;
            self.query.push((key, value.clone()));
        }
        Ok(self)
    }

    fn strings(mut self, key: &'static str, values: &[String]) -> Self {
        self.query
            .extend(values.iter().map(|value| (key, value.clone())));
        self
    }

    fn statuses(mut self, key: &'static str, values: &[Status]) -> Self {
        self.query
            .extend(values.iter().map(|status| (key, status.as_str().to_string())));
        self
    }

    fn opt<T: ToString>(mut self, key: &'static str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.query.push((key, value.to_string()));
        }
        self
    }

    fn date(self, key: &'static str, value: Option<DateTime<Utc>>) -> Self {
        self.opt(key, value.map(|d| d.to_rfc3339()))
    }

    fn runs(self, min: Option<u64>, max: Option<u64>) -> SdkResult<Self> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(SdkError::InvalidFilter(format!(
                    "min_runs ({min}) is greater than max_runs ({max})"
                )));
            }
        }
        Ok(self.opt("min_runs", min).opt("max_runs", max))
    }

    fn dates(self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> SdkResult<Self> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(SdkError::InvalidFilter(
                    "start_date is after end_date".to_string(),
                ));
            }
        }
        Ok(self.date("start_date", start).date("end_date", end))
    }

    fn build(self) -> Query {
        self.query
    }
}

/// Filters for listing jobs.
#[derive(Debug, Clone, Default)]
pub struct JobFilters {
    pub id: Vec<String>,
    pub project_id: Vec<String>,
    pub user_id: Vec<String>,
    pub batch_id: Vec<String>,
    pub status: Vec<Status>,
    pub min_runs: Option<u64>,
    pub max_runs: Option<u64>,
    /// Only jobs with (or without) errors.
    pub errors: Option<bool>,
    /// Created at or after.
    pub start_date: Option<DateTime<Utc>>,
    /// Created at or before.
    pub end_date: Option<DateTime<Utc>>,
}

impl JobFilters {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id.push(id.into());
        self
    }

    pub fn batch_id(mut self, id: impl Into<String>) -> Self {
        self.batch_id.push(id.into());
        self
    }

    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id.push(id.into());
        self
    }

    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id.push(id.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status.push(status);
        self
    }

    pub fn with_errors(mut self, errors: bool) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn created_between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn to_query(&self) -> SdkResult<Query> {
        Ok(QueryBuilder::new()
            .uuids("id", &self.id)?
            .uuids("project_id", &self.project_id)?
            .strings("user_id", &self.user_id)
            .uuids("batch_id", &self.batch_id)?
            .statuses("status", &self.status)
            .runs(self.min_runs, self.max_runs)?
            .opt("errors", self.errors)
            .dates(self.start_date, self.end_date)?
            .build())
    }
}

/// Filters for listing batches.
#[derive(Debug, Clone, Default)]
pub struct BatchFilters {
    pub id: Vec<String>,
    pub project_id: Vec<String>,
    pub user_id: Vec<String>,
    pub device_type: Vec<String>,
    pub status: Vec<Status>,
    /// Whether the batch still accepts jobs.
    pub open: Option<bool>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub queue_priority: Vec<QueuePriority>,
    pub tag: Option<String>,
}

impl BatchFilters {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id.push(id.into());
        self
    }

    pub fn project_id(mut self, id: impl Into<String>) -> Self {
        self.project_id.push(id.into());
        self
    }

    pub fn device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type.push(device_type.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status.push(status);
        self
    }

    pub fn open(mut self, open: bool) -> Self {
        self.open = Some(open);
        self
    }

    pub fn queue_priority(mut self, priority: QueuePriority) -> Self {
        self.queue_priority.push(priority);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn to_query(&self) -> SdkResult<Query> {
        let mut builder = QueryBuilder::new()
            .uuids("id", &self.id)?
            .uuids("project_id", &self.project_id)?
            .strings("user_id", &self.user_id)
            .strings("device_type", &self.device_type)
            .statuses("status", &self.status)
            .opt("open", self.open)
            .dates(self.start_date, self.end_date)?;
        for priority in &self.queue_priority {
            builder = builder.opt("queue_priority", Some(priority.as_str()));
        }
        Ok(builder.opt("tag", self.tag.as_deref()).build())
    }
}

/// Selects the jobs of a batch to cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelJobFilters {
    pub id: Vec<String>,
    pub min_runs: Option<u64>,
    pub max_runs: Option<u64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl CancelJobFilters {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id.push(id.into());
        self
    }

    pub fn to_query(&self) -> SdkResult<Query> {
        Ok(QueryBuilder::new()
            .uuids("id", &self.id)?
            .runs(self.min_runs, self.max_runs)?
            .dates(self.start_date, self.end_date)?
            .build())
    }
}

/// Selects the jobs of a batch to re-create in a new batch.
#[derive(Debug, Clone, Default)]
pub struct RebatchFilters {
    pub id: Vec<String>,
    pub status: Vec<Status>,
    pub min_runs: Option<u64>,
    pub max_runs: Option<u64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl RebatchFilters {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id.push(id.into());
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status.push(status);
        self
    }

    pub fn to_query(&self) -> SdkResult<Query> {
        Ok(QueryBuilder::new()
            .uuids("id", &self.id)?
            .statuses("status", &self.status)
            .runs(self.min_runs, self.max_runs)?
            .dates(self.start_date, self.end_date)?
            .build())
    }
}
