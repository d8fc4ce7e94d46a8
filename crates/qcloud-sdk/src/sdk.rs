//! High-level facade over the cloud API.

use std::sync::Arc;

use qcloud_auth::{AuthConfig, SystemClock, TokenProvider};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::api::CloudClient;
use crate::config::ClientConfig;
use crate::error::{SdkError, SdkResult};
use crate::filters::{
    BatchFilters, CancelJobFilters, JobFilters, PaginationParams, Query, RebatchFilters,
};
use crate::model::{
    Batch, BatchCancellation, BatchRequest, CreateJob, DeviceSpecs, JSend, Job, JobCancellation,
    JobResult, Page, Project, PublicDeviceSpec, ResultsLink, Workload, WorkloadRequest,
};
use crate::wait::poll_until;

/// Entry point for submitting and tracking work on the cloud.
///
/// Cheap to clone; clones share the HTTP connection pool and token cache.
#[derive(Debug, Clone)]
pub struct Sdk {
    client: CloudClient,
}

impl Sdk {
    /// Connect with optional credentials.
    ///
    /// Password credentials are exchanged once up front so that a wrong
    /// password fails here rather than on the first request.
    pub async fn new(config: ClientConfig, auth: Option<AuthConfig>) -> SdkResult<Self> {
        let Some(auth) = auth else {
            return Self::anonymous(config);
        };

        let eager = auth.is_password();
        let provider = auth.into_provider(
            &config.identity,
            config.provider.clone(),
            Arc::new(SystemClock),
        )?;
        if eager {
            provider.get_token().await?;
            debug!("credentials validated");
        }
        Self::with_provider(config, Arc::new(provider))
    }

    /// Connect with a caller-supplied token provider.
    pub fn with_provider(config: ClientConfig, provider: Arc<dyn TokenProvider>) -> SdkResult<Self> {
        Ok(Self {
            client: CloudClient::new(config, Some(provider))?,
        })
    }

    /// A client limited to public endpoints.
    pub fn anonymous(config: ClientConfig) -> SdkResult<Self> {
        Ok(Self {
            client: CloudClient::new(config, None)?,
        })
    }

    pub fn client(&self) -> &CloudClient {
        &self.client
    }

    pub fn config(&self) -> &ClientConfig {
        self.client.config()
    }

    /// The bearer token requests are currently sent with.
    pub async fn user_token(&self) -> SdkResult<Option<String>> {
        self.client.user_token().await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        query: &[(&str, String)],
    ) -> SdkResult<T> {
        let url = self.client.core_url(path);
        let response: JSend<T> = self
            .client
            .authenticated_request(method, &url, body.as_ref(), query)
            .await?;
        Ok(response.data)
    }

    async fn page<T: DeserializeOwned>(
        &self,
        path: &str,
        mut query: Query,
        pagination: PaginationParams,
    ) -> SdkResult<Page<T>> {
        pagination.append_to(&mut query);
        let url = self.client.core_url(path);
        let response: JSend<Vec<T>> = self
            .client
            .authenticated_request(Method::GET, &url, None, &query)
            .await?;

        let total = response
            .pagination
            .map_or(response.data.len() as u64, |p| p.total);
        Ok(Page {
            items: response.data,
            total,
            offset: u64::from(pagination.offset()),
        })
    }

    // ─── Batches ────────────────────────────────────────────────────

    /// Create a batch in the configured project.
    ///
    /// With `wait`, returns once no job of the batch is pending.
    #[instrument(skip(self, request), fields(device = %request.device_type, jobs = request.jobs.len()))]
    pub async fn create_batch(&self, mut request: BatchRequest, wait: bool) -> SdkResult<Batch> {
        let config = self.config();
        request.project_id = Some(config.require_project_id()?.to_string());
        if request.webhook.is_none() {
            request.webhook = config.webhook.clone();
        }

        let body = serde_json::to_value(&request)?;
        let batch: Batch = self
            .call(Method::POST, "/api/v1/batches", Some(body), &[])
            .await?;
        info!(batch_id = %batch.id, status = %batch.status, "batch created");

        if wait {
            return self.wait_for_batch(&batch.id).await;
        }
        Ok(batch)
    }

    #[instrument(skip(self))]
    pub async fn get_batch(&self, id: &str) -> SdkResult<Batch> {
        self.call(Method::GET, &format!("/api/v2/batches/{id}"), None, &[])
            .await
    }

    /// One page of the batches matching `filters`.
    #[instrument(skip(self, filters))]
    pub async fn get_batches(
        &self,
        filters: &BatchFilters,
        pagination: PaginationParams,
    ) -> SdkResult<Page<Batch>> {
        self.page("/api/v1/batches", filters.to_query()?, pagination)
            .await
    }

    /// Every job of a batch, in creation order.
    #[instrument(skip(self))]
    pub async fn get_batch_jobs(&self, batch_id: &str) -> SdkResult<Vec<Job>> {
        let query = [
            ("batch_id", batch_id.to_string()),
            ("order_by", "creation_order".to_string()),
            ("order_by_direction", "ASC".to_string()),
        ];
        let url = self.client.core_url("/api/v2/jobs");
        self.client
            .request_all_pages(Method::GET, &url, None, &query)
            .await
    }

    /// Declare that no more jobs will be added to an open batch.
    #[instrument(skip(self))]
    pub async fn close_batch(&self, id: &str) -> SdkResult<Batch> {
        let batch: Batch = self
            .call(Method::PATCH, &format!("/api/v2/batches/{id}/complete"), None, &[])
            .await?;
        info!(batch_id = %batch.id, "batch closed");
        Ok(batch)
    }

    #[instrument(skip(self))]
    pub async fn cancel_batch(&self, id: &str) -> SdkResult<Batch> {
        let batch: Batch = self
            .call(Method::PATCH, &format!("/api/v2/batches/{id}/cancel"), None, &[])
            .await?;
        info!(batch_id = %batch.id, status = %batch.status, "batch cancelled");
        Ok(batch)
    }

    /// Cancel several batches; per-batch failures are reported, not raised.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn cancel_batches(&self, ids: &[String]) -> SdkResult<BatchCancellation> {
        let outcome: BatchCancellation = self
            .call(
                Method::PATCH,
                "/api/v1/batches/cancel",
                Some(json!({ "batch_ids": ids })),
                &[],
            )
            .await?;
        info!(
            cancelled = outcome.batches.len(),
            failed = outcome.errors.len(),
            "bulk batch cancellation"
        );
        Ok(outcome)
    }

    /// Create a new batch retrying the jobs of `id` that match `filters`.
    #[instrument(skip(self, filters))]
    pub async fn rebatch(&self, id: &str, filters: &RebatchFilters) -> SdkResult<Batch> {
        let query = filters.to_query()?;
        let batch: Batch = self
            .call(Method::POST, &format!("/api/v1/batches/{id}/rebatch"), None, &query)
            .await?;
        info!(parent = id, batch_id = %batch.id, "rebatched");
        Ok(batch)
    }

    /// Replace the tags of a batch.
    #[instrument(skip(self, tags))]
    pub async fn set_batch_tags(&self, id: &str, tags: &[String]) -> SdkResult<Batch> {
        self.call(
            Method::PATCH,
            &format!("/api/v1/batches/{id}/tags"),
            Some(json!(tags)),
            &[],
        )
        .await
    }

    /// Poll until the batch is terminal or none of its jobs is pending.
    ///
    /// The returned batch carries its jobs in creation order.
    #[instrument(skip(self))]
    pub async fn wait_for_batch(&self, id: &str) -> SdkResult<Batch> {
        poll_until(
            &self.config().wait,
            "batch",
            id,
            || async move {
                let mut batch = self.get_batch(id).await?;
                batch.jobs = self.get_batch_jobs(id).await?;
                Ok::<_, SdkError>(batch)
            },
            |batch: &Batch| {
                batch.status.is_terminal() || !batch.jobs.iter().any(|job| job.status.is_pending())
            },
        )
        .await
    }

    // ─── Jobs ───────────────────────────────────────────────────────

    /// Append jobs to an open batch.
    #[instrument(skip(self, jobs), fields(count = jobs.len()))]
    pub async fn add_jobs(&self, batch_id: &str, jobs: Vec<CreateJob>) -> SdkResult<Batch> {
        let body = serde_json::to_value(&jobs)?;
        self.call(
            Method::POST,
            &format!("/api/v2/batches/{batch_id}/jobs"),
            Some(body),
            &[],
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_job(&self, id: &str, wait: bool) -> SdkResult<Job> {
        if wait {
            return self.wait_for_job(id).await;
        }
        self.fetch_job(id).await
    }

    async fn fetch_job(&self, id: &str) -> SdkResult<Job> {
        self.call(Method::GET, &format!("/api/v2/jobs/{id}"), None, &[])
            .await
    }

    /// One page of the jobs matching `filters`.
    #[instrument(skip(self, filters))]
    pub async fn get_jobs(
        &self,
        filters: &JobFilters,
        pagination: PaginationParams,
    ) -> SdkResult<Page<Job>> {
        self.page("/api/v2/jobs", filters.to_query()?, pagination)
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_job(&self, id: &str) -> SdkResult<Job> {
        let job: Job = self
            .call(Method::PATCH, &format!("/api/v2/jobs/{id}/cancel"), None, &[])
            .await?;
        info!(job_id = %job.id, status = %job.status, "job cancelled");
        Ok(job)
    }

    /// Cancel the jobs of a batch matching `filters`.
    #[instrument(skip(self, filters))]
    pub async fn cancel_jobs(
        &self,
        batch_id: &str,
        filters: &CancelJobFilters,
    ) -> SdkResult<JobCancellation> {
        let query = filters.to_query()?;
        let outcome: JobCancellation = self
            .call(
                Method::PATCH,
                &format!("/api/v2/batches/{batch_id}/cancel/jobs"),
                None,
                &query,
            )
            .await?;
        info!(
            batch_id,
            cancelled = outcome.jobs.len(),
            failed = outcome.errors.len(),
            "bulk job cancellation"
        );
        Ok(outcome)
    }

    /// Download the results of a job, `None` while none are available.
    #[instrument(skip(self))]
    pub async fn get_job_results(&self, id: &str) -> SdkResult<Option<JobResult>> {
        let link: ResultsLink = self
            .call(Method::GET, &format!("/api/v1/jobs/{id}/results_link"), None, &[])
            .await?;
        match link.results_link {
            Some(url) => Ok(Some(self.client.download_results(&url).await?)),
            None => {
                debug!(job_id = id, "no results link yet");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn wait_for_job(&self, id: &str) -> SdkResult<Job> {
        poll_until(
            &self.config().wait,
            "job",
            id,
            || self.fetch_job(id),
            |job: &Job| job.status.is_terminal(),
        )
        .await
    }

    // ─── Workloads ──────────────────────────────────────────────────

    #[instrument(skip(self, request), fields(workload_type = %request.workload_type, backend = %request.backend))]
    pub async fn create_workload(
        &self,
        mut request: WorkloadRequest,
        wait: bool,
    ) -> SdkResult<Workload> {
        request.project_id = Some(self.config().require_project_id()?.to_string());

        let body = serde_json::to_value(&request)?;
        let workload: Workload = self
            .call(Method::POST, "/api/v1/workloads", Some(body), &[])
            .await?;
        info!(workload_id = %workload.id, "workload created");

        if wait {
            return self.wait_for_workload(&workload.id).await;
        }
        Ok(workload)
    }

    #[instrument(skip(self))]
    pub async fn get_workload(&self, id: &str, wait: bool) -> SdkResult<Workload> {
        if wait {
            return self.wait_for_workload(id).await;
        }
        self.fetch_workload(id).await
    }

    async fn fetch_workload(&self, id: &str) -> SdkResult<Workload> {
        self.call(Method::GET, &format!("/api/v2/workloads/{id}"), None, &[])
            .await
    }

    #[instrument(skip(self))]
    pub async fn cancel_workload(&self, id: &str) -> SdkResult<Workload> {
        let workload: Workload = self
            .call(Method::PUT, &format!("/api/v1/workloads/{id}/cancel"), None, &[])
            .await?;
        info!(workload_id = %workload.id, status = %workload.status, "workload cancelled");
        Ok(workload)
    }

    #[instrument(skip(self))]
    pub async fn wait_for_workload(&self, id: &str) -> SdkResult<Workload> {
        poll_until(
            &self.config().wait,
            "workload",
            id,
            || self.fetch_workload(id),
            |workload: &Workload| workload.status.is_terminal(),
        )
        .await
    }

    // ─── Devices & projects ─────────────────────────────────────────

    /// Device type → serialized specs. Anonymous clients get the public set.
    #[instrument(skip(self))]
    pub async fn get_device_specs(&self) -> SdkResult<DeviceSpecs> {
        if self.client.is_authenticated() {
            return self
                .call(Method::GET, "/api/v1/devices/specs", None, &[])
                .await;
        }
        self.get_public_device_specs().await
    }

    /// Specs published without authentication.
    #[instrument(skip(self))]
    pub async fn get_public_device_specs(&self) -> SdkResult<DeviceSpecs> {
        let url = self.client.core_url("/api/v1/devices/public-specs");
        let response: JSend<Vec<PublicDeviceSpec>> =
            self.client.public_request(Method::GET, &url, &[]).await?;
        Ok(response
            .data
            .into_iter()
            .map(|device| (device.device_type, device.specs))
            .collect())
    }

    /// Active projects the user is a member of.
    #[instrument(skip(self))]
    pub async fn get_all_active_projects(&self) -> SdkResult<Vec<Project>> {
        let url = self.client.account_url("/api/v1/projects");
        let query = [("project_status", "ACTIVE".to_string())];
        let response: JSend<Vec<Project>> = self
            .client
            .authenticated_request(Method::GET, &url, None, &query)
            .await?;
        Ok(response.data)
    }
}
