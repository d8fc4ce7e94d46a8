//! In-process stand-in for the cloud API, served on a random local port.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use qcloud_auth::{ExpiringTokenProvider, IdentityConfig, StaticTokenSource, TokenProvider};
use qcloud_sdk::{ClientConfig, Endpoints, RetryPolicy, WaitOptions};
use rustc_hash::FxHashMap;
use serde_json::{Value, json};

pub const PROJECT_ID: &str = "6b9d5d4e-3c62-4b0a-9a4a-0d8d2a4b7f10";
pub const BATCH_ID: &str = "00000000-0000-0000-0000-0000000000b1";
pub const VALID_TOKEN: &str = "tok-1";
pub const PASSWORD: &str = "correct horse";

/// One request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub bearer: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Recorded {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub struct MockCloud {
    base: OnceLock<String>,
    pub accepted_token: Mutex<String>,
    /// Statuses served, in order, before normal handling resumes.
    pub fail_next: Mutex<VecDeque<u16>>,
    pub jobs_total: AtomicUsize,
    /// Job listings reported as pending before jobs finish.
    pub pending_polls: AtomicU32,
    /// Statuses a single job or workload reports, one per fetch; the last
    /// one repeats.
    lifecycles: Mutex<FxHashMap<String, VecDeque<&'static str>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: OnceLock::new(),
            accepted_token: Mutex::new(VALID_TOKEN.to_string()),
            fail_next: Mutex::new(VecDeque::new()),
            jobs_total: AtomicUsize::new(3),
            pending_polls: AtomicU32::new(0),
            lifecycles: Mutex::new(FxHashMap::default()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn base(&self) -> &str {
        self.base.get().map(String::as_str).unwrap_or_default()
    }

    pub fn fail_with(&self, statuses: &[u16]) {
        self.fail_next.lock().unwrap().extend(statuses);
    }

    pub fn lifecycle(&self, id: &str, statuses: &[&'static str]) {
        self.lifecycles
            .lock()
            .unwrap()
            .insert(id.to_string(), statuses.iter().copied().collect());
    }

    /// Next scripted status of `id`, `DONE` when unscripted.
    fn next_status(&self, id: &str) -> &'static str {
        let mut lifecycles = self.lifecycles.lock().unwrap();
        match lifecycles.get_mut(id) {
            Some(statuses) if statuses.len() > 1 => statuses.pop_front().unwrap_or("DONE"),
            Some(statuses) => statuses.front().copied().unwrap_or("DONE"),
            None => "DONE",
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

/// Serve `mock` on `127.0.0.1:0` and return its base URL.
pub async fn start(mock: Arc<MockCloud>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base = format!("http://{addr}");
    mock.base.set(base.clone()).unwrap();

    let app = Router::new().fallback(handle).with_state(mock);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    base
}

/// Client configuration pointed at the mock, with fast retries and polls.
pub fn config(base: &str) -> ClientConfig {
    ClientConfig::default()
        .with_endpoints(Endpoints::single_host(base))
        .with_identity(IdentityConfig::auth0(
            format!("{base}/oauth/token"),
            "test-client",
            "test-audience",
            "users",
        ))
        .with_project_id(PROJECT_ID)
        .with_retry(RetryPolicy::default().with_base_delay(Duration::from_millis(1)))
        .with_wait(
            WaitOptions::default()
                .with_poll_interval(Duration::from_millis(10))
                .with_timeout(Duration::from_secs(5)),
        )
}

pub fn static_provider(token: &str) -> Arc<dyn TokenProvider> {
    Arc::new(ExpiringTokenProvider::new(Arc::new(StaticTokenSource::new(
        token,
    ))))
}

fn envelope(data: Value) -> Response {
    Json(json!({"status": "success", "code": 200, "message": "OK", "data": data})).into_response()
}

fn fail(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"status": "fail", "code": status.as_u16(), "message": message, "data": {}})),
    )
        .into_response()
}

fn job(id: &str, status: &str) -> Value {
    json!({"id": id, "status": status, "batch_id": BATCH_ID, "runs": 100})
}

async fn handle(
    State(mock): State<Arc<MockCloud>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    body: String,
) -> Response {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    let recorded = Recorded {
        method: method.clone(),
        path: uri.path().to_string(),
        bearer: bearer.clone(),
        query,
        body: serde_json::from_str(&body).ok(),
    };
    mock.requests.lock().unwrap().push(recorded.clone());

    let segments: Vec<&str> = uri.path().trim_start_matches('/').split('/').collect();

    // Unauthenticated routes.
    match (method.as_str(), segments.as_slice()) {
        ("POST", ["oauth", "token"]) => return token(&body),
        ("GET", ["results", _]) => {
            return Json(json!({"counter": {"00": 60, "11": 40}, "raw": ["00", "11"]}))
                .into_response();
        }
        ("GET", ["core-fast", "api", "v1", "devices", "public-specs"]) => {
            return envelope(json!([{"device_type": "FRESNEL", "specs": "{\"public\":true}"}]));
        }
        _ => {}
    }

    if let Some(status) = mock.fail_next.lock().unwrap().pop_front() {
        let status = StatusCode::from_u16(status).unwrap();
        return fail(status, "injected failure");
    }

    if bearer.as_deref() != Some(mock.accepted_token.lock().unwrap().as_str()) {
        return fail(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    match (method.as_str(), segments.as_slice()) {
        ("POST", ["core-fast", "api", "v1", "batches"]) => {
            let body = recorded.body.unwrap_or_default();
            envelope(json!({
                "id": BATCH_ID,
                "status": "PENDING",
                "project_id": body["project_id"],
                "webhook": body["webhook"],
                "device_type": body["device_type"],
                "open": body["open"],
            }))
        }
        ("GET", ["core-fast", "api", "v2", "batches", id]) => {
            envelope(json!({"id": id, "status": "RUNNING", "project_id": PROJECT_ID}))
        }
        ("GET", ["core-fast", "api", "v2", "jobs"]) => job_listing(&mock, &recorded),
        ("GET", ["core-fast", "api", "v2", "jobs", "missing"]) => {
            fail(StatusCode::NOT_FOUND, "Job not found")
        }
        ("GET", ["core-fast", "api", "v2", "jobs", id]) => envelope(job(id, mock.next_status(id))),
        ("POST", ["core-fast", "api", "v1", "workloads"]) => {
            let body = recorded.body.unwrap_or_default();
            envelope(json!({
                "id": "w-new",
                "status": "PENDING",
                "project_id": body["project_id"],
                "backend": body["backend"],
                "workload_type": body["workload_type"],
            }))
        }
        ("GET", ["core-fast", "api", "v2", "workloads", id]) => {
            envelope(json!({"id": id, "status": mock.next_status(id), "backend": "emu"}))
        }
        ("PATCH", ["core-fast", "api", "v1", "batches", "cancel"]) => {
            let ids: Vec<String> = recorded
                .body
                .as_ref()
                .and_then(|b| serde_json::from_value(b["batch_ids"].clone()).ok())
                .unwrap_or_default();
            let (locked, cancellable): (Vec<_>, Vec<_>) =
                ids.into_iter().partition(|id| id == "b-locked");
            let batches: Vec<Value> = cancellable
                .iter()
                .map(|id| json!({"id": id, "status": "CANCELED"}))
                .collect();
            let errors: serde_json::Map<String, Value> = locked
                .into_iter()
                .map(|id| (id, json!("batch is already done")))
                .collect();
            envelope(json!({"batches": batches, "errors": errors}))
        }
        ("GET", ["core-fast", "api", "v1", "jobs", "j-none", "results_link"]) => {
            envelope(json!({"results_link": null}))
        }
        ("GET", ["core-fast", "api", "v1", "jobs", id, "results_link"]) => {
            envelope(json!({"results_link": format!("{}/results/{id}", mock.base())}))
        }
        ("GET", ["core-fast", "api", "v1", "devices", "specs"]) => {
            envelope(json!({"FRESNEL": "{\"public\":false}", "EMU_FREE": "{}"}))
        }
        ("PUT", ["core-fast", "api", "v1", "workloads", id, "cancel"]) => {
            envelope(json!({"id": id, "status": "CANCELED", "backend": "emu"}))
        }
        ("GET", ["account", "api", "v1", "projects"]) => {
            envelope(json!([{"id": PROJECT_ID, "name": "research", "status": "ACTIVE"}]))
        }
        _ => fail(StatusCode::NOT_FOUND, "no such route"),
    }
}

fn job_listing(mock: &MockCloud, request: &Recorded) -> Response {
    let total = mock.jobs_total.load(Ordering::SeqCst);
    let offset: usize = request
        .param("offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let limit: usize = request
        .param("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);
    let end = (offset + limit).min(total);

    let pending = offset == 0
        && mock
            .pending_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
    let status = if pending { "PENDING" } else { "DONE" };

    let jobs: Vec<Value> = (offset..end)
        .map(|i| job(&format!("j-{i}"), status))
        .collect();
    Json(json!({
        "status": "success",
        "code": 200,
        "message": "OK",
        "data": jobs,
        "pagination": {"start": offset, "end": end, "total": total},
    }))
    .into_response()
}

fn token(body: &str) -> Response {
    if body.contains("password=correct+horse") || body.contains("password=correct%20horse") {
        return Json(json!({
            "access_token": "tok-pw",
            "token_type": "Bearer",
            "expires_in": 86400,
        }))
        .into_response();
    }
    (
        StatusCode::FORBIDDEN,
        Json(json!({"error": "invalid_grant", "error_description": "Wrong email or password."})),
    )
        .into_response()
}
