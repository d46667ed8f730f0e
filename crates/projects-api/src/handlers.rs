//! HTTP request handlers for the projects API.
//!
//! Each handler parses its input, runs one store operation on the blocking
//! pool, and maps the outcome to a status code. Failures are JSON bodies of
//! the form `{"error": "..."}`.

use crate::routes::{route_listing, Endpoint, Route};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{on, MethodFilter, MethodRouter},
    Router as AxumRouter,
};
use projects_domain::{KvBackend, Project};
use projects_store::{CrudError, ErrorKind, ProjectStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, warn};

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Store shared by all requests
pub type SharedStore = Arc<ProjectStore<Arc<dyn KvBackend>>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Project store
    pub store: SharedStore,
    /// Route table the router was built from
    pub routes: Arc<[Route]>,
}

impl AppState {
    /// State over `backend` with the given route table
    pub fn new(backend: Arc<dyn KvBackend>, routes: Vec<Route>) -> Self {
        Self {
            store: Arc::new(ProjectStore::new(backend)),
            routes: routes.into(),
        }
    }
}

/// Response body of `GET /projects`
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectListResponse {
    /// Number of projects
    pub count: usize,
    /// The projects
    pub projects: Vec<Project>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

/// Application error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Map a store error; `server_status` is used for server-class errors
    fn from_store(err: CrudError, server_status: StatusCode) -> Self {
        let status = match err.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ if err.is_server_error() => server_status,
            _ => StatusCode::BAD_REQUEST,
        };

        if err.is_server_error() {
            error!("{}", err);
        } else {
            debug!("{}", err);
        }

        Self::new(status, err.message())
    }

    fn not_found(name: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("Project with name `{}` does not exist", name),
        )
    }

    fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        error!("{}", message);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Status code of this error
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Run a store operation on the blocking pool
async fn with_store<T, F>(state: &AppState, op: F) -> Result<Result<T, CrudError>, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&ProjectStore<Arc<dyn KvBackend>>) -> Result<T, CrudError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ApiError::internal(format!("store task failed: {}", e)))
}

/// Parse a request body as a project; failures are 422
fn parse_project(body: &Bytes) -> Result<Project, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected project body: {}", e);
        ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    })
}

/// GET / - Available routes and their methods
async fn list_routes(State(state): State<AppState>) -> Json<BTreeMap<String, Vec<String>>> {
    Json(route_listing(&state.routes))
}

/// GET /projects - All projects
async fn list_projects(State(state): State<AppState>) -> Result<Json<ProjectListResponse>, ApiError> {
    let projects = with_store(&state, |store| store.list())
        .await?
        .map_err(|e| ApiError::from_store(e, StatusCode::SERVICE_UNAVAILABLE))?;

    Ok(Json(ProjectListResponse {
        count: projects.len(),
        projects,
    }))
}

/// GET /projects/{name} - One project
async fn read_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Project>, ApiError> {
    let lookup = name.clone();
    let project = with_store(&state, move |store| store.read(&lookup))
        .await?
        .map_err(|e| ApiError::from_store(e, StatusCode::SERVICE_UNAVAILABLE))?;

    project.map(Json).ok_or_else(|| ApiError::not_found(&name))
}

/// POST /projects - Create a project
async fn create_project(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let project = parse_project(&body)?;

    with_store(&state, move |store| store.create(&project))
        .await?
        .map_err(|e| ApiError::from_store(e, StatusCode::SERVICE_UNAVAILABLE))?;

    Ok(StatusCode::CREATED)
}

/// POST /projects/{name} - Update a project
async fn update_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let project = parse_project(&body)?;
    if !project.name.is_empty() && !project.name.eq_ignore_ascii_case(&name) {
        warn!(
            "Update of `{}` carries body name `{}`; path name wins",
            name, project.name
        );
    }

    with_store(&state, move |store| store.update(&name, &project))
        .await?
        .map_err(|e| ApiError::from_store(e, StatusCode::INTERNAL_SERVER_ERROR))?;

    Ok(StatusCode::ACCEPTED)
}

/// DELETE /projects/{name} - Delete a project
async fn delete_project(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    with_store(&state, move |store| store.delete(&name))
        .await?
        .map_err(|e| ApiError::from_store(e, StatusCode::INTERNAL_SERVER_ERROR))?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /snapshot - Acknowledged, nothing is done
async fn snapshot() -> StatusCode {
    StatusCode::ACCEPTED
}

fn method_filter(method: &Method) -> Option<MethodFilter> {
    match *method {
        Method::GET => Some(MethodFilter::GET),
        Method::POST => Some(MethodFilter::POST),
        Method::PUT => Some(MethodFilter::PUT),
        Method::PATCH => Some(MethodFilter::PATCH),
        Method::DELETE => Some(MethodFilter::DELETE),
        Method::HEAD => Some(MethodFilter::HEAD),
        Method::OPTIONS => Some(MethodFilter::OPTIONS),
        _ => None,
    }
}

fn method_router(filter: MethodFilter, endpoint: Endpoint) -> MethodRouter<AppState> {
    match endpoint {
        Endpoint::ListRoutes => on(filter, list_routes),
        Endpoint::ListProjects => on(filter, list_projects),
        Endpoint::ReadProject => on(filter, read_project),
        Endpoint::CreateProject => on(filter, create_project),
        Endpoint::UpdateProject => on(filter, update_project),
        Endpoint::DeleteProject => on(filter, delete_project),
        Endpoint::Snapshot => on(filter, snapshot),
    }
}

/// Create the axum router from the state's route table
///
/// When `static_dir` is given its files are served under `/data/`.
pub fn create_router(state: AppState, static_dir: Option<&FsPath>) -> AxumRouter {
    let mut router = AxumRouter::new();

    for route in state.routes.iter() {
        let Some(filter) = method_filter(&route.method) else {
            warn!("Skipping route {}: unsupported method {}", route.name, route.method);
            continue;
        };
        for path in route.paths() {
            router = router.route(&path, method_router(filter, route.endpoint));
        }
    }

    if let Some(dir) = static_dir {
        router = router.nest_service("/data", ServeDir::new(dir));
    }

    router
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::default_routes;
    use axum::body::Body;
    use axum::http::Request;
    use projects_store::MemoryBackend;
    use tower::ServiceExt; // for oneshot

    fn create_test_state() -> AppState {
        AppState::new(Arc::new(MemoryBackend::new()), default_routes())
    }

    #[tokio::test]
    async fn test_snapshot() {
        let app = create_router(create_test_state(), None);

        let request = Request::builder()
            .method("POST")
            .uri("/snapshot")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_list_projects_empty() {
        let app = create_router(create_test_state(), None);

        let request = Request::builder()
            .uri("/projects/")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = CrudError::not_found("x", "project:x");
        let api = ApiError::from_store(err, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_maps_to_400() {
        let err = CrudError::validation(projects_store::Operation::Create, "empty");
        let api = ApiError::from_store(err, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_server_error_uses_given_status() {
        let err = CrudError::backend(
            projects_domain::BackendError::Connection("down".to_string()),
            projects_store::Operation::Delete,
            "projects",
        );
        let api = ApiError::from_store(err, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unsupported_method_has_no_filter() {
        assert!(method_filter(&Method::CONNECT).is_none());
        assert!(method_filter(&Method::DELETE).is_some());
    }
}
