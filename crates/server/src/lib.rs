//! DirtCloud HTTP transport.
//!
//! Decodes requests, invokes exactly one service operation per request and
//! serializes either the resource or the structured error. Status codes come
//! straight from [`dirt_core::ErrorKind::http_status`].
//!
//! ```text
//! /v1/projects[/:id]
//! /v1/instances[/:id]
//! /v1/metadata[?prefix=]   list (GET) / set from JSON (POST)
//! /v1/metadata/*path       raw value: GET / PUT / DELETE
//! ```

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, JsonRejection, PathRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, Path, Query, Request, State};
use axum::http::{header, HeaderName, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dirt_api::Service;
use dirt_core::prelude::*;
use metrics::{counter, histogram};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

pub mod auth;
pub mod config;

#[derive(Clone)]
pub struct AppState {
    svc: Service,
    token: Option<Arc<str>>,
}

impl AppState {
    /// An empty or absent token disables the bearer gate.
    pub fn new(svc: Service, token: Option<&str>) -> Self {
        let token = token.filter(|t| !t.is_empty()).map(Arc::from);
        Self { svc, token }
    }
}

/// Transport wrapper so a [`DirtError`] can become a response.
#[derive(Debug)]
pub struct ApiError(pub DirtError);

impl From<DirtError> for ApiError {
    fn from(e: DirtError) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(kind = %self.0.kind, message = %self.0.message, "request failed");
        } else {
            debug!(kind = %self.0.kind, message = %self.0.message, "request rejected");
        }
        (status, Json(self.0)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run a blocking service call off the async workers.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> DirtResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DirtError::internal(format!("worker task failed: {}", e)))?
        .map_err(ApiError)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload.map(|Json(v)| v).map_err(|rej| match rej {
        JsonRejection::BytesRejection(rej) => body_error(rej),
        rej => ApiError(DirtError::invalid_input("invalid JSON").with_detail("reason", rej.body_text())),
    })
}

fn body_error(rej: BytesRejection) -> ApiError {
    ApiError(DirtError::invalid_input("failed to read request body").with_detail("reason", rej.body_text()))
}

fn path(p: Result<Path<String>, PathRejection>) -> ApiResult<String> {
    p.map(|Path(v)| v).map_err(|rej| {
        ApiError(DirtError::invalid_input("invalid path").with_detail("reason", rej.body_text()))
    })
}

type PathArg = Result<Path<String>, PathRejection>;

/// Browser access: any origin, the API's methods, and the headers clients send.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
}

fn query<T>(q: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    q.map(|Query(v)| v).map_err(|rej| {
        ApiError(DirtError::invalid_input("invalid query").with_detail("reason", rej.body_text()))
    })
}

pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/projects", post(create_project).get(list_projects))
        .route("/projects/:id", get(get_project).patch(update_project).delete(delete_project))
        .route("/instances", post(create_instance).get(list_instances))
        .route("/instances/:id", get(get_instance).patch(update_instance).delete(delete_instance))
        .route("/metadata", get(list_metadata).post(create_metadata))
        .route("/metadata/*path", get(get_metadata).put(put_metadata).delete(delete_metadata))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_token))
        // metadata values are unbounded
        .layer(DefaultBodyLimit::disable());
    Router::new()
        .nest("/v1", v1)
        .layer(cors())
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(req: Request, next: Next) -> Response {
    let t0 = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let resp = next.run(req).await;
    let status = resp.status();
    histogram!("http_request_ms", t0.elapsed().as_secs_f64() * 1000.0);
    counter!("http_requests_total", 1u64, "status" => status.as_u16().to_string());
    if status.is_client_error() || status.is_server_error() {
        warn!(%method, %uri, status = status.as_u16(), took_ms = %t0.elapsed().as_millis(), "http request");
    } else {
        info!(%method, %uri, status = status.as_u16(), took_ms = %t0.elapsed().as_millis(), "http request");
    }
    resp
}

// ---- projects ----

async fn create_project(
    State(st): State<AppState>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let req = json_body(payload)?;
    let p = blocking(move || st.svc.create_project(req)).await?;
    Ok((StatusCode::CREATED, Json(p)))
}

async fn list_projects(
    State(st): State<AppState>,
    q: Result<Query<ProjectFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Project>>> {
    let filter = query(q)?;
    Ok(Json(blocking(move || st.svc.list_projects(&filter)).await?))
}

async fn get_project(State(st): State<AppState>, id: PathArg) -> ApiResult<Json<Project>> {
    let id = path(id)?;
    Ok(Json(blocking(move || st.svc.get_project(&id)).await?))
}

async fn update_project(
    State(st): State<AppState>,
    id: PathArg,
    payload: Result<Json<UpdateProjectRequest>, JsonRejection>,
) -> ApiResult<Json<Project>> {
    let id = path(id)?;
    let req = json_body(payload)?;
    Ok(Json(blocking(move || st.svc.update_project(&id, req)).await?))
}

async fn delete_project(State(st): State<AppState>, id: PathArg) -> ApiResult<StatusCode> {
    let id = path(id)?;
    blocking(move || st.svc.delete_project(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- instances ----

async fn create_instance(
    State(st): State<AppState>,
    payload: Result<Json<CreateInstanceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Instance>)> {
    let req = json_body(payload)?;
    let i = blocking(move || st.svc.create_instance(req)).await?;
    Ok((StatusCode::CREATED, Json(i)))
}

async fn list_instances(
    State(st): State<AppState>,
    q: Result<Query<InstanceFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<Instance>>> {
    let filter = query(q)?;
    Ok(Json(blocking(move || st.svc.list_instances(&filter)).await?))
}

async fn get_instance(State(st): State<AppState>, id: PathArg) -> ApiResult<Json<Instance>> {
    let id = path(id)?;
    Ok(Json(blocking(move || st.svc.get_instance(&id)).await?))
}

async fn update_instance(
    State(st): State<AppState>,
    id: PathArg,
    payload: Result<Json<UpdateInstanceRequest>, JsonRejection>,
) -> ApiResult<Json<Instance>> {
    let id = path(id)?;
    let req = json_body(payload)?;
    Ok(Json(blocking(move || st.svc.update_instance(&id, req)).await?))
}

async fn delete_instance(State(st): State<AppState>, id: PathArg) -> ApiResult<StatusCode> {
    let id = path(id)?;
    blocking(move || st.svc.delete_instance(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---- metadata ----

#[derive(Debug, Default, Deserialize)]
struct ListMetadataQuery {
    prefix: Option<String>,
}

async fn list_metadata(
    State(st): State<AppState>,
    q: Result<Query<ListMetadataQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<String>>> {
    let q = query(q)?;
    Ok(Json(blocking(move || st.svc.list_metadata(q.prefix.as_deref())).await?))
}

async fn create_metadata(
    State(st): State<AppState>,
    payload: Result<Json<SetMetadataRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MetadataEntry>)> {
    let req = json_body(payload)?;
    let entry = blocking(move || st.svc.set_metadata(&req.path, &req.value)).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn put_metadata(
    State(st): State<AppState>,
    path_arg: PathArg,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<Json<MetadataEntry>> {
    let path = path(path_arg)?;
    let body = body.map_err(body_error)?;
    let value = String::from_utf8(body.to_vec())
        .map_err(|_| ApiError(DirtError::invalid_input("metadata value must be valid UTF-8")))?;
    Ok(Json(blocking(move || st.svc.set_metadata(&path, &value)).await?))
}

async fn get_metadata(State(st): State<AppState>, path_arg: PathArg) -> ApiResult<String> {
    let path = path(path_arg)?;
    blocking(move || st.svc.get_metadata_value(&path)).await
}

async fn delete_metadata(State(st): State<AppState>, path_arg: PathArg) -> ApiResult<StatusCode> {
    let path = path(path_arg)?;
    blocking(move || st.svc.delete_metadata(&path)).await?;
    Ok(StatusCode::NO_CONTENT)
}
