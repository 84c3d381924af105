use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::agent::{AgentError, AgentRunner, RunOptions};
use crate::application::notes::{Note, NoteStore, NoteStoreError};
use crate::domain::types::{
    Action, RunOutcome, Step, StoppedReason, ThreadStateView, ToolFault, ToolResult,
};
use crate::infrastructure::model::ModelProvider;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub struct ServerState<P: ModelProvider> {
    runner: Arc<AgentRunner<P>>,
    notes: Arc<NoteStore>,
}

impl<P: ModelProvider> ServerState<P> {
    pub fn new(runner: Arc<AgentRunner<P>>, notes: Arc<NoteStore>) -> Self {
        Self { runner, notes }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        run_handler,
        thread_state_handler,
        create_note_handler,
        list_notes_handler,
        get_note_handler,
        replace_note_handler,
        delete_note_handler,
        health_handler
    ),
    components(
        schemas(
            RunRequest,
            RunOutcome,
            ThreadStateView,
            NotePayload,
            Note,
            DeleteResponse,
            ErrorResponse,
            Step,
            Action,
            ToolResult,
            ToolFault,
            StoppedReason
        )
    ),
    tags(
        (name = "agent", description = "Tool-calling agent runs and thread state"),
        (name = "notes", description = "Direct CRUD access to the note store")
    )
)]
struct ApiDoc;

pub async fn serve<P>(state: Arc<ServerState<P>>, addr: SocketAddr) -> Result<(), ServerError>
where
    P: ModelProvider + 'static,
{
    let api = ApiDoc::openapi();
    info!(%addr, "binding REST server");

    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:5173"),
            HeaderValue::from_static("http://127.0.0.1:5173"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", api))
        .route("/ai/agent/run", post(run_handler::<P>))
        .route("/ai/agent/state/{thread_id}", get(thread_state_handler::<P>))
        .route(
            "/v1/notes",
            post(create_note_handler::<P>).get(list_notes_handler::<P>),
        )
        .route(
            "/v1/notes/{note_id}",
            get(get_note_handler::<P>)
                .put(replace_note_handler::<P>)
                .delete(delete_note_handler::<P>),
        )
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(ServerError::Serve)
}

#[derive(Debug, Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Debug, Deserialize, ToSchema)]
struct RunRequest {
    request: String,
    thread_id: Option<String>,
    max_steps: Option<u32>,
    prompt_key: Option<String>,
}

#[utoipa::path(
    post,
    path = "/ai/agent/run",
    tag = "agent",
    request_body = RunRequest,
    responses(
        (status = 200, description = "Run finished; failures arrive as stopped_reason = \"error\"", body = RunOutcome),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Checkpoint store failure", body = ErrorResponse)
    )
)]
async fn run_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunOutcome>, (StatusCode, Json<ErrorResponse>)> {
    if payload.request.trim().is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "request cannot be empty",
        ));
    }

    let defaults = RunOptions::default();
    let options = RunOptions {
        thread_id: payload.thread_id,
        max_steps: payload.max_steps.unwrap_or(defaults.max_steps),
        prompt_key: payload.prompt_key.unwrap_or(defaults.prompt_key),
    };

    match state.runner.run(&payload.request, options).await {
        Ok(outcome) => {
            info!(
                thread_id = outcome.thread_id.as_str(),
                stopped_reason = outcome.stopped_reason.as_str(),
                steps = outcome.steps.len(),
                "agent run completed"
            );
            Ok(Json(outcome))
        }
        Err(AgentError::Prompt(err)) => {
            Err(error_response(StatusCode::BAD_REQUEST, err.to_string()))
        }
        Err(AgentError::Checkpoint(err)) => {
            error!(%err, "checkpoint store failure during run");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "checkpoint store failure",
            ))
        }
    }
}

#[utoipa::path(
    get,
    path = "/ai/agent/state/{thread_id}",
    tag = "agent",
    params(("thread_id" = String, Path, description = "Thread identifier")),
    responses(
        (status = 200, description = "Thread state snapshot", body = ThreadStateView),
        (status = 404, description = "Unknown thread", body = ErrorResponse)
    )
)]
async fn thread_state_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
    Path(thread_id): Path<String>,
) -> Result<Json<ThreadStateView>, (StatusCode, Json<ErrorResponse>)> {
    match state.runner.state(&thread_id).await {
        Ok(Some(view)) => Ok(Json(view)),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("unknown thread: {thread_id}"),
        )),
        Err(err) => {
            error!(%err, "checkpoint store failure during state read");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "checkpoint store failure",
            ))
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
struct NotePayload {
    title: String,
    content: String,
}

impl NotePayload {
    fn validated(self) -> Result<Self, (StatusCode, Json<ErrorResponse>)> {
        if self.title.trim().is_empty() {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "title cannot be empty",
            ));
        }
        if self.content.trim().is_empty() {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "content cannot be empty",
            ));
        }
        Ok(self)
    }
}

#[utoipa::path(
    post,
    path = "/v1/notes",
    tag = "notes",
    request_body = NotePayload,
    responses(
        (status = 201, description = "Note created", body = Note),
        (status = 400, description = "Invalid payload", body = ErrorResponse)
    )
)]
async fn create_note_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
    Json(payload): Json<NotePayload>,
) -> Result<(StatusCode, Json<Note>), (StatusCode, Json<ErrorResponse>)> {
    let payload = payload.validated()?;
    let note = state.notes.create(payload.title, payload.content).await;
    Ok((StatusCode::CREATED, Json(note)))
}

#[utoipa::path(
    get,
    path = "/v1/notes",
    tag = "notes",
    responses((status = 200, description = "All notes", body = [Note]))
)]
async fn list_notes_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
) -> Json<Vec<Note>> {
    Json(state.notes.list().await)
}

#[utoipa::path(
    get,
    path = "/v1/notes/{note_id}",
    tag = "notes",
    params(("note_id" = u64, Path, description = "Note identifier")),
    responses(
        (status = 200, description = "The note", body = Note),
        (status = 404, description = "Note not found", body = ErrorResponse)
    )
)]
async fn get_note_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
    Path(note_id): Path<u64>,
) -> Result<Json<Note>, (StatusCode, Json<ErrorResponse>)> {
    state
        .notes
        .get(note_id)
        .await
        .map(Json)
        .map_err(not_found)
}

#[utoipa::path(
    put,
    path = "/v1/notes/{note_id}",
    tag = "notes",
    request_body = NotePayload,
    params(("note_id" = u64, Path, description = "Note identifier")),
    responses(
        (status = 200, description = "Replaced note", body = Note),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 404, description = "Note not found", body = ErrorResponse)
    )
)]
async fn replace_note_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
    Path(note_id): Path<u64>,
    Json(payload): Json<NotePayload>,
) -> Result<Json<Note>, (StatusCode, Json<ErrorResponse>)> {
    let payload = payload.validated()?;
    state
        .notes
        .replace(note_id, payload.title, payload.content)
        .await
        .map(Json)
        .map_err(not_found)
}

#[derive(Debug, Serialize, ToSchema)]
struct DeleteResponse {
    deleted: bool,
    note_id: u64,
}

#[utoipa::path(
    delete,
    path = "/v1/notes/{note_id}",
    tag = "notes",
    params(("note_id" = u64, Path, description = "Note identifier")),
    responses(
        (status = 200, description = "Note deleted", body = DeleteResponse),
        (status = 404, description = "Note not found", body = ErrorResponse)
    )
)]
async fn delete_note_handler<P: ModelProvider>(
    State(state): State<Arc<ServerState<P>>>,
    Path(note_id): Path<u64>,
) -> Result<Json<DeleteResponse>, (StatusCode, Json<ErrorResponse>)> {
    state
        .notes
        .delete(note_id)
        .await
        .map(|()| {
            Json(DeleteResponse {
                deleted: true,
                note_id,
            })
        })
        .map_err(not_found)
}

fn not_found(err: NoteStoreError) -> (StatusCode, Json<ErrorResponse>) {
    error_response(StatusCode::NOT_FOUND, err.to_string())
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up"))
)]
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
