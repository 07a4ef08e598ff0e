use std::sync::Arc;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{Actor, ApplicationId, Role, TaskDraft, TaskId, UserId};
use super::repository::BoardRepository;
use super::service::{ApplicationWorkflowService, WorkflowError};
use super::visibility::TaskVisibilityService;

/// Header carrying the authenticated user id, set by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header carrying the authenticated user's role claim.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Workflow and query services sharing one repository.
pub struct BoardServices<R> {
    pub workflow: ApplicationWorkflowService<R>,
    pub visibility: TaskVisibilityService<R>,
}

impl<R> BoardServices<R>
where
    R: BoardRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            workflow: ApplicationWorkflowService::new(Arc::clone(&repository)),
            visibility: TaskVisibilityService::new(repository),
        }
    }
}

/// Router builder exposing the teacher and student endpoints.
pub fn board_router<R>(services: Arc<BoardServices<R>>) -> Router
where
    R: BoardRepository + 'static,
{
    Router::new()
        .route("/teacher/tasks", get(teacher_tasks_handler::<R>))
        .route("/teacher/tasks/create", post(create_task_handler::<R>))
        .route(
            "/teacher/applications",
            get(teacher_applications_handler::<R>),
        )
        .route(
            "/tasks/:task_id/applications/:application_id/accept",
            post(accept_handler::<R>),
        )
        .route(
            "/tasks/:task_id/applications/:application_id/reject",
            post(reject_handler::<R>),
        )
        .route("/student/tasks", get(student_tasks_handler::<R>))
        .route("/student/tasks/:task_id/apply", post(apply_handler::<R>))
        .with_state(services)
}

/// Identity resolved from the trusted auth headers.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
        };

        let user_id = header(USER_ID_HEADER).and_then(|raw| raw.parse::<u64>().ok());
        let role = header(USER_ROLE_HEADER).and_then(Role::parse);

        match (user_id, role) {
            (Some(user_id), Some(role)) => Ok(CurrentActor(Actor {
                user_id: UserId(user_id),
                role,
            })),
            _ => {
                let payload = json!({ "flash": Flash::error("Authentication required") });
                Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Error,
}

/// Flash-style message shown on the page the user returns to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    fn success(message: &str) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.to_string(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
    #[serde(default)]
    pub message: Option<String>,
}

impl ApplyRequest {
    /// An empty body means "no message"; anything else must be a valid request object.
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
    }
}

pub(crate) async fn teacher_tasks_handler<R>(
    State(services): State<Arc<BoardServices<R>>>,
    CurrentActor(actor): CurrentActor,
) -> Response
where
    R: BoardRepository + 'static,
{
    match services.visibility.teacher_tasks(&actor) {
        Ok(tasks) => (StatusCode::OK, Json(json!({ "tasks": tasks }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn teacher_applications_handler<R>(
    State(services): State<Arc<BoardServices<R>>>,
    CurrentActor(actor): CurrentActor,
) -> Response
where
    R: BoardRepository + 'static,
{
    match services.visibility.teacher_applications(&actor) {
        Ok(tasks) => (StatusCode::OK, Json(json!({ "tasks": tasks }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_task_handler<R>(
    State(services): State<Arc<BoardServices<R>>>,
    CurrentActor(actor): CurrentActor,
    Json(draft): Json<TaskDraft>,
) -> Response
where
    R: BoardRepository + 'static,
{
    match services.workflow.create_task(&actor, draft) {
        Ok(task) => {
            let payload = json!({
                "flash": Flash::success("Task created successfully"),
                "task": task,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn accept_handler<R>(
    State(services): State<Arc<BoardServices<R>>>,
    CurrentActor(actor): CurrentActor,
    Path((task_id, application_id)): Path<(u64, u64)>,
) -> Response
where
    R: BoardRepository + 'static,
{
    match services.workflow.accept_application(
        &actor,
        TaskId(task_id),
        ApplicationId(application_id),
    ) {
        Ok(outcome) => {
            let payload = json!({
                "flash": Flash::success("Application accepted"),
                "application": outcome.application,
                "task": outcome.task,
                "rejected_siblings": outcome.rejected_siblings,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn reject_handler<R>(
    State(services): State<Arc<BoardServices<R>>>,
    CurrentActor(actor): CurrentActor,
    Path((task_id, application_id)): Path<(u64, u64)>,
) -> Response
where
    R: BoardRepository + 'static,
{
    match services.workflow.reject_application(
        &actor,
        TaskId(task_id),
        ApplicationId(application_id),
    ) {
        Ok(application) => {
            let payload = json!({
                "flash": Flash::success("Application rejected"),
                "application": application,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn student_tasks_handler<R>(
    State(services): State<Arc<BoardServices<R>>>,
    CurrentActor(actor): CurrentActor,
) -> Response
where
    R: BoardRepository + 'static,
{
    match services.visibility.student_board(&actor) {
        Ok(board) => (StatusCode::OK, Json(board)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn apply_handler<R>(
    State(services): State<Arc<BoardServices<R>>>,
    CurrentActor(actor): CurrentActor,
    Path(task_id): Path<u64>,
    body: Bytes,
) -> Response
where
    R: BoardRepository + 'static,
{
    let ApplyRequest { message } = match ApplyRequest::from_body(&body) {
        Ok(request) => request,
        Err(err) => {
            let payload = json!({
                "flash": Flash::error("The request body is not valid JSON."),
                "errors": { "body": [err.to_string()] },
            });
            return (StatusCode::BAD_REQUEST, Json(payload)).into_response();
        }
    };

    match services
        .workflow
        .submit_application(&actor, TaskId(task_id), message)
    {
        Ok(application) => {
            let payload = json!({
                "flash": Flash::success("Application submitted successfully"),
                "application": application,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) fn error_response(err: WorkflowError) -> Response {
    let status = match &err {
        WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowError::DuplicateApplication
        | WorkflowError::TaskUnavailable
        | WorkflowError::InvalidTransition(_) => StatusCode::CONFLICT,
        WorkflowError::NotFound => StatusCode::NOT_FOUND,
        WorkflowError::Forbidden { .. } => StatusCode::FORBIDDEN,
        WorkflowError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = match err {
        WorkflowError::Validation(errors) => json!({
            "flash": Flash::error("The given data was invalid."),
            "errors": errors,
        }),
        WorkflowError::Repository(source) => {
            error!(%source, "task board store failure");
            json!({ "flash": Flash::error("Something went wrong. Please try again.") })
        }
        other => json!({ "flash": Flash::error(other.to_string()) }),
    };

    (status, Json(payload)).into_response()
}
