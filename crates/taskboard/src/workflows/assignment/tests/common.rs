use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::Value;

use crate::workflows::assignment::domain::{
    Actor, Application, ApplicationId, ApplicationStatus, NewTask, Task, TaskDraft, TaskId, UserId,
};
use crate::workflows::assignment::memory::InMemoryBoardRepository;
use crate::workflows::assignment::repository::{
    ApplicationFilter, ApplicationStore, BoardRepository, BoardTransaction, NewApplication,
    RepositoryError, TaskFilter, TaskStore,
};
use crate::workflows::assignment::router::{USER_ID_HEADER, USER_ROLE_HEADER};
use crate::workflows::assignment::{
    board_router, ApplicationWorkflowService, BoardServices, TaskVisibilityService,
};

pub(super) const TEACHER: Actor = Actor::teacher(UserId(1));
pub(super) const OTHER_TEACHER: Actor = Actor::teacher(UserId(2));
pub(super) const S1: Actor = Actor::student(UserId(11));
pub(super) const S2: Actor = Actor::student(UserId(12));
pub(super) const S3: Actor = Actor::student(UserId(13));

pub(super) fn draft(title_eng: &str) -> TaskDraft {
    TaskDraft {
        title: Some(format!("Naloga: {title_eng}")),
        title_eng: Some(title_eng.to_string()),
        description: Some("Prepare a short report and present it".to_string()),
        type_of_study: Some("UNDERGRADUATE".to_string()),
    }
}

pub(super) struct Board {
    pub(super) repository: Arc<InMemoryBoardRepository>,
    pub(super) workflow: ApplicationWorkflowService<InMemoryBoardRepository>,
    pub(super) visibility: TaskVisibilityService<InMemoryBoardRepository>,
}

impl Board {
    pub(super) fn new() -> Self {
        let repository = Arc::new(InMemoryBoardRepository::new());
        Self {
            workflow: ApplicationWorkflowService::new(repository.clone()),
            visibility: TaskVisibilityService::new(repository.clone()),
            repository,
        }
    }

    pub(super) fn post(&self, owner: &Actor, title_eng: &str) -> Task {
        self.workflow
            .create_task(owner, draft(title_eng))
            .expect("task created")
    }

    pub(super) fn apply(&self, student: &Actor, task: &Task) -> Application {
        self.workflow
            .submit_application(student, task.id, None)
            .expect("application submitted")
    }

    pub(super) fn task(&self, id: TaskId) -> Task {
        self.repository
            .transaction(|tx| tx.task(id))
            .expect("read task")
            .expect("task present")
    }

    pub(super) fn application(&self, id: ApplicationId) -> Application {
        self.repository
            .transaction(|tx| tx.application(id))
            .expect("read application")
            .expect("application present")
    }

    pub(super) fn applications_for(&self, task: TaskId) -> Vec<Application> {
        self.repository
            .transaction(|tx| tx.applications(&ApplicationFilter::for_task(task)))
            .expect("read applications")
    }

    pub(super) fn accepted_count(&self, task: TaskId) -> usize {
        self.applications_for(task)
            .iter()
            .filter(|application| application.status == ApplicationStatus::Accepted)
            .count()
    }

    pub(super) fn router(&self) -> axum::Router {
        board_router(Arc::new(BoardServices::new(self.repository.clone())))
    }
}

/// Repository whose bulk status update always fails, used to observe rollback.
#[derive(Default)]
pub(super) struct FailingBulkRepository {
    pub(super) inner: InMemoryBoardRepository,
}

struct FailingBulk<'a> {
    inner: &'a mut dyn BoardTransaction,
}

impl TaskStore for FailingBulk<'_> {
    fn insert_task(&mut self, task: NewTask) -> Result<Task, RepositoryError> {
        self.inner.insert_task(task)
    }

    fn task(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        self.inner.task(id)
    }

    fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, RepositoryError> {
        self.inner.tasks(filter)
    }

    fn assign_task(&mut self, id: TaskId, assignee: UserId) -> Result<Task, RepositoryError> {
        self.inner.assign_task(id, assignee)
    }
}

impl ApplicationStore for FailingBulk<'_> {
    fn insert_application(
        &mut self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        self.inner.insert_application(application)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.inner.application(id)
    }

    fn applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications(filter)
    }

    fn set_status(
        &mut self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, RepositoryError> {
        self.inner.set_status(id, status)
    }

    fn bulk_set_status(
        &mut self,
        _filter: &ApplicationFilter,
        _status: ApplicationStatus,
    ) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("disk full".to_string()))
    }
}

impl BoardRepository for FailingBulkRepository {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn BoardTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.inner.transaction(|tx| {
            let mut wrapped = FailingBulk { inner: tx };
            work(&mut wrapped)
        })
    }
}

/// Repository that is never reachable.
pub(super) struct UnavailableRepository;

impl BoardRepository for UnavailableRepository {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn BoardTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) fn request(method: &str, uri: &str, actor: Option<&Actor>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
        builder = builder
            .header(USER_ID_HEADER, actor.user_id.0.to_string())
            .header(USER_ROLE_HEADER, actor.role.label());
    }
    match body {
        Some(value) => builder
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&value).expect("serialize body")))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn assert_flash(response: Response, status: StatusCode, message: &str) -> Value {
    assert_eq!(response.status(), status);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["flash"]["message"].as_str(),
        Some(message),
        "unexpected payload {payload}"
    );
    payload
}
