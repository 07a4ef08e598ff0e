use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    Actor, Application, ApplicationEvent, ApplicationId, ApplicationStatus, InvalidTransition,
    Role, Task, TaskDraft, TaskId, ValidationErrors,
};
use super::repository::{
    ApplicationFilter, BoardRepository, BoardTransaction, NewApplication, RepositoryError,
};

/// Service enforcing the assignment lifecycle on top of the task and application stores.
///
/// Holds no state between calls; every operation reloads rows inside one store transaction.
pub struct ApplicationWorkflowService<R> {
    repository: Arc<R>,
}

impl<R> Clone for ApplicationWorkflowService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

/// Result of a successful acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptOutcome {
    pub application: Application,
    pub task: Task,
    pub rejected_siblings: usize,
}

impl<R> ApplicationWorkflowService<R>
where
    R: BoardRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Create a task owned by the acting teacher.
    pub fn create_task(&self, actor: &Actor, draft: TaskDraft) -> Result<Task, WorkflowError> {
        require_role(actor, Role::Teacher)?;
        let new_task = draft.validate(actor.user_id).map_err(|errors| {
            warn!(owner = %actor.user_id, %errors, "task creation rejected");
            WorkflowError::Validation(errors)
        })?;

        let task = self
            .repository
            .transaction(|tx| tx.insert_task(new_task).map_err(WorkflowError::from))?;

        info!(task = %task.id, owner = %task.owner_id, "task created");
        Ok(task)
    }

    /// Submit a PENDING application for the acting student.
    pub fn submit_application(
        &self,
        actor: &Actor,
        task_id: TaskId,
        message: Option<String>,
    ) -> Result<Application, WorkflowError> {
        require_role(actor, Role::Student)?;
        let message = message
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        let result: Result<Application, WorkflowError> = self.repository.transaction(|tx| {
            let task = tx.task(task_id)?.ok_or(WorkflowError::NotFound)?;

            let existing = tx.applications(&ApplicationFilter {
                applicant: Some(actor.user_id),
                ..ApplicationFilter::for_task(task_id)
            })?;
            if !existing.is_empty() {
                return Err(WorkflowError::DuplicateApplication);
            }

            if !task.is_open() {
                return Err(WorkflowError::TaskUnavailable);
            }

            tx.insert_application(NewApplication {
                task_id,
                user_id: actor.user_id,
                message,
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => WorkflowError::DuplicateApplication,
                other => WorkflowError::Repository(other),
            })
        });

        match &result {
            Ok(application) => info!(
                task = %task_id,
                application = %application.id,
                applicant = %actor.user_id,
                "application submitted"
            ),
            Err(err) => warn!(task = %task_id, applicant = %actor.user_id, %err, "application refused"),
        }
        result
    }

    /// Accept one application, assign the task and reject every other pending application.
    pub fn accept_application(
        &self,
        actor: &Actor,
        task_id: TaskId,
        application_id: ApplicationId,
    ) -> Result<AcceptOutcome, WorkflowError> {
        require_role(actor, Role::Teacher)?;

        let result: Result<AcceptOutcome, WorkflowError> = self.repository.transaction(|tx| {
            let (task, application) = load_owned_pair(tx, actor, task_id, application_id)?;

            let rival = tx.applications(&ApplicationFilter {
                status: Some(ApplicationStatus::Accepted),
                excluding: Some(application_id),
                ..ApplicationFilter::for_task(task_id)
            })?;
            let assigned_elsewhere = task
                .assignee_id
                .is_some_and(|assignee| assignee != application.user_id);
            if !rival.is_empty() || assigned_elsewhere {
                return Err(WorkflowError::InvalidTransition(InvalidTransition {
                    from: application.status,
                    event: ApplicationEvent::Accept,
                }));
            }

            let current = application.status;
            let application = match current {
                // Repeated accept of the winner only re-runs the sibling cascade.
                ApplicationStatus::Accepted => application,
                status => {
                    let next = status.transition(ApplicationEvent::Accept)?;
                    tx.set_status(application_id, next)?
                }
            };

            let task = tx.assign_task(task_id, application.user_id)?;

            let rejected_siblings = tx.bulk_set_status(
                &ApplicationFilter {
                    status: Some(ApplicationStatus::Pending),
                    excluding: Some(application_id),
                    ..ApplicationFilter::for_task(task_id)
                },
                ApplicationStatus::Rejected,
            )?;

            Ok(AcceptOutcome {
                application,
                task,
                rejected_siblings,
            })
        });

        match &result {
            Ok(outcome) => info!(
                task = %task_id,
                application = %application_id,
                assignee = %outcome.application.user_id,
                rejected = outcome.rejected_siblings,
                "application accepted"
            ),
            Err(err) => warn!(task = %task_id, application = %application_id, %err, "accept refused"),
        }
        result
    }

    /// Reject a single pending application without touching the task.
    pub fn reject_application(
        &self,
        actor: &Actor,
        task_id: TaskId,
        application_id: ApplicationId,
    ) -> Result<Application, WorkflowError> {
        require_role(actor, Role::Teacher)?;

        let result: Result<Application, WorkflowError> = self.repository.transaction(|tx| {
            let (_, application) = load_owned_pair(tx, actor, task_id, application_id)?;
            let next = application.status.transition(ApplicationEvent::Reject)?;
            Ok(tx.set_status(application_id, next)?)
        });

        match &result {
            Ok(_) => info!(task = %task_id, application = %application_id, "application rejected"),
            Err(err) => warn!(task = %task_id, application = %application_id, %err, "reject refused"),
        }
        result
    }
}

pub(super) fn require_role(actor: &Actor, required: Role) -> Result<(), WorkflowError> {
    if actor.role == required {
        Ok(())
    } else {
        Err(WorkflowError::Forbidden { required })
    }
}

/// Load a task owned by `actor` together with one of its applications.
///
/// Tasks owned by someone else are reported as missing.
fn load_owned_pair(
    tx: &mut dyn BoardTransaction,
    actor: &Actor,
    task_id: TaskId,
    application_id: ApplicationId,
) -> Result<(Task, Application), WorkflowError> {
    let task = tx
        .task(task_id)?
        .filter(|task| task.owner_id == actor.user_id)
        .ok_or(WorkflowError::NotFound)?;
    let application = tx
        .application(application_id)?
        .filter(|application| application.task_id == task_id)
        .ok_or(WorkflowError::NotFound)?;
    Ok((task, application))
}

/// Error raised by the workflow service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("You have already applied to this task")]
    DuplicateApplication,
    #[error("This task is no longer available")]
    TaskUnavailable,
    #[error("The requested task or application was not found")]
    NotFound,
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("this action requires the {} role", .required.label())]
    Forbidden { required: Role },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
