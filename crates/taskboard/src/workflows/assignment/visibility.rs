//! Per-user read models over the task and application stores.
//!
//! For one student a task lands in at most one of the available, applied and accepted
//! lists. A task where the student only holds a rejected application lands in none of
//! them, since there is no way to apply again.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::domain::{Actor, Application, ApplicationStatus, Role, Task, TaskId, UserId};
use super::repository::{ApplicationFilter, BoardRepository, BoardTransaction, TaskFilter};
use super::service::{require_role, WorkflowError};

/// The three disjoint task lists shown to a student.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentBoard {
    #[serde(rename = "tasks")]
    pub available: Vec<Task>,
    #[serde(rename = "appliedTasks")]
    pub applied: Vec<Task>,
    #[serde(rename = "acceptedTasks")]
    pub accepted: Vec<Task>,
}

/// An owned task with every application submitted for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskApplications {
    #[serde(flatten)]
    pub task: Task,
    pub pending: usize,
    pub applications: Vec<Application>,
}

pub struct TaskVisibilityService<R> {
    repository: Arc<R>,
}

impl<R> Clone for TaskVisibilityService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

impl<R> TaskVisibilityService<R>
where
    R: BoardRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Unassigned tasks the student does not own and has never applied to.
    pub fn list_available_tasks(&self, student: UserId) -> Result<Vec<Task>, WorkflowError> {
        self.repository
            .transaction(|tx| available_tasks(tx, student))
    }

    /// Tasks assigned to the student.
    pub fn list_accepted_tasks(&self, student: UserId) -> Result<Vec<Task>, WorkflowError> {
        self.repository
            .transaction(|tx| accepted_tasks(tx, student))
    }

    /// Tasks where the student's application is still pending.
    pub fn list_applied_tasks(&self, student: UserId) -> Result<Vec<Task>, WorkflowError> {
        self.repository
            .transaction(|tx| applied_tasks(tx, student))
    }

    /// All three student lists read from one snapshot.
    pub fn student_board(&self, actor: &Actor) -> Result<StudentBoard, WorkflowError> {
        require_role(actor, Role::Student)?;
        let board = self.repository.transaction(|tx| {
            Ok::<_, WorkflowError>(StudentBoard {
                available: available_tasks(tx, actor.user_id)?,
                applied: applied_tasks(tx, actor.user_id)?,
                accepted: accepted_tasks(tx, actor.user_id)?,
            })
        })?;

        debug!(
            student = %actor.user_id,
            available = board.available.len(),
            applied = board.applied.len(),
            accepted = board.accepted.len(),
            "student board loaded"
        );
        Ok(board)
    }

    /// Tasks owned by the acting teacher.
    pub fn teacher_tasks(&self, actor: &Actor) -> Result<Vec<Task>, WorkflowError> {
        require_role(actor, Role::Teacher)?;
        self.repository.transaction(|tx| {
            let mut tasks = tx.tasks(&TaskFilter {
                owner: Some(actor.user_id),
                ..TaskFilter::default()
            })?;
            newest_first(&mut tasks);
            Ok(tasks)
        })
    }

    /// Owned tasks with their applications nested, oldest application first.
    pub fn teacher_applications(
        &self,
        actor: &Actor,
    ) -> Result<Vec<TaskApplications>, WorkflowError> {
        require_role(actor, Role::Teacher)?;
        self.repository.transaction(|tx| {
            let mut tasks = tx.tasks(&TaskFilter {
                owner: Some(actor.user_id),
                ..TaskFilter::default()
            })?;
            newest_first(&mut tasks);

            tasks
                .into_iter()
                .map(|task| -> Result<TaskApplications, WorkflowError> {
                    let mut applications =
                        tx.applications(&ApplicationFilter::for_task(task.id))?;
                    applications.sort_by(|a, b| {
                        a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
                    });
                    let pending = applications
                        .iter()
                        .filter(|application| application.status == ApplicationStatus::Pending)
                        .count();
                    Ok(TaskApplications {
                        task,
                        pending,
                        applications,
                    })
                })
                .collect()
        })
    }
}

fn available_tasks(
    tx: &mut dyn BoardTransaction,
    student: UserId,
) -> Result<Vec<Task>, WorkflowError> {
    let applied_to: BTreeSet<TaskId> = tx
        .applications(&ApplicationFilter::for_applicant(student))?
        .into_iter()
        .map(|application| application.task_id)
        .collect();

    let mut tasks: Vec<Task> = tx
        .tasks(&TaskFilter {
            not_owner: Some(student),
            unassigned: true,
            ..TaskFilter::default()
        })?
        .into_iter()
        .filter(|task| !applied_to.contains(&task.id))
        .collect();
    newest_first(&mut tasks);
    Ok(tasks)
}

fn accepted_tasks(
    tx: &mut dyn BoardTransaction,
    student: UserId,
) -> Result<Vec<Task>, WorkflowError> {
    let mut tasks = tx.tasks(&TaskFilter {
        assignee: Some(student),
        ..TaskFilter::default()
    })?;
    newest_first(&mut tasks);
    Ok(tasks)
}

fn applied_tasks(
    tx: &mut dyn BoardTransaction,
    student: UserId,
) -> Result<Vec<Task>, WorkflowError> {
    let pending: BTreeSet<TaskId> = tx
        .applications(&ApplicationFilter {
            status: Some(ApplicationStatus::Pending),
            ..ApplicationFilter::for_applicant(student)
        })?
        .into_iter()
        .map(|application| application.task_id)
        .collect();

    let mut tasks = Vec::with_capacity(pending.len());
    for task_id in pending {
        if let Some(task) = tx.task(task_id)? {
            tasks.push(task);
        }
    }
    newest_first(&mut tasks);
    Ok(tasks)
}

fn newest_first(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}
