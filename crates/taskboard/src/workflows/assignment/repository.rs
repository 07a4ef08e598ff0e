use super::domain::{
    Application, ApplicationId, ApplicationStatus, NewTask, Task, TaskId, UserId,
};

/// Predicate over task rows. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub owner: Option<UserId>,
    pub not_owner: Option<UserId>,
    pub assignee: Option<UserId>,
    pub unassigned: bool,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.owner.map_or(true, |owner| task.owner_id == owner)
            && self.not_owner.map_or(true, |user| task.owner_id != user)
            && self
                .assignee
                .map_or(true, |assignee| task.assignee_id == Some(assignee))
            && (!self.unassigned || task.assignee_id.is_none())
    }
}

/// Predicate over application rows. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplicationFilter {
    pub task: Option<TaskId>,
    pub applicant: Option<UserId>,
    pub status: Option<ApplicationStatus>,
    pub excluding: Option<ApplicationId>,
}

impl ApplicationFilter {
    pub fn for_task(task: TaskId) -> Self {
        Self {
            task: Some(task),
            ..Self::default()
        }
    }

    pub fn for_applicant(applicant: UserId) -> Self {
        Self {
            applicant: Some(applicant),
            ..Self::default()
        }
    }

    pub fn matches(&self, application: &Application) -> bool {
        self.task.map_or(true, |task| application.task_id == task)
            && self
                .applicant
                .map_or(true, |user| application.user_id == user)
            && self
                .status
                .map_or(true, |status| application.status == status)
            && self.excluding.map_or(true, |id| application.id != id)
    }
}

/// Fields required to insert an application row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub task_id: TaskId,
    pub user_id: UserId,
    pub message: Option<String>,
}

/// Task table operations.
pub trait TaskStore {
    fn insert_task(&mut self, task: NewTask) -> Result<Task, RepositoryError>;
    fn task(&self, id: TaskId) -> Result<Option<Task>, RepositoryError>;
    fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, RepositoryError>;
    /// Sets the assignee and bumps `updated_at`, returning the stored row.
    fn assign_task(&mut self, id: TaskId, assignee: UserId) -> Result<Task, RepositoryError>;
}

/// Application table operations.
pub trait ApplicationStore {
    /// Fails with [`RepositoryError::Conflict`] when the (task, user) pair already has a row.
    fn insert_application(
        &mut self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError>;
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError>;
    fn set_status(
        &mut self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, RepositoryError>;
    /// Moves every matching row to `status`, returning how many rows changed.
    fn bulk_set_status(
        &mut self,
        filter: &ApplicationFilter,
        status: ApplicationStatus,
    ) -> Result<usize, RepositoryError>;
}

/// Both tables as seen from inside one transaction.
pub trait BoardTransaction: TaskStore + ApplicationStore {}

impl<T> BoardTransaction for T where T: TaskStore + ApplicationStore {}

/// Storage abstraction so the workflow service can be exercised in isolation.
///
/// `transaction` runs `work` against a consistent view of both tables and commits its
/// writes only when it returns `Ok`; on `Err` no write is visible to other callers.
pub trait BoardRepository: Send + Sync {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn BoardTransaction) -> Result<T, E>,
        E: From<RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::workflows::assignment::domain::TypeOfStudy;

    fn task(owner: u64, assignee: Option<u64>) -> Task {
        let now = Utc::now();
        Task {
            id: TaskId(1),
            title: "Naloga".to_string(),
            title_eng: "Task".to_string(),
            description: "Describe".to_string(),
            type_of_study: TypeOfStudy::Graduate,
            owner_id: UserId(owner),
            assignee_id: assignee.map(UserId),
            created_at: now,
            updated_at: now,
        }
    }

    fn application(id: u64, user: u64, status: ApplicationStatus) -> Application {
        let now = Utc::now();
        Application {
            id: ApplicationId(id),
            task_id: TaskId(1),
            user_id: UserId(user),
            status,
            message: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn default_task_filter_matches_everything() {
        let filter = TaskFilter::default();
        assert!(filter.matches(&task(1, None)));
        assert!(filter.matches(&task(1, Some(2))));
    }

    #[test]
    fn task_filter_combines_predicates() {
        let filter = TaskFilter {
            not_owner: Some(UserId(5)),
            unassigned: true,
            ..TaskFilter::default()
        };
        assert!(filter.matches(&task(1, None)));
        assert!(!filter.matches(&task(5, None)));
        assert!(!filter.matches(&task(1, Some(3))));

        let assigned = TaskFilter {
            assignee: Some(UserId(3)),
            ..TaskFilter::default()
        };
        assert!(assigned.matches(&task(1, Some(3))));
        assert!(!assigned.matches(&task(1, None)));
    }

    #[test]
    fn application_filter_can_exclude_one_row() {
        let filter = ApplicationFilter {
            status: Some(ApplicationStatus::Pending),
            excluding: Some(ApplicationId(2)),
            ..ApplicationFilter::for_task(TaskId(1))
        };
        assert!(filter.matches(&application(1, 10, ApplicationStatus::Pending)));
        assert!(!filter.matches(&application(2, 11, ApplicationStatus::Pending)));
        assert!(!filter.matches(&application(3, 12, ApplicationStatus::Rejected)));
    }
}
