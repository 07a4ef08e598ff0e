//! Process-local store backing both tables with a single mutex.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::domain::{Application, ApplicationId, ApplicationStatus, NewTask, Task, TaskId, UserId};
use super::repository::{
    ApplicationFilter, ApplicationStore, BoardRepository, BoardTransaction, NewApplication,
    RepositoryError, TaskFilter, TaskStore,
};

/// Thread-safe in-memory repository.
///
/// A transaction holds the lock for its whole duration and works on a copy of the tables,
/// so concurrent callers are serialized and a failed transaction leaves nothing behind.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBoardRepository {
    tables: Arc<Mutex<BoardTables>>,
}

#[derive(Debug, Default, Clone)]
struct BoardTables {
    tasks: BTreeMap<TaskId, Task>,
    applications: BTreeMap<ApplicationId, Application>,
    task_sequence: u64,
    application_sequence: u64,
}

impl InMemoryBoardRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of application rows, regardless of status.
    pub fn application_count(&self) -> Result<usize, RepositoryError> {
        self.tables
            .lock()
            .map(|tables| tables.applications.len())
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))
    }
}

impl BoardRepository for InMemoryBoardRepository {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn BoardTransaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store lock poisoned".to_string()))?;

        let mut working = guard.clone();
        let value = work(&mut working)?;
        *guard = working;
        Ok(value)
    }
}

impl TaskStore for BoardTables {
    fn insert_task(&mut self, task: NewTask) -> Result<Task, RepositoryError> {
        self.task_sequence += 1;
        let now = Utc::now();
        let record = Task {
            id: TaskId(self.task_sequence),
            title: task.title,
            title_eng: task.title_eng,
            description: task.description,
            type_of_study: task.type_of_study,
            owner_id: task.owner_id,
            assignee_id: None,
            created_at: now,
            updated_at: now,
        };
        self.tasks.insert(record.id, record.clone());
        Ok(record)
    }

    fn task(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        Ok(self.tasks.get(&id).cloned())
    }

    fn tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, RepositoryError> {
        Ok(self
            .tasks
            .values()
            .filter(|task| filter.matches(task))
            .cloned()
            .collect())
    }

    fn assign_task(&mut self, id: TaskId, assignee: UserId) -> Result<Task, RepositoryError> {
        let task = self.tasks.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if task.assignee_id != Some(assignee) {
            task.assignee_id = Some(assignee);
            task.updated_at = Utc::now();
        }
        Ok(task.clone())
    }
}

impl ApplicationStore for BoardTables {
    fn insert_application(
        &mut self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        if !self.tasks.contains_key(&application.task_id) {
            return Err(RepositoryError::NotFound);
        }
        let duplicate = self.applications.values().any(|existing| {
            existing.task_id == application.task_id && existing.user_id == application.user_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        self.application_sequence += 1;
        let now = Utc::now();
        let record = Application {
            id: ApplicationId(self.application_sequence),
            task_id: application.task_id,
            user_id: application.user_id,
            status: ApplicationStatus::Pending,
            message: application.message,
            created_at: now,
            updated_at: now,
        };
        self.applications.insert(record.id, record.clone());
        Ok(record)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.applications.get(&id).cloned())
    }

    fn applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError> {
        Ok(self
            .applications
            .values()
            .filter(|application| filter.matches(application))
            .cloned()
            .collect())
    }

    fn set_status(
        &mut self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<Application, RepositoryError> {
        let application = self
            .applications
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        if application.status != status {
            application.status = status;
            application.updated_at = Utc::now();
        }
        Ok(application.clone())
    }

    fn bulk_set_status(
        &mut self,
        filter: &ApplicationFilter,
        status: ApplicationStatus,
    ) -> Result<usize, RepositoryError> {
        let now = Utc::now();
        let mut changed = 0;
        for application in self
            .applications
            .values_mut()
            .filter(|application| filter.matches(application))
        {
            if application.status != status {
                application.status = status;
                application.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
