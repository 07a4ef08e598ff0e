//! Task assignment workflow: students apply to open tasks, teachers accept one
//! application per task and the remaining pending applications are rejected.

pub mod domain;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod visibility;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, Application, ApplicationEvent, ApplicationId, ApplicationStatus, InvalidTransition,
    NewTask, Role, Task, TaskDraft, TaskId, TypeOfStudy, UserId, ValidationErrors,
};
pub use memory::InMemoryBoardRepository;
pub use repository::{
    ApplicationFilter, ApplicationStore, BoardRepository, BoardTransaction, NewApplication,
    RepositoryError, TaskFilter, TaskStore,
};
pub use router::{board_router, BoardServices, CurrentActor, USER_ID_HEADER, USER_ROLE_HEADER};
pub use service::{AcceptOutcome, ApplicationWorkflowService, WorkflowError};
pub use visibility::{StudentBoard, TaskApplications, TaskVisibilityService};
