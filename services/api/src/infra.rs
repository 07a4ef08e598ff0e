use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use taskboard::workflows::assignment::{
    Actor, ApplicationWorkflowService, BoardRepository, BoardServices, InMemoryBoardRepository,
    Task, TaskDraft, UserId, WorkflowError,
};

/// Teacher account that owns the seeded demo tasks.
pub(crate) const DEMO_TEACHER: Actor = Actor::teacher(UserId(1));

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn board_services() -> Arc<BoardServices<InMemoryBoardRepository>> {
    Arc::new(BoardServices::new(Arc::new(InMemoryBoardRepository::new())))
}

fn demo_drafts() -> Vec<TaskDraft> {
    [
        (
            "Priprava gradiva za seminar",
            "Seminar material preparation",
            "Collect readings and draft slides for the weekly seminar.",
            "UNDERGRADUATE",
        ),
        (
            "Asistenca v laboratoriju",
            "Lab assistant",
            "Support first-year students during lab sessions.",
            "GRADUATE",
        ),
        (
            "Pregled literature",
            "Literature review",
            "Summarise recent work on adaptive learning systems.",
            "PROFESSIONAL",
        ),
    ]
    .into_iter()
    .map(|(title, title_eng, description, type_of_study)| TaskDraft {
        title: Some(title.to_string()),
        title_eng: Some(title_eng.to_string()),
        description: Some(description.to_string()),
        type_of_study: Some(type_of_study.to_string()),
    })
    .collect()
}

/// Post the demo tasks as [`DEMO_TEACHER`].
pub(crate) fn seed_demo_tasks<R>(
    workflow: &ApplicationWorkflowService<R>,
) -> Result<Vec<Task>, WorkflowError>
where
    R: BoardRepository + 'static,
{
    demo_drafts()
        .into_iter()
        .map(|draft| workflow.create_task(&DEMO_TEACHER, draft))
        .collect()
}
