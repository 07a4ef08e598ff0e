use crate::infra::{board_services, seed_demo_tasks, DEMO_TEACHER};
use chrono::SecondsFormat;
use clap::Args;
use serde::Serialize;
use taskboard::error::AppError;
use taskboard::workflows::assignment::{
    Actor, Application, ApplicationStatus, BoardRepository, BoardServices, StudentBoard, Task,
    UserId, WorkflowError,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of students taking part; the last one applies after the task is assigned.
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(2..))]
    pub(crate) students: u8,
    /// Print the final state as JSON instead of a narrated walkthrough.
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct DemoReport {
    pub(crate) task: Task,
    pub(crate) applications: Vec<Application>,
    pub(crate) late_applicant: Option<String>,
    pub(crate) boards: Vec<StudentView>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentView {
    pub(crate) student: UserId,
    #[serde(flatten)]
    pub(crate) board: StudentBoard,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let services = board_services();
    let report = build_demo_report(&services, args.students)?;

    if args.json {
        match serde_json::to_string_pretty(&report) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => eprintln!("failed to render demo report: {err}"),
        }
    } else {
        render_demo_report(&report);
    }
    Ok(())
}

pub(crate) fn build_demo_report<R>(
    services: &BoardServices<R>,
    students: u8,
) -> Result<DemoReport, AppError>
where
    R: BoardRepository + 'static,
{
    let tasks = seed_demo_tasks(&services.workflow)?;
    let Some(task) = tasks.into_iter().next() else {
        return Err(WorkflowError::NotFound.into());
    };

    let actors: Vec<Actor> = (1..=u64::from(students))
        .map(|index| Actor::student(UserId(100 + index)))
        .collect();
    let Some((late, early)) = actors.split_last() else {
        return Err(WorkflowError::NotFound.into());
    };

    let mut submitted = Vec::with_capacity(early.len());
    for student in early {
        submitted.push(
            services
                .workflow
                .submit_application(student, task.id, None)?,
        );
    }

    if let Some(winner) = submitted.first() {
        services
            .workflow
            .accept_application(&DEMO_TEACHER, task.id, winner.id)?;
    }

    let late_applicant = match services.workflow.submit_application(late, task.id, None) {
        Ok(_) => None,
        Err(err @ (WorkflowError::TaskUnavailable | WorkflowError::DuplicateApplication)) => {
            Some(err.to_string())
        }
        Err(other) => return Err(other.into()),
    };

    let overview = services.visibility.teacher_applications(&DEMO_TEACHER)?;
    let (task, applications) = overview
        .into_iter()
        .find(|entry| entry.task.id == task.id)
        .map(|entry| (entry.task, entry.applications))
        .ok_or(WorkflowError::NotFound)?;

    let boards = actors
        .iter()
        .map(|actor| {
            services.visibility.student_board(actor).map(|board| StudentView {
                student: actor.user_id,
                board,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DemoReport {
        task,
        applications,
        late_applicant,
        boards,
    })
}

fn render_demo_report(report: &DemoReport) {
    let task = &report.task;
    println!("Task board demo");
    println!(
        "Task {} \"{}\" ({}), posted {}",
        task.id,
        task.title_eng,
        task.type_of_study.as_str(),
        task.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    match task.assignee_id {
        Some(assignee) => println!("Assigned to student {assignee}"),
        None => println!("Still open"),
    }

    println!("\nApplications");
    for application in &report.applications {
        let marker = match application.status {
            ApplicationStatus::Accepted => " <- accepted",
            _ => "",
        };
        println!(
            "- #{} student {}: {}{}",
            application.id, application.user_id, application.status, marker
        );
    }

    match &report.late_applicant {
        Some(message) => println!("\nLate applicant turned away: {message}"),
        None => println!("\nLate applicant was admitted"),
    }

    println!("\nStudent views (available / applied / accepted)");
    for view in &report.boards {
        println!(
            "- student {}: {} / {} / {}",
            view.student,
            view.board.available.len(),
            view.board.applied.len(),
            view.board.accepted.len()
        );
    }
}
