//! Terminal rendering of pipelines, jobs and logs

use beacon_core::domain::job::{Job, JobStatus};
use beacon_core::domain::log::LogPage;
use beacon_core::domain::pipeline::{Pipeline, PipelineDetail, PipelineStatus};
use beacon_core::dto::pipeline::PipelinePage;
use beacon_sync::{LoadState, ViewState};
use colored::*;

fn pipeline_status(status: PipelineStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        PipelineStatus::Idle => text.dimmed(),
        PipelineStatus::Running => text.cyan().bold(),
        PipelineStatus::Stopping => text.yellow(),
        PipelineStatus::Succeeded => text.green(),
        PipelineStatus::Failed => text.red().bold(),
    }
}

fn job_status(status: JobStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        JobStatus::Idle => text.dimmed(),
        JobStatus::Waiting => text.blue(),
        JobStatus::Running => text.cyan().bold(),
        JobStatus::Stopping => text.yellow(),
        JobStatus::Succeeded => text.green(),
        JobStatus::Failed => text.red().bold(),
    }
}

/// One line per pipeline
pub fn print_pipeline_summary(pipeline: &Pipeline) {
    let schedule = if pipeline.run_on_schedule {
        "scheduled".magenta()
    } else {
        "".normal()
    };
    println!(
        "  {} {} {} {}",
        "▸".cyan(),
        pipeline.name.bold(),
        pipeline_status(pipeline.status),
        schedule
    );
    println!("    ID: {}", pipeline.id.to_string().dimmed());
}

pub fn print_page(page: &PipelinePage) {
    if page.pipelines.is_empty() {
        println!("{}", "No pipelines found.".yellow());
        return;
    }
    println!(
        "{}",
        format!(
            "Page {} of {} ({} pipeline(s) in total):",
            page.page,
            page.page_count(),
            page.total
        )
        .bold()
    );
    println!();
    for pipeline in &page.pipelines {
        print_pipeline_summary(pipeline);
    }
}

pub fn print_pipeline_details(pipeline: &Pipeline) {
    println!("{}", "Pipeline Details:".bold());
    println!("  ID:          {}", pipeline.id.to_string().cyan());
    println!("  Name:        {}", pipeline.name.bold());
    println!("  Status:      {}", pipeline_status(pipeline.status));
    if let Some(updated) = pipeline.updated_at {
        println!("  Updated:     {}", updated.format("%Y-%m-%d %H:%M:%S"));
    }
    println!(
        "  On schedule: {}",
        if pipeline.run_on_schedule { "yes" } else { "no" }
    );
    for schedule in &pipeline.schedules {
        println!("  Cron:        {}", schedule.cron.dimmed());
    }
    if let Some(message) = &pipeline.message {
        println!("  Message:     {}", message.yellow());
    }
    if !pipeline.params.is_empty() {
        println!("  Params:");
        for param in &pipeline.params {
            println!("    - {} = {}", param.name.cyan(), param.value);
        }
    }
}

fn print_job(job: &Job) {
    println!(
        "    {} {} {}",
        job.name.bold(),
        format!("[{}]", job.worker_class).dimmed(),
        job_status(job.status)
    );
}

pub fn print_detail(detail: &PipelineDetail) {
    print_pipeline_details(&detail.pipeline);
    println!();
    if detail.jobs.is_empty() {
        println!("  {}", "No jobs.".dimmed());
        return;
    }
    println!("  {}", format!("Jobs ({}):", detail.jobs.len()).bold());
    for job in detail.jobs.iter() {
        print_job(job);
    }
}

pub fn print_logs(page: &LogPage) {
    if page.entries.is_empty() {
        println!("{}", "No log entries.".dimmed());
        return;
    }
    for entry in &page.entries {
        let level = match entry.log_level.as_str() {
            "ERROR" | "CRITICAL" => entry.log_level.red().bold(),
            "WARNING" => entry.log_level.yellow(),
            _ => entry.log_level.normal(),
        };
        let message = entry
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| entry.payload.to_string());
        println!(
            "{} {:<8} {} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            level,
            entry.job_name.cyan(),
            message
        );
    }
    if page.next_page_token.is_some() {
        println!("{}", "(older entries available)".dimmed());
    }
}

/// Prints a view state as a frame of a watch session
pub fn print_state<T>(state: &ViewState<T>, print: impl Fn(&T)) {
    println!("{}", "─".repeat(80).dimmed());
    match (state.status, state.entity()) {
        (LoadState::Error, _) => {
            if let Some(error) = &state.error {
                println!("{} {}", "✗".red().bold(), error.to_string().red());
            }
            if let Some(entity) = state.entity() {
                println!("{}", "(showing last known state)".dimmed());
                print(entity);
            }
        }
        (_, Some(entity)) => {
            if state.snapshot.as_ref().is_some_and(|s| s.is_optimistic()) {
                println!("{}", "(pending confirmation)".yellow());
            }
            print(entity);
        }
        (_, None) => println!("{}", "Loading...".dimmed()),
    }
}
