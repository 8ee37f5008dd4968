//! Pipeline command handlers
//!
//! Mutations go through a sync view loaded with the pipeline, so the same
//! local checks apply as in a watched view. `list --watch` and `watch` run a
//! view and redraw whenever its state changes.

use anyhow::{Context, Result};
use beacon_client::ControllerClient;
use beacon_core::domain::log::LogPage;
use beacon_core::dto::log::LogQuery;
use beacon_core::dto::pipeline::{FIRST_PAGE, ImportFile, MAX_PAGE_SIZE};
use beacon_sync::{
    ErrorKind, LogFeed, PipelineList, PipelineView, Refresh, RequestSequencer, ViewState,
};
use clap::Subcommand;
use colored::*;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::id_resolver::resolve_pipeline_id;
use crate::render;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// List pipelines page by page
    List {
        /// Page to show (1-based)
        #[arg(long, default_value = "1")]
        page: u32,

        /// Pipelines per page (defaults to BEACON_PAGE_SIZE)
        #[arg(long)]
        page_size: Option<u32>,

        /// Only pipelines whose name contains this text
        #[arg(short, long, default_value = "")]
        filter: String,

        /// Keep polling and redraw on every change
        #[arg(short, long)]
        watch: bool,
    },
    /// Get pipeline details and jobs
    Get {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
    /// Follow a pipeline until interrupted
    Watch {
        /// Pipeline ID or unambiguous prefix
        id: String,

        /// Also show the newest log entries
        #[arg(short, long)]
        logs: bool,
    },
    /// Start a run
    Start {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
    /// Stop a running pipeline
    Stop {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
    /// Delete a pipeline
    Delete {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
    /// Enable or disable scheduled runs
    Schedule {
        /// Pipeline ID or unambiguous prefix
        id: String,

        #[arg(long, conflicts_with = "disable", required_unless_present = "disable")]
        enable: bool,

        #[arg(long)]
        disable: bool,
    },
    /// Create a pipeline from an exported definition
    Import {
        /// Path to the exported JSON file
        file: String,
    },
    /// Export a pipeline definition as JSON
    Export {
        /// Pipeline ID or unambiguous prefix
        id: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Show execution logs, newest first
    Logs {
        /// Pipeline ID or unambiguous prefix
        id: String,

        /// Only entries of this job
        #[arg(long)]
        job: Option<Uuid>,

        /// Only entries of this worker class
        #[arg(long)]
        worker: Option<String>,

        /// Only entries of this level (e.g., ERROR)
        #[arg(long)]
        level: Option<String>,

        /// Free-text search
        #[arg(short, long)]
        query: Option<String>,

        /// Additional older pages to load
        #[arg(long, default_value = "0")]
        more: u32,
    },
}

/// Routes pipeline subcommands to their respective handlers.
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let client = config.client()?;

    match command {
        PipelineCommands::List {
            page,
            page_size,
            filter,
            watch,
        } => {
            let page_size = page_size.unwrap_or(config.sync.page_size);
            list_pipelines(client, config, page, page_size, filter, watch).await
        }
        PipelineCommands::Get { id } => get_pipeline(&client, &id).await,
        PipelineCommands::Watch { id, logs } => watch_pipeline(client, config, &id, logs).await,
        PipelineCommands::Start { id } => start_pipeline(client, &id).await,
        PipelineCommands::Stop { id } => stop_pipeline(client, &id).await,
        PipelineCommands::Delete { id } => delete_pipeline(client, config, &id).await,
        PipelineCommands::Schedule { id, enable, .. } => {
            set_run_on_schedule(client, &id, enable).await
        }
        PipelineCommands::Import { file } => import_pipeline(client, config, &file).await,
        PipelineCommands::Export { id, output } => export_pipeline(&client, &id, output).await,
        PipelineCommands::Logs {
            id,
            job,
            worker,
            level,
            query,
            more,
        } => {
            let query = LogQuery {
                job_id: job,
                worker_class: worker,
                log_level: level,
                query,
                next_page_token: None,
            };
            show_logs(client, &id, query, more).await
        }
    }
}

async fn list_pipelines(
    client: Arc<ControllerClient>,
    config: &Config,
    page: u32,
    page_size: u32,
    filter: String,
    watch: bool,
) -> Result<()> {
    let list = pipeline_list(client, config);
    list.query().query(page, page_size, filter).await?;

    if !watch {
        if let Some(page) = list.store().current() {
            render::print_page(&page.entity);
        }
        return Ok(());
    }

    let mut updates = list.store().subscribe();
    let session = list.watch(config.sync.backoff_policy());
    render::print_state(&updates.borrow_and_update().clone(), render::print_page);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                render::print_state(&state, render::print_page);
            }
        }
    }

    session.close();
    Ok(())
}

fn pipeline_list(client: Arc<ControllerClient>, config: &Config) -> Arc<PipelineList> {
    Arc::new(PipelineList::new(
        client.clone(),
        client,
        &RequestSequencer::new(),
        &config.sync,
    ))
}

async fn get_pipeline(client: &ControllerClient, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, id).await?;

    let (pipeline, jobs) = tokio::try_join!(
        client.get_pipeline(uuid),
        client.list_jobs_by_pipeline(uuid)
    )?;

    render::print_detail(&beacon_core::domain::pipeline::PipelineDetail::new(
        pipeline,
        jobs.into(),
    ));
    Ok(())
}

async fn watch_pipeline(
    client: Arc<ControllerClient>,
    config: &Config,
    id: &str,
    show_logs: bool,
) -> Result<()> {
    let uuid = resolve_pipeline_id(&client, id).await?;
    let view = Arc::new(PipelineView::new(
        uuid,
        client.clone(),
        client,
        &RequestSequencer::new(),
    ));

    let mut updates = view.store().subscribe();
    let mut log_updates = view.logs().store().subscribe();
    let session = view.watch(config.sync.backoff_policy());
    info!(pipeline = %uuid, "Watching; press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if is_gone(&state) {
                    println!("{}", format!("Pipeline {} no longer exists.", uuid).yellow());
                    break;
                }
                render::print_state(&state, render::print_detail);
            }
            changed = log_updates.changed(), if show_logs => {
                if changed.is_err() {
                    break;
                }
                print_log_state(&mut log_updates);
            }
        }
    }

    session.close();
    Ok(())
}

fn is_gone<T>(state: &ViewState<T>) -> bool {
    state
        .error
        .as_ref()
        .is_some_and(|e| e.kind == ErrorKind::NotFound)
}

fn print_log_state(updates: &mut watch::Receiver<ViewState<LogPage>>) {
    let state = updates.borrow_and_update().clone();
    if let Some(page) = state.entity() {
        println!("{}", "Logs:".bold());
        render::print_logs(page);
    }
}

/// Loads the pipeline into a view so mutations see its current status
async fn loaded_view(client: Arc<ControllerClient>, id: &str) -> Result<PipelineView> {
    let uuid = resolve_pipeline_id(&client, id).await?;
    let view = PipelineView::new(uuid, client.clone(), client, &RequestSequencer::new());
    view.refresh()
        .await
        .with_context(|| format!("Failed to load pipeline {}", uuid))?;
    Ok(view)
}

async fn start_pipeline(client: Arc<ControllerClient>, id: &str) -> Result<()> {
    let view = loaded_view(client, id).await?;
    let pipeline = view.start().await?;

    println!("{}", "✓ Pipeline started!".green().bold());
    println!("  ID:     {}", pipeline.id.to_string().cyan());
    println!("  Status: {}", pipeline.status.to_string().yellow());
    Ok(())
}

async fn stop_pipeline(client: Arc<ControllerClient>, id: &str) -> Result<()> {
    let view = loaded_view(client, id).await?;
    let pipeline = view.stop().await?;

    println!("{}", "✓ Stop requested.".green().bold());
    println!("  ID:     {}", pipeline.id.to_string().cyan());
    println!("  Status: {}", pipeline.status.to_string().yellow());
    Ok(())
}

async fn set_run_on_schedule(client: Arc<ControllerClient>, id: &str, enabled: bool) -> Result<()> {
    let view = loaded_view(client, id).await?;
    let pipeline = view.set_run_on_schedule(enabled).await?;

    let state = if pipeline.run_on_schedule {
        "enabled"
    } else {
        "disabled"
    };
    println!(
        "{}",
        format!("✓ Scheduled runs {} for {}", state, pipeline.name)
            .green()
            .bold()
    );
    Ok(())
}

async fn delete_pipeline(client: Arc<ControllerClient>, config: &Config, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(&client, id).await?;
    let pipeline = client.get_pipeline(uuid).await?;

    // A page filtered by name holds the pipeline, with its current status
    let list = pipeline_list(client, config);
    list.query()
        .query(FIRST_PAGE, MAX_PAGE_SIZE, pipeline.name.as_str())
        .await
        .with_context(|| format!("Failed to load pipeline {}", uuid))?;
    list.delete(uuid).await?;

    println!(
        "{}",
        format!("✓ Pipeline {} deleted successfully!", uuid)
            .green()
            .bold()
    );
    Ok(())
}

async fn import_pipeline(client: Arc<ControllerClient>, config: &Config, path: &str) -> Result<()> {
    let contents =
        std::fs::read(path).with_context(|| format!("Failed to read definition file: {}", path))?;
    let file_name = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    let pipeline = pipeline_list(client, config)
        .import(ImportFile::new(file_name, contents))
        .await?;

    println!("{}", "✓ Pipeline imported successfully!".green().bold());
    println!("  ID:   {}", pipeline.id.to_string().cyan());
    println!("  Name: {}", pipeline.name.bold());
    Ok(())
}

async fn export_pipeline(
    client: &ControllerClient,
    id: &str,
    output: Option<String>,
) -> Result<()> {
    let uuid = resolve_pipeline_id(client, id).await?;
    let definition = client.export_pipeline(uuid).await?;
    let json = serde_json::to_string_pretty(&definition)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path))?;
            println!("{}", format!("✓ Exported to {}", path).green().bold());
        }
        None => println!("{}", json),
    }
    Ok(())
}

async fn show_logs(
    client: Arc<ControllerClient>,
    id: &str,
    query: LogQuery,
    more: u32,
) -> Result<()> {
    let uuid = resolve_pipeline_id(&client, id).await?;
    let feed = LogFeed::new(uuid, client, &RequestSequencer::new());

    feed.set_query(query).await?;
    for _ in 0..more {
        if !feed.load_more().await? {
            break;
        }
    }

    match feed.store().current() {
        Some(page) => render::print_logs(&page.entity),
        None => println!("{}", "No log entries.".dimmed()),
    }
    Ok(())
}
