//! In-memory controller for tests
//!
//! `FakeController` keeps a small catalog of pipelines and answers both
//! collaborator traits from it. Each operation can be scripted ahead of time
//! to fail or to hold its answer behind a gate, which lets tests decide the
//! order in which overlapping requests complete. An answer is computed when
//! the call is made, before waiting on the gate.

use async_trait::async_trait;
use beacon_core::domain::job::{Job, JobStatus};
use beacon_core::domain::log::LogPage;
use beacon_core::domain::pipeline::{Pipeline, PipelineStatus};
use beacon_core::dto::log::LogQuery;
use beacon_core::dto::pipeline::{ImportFile, PageQuery, PipelinePage};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::source::{FetchSource, MutationSink};

pub fn pipeline(name: &str) -> Pipeline {
    Pipeline {
        id: Uuid::new_v4(),
        name: name.to_string(),
        status: PipelineStatus::Idle,
        updated_at: None,
        run_on_schedule: false,
        schedules: vec![],
        params: vec![],
        emails_for_notifications: None,
        message: None,
        has_jobs: true,
    }
}

pub fn job(pipeline_id: Uuid, name: &str) -> Job {
    Job {
        id: Uuid::new_v4(),
        pipeline_id,
        name: name.to_string(),
        worker_class: "Commenter".to_string(),
        status: JobStatus::Idle,
        params: vec![],
        start_conditions: vec![],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FetchPipeline,
    FetchJobs,
    ListPipelines,
    FetchLogs,
    Delete,
    Start,
    Stop,
    Schedule,
    Import,
}

struct Script {
    gate: Option<oneshot::Receiver<()>>,
    error: Option<SyncError>,
}

#[derive(Default)]
pub struct FakeController {
    catalog: Mutex<Vec<Pipeline>>,
    jobs: Mutex<HashMap<Uuid, Vec<Job>>>,
    logs: Mutex<HashMap<Option<String>, LogPage>>,
    scripts: Mutex<HashMap<Op, VecDeque<Script>>>,
    calls: Mutex<Vec<Op>>,
    queries: Mutex<Vec<PageQuery>>,
    log_queries: Mutex<Vec<LogQuery>>,
}

impl FakeController {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_pipelines(pipelines: Vec<Pipeline>) -> Arc<Self> {
        let fake = Self::new();
        *fake.catalog.lock().unwrap() = pipelines;
        fake
    }

    pub fn insert(&self, pipeline: Pipeline) {
        self.catalog.lock().unwrap().push(pipeline);
    }

    pub fn set_jobs(&self, pipeline_id: Uuid, jobs: Vec<Job>) {
        self.jobs.lock().unwrap().insert(pipeline_id, jobs);
    }

    pub fn set_logs(&self, token: Option<&str>, page: LogPage) {
        self.logs
            .lock()
            .unwrap()
            .insert(token.map(str::to_string), page);
    }

    pub fn update(&self, id: Uuid, change: impl FnOnce(&mut Pipeline)) {
        let mut catalog = self.catalog.lock().unwrap();
        if let Some(p) = catalog.iter_mut().find(|p| p.id == id) {
            change(p);
        }
    }

    pub fn remove(&self, id: Uuid) {
        self.catalog.lock().unwrap().retain(|p| p.id != id);
    }

    pub fn pipelines(&self) -> Vec<Pipeline> {
        self.catalog.lock().unwrap().clone()
    }

    /// Holds the next `op` call until the returned sender fires (or drops)
    pub fn hold(&self, op: Op) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script(op, Some(rx), None);
        tx
    }

    /// Fails the next `op` call with `error`
    pub fn fail(&self, op: Op, error: SyncError) {
        self.script(op, None, Some(error));
    }

    /// Holds the next `op` call, then fails it with `error`
    pub fn hold_and_fail(&self, op: Op, error: SyncError) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script(op, Some(rx), Some(error));
        tx
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == op).count()
    }

    pub fn queries(&self) -> Vec<PageQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn log_queries(&self) -> Vec<LogQuery> {
        self.log_queries.lock().unwrap().clone()
    }

    fn script(&self, op: Op, gate: Option<oneshot::Receiver<()>>, error: Option<SyncError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(op)
            .or_default()
            .push_back(Script { gate, error });
    }

    async fn answer<T>(&self, op: Op, compute: impl FnOnce() -> Result<T>) -> Result<T> {
        self.calls.lock().unwrap().push(op);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&op)
            .and_then(|queue| queue.pop_front());

        let Some(Script { gate, error }) = script else {
            return compute();
        };
        if let Some(error) = error {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            return Err(error);
        }
        let answer = compute();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        answer
    }

    fn find(&self, id: Uuid) -> Result<Pipeline> {
        self.catalog
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("pipeline {}", id)))
    }

    fn modify(&self, id: Uuid, change: impl FnOnce(&mut Pipeline)) -> Result<Pipeline> {
        let mut catalog = self.catalog.lock().unwrap();
        let p = catalog
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| SyncError::NotFound(format!("pipeline {}", id)))?;
        change(p);
        Ok(p.clone())
    }

    fn page(&self, query: &PageQuery) -> PipelinePage {
        let needle = query.filter.to_lowercase();
        let matching: Vec<Pipeline> = self
            .catalog
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();

        let size = query.items_per_page as usize;
        let skip = (query.page as usize - 1) * size;
        PipelinePage {
            total: matching.len() as u64,
            pipelines: matching.into_iter().skip(skip).take(size).collect(),
            page: query.page,
            items_per_page: query.items_per_page,
        }
    }
}

#[async_trait]
impl FetchSource for FakeController {
    async fn fetch_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        self.answer(Op::FetchPipeline, || self.find(id)).await
    }

    async fn fetch_jobs(&self, pipeline_id: Uuid) -> Result<Vec<Job>> {
        self.answer(Op::FetchJobs, || {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .get(&pipeline_id)
                .cloned()
                .unwrap_or_default())
        })
        .await
    }

    async fn list_pipelines(&self, query: &PageQuery) -> Result<PipelinePage> {
        self.queries.lock().unwrap().push(query.clone());
        self.answer(Op::ListPipelines, || Ok(self.page(query))).await
    }

    async fn fetch_logs(&self, _pipeline_id: Uuid, query: &LogQuery) -> Result<LogPage> {
        self.log_queries.lock().unwrap().push(query.clone());
        self.answer(Op::FetchLogs, || {
            Ok(self
                .logs
                .lock()
                .unwrap()
                .get(&query.next_page_token)
                .cloned()
                .unwrap_or_default())
        })
        .await
    }
}

#[async_trait]
impl MutationSink for FakeController {
    async fn delete_pipeline(&self, id: Uuid) -> Result<()> {
        self.answer(Op::Delete, || {
            self.find(id)?;
            self.remove(id);
            Ok(())
        })
        .await
    }

    async fn start_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        self.answer(Op::Start, || {
            self.modify(id, |p| p.status = PipelineStatus::Running)
        })
        .await
    }

    async fn stop_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        self.answer(Op::Stop, || {
            self.modify(id, |p| p.status = PipelineStatus::Stopping)
        })
        .await
    }

    async fn set_run_on_schedule(&self, id: Uuid, enabled: bool) -> Result<Pipeline> {
        self.answer(Op::Schedule, || {
            self.modify(id, |p| p.run_on_schedule = enabled)
        })
        .await
    }

    async fn import_pipeline(&self, file: ImportFile) -> Result<Pipeline> {
        self.answer(Op::Import, || {
            let name = file.file_name.trim_end_matches(".json");
            let created = pipeline(name);
            self.insert(created.clone());
            Ok(created)
        })
        .await
    }
}
