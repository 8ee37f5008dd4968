//! Single pipeline view: the pipeline, its jobs and its logs

use async_trait::async_trait;
use beacon_core::domain::job::JobSet;
use beacon_core::domain::pipeline::{Pipeline, PipelineDetail, PipelineStatus};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{LogFeed, ViewSession};
use crate::change::ChangeDetector;
use crate::error::{Result, SyncError};
use crate::mutation::OptimisticMutationCoordinator;
use crate::scheduler::{AdaptiveRefreshScheduler, BackoffPolicy, Refresh};
use crate::sequencer::{RequestSequencer, StreamId, TokenStream};
use crate::source::{FetchSource, MutationSink};
use crate::store::{Applied, Store};

/// Keeps one pipeline and its jobs in sync with the controller
///
/// Pipeline and jobs are fetched together and committed as one
/// [`PipelineDetail`]. Logs are only re-fetched when that detail changed.
pub struct PipelineView {
    id: Uuid,
    source: Arc<dyn FetchSource>,
    sink: Arc<dyn MutationSink>,
    store: Arc<Store<PipelineDetail>>,
    stream: TokenStream,
    detector: ChangeDetector,
    mutations: OptimisticMutationCoordinator<PipelineDetail>,
    logs: LogFeed,
}

impl PipelineView {
    pub fn new(
        id: Uuid,
        source: Arc<dyn FetchSource>,
        sink: Arc<dyn MutationSink>,
        sequencer: &RequestSequencer,
    ) -> Self {
        let store = Arc::new(Store::new());
        let stream = sequencer.stream(StreamId::Pipeline(id));
        Self {
            id,
            logs: LogFeed::new(id, Arc::clone(&source), sequencer),
            source,
            sink,
            mutations: OptimisticMutationCoordinator::new(Arc::clone(&store), stream.clone()),
            store,
            stream,
            detector: ChangeDetector::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn store(&self) -> &Arc<Store<PipelineDetail>> {
        &self.store
    }

    pub fn logs(&self) -> &LogFeed {
        &self.logs
    }

    /// Starts polling and returns the session that owns the loop
    pub fn watch(self: &Arc<Self>, policy: BackoffPolicy) -> ViewSession {
        let scheduler = AdaptiveRefreshScheduler::new(policy);
        scheduler.start(Arc::clone(self) as Arc<dyn Refresh>);
        info!(pipeline = %self.id, "Watching pipeline");
        ViewSession::new(
            scheduler,
            vec![self.stream.clone(), self.logs.stream().clone()],
        )
    }

    /// Starts a run; the view shows it as running until the controller answers
    ///
    /// # Errors
    /// [`SyncError::Validation`] if the pipeline is already running or stopping
    pub async fn start(&self) -> Result<Pipeline> {
        self.ensure(|p| !p.is_blocked(), "pipeline is already running")?;
        self.transition("start", PipelineStatus::Running, self.sink.start_pipeline(self.id))
            .await
    }

    /// Requests a stop; the view shows the pipeline as stopping meanwhile
    ///
    /// # Errors
    /// [`SyncError::Validation`] if the pipeline is not running
    pub async fn stop(&self) -> Result<Pipeline> {
        self.ensure(
            |p| p.status == PipelineStatus::Running,
            "pipeline is not running",
        )?;
        self.transition("stop", PipelineStatus::Stopping, self.sink.stop_pipeline(self.id))
            .await
    }

    pub async fn set_run_on_schedule(&self, enabled: bool) -> Result<Pipeline> {
        let (updated, record) = self
            .mutations
            .mutate(
                "set run on schedule",
                |detail| {
                    let mut pipeline = detail.pipeline.clone();
                    pipeline.run_on_schedule = enabled;
                    detail.with_pipeline(pipeline)
                },
                self.sink.set_run_on_schedule(self.id, enabled),
            )
            .await?;
        self.mutations
            .confirm(&record, |detail| detail.with_pipeline(updated.clone()));
        Ok(updated)
    }

    async fn transition(
        &self,
        operation: &str,
        status: PipelineStatus,
        remote: impl Future<Output = Result<Pipeline>>,
    ) -> Result<Pipeline> {
        let (updated, record) = self
            .mutations
            .mutate(
                operation,
                |detail| {
                    let mut pipeline = detail.pipeline.clone();
                    pipeline.status = status;
                    detail.with_pipeline(pipeline)
                },
                remote,
            )
            .await?;
        if self
            .mutations
            .confirm(&record, |detail| detail.with_pipeline(updated.clone()))
        {
            debug!(pipeline = %self.id, status = %updated.status, "{} confirmed", operation);
        } else {
            debug!(pipeline = %self.id, "{} answered after a newer poll", operation);
        }
        Ok(updated)
    }

    fn ensure(&self, allowed: impl FnOnce(&Pipeline) -> bool, message: &str) -> Result<()> {
        match self.store.state().entity() {
            Some(detail) if !allowed(&detail.pipeline) => {
                Err(SyncError::Validation(message.to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Refresh for PipelineView {
    async fn refresh(&self) -> Result<bool> {
        if self.stream.is_frozen() {
            return Err(SyncError::Closed);
        }
        let token = self.stream.issue();

        let fetched = tokio::try_join!(
            self.source.fetch_pipeline(self.id),
            self.source.fetch_jobs(self.id)
        );
        let (pipeline, jobs) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                if self.store.fail(&self.stream, token, &e) && e.is_not_found() {
                    warn!(pipeline = %self.id, "Pipeline no longer exists");
                }
                return Err(e);
            }
        };

        let detail = PipelineDetail::new(pipeline, JobSet::from(jobs));
        let applied = self.store.accept(&self.stream, token, detail, &self.detector);
        let changed = applied == Applied::Changed;
        if changed {
            if let Err(e) = self.logs.refresh().await {
                warn!(pipeline = %self.id, "Log refresh failed: {}", e);
            }
        }
        Ok(changed)
    }
}
