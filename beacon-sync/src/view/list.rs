//! Paginated pipeline list with delete, start and import

use async_trait::async_trait;
use beacon_core::domain::pipeline::{Pipeline, PipelineStatus};
use beacon_core::domain::replace_by_id;
use beacon_core::dto::pipeline::{ImportFile, PipelinePage};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::ViewSession;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::mutation::OptimisticMutationCoordinator;
use crate::query::PaginatedFilterQuery;
use crate::scheduler::{AdaptiveRefreshScheduler, BackoffPolicy, Refresh};
use crate::sequencer::{RequestSequencer, StreamId};
use crate::source::{FetchSource, MutationSink};
use crate::store::Store;

pub struct PipelineList {
    query: Arc<PaginatedFilterQuery>,
    sink: Arc<dyn MutationSink>,
    mutations: OptimisticMutationCoordinator<PipelinePage>,
}

impl PipelineList {
    pub fn new(
        source: Arc<dyn FetchSource>,
        sink: Arc<dyn MutationSink>,
        sequencer: &RequestSequencer,
        config: &SyncConfig,
    ) -> Self {
        let query = Arc::new(PaginatedFilterQuery::new(
            source,
            sequencer.stream(StreamId::PipelineList),
            config.page_size,
            config.filter_debounce,
        ));
        let mutations =
            OptimisticMutationCoordinator::new(Arc::clone(query.store()), query.stream().clone());
        Self {
            query,
            sink,
            mutations,
        }
    }

    /// Page, size and filter controls
    pub fn query(&self) -> &Arc<PaginatedFilterQuery> {
        &self.query
    }

    pub fn store(&self) -> &Arc<Store<PipelinePage>> {
        self.query.store()
    }

    /// Starts polling the current page and returns the session that owns the loop
    pub fn watch(self: &Arc<Self>, policy: BackoffPolicy) -> ViewSession {
        let scheduler = AdaptiveRefreshScheduler::new(policy);
        scheduler.start(Arc::clone(self) as Arc<dyn Refresh>);
        let query = Arc::clone(&self.query);
        ViewSession::new(scheduler, vec![self.query.stream().clone()])
            .on_close(move || query.cancel_pending())
    }

    /// Removes a pipeline, hiding it from the page before the controller answers
    ///
    /// # Errors
    /// [`SyncError::Validation`] if the pipeline is running or stopping
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.ensure_idle(id)?;
        self.mutations
            .mutate("delete", |page| page.without(id), self.sink.delete_pipeline(id))
            .await?;
        info!(pipeline = %id, "Pipeline deleted");

        if let Err(e) = self.query.requery_after_removal().await {
            warn!("Reloading the list after delete failed: {}", e);
        }
        Ok(())
    }

    /// Starts a run, showing the pipeline as running until the controller answers
    pub async fn start(&self, id: Uuid) -> Result<Pipeline> {
        self.ensure_idle(id)?;
        let (updated, record) = self
            .mutations
            .mutate(
                "start",
                |page| {
                    let mut page = page.clone();
                    for p in page.pipelines.iter_mut().filter(|p| p.id == id) {
                        p.status = PipelineStatus::Running;
                    }
                    page
                },
                self.sink.start_pipeline(id),
            )
            .await?;

        self.mutations.confirm(&record, |page| PipelinePage {
            pipelines: replace_by_id(&page.pipelines, updated.clone()),
            ..page.clone()
        });
        Ok(updated)
    }

    /// Uploads an exported definition and reloads the current page
    pub async fn import(&self, file: ImportFile) -> Result<Pipeline> {
        let name = file.file_name.clone();
        let created = self
            .sink
            .import_pipeline(file)
            .await
            .map_err(|e| SyncError::conflict("import", e))?;
        info!(file = %name, pipeline = %created.id, "Pipeline imported");

        if let Err(e) = self.query.set_page(self.query.cursor().page).await {
            warn!("Reloading the list after import failed: {}", e);
        }
        Ok(created)
    }

    fn ensure_idle(&self, id: Uuid) -> Result<()> {
        let state = self.store().state();
        let blocked = state
            .entity()
            .and_then(|page| page.pipelines.iter().find(|p| p.id == id))
            .is_some_and(Pipeline::is_blocked);
        if blocked {
            return Err(SyncError::Validation(format!(
                "pipeline {} is running; stop it first",
                id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Refresh for PipelineList {
    async fn refresh(&self) -> Result<bool> {
        self.query.refresh().await
    }
}
