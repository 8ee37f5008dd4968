//! Remote collaborators
//!
//! Views talk to the controller only through these traits, so tests can
//! substitute in-memory fakes and control completion order. Both are
//! implemented for [`beacon_client::ControllerClient`].

mod http;

use async_trait::async_trait;
use beacon_core::domain::job::Job;
use beacon_core::domain::log::LogPage;
use beacon_core::domain::pipeline::Pipeline;
use beacon_core::dto::log::LogQuery;
use beacon_core::dto::pipeline::{ImportFile, PageQuery, PipelinePage};
use uuid::Uuid;

use crate::error::Result;

/// Read side of the controller API
#[async_trait]
pub trait FetchSource: Send + Sync {
    /// Fetches a single pipeline
    ///
    /// A missing pipeline must surface as [`SyncError::NotFound`](crate::SyncError::NotFound).
    async fn fetch_pipeline(&self, id: Uuid) -> Result<Pipeline>;

    /// Fetches the jobs of a pipeline in their defined order
    async fn fetch_jobs(&self, pipeline_id: Uuid) -> Result<Vec<Job>>;

    /// Fetches one page of pipelines matching the filter
    async fn list_pipelines(&self, query: &PageQuery) -> Result<PipelinePage>;

    /// Fetches one page of execution logs
    async fn fetch_logs(&self, pipeline_id: Uuid, query: &LogQuery) -> Result<LogPage>;
}

/// Write side of the controller API
///
/// Operations are not retried; idempotency on the controller is not assumed.
#[async_trait]
pub trait MutationSink: Send + Sync {
    async fn delete_pipeline(&self, id: Uuid) -> Result<()>;

    /// Starts a run and returns the pipeline as the controller now sees it
    async fn start_pipeline(&self, id: Uuid) -> Result<Pipeline>;

    /// Requests a stop and returns the updated pipeline
    async fn stop_pipeline(&self, id: Uuid) -> Result<Pipeline>;

    async fn set_run_on_schedule(&self, id: Uuid, enabled: bool) -> Result<Pipeline>;

    /// Creates a pipeline from an exported definition
    async fn import_pipeline(&self, file: ImportFile) -> Result<Pipeline>;
}
