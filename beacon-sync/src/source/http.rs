//! Controller client as a fetch/mutation collaborator

use async_trait::async_trait;
use beacon_client::ControllerClient;
use beacon_core::domain::job::Job;
use beacon_core::domain::log::LogPage;
use beacon_core::domain::pipeline::Pipeline;
use beacon_core::dto::log::LogQuery;
use beacon_core::dto::pipeline::{ImportFile, PageQuery, PipelinePage};
use uuid::Uuid;

use super::{FetchSource, MutationSink};
use crate::error::Result;

#[async_trait]
impl FetchSource for ControllerClient {
    async fn fetch_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        Ok(self.get_pipeline(id).await?)
    }

    async fn fetch_jobs(&self, pipeline_id: Uuid) -> Result<Vec<Job>> {
        Ok(self.list_jobs_by_pipeline(pipeline_id).await?)
    }

    async fn list_pipelines(&self, query: &PageQuery) -> Result<PipelinePage> {
        Ok(ControllerClient::list_pipelines(self, query).await?)
    }

    async fn fetch_logs(&self, pipeline_id: Uuid, query: &LogQuery) -> Result<LogPage> {
        Ok(self.get_pipeline_logs(pipeline_id, query).await?)
    }
}

#[async_trait]
impl MutationSink for ControllerClient {
    async fn delete_pipeline(&self, id: Uuid) -> Result<()> {
        Ok(ControllerClient::delete_pipeline(self, id).await?)
    }

    async fn start_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        Ok(ControllerClient::start_pipeline(self, id).await?)
    }

    async fn stop_pipeline(&self, id: Uuid) -> Result<Pipeline> {
        Ok(ControllerClient::stop_pipeline(self, id).await?)
    }

    async fn set_run_on_schedule(&self, id: Uuid, enabled: bool) -> Result<Pipeline> {
        Ok(ControllerClient::set_run_on_schedule(self, id, enabled).await?)
    }

    async fn import_pipeline(&self, file: ImportFile) -> Result<Pipeline> {
        Ok(ControllerClient::import_pipeline(self, file).await?)
    }
}
