//! Pipeline log endpoints

use crate::ControllerClient;
use crate::error::Result;
use beacon_core::domain::log::LogPage;
use beacon_core::dto::log::LogQuery;
use uuid::Uuid;

impl ControllerClient {
    /// Get one page of execution logs for a pipeline, newest first
    ///
    /// Pass the previous page's `next_page_token` in `query` to continue.
    pub async fn get_pipeline_logs(&self, pipeline_id: Uuid, query: &LogQuery) -> Result<LogPage> {
        let url = self.url(&format!("pipelines/{}/logs", pipeline_id));
        let response = self.client.get(&url).query(query).send().await?;

        self.handle_response(response).await
    }
}
