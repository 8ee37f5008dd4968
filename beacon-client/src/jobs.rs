//! Job-related API endpoints

use crate::ControllerClient;
use crate::error::Result;
use beacon_core::domain::job::Job;
use uuid::Uuid;

impl ControllerClient {
    /// List the jobs of a pipeline, in the controller's order
    pub async fn list_jobs_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Job>> {
        let url = self.url("jobs");
        let response = self
            .client
            .get(&url)
            .query(&[("pipeline_id", pipeline_id.to_string())])
            .send()
            .await?;

        self.handle_response(response).await
    }
}
