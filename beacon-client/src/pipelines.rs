//! Pipeline-related API endpoints

use crate::ControllerClient;
use crate::error::Result;
use beacon_core::domain::pipeline::Pipeline;
use beacon_core::dto::pipeline::{ImportFile, PageQuery, PipelinePage, RunOnScheduleRequest};
use reqwest::multipart::{Form, Part};
use uuid::Uuid;

impl ControllerClient {
    // =============================================================================
    // Pipeline Queries
    // =============================================================================

    /// List one page of pipelines whose name matches the filter
    ///
    /// # Example
    /// ```no_run
    /// # use beacon_client::ControllerClient;
    /// # use beacon_core::dto::pipeline::PageQuery;
    /// # async fn example() -> anyhow::Result<()> {
    /// let client = ControllerClient::new("http://localhost:8080");
    /// let page = client.list_pipelines(&PageQuery::new(2, 10, "")).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_pipelines(&self, query: &PageQuery) -> Result<PipelinePage> {
        let url = self.url("pipelines");
        tracing::debug!(page = query.page, filter = %query.filter, "GET {}", url);
        let response = self.client.get(&url).query(query).send().await?;

        self.handle_response(response).await
    }

    /// Get a pipeline by ID
    pub async fn get_pipeline(&self, pipeline_id: Uuid) -> Result<Pipeline> {
        let url = self.url(&format!("pipelines/{}", pipeline_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Export a pipeline definition as a JSON document
    pub async fn export_pipeline(&self, pipeline_id: Uuid) -> Result<serde_json::Value> {
        let url = self.url(&format!("pipelines/{}/export", pipeline_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    // =============================================================================
    // Pipeline Mutations
    // =============================================================================

    /// Start a pipeline run
    ///
    /// # Returns
    /// The pipeline as updated by the controller
    pub async fn start_pipeline(&self, pipeline_id: Uuid) -> Result<Pipeline> {
        let url = self.url(&format!("pipelines/{}/start", pipeline_id));
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Ask a running pipeline to stop
    pub async fn stop_pipeline(&self, pipeline_id: Uuid) -> Result<Pipeline> {
        let url = self.url(&format!("pipelines/{}/stop", pipeline_id));
        let response = self.client.post(&url).send().await?;

        self.handle_response(response).await
    }

    /// Enable or disable scheduled runs
    pub async fn set_run_on_schedule(&self, pipeline_id: Uuid, enabled: bool) -> Result<Pipeline> {
        let url = self.url(&format!("pipelines/{}/run_on_schedule", pipeline_id));
        let response = self
            .client
            .patch(&url)
            .json(&RunOnScheduleRequest {
                run_on_schedule: enabled,
            })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Upload a pipeline definition file
    ///
    /// # Returns
    /// The newly created pipeline
    pub async fn import_pipeline(&self, file: ImportFile) -> Result<Pipeline> {
        let url = self.url("pipelines/import");
        let part = Part::bytes(file.contents).file_name(file.file_name);
        let form = Form::new().part("upload_file", part);
        let response = self.client.post(&url).multipart(form).send().await?;

        self.handle_response(response).await
    }

    /// Delete a pipeline
    ///
    /// The controller refuses to delete a running pipeline.
    pub async fn delete_pipeline(&self, pipeline_id: Uuid) -> Result<()> {
        let url = self.url(&format!("pipelines/{}", pipeline_id));
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
