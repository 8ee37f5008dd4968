//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Identified;
use super::job::JobSet;

/// Pipeline record as reported by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub name: String,
    pub status: PipelineStatus,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub run_on_schedule: bool,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub emails_for_notifications: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub has_jobs: bool,
}

impl Identified for Pipeline {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl Pipeline {
    /// A pipeline that is running or winding down cannot be edited or removed
    pub fn is_blocked(&self) -> bool {
        matches!(
            self.status,
            PipelineStatus::Running | PipelineStatus::Stopping
        )
    }
}

/// Pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Idle,
    Running,
    Stopping,
    Succeeded,
    Failed,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStatus::Idle => write!(f, "idle"),
            PipelineStatus::Running => write!(f, "running"),
            PipelineStatus::Stopping => write!(f, "stopping"),
            PipelineStatus::Succeeded => write!(f, "succeeded"),
            PipelineStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Cron schedule attached to a pipeline
///
/// The expression is kept verbatim; turning it into prose is left to presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Option<Uuid>,
    pub pipeline_id: Option<Uuid>,
    pub cron: String,
}

/// Named pipeline parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub label: Option<String>,
}

/// A pipeline together with its jobs, fetched as one unit by a pipeline view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDetail {
    pub pipeline: Pipeline,
    pub jobs: JobSet,
}

impl PipelineDetail {
    pub fn new(pipeline: Pipeline, jobs: JobSet) -> Self {
        Self { pipeline, jobs }
    }

    /// Returns a copy with the pipeline record swapped out and the jobs kept
    pub fn with_pipeline(&self, pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            jobs: self.jobs.clone(),
        }
    }
}
