//! Job domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Identified;
use super::pipeline::Param;

/// A unit of work inside a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub name: String,
    pub worker_class: String,
    pub status: JobStatus,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub start_conditions: Vec<StartCondition>,
}

impl Identified for Job {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// Job execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Idle,
    Waiting,
    Running,
    Stopping,
    Succeeded,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Waiting => write!(f, "waiting"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Stopping => write!(f, "stopping"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Dependency edge: this job starts once `preceding_job_id` reaches `condition`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartCondition {
    pub preceding_job_id: Uuid,
    pub condition: String,
}

/// Ordered jobs of one pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobSet(pub Vec<Job>);

impl JobSet {
    pub fn iter(&self) -> std::slice::Iter<'_, Job> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks up a job by id
    pub fn get(&self, id: Uuid) -> Option<&Job> {
        self.0.iter().find(|job| job.id == id)
    }
}

impl From<Vec<Job>> for JobSet {
    fn from(jobs: Vec<Job>) -> Self {
        Self(jobs)
    }
}
