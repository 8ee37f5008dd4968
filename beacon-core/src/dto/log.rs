//! Log DTOs for the controller API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Filters for a pipeline's execution logs
///
/// Unset fields are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl LogQuery {
    /// Same filters, continuing after `token`
    pub fn after(&self, token: impl Into<String>) -> Self {
        Self {
            next_page_token: Some(token.into()),
            ..self.clone()
        }
    }

    /// Same filters, starting from the newest entry
    pub fn first_page(&self) -> Self {
        Self {
            next_page_token: None,
            ..self.clone()
        }
    }
}
