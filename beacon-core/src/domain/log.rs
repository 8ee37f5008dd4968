//! Log domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A log entry emitted while a pipeline ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub job_name: String,
    #[serde(default = "default_level")]
    pub log_level: String,
    pub payload: serde_json::Value,
}

fn default_level() -> String {
    "INFO".to_string()
}

impl LogEntry {
    /// Human-readable message carried in the payload, if any
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(|m| m.as_str())
    }
}

/// One page of log entries, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogPage {
    pub entries: Vec<LogEntry>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
