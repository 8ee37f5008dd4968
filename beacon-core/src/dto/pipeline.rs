//! Pipeline DTOs for the controller API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pipeline::Pipeline;
use crate::domain::remove_by_id;

/// First page index; pages are 1-based
pub const FIRST_PAGE: u32 = 1;

/// Largest page size the controller is asked for
pub const MAX_PAGE_SIZE: u32 = 100;

/// Longest accepted filter text
pub const MAX_FILTER_LEN: usize = 255;

/// Paginated, name-filtered pipeline list request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: u32,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: u32,
    #[serde(default)]
    pub filter: String,
}

impl PageQuery {
    pub fn new(page: u32, items_per_page: u32, filter: impl Into<String>) -> Self {
        Self {
            page,
            items_per_page,
            filter: filter.into(),
        }
    }

    /// Checks the bounds the controller accepts
    pub fn validate(&self) -> Result<(), String> {
        if self.page < FIRST_PAGE {
            return Err(format!("page must be at least {}", FIRST_PAGE));
        }
        if self.items_per_page == 0 || self.items_per_page > MAX_PAGE_SIZE {
            return Err(format!(
                "page size must be between 1 and {} (got {})",
                MAX_PAGE_SIZE, self.items_per_page
            ));
        }
        if self.filter.chars().count() > MAX_FILTER_LEN {
            return Err(format!(
                "filter is too long (max {} characters)",
                MAX_FILTER_LEN
            ));
        }
        Ok(())
    }
}

/// One page of pipelines plus the total count matching the filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePage {
    pub pipelines: Vec<Pipeline>,
    pub total: u64,
    pub page: u32,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: u32,
}

impl PipelinePage {
    pub fn empty(page: u32, items_per_page: u32) -> Self {
        Self {
            pipelines: Vec::new(),
            total: 0,
            page,
            items_per_page,
        }
    }

    /// Number of pages needed for `total` items; at least one
    pub fn page_count(&self) -> u32 {
        if self.items_per_page == 0 {
            return 1;
        }
        let pages = self.total.div_ceil(u64::from(self.items_per_page));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    /// Returns a copy without the pipeline `id`, with `total` adjusted
    pub fn without(&self, id: Uuid) -> Self {
        let pipelines = remove_by_id(&self.pipelines, id);
        let removed = (self.pipelines.len() - pipelines.len()) as u64;
        Self {
            pipelines,
            total: self.total.saturating_sub(removed),
            page: self.page,
            items_per_page: self.items_per_page,
        }
    }
}

/// Body of a run-on-schedule toggle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOnScheduleRequest {
    pub run_on_schedule: bool,
}

/// A pipeline definition file to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFile {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl ImportFile {
    pub fn new(file_name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            contents,
        }
    }
}
