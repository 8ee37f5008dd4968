//! ID resolver module
//!
//! Resolves pipeline id prefixes to full UUIDs by walking the controller's
//! paginated pipeline list, so users can type short, unambiguous prefixes.

use anyhow::{Context, Result, anyhow};
use beacon_client::ControllerClient;
use beacon_core::dto::pipeline::{FIRST_PAGE, MAX_PAGE_SIZE, PageQuery};
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// Resolve a pipeline ID or prefix to a full UUID
///
/// # Errors
/// Returns an error if:
/// - No pipeline matches the prefix
/// - Multiple pipelines match the prefix (ambiguous)
/// - API call fails
pub async fn resolve_pipeline_id(client: &ControllerClient, id: &str) -> Result<Uuid> {
    let id_or_prefix = IdOrPrefix::parse(id);
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let mut matches = Vec::new();
    let mut page = FIRST_PAGE;
    loop {
        let result = client
            .list_pipelines(&PageQuery::new(page, MAX_PAGE_SIZE, ""))
            .await
            .context("Failed to fetch pipelines for ID resolution")?;

        matches.extend(
            result
                .pipelines
                .iter()
                .filter(|p| id_or_prefix.matches(p.id))
                .map(|p| p.id),
        );
        if page >= result.page_count() || result.pipelines.is_empty() {
            break;
        }
        page += 1;
    }

    pick(&id_or_prefix, matches)
}

fn pick(prefix: &IdOrPrefix, matches: Vec<Uuid>) -> Result<Uuid> {
    match matches.as_slice() {
        [] => Err(anyhow!(
            "No pipeline found with ID starting with '{}'",
            prefix
        )),
        [only] => Ok(*only),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple pipelines: {}",
                prefix,
                ids.join(", ")
            ))
        }
    }
}
