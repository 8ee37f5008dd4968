//! Change detection between held and freshly fetched entities

use serde::Serialize;
use tracing::warn;

/// Decides whether a fetched entity differs from the one currently held
///
/// Comparison is structural over the serialized form: sequences are
/// order-sensitive and maps compare by key set and values. Having nothing
/// held yet counts as a change.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn has_changed<T: Serialize>(&self, old: Option<&T>, new: &T) -> bool {
        let Some(old) = old else {
            return true;
        };

        match (serde_json::to_value(old), serde_json::to_value(new)) {
            (Ok(old), Ok(new)) => old != new,
            (Err(e), _) | (_, Err(e)) => {
                warn!("Failed to serialize entity for comparison: {}", e);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job, pipeline};
    use beacon_core::domain::job::{JobSet, JobStatus};
    use beacon_core::domain::pipeline::PipelineDetail;
    use std::collections::HashMap;

    fn detail() -> PipelineDetail {
        let p = pipeline("nightly");
        let jobs = JobSet(vec![job(p.id, "extract"), job(p.id, "load")]);
        PipelineDetail::new(p, jobs)
    }

    #[test]
    fn test_first_load_is_change() {
        let detector = ChangeDetector::new();
        assert!(detector.has_changed(None, &detail()));
    }

    #[test]
    fn test_reflexive() {
        let detector = ChangeDetector::new();
        let d = detail();
        assert!(!detector.has_changed(Some(&d), &d));
        assert!(!detector.has_changed(Some(&d), &d.clone()));
    }

    #[test]
    fn test_field_change_detected() {
        let detector = ChangeDetector::new();
        let old = detail();
        let mut new = old.clone();
        new.jobs.0[1].status = JobStatus::Running;
        assert!(detector.has_changed(Some(&old), &new));
    }

    #[test]
    fn test_job_added_or_removed() {
        let detector = ChangeDetector::new();
        let old = detail();

        let mut added = old.clone();
        added.jobs.0.push(job(old.pipeline.id, "notify"));
        assert!(detector.has_changed(Some(&old), &added));

        let mut removed = old.clone();
        removed.jobs.0.pop();
        assert!(detector.has_changed(Some(&old), &removed));
    }

    #[test]
    fn test_sequence_order_matters() {
        let detector = ChangeDetector::new();
        let old = detail();
        let mut swapped = old.clone();
        swapped.jobs.0.reverse();
        assert!(detector.has_changed(Some(&old), &swapped));
    }

    #[test]
    fn test_map_compares_by_keys_not_insertion_order() {
        let detector = ChangeDetector::new();
        let mut a = HashMap::new();
        a.insert("x", 1);
        a.insert("y", 2);
        let mut b = HashMap::new();
        b.insert("y", 2);
        b.insert("x", 1);
        assert!(!detector.has_changed(Some(&a), &b));

        b.insert("z", 3);
        assert!(detector.has_changed(Some(&a), &b));
    }
}
