//! Core domain types
//!
//! This module contains the entities held by client views. They mirror the
//! controller's records and are treated as immutable values: a view replaces
//! them wholesale on each accepted fetch.

pub mod job;
pub mod log;
pub mod pipeline;

use uuid::Uuid;

/// Entities addressable by a stable unique id
///
/// List mutations match on this id rather than on position so they stay
/// correct while the list changes underneath them.
pub trait Identified {
    fn id(&self) -> Uuid;
}

/// Removes every element whose id equals `id`, keeping the order of the rest
pub fn remove_by_id<T: Identified + Clone>(items: &[T], id: Uuid) -> Vec<T> {
    items.iter().filter(|item| item.id() != id).cloned().collect()
}

/// Replaces the element whose id matches `replacement`, leaving others untouched
///
/// Returns the items unchanged if no element matches.
pub fn replace_by_id<T: Identified + Clone>(items: &[T], replacement: T) -> Vec<T> {
    let id = replacement.id();
    let mut replacement = Some(replacement);
    items
        .iter()
        .map(|item| {
            if item.id() == id {
                replacement.take().unwrap_or_else(|| item.clone())
            } else {
                item.clone()
            }
        })
        .collect()
}
