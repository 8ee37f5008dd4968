//! Data Transfer Objects for the controller API
//!
//! Query parameters and paged responses. Field names follow the controller's
//! wire format through serde renames.

pub mod log;
pub mod pipeline;
