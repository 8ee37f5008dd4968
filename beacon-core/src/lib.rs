//! Beacon Core
//!
//! Core types shared by the Beacon client crates.
//!
//! This crate contains:
//! - Domain types: Pipelines, jobs and execution logs as the controller reports them
//! - DTOs: Query parameters and paged responses exchanged with the controller API

pub mod domain;
pub mod dto;
