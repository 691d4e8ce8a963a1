//! Waypoint - a task dependency graph engine.
//!
//! This library provides the core graph machinery behind a planning
//! feature: a directed acyclic graph of work items with cycle-safe
//! mutation, scheduling queries (ready/blocked, topological order), and
//! derived progress statistics.
//!
//! The engine itself performs no I/O; the [`plan`] module is the adapter
//! that converts a persisted plan to and from a [`models::graph::Graph`].

pub mod models;
pub mod plan;

/// Library-level error type for Waypoint operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] models::graph::ValidationError),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Waypoint operations.
pub type Result<T> = std::result::Result<T, Error>;
