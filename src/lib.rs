//! Task Management API Library
//!
//! Request pipeline for the internal task endpoints: every request is merged,
//! validated against a declared shape and checked against declared permission
//! rules before a named data-access routine runs. Task lookups reassemble the
//! routine's result fragments into one composite view.

pub mod api;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod pipeline;
pub mod service;

pub use error::ServiceError;
