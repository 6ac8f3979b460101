//! HTTP request handlers for all API endpoints.
//!
//! - [`plans`]: lesson plan generation (completion API -> tex bucket)
//! - [`compile`]: LaTeX-to-PDF compilation (tex bucket -> container -> pdf bucket)
//! - [`documents`]: stored document browsing, editing, and signed PDF URLs
//! - [`health`]: liveness check
//!
//! Handlers return [`crate::errors::Error`] which converts to the appropriate
//! HTTP status code and a JSON `{"detail": ...}` body.

pub mod compile;
pub mod documents;
pub mod health;
pub mod plans;
