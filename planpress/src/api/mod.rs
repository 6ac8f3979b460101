//! API layer for HTTP request handling and data models.
//!
//! This module contains the REST API implementation, organized into:
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Generation** (`POST /generate-lesson-plan/`): lesson plan metadata in,
//!   generated LaTeX out, stored in the tex bucket
//! - **Compilation** (`POST /compile-latex/`): compiles a stored `.tex` object
//!   to PDF and stores it in the pdf bucket
//! - **Documents** (`/tex-files/*`, `/pdf-files/*`): browse and edit stored
//!   sources, mint signed URLs for compiled PDFs
//! - **Health** (`GET /health/`): liveness check
//!
//! All endpoints are documented with OpenAPI annotations using `utoipa`;
//! interactive documentation is served at `/docs`.

pub mod handlers;
pub mod models;
