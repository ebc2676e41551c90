//! # API Shared
//!
//! Shared wire types and services for the EHR API.
//!
//! Contains:
//! - Request/response bodies (`dto` module), with OpenAPI schemas
//! - The stored clinical record shape used by both the API and the record store
//! - Shared services like `HealthService`
//!
//! Used by `ehr-core` and `api-rest`.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
