//! Usage-ingest HTTP service.
//!
//! This crate provides the HTTP surface producers use to push LLM usage
//! telemetry into the analytics store:
//!
//! - Bulk usage event ingestion
//! - Bulk message archive ingestion
//! - Health probe
//!
//! # Authentication
//!
//! Ingestion endpoints require a static bearer token (`ANALYTICS_TOKEN`).
//! A missing or malformed `Authorization` header yields 401; a well-formed
//! header with the wrong token yields 403.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Info handler needs async for the router

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod telemetry;

pub use config::{ConfigError, ConfigWarning, LogFormat, ServiceConfig};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
