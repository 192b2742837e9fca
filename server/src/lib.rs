//! HTTP adapter for the Task Transition Core.
//!
//! Thin shell around `shopfloor_core::executor::TransitionExecutor`: header
//! extraction, a permission oracle, request/response DTOs, and mapping of
//! `CoreError` to HTTP status codes. No business logic lives here.

pub mod actor;
pub mod config;
pub mod dto;
pub mod error;
pub mod permission;
pub mod routes;
pub mod setup;
pub mod telemetry;

pub use config::Config;
pub use routes::{build_router, AppState};
pub use setup::{create_storage, ensure_database_directory, initialize_app};
pub use telemetry::init_telemetry;
