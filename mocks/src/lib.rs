//! Mock implementations and test utilities for the Task Transition Core.
//!
//! This crate provides:
//! - An in-memory [`Storage`]/[`Transaction`] mock with error injection and
//!   call tracking
//! - Builders and fixtures for realistic test data
//! - Random data generators and proptest strategies
//! - Custom assertion helpers
//! - A reusable `Storage` contract test suite

pub mod assertions;
pub mod builders;
pub mod contracts;
pub mod fixtures;
pub mod generators;
pub mod storage;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
pub use generators::*;
pub use storage::{MockStorage, MockTransaction};
