#![forbid(unsafe_code)]
//! nexus-core library.
//!
//! # Conventions
//!
//! - **Errors**: Use `anyhow::Result` for storage and I/O; request validation
//!   and configuration failures use [`error::PipelineError`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod text;
pub mod vector;
