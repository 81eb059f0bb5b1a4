//! pgshift Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging setup for the pgshift workspace.
//!
//! - **Errors**: [`ShiftError`] and the [`Result`] alias used by every member
//! - **Logging**: `tracing` subscriber configuration (console, rolling files, JSON)
//!
//! # Example
//!
//! ```no_run
//! use pgshift_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("pgshift started");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{Result, ShiftError};
