//! # Core Runtime Module
//!
//! Provides the ambient runtime infrastructure shared by the catalog and
//! playlist stores:
//! - Configuration management (builder + environment loading)
//! - Logging and tracing infrastructure
//!
//! ## Overview
//!
//! This crate establishes the configuration and logging conventions used
//! throughout the workspace. It carries no storage logic of its own.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
