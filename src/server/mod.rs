//! Server module for termgate
//!
//! Contains the main server initialization and runtime logic.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures
//! - `loader`: Configuration loading from files and environment
//! - `validation`: Security checks on the loaded configuration
//! - `init`: Component wiring, router and run loop

pub mod config;
mod init;
mod loader;
mod validation;

// Re-export public API
pub use init::{build_components, build_components_with, build_router, run, AppComponents};
