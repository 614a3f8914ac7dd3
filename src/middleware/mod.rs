//! Middleware module for the termgate HTTP server
//!
//! Provides token authentication (Bearer / API key / cookie / query).

pub mod auth;
