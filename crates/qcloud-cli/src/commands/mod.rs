//! CLI command implementations.

pub mod auth;
pub mod cancel;
pub mod common;
pub mod devices;
pub mod projects;
pub mod result;
pub mod status;
pub mod submit;
pub mod wait;
