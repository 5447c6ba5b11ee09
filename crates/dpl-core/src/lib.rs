//! Core domain + application logic for the deployment pipeline glue tools.
//!
//! This crate is intentionally framework-agnostic. GitHub CLI / SSH / Telegram
//! live behind ports (traits) implemented in adapter crates, so both flows
//! (`secrets` and `uploader`) can be driven by in-memory fakes.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod listener;
pub mod logging;
pub mod messaging;
pub mod process;
pub mod remote;
pub mod repo;
pub mod secrets;
pub mod uploader;

pub use errors::{Error, Result};
