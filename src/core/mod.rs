//! Shared primitives: errors, configuration, logging, catalog storage, locking.

pub mod config;
pub mod db;
pub mod error;
pub mod lock;
pub mod logging;
pub mod output;
pub mod schemas;
pub mod time;
