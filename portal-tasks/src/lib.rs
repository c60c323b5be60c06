//! portal-tasks library crate.
//!
//! Background task supervision, calendar scheduling and notification delivery.

pub mod config;
pub mod error;
pub mod logging;
pub mod notification;
pub mod scheduler;
pub mod tasks;

pub use error::{Error, Result};
