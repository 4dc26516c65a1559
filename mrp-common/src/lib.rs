//! # MRP Common Library
//!
//! Shared code for the MRP (Medical Research Platform) client crates:
//! - Common error type
//! - Configuration file loading (TOML + environment overrides)
//! - Clock abstraction for testable time

pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
pub use time::{Clock, ManualClock, SystemClock};
