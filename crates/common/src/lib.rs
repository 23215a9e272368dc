//! Common utilities for usbref tools
//!
//! This crate provides the pieces shared by the binaries built on `usbref`:
//! logging setup, the shared error type, and VID:PID device filters.

pub mod error;
pub mod filter;
pub mod logging;

pub use error::{Error, Result};
pub use filter::{DeviceFilter, IdPattern, matches_any};
pub use logging::setup_logging;
