//! # nightshift
//!
//! On-the-fly reduction driver for a robotic telescope's nightly imaging
//! stream.
//!
//! ## Usage
//!
//! ```bash
//! nightshift run [-d DIR] [--nocopy] [--proc-na] [--phot] [--local] [--one-pass]
//! ```
//!
//! ## Modules
//!
//! - `calibration` - Master-calibration gating by observed frame counts
//! - `watcher` - New-frame detection by directory listing
//! - `classify` - Header-to-category rules and per-category dispatch
//! - `reduce` - The external reduction package
//! - `fanout` - Visualization, photometry, copy and notification per product
//! - `session` - The nightly state machine tying it all together
//! - `config` - Configuration management
//! - `subprocess` - External command execution with a mockable runner
//! - `testing` - Mocks and fixtures for every collaborator
pub mod calibration;
pub mod classify;
pub mod clock;
pub mod compress;
pub mod config;
pub mod error;
pub mod fanout;
pub mod fits;
pub mod frame;
pub mod logging;
pub mod manifest;
pub mod marshal;
pub mod night;
pub mod notify;
pub mod photometry;
pub mod products;
pub mod reduce;
pub mod remote;
pub mod session;
pub mod solar;
pub mod subprocess;
pub mod visualize;
pub mod watcher;

pub mod testing;

pub use error::{Error, Result};
