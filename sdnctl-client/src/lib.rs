//! sdnctl Client Library
//!
//! Command-line client and library wrapper for talking to an sdnctl
//! controller.

pub mod cli;
pub mod client;

pub use cli::run_cli;
pub use client::{ClientConfig, SdnClient};
