//! Client library for the AFLOW materials database AFLUX query API.
//!
//! The crate builds validated AFLUX query URLs, issues blocking HTTP
//! requests with a configurable retry policy, and parses the JSON/text
//! responses. It also fetches auxiliary per-entry resources (CONTCAR
//! structure files, arbitrary property strings) from the `aurl` locators
//! the API returns.
//!
//! # Modules
//!
//! - [`client`] - The request client and its operations
//! - [`constants`] - Fixed server, syntax and retry configuration
//! - [`entry`] - Per-entry resource helpers and type aliases
//! - [`error`] - Error types
//! - [`retry`] - Retry policy with backoff and Retry-After support
//!
//! # Example
//!
//! ```no_run
//! use aflux::AfluxClient;
//!
//! # fn main() -> Result<(), aflux::AfluxError> {
//! let client = AfluxClient::new(Some(3))?;
//! let response = client.request("nspecies(2),Egap(1.0*,5.0) ", None, Some(64), false)?;
//! println!("{response}");
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod constants;
pub mod entry;
pub mod error;
mod query;
pub mod retry;

// Re-export commonly used types
pub use client::AfluxClient;
pub use entry::{AfluxResponse, Entry};
pub use error::AfluxError;
pub use retry::{RetryDecision, RetryPolicy, parse_retry_after};
