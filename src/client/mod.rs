//! Resilient HTTP fetching.
//!
//! This module provides the network side of the bridge:
//!
//! - **Send one request** through a pluggable [`Transport`]
//! - **Retry transient failures** (429, 5xx, transport errors) with exponential backoff
//! - **Observe cancellation** during the request and during every backoff sleep
//! - **Stream the response body** chunk by chunk
//!
//! # Module Organization
//!
//! ```text
//! client/
//! ├── config    - Client configuration
//! ├── fetch     - FetchClient and its retry loop
//! ├── transport - Transport trait and the reqwest implementation
//! └── utils     - Status classification, backoff schedule, URL prefix
//! ```
//!
//! # Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FetchClient`] | Retrying, cancellable fetch |
//! | [`FetchOptions`] | Method, headers and signal for one fetch |
//! | [`Transport`] | One network attempt |
//! | [`HttpTransport`] | reqwest-backed transport |
//! | [`ClientConfig`] | Client configuration options |
//!
//! # Examples
//!
//! ## Creating a Client
//!
//! ```
//! use fetch_bridge::client::{ClientConfig, FetchClient};
//!
//! let config = ClientConfig {
//!     max_retries: 5,
//!     retry_delay_ms: 250,
//!     ..Default::default()
//! };
//! let client = FetchClient::new(config).unwrap();
//! assert_eq!(client.config().max_retries, 5);
//! ```
//!
//! ## Utility Functions
//!
//! ```
//! use fetch_bridge::client::{is_retryable_status, Backoff};
//! use std::time::Duration;
//!
//! assert!(is_retryable_status(503));
//! assert!(is_retryable_status(429));
//! assert!(!is_retryable_status(404));
//!
//! let mut backoff = Backoff::new(Duration::from_millis(1000), 2);
//! assert_eq!(backoff.nth(2), Some(Duration::from_millis(4000)));
//! ```

mod config;
mod fetch;
mod transport;
mod utils;

pub use config::ClientConfig;
pub use fetch::{FetchClient, FetchOptions};
pub use transport::{ByteStream, FetchRequest, FetchResponse, HttpTransport, Transport};
pub use utils::*;
