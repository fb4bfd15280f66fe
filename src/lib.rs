#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Fetch Bridge: blocking-style reads over asynchronous HTTP
//!
//! This crate lets a host that reads data through blocking `open` / `read` /
//! `close` calls on integer handles consume HTTP response bodies that arrive
//! asynchronously, in chunks, over a connection that can fail or be aborted.
//!
//! ## Overview
//!
//! The bridge is built from four pieces:
//!
//! 1. **Retrying fetch** - one logical request with exponential backoff on 429, 5xx and transport errors
//! 2. **Signal combination** - a cancellation source that trips when any of its inputs trips
//! 3. **Handle table** - integer handles mapped to open stream sessions
//! 4. **Stream sessions** - one chunk of read-ahead per handle, refilled on every read
//!
//! ## Key Features
//!
//! - **Read-ahead**: the next chunk downloads while the host processes the current one
//! - **Prompt cancellation**: closing a handle, or tripping the shared source, ends pending
//!   requests, backoff sleeps and reads
//! - **No leaks**: every open handle has exactly one live body reader, released on close
//! - **Idempotent close**: closing unknown or closed handles is always safe
//! - **Routing prefix**: a leading `jsfetch:` marker is stripped before dispatch
//!
//! ## Async Usage
//!
//! ```ignore
//! use fetch_bridge::{ClientConfig, FetchClient, StreamHandleTable};
//!
//! #[tokio::main]
//! async fn main() -> fetch_bridge::Result<()> {
//!     let table = StreamHandleTable::new(FetchClient::new(ClientConfig::default())?);
//!
//!     let handle = table.open("jsfetch:https://example.com/video.webm").await?;
//!     loop {
//!         let chunk = table.read(handle).await?;
//!         if chunk.end_of_stream {
//!             break;
//!         }
//!         println!("{} bytes", chunk.len());
//!     }
//!     table.close(handle);
//!     Ok(())
//! }
//! ```
//!
//! ## Blocking Usage
//!
//! ```ignore
//! use fetch_bridge::host::{BlockingBridge, OPEN_FAILED};
//! use fetch_bridge::ClientConfig;
//!
//! let bridge = BlockingBridge::new(ClientConfig::default())?;
//! let handle = bridge.open(b"jsfetch:https://example.com/video.webm\0");
//! if handle == OPEN_FAILED {
//!     eprintln!("open failed: {:?}", bridge.error_slot().take());
//! }
//! ```
//!
//! ## Module Structure
//!
//! - **[error]** - Error types and result handling
//! - **[signal]** - Cancellation sources and their combination
//! - **[client]** - Retrying HTTP fetch and transports
//! - **[stream]** - Handle table and read-ahead sessions
//! - **[host]** - Blocking calling conventions and the error slot

pub mod client;
pub mod error;
pub mod host;
pub mod signal;
pub mod stream;

pub use client::{ClientConfig, FetchClient, FetchOptions};
pub use error::{BridgeError, Result};
pub use signal::{combine, CancelReason, CancellationSource};
pub use stream::{Chunk, HandleId, StreamHandleTable};

#[cfg(test)]
mod testing;
