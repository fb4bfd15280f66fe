//! Handle-based streaming over retrying fetches.
//!
//! [`StreamHandleTable`] turns an asynchronous, chunked HTTP body into the
//! pull-style `open` / `read` / `close` calls a blocking-style host expects:
//!
//! ```text
//! open(url) ──► fetch with retry ──► session ──► read-ahead task
//!                                       │              │
//! read(id)  ◄── drain slot, refill ◄────┴──────────────┘
//! close(id) ──► abort reader, trip controller, drop entry
//! ```
//!
//! Each session owns a cancellation controller combined with the table's
//! external signal; tripping either ends whatever the session is waiting on.
//!
//! Chunks of one handle come out in the order the network produced them.

mod session;
mod table;

pub use session::{Chunk, SessionInfo, SessionState};
pub use table::StreamHandleTable;

/// Integer handle for an open stream.
///
/// Valid handles are positive; negative values are reserved for failure
/// sentinels on the host side.
pub type HandleId = i32;
