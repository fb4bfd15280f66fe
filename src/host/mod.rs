//! Calling conventions for a blocking-style host.
//!
//! The host sees three calls with fixed signatures:
//!
//! | Call | Returns |
//! |------|---------|
//! | `open(raw_url)` | handle, or [`OPEN_FAILED`] with the failure left in the [`ErrorSlot`] |
//! | `read(handle)` | next [`Chunk`](crate::stream::Chunk), or the failure |
//! | `close(handle)` | nothing, never fails |
//!
//! [`BlockingBridge`] provides them on top of a
//! [`StreamHandleTable`](crate::stream::StreamHandleTable), suspending the
//! calling thread while the network work runs on its own runtime.

mod bridge;
mod slot;

pub use bridge::BlockingBridge;
pub use slot::ErrorSlot;

/// Returned by `open` instead of a handle when the open failed.
///
/// The value follows the negated `ECANCELED` convention of the host's errno table.
pub const OPEN_FAILED: i32 = -11;

/// Decode a caller-supplied, NUL-terminated byte string into a URL.
///
/// Bytes after the first NUL are ignored and invalid UTF-8 is replaced.
///
/// ```
/// use fetch_bridge::host::decode_url;
///
/// assert_eq!(decode_url(b"jsfetch:https://a/b\0garbage"), "jsfetch:https://a/b");
/// assert_eq!(decode_url(b"https://a/b"), "https://a/b");
/// ```
pub fn decode_url(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
