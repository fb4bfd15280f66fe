//! Utility functions for the fetch client.
//!
//! - Status code classification for the retry policy
//! - The exponential backoff schedule
//! - URL prefix handling

use std::time::Duration;

/// Check if status code indicates a transient server condition
///
/// Only 429 (rate limited) and 5xx qualify.
pub fn is_retryable_status(status: u16) -> bool {
    status == 429 || status >= 500
}

/// Check if status code is a 2xx success
pub fn is_success_status(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Remove the literal routing marker from the front of `url`.
///
/// URLs without the marker are returned unchanged.
///
/// ```
/// use fetch_bridge::client::strip_url_prefix;
///
/// assert_eq!(strip_url_prefix("jsfetch:https://a/b", "jsfetch:"), "https://a/b");
/// assert_eq!(strip_url_prefix("https://a/b", "jsfetch:"), "https://a/b");
/// ```
pub fn strip_url_prefix<'a>(url: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return url;
    }
    url.strip_prefix(prefix).unwrap_or(url)
}

/// Exponential backoff schedule.
///
/// Yields `initial`, `initial * multiplier`, `initial * multiplier^2`, ...
/// saturating at `Duration::MAX`.
///
/// ```
/// use fetch_bridge::client::Backoff;
/// use std::time::Duration;
///
/// let delays: Vec<_> = Backoff::new(Duration::from_millis(100), 2).take(3).collect();
/// assert_eq!(delays, vec![
///     Duration::from_millis(100),
///     Duration::from_millis(200),
///     Duration::from_millis(400),
/// ]);
/// ```
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    multiplier: u32,
}

impl Backoff {
    /// Start a schedule at `initial`.
    pub fn new(initial: Duration, multiplier: u32) -> Self {
        Self {
            next: initial,
            multiplier,
        }
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = current.saturating_mul(self.multiplier);
        Some(current)
    }
}
