//! Per-handle streaming state with one chunk of read-ahead.
//!
//! A session owns the body of one open response. While the caller holds the
//! current chunk, a spawned task is already pulling the next one off the
//! network into the session's read-ahead slot. [`StreamSession::read`] drains
//! the slot and immediately refills it, so exactly one read is outstanding at
//! any time.
//!
//! The task owns the body while it reads and hands it back together with the
//! chunk, so the body is never shared between the task and the session.

use crate::client::{ByteStream, FetchResponse};
use crate::error::{BridgeError, Result};
use crate::signal::{CancelReason, CancellationSource};
use crate::stream::HandleId;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinError, JoinHandle};

/// One piece of a response body.
///
/// The chunk after the last non-empty one is empty and has `end_of_stream`
/// set; data chunks never carry the flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Body bytes, empty only at end of stream
    pub bytes: Bytes,
    /// Set once the body is exhausted
    pub end_of_stream: bool,
}

impl Chunk {
    /// A chunk of body data.
    pub fn data(bytes: Bytes) -> Self {
        Self {
            bytes,
            end_of_stream: false,
        }
    }

    /// The empty end-of-stream marker.
    pub fn end() -> Self {
        Self {
            bytes: Bytes::new(),
            end_of_stream: true,
        }
    }

    /// Number of bytes in the chunk.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the chunk carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Where a session is in its lifecycle.
///
/// Sessions only become visible once the response headers are in, so the
/// handshake phase never shows up here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// A read-ahead is in flight
    Reading,
    /// The next chunk or failure is waiting to be read
    Buffered,
    /// The body is exhausted; reads return the end marker
    Ended,
    /// The body failed; reads return the failure
    Failed,
    /// The handle was closed
    Closed,
}

/// Snapshot of a session for diagnostics.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Handle id
    pub id: HandleId,
    /// URL as given to `open`, prefix included
    pub url: String,
    /// Response status
    pub status: u16,
    /// Declared body length
    pub content_length: Option<u64>,
    /// Lifecycle state
    pub state: SessionState,
    /// Most recent read failure
    pub last_error: Option<BridgeError>,
}

/// Result of one read-ahead: the body handed back plus what was read.
struct Filled {
    body: ByteStream,
    outcome: Result<Chunk>,
}

/// The read-ahead slot.
enum ReadAhead {
    /// Task filling the slot; finished means buffered.
    Pending(JoinHandle<Filled>),
    Ended,
    Failed(BridgeError),
}

pub(crate) struct StreamSession {
    id: HandleId,
    url: String,
    status: u16,
    content_length: Option<u64>,
    controller: CancellationSource,
    signal: CancellationSource,
    read_ahead: tokio::sync::Mutex<ReadAhead>,
    reader: Mutex<Option<AbortHandle>>,
    state: Mutex<SessionState>,
    last_error: Mutex<Option<BridgeError>>,
}

impl StreamSession {
    /// Take over `response` and start reading its first chunk.
    ///
    /// `controller` is tripped on close; `signal` is the effective signal
    /// every read observes, derived from the controller.
    pub(crate) fn start(
        id: HandleId,
        url: String,
        response: FetchResponse,
        controller: CancellationSource,
        signal: CancellationSource,
    ) -> Self {
        let content_length = response.content_length();
        let FetchResponse { status, body, .. } = response;

        let mut session = StreamSession {
            id,
            url,
            status,
            content_length,
            controller,
            signal,
            read_ahead: tokio::sync::Mutex::new(ReadAhead::Ended),
            reader: Mutex::new(None),
            state: Mutex::new(SessionState::Reading),
            last_error: Mutex::new(None),
        };
        let first = session.refill(body);
        *session.read_ahead.get_mut() = first;
        session
    }

    /// Drain the read-ahead slot and start refilling it.
    ///
    /// Waits if the read-ahead is still in flight. Concurrent reads on the
    /// same session are served one after another, in call order.
    pub(crate) async fn read(&self) -> Result<Chunk> {
        let mut slot = self.read_ahead.lock().await;

        let joined = match &mut *slot {
            ReadAhead::Pending(task) => task.await,
            ReadAhead::Ended => return Ok(Chunk::end()),
            ReadAhead::Failed(error) => return Err(error.clone()),
        };

        let Filled { body, outcome } = match joined {
            Ok(filled) => filled,
            Err(join_error) => {
                let error = self.join_failure(join_error);
                *slot = self.failed(error.clone());
                return Err(error);
            }
        };

        match outcome {
            Ok(chunk) if chunk.end_of_stream => {
                self.reader.lock().take();
                self.set_state(SessionState::Ended);
                *slot = ReadAhead::Ended;
                Ok(chunk)
            }
            Ok(chunk) => {
                *slot = self.refill(body);
                Ok(chunk)
            }
            Err(error) => {
                *slot = self.failed(error.clone());
                Err(error)
            }
        }
    }

    /// Cancel the reader and trip the controller.
    ///
    /// Safe to call in any state and more than once.
    pub(crate) fn close(&self) {
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        self.controller.trip(CancelReason::HandleClosed);
        *self.state.lock() = SessionState::Closed;
    }

    pub(crate) fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            url: self.url.clone(),
            status: self.status,
            content_length: self.content_length,
            state: self.state(),
            last_error: self.last_error.lock().clone(),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        let state = *self.state.lock();
        if state != SessionState::Reading {
            return state;
        }
        match self.reader.lock().as_ref() {
            Some(reader) if reader.is_finished() => SessionState::Buffered,
            _ => SessionState::Reading,
        }
    }

    fn refill(&self, body: ByteStream) -> ReadAhead {
        if let Some(reason) = self.signal.reason() {
            return self.failed(BridgeError::Cancelled(reason));
        }

        let task = tokio::spawn(read_next(body, self.signal.clone()));
        *self.reader.lock() = Some(task.abort_handle());
        self.set_state(SessionState::Reading);
        ReadAhead::Pending(task)
    }

    fn failed(&self, error: BridgeError) -> ReadAhead {
        if !error.is_cancellation() {
            tracing::warn!("Stream {} ({}) failed: {}", self.id, self.url, error);
        }
        self.reader.lock().take();
        *self.last_error.lock() = Some(error.clone());
        self.set_state(SessionState::Failed);
        ReadAhead::Failed(error)
    }

    fn join_failure(&self, error: JoinError) -> BridgeError {
        if error.is_cancelled() {
            let reason = self
                .signal
                .reason()
                .or_else(|| self.controller.reason())
                .unwrap_or(CancelReason::HandleClosed);
            BridgeError::Cancelled(reason)
        } else {
            BridgeError::ReadAhead(error.to_string())
        }
    }

    fn set_state(&self, next: SessionState) {
        let mut state = self.state.lock();
        if *state != SessionState::Closed {
            *state = next;
        }
    }
}

/// Pull the next non-empty chunk, or the end marker, unless `signal` trips first.
async fn read_next(mut body: ByteStream, signal: CancellationSource) -> Filled {
    let outcome = signal
        .run_until_cancelled(async {
            loop {
                match body.next().await {
                    Some(Ok(bytes)) if bytes.is_empty() => continue,
                    Some(Ok(bytes)) => return Ok(Chunk::data(bytes)),
                    Some(Err(error)) => return Err(error),
                    None => return Ok(Chunk::end()),
                }
            }
        })
        .await;
    Filled { body, outcome }
}
