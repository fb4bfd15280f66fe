//! Registry of open stream handles.

use super::session::{Chunk, SessionInfo, StreamSession};
use super::HandleId;
use crate::client::{strip_url_prefix, FetchClient, FetchOptions};
use crate::error::{BridgeError, Result};
use crate::signal::{combine, CancelReason, CancellationSource};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Maps integer handles to open stream sessions and owns their lifecycle.
///
/// Handles start at 1 and only grow; a closed handle is never handed out
/// again. The map sits behind a mutex that is never held across an await, so
/// the table can be shared between tasks.
///
/// Dropping the table closes every session it still holds.
///
/// # Examples
///
/// ```ignore
/// use fetch_bridge::client::{ClientConfig, FetchClient};
/// use fetch_bridge::stream::StreamHandleTable;
///
/// let table = StreamHandleTable::new(FetchClient::new(ClientConfig::default())?);
/// let handle = table.open("jsfetch:https://example.com/video.mp4").await?;
/// loop {
///     let chunk = table.read(handle).await?;
///     if chunk.end_of_stream {
///         break;
///     }
///     consume(&chunk.bytes);
/// }
/// table.close(handle);
/// ```
pub struct StreamHandleTable {
    client: FetchClient,
    external: Option<CancellationSource>,
    sessions: Mutex<HashMap<HandleId, Arc<StreamSession>>>,
    next_id: AtomicI32,
}

impl StreamHandleTable {
    /// Create an empty table that fetches through `client`.
    pub fn new(client: FetchClient) -> Self {
        Self {
            client,
            external: None,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicI32::new(1),
        }
    }

    /// Combine every session opened from now on with `signal`.
    ///
    /// Tripping it cancels all in-flight opens and reads at once.
    pub fn with_external_signal(mut self, signal: CancellationSource) -> Self {
        self.external = Some(signal);
        self
    }

    /// The process-wide signal sessions are combined with, if any.
    pub fn external_signal(&self) -> Option<&CancellationSource> {
        self.external.as_ref()
    }

    /// The client used for opens.
    pub fn client(&self) -> &FetchClient {
        &self.client
    }

    /// Open `url` with a plain GET and return its handle.
    ///
    /// See [`open_with`](Self::open_with).
    pub async fn open(&self, url: &str) -> Result<HandleId> {
        self.open_with(url, FetchOptions::new()).await
    }

    /// Open `url` and return its handle once the response headers are in.
    ///
    /// The configured routing prefix is stripped before dispatch. The first
    /// chunk starts downloading in the background before this returns. A
    /// signal already present in `options` is combined with the session's own
    /// controller and the external signal.
    pub async fn open_with(&self, url: &str, mut options: FetchOptions) -> Result<HandleId> {
        let target = strip_url_prefix(url, &self.client.config().url_prefix);

        let controller = CancellationSource::new();
        let mut inputs = vec![controller.clone()];
        inputs.extend(self.external.iter().cloned());
        inputs.extend(options.signal.take());
        let signal = if inputs.len() == 1 {
            controller.clone()
        } else {
            combine(&inputs)
        };
        options.signal = Some(signal.clone());

        // Releases the external listener if the open fails or is dropped.
        let guard = OpenGuard(Some(controller.clone()));

        let response = match self.client.fetch(target, &options).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!("Failed to open {}: {}", url, error);
                return Err(error);
            }
        };
        let id = self.allocate_id()?;
        guard.disarm();

        tracing::debug!("Opened handle {} for {} (status {})", id, url, response.status);
        let session = StreamSession::start(id, url.to_string(), response, controller, signal);
        self.sessions.lock().insert(id, Arc::new(session));
        Ok(id)
    }

    /// Return the next chunk of `handle`.
    ///
    /// Waits for the read-ahead if it has not landed yet, then starts the
    /// next one before returning. Fails with the captured error if the
    /// read-ahead failed, or with [`BridgeError::InvalidHandle`] for unknown
    /// and closed handles.
    pub async fn read(&self, handle: HandleId) -> Result<Chunk> {
        let session = self.lookup(handle)?;
        session.read().await
    }

    /// Close `handle`, cancelling its reader and any read waiting on it.
    ///
    /// Unknown and already-closed handles are ignored.
    pub fn close(&self, handle: HandleId) {
        let removed = self.sessions.lock().remove(&handle);
        if let Some(session) = removed {
            session.close();
            tracing::debug!("Closed handle {}", handle);
        }
    }

    /// Close every open handle.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.sessions.lock().drain().collect();
        for (handle, session) in drained {
            session.close();
            tracing::debug!("Closed handle {}", handle);
        }
    }

    /// Snapshot of an open handle.
    pub fn info(&self, handle: HandleId) -> Option<SessionInfo> {
        self.sessions.lock().get(&handle).map(|session| session.info())
    }

    /// Open handles in ascending order.
    pub fn handles(&self) -> Vec<HandleId> {
        let mut handles: Vec<_> = self.sessions.lock().keys().copied().collect();
        handles.sort_unstable();
        handles
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no handle is open.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn lookup(&self, handle: HandleId) -> Result<Arc<StreamSession>> {
        self.sessions
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(BridgeError::InvalidHandle(handle))
    }

    fn allocate_id(&self) -> Result<HandleId> {
        self.next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| id.checked_add(1))
            .map_err(|_| BridgeError::HandlesExhausted)
    }
}

impl Drop for StreamHandleTable {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl std::fmt::Debug for StreamHandleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandleTable")
            .field("handles", &self.handles())
            .field("external", &self.external)
            .finish_non_exhaustive()
    }
}

/// Trips the pending session's controller unless disarmed.
struct OpenGuard(Option<CancellationSource>);

impl OpenGuard {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        if let Some(controller) = self.0.take() {
            controller.trip(CancelReason::Aborted);
        }
    }
}
