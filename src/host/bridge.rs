//! Blocking façade over the handle table.

use super::{decode_url, ErrorSlot, OPEN_FAILED};
use crate::client::{ClientConfig, FetchClient};
use crate::error::{BridgeError, Result};
use crate::signal::{CancelReason, CancellationSource};
use crate::stream::{Chunk, HandleId, StreamHandleTable};
use tokio::runtime::{Builder, Runtime};

/// Presents `open` / `read` / `close` as blocking calls.
///
/// Network work runs on a runtime owned by the bridge. A calling thread is
/// suspended in `open` and `read` until the outcome is known; read-ahead keeps
/// running on the runtime between calls, so download overlaps whatever the
/// host does with the previous chunk.
///
/// Every session is combined with one bridge-wide cancellation source, tripped
/// by [`abort_all`](Self::abort_all).
///
/// The calls must not be made from inside an async context.
pub struct BlockingBridge {
    table: StreamHandleTable,
    external: CancellationSource,
    errors: ErrorSlot,
    runtime: Runtime,
}

impl BlockingBridge {
    /// Create a bridge that fetches over HTTP with `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_client(FetchClient::new(config)?)
    }

    /// Create a bridge over an existing client.
    pub fn with_client(client: FetchClient) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("fetch-bridge")
            .enable_all()
            .build()
            .map_err(|e| BridgeError::Runtime(e.to_string()))?;

        let external = CancellationSource::new();
        let table = StreamHandleTable::new(client).with_external_signal(external.clone());

        Ok(Self {
            table,
            external,
            errors: ErrorSlot::new(),
            runtime,
        })
    }

    /// Open the NUL-terminated URL in `raw_url`.
    ///
    /// Returns the new handle, or [`OPEN_FAILED`] after storing the failure in
    /// the [error slot](Self::error_slot).
    pub fn open(&self, raw_url: &[u8]) -> i32 {
        let url = decode_url(raw_url);
        match self.runtime.block_on(self.table.open(&url)) {
            Ok(handle) => handle,
            Err(error) => {
                tracing::error!("open({}) failed: {}", url, error);
                self.errors.set(error);
                OPEN_FAILED
            }
        }
    }

    /// Block until the next chunk of `handle` is available.
    pub fn read(&self, handle: HandleId) -> Result<Chunk> {
        self.runtime.block_on(self.table.read(handle))
    }

    /// Close `handle`. Never fails; unknown handles are ignored.
    pub fn close(&self, handle: HandleId) {
        self.table.close(handle);
    }

    /// Cancel every open and in-flight transfer.
    ///
    /// The source is one-shot: once tripped, later opens fail as cancelled.
    pub fn abort_all(&self, reason: CancelReason) {
        if self.external.trip(reason) {
            tracing::info!("Aborting all transfers");
        }
    }

    /// Where failed opens leave their error.
    pub fn error_slot(&self) -> &ErrorSlot {
        &self.errors
    }

    /// The underlying handle table.
    pub fn table(&self) -> &StreamHandleTable {
        &self.table
    }
}

impl std::fmt::Debug for BlockingBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingBridge")
            .field("table", &self.table)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client_over, ScriptedTransport, Step};
    use bytes::Bytes;
    use std::time::Duration;

    fn bridge_over(steps: Vec<Step>) -> (BlockingBridge, std::sync::Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::new(steps);
        let bridge = BlockingBridge::with_client(client_over(&transport)).unwrap();
        (bridge, transport)
    }

    #[test]
    fn test_open_read_close() {
        let (bridge, transport) = bridge_over(vec![Step::body(&[b"abc", b"def"])]);

        let handle = bridge.open(b"jsfetch:https://a/b\0");
        assert!(handle > 0);
        assert_eq!(transport.urls(), vec!["https://a/b".to_string()]);

        assert_eq!(bridge.read(handle).unwrap().bytes, Bytes::from_static(b"abc"));
        assert_eq!(bridge.read(handle).unwrap().bytes, Bytes::from_static(b"def"));
        assert!(bridge.read(handle).unwrap().end_of_stream);

        bridge.close(handle);
        assert_eq!(bridge.read(handle), Err(BridgeError::InvalidHandle(handle)));
        assert!(!bridge.error_slot().is_set());
    }

    #[test]
    fn test_failed_open_fills_error_slot() {
        let (bridge, _transport) = bridge_over(vec![Step::Status(403)]);

        assert_eq!(bridge.open(b"https://a/forbidden"), OPEN_FAILED);
        let error = bridge.error_slot().take().unwrap();
        assert_eq!(error.status(), Some(403));
    }

    #[test]
    fn test_abort_all_cancels_blocked_read() {
        let (bridge, _transport) = bridge_over(vec![Step::body_then_hang(&[])]);
        let handle = bridge.open(b"https://a/live");

        std::thread::scope(|scope| {
            let reader = scope.spawn(|| bridge.read(handle));
            std::thread::sleep(Duration::from_millis(50));
            bridge.abort_all(CancelReason::message("stop"));

            let result = reader.join().unwrap();
            assert_eq!(
                result,
                Err(BridgeError::Cancelled(CancelReason::message("stop")))
            );
        });

        assert_eq!(bridge.open(b"https://a/again"), OPEN_FAILED);
        assert!(bridge.error_slot().take().unwrap().is_cancellation());
    }
}
