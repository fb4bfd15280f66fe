//! One-shot cancellation sources and their combination.
//!
//! A [`CancellationSource`] is a flag that starts un-tripped and can be tripped
//! exactly once, optionally with a [`CancelReason`]. Observers either register a
//! one-shot listener with [`CancellationSource::on_trip`] or await
//! [`CancellationSource::cancelled`].
//!
//! [`combine`] derives a source that trips as soon as any of its inputs does.
//!
//! # Examples
//!
//! ```
//! use fetch_bridge::signal::{combine, CancelReason, CancellationSource};
//!
//! let local = CancellationSource::new();
//! let global = CancellationSource::new();
//! let either = combine(&[local.clone(), global.clone()]);
//!
//! assert!(!either.is_tripped());
//! global.trip(CancelReason::message("shutting down"));
//! assert_eq!(either.reason(), Some(CancelReason::message("shutting down")));
//! ```

mod combine;

pub use combine::combine;

use crate::error::{BridgeError, Result};
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::sync::Notify;

/// Why a cancellation source tripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// Tripped without a specific reason
    Aborted,
    /// The owning stream handle was closed
    HandleClosed,
    /// Free-form reason supplied by the caller
    Message(Arc<str>),
}

impl CancelReason {
    /// Free-form reason.
    pub fn message(text: impl Into<Arc<str>>) -> Self {
        CancelReason::Message(text.into())
    }
}

impl Default for CancelReason {
    fn default() -> Self {
        CancelReason::Aborted
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Aborted => f.write_str("the operation was aborted"),
            CancelReason::HandleClosed => f.write_str("the stream handle was closed"),
            CancelReason::Message(text) => f.write_str(text),
        }
    }
}

/// Identifies a listener registered with [`CancellationSource::on_trip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnOnce(&CancelReason) + Send + 'static>;

#[derive(Default)]
struct State {
    reason: Option<CancelReason>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
}

/// A one-shot, observable cancellation flag.
///
/// Clones share the same flag. Once tripped the source stays tripped and keeps
/// the reason of the first trip.
///
/// Listeners run on the thread that trips the source, after the internal lock
/// has been released, so a listener may freely call back into any source.
#[derive(Clone)]
pub struct CancellationSource {
    inner: Arc<Inner>,
}

impl CancellationSource {
    /// Create an un-tripped source.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
            }),
        }
    }

    /// Create a source that is already tripped with `reason`.
    pub fn tripped(reason: CancelReason) -> Self {
        let source = Self::new();
        source.trip(reason);
        source
    }

    /// Trip the source.
    ///
    /// Returns `true` if this call tripped it, `false` if it was already
    /// tripped, in which case the original reason is kept and no listener runs.
    pub fn trip(&self, reason: CancelReason) -> bool {
        let listeners = {
            let mut state = self.inner.state.lock();
            if state.reason.is_some() {
                return false;
            }
            state.reason = Some(reason.clone());
            std::mem::take(&mut state.listeners)
        };

        for (_, listener) in listeners {
            listener(&reason);
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// Whether the source has tripped.
    pub fn is_tripped(&self) -> bool {
        self.inner.state.lock().reason.is_some()
    }

    /// The reason of the trip, if tripped.
    pub fn reason(&self) -> Option<CancelReason> {
        self.inner.state.lock().reason.clone()
    }

    /// Register a listener that runs once, when the source trips.
    ///
    /// The listener is dropped after it runs. Returns `None` without keeping
    /// the listener if the source has already tripped.
    pub fn on_trip<F>(&self, listener: F) -> Option<ListenerId>
    where
        F: FnOnce(&CancelReason) + Send + 'static,
    {
        let mut state = self.inner.state.lock();
        if state.reason.is_some() {
            return None;
        }
        let id = ListenerId(state.next_listener);
        state.next_listener += 1;
        state.listeners.push((id, Box::new(listener)));
        Some(id)
    }

    /// Deregister a listener that has not run yet.
    ///
    /// Returns `false` if the listener already ran or was never registered here.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut state = self.inner.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(listener_id, _)| *listener_id != id);
        state.listeners.len() != before
    }

    /// Number of listeners still waiting for a trip.
    pub fn listener_count(&self) -> usize {
        self.inner.state.lock().listeners.len()
    }

    /// Wait until the source trips and return the reason.
    ///
    /// Resolves immediately if the source has already tripped.
    pub async fn cancelled(&self) -> CancelReason {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(reason) = self.reason() {
                return reason;
            }
            notified.await;
        }
    }

    /// Drive `future` unless the source trips first.
    ///
    /// A trip, including one that happened before the call, wins over a
    /// result that is ready at the same poll, and drops `future`.
    pub async fn run_until_cancelled<F, T>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            biased;
            reason = self.cancelled() => Err(BridgeError::Cancelled(reason)),
            result = future => result,
        }
    }

    pub(crate) fn downgrade(&self) -> WeakCancellationSource {
        WeakCancellationSource {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CancellationSource")
            .field("reason", &state.reason)
            .field("listeners", &state.listeners.len())
            .finish()
    }
}

/// Non-owning handle to a source, held by listeners registered on other sources.
#[derive(Clone)]
pub(crate) struct WeakCancellationSource {
    inner: Weak<Inner>,
}

impl WeakCancellationSource {
    pub(crate) fn upgrade(&self) -> Option<CancellationSource> {
        self.inner.upgrade().map(|inner| CancellationSource { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_trip_is_one_shot() {
        let source = CancellationSource::new();
        assert!(source.trip(CancelReason::message("first")));
        assert!(!source.trip(CancelReason::message("second")));
        assert_eq!(source.reason(), Some(CancelReason::message("first")));
    }

    #[test]
    fn test_listener_runs_once_and_unregisters() {
        let source = CancellationSource::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        source.on_trip(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(source.listener_count(), 1);

        source.trip(CancelReason::Aborted);
        source.trip(CancelReason::Aborted);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_on_trip_after_trip_is_rejected() {
        let source = CancellationSource::tripped(CancelReason::Aborted);
        assert!(source.on_trip(|_| {}).is_none());
        assert_eq!(source.listener_count(), 0);
    }

    #[test]
    fn test_remove_listener() {
        let source = CancellationSource::new();
        let id = source.on_trip(|_| panic!("removed listener ran")).unwrap();
        assert!(source.remove_listener(id));
        assert!(!source.remove_listener(id));
        source.trip(CancelReason::Aborted);
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let source = CancellationSource::new();
        let waiter = {
            let source = source.clone();
            tokio::spawn(async move { source.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        source.trip(CancelReason::HandleClosed);

        let reason = waiter.await.unwrap();
        assert_eq!(reason, CancelReason::HandleClosed);
    }

    #[tokio::test]
    async fn test_run_until_cancelled_aborts_pending_work() {
        let source = CancellationSource::new();
        let trigger = source.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trip(CancelReason::HandleClosed);
        });

        let result: Result<()> = source
            .run_until_cancelled(std::future::pending())
            .await;
        assert_eq!(result, Err(BridgeError::Cancelled(CancelReason::HandleClosed)));
    }

    #[tokio::test]
    async fn test_run_until_cancelled_passes_result_through() {
        let source = CancellationSource::new();
        let result = source.run_until_cancelled(async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_when_already_tripped() {
        let source = CancellationSource::tripped(CancelReason::message("done"));
        assert_eq!(source.cancelled().await, CancelReason::message("done"));
    }
}
