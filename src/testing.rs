//! In-memory transport for unit tests.

use crate::client::{ClientConfig, FetchClient, FetchRequest, FetchResponse, Transport};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use http::HeaderMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::Instant;

/// What the transport does for one request.
pub(crate) enum Step {
    /// Answer with a status and an empty body.
    Status(u16),
    /// Answer 200 and stream these body items.
    Body {
        items: Vec<Result<Bytes>>,
        /// Leave the body open after the items instead of ending it.
        hang: bool,
    },
    /// Fail below HTTP.
    Fail(BridgeError),
    /// Never answer.
    Hang,
}

impl Step {
    pub(crate) fn body(chunks: &[&'static [u8]]) -> Self {
        Step::Body {
            items: chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect(),
            hang: false,
        }
    }

    pub(crate) fn body_then_hang(chunks: &[&'static [u8]]) -> Self {
        Step::Body {
            items: chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect(),
            hang: true,
        }
    }

    pub(crate) fn body_then_error(chunks: &[&'static [u8]], error: BridgeError) -> Self {
        let mut items: Vec<Result<Bytes>> =
            chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect();
        items.push(Err(error));
        Step::Body { items, hang: false }
    }
}

/// Drops decrement the live body counter.
struct BodyGuard(Arc<AtomicUsize>);

impl Drop for BodyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub(crate) struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<(String, Instant)>>,
    live_bodies: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub(crate) fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            ..Default::default()
        })
    }

    /// URLs requested so far, in order.
    pub(crate) fn urls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Time between consecutive requests.
    pub(crate) fn gaps(&self) -> Vec<std::time::Duration> {
        self.calls
            .lock()
            .windows(2)
            .map(|pair| pair[1].1 - pair[0].1)
            .collect()
    }

    /// Response bodies handed out and not yet dropped.
    pub(crate) fn live_bodies(&self) -> usize {
        self.live_bodies.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: FetchRequest) -> Result<FetchResponse> {
        self.calls
            .lock()
            .push((request.url.to_string(), Instant::now()));
        let step = self.steps.lock().pop_front();

        match step {
            Some(Step::Status(status)) => Ok(FetchResponse {
                status,
                status_text: http::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|code| code.canonical_reason())
                    .unwrap_or_default()
                    .to_string(),
                headers: HeaderMap::new(),
                body: stream::empty().boxed(),
            }),
            Some(Step::Body { items, hang }) => {
                self.live_bodies.fetch_add(1, Ordering::SeqCst);
                let guard = BodyGuard(self.live_bodies.clone());
                let items = stream::iter(items);
                let body = if hang {
                    items.chain(stream::pending()).boxed()
                } else {
                    items.boxed()
                };
                let body = body
                    .map(move |item| {
                        let _held = &guard;
                        item
                    })
                    .boxed();
                Ok(FetchResponse {
                    status: 200,
                    status_text: "OK".into(),
                    headers: HeaderMap::new(),
                    body,
                })
            }
            Some(Step::Fail(error)) => Err(error),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(BridgeError::Transport("no scripted response left".into())),
        }
    }
}

/// A fetch client over `transport` with default retry settings.
pub(crate) fn client_over(transport: &Arc<ScriptedTransport>) -> FetchClient {
    FetchClient::with_transport(ClientConfig::default(), transport.clone())
}
