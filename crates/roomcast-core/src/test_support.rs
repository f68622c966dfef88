//! Fakes shared by the unit tests.

use crate::room::SharedHandle;
use async_trait::async_trait;
use roomcast_transport::{outbound_queue, MessageSource, Outbound, TransportError};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A queued handle plus the receiver a test reads from.
pub fn handle() -> (SharedHandle, mpsc::Receiver<Outbound>) {
    let (queued, rx) = outbound_queue(64);
    let shared: SharedHandle = Arc::new(queued);
    (shared, rx)
}

/// Drain every queued message as JSON, ignoring close requests.
pub fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(item) = rx.try_recv() {
        if let Outbound::Message(data) = item {
            out.push(serde_json::from_slice(&data).expect("outbound message is JSON"));
        }
    }
    out
}

/// Check whether a close request is queued, draining the receiver.
pub fn saw_close(rx: &mut mpsc::Receiver<Outbound>) -> bool {
    let mut closed = false;
    while let Ok(item) = rx.try_recv() {
        closed |= item == Outbound::Close;
    }
    closed
}

/// A source that replays a fixed script, then reports a clean close.
pub struct ScriptedSource {
    items: VecDeque<Result<Option<String>, TransportError>>,
}

impl ScriptedSource {
    pub fn new<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: messages.into_iter().map(|m| Ok(Some(m.into()))).collect(),
        }
    }

    pub fn then_fail(mut self, error: TransportError) -> Self {
        self.items.push_back(Err(error));
        self
    }
}

#[async_trait]
impl MessageSource for ScriptedSource {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        self.items.pop_front().unwrap_or(Ok(None))
    }
}

/// A source fed by a test through a channel. Dropping the sender closes it.
pub struct ChannelSource(pub mpsc::UnboundedReceiver<String>);

#[async_trait]
impl MessageSource for ChannelSource {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        Ok(self.0.recv().await)
    }
}

/// A source that never yields, for cancellation tests.
pub struct PendingSource;

#[async_trait]
impl MessageSource for PendingSource {
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        std::future::pending().await
    }
}
