//! Message bridge between the panel and the page
//!
//! Two contexts never share state directly; they exchange JSON messages
//! tagged with an `action`. An [`Endpoint`] owns the listeners of one
//! context and runs them on a background task; [`BridgeClient`] handles are
//! how the other context talks to it.
//!
//! Every request carries a oneshot reply slot, so it is answered at most
//! once. The first listener that does not return [`Dispatch::Ignored`]
//! consumes the message. Long-running work returns [`Dispatch::Deferred`]
//! and is answered from its own task, which keeps the endpoint free to
//! serve other messages in the meantime.

pub mod content;
pub mod messages;
pub mod writing;

pub use content::{ContentListener, EditorListener, insert_text};
pub use messages::{
    ContentRequest, EditorRequest, ErrorResponse, InsertResponse, PanelNotice, RevertResponse,
    TranslatePageResponse,
};
pub use writing::WritingListener;

use crate::error::{EngineError, EngineResult};
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Capacity of an endpoint's inbox
const INBOX_CAPACITY: usize = 32;

/// What a listener does with a message
pub enum Dispatch {
    /// Not mine; offer it to the next listener
    Ignored,
    /// Answer right away
    Reply(Value),
    /// Answer later; the future runs on its own task
    Deferred(BoxFuture<'static, Value>),
    /// Handled, but there is nothing to answer
    Silent,
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatch::Ignored => write!(f, "Ignored"),
            Dispatch::Reply(value) => f.debug_tuple("Reply").field(value).finish(),
            Dispatch::Deferred(_) => write!(f, "Deferred"),
            Dispatch::Silent => write!(f, "Silent"),
        }
    }
}

pub trait Listener: Send + Sync {
    fn handle(&self, message: &Value) -> Dispatch;
}

/// The `action` tag of a message, if it has one
pub fn action_of(message: &Value) -> Option<&str> {
    message.get("action").and_then(Value::as_str)
}

/// Decode `message` if its action is one of `actions`
///
/// `None` means the message is not for this listener. A known action whose
/// payload does not decode yields `InvalidRequest`.
pub fn decode_known<R: DeserializeOwned>(
    message: &Value,
    actions: &[&str],
) -> Option<EngineResult<R>> {
    let action = action_of(message)?;
    if !actions.contains(&action) {
        return None;
    }
    Some(serde_json::from_value(message.clone()).map_err(|e| {
        EngineError::InvalidRequest(format!("Malformed '{}' request: {}", action, e))
    }))
}

/// `{error}` reply for a failed request
pub fn error_reply(error: &EngineError) -> Value {
    serde_json::to_value(ErrorResponse {
        error: error.to_string(),
    })
    .unwrap_or(Value::Null)
}

/// Serialize a successful outcome, or turn the error into an `{error}` reply
pub fn reply_with<T: Serialize>(outcome: EngineResult<T>) -> Value {
    match outcome.and_then(|value| {
        serde_json::to_value(value).map_err(|e| EngineError::ChannelError(e.to_string()))
    }) {
        Ok(value) => value,
        Err(e) => error_reply(&e),
    }
}

#[derive(Debug)]
struct Envelope {
    message: Value,
    reply: Option<oneshot::Sender<Value>>,
}

#[derive(Default)]
pub struct Endpoint {
    listeners: Vec<Arc<dyn Listener>>,
}

impl Endpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Start serving messages; the task ends once every client is dropped
    pub fn spawn(self) -> BridgeClient {
        let (tx, mut rx) = mpsc::channel::<Envelope>(INBOX_CAPACITY);
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                self.dispatch(envelope);
            }
            debug!("bridge endpoint closed");
        });
        BridgeClient { tx }
    }

    fn dispatch(&self, envelope: Envelope) {
        let Envelope { message, reply } = envelope;
        for listener in &self.listeners {
            match listener.handle(&message) {
                Dispatch::Ignored => continue,
                Dispatch::Reply(value) => {
                    answer(reply, value);
                    return;
                }
                Dispatch::Deferred(work) => {
                    tokio::spawn(async move {
                        let value = work.await;
                        answer(reply, value);
                    });
                    return;
                }
                Dispatch::Silent => return,
            }
        }
        debug!(action = action_of(&message), "no listener for message");
    }
}

fn answer(reply: Option<oneshot::Sender<Value>>, value: Value) {
    if let Some(reply) = reply {
        if reply.send(value).is_err() {
            warn!("requester went away before the reply was sent");
        }
    }
}

/// Sending half of the bridge
#[derive(Clone, Debug)]
pub struct BridgeClient {
    tx: mpsc::Sender<Envelope>,
}

impl BridgeClient {
    /// Send a raw message and wait for its reply
    ///
    /// Fails with `ChannelError` when the endpoint is gone or nobody answered.
    pub async fn request(&self, message: Value) -> EngineResult<Value> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                message,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| EngineError::ChannelError("bridge endpoint is closed".to_string()))?;
        reply_rx
            .await
            .map_err(|_| EngineError::ChannelError("no listener answered".to_string()))
    }

    /// Send a typed request and decode the reply
    ///
    /// An `{error}` reply becomes [`EngineError::Remote`].
    pub async fn call<R: Serialize, T: DeserializeOwned>(&self, request: &R) -> EngineResult<T> {
        let message = serde_json::to_value(request)
            .map_err(|e| EngineError::InvalidRequest(e.to_string()))?;
        let reply = self.request(message).await?;
        if let Some(error) = reply.get("error").and_then(Value::as_str) {
            return Err(EngineError::Remote(error.to_string()));
        }
        serde_json::from_value(reply)
            .map_err(|e| EngineError::ChannelError(format!("Unexpected response: {}", e)))
    }

    /// Fire and forget
    pub async fn notify<R: Serialize>(&self, request: &R) -> EngineResult<()> {
        let message = serde_json::to_value(request)
            .map_err(|e| EngineError::InvalidRequest(e.to_string()))?;
        self.tx
            .send(Envelope {
                message,
                reply: None,
            })
            .await
            .map_err(|_| EngineError::ChannelError("bridge endpoint is closed".to_string()))
    }
}
