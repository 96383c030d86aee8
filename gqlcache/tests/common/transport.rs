use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gqlcache::{GraphQLRequest, Transport, TransportError, TransportResponse};
use http::StatusCode;
use serde_json::Value;

type Reply = Result<TransportResponse, TransportError>;

/// Transport answering from a script, counting every call.
///
/// Scripted replies are consumed in order; once exhausted every call gets
/// the fallback.
#[derive(Clone)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

struct Inner {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Reply>>,
    fallback: TransportResponse,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn data(data: Value) -> Self {
        Self::status(StatusCode::OK, serde_json::json!({ "data": data }).to_string())
    }

    pub fn status(status: StatusCode, body: impl Into<String>) -> Self {
        Self::with_fallback(TransportResponse::new(status, body.into()), Duration::ZERO)
    }

    fn with_fallback(fallback: TransportResponse, delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                calls: AtomicUsize::new(0),
                script: Mutex::new(VecDeque::new()),
                fallback,
                delay,
            }),
        }
    }

    /// Delays every reply, keeping calls in flight.
    pub fn delayed(self, delay: Duration) -> Self {
        let fallback = self.inner.fallback.clone();
        let script = std::mem::take(&mut *self.inner.script.lock().unwrap());
        let transport = Self::with_fallback(fallback, delay);
        *transport.inner.script.lock().unwrap() = script;
        transport
    }

    /// Queues a reply ahead of the fallback.
    pub fn then(self, reply: Reply) -> Self {
        self.inner.script.lock().unwrap().push_back(reply);
        self
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _request: &GraphQLRequest) -> Reply {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);

        if !self.inner.delay.is_zero() {
            tokio::time::sleep(self.inner.delay).await;
        }

        let scripted = self.inner.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.inner.fallback.clone()))
    }
}

/// Reply helper for a `data` payload.
pub fn ok(data: Value) -> Reply {
    Ok(TransportResponse::new(
        StatusCode::OK,
        serde_json::json!({ "data": data }).to_string(),
    ))
}

/// Reply helper for a connection failure.
pub fn refused() -> Reply {
    Err(TransportError::connection(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    )))
}
