//! Shared test fixtures: a scriptable mock hub transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use ch_client::transport::{HubTransport, TransportEvent, TransportFactory};
use ch_core::error::{HubError, HubResult};

/// Handle for scripting the mock hub from tests: records every outbound
/// invocation and open attempt, injects inbound events, and drops the
/// connection on demand.
#[derive(Clone, Default)]
pub struct MockHub {
    invocations: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
    open_attempts: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    fail_next: Arc<AtomicUsize>,
    tokens_seen: Arc<Mutex<Vec<String>>>,
    event_tx: Arc<Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>>,
}

impl MockHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> Arc<MockFactory> {
        Arc::new(MockFactory { hub: self.clone() })
    }

    /// Every invocation the client sent, in order.
    pub fn invocations(&self) -> Vec<(String, Vec<Value>)> {
        self.invocations.lock().unwrap().clone()
    }

    /// Number of times `open` was attempted (including failures).
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }

    /// Number of successfully opened connections.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Make the next `n` open attempts fail with a socket error.
    pub fn fail_next_opens(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Access tokens presented to `open`, in order.
    pub fn tokens_seen(&self) -> Vec<String> {
        self.tokens_seen.lock().unwrap().clone()
    }

    /// Inject an inbound hub invocation on the current connection.
    pub fn push_invocation(&self, target: &str, arguments: Vec<Value>) {
        let guard = self.event_tx.lock().unwrap();
        let tx = guard.as_ref().expect("no open mock connection");
        tx.send(TransportEvent::Invocation {
            target: target.to_string(),
            arguments,
        })
        .expect("mock event receiver dropped");
    }

    /// Drop the current connection, as a transient network failure would.
    pub fn drop_connection(&self, error: Option<&str>) {
        let guard = self.event_tx.lock().unwrap();
        let tx = guard.as_ref().expect("no open mock connection");
        let _ = tx.send(TransportEvent::Closed {
            error: error.map(str::to_string),
        });
    }
}

pub struct MockFactory {
    hub: MockHub,
}

#[async_trait]
impl TransportFactory for MockFactory {
    async fn open(
        &self,
        _hub_url: &str,
        access_token: &str,
    ) -> HubResult<(Arc<dyn HubTransport>, mpsc::UnboundedReceiver<TransportEvent>)> {
        self.hub.open_attempts.fetch_add(1, Ordering::SeqCst);
        self.hub
            .tokens_seen
            .lock()
            .unwrap()
            .push(access_token.to_string());

        let remaining = self.hub.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.hub.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(HubError::Socket("mock open refused".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.hub.event_tx.lock().unwrap() = Some(tx);
        self.hub.opens.fetch_add(1, Ordering::SeqCst);

        let transport = Arc::new(MockTransport {
            hub: self.hub.clone(),
        });
        Ok((transport, rx))
    }
}

pub struct MockTransport {
    hub: MockHub,
}

#[async_trait]
impl HubTransport for MockTransport {
    async fn invoke(&self, target: &str, arguments: Vec<Value>) -> HubResult<()> {
        self.hub
            .invocations
            .lock()
            .unwrap()
            .push((target.to_string(), arguments));
        Ok(())
    }

    async fn stop(&self) {}
}

/// Poll a condition until it holds or the test deadline passes.
pub async fn wait_for<F>(what: &str, cond: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(deadline.is_ok(), "timed out waiting for {what}");
}
