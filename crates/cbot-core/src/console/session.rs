use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    domain::{AccessGrant, ServerId},
    errors::Error,
    Result,
};

use super::{port::ConsoleConnector, port::ConsoleTransport, ConsoleEvent};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// A live, authenticated connection to one server console.
///
/// Owns the cancellation token that tears the connection down. Once
/// cancelled (explicit `disconnect`, remote close, read-loop failure) the
/// session never comes back; reconnecting means building a new session.
pub struct ConsoleSession {
    id: u64,
    server_id: ServerId,
    endpoint: String,
    transport: Box<dyn ConsoleTransport>,
    cancel: CancellationToken,
    closed: AtomicBool,
    events: Mutex<Option<ConsoleEvents>>,
}

impl std::fmt::Debug for ConsoleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSession")
            .field("id", &self.id)
            .field("server_id", &self.server_id)
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl ConsoleSession {
    /// Open the transport for `grant` and wait for the handshake.
    ///
    /// Any failure is reported as `Error::Connect`.
    pub async fn connect(connector: &dyn ConsoleConnector, grant: AccessGrant) -> Result<Self> {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let transport = match connector.open(&grant, tx, cancel.clone()).await {
            Ok(t) => t,
            Err(e) => {
                cancel.cancel();
                return Err(match e {
                    Error::Connect(_) => e,
                    other => Error::Connect(other.to_string()),
                });
            }
        };

        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        info!(session_id = id, server_id = %grant.server_id, endpoint = %grant.endpoint, "console session connected");

        Ok(Self {
            id,
            server_id: grant.server_id,
            endpoint: grant.endpoint,
            transport,
            events: Mutex::new(Some(ConsoleEvents {
                rx,
                cancel: cancel.clone(),
            })),
            cancel,
            closed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_connected(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Submit `text` to the remote console. Does not retry.
    ///
    /// A closed session fails with `Error::Command`; a session torn down while
    /// the command is in flight fails with `Error::Cancelled`.
    pub async fn run_command(&self, text: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Command("console session is closed".to_string()));
        }

        debug!(session_id = self.id, len = text.len(), "submitting console command");
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            res = self.transport.send(text) => res.map_err(|e| match e {
                Error::Command(_) | Error::Cancelled => e,
                other => Error::Command(other.to_string()),
            }),
        }
    }

    /// Hand out the session's event stream. Only the first caller gets it.
    pub async fn events(&self) -> Option<ConsoleEvents> {
        self.events.lock().await.take()
    }

    /// Cancel the session and release the transport.
    ///
    /// Returns `false` when the session was already disconnected.
    pub async fn disconnect(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.cancel.cancel();
        self.transport.close().await;
        info!(session_id = self.id, server_id = %self.server_id, "console session disconnected");
        true
    }
}

impl Drop for ConsoleSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// FIFO stream of console events for one session.
///
/// Buffered events are yielded first; once the session is torn down and the
/// buffer is empty, `next` returns `Error::Cancelled` instead of waiting.
#[derive(Debug)]
pub struct ConsoleEvents {
    rx: mpsc::UnboundedReceiver<ConsoleEvent>,
    cancel: CancellationToken,
}

impl ConsoleEvents {
    pub async fn next(&mut self) -> Result<ConsoleEvent> {
        tokio::select! {
            biased;
            ev = self.rx.recv() => ev.ok_or(Error::Cancelled),
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use serde_json::json;

    use super::*;
    use crate::console::testing::{grant, FakeConnector};

    #[tokio::test]
    async fn connect_failure_is_reported_as_connect_error() {
        let connector = FakeConnector::default();
        connector.fail_opens(true);

        let err = ConsoleSession::connect(&connector, grant(1)).await.unwrap_err();
        assert!(matches!(err, Error::Connect(_)));
        assert_eq!(connector.open_calls(), 1);
    }

    #[tokio::test]
    async fn run_command_passes_text_through_and_surfaces_rejection() {
        let connector = FakeConnector::default();
        connector.script_send(Ok(()));
        connector.script_send(Err("Unknown command".to_string()));

        let session = ConsoleSession::connect(&connector, grant(1)).await.unwrap();
        session.run_command("player list").await.unwrap();
        let err = session.run_command("nope").await.unwrap_err();

        assert!(matches!(err, Error::Command(m) if m.contains("Unknown command")));
        assert_eq!(connector.payloads(), vec!["player list", "nope"]);
    }

    #[tokio::test]
    async fn events_arrive_in_emission_order_without_loss() {
        let connector = FakeConnector::default();
        let session = ConsoleSession::connect(&connector, grant(1)).await.unwrap();
        let sink = connector.last_sink().unwrap();

        // Emit everything before anyone reads: the queue must buffer it all.
        for i in 0..500 {
            sink.send(ConsoleEvent::new("Subscription", None, json!(i))).unwrap();
        }

        let mut events = session.events().await.unwrap();
        for i in 0..500 {
            let ev = events.next().await.unwrap();
            assert_eq!(ev.data, json!(i));
        }
        assert!(session.events().await.is_none(), "stream is handed out once");
    }

    #[tokio::test]
    async fn disconnect_is_idempotent_and_ends_pending_event_reads() {
        let connector = FakeConnector::default();
        let session = Arc::new(ConsoleSession::connect(&connector, grant(1)).await.unwrap());
        let mut events = session.events().await.unwrap();

        let reader = tokio::spawn(async move { events.next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(session.disconnect().await);
        assert!(!session.disconnect().await);
        assert_eq!(connector.close_calls(), 1);
        assert!(!session.is_connected());

        let res = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("event read must not hang")
            .unwrap();
        assert!(matches!(res, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn in_flight_command_fails_with_cancellation_on_teardown() {
        let connector = FakeConnector::default();
        connector.hang_sends(true);
        let session = Arc::new(ConsoleSession::connect(&connector, grant(1)).await.unwrap());

        let s = session.clone();
        let pending = tokio::spawn(async move { s.run_command("save").await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.disconnect().await;

        let res = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("command must not hang")
            .unwrap();
        assert!(matches!(res, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn commands_on_closed_session_fail_without_touching_transport() {
        let connector = FakeConnector::default();
        let session = ConsoleSession::connect(&connector, grant(1)).await.unwrap();
        connector.remote_close();

        let err = session.run_command("player list").await.unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert!(connector.payloads().is_empty());
    }
}
