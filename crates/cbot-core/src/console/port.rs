use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{AccessGrant, ServerId},
    Result,
};

use super::ConsoleEvent;

/// Producer half of a session's event queue.
///
/// Unbounded so the transport read loop never blocks on a slow consumer; the
/// cost is unbounded memory if nobody drains the queue.
pub type EventSink = mpsc::UnboundedSender<ConsoleEvent>;

/// Obtains a short-lived console access grant for a server.
///
/// Implementations own the bot credential. Rejected credentials or unknown
/// servers map to `Error::Auth`, transport failures to `Error::Network`.
/// No retries and no caching; retry policy belongs to the caller.
#[async_trait]
pub trait AccessExchanger: Send + Sync {
    async fn exchange(&self, server_id: ServerId) -> Result<AccessGrant>;
}

/// Opens an authenticated transport to a console endpoint.
#[async_trait]
pub trait ConsoleConnector: Send + Sync {
    /// Connect and complete the handshake for `grant`.
    ///
    /// The transport pushes unsolicited console output into `events` and must
    /// stop (and drop `events`) once `cancel` fires. A remote close should
    /// cancel `cancel` itself so the session observes the teardown.
    async fn open(
        &self,
        grant: &AccessGrant,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Result<Box<dyn ConsoleTransport>>;
}

/// A live console connection: `send(text) -> ack/error` plus close.
#[async_trait]
pub trait ConsoleTransport: Send + Sync {
    /// Submit a command and wait for the console to acknowledge it.
    async fn send(&self, text: &str) -> Result<()>;

    /// Release the socket. Called at most once by the owning session.
    async fn close(&self);
}
