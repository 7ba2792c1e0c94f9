//! Websocket console transport.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::{
    net::TcpStream,
    sync::{oneshot, Mutex},
};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cbot_core::{
    config::Config,
    console::{ConsoleConnector, ConsoleEvent, ConsoleTransport, EventSink},
    domain::{AccessGrant, ServerId},
    errors::Error,
    Result,
};

use crate::protocol::{CommandFrame, Inbound, InboundFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

type CommandAck = std::result::Result<(), String>;
type PendingCommands = Arc<Mutex<HashMap<u64, oneshot::Sender<CommandAck>>>>;

const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct AttConsoleConnector {
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl AttConsoleConnector {
    pub fn new(connect_timeout: Duration, command_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            command_timeout,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.connect_timeout, cfg.command_timeout)
    }
}

#[async_trait]
impl ConsoleConnector for AttConsoleConnector {
    async fn open(
        &self,
        grant: &AccessGrant,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Result<Box<dyn ConsoleTransport>> {
        let server_id = grant.server_id;
        info!(%server_id, endpoint = %grant.endpoint, "connecting to console");

        let (ws, _) = tokio::time::timeout(self.connect_timeout, connect_async(grant.endpoint.as_str()))
            .await
            .map_err(|_| Error::Connect(format!("{}: connect timed out", grant.endpoint)))?
            .map_err(|e| Error::Connect(format!("{}: {e}", grant.endpoint)))?;

        let (mut write, mut read) = ws.split();

        // The first frame authenticates the socket.
        write
            .send(Message::Text(grant.token.clone().into()))
            .await
            .map_err(|e| Error::Connect(format!("sending console token failed: {e}")))?;

        tokio::time::timeout(self.connect_timeout, await_auth(&mut read, &events))
            .await
            .map_err(|_| Error::Connect("console authentication timed out".to_string()))??;

        info!(%server_id, "console authenticated");

        let pending: PendingCommands = Arc::new(Mutex::new(HashMap::new()));
        tokio::spawn(read_loop(
            read,
            pending.clone(),
            events,
            cancel.clone(),
            server_id,
        ));

        Ok(Box::new(AttConsoleTransport {
            writer: Mutex::new(write),
            pending,
            next_id: AtomicU64::new(1),
            command_timeout: self.command_timeout,
            cancel,
        }))
    }
}

/// Wait for the console's verdict on the token. Frames that arrive before it
/// are forwarded as ordinary events.
async fn await_auth(read: &mut WsReader, events: &EventSink) -> Result<()> {
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let frame: InboundFrame = match serde_json::from_str(text.as_str()) {
                    Ok(f) => f,
                    Err(e) => {
                        debug!(error = %e, "unparseable frame during handshake");
                        continue;
                    }
                };
                match frame.auth_result() {
                    Some(Ok(())) => return Ok(()),
                    Some(Err(reason)) => {
                        return Err(Error::Connect(format!("console rejected token: {reason}")))
                    }
                    None => {
                        if let Inbound::Event(ev) = frame.classify() {
                            let _ = events.send(ev);
                        }
                    }
                }
            }
            Ok(Message::Close(frame)) => {
                return Err(Error::Connect(format!(
                    "console closed during handshake: {frame:?}"
                )))
            }
            Ok(_) => {}
            Err(e) => return Err(Error::Connect(format!("console handshake failed: {e}"))),
        }
    }
    Err(Error::Connect("console closed during handshake".to_string()))
}

async fn read_loop(
    mut read: WsReader,
    pending: PendingCommands,
    events: EventSink,
    cancel: CancellationToken,
    server_id: ServerId,
) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            msg = read.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => {
                let frame: InboundFrame = match serde_json::from_str(text.as_str()) {
                    Ok(f) => f,
                    Err(e) => {
                        warn!(%server_id, error = %e, "unparseable console frame");
                        continue;
                    }
                };
                match frame.classify() {
                    Inbound::CommandResult { id, outcome } => {
                        match pending.lock().await.remove(&id) {
                            Some(tx) => {
                                let _ = tx.send(outcome);
                            }
                            None => debug!(%server_id, id, "result for unknown command"),
                        }
                    }
                    Inbound::Event(ev) => forward(&events, ev),
                }
            }
            Some(Ok(Message::Close(frame))) => {
                info!(%server_id, ?frame, "console connection closed by remote");
                break;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!(%server_id, error = %e, "console websocket error");
                break;
            }
            None => break,
        }
    }

    cancel.cancel();

    let mut pending = pending.lock().await;
    for (id, tx) in pending.drain() {
        let _ = tx.send(Err("console connection closed".to_string()));
        debug!(%server_id, id, "failed pending command on close");
    }
}

fn forward(events: &EventSink, ev: ConsoleEvent) {
    if events.send(ev).is_err() {
        debug!("console event dropped, session gone");
    }
}

struct AttConsoleTransport {
    writer: Mutex<WsWriter>,
    pending: PendingCommands,
    next_id: AtomicU64,
    command_timeout: Duration,
    cancel: CancellationToken,
}

#[async_trait]
impl ConsoleTransport for AttConsoleTransport {
    async fn send(&self, text: &str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Command("console connection is closed".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let json = serde_json::to_string(&CommandFrame { id, content: text })?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let sent = self.writer.lock().await.send(Message::Text(json.into())).await;
        if let Err(e) = sent {
            self.pending.lock().await.remove(&id);
            return Err(Error::Command(format!("console write failed: {e}")));
        }

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(Error::Command(reason)),
            Ok(Err(_)) => Err(Error::Command("console connection closed".to_string())),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::Command(format!(
                    "no response within {}ms",
                    self.command_timeout.as_millis()
                )))
            }
        }
    }

    async fn close(&self) {
        self.cancel.cancel();
        let mut writer = self.writer.lock().await;
        let _ = tokio::time::timeout(CLOSE_GRACE, async {
            let _ = writer.send(Message::Close(None)).await;
            let _ = writer.close().await;
        })
        .await;
    }
}
