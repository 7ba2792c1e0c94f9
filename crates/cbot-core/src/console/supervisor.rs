use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{domain::ServerId, Result};

use super::{
    port::{AccessExchanger, ConsoleConnector},
    session::ConsoleSession,
    ConsoleEvent,
};

/// Connection state of the process-wide console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owner of the single current console session.
///
/// Replacement (initial connect, recovery, shutdown) is serialized behind
/// `replace`, so concurrent recoveries collapse into one reconnect and no
/// earlier session is left open behind a newer one.
pub struct ConsoleSupervisor {
    server_id: ServerId,
    exchanger: Arc<dyn AccessExchanger>,
    connector: Arc<dyn ConsoleConnector>,
    replace: Mutex<()>,
    current: RwLock<Option<Arc<ConsoleSession>>>,
    connecting: AtomicBool,
    forward: Option<mpsc::UnboundedSender<ConsoleEvent>>,
}

impl ConsoleSupervisor {
    pub fn new(
        server_id: ServerId,
        exchanger: Arc<dyn AccessExchanger>,
        connector: Arc<dyn ConsoleConnector>,
    ) -> Self {
        Self {
            server_id,
            exchanger,
            connector,
            replace: Mutex::new(()),
            current: RwLock::new(None),
            connecting: AtomicBool::new(false),
            forward: None,
        }
    }

    /// Merge the events of every session this supervisor installs into one
    /// stream. Without a subscriber the events are logged and dropped.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ConsoleEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.forward = Some(tx);
        rx
    }

    pub fn server_id(&self) -> ServerId {
        self.server_id
    }

    pub async fn state(&self) -> ConsoleState {
        if self.connecting.load(Ordering::SeqCst) {
            return ConsoleState::Connecting;
        }
        match self.current.read().await.as_ref() {
            Some(s) if s.is_connected() => ConsoleState::Connected,
            _ => ConsoleState::Disconnected,
        }
    }

    pub async fn current(&self) -> Option<Arc<ConsoleSession>> {
        self.current.read().await.clone()
    }

    /// Exchange a fresh grant and connect, replacing (and disconnecting) any
    /// prior session.
    pub async fn connect(&self) -> Result<Arc<ConsoleSession>> {
        let _guard = self.replace.lock().await;
        self.connect_locked().await
    }

    /// Recover from a failure observed on `stale` (or on no session at all).
    ///
    /// If a concurrent caller already installed a live replacement, that
    /// session is returned without another exchange.
    pub async fn recover(&self, stale: Option<&Arc<ConsoleSession>>) -> Result<Arc<ConsoleSession>> {
        let _guard = self.replace.lock().await;

        if let Some(current) = self.current.read().await.clone() {
            let replaced = stale.map_or(true, |s| s.id() != current.id());
            if replaced && current.is_connected() {
                debug!(session_id = current.id(), "reusing session installed by concurrent recovery");
                return Ok(current);
            }
        }

        info!(server_id = %self.server_id, "reconnecting console");
        self.connect_locked().await
    }

    /// Disconnect the current session, if any.
    pub async fn shutdown(&self) {
        let _guard = self.replace.lock().await;
        let prior = self.current.write().await.take();
        if let Some(prior) = prior {
            prior.disconnect().await;
        }
    }

    async fn connect_locked(&self) -> Result<Arc<ConsoleSession>> {
        let prior = self.current.write().await.take();
        if let Some(prior) = prior {
            prior.disconnect().await;
        }

        self.connecting.store(true, Ordering::SeqCst);
        let result = async {
            let grant = self.exchanger.exchange(self.server_id).await?;
            ConsoleSession::connect(self.connector.as_ref(), grant).await
        }
        .await;
        self.connecting.store(false, Ordering::SeqCst);

        let session = match result {
            Ok(s) => Arc::new(s),
            Err(e) => {
                warn!(server_id = %self.server_id, error = %e, "console connect failed");
                return Err(e);
            }
        };

        self.pump_events(&session).await;
        *self.current.write().await = Some(session.clone());
        Ok(session)
    }

    async fn pump_events(&self, session: &ConsoleSession) {
        let Some(mut events) = session.events().await else {
            return;
        };
        let forward = self.forward.clone();
        let session_id = session.id();
        tokio::spawn(async move {
            while let Ok(ev) = events.next().await {
                match &forward {
                    Some(tx) if tx.send(ev.clone()).is_ok() => {}
                    _ => debug!(session_id, event = %ev.label(), "console event (no subscriber)"),
                }
            }
            debug!(session_id, "console event pump stopped");
        });
    }
}
