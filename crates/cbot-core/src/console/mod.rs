//! Console connection: token exchange port, live session, and the
//! process-wide supervisor that owns the current session.

pub mod port;
pub mod session;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use port::{AccessExchanger, ConsoleConnector, ConsoleTransport, EventSink};
pub use session::{ConsoleEvents, ConsoleSession};
pub use supervisor::{ConsoleState, ConsoleSupervisor};

/// An opaque event emitted by the remote console (subscription payloads,
/// system messages, unsolicited logs).
#[derive(Clone, Debug, PartialEq)]
pub struct ConsoleEvent {
    /// Frame kind as reported by the console (`Subscription`, `SystemMessage`, ...).
    pub kind: String,
    pub event_type: Option<String>,
    pub data: serde_json::Value,
}

impl ConsoleEvent {
    pub fn new(kind: impl Into<String>, event_type: Option<String>, data: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            event_type,
            data,
        }
    }

    /// Short label used in logs and relay notifications.
    pub fn label(&self) -> String {
        match &self.event_type {
            Some(t) => format!("{}/{}", self.kind, t),
            None => self.kind.clone(),
        }
    }
}
