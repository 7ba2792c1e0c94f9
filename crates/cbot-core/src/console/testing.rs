//! Hand-written fakes for the console ports, shared by the core test modules.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{AccessGrant, ServerId},
    errors::Error,
    Result,
};

use super::port::{AccessExchanger, ConsoleConnector, ConsoleTransport, EventSink};

pub(crate) fn grant(n: usize) -> AccessGrant {
    AccessGrant {
        token: format!("tok-{n}"),
        endpoint: format!("ws://127.0.0.1:{}", 1757 + n),
        server_id: ServerId(430116864),
    }
}

#[derive(Default)]
pub(crate) struct FakeExchanger {
    calls: AtomicUsize,
    fail: AtomicBool,
    hold: AtomicBool,
    release: Notify,
}

impl FakeExchanger {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Park every `exchange` until `release` is called.
    pub(crate) fn hold(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub(crate) fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }
}

#[async_trait]
impl AccessExchanger for FakeExchanger {
    async fn exchange(&self, server_id: ServerId) -> Result<AccessGrant> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hold.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Auth(format!("server {server_id} is offline")));
        }
        Ok(grant(n))
    }
}

/// State shared between the connector and every transport it opened, so call
/// counts span reconnects.
#[derive(Default)]
struct Shared {
    results: Mutex<VecDeque<std::result::Result<(), String>>>,
    payloads: Mutex<Vec<String>>,
    closes: AtomicUsize,
    hang: AtomicBool,
}

#[derive(Default)]
pub(crate) struct FakeConnector {
    shared: Arc<Shared>,
    opens: AtomicUsize,
    fail_opens: AtomicBool,
    sinks: Mutex<Vec<(EventSink, CancellationToken)>>,
}

impl FakeConnector {
    pub(crate) fn fail_opens(&self, fail: bool) {
        self.fail_opens.store(fail, Ordering::SeqCst);
    }

    /// Queue the result of the next `send` (unscripted sends succeed).
    pub(crate) fn script_send(&self, result: std::result::Result<(), String>) {
        self.shared.results.lock().unwrap().push_back(result);
    }

    pub(crate) fn hang_sends(&self, hang: bool) {
        self.shared.hang.store(hang, Ordering::SeqCst);
    }

    pub(crate) fn open_calls(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn close_calls(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn payloads(&self) -> Vec<String> {
        self.shared.payloads.lock().unwrap().clone()
    }

    pub(crate) fn last_sink(&self) -> Option<EventSink> {
        self.sinks.lock().unwrap().last().map(|(s, _)| s.clone())
    }

    /// Simulate the remote end dropping the most recent connection.
    pub(crate) fn remote_close(&self) {
        if let Some((_, cancel)) = self.sinks.lock().unwrap().last() {
            cancel.cancel();
        }
    }
}

#[async_trait]
impl ConsoleConnector for FakeConnector {
    async fn open(
        &self,
        grant: &AccessGrant,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Result<Box<dyn ConsoleTransport>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_opens.load(Ordering::SeqCst) {
            return Err(Error::Connect(format!("{} refused", grant.endpoint)));
        }
        self.sinks.lock().unwrap().push((events, cancel));
        Ok(Box::new(FakeTransport {
            shared: self.shared.clone(),
        }))
    }
}

struct FakeTransport {
    shared: Arc<Shared>,
}

#[async_trait]
impl ConsoleTransport for FakeTransport {
    async fn send(&self, text: &str) -> Result<()> {
        self.shared.payloads.lock().unwrap().push(text.to_string());
        if self.shared.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let next = self.shared.results.lock().unwrap().pop_front();
        match next {
            Some(Err(reason)) => Err(Error::Command(reason)),
            _ => Ok(()),
        }
    }

    async fn close(&self) {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
    }
}
