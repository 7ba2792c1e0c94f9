//! A Township Tale console adapter.
//!
//! Implements the `cbot-core` console ports: the web API access exchange
//! (client-credentials token, then a per-server console grant) and the
//! websocket console transport.

pub mod api;
pub mod console;
mod protocol;

pub use api::AttAccessExchanger;
pub use console::AttConsoleConnector;
