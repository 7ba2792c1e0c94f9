//! Core domain + application logic for the console bridge bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the game
//! console live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod console;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod relay;
pub mod security;

pub use errors::{Error, Result};
