#![forbid(unsafe_code)]

//! Local command broker.
//!
//! Clients submit textual commands on a well-known local-socket channel; the
//! broker answers control keywords itself, runs everything else through the
//! host shell, and replies on each client's private channel.

pub mod broker;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod exec;
pub mod ipc;
pub mod models;
pub mod registry;

pub use config::BrokerConfig;
pub use errors::{AppError, Result};
