//! parley - a multi-client line-oriented chat relay server.
//!
//! Clients connect over TCP and exchange newline-delimited UTF-8 text;
//! the server fans each message out to every connected participant, with
//! nickname identity, private whispers, and a `#USERS ` roster frame
//! pushed on every membership change.

pub mod chat;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;

pub use chat::{Registry, RenameOutcome};
pub use config::Config;
pub use error::{ParleyError, Result};
pub use server::{ChatListener, ClientSession, SessionReader};
