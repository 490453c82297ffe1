//! Per-connection lifecycle for parley.
//!
//! Each accepted connection runs one handler task: announce the join,
//! relay lines until the peer goes away, then deregister, announce the
//! departure, and close. Teardown runs exactly once on every exit path,
//! and a failure in here never reaches another connection.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chat::roster::roster_frame;
use crate::chat::{broadcast, command, Command, Registry, RenameOutcome};
use crate::server::session::{ClientSession, SessionReader};

/// Handler for a single relay connection.
pub struct ConnectionHandler {
    registry: Arc<Registry>,
    session: Arc<ClientSession>,
    reader: SessionReader,
    shutdown: CancellationToken,
}

impl ConnectionHandler {
    /// Create a handler for an already-registered session.
    pub fn new(
        registry: Arc<Registry>,
        session: Arc<ClientSession>,
        reader: SessionReader,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            session,
            reader,
            shutdown,
        }
    }

    /// Drive the connection from join to teardown.
    pub async fn run(mut self) {
        let nickname = self.session.nickname().await;
        info!("{} joined from {}", nickname, self.session.peer_addr());

        let welcome = format!(
            "Welcome to the server! Type /help to see the commands.\n\
             Your nickname for now is: {nickname}. Change it with: /nick NewName"
        );
        self.reply(&welcome).await;
        broadcast::broadcast(
            &self.registry,
            &format!("* {nickname} joined the chat *"),
            Some(&nickname),
        )
        .await;
        broadcast::broadcast_roster(&self.registry).await;

        // Active: relay lines until EOF, a read error, or shutdown.
        loop {
            let line = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                read = self.reader.next_line() => match read {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("{}: read error: {}", self.session.nickname().await, e);
                        break;
                    }
                },
            };

            if line.trim().is_empty() {
                continue;
            }

            if line.starts_with('/') {
                self.handle_command(&line).await;
            } else {
                let nickname = self.session.nickname().await;
                broadcast::broadcast(&self.registry, &format!("{nickname}: {line}"), None).await;
            }
        }

        // Leaving: deregister first so the departure roster is accurate.
        let nickname = self.session.nickname().await;
        self.registry.remove(&nickname).await;
        info!("{} left", nickname);
        broadcast::broadcast(&self.registry, &format!("* {nickname} left the chat *"), None).await;
        broadcast::broadcast_roster(&self.registry).await;
        self.session.dispose().await;
    }

    /// Parse and execute one `/` command. Failures only ever reply to
    /// this session.
    async fn handle_command(&self, raw: &str) {
        let cmd = command::parse(raw);
        debug!("{}: {:?}", self.session.nickname().await, cmd);

        match cmd {
            Command::Help => self.reply(command::HELP_TEXT).await,
            Command::Nick(new) if new.is_empty() => self.reply(command::USAGE_NICK).await,
            Command::Nick(new) => self.change_nickname(&new).await,
            Command::Whisper { target, message } if target.is_empty() || message.is_empty() => {
                self.reply(command::USAGE_WHISPER).await
            }
            Command::Whisper { target, message } => self.whisper(&target, &message).await,
            Command::List => {
                let names = self.registry.snapshot_sorted_nicknames().await;
                self.reply(&roster_frame(&names)).await;
            }
            Command::Unknown(_) => self.reply(command::UNKNOWN_COMMAND).await,
        }
    }

    async fn change_nickname(&self, new: &str) {
        let old = self.session.nickname().await;
        match self.registry.try_rename(&old, new).await {
            RenameOutcome::Renamed => {
                info!("{} renamed to {}", old, new);
                broadcast::broadcast(
                    &self.registry,
                    &format!("* {old} -> {new} changed nickname *"),
                    None,
                )
                .await;
                broadcast::broadcast_roster(&self.registry).await;
            }
            RenameOutcome::Invalid => self.reply(command::INVALID_NICKNAME).await,
            RenameOutcome::Taken => self.reply(command::NICKNAME_IN_USE).await,
        }
    }

    async fn whisper(&self, target: &str, message: &str) {
        let from = self.session.nickname().await;
        match self.registry.lookup(target).await {
            Some(dest) => {
                if let Err(e) = dest.send(&format!("(whisper) {from}: {message}")).await {
                    debug!("whisper to {} failed: {}", target, e);
                }
                self.reply(&format!("(whisper-> {target}) {message}")).await;
            }
            None => self.reply(command::TARGET_UNAVAILABLE).await,
        }
    }

    /// Send a line to this session only, logging a failed write instead
    /// of surfacing it; the read loop notices a dead transport on its own.
    async fn reply(&self, line: &str) {
        if let Err(e) = self.session.send(line).await {
            debug!("reply to {} failed: {}", self.session.nickname().await, e);
        }
    }
}
