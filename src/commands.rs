use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    connection::Connection,
    session::Session,
    status::{Notification, StatusItem},
};

/// Commands the host can invoke, named the way the host registers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandId {
    #[serde(rename = "vscord.enable")]
    Enable,
    #[serde(rename = "vscord.disable")]
    Disable,
    #[serde(rename = "vscord.enableWorkspace")]
    EnableWorkspace,
    #[serde(rename = "vscord.disableWorkspace")]
    DisableWorkspace,
    #[serde(rename = "vscord.reconnect")]
    Reconnect,
    #[serde(rename = "vscord.disconnect")]
    Disconnect,
}

impl CommandId {
    pub const ALL: [CommandId; 6] = [
        CommandId::Enable,
        CommandId::Disable,
        CommandId::EnableWorkspace,
        CommandId::DisableWorkspace,
        CommandId::Reconnect,
        CommandId::Disconnect,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CommandId::Enable => "vscord.enable",
            CommandId::Disable => "vscord.disable",
            CommandId::EnableWorkspace => "vscord.enableWorkspace",
            CommandId::DisableWorkspace => "vscord.disableWorkspace",
            CommandId::Reconnect => "vscord.reconnect",
            CommandId::Disconnect => "vscord.disconnect",
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Unknown command '{0}'")]
pub struct UnknownCommand(pub String);

impl FromStr for CommandId {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandId::ALL
            .into_iter()
            .find(|command| command.name() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// Thin wrappers the host binds its commands to.
pub struct Commands<C: Connection> {
    session: Arc<Session<C>>,
}

impl<C: Connection> Clone for Commands<C> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
        }
    }
}

impl<C: Connection> Commands<C> {
    pub fn new(session: Arc<Session<C>>) -> Self {
        Self { session }
    }

    pub async fn run(&self, command: CommandId) {
        tracing::debug!(session_id = %self.session.id(), %command, "Running command");
        match command {
            CommandId::Enable => self.enable().await,
            CommandId::Disable => self.disable().await,
            CommandId::EnableWorkspace => self.enable_workspace().await,
            CommandId::DisableWorkspace => self.disable_workspace().await,
            CommandId::Reconnect => self.reconnect().await,
            CommandId::Disconnect => self.disconnect().await,
        }
    }

    pub async fn enable(&self) {
        self.turn_off(false).await;
        self.turn_on(false).await;
        self.announce("Enabled Discord Rich Presence.");
    }

    pub async fn disable(&self) {
        self.turn_off(false).await;
        self.announce("Disabled Discord Rich Presence.");
    }

    pub async fn enable_workspace(&self) {
        self.turn_off(true).await;
        self.turn_on(true).await;
        self.announce("Enabled Discord Rich Presence for this workspace.");
    }

    pub async fn disable_workspace(&self) {
        self.turn_off(true).await;
        self.announce("Disabled Discord Rich Presence for this workspace.");
    }

    pub async fn reconnect(&self) {
        tracing::info!(session_id = %self.session.id(), "Reconnecting to Discord Gateway...");
        self.session.host().status.show(StatusItem::connecting());
        self.session.login().await;
        self.session.enable().await;
    }

    pub async fn disconnect(&self) {
        tracing::info!(session_id = %self.session.id(), "Disconnecting from Discord Gateway...");
        self.session.disconnect().await;
    }

    async fn turn_on(&self, persist: bool) {
        if persist {
            self.persist_enabled(true);
        }
        self.session.enable().await;
    }

    async fn turn_off(&self, persist: bool) {
        if persist {
            self.persist_enabled(false);
        }
        self.session.disable().await;
        self.session.host().status.hide();
    }

    /// Best-effort: a failed write never blocks the command.
    fn persist_enabled(&self, enabled: bool) {
        if let Err(e) = self.session.host().config.set_enabled(enabled) {
            tracing::debug!(session_id = %self.session.id(), error = %e, "Ignoring failure to persist enabled flag");
        }
    }

    fn announce(&self, message: &str) {
        tracing::info!(session_id = %self.session.id(), "{}", message);
        let host = self.session.host();
        if !host.config.settings().suppress_notifications {
            host.status.notify(Notification::info(message));
        }
    }
}
