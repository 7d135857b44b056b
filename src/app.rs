use std::sync::Arc;

use crate::{
    commands::Commands,
    connection::Connection,
    session::{Host, Session},
};

/// Process-level wiring: owns the session for the lifetime of the host.
pub struct App<C: Connection> {
    session: Arc<Session<C>>,
    commands: Commands<C>,
}

impl<C: Connection> App<C> {
    /// Builds the session and starts connecting in the background. When the
    /// settings say presence is off, the session is disabled before that.
    pub async fn activate(connection: Arc<C>, host: Host) -> Self {
        let enabled = host.config.settings().enabled;
        let session = Session::new(connection, host);
        tracing::info!(session_id = %session.id(), enabled, "Rich presence bridge activated");

        if !enabled {
            session.disable().await;
        }

        let starting = Arc::clone(&session);
        tokio::spawn(async move {
            if enabled {
                starting.enable().await;
            } else {
                starting.login().await;
            }
        });

        Self {
            commands: Commands::new(Arc::clone(&session)),
            session,
        }
    }

    pub fn session(&self) -> &Arc<Session<C>> {
        &self.session
    }

    pub fn commands(&self) -> &Commands<C> {
        &self.commands
    }

    pub async fn deactivate(&self) {
        tracing::info!(session_id = %self.session.id(), "Rich presence bridge deactivated");
        self.session.destroy().await;
    }
}
