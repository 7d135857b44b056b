pub mod stdout;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::activity::Activity;

pub use stdout::StdoutConnection;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("No local client detected")]
    ClientNotFound,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Connection closed")]
    Closed,
}

/// Unsolicited notifications from the remote connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Ready,
    Disconnected,
}

/// What the remote side answered to an accepted activity update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReceipt {
    pub sequence: u64,
    pub accepted_at: DateTime<Utc>,
}

/// Client for the remote presence service.
///
/// The session owns exactly one of these for its whole life and only ever
/// changes its identity between a `destroy` and the next `login`.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    async fn login(&self) -> Result<(), ConnectionError>;

    async fn destroy(&self) -> Result<(), ConnectionError>;

    fn is_connected(&self) -> bool;

    fn identity(&self) -> String;

    fn set_identity(&self, identity: &str);

    /// Returns `Ok(None)` when nobody on the remote side received the update.
    async fn set_activity(
        &self,
        activity: &Activity,
    ) -> Result<Option<ActivityReceipt>, ConnectionError>;

    async fn clear_activity(&self) -> Result<(), ConnectionError>;

    fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent>;
}
