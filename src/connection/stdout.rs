use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::{
    io::{AsyncWriteExt, Stdout},
    sync::{Mutex as AsyncMutex, broadcast},
};

use super::{ActivityReceipt, Connection, ConnectionError, LifecycleEvent};
use crate::activity::Activity;

const LIFECYCLE_CAPACITY: usize = 16;

/// Dry-run connection: every presence update is written to stdout as one
/// JSON line instead of being sent to a remote service.
pub struct StdoutConnection {
    identity: Mutex<String>,
    connected: AtomicBool,
    sequence: AtomicU64,
    lifecycle: broadcast::Sender<LifecycleEvent>,
    out: AsyncMutex<Stdout>,
}

#[derive(Serialize)]
struct Line<'a> {
    identity: &'a str,
    sequence: u64,
    activity: Option<&'a Activity>,
}

impl StdoutConnection {
    pub fn new(identity: impl Into<String>) -> Self {
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        Self {
            identity: Mutex::new(identity.into()),
            connected: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            lifecycle,
            out: AsyncMutex::new(tokio::io::stdout()),
        }
    }

    async fn write_line(&self, activity: Option<&Activity>) -> Result<u64, ConnectionError> {
        let identity = self.identity();
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let mut line = serde_json::to_vec(&Line {
            identity: &identity,
            sequence,
            activity,
        })
        .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        line.push(b'\n');

        let mut out = self.out.lock().await;
        out.write_all(&line)
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        Ok(sequence)
    }
}

#[async_trait]
impl Connection for StdoutConnection {
    async fn login(&self) -> Result<(), ConnectionError> {
        if !self.connected.swap(true, Ordering::SeqCst) {
            tracing::debug!(identity = %self.identity(), "Stdout connection ready");
            let _ = self.lifecycle.send(LifecycleEvent::Ready);
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ConnectionError> {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.lifecycle.send(LifecycleEvent::Disconnected);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn identity(&self) -> String {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_identity(&self, identity: &str) {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = identity.to_string();
    }

    async fn set_activity(
        &self,
        activity: &Activity,
    ) -> Result<Option<ActivityReceipt>, ConnectionError> {
        if !self.is_connected() {
            return Ok(None);
        }
        let sequence = self.write_line(Some(activity)).await?;
        Ok(Some(ActivityReceipt {
            sequence,
            accepted_at: Utc::now(),
        }))
    }

    async fn clear_activity(&self) -> Result<(), ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::Closed);
        }
        self.write_line(None).await.map(|_| ())
    }

    fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }
}
