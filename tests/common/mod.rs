#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use presence_bridge::{
    Host, Session,
    activity::{Activity, ActivityBuilder, ActivityKind},
    config::{InMemoryConfig, Settings},
    connection::{ActivityReceipt, Connection, ConnectionError, LifecycleEvent},
    events::{EditorEvent, EditorEvents},
    status::{Notification, StatusItem, StatusSink},
};
use tokio::sync::broadcast;

pub const IDENTITY: &str = "1111";

/// Connection double that records every call and emits lifecycle events the
/// way a real client does.
pub struct FakeConnection {
    identity: Mutex<String>,
    connected: AtomicBool,
    login_failures: Mutex<VecDeque<ConnectionError>>,
    send_delays: Mutex<VecDeque<Duration>>,
    pub logins: AtomicUsize,
    pub destroys: AtomicUsize,
    pub clears: AtomicUsize,
    pub sent: Mutex<Vec<Activity>>,
    pub calls: Mutex<Vec<&'static str>>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
}

impl FakeConnection {
    pub fn new(identity: &str) -> Self {
        let (lifecycle, _) = broadcast::channel(16);
        Self {
            identity: Mutex::new(identity.to_string()),
            connected: AtomicBool::new(false),
            login_failures: Mutex::new(VecDeque::new()),
            send_delays: Mutex::new(VecDeque::new()),
            logins: AtomicUsize::new(0),
            destroys: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            lifecycle,
        }
    }

    pub fn fail_next_login(&self, error: ConnectionError) {
        self.login_failures.lock().unwrap().push_back(error);
    }

    /// The next sends take this long each, in order.
    pub fn delay_sends(&self, delays: impl IntoIterator<Item = Duration>) {
        self.send_delays.lock().unwrap().extend(delays);
    }

    pub fn sent_details(&self) -> Vec<Option<String>> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|activity| activity.details.clone())
            .collect()
    }

    /// The remote side goes away on its own.
    pub fn drop_remote(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.lifecycle.send(LifecycleEvent::Disconnected);
    }

    /// The remote side comes back on its own.
    pub fn restore_remote(&self) {
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.lifecycle.send(LifecycleEvent::Ready);
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Connection for FakeConnection {
    async fn login(&self) -> Result<(), ConnectionError> {
        self.record("login");
        self.logins.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.login_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.lifecycle.send(LifecycleEvent::Ready);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ConnectionError> {
        self.record("destroy");
        self.destroys.fetch_add(1, Ordering::SeqCst);
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.lifecycle.send(LifecycleEvent::Disconnected);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn identity(&self) -> String {
        self.identity.lock().unwrap().clone()
    }

    fn set_identity(&self, identity: &str) {
        *self.identity.lock().unwrap() = identity.to_string();
    }

    async fn set_activity(
        &self,
        activity: &Activity,
    ) -> Result<Option<ActivityReceipt>, ConnectionError> {
        self.record("set_activity");
        if !self.is_connected() {
            return Ok(None);
        }
        let delay = self.send_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(activity.clone());
        Ok(Some(ActivityReceipt {
            sequence: sent.len() as u64,
            accepted_at: Utc::now(),
        }))
    }

    async fn clear_activity(&self) -> Result<(), ConnectionError> {
        self.record("clear_activity");
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.lifecycle.subscribe()
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    pub shown: Mutex<Vec<StatusItem>>,
    pub hidden: AtomicUsize,
    pub notifications: Mutex<Vec<Notification>>,
}

impl RecordingStatus {
    pub fn last(&self) -> Option<StatusItem> {
        self.shown.lock().unwrap().last().cloned()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap().clone()
    }
}

impl StatusSink for RecordingStatus {
    fn show(&self, item: StatusItem) {
        self.shown.lock().unwrap().push(item);
    }

    fn hide(&self) {
        self.hidden.fetch_add(1, Ordering::SeqCst);
    }

    fn notify(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

/// Builder that records the kind of every build and keeps the previous
/// elapsed-time origin.
#[derive(Default)]
pub struct RecordingBuilder {
    pub kinds: Mutex<Vec<ActivityKind>>,
    pub problems: Mutex<Vec<usize>>,
}

impl RecordingBuilder {
    pub fn kinds(&self) -> Vec<ActivityKind> {
        self.kinds.lock().unwrap().clone()
    }

    pub fn count(&self, kind: ActivityKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

#[async_trait]
impl ActivityBuilder for RecordingBuilder {
    async fn build(&self, previous: &Activity, kind: ActivityKind) -> Activity {
        self.kinds.lock().unwrap().push(kind);
        Activity {
            details: Some(format!("{kind:?}")),
            start_timestamp: previous.start_timestamp.or_else(|| Some(Utc::now())),
            ..Activity::default()
        }
    }

    fn diagnostics_changed(&self, problems: usize) {
        self.problems.lock().unwrap().push(problems);
    }
}

pub struct Harness {
    pub session: Arc<Session<FakeConnection>>,
    pub connection: Arc<FakeConnection>,
    pub status: Arc<RecordingStatus>,
    pub config: Arc<InMemoryConfig>,
    pub builder: Arc<RecordingBuilder>,
    pub events: Arc<EditorEvents>,
}

impl Harness {
    pub fn new(settings: Settings) -> Self {
        let connection = Arc::new(FakeConnection::new(IDENTITY));
        let status = Arc::new(RecordingStatus::default());
        let config = Arc::new(InMemoryConfig::new(Settings {
            app_id: Some(IDENTITY.to_string()),
            ..settings
        }));
        let builder = Arc::new(RecordingBuilder::default());
        let events = Arc::new(EditorEvents::new());

        let host = Host {
            status: status.clone(),
            config: config.clone(),
            builder: builder.clone(),
            events: events.clone(),
        };
        let session = Session::new(connection.clone(), host);

        Self {
            session,
            connection,
            status,
            config,
            builder,
            events,
        }
    }

    pub fn host(&self) -> Host {
        self.session.host().clone()
    }

    pub fn emit(&self, event: EditorEvent) -> usize {
        self.events.emit(event)
    }
}

/// Lets spawned tasks (subscriptions, lifecycle watcher) run to quiescence.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advances paused time, letting every timer due meanwhile fire.
pub async fn wait(duration: Duration) {
    tokio::time::sleep(duration).await;
    settle().await;
}
