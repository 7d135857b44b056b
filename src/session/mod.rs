pub mod idle;
pub mod state;
pub mod timer;

use std::{
    future::Future,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures_util::FutureExt;
use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
    time::Instant,
};
use uuid::Uuid;

use crate::{
    activity::{Activity, ActivityBuilder, ActivityKind},
    config::{ConfigSource, Settings},
    connection::{ActivityReceipt, Connection, ConnectionError, LifecycleEvent},
    events::{EditorEvent, EditorEvents, EventHandler, EventSource, SubscriptionSet},
    status::{Notification, StatusItem, StatusSink},
    throttle::Throttle,
};

pub use idle::{IdleAction, IdlePolicy};
pub use state::{ConnectionState, Event};
pub use timer::Timer;

pub const ACTIVITY_THROTTLE_INTERVAL: Duration = Duration::from_millis(2000);
pub const STATUS_COMPACT_DELAY: Duration = Duration::from_secs(5);

/// Host collaborators the session reads from and reports to.
#[derive(Clone)]
pub struct Host {
    pub status: Arc<dyn StatusSink>,
    pub config: Arc<dyn ConfigSource>,
    pub builder: Arc<dyn ActivityBuilder>,
    pub events: Arc<EditorEvents>,
}

struct SessionState {
    connection: ConnectionState,
    /// User intent, independent of connection health.
    enabled: bool,
    activity: Activity,
    subscriptions: SubscriptionSet,
    idle: Timer,
    status_compaction: Timer,
}

impl SessionState {
    fn new() -> Self {
        Self {
            connection: ConnectionState::Connecting,
            enabled: true,
            activity: Activity::default(),
            subscriptions: SubscriptionSet::new(),
            idle: Timer::Disarmed,
            status_compaction: Timer::Disarmed,
        }
    }

    fn can_dispatch(&self) -> bool {
        self.enabled && self.connection.is_connected()
    }

    /// Drops every subscription and cancels every timer of the current active period.
    fn release(&mut self) {
        self.subscriptions.stop();
        self.idle.disarm();
        self.status_compaction.disarm();
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        self.release();
    }
}

/// Point-in-time view of the session, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub enabled: bool,
    pub subscriptions: Vec<EventSource>,
    pub idle_armed: bool,
    pub status_compaction_armed: bool,
    pub throttle_pending: bool,
}

impl SessionSnapshot {
    pub fn pending_timers(&self) -> usize {
        [
            self.idle_armed,
            self.status_compaction_armed,
            self.throttle_pending,
        ]
        .into_iter()
        .filter(|armed| *armed)
        .count()
    }
}

/// Owns the single connection to the presence service and everything that
/// feeds it: editor subscriptions, the activity throttle and the idle timer.
///
/// Obtain one via [`Session::new`] and share the returned `Arc`.
pub struct Session<C: Connection> {
    id: Uuid,
    connection: Arc<C>,
    host: Host,
    throttle: Throttle,
    state: Mutex<SessionState>,
    // Serialises login, identity swaps and teardown so only one connection is ever live.
    gate: Mutex<()>,
    // Held across build-store-send so at most one activity send is in flight.
    sending: Mutex<()>,
    /// Bumped by every immediate dispatch; throttled firings from an older generation are dropped.
    generation: AtomicU64,
    watcher: JoinHandle<()>,
    weak: Weak<Self>,
}

impl<C: Connection> Session<C> {
    /// Creates the session in `Connecting`, shows the connecting status and
    /// starts listening to the connection's lifecycle events. Nothing is
    /// dialled yet: [`App::activate`](crate::App::activate) starts the first
    /// login in the background, or call [`Session::enable`] or
    /// [`Session::login`] directly.
    pub fn new(connection: Arc<C>, host: Host) -> Arc<Self> {
        let id = Uuid::new_v4();
        let lifecycle = connection.lifecycle();
        host.status.show(StatusItem::connecting());

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let throttled = weak.clone();
            let throttle = Throttle::new(ACTIVITY_THROTTLE_INTERVAL, true, move || {
                let Some(session) = throttled.upgrade() else {
                    return;
                };
                let generation = session.generation.load(Ordering::SeqCst);
                tokio::spawn(async move {
                    session.dispatch_throttled(generation).await;
                });
            });

            Self {
                id,
                connection,
                host,
                throttle,
                state: Mutex::new(SessionState::new()),
                gate: Mutex::new(()),
                sending: Mutex::new(()),
                generation: AtomicU64::new(0),
                watcher: spawn_lifecycle_watcher(id, weak.clone(), lifecycle),
                weak: weak.clone(),
            }
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub async fn state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    pub async fn is_enabled(&self) -> bool {
        self.state.lock().await.enabled
    }

    /// The last payload computed by a dispatch.
    pub async fn activity(&self) -> Activity {
        self.state.lock().await.activity.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            state: state.connection,
            enabled: state.enabled,
            subscriptions: state.subscriptions.sources(),
            idle_armed: state.idle.is_armed(),
            status_compaction_armed: state.status_compaction.is_armed(),
            throttle_pending: self.throttle.is_pending(),
        }
    }

    // --- Enable / disable ---

    /// Connects if needed, sends a fresh activity and (re)starts the editor
    /// subscriptions. Does nothing beyond reporting when the login fails.
    pub async fn enable(&self) {
        {
            let mut state = self.state.lock().await;
            if state.connection.is_destroyed() {
                tracing::debug!(session_id = %self.id, "Ignoring enable on destroyed session");
                return;
            }
            state.enabled = true;
        }

        let (state, _) = self.connect().await;
        if !state.is_connected() {
            return;
        }

        self.dispatch_now(ActivityKind::Active).await;
        self.start_listening().await;
    }

    /// Starts the editor subscriptions and the status compaction timer for
    /// a connected, enabled session.
    async fn start_listening(&self) {
        let routes = self.routes(&self.host.config.settings());
        let mut state = self.state.lock().await;
        if !state.can_dispatch() {
            tracing::debug!(session_id = %self.id, state = %state.connection, "Session changed before subscribing, not listening");
            return;
        }
        state.subscriptions.start(&self.host.events, routes);

        state.status_compaction.disarm();
        let session = self.weak.clone();
        state
            .status_compaction
            .arm(STATUS_COMPACT_DELAY, move |deadline| async move {
                if let Some(session) = session.upgrade() {
                    session.on_status_compaction(deadline).await;
                }
            });

        tracing::info!(session_id = %self.id, subscriptions = state.subscriptions.len(), "Presence enabled");
    }

    /// Stops all subscriptions and timers and clears the remote activity.
    /// The underlying connection stays up so a later `enable` is cheap.
    pub async fn disable(&self) {
        {
            let mut state = self.state.lock().await;
            if state.connection.is_destroyed() {
                return;
            }
            state.enabled = false;
            self.transition(&mut state, Event::Disable);
        }

        if self.connection.is_connected() {
            if let Err(e) = self.connection.clear_activity().await {
                tracing::warn!(session_id = %self.id, error = %e, "Failed to clear activity");
            }
        }
        tracing::info!(session_id = %self.id, "Presence disabled");
    }

    // --- Connection lifecycle ---

    /// Makes sure the connection is up with the configured identity.
    /// Returns the resulting state; failures are reported, never retried.
    ///
    /// An enabled session that comes back from Disconnected resumes
    /// dispatching and listening to the editor.
    pub async fn login(&self) -> ConnectionState {
        let (state, swapped) = self.connect().await;
        if swapped || !self.is_listening().await {
            self.refresh().await;
        }
        state
    }

    /// Returns the resulting state and whether the identity was swapped.
    async fn connect(&self) -> (ConnectionState, bool) {
        let _gate = self.gate.lock().await;
        if self.state().await.is_destroyed() {
            return (ConnectionState::Destroyed, false);
        }

        let identity = self.host.config.settings().application_id().to_string();
        let current = self.connection.identity();

        if self.connection.is_connected() && current == identity {
            return (self.mark_ready().await, false);
        }

        if current != identity {
            let swapped = self.swap_identity(&identity).await;
            return (self.state().await, swapped);
        }

        self.begin_connecting().await;
        (self.establish().await, false)
    }

    /// Replaces the connection's identity, reconnecting with the new one.
    /// A no-op when the identity is unchanged.
    pub async fn update_client_id(&self, identity: &str) {
        let swapped = {
            let _gate = self.gate.lock().await;
            if self.state().await.is_destroyed() {
                return;
            }
            self.swap_identity(identity).await
        };

        if swapped {
            self.refresh().await;
        }
    }

    /// Disables and tears the connection down, leaving the reconnect
    /// affordance. Unlike [`Session::destroy`] this is not terminal.
    pub async fn disconnect(&self) {
        self.disable().await;

        let _gate = self.gate.lock().await;
        if self.state().await.is_destroyed() {
            return;
        }
        if let Err(e) = self.connection.destroy().await {
            tracing::warn!(session_id = %self.id, error = %e, "Failed to destroy client");
        }
        {
            let mut state = self.state.lock().await;
            self.transition(&mut state, Event::Disconnected);
        }
        self.host.status.show(StatusItem::reconnect());
        tracing::info!(session_id = %self.id, "Disconnected from presence service");
    }

    /// Terminal teardown. Safe to call more than once; later calls do nothing.
    pub async fn destroy(&self) {
        if self.state().await.is_destroyed() {
            tracing::debug!(session_id = %self.id, "Session already destroyed");
            return;
        }

        self.disable().await;

        let _gate = self.gate.lock().await;
        {
            let mut state = self.state.lock().await;
            if state.connection.is_destroyed() {
                return;
            }
            self.transition(&mut state, Event::Destroy);
        }
        self.watcher.abort();

        if let Err(e) = self.connection.destroy().await {
            tracing::warn!(session_id = %self.id, error = %e, "Failed to destroy client");
        }
        self.host.status.hide();
        tracing::info!(session_id = %self.id, "Session destroyed");
    }

    async fn begin_connecting(&self) {
        let mut state = self.state.lock().await;
        self.transition(&mut state, Event::Login);
        self.host.status.show(StatusItem::connecting());
    }

    async fn establish(&self) -> ConnectionState {
        let identity = self.connection.identity();
        match self.connection.login().await {
            Ok(()) => {
                tracing::info!(session_id = %self.id, %identity, "Successfully logged in");
                self.mark_ready().await
            }
            Err(error) => self.on_login_failed(&identity, error).await,
        }
    }

    async fn swap_identity(&self, identity: &str) -> bool {
        let current = self.connection.identity();
        if current == identity {
            return false;
        }

        tracing::info!(session_id = %self.id, from = %current, to = %identity, "Switching client identity");
        self.begin_connecting().await;
        if let Err(e) = self.connection.destroy().await {
            tracing::debug!(session_id = %self.id, error = %e, "Ignoring error destroying previous client");
        }
        self.connection.set_identity(identity);
        self.establish().await;
        true
    }

    async fn mark_ready(&self) -> ConnectionState {
        let mut state = self.state.lock().await;
        if !state.connection.is_connected() && !state.connection.is_destroyed() {
            self.transition(&mut state, Event::Ready);
            self.host.status.show(StatusItem::connected());
        }
        state.connection
    }

    async fn on_login_failed(&self, identity: &str, error: ConnectionError) -> ConnectionState {
        tracing::error!(session_id = %self.id, %identity, error = %error, "Encountered error while trying to login");

        let state = {
            let mut state = self.state.lock().await;
            self.transition(&mut state, Event::LoginFailed)
        };

        if let Err(e) = self.connection.destroy().await {
            tracing::debug!(session_id = %self.id, error = %e, "Ignoring error destroying client after failed login");
        }
        tracing::info!(session_id = %self.id, "Destroyed client after failed login");

        if !self.host.config.settings().suppress_notifications {
            let message = match error {
                ConnectionError::ClientNotFound => "No Discord client detected".to_string(),
                other => format!("Couldn't connect to Discord via RPC: {other}"),
            };
            self.host.status.notify(Notification::error(message));
        }
        self.host.status.show(StatusItem::reconnect());
        state
    }

    /// The connection announced readiness on its own (e.g. after the remote
    /// side came back). Logins in flight handle their own readiness.
    async fn on_ready(&self) {
        let reenable = {
            let _gate = self.gate.lock().await;
            if !self.connection.is_connected() {
                tracing::debug!(session_id = %self.id, "Ignoring stale ready event");
                return;
            }
            let mut state = self.state.lock().await;
            if state.connection != ConnectionState::Disconnected {
                return;
            }
            self.transition(&mut state, Event::Ready);
            self.host.status.show(StatusItem::connected());
            tracing::info!(session_id = %self.id, "Connection became ready");
            state.enabled
        };

        if reenable {
            self.enable().await;
        }
    }

    async fn on_disconnected(&self) {
        let _gate = self.gate.lock().await;
        if self.connection.is_connected() {
            tracing::debug!(session_id = %self.id, "Ignoring stale disconnect event");
            return;
        }
        let mut state = self.state.lock().await;
        if state.connection.is_destroyed() {
            return;
        }
        if !state.connection.is_released() {
            self.transition(&mut state, Event::Disconnected);
        }
        self.host.status.show(StatusItem::reconnect());
        tracing::warn!(session_id = %self.id, "Lost connection to presence service");
    }

    fn transition(&self, state: &mut SessionState, event: Event) -> ConnectionState {
        let from = state.connection;
        let to = from.on_event(event);
        if from != to {
            tracing::debug!(session_id = %self.id, %from, %to, ?event, "Session state changed");
        }
        state.connection = to;
        if to.is_released() {
            state.release();
            self.throttle.reset();
        }
        to
    }

    // --- Dispatch ---

    /// Recomputes the activity from the previous one and sends it.
    ///
    /// Suppressed (returns `Ok(None)`) unless the session is enabled and
    /// connected. Concurrent calls are last-write-wins on the stored activity.
    pub async fn dispatch(
        &self,
        kind: ActivityKind,
    ) -> Result<Option<ActivityReceipt>, ConnectionError> {
        let _sending = self.sending.lock().await;
        self.send_activity(kind).await
    }

    async fn send_activity(
        &self,
        kind: ActivityKind,
    ) -> Result<Option<ActivityReceipt>, ConnectionError> {
        let previous = {
            let state = self.state.lock().await;
            if !state.can_dispatch() {
                tracing::trace!(session_id = %self.id, state = %state.connection, enabled = state.enabled, "Dispatch suppressed");
                return Ok(None);
            }
            state.activity.clone()
        };

        let next = self.host.builder.build(&previous, kind).await;

        {
            let mut state = self.state.lock().await;
            if !state.can_dispatch() {
                return Ok(None);
            }
            state.activity = next.clone();
        }

        tracing::debug!(session_id = %self.id, ?kind, details = ?next.details, "Sending activity");
        self.connection
            .set_activity(&next)
            .await
            .inspect_err(|e| tracing::warn!(session_id = %self.id, error = %e, "Failed to send activity"))
    }

    /// Throttled dispatch, for bursts of minor editor changes.
    pub fn request_dispatch(&self) {
        self.throttle.trigger();
    }

    /// Trailing firing of the throttle. Skipped when an immediate dispatch
    /// started after the throttle fired.
    async fn dispatch_throttled(&self, generation: u64) {
        let _sending = self.sending.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(session_id = %self.id, "Dropping throttled dispatch superseded by an immediate one");
            return;
        }
        // Failures are logged by send_activity.
        let _ = self.send_activity(ActivityKind::Active).await;
    }

    /// Immediate dispatch that supersedes any throttled one still pending
    /// or waiting to send.
    async fn dispatch_now(&self, kind: ActivityKind) {
        self.throttle.reset();
        self.generation.fetch_add(1, Ordering::SeqCst);
        let _ = self.dispatch(kind).await;
    }

    /// Sends a fresh activity and, when the subscriptions were released
    /// meanwhile, starts listening again. Does nothing unless enabled and connected.
    async fn refresh(&self) {
        let listening = {
            let state = self.state.lock().await;
            if !state.can_dispatch() {
                return;
            }
            !state.subscriptions.is_empty()
        };

        self.dispatch_now(ActivityKind::Active).await;
        if !listening {
            self.start_listening().await;
        }
    }

    async fn is_listening(&self) -> bool {
        !self.state.lock().await.subscriptions.is_empty()
    }

    // --- Idle / focus ---

    async fn on_window_state(&self, focused: bool) {
        let Some(policy) = IdlePolicy::from_settings(&self.host.config.settings()) else {
            return;
        };

        let mut state = self.state.lock().await;
        if !state.enabled {
            return;
        }

        if focused {
            if state.idle.disarm() {
                tracing::debug!(session_id = %self.id, "Focus regained, idle timer cancelled");
            }
            drop(state);
            self.dispatch_now(ActivityKind::Active).await;
            return;
        }

        let session = self.weak.clone();
        let armed = state.idle.arm(policy.timeout, move |deadline| async move {
            if let Some(session) = session.upgrade() {
                session.on_idle_elapsed(deadline).await;
            }
        });
        if armed {
            tracing::debug!(session_id = %self.id, timeout = ?policy.timeout, "Window lost focus, idle timer armed");
        }
    }

    async fn on_idle_elapsed(&self, deadline: Instant) {
        if !self.state.lock().await.idle.fired(deadline) {
            return;
        }
        let Some(policy) = IdlePolicy::from_settings(&self.host.config.settings()) else {
            return;
        };

        match policy.on_elapsed() {
            IdleAction::Disconnect { reset_elapsed_time } => {
                tracing::info!(session_id = %self.id, "Idle timeout reached, disabling presence");
                self.disable().await;
                if reset_elapsed_time {
                    self.state.lock().await.activity.start_timestamp = None;
                }
            }
            IdleAction::Dispatch => {
                if !self.is_enabled().await {
                    return;
                }
                tracing::debug!(session_id = %self.id, "Idle timeout reached");
                self.dispatch_now(ActivityKind::Idle).await;
            }
        }
    }

    async fn on_status_compaction(&self, deadline: Instant) {
        let mut state = self.state.lock().await;
        if state.status_compaction.fired(deadline) && state.can_dispatch() {
            self.host.status.show(StatusItem::compact());
        }
    }

    // --- Event wiring ---

    fn routes(&self, settings: &Settings) -> Vec<(EventSource, EventHandler)> {
        let mut routes = vec![
            (
                EventSource::ActiveEditor,
                self.handler(|session, _| async move {
                    session.dispatch_now(ActivityKind::Viewing).await;
                }),
            ),
            (EventSource::TextDocument, self.throttled()),
            (EventSource::Selection, self.throttled()),
            (
                EventSource::DebugStart,
                self.handler(|session, _| async move {
                    session.dispatch_now(ActivityKind::Active).await;
                }),
            ),
            (
                EventSource::DebugEnd,
                self.handler(|session, _| async move {
                    session.dispatch_now(ActivityKind::Active).await;
                }),
            ),
            (EventSource::DataSource, self.throttled()),
        ];

        if settings.problems_enabled {
            routes.push((
                EventSource::Diagnostics,
                self.handler(|session, event| async move {
                    if let EditorEvent::DiagnosticsChanged { problems } = event {
                        session.host.builder.diagnostics_changed(problems);
                    }
                }),
            ));
        }
        if settings.idle_check {
            routes.push((
                EventSource::WindowState,
                self.handler(|session, event| async move {
                    if let EditorEvent::WindowState { focused } = event {
                        session.on_window_state(focused).await;
                    }
                }),
            ));
        }
        routes
    }

    fn handler<F, Fut>(&self, react: F) -> EventHandler
    where
        F: Fn(Arc<Self>, EditorEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let session = self.weak.clone();
        Arc::new(move |event| match session.upgrade() {
            Some(session) => react(session, event).boxed(),
            None => futures_util::future::ready(()).boxed(),
        })
    }

    fn throttled(&self) -> EventHandler {
        self.handler(|session, _| async move { session.request_dispatch() })
    }
}

impl<C: Connection> Drop for Session<C> {
    fn drop(&mut self) {
        self.watcher.abort();
    }
}

fn spawn_lifecycle_watcher<C: Connection>(
    id: Uuid,
    session: Weak<Session<C>>,
    mut lifecycle: broadcast::Receiver<LifecycleEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match lifecycle.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(session_id = %id, skipped, "Missed connection lifecycle events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let Some(session) = session.upgrade() else {
                break;
            };
            tracing::trace!(session_id = %id, ?event, "Connection lifecycle event");
            match event {
                LifecycleEvent::Ready => session.on_ready().await,
                LifecycleEvent::Disconnected => session.on_disconnected().await,
            }
        }
        tracing::debug!(session_id = %id, "Lifecycle watcher finished");
    })
}
