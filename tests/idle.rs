mod common;

use std::time::Duration;

use common::{Harness, settle, wait};
use presence_bridge::{
    activity::ActivityKind,
    config::Settings,
    events::EditorEvent,
    session::ConnectionState,
};

fn idle_settings(timeout_secs: u64) -> Settings {
    Settings {
        idle_timeout_secs: timeout_secs,
        ..Settings::default()
    }
}

async fn blur(h: &Harness) {
    h.emit(EditorEvent::WindowState { focused: false });
    settle().await;
}

async fn focus(h: &Harness) {
    h.emit(EditorEvent::WindowState { focused: true });
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn losing_focus_dispatches_idle_after_timeout() {
    let h = Harness::new(idle_settings(60));
    h.session.enable().await;
    settle().await;

    blur(&h).await;
    assert!(h.session.snapshot().await.idle_armed);

    wait(Duration::from_secs(59)).await;
    assert_eq!(h.builder.count(ActivityKind::Idle), 0);

    wait(Duration::from_secs(2)).await;
    assert_eq!(h.builder.count(ActivityKind::Idle), 1);
    assert!(!h.session.snapshot().await.idle_armed);
    assert!(h.session.is_enabled().await);
}

#[tokio::test(start_paused = true)]
async fn regaining_focus_cancels_the_idle_timer() {
    let h = Harness::new(idle_settings(60));
    h.session.enable().await;
    settle().await;

    blur(&h).await;
    wait(Duration::from_secs(30)).await;
    focus(&h).await;

    assert!(!h.session.snapshot().await.idle_armed);
    assert_eq!(h.builder.count(ActivityKind::Active), 2);

    wait(Duration::from_secs(120)).await;
    assert_eq!(h.builder.count(ActivityKind::Idle), 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_blur_keeps_the_first_deadline() {
    let h = Harness::new(idle_settings(60));
    h.session.enable().await;
    settle().await;

    blur(&h).await;
    wait(Duration::from_secs(40)).await;
    blur(&h).await;
    wait(Duration::from_secs(21)).await;

    assert_eq!(h.builder.count(ActivityKind::Idle), 1);
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_turns_idle_detection_off() {
    let h = Harness::new(idle_settings(0));
    h.session.enable().await;
    settle().await;

    blur(&h).await;

    assert!(!h.session.snapshot().await.idle_armed);
    wait(Duration::from_secs(600)).await;
    assert_eq!(h.builder.count(ActivityKind::Idle), 0);
}

#[tokio::test(start_paused = true)]
async fn disconnect_on_idle_disables_and_resets_elapsed_time() {
    let h = Harness::new(Settings {
        idle_timeout_secs: 60,
        disconnect_on_idle: true,
        reset_elapsed_time: true,
        ..Settings::default()
    });
    h.session.enable().await;
    settle().await;
    assert!(h.session.activity().await.start_timestamp.is_some());

    blur(&h).await;
    wait(Duration::from_secs(61)).await;

    let snapshot = h.session.snapshot().await;
    assert!(!snapshot.enabled);
    assert_eq!(snapshot.state, ConnectionState::Disconnected);
    assert!(snapshot.subscriptions.is_empty());
    assert_eq!(snapshot.pending_timers(), 0);
    assert_eq!(h.connection.clears(), 1);
    assert_eq!(h.session.activity().await.start_timestamp, None);
    assert_eq!(h.builder.count(ActivityKind::Idle), 0);

    assert_eq!(h.emit(EditorEvent::TextDocumentChanged), 0);
    wait(Duration::from_secs(5)).await;
    assert_eq!(h.connection.sent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn disconnect_on_idle_keeps_elapsed_time_by_default() {
    let h = Harness::new(Settings {
        idle_timeout_secs: 60,
        disconnect_on_idle: true,
        ..Settings::default()
    });
    h.session.enable().await;
    settle().await;
    let started = h.session.activity().await.start_timestamp;

    blur(&h).await;
    wait(Duration::from_secs(61)).await;

    assert!(!h.session.is_enabled().await);
    assert_eq!(h.session.activity().await.start_timestamp, started);
}

#[tokio::test(start_paused = true)]
async fn disable_cancels_a_pending_idle_timer() {
    let h = Harness::new(idle_settings(60));
    h.session.enable().await;
    settle().await;

    blur(&h).await;
    h.session.disable().await;

    assert!(!h.session.snapshot().await.idle_armed);
    wait(Duration::from_secs(120)).await;
    assert_eq!(h.builder.count(ActivityKind::Idle), 0);
}
