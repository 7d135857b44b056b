use std::sync::Arc;

use presence_bridge::{
    App, Host,
    activity::BasicActivityBuilder,
    commands::CommandId,
    config::{ConfigSource, InMemoryConfig, JsonConfig},
    connection::StdoutConnection,
    events::{EditorEvent, EditorEvents},
    status::TracingStatusSink,
};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};

// One JSON object per stdin line, e.g.
//   {"event":"active_editor_changed","file_name":"main.rs","language_id":"rust"}
//   {"event":"window_state","focused":false}
//   {"command":"vscord.reconnect"}
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HostInput {
    Command { command: CommandId },
    Event(EditorEvent),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config: Arc<dyn ConfigSource> = match std::env::args().nth(1) {
        Some(path) => Arc::new(JsonConfig::new(path)),
        None => Arc::new(InMemoryConfig::default()),
    };
    let settings = config.settings();

    // Activities go to stdout, logs to stderr.
    tracing_subscriber::fmt()
        .with_max_level(if settings.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let builder = Arc::new(BasicActivityBuilder::new());
    let events = Arc::new(EditorEvents::new());
    let host = Host {
        status: Arc::new(TracingStatusSink),
        config,
        builder: builder.clone(),
        events: events.clone(),
    };
    let connection = Arc::new(StdoutConnection::new(settings.application_id()));

    let app = App::activate(connection, host).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::info!("Host input closed, shutting down");
                    break;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match serde_json::from_str::<HostInput>(line) {
                    Ok(HostInput::Command { command }) => app.commands().run(command).await,
                    Ok(HostInput::Event(event)) => {
                        builder.observe(&event);
                        let listeners = events.emit(event);
                        tracing::trace!(listeners, "Editor event published");
                    }
                    Err(e) => tracing::warn!("Failed to parse host input: {}. Raw: '{}'", e, line),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, initiating graceful shutdown...");
                break;
            }
        }
    }

    app.deactivate().await;
    Ok(())
}
