pub mod subscription;

use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use subscription::{EventHandler, Subscription, SubscriptionSet};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// One independent stream of editor notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    ActiveEditor,
    TextDocument,
    Selection,
    DebugStart,
    DebugEnd,
    Diagnostics,
    WindowState,
    DataSource,
}

impl EventSource {
    pub const ALL: [EventSource; 8] = [
        EventSource::ActiveEditor,
        EventSource::TextDocument,
        EventSource::Selection,
        EventSource::DebugStart,
        EventSource::DebugEnd,
        EventSource::Diagnostics,
        EventSource::WindowState,
        EventSource::DataSource,
    ];
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventSource::ActiveEditor => "active_editor",
            EventSource::TextDocument => "text_document",
            EventSource::Selection => "selection",
            EventSource::DebugStart => "debug_start",
            EventSource::DebugEnd => "debug_end",
            EventSource::Diagnostics => "diagnostics",
            EventSource::WindowState => "window_state",
            EventSource::DataSource => "data_source",
        };
        f.write_str(name)
    }
}

/// A notification produced by the host editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EditorEvent {
    ActiveEditorChanged {
        #[serde(default)]
        file_name: Option<String>,
        #[serde(default)]
        language_id: Option<String>,
    },
    TextDocumentChanged,
    SelectionChanged,
    DebugSessionStarted,
    DebugSessionTerminated,
    DiagnosticsChanged {
        #[serde(default)]
        problems: usize,
    },
    WindowState {
        focused: bool,
    },
    DataSourceUpdated {
        #[serde(default)]
        workspace: Option<String>,
    },
}

impl EditorEvent {
    pub fn source(&self) -> EventSource {
        match self {
            EditorEvent::ActiveEditorChanged { .. } => EventSource::ActiveEditor,
            EditorEvent::TextDocumentChanged => EventSource::TextDocument,
            EditorEvent::SelectionChanged => EventSource::Selection,
            EditorEvent::DebugSessionStarted => EventSource::DebugStart,
            EditorEvent::DebugSessionTerminated => EventSource::DebugEnd,
            EditorEvent::DiagnosticsChanged { .. } => EventSource::Diagnostics,
            EditorEvent::WindowState { .. } => EventSource::WindowState,
            EditorEvent::DataSourceUpdated { .. } => EventSource::DataSource,
        }
    }
}

/// Host-side event hub. Each source has its own broadcast channel, so events
/// of one source reach listeners in the order they were emitted.
#[derive(Debug)]
pub struct EditorEvents {
    channels: HashMap<EventSource, broadcast::Sender<EditorEvent>>,
}

impl EditorEvents {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let channels = EventSource::ALL
            .into_iter()
            .map(|source| {
                let (sender, _) = broadcast::channel(capacity);
                (source, sender)
            })
            .collect();
        Self { channels }
    }

    /// Publishes an event to every listener of its source.
    /// Returns the number of listeners that received it.
    pub fn emit(&self, event: EditorEvent) -> usize {
        let source = event.source();
        match self.channels.get(&source) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn subscribe(&self, source: EventSource) -> broadcast::Receiver<EditorEvent> {
        match self.channels.get(&source) {
            Some(sender) => sender.subscribe(),
            // Every source gets a channel in `with_capacity`.
            None => broadcast::channel(1).1,
        }
    }

    pub fn listener_count(&self, source: EventSource) -> usize {
        self.channels
            .get(&source)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }
}

impl Default for EditorEvents {
    fn default() -> Self {
        Self::new()
    }
}
