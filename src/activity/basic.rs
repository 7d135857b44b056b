use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use super::{Activity, ActivityBuilder, ActivityKind};
use crate::events::EditorEvent;

const DEFAULT_IMAGE: &str = "vscode";
const IDLE_IMAGE: &str = "idle";

/// What the host last told us about the editor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSnapshot {
    pub workspace: Option<String>,
    pub file_name: Option<String>,
    pub language_id: Option<String>,
    pub debugging: bool,
    pub problems: usize,
}

/// Builds plain "Editing x / in workspace y" payloads from an
/// [`EditorSnapshot`] fed by the host's events.
#[derive(Debug, Default)]
pub struct BasicActivityBuilder {
    snapshot: RwLock<EditorSnapshot>,
}

impl BasicActivityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, event: &EditorEvent) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        match event {
            EditorEvent::ActiveEditorChanged {
                file_name,
                language_id,
            } => {
                snapshot.file_name = file_name.clone();
                snapshot.language_id = language_id.clone();
            }
            EditorEvent::DebugSessionStarted => snapshot.debugging = true,
            EditorEvent::DebugSessionTerminated => snapshot.debugging = false,
            EditorEvent::DataSourceUpdated {
                workspace: Some(workspace),
            } => snapshot.workspace = Some(workspace.clone()),
            _ => {}
        }
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ActivityBuilder for BasicActivityBuilder {
    async fn build(&self, previous: &Activity, kind: ActivityKind) -> Activity {
        let snapshot = self.snapshot();
        let file = snapshot.file_name.as_deref().unwrap_or("a file");

        let details = match kind {
            ActivityKind::Idle => "Idling".to_string(),
            ActivityKind::Viewing => format!("Viewing {file}"),
            ActivityKind::Active if snapshot.debugging => format!("Debugging {file}"),
            ActivityKind::Active => format!("Editing {file}"),
        };

        let mut state = match &snapshot.workspace {
            Some(workspace) => format!("In {workspace}"),
            None => "No workspace.".to_string(),
        };
        if snapshot.problems > 0 {
            state.push_str(&format!(" - {} problems found", snapshot.problems));
        }

        let (large_image_key, small_image_key) = match kind {
            ActivityKind::Idle => (IDLE_IMAGE.to_string(), DEFAULT_IMAGE.to_string()),
            _ => (
                snapshot
                    .language_id
                    .clone()
                    .unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
                DEFAULT_IMAGE.to_string(),
            ),
        };

        Activity {
            details: Some(details),
            state: Some(state),
            start_timestamp: previous.start_timestamp.or_else(|| Some(Utc::now())),
            large_image_key: Some(large_image_key),
            large_image_text: snapshot.language_id.clone(),
            small_image_key: Some(small_image_key),
            ..Activity::default()
        }
    }

    fn diagnostics_changed(&self, problems: usize) {
        self.snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .problems = problems;
    }
}
