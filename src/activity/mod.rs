pub mod basic;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use basic::{BasicActivityBuilder, EditorSnapshot};

/// The presence payload relayed to the remote service.
///
/// Treated as an immutable value by the session: every dispatch replaces it
/// wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_timestamp: Option<DateTime<Utc>>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_image_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub small_image_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<ActivityButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_max: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityButton {
    pub label: String,
    pub url: String,
}

/// Flavour of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Active,
    Viewing,
    Idle,
}

/// Maps editor context onto a presence payload.
#[async_trait]
pub trait ActivityBuilder: Send + Sync {
    /// Computes the next payload. `previous` is the last payload sent, so
    /// fields such as the elapsed-time origin can be carried over.
    async fn build(&self, previous: &Activity, kind: ActivityKind) -> Activity;

    /// Called when the editor's diagnostics change; the new count is picked up
    /// by the next `build`.
    fn diagnostics_changed(&self, _problems: usize) {}
}
