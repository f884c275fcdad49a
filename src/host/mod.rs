//! Capabilities consumed from the host environment.
//!
//! The pipeline never talks to the real document, dialog or filesystem
//! directly; everything goes through these seams so the orchestrator and the
//! presence manager can be driven (and tested) independently.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{Result, SessionOutcome};

/// Persists an in-memory payload through the host's one-shot save capability.
#[async_trait]
pub trait FileSaver: Send + Sync {
    async fn save(&self, bytes: &[u8], file_name: &str, content_type: &str) -> Result<()>;
}

/// The host document: address, visibility, mutation notifications and the
/// insertion point for the download control.
pub trait HostDocument: Send + Sync {
    /// Current page address, parsed by the pipeline via the `/video/{id}`
    /// pattern.
    fn current_address(&self) -> String;

    /// Whether the document is currently visible to the user. The presence
    /// backstop timer skips reconciliation while hidden.
    fn is_visible(&self) -> bool;

    /// Subscribe to content-mutation notifications. One message per observed
    /// mutation burst; the subscription ends when the host drops the sender.
    fn subscribe_mutations(&self) -> mpsc::UnboundedReceiver<()>;

    /// Whether a control with the given id is still attached to the document.
    fn control_attached(&self, control_id: &str) -> bool;

    /// Attach the control at the host's insertion point. Must be a no-op if a
    /// control with this id is already attached.
    fn mount_control(&self, control_id: &str) -> Result<()>;

    /// Detach the control, if present.
    fn remove_control(&self, control_id: &str);
}

/// Narrow status interface between the orchestrator and whatever UI the
/// presence manager currently has mounted. The orchestrator never reads UI
/// state; it only pushes through here.
pub trait StatusSink: Send + Sync {
    /// Aggregate session progress, 0..=100. Monotonically non-decreasing
    /// within a session except on failure, where it resets to 0.
    fn on_progress(&self, percent: u8);

    /// Single-line user-visible status message.
    fn on_status(&self, message: &str);

    /// Terminal outcome; the trigger control re-enables on this signal
    /// regardless of which stage failed.
    fn on_terminal(&self, outcome: &SessionOutcome);
}
