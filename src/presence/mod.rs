//! Keeps exactly one download control mounted on qualifying pages.
//!
//! The host document replaces large subtrees without full page loads, so
//! presence is reconciled from three independent triggers feeding the same
//! idempotent entry point: startup, debounced mutation notifications, and a
//! fixed-interval backstop for mutations the observer misses.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::host::HostDocument;
use crate::utils::parse_video_page;

/// Well-known element id; mounting is keyed on it, which prevents duplicates
/// even under concurrent reconciliation.
pub const CONTROL_ID: &str = "bili-audio-capture-control";

/// Backstop reconciliation period.
const BACKSTOP_INTERVAL: Duration = Duration::from_millis(1500);

/// Mutation bursts coalesce into at most one reconciliation per window.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(200);

/// Process-wide UI attachment state. Owned here; the orchestrator never reads
/// it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UiState {
    pub mounted: bool,
    pub host_anchor_alive: bool,
}

pub struct PresenceManager {
    document: Arc<dyn HostDocument>,
    state: Mutex<UiState>,
}

impl PresenceManager {
    pub fn new(document: Arc<dyn HostDocument>) -> Self {
        Self {
            document,
            state: Mutex::new(UiState::default()),
        }
    }

    pub fn ui_state(&self) -> UiState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reconcile control presence with the current page.
    ///
    /// Idempotent: on an unchanged qualifying page, N calls leave exactly one
    /// control mounted. On non-qualifying pages any mounted control is
    /// removed and local UI state cleared.
    pub fn ensure_presence(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let qualifying = parse_video_page(&self.document.current_address()).is_some();
        state.host_anchor_alive = self.document.control_attached(CONTROL_ID);

        if !qualifying {
            if state.mounted || state.host_anchor_alive {
                log::debug!("left qualifying page, removing control");
                self.document.remove_control(CONTROL_ID);
            }
            *state = UiState::default();
            return;
        }

        if state.host_anchor_alive {
            // A valid control is already attached; mounting is a no-op.
            state.mounted = true;
            return;
        }

        match self.document.mount_control(CONTROL_ID) {
            Ok(()) => {
                log::debug!("mounted download control");
                *state = UiState {
                    mounted: true,
                    host_anchor_alive: true,
                };
            }
            Err(e) => {
                log::warn!("failed to mount download control: {e}");
                *state = UiState::default();
            }
        }
    }

    /// Run the reconciliation loop until `cancel` fires.
    ///
    /// Reconciles once at startup, then on every debounced mutation burst,
    /// and unconditionally on the backstop tick while the document is
    /// visible.
    pub async fn run(&self, cancel: CancellationToken) {
        self.ensure_presence();

        let mut mutations = Some(self.document.subscribe_mutations());
        let mut backstop = tokio::time::interval(BACKSTOP_INTERVAL);
        backstop.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let mutation_event = async {
                match mutations.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                event = mutation_event => match event {
                    Some(()) => {
                        // Trailing-edge debounce: sleep out the window, then
                        // drain whatever else the burst produced.
                        tokio::time::sleep(DEBOUNCE_WINDOW).await;
                        if let Some(rx) = mutations.as_mut() {
                            while rx.try_recv().is_ok() {}
                        }
                        self.ensure_presence();
                    }
                    None => {
                        // Host dropped the subscription; the backstop timer
                        // keeps reconciliation alive.
                        mutations = None;
                    }
                },
                _ = backstop.tick() => {
                    if self.document.is_visible() {
                        self.ensure_presence();
                    }
                }
            }
        }
    }
}
