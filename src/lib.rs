//! Core of a page-augmenting audio downloader: a download pipeline
//! orchestrator and a UI presence reconciliation loop, wired to the host
//! environment (network, document, file save) through narrow trait seams.
//!
//! The [`PresenceManager`] keeps exactly one download control mounted on
//! qualifying video pages of a mutating host document. A user action starts
//! one [`Orchestrator`] session, which resolves metadata and streams, fetches
//! the audio payload, applies the configured [`format::FormatPolicy`] and
//! hands the result to the host's save capability, pushing progress and
//! status back through the [`host::StatusSink`].

pub mod api;
pub mod application;
pub mod domain;
pub mod format;
pub mod host;
pub mod presence;
pub mod utils;

pub use api::{ApiClient, ApiConfig};
pub use application::Orchestrator;
pub use domain::{
    AppError, ErrorInfo, RequestedFormat, Result, SessionOutcome, Stage, StreamDescriptor,
    VideoIdentity,
};
pub use format::FormatPolicy;
pub use presence::{PresenceManager, CONTROL_ID};
