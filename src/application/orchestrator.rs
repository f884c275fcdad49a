use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::domain::{
    AppError, DownloadSession, ErrorInfo, RequestedFormat, Result, SessionOutcome, Stage,
};
use crate::format::{self, FormatPolicy};
use crate::host::{FileSaver, HostDocument, StatusSink};
use crate::utils::{parse_video_page, sanitize_filename};

/// How long terminal feedback stays visible before the UI resets.
const FEEDBACK_WINDOW: Duration = Duration::from_secs(3);

/// Drives one download session end-to-end:
/// `Idle → FetchingMetadata → ResolvingStream → Downloading → Processing →
/// Saving → Complete`, with `Failed` absorbing from any non-terminal stage.
///
/// The orchestrator owns the session exclusively and never queues; the caller
/// keeps its trigger control disabled while a session is non-terminal. All UI
/// communication goes through the narrow [`StatusSink`] seam.
pub struct Orchestrator {
    api: ApiClient,
    policy: FormatPolicy,
    document: Arc<dyn HostDocument>,
    saver: Arc<dyn FileSaver>,
    sink: Arc<dyn StatusSink>,
    next_session_id: AtomicU64,
    active_session: Arc<AtomicU64>,
}

impl Orchestrator {
    pub fn new(
        api: ApiClient,
        policy: FormatPolicy,
        document: Arc<dyn HostDocument>,
        saver: Arc<dyn FileSaver>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            api,
            policy,
            document,
            saver,
            sink,
            next_session_id: AtomicU64::new(1),
            active_session: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run one download session to a terminal outcome.
    ///
    /// Leaf failures are not retried; a retry is the user clicking again.
    /// `cancel` is honored at every suspension point. The terminal signal is
    /// emitted on every exit path so trigger controls always re-enable.
    pub async fn run_download(
        &self,
        requested: RequestedFormat,
        cancel: CancellationToken,
    ) -> SessionOutcome {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        self.active_session.store(session_id, Ordering::Relaxed);
        let mut session = DownloadSession::new(session_id, requested);
        let mut tracker = ProgressTracker::new(self.sink.as_ref());
        self.sink.on_progress(0);

        let outcome = match self.drive(&mut session, &mut tracker, &cancel).await {
            Ok(file_name) => {
                session.stage = Stage::Complete;
                session.progress_percent = 100;
                self.sink.on_status("Download complete");
                SessionOutcome::Completed { file_name }
            }
            Err(AppError::Cancelled) => {
                log::info!("session {} cancelled at {:?}", session_id, session.stage);
                session.stage = Stage::Failed;
                session.progress_percent = 0;
                self.sink.on_progress(0);
                self.sink.on_status("Download cancelled");
                SessionOutcome::Cancelled
            }
            Err(e) => {
                let info = ErrorInfo {
                    stage: session.stage,
                    message: e.to_string(),
                };
                log::warn!(
                    "session {} failed at {:?}: {}",
                    session_id,
                    info.stage,
                    info.message
                );
                session.stage = Stage::Failed;
                session.progress_percent = 0;
                session.last_error = Some(info.clone());
                self.sink.on_progress(0);
                self.sink.on_status(&format!("Error: {e}"));
                SessionOutcome::Failed(info)
            }
        };

        // Re-enables triggers regardless of which stage failed.
        self.sink.on_terminal(&outcome);
        self.schedule_feedback_reset(session_id);
        outcome
    }

    async fn drive(
        &self,
        session: &mut DownloadSession,
        tracker: &mut ProgressTracker<'_>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let address = self.document.current_address();
        let page = parse_video_page(&address).ok_or(AppError::InvalidContext)?;

        ensure_live(cancel)?;
        session.stage = Stage::FetchingMetadata;
        self.sink.on_status("Fetching video info...");
        let identity = self.api.get_video_info(&page.video_id).await?;
        tracker.publish(Stage::FetchingMetadata, 1.0);

        ensure_live(cancel)?;
        session.stage = Stage::ResolvingStream;
        self.sink.on_status("Resolving audio stream...");
        let content_id = identity.content_id_for_part(page.part);
        let streams = self.api.get_audio_streams(&identity.id, content_id).await?;
        // Resolver order is descending bandwidth; the first entry is the pick.
        let stream = streams
            .first()
            .cloned()
            .ok_or(AppError::NoStreamsAvailable)?;
        tracker.publish(Stage::ResolvingStream, 1.0);

        ensure_live(cancel)?;
        session.stage = Stage::Downloading;
        self.sink.on_status("Downloading audio...");
        let payload = self
            .api
            .fetch_binary(
                &stream.url,
                |loaded, total| {
                    // Unknown totals hold the band at its start until done.
                    let fraction = match total {
                        Some(t) if t > 0 => loaded as f64 / t as f64,
                        _ => 0.0,
                    };
                    tracker.publish(Stage::Downloading, fraction);
                },
                cancel,
            )
            .await?;
        tracker.publish(Stage::Downloading, 1.0);

        ensure_live(cancel)?;
        session.stage = Stage::Processing;
        let decision = format::decide(self.policy, session.requested_format);
        let (bytes, extension, content_type) = if decision.transform {
            self.sink.on_status("Repackaging audio...");
            match format::transform_to_wav(&payload).await {
                Ok(t) => (t.bytes, decision.extension, decision.content_type),
                Err(e) => {
                    // The one locally-recovered error class: degrade to
                    // passthrough with the native extension for this session.
                    log::warn!("transform failed, keeping original bytes: {e}");
                    self.sink.on_status("Transform failed, saving original audio");
                    let native = format::decide(self.policy, RequestedFormat::Native);
                    (payload, native.extension, native.content_type)
                }
            }
        } else {
            (payload, decision.extension, decision.content_type)
        };
        tracker.publish(Stage::Processing, 1.0);

        ensure_live(cancel)?;
        session.stage = Stage::Saving;
        let file_name = format!("{}.{}", sanitize_filename(&identity.title), extension);
        self.sink.on_status(&format!("Saving {file_name}..."));
        self.saver.save(&bytes, &file_name, content_type).await?;
        tracker.publish(Stage::Saving, 1.0);
        session.progress_percent = tracker.last();

        Ok(file_name)
    }

    /// Clears the status line once the terminal feedback window elapses; the
    /// session is discarded with it. A retry started within the window takes
    /// over the UI, so the reset only fires while its session is still the
    /// latest one.
    fn schedule_feedback_reset(&self, session_id: u64) {
        let sink = Arc::clone(&self.sink);
        let active = Arc::clone(&self.active_session);
        tokio::spawn(async move {
            tokio::time::sleep(FEEDBACK_WINDOW).await;
            if active.load(Ordering::Relaxed) == session_id {
                sink.on_status("");
                sink.on_progress(0);
            }
        });
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}

/// Maps per-stage fractions into the stage's fixed percentage band and
/// republishes the aggregate. Only ever moves forward within a session.
struct ProgressTracker<'a> {
    sink: &'a dyn StatusSink,
    last: u8,
}

impl<'a> ProgressTracker<'a> {
    fn new(sink: &'a dyn StatusSink) -> Self {
        Self { sink, last: 0 }
    }

    fn publish(&mut self, stage: Stage, fraction: f64) {
        let (lo, hi) = stage.progress_band();
        let span = f64::from(hi - lo);
        let percent = lo + (span * fraction.clamp(0.0, 1.0)).round() as u8;
        if percent > self.last {
            self.last = percent;
            self.sink.on_progress(percent);
        }
    }

    fn last(&self) -> u8 {
        self.last
    }
}
