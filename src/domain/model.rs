/// One segment of a multi-part upload. `index` is 1-based, matching the
/// page's `p=` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoPart {
    pub content_id: u64,
    pub index: u32,
}

/// Resolved identity of the video behind the current page.
///
/// Immutable once resolved; scoped to a single download session.
#[derive(Debug, Clone)]
pub struct VideoIdentity {
    pub id: String,
    pub content_id: u64,
    pub title: String,
    pub parts: Vec<VideoPart>,
}

impl VideoIdentity {
    /// Content id for the requested part, falling back to the primary content
    /// id when no part is requested or the index is out of range.
    pub fn content_id_for_part(&self, part: Option<u32>) -> u64 {
        part.and_then(|n| self.parts.iter().find(|p| p.index == n))
            .map(|p| p.content_id)
            .unwrap_or(self.content_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamContainer {
    DashAudio,
    Legacy,
}

/// One available audio stream. The resolver returns these in descending
/// bandwidth order; the orchestrator always takes the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub url: String,
    pub bandwidth_bits_per_sec: u64,
    pub container: StreamContainer,
}

/// Output format requested by the user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedFormat {
    Native,
    Alt,
}

/// Pipeline stages. `Complete` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    FetchingMetadata,
    ResolvingStream,
    Downloading,
    Processing,
    Saving,
    Complete,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }

    /// Fixed percentage band owned by this stage.
    pub fn progress_band(self) -> (u8, u8) {
        match self {
            Stage::Idle => (0, 0),
            Stage::FetchingMetadata => (0, 15),
            Stage::ResolvingStream => (15, 25),
            Stage::Downloading => (25, 70),
            Stage::Processing => (70, 90),
            Stage::Saving => (90, 100),
            Stage::Complete => (100, 100),
            Stage::Failed => (0, 0),
        }
    }
}

/// Where and why a session failed, in user-presentable form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub stage: Stage,
    pub message: String,
}

/// Terminal result of one download session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed { file_name: String },
    Failed(ErrorInfo),
    Cancelled,
}

/// One in-flight download. Owned exclusively by the orchestrator; at most one
/// non-terminal session exists at a time (cooperatively enforced by the
/// caller disabling its trigger control).
#[derive(Debug, Clone)]
pub struct DownloadSession {
    pub session_id: u64,
    pub stage: Stage,
    pub requested_format: RequestedFormat,
    pub progress_percent: u8,
    pub last_error: Option<ErrorInfo>,
}

impl DownloadSession {
    pub fn new(session_id: u64, requested_format: RequestedFormat) -> Self {
        Self {
            session_id,
            stage: Stage::Idle,
            requested_format,
            progress_percent: 0,
            last_error: None,
        }
    }
}

/// Identifiers parsed from a qualifying page address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub video_id: String,
    pub part: Option<u32>,
}
