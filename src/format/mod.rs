//! Output format policy.
//!
//! No real transcoding happens anywhere in this crate. `Passthrough` only
//! relabels the fetched bytes; `BestEffortTransform` decodes to raw PCM and
//! re-wraps it in an uncompressed WAV container, preserving sample rate,
//! channel count and bit depth. Nothing lossy is produced.

pub mod transform;

pub use transform::{transform_to_wav, TransformedAudio};

use crate::domain::RequestedFormat;

/// Per-deployment policy for the `Alt` format request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatPolicy {
    /// Relabel only. An `Alt` request changes the file extension and declared
    /// content type without touching the bytes. Known limitation: players
    /// that strictly validate container/extension agreement may reject the
    /// file. This is deliberate, not something to silently fix.
    #[default]
    Passthrough,

    /// Decode the fetched container and re-wrap as WAV. Decode failures are
    /// recovered by the orchestrator, which falls back to Passthrough with
    /// the native extension for that session.
    BestEffortTransform,
}

/// What to do with the fetched payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDecision {
    pub extension: &'static str,
    pub content_type: &'static str,
    pub transform: bool,
}

/// Decide output extension/content type and whether the transform step runs.
pub fn decide(policy: FormatPolicy, requested: RequestedFormat) -> FormatDecision {
    match (requested, policy) {
        (RequestedFormat::Native, _) => FormatDecision {
            extension: "m4s",
            content_type: "audio/mp4",
            transform: false,
        },
        (RequestedFormat::Alt, FormatPolicy::Passthrough) => FormatDecision {
            extension: "mp3",
            content_type: "audio/mpeg",
            transform: false,
        },
        (RequestedFormat::Alt, FormatPolicy::BestEffortTransform) => FormatDecision {
            extension: "wav",
            content_type: "audio/wav",
            transform: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_is_never_transformed() {
        for policy in [FormatPolicy::Passthrough, FormatPolicy::BestEffortTransform] {
            let decision = decide(policy, RequestedFormat::Native);
            assert_eq!(decision.extension, "m4s");
            assert_eq!(decision.content_type, "audio/mp4");
            assert!(!decision.transform);
        }
    }

    #[test]
    fn alt_passthrough_only_relabels() {
        let decision = decide(FormatPolicy::Passthrough, RequestedFormat::Alt);
        assert_eq!(decision.extension, "mp3");
        assert!(!decision.transform);
    }

    #[test]
    fn alt_transform_targets_wav() {
        let decision = decide(FormatPolicy::BestEffortTransform, RequestedFormat::Alt);
        assert_eq!(decision.extension, "wav");
        assert_eq!(decision.content_type, "audio/wav");
        assert!(decision.transform);
    }
}
