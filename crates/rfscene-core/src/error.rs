//! Scenario error taxonomy
//!
//! Errors are recovered at the narrowest scope that keeps the run moving:
//! segment, then transmitter, then frame, then scenario. Only configuration
//! and instantiation failures abort a broader unit of work.

use crate::config::ConfigError;
use crate::stages::StageError;
use crate::tiling::TilingError;
use crate::types::{EntityId, FrameId};

/// Result type for scenario operations
pub type ScenarioResult<T> = Result<T, ScenarioError>;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transient state error: {0}")]
    TransientState(String),

    #[error("frame {frame_id}, transmitter {tx_id}, segment {segment_index}: {reason}")]
    SegmentProcessing {
        frame_id: FrameId,
        tx_id: EntityId,
        segment_index: usize,
        reason: String,
    },

    #[error("frame {frame_id} generation failed: {reason}")]
    FrameGeneration { frame_id: FrameId, reason: String },

    #[error("instantiation failed at frame {frame_id}: {reason}")]
    Instantiation { frame_id: FrameId, reason: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("tiling failed: {0}")]
    Tiling(#[from] TilingError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScenarioError {
    /// Stable error-kind string reported on process exit
    pub fn kind(&self) -> &'static str {
        match self {
            ScenarioError::Configuration(_) | ScenarioError::Config(_) => "ConfigurationError",
            ScenarioError::TransientState(_) => "TransientStateError",
            ScenarioError::SegmentProcessing { .. } | ScenarioError::Stage(_) => "SegmentProcessingError",
            ScenarioError::FrameGeneration { .. } | ScenarioError::Tiling(_) => "FrameGenerationError",
            ScenarioError::Instantiation { .. } => "InstantiationError",
            ScenarioError::Io(_) | ScenarioError::Serialization(_) => "IoError",
        }
    }

    /// Whether the error aborts the unit of work it was raised in, rather
    /// than degrading to an empty result
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScenarioError::Configuration(_)
                | ScenarioError::Config(_)
                | ScenarioError::Instantiation { .. }
                | ScenarioError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ScenarioError::from(ConfigError::MissingSection("Environment".into())).kind(),
            "ConfigurationError"
        );
        assert_eq!(
            ScenarioError::TransientState("no previous frame".into()).kind(),
            "TransientStateError"
        );
        let seg = ScenarioError::SegmentProcessing {
            frame_id: 2,
            tx_id: 1,
            segment_index: 0,
            reason: "empty message".into(),
        };
        assert_eq!(seg.kind(), "SegmentProcessingError");
        assert!(seg.to_string().contains("segment 0"));
        assert_eq!(
            ScenarioError::Instantiation { frame_id: 1, reason: "x".into() }.kind(),
            "InstantiationError"
        );
        assert_eq!(
            ScenarioError::from(TilingError::NoSegments { tx_index: 0 }).kind(),
            "FrameGenerationError"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(ScenarioError::Configuration("missing".into()).is_fatal());
        assert!(ScenarioError::Instantiation { frame_id: 1, reason: "x".into() }.is_fatal());
        assert!(!ScenarioError::FrameGeneration { frame_id: 1, reason: "x".into() }.is_fatal());
        assert!(!ScenarioError::from(StageError::EmptyMessage).is_fatal());
    }
}
