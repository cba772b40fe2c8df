// Error taxonomy for the Risset generator.
//
// Two failure families reach callers. Configuration errors are raised by
// `config.rs` and `tempo.rs` before any simulation step runs, so a bad
// request never produces partial output. Degenerate-layer errors are raised
// by `arc.rs` when the duration filter leaves a layer with no playable note.
// Everything else (very dense or very sparse layers) is handled by policy in
// `duration.rs` and `velocity.rs` and is not an error.
//
// The two I/O-flavoured variants only come from `RissetConfig::load` and
// `RissetConfig::from_json`.

use crate::velocity::LayerRole;
use thiserror::Error;

/// Errors produced while configuring or running a generation.
#[derive(Debug, Error)]
pub enum RissetError {
    /// A configuration field is out of range. Detected before generation.
    #[error("invalid configuration field '{field}': {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    /// A layer lost every note to the duration filter.
    #[error("{role} layer in metabar {metabar} has no playable notes")]
    DegenerateLayer { role: LayerRole, metabar: usize },

    #[error("failed to read configuration file: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl RissetError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        RissetError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// True for errors that a caller can fix by changing the request.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RissetError::InvalidConfig { .. } | RissetError::ConfigParse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RissetError>;
