//! Error taxonomy of the viewer.
//!
//! Resource-level failures never escape into the render loop: they are logged
//! and handed to whoever started the load. Only the reload sequencer turns a
//! missing required result into a [`ViewerError::StageFailure`].

use thiserror::Error;

use crate::sequencer::Stage;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    /// Network or parse error for a single resource. Siblings in the same batch keep loading.
    #[error("loading {url} failed: {reason}")]
    LoadFailure { url: String, reason: String },

    /// A required stage produced no usable result; the remaining stages were skipped.
    #[error("{stage} stage failed: {reason}")]
    StageFailure { stage: Stage, reason: String },

    /// A mixer or action was queried for something the animation helper never registered.
    #[error("{0} is not registered")]
    ResourceNotRegistered(String),

    #[error("unknown {kind} '{name}'")]
    UnknownAsset { kind: &'static str, name: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
