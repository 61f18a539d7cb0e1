//! Error - Failure taxonomy for the simulation core
//!
//! Geometry construction and record lookup are the only fallible paths in
//! the per-race setup; per-frame stepping never fails.

use thiserror::Error;

/// Crate result type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Degenerate geometry handed to an entity constructor.
    #[error("cannot build {shape}: needs at least {required} vertices, got {got}")]
    Construction {
        shape: &'static str,
        required: usize,
        got: usize,
    },

    #[error("ribbon has {samples} center samples but {amplitudes} amplitudes")]
    AmplitudeMismatch { samples: usize, amplitudes: usize },

    #[error("no record for player {player:?} on map {map:?} / surface {surface:?}")]
    MissingRecord {
        map: String,
        surface: String,
        player: String,
    },

    #[error("invalid trajectory: {0}")]
    InvalidTrajectory(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown topology: {0}")]
    UnknownTopology(String),

    #[error("unknown map: {0}")]
    UnknownMap(String),

    #[error("record io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}
