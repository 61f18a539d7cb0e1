//! Topological Racing - Simulation core
//!
//! A car racing on a rectangle whose edges are glued into a torus, a Klein
//! bottle or the projective plane. Every entity is drawn once per tile of a
//! 6x6 window so the wrapped space looks continuous; the race loop is
//! single-threaded and frame-stepped.

pub mod error;
pub mod game_server;
pub mod topology;

pub use error::{Error, Result};
pub use game_server::{GameServer, GameState, RaceConfig};
pub use topology::{Surface, Topology};
