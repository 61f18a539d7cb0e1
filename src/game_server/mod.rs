//! Game Server Module
//!
//! Car dynamics, terrain, the race state machine and the tick loop that
//! drives them over a topological surface.

pub mod car;
pub mod input;
pub mod maps;
pub mod race;
pub mod records;
pub mod simulation;
pub mod terrain;

pub use car::{Car, CarConfig, CarSnapshot, CarState, GripFalloff};
pub use input::{Control, InputState};
pub use maps::{MapId, Track};
pub use race::{
    FinishLine, RaceConfig, RaceController, RaceEvent, RaceOutcome, RaceSnapshot, RaceStatus,
    Rival, TrajectorySample,
};
pub use records::{format_time, LeaderboardEntry, RaceRecord, RecordStore};
pub use simulation::{Camera, FrameClock, GameServer, GameState, ServerStats, SimulationSnapshot};
pub use terrain::{Ground, RegionId, TerrainRegion, TrackQuery};
