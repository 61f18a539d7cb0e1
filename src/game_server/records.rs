//! Records - Best-run persistence per map, surface and player
//!
//! Layout: `<root>/<map>/<surface>/record<player>.json`. A record is only
//! replaced by a strictly faster run.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::game_server::maps::MapId;
use crate::game_server::race::{RaceOutcome, TrajectorySample};
use crate::topology::Topology;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceRecord {
    pub map: String,
    #[serde(alias = "space")]
    pub surface: String,
    pub player: String,
    pub trajectory: Vec<TrajectorySample>,
    pub final_time: f32,
}

impl RaceRecord {
    pub fn new(map: MapId, topology: Topology, player: &str, outcome: RaceOutcome) -> Self {
        Self {
            map: map.name().to_string(),
            surface: topology.name().to_string(),
            player: player.to_string(),
            trajectory: outcome.trajectory,
            final_time: outcome.final_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player: String,
    pub final_time: f32,
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the directory of every map and surface pair
    pub fn ensure_layout(&self) -> Result<()> {
        for map in MapId::ALL {
            for topology in Topology::ALL {
                fs::create_dir_all(self.dir(map.name(), topology.name()))?;
            }
        }
        Ok(())
    }

    fn dir(&self, map: &str, surface: &str) -> PathBuf {
        self.root.join(map).join(surface)
    }

    fn file(&self, map: &str, surface: &str, player: &str) -> PathBuf {
        self.dir(map, surface).join(format!("record{player}.json"))
    }

    pub fn path(&self, map: MapId, topology: Topology, player: &str) -> PathBuf {
        self.file(map.name(), topology.name(), player)
    }

    pub fn load(&self, map: MapId, topology: Topology, player: &str) -> Result<RaceRecord> {
        self.read(&self.path(map, topology, player)).map_err(|err| match err {
            Error::Io(io) if io.kind() == ErrorKind::NotFound => Error::MissingRecord {
                map: map.name().to_string(),
                surface: topology.name().to_string(),
                player: player.to_string(),
            },
            other => other,
        })
    }

    fn read(&self, path: &Path) -> Result<RaceRecord> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Writes `record` unless an equal or faster one is already stored.
    /// Returns whether the file was written.
    pub fn save(&self, record: &RaceRecord) -> Result<bool> {
        let path = self.file(&record.map, &record.surface, &record.player);
        match self.read(&path) {
            Ok(existing) if existing.final_time <= record.final_time => {
                log::debug!(
                    "kept record {:.2}s for {}; new run took {:.2}s",
                    existing.final_time,
                    record.player,
                    record.final_time
                );
                return Ok(false);
            }
            Ok(_) => {}
            Err(Error::Io(err)) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => log::warn!("overwriting unreadable record {}: {}", path.display(), err),
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(record)?)?;
        log::info!(
            "saved record {:.2}s for {} on {}/{}",
            record.final_time,
            record.player,
            record.map,
            record.surface
        );
        Ok(true)
    }

    /// Stored times for one map and surface, fastest first.
    pub fn leaderboard(&self, map: MapId, topology: Topology) -> Result<Vec<LeaderboardEntry>> {
        let dir = self.dir(map.name(), topology.name());
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut board = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read(&path) {
                Ok(record) => board.push(LeaderboardEntry {
                    player: record.player,
                    final_time: record.final_time,
                }),
                Err(err) => log::warn!("skipping record {}: {}", path.display(), err),
            }
        }
        board.sort_by(|a, b| a.final_time.total_cmp(&b.final_time));
        Ok(board)
    }
}

/// `m:ss`, rounded to whole seconds
pub fn format_time(seconds: f32) -> String {
    let total = seconds.max(0.0).round() as u32;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn outcome(final_time: f32) -> RaceOutcome {
        let trajectory = (1..=4)
            .map(|i| TrajectorySample {
                x: i as f32,
                y: 2.0,
                heading: 0.0,
                t: final_time * i as f32 / 4.0,
            })
            .collect();
        RaceOutcome {
            final_time,
            trajectory,
        }
    }

    fn record(player: &str, final_time: f32) -> RaceRecord {
        RaceRecord::new(MapId::ZHomology, Topology::KleinBottleH, player, outcome(final_time))
    }

    #[test]
    fn ensure_layout_creates_every_pair() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());
        store.ensure_layout().unwrap();
        for map in MapId::ALL {
            for topology in Topology::ALL {
                assert!(tmp.path().join(map.name()).join(topology.name()).is_dir());
            }
        }
    }

    #[test]
    fn only_strictly_faster_runs_replace_a_record() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());

        assert!(store.save(&record("ana", 80.0)).unwrap());
        assert!(!store.save(&record("ana", 80.0)).unwrap());
        assert!(!store.save(&record("ana", 95.5)).unwrap());
        assert!(store.save(&record("ana", 71.25)).unwrap());

        let loaded = store
            .load(MapId::ZHomology, Topology::KleinBottleH, "ana")
            .unwrap();
        assert_eq!(loaded.final_time, 71.25);
        assert_eq!(loaded, record("ana", 71.25));
    }

    #[test]
    fn file_uses_the_persisted_field_names() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());
        store.save(&record("bo", 12.0)).unwrap();

        let path = store.path(MapId::ZHomology, Topology::KleinBottleH, "bo");
        assert!(path.ends_with("z-homology/klein/recordbo.json"));
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["finalTime"], 12.0);
        assert_eq!(json["surface"], "klein");
        assert!(json["trajectory"][0].get("angle").is_some());
    }

    #[test]
    fn missing_record_is_reported() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());
        let err = store
            .load(MapId::PseudoCircle, Topology::Torus, "ghost")
            .unwrap_err();
        assert!(matches!(err, Error::MissingRecord { ref player, .. } if player == "ghost"));
    }

    #[test]
    fn leaderboard_sorts_numerically_and_skips_garbage() {
        let tmp = TempDir::new().unwrap();
        let store = RecordStore::new(tmp.path());
        store.save(&record("slow", 600.0)).unwrap();
        store.save(&record("fast", 65.0)).unwrap();
        store.save(&record("mid", 130.0)).unwrap();

        let dir = tmp.path().join("z-homology").join("klein");
        fs::write(dir.join("recordbroken.json"), "{ not json").unwrap();

        let board = store
            .leaderboard(MapId::ZHomology, Topology::KleinBottleH)
            .unwrap();
        let names: Vec<&str> = board.iter().map(|e| e.player.as_str()).collect();
        assert_eq!(names, ["fast", "mid", "slow"]);

        assert!(store
            .leaderboard(MapId::PseudoCircle, Topology::Torus)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.4), "1:05");
        assert_eq!(format_time(600.0), "10:00");
    }
}
