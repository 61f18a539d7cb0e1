//! Race - Race configuration, finish line and lap state machine
//!
//! The first crossing of the finish line starts the clock, every later armed
//! crossing counts a lap, and the crossing made on the last lap finishes the
//! race. After any crossing the line stays disarmed until the car has moved
//! far enough away from it.

use std::fs;
use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::game_server::car::{CarConfig, CarState};
use crate::game_server::maps::MapId;
use crate::topology::{EntityStyle, PolygonEntity, RenderSurface, Ribbon, Surface, TileTier, Topology};

/// Race configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    pub topology: Topology,
    pub map: MapId,
    /// Fundamental domain extents
    pub width: f32,
    pub height: f32,
    /// Laps after the starting crossing; must be at least 1
    pub total_laps: u32,
    pub player: String,
    /// Player whose stored record is replayed as a ghost
    pub rival: Option<String>,
    pub tier: TileTier,
    /// Re-arm distance as a fraction of the surface width
    pub rearm_fraction: f32,
    /// Finish line extent along the track
    pub finish_line_size: f32,
    /// How far behind the line the car starts
    pub start_distance: f32,
    pub car: CarConfig,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            topology: Topology::Torus,
            map: MapId::ZHomology,
            width: 750.0,
            height: 750.0,
            total_laps: 3,
            player: "player".to_string(),
            rival: None,
            tier: TileTier::Full,
            rearm_fraction: 1.0 / 3.0,
            finish_line_size: 20.0,
            start_distance: 30.0,
            car: CarConfig::default(),
        }
    }
}

impl RaceConfig {
    /// Missing fields fall back to their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the race cannot be built from
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("width", self.width),
            ("height", self.height),
            ("rearm_fraction", self.rearm_fraction),
            ("finish_line_size", self.finish_line_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if !self.start_distance.is_finite() {
            return Err(Error::InvalidConfig(format!(
                "start_distance must be finite, got {}",
                self.start_distance
            )));
        }
        if self.total_laps == 0 {
            return Err(Error::InvalidConfig("total_laps must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Surface built from the topology and domain extents
    pub fn surface(&self) -> Surface {
        Surface::from_topology(self.topology, self.width, self.height)
    }

    /// Distance from the line at which it counts again
    pub fn rearm_distance(&self) -> f32 {
        self.width * self.rearm_fraction
    }
}

/// Race status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceStatus {
    Idle,
    Running,
    Finished,
}

/// One recorded instant of a run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySample {
    pub x: f32,
    pub y: f32,
    #[serde(rename = "angle")]
    pub heading: f32,
    /// Seconds since the race started
    pub t: f32,
}

impl TrajectorySample {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A finished run, ready for persistence
#[derive(Debug, Clone, PartialEq)]
pub struct RaceOutcome {
    pub final_time: f32,
    pub trajectory: Vec<TrajectorySample>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RaceEvent {
    Started,
    LapCompleted { lap: u32, time: f32 },
    Finished { time: f32 },
}

/// Checkered finish line and its hitbox
#[derive(Debug, Clone)]
pub struct FinishLine {
    hitbox: PolygonEntity,
    checkers: Vec<PolygonEntity>,
    angle: f32,
}

impl FinishLine {
    /// Spans the road width, rounded up to whole checker squares of side
    /// `size / 3`. `size` must be finite and positive.
    pub fn new(
        surface: Surface,
        render: &mut dyn RenderSurface,
        center: Vec2,
        angle: f32,
        size: f32,
        road_width: f32,
        tier: TileTier,
    ) -> Result<Self> {
        if !(size.is_finite() && size > 0.0) || !(road_width.is_finite() && road_width >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "finish line of size {size} across a road of width {road_width}"
            )));
        }
        let side = size / 3.0;
        let columns = (road_width / side).ceil().max(1.0) as usize;
        let width = columns as f32 * side;

        let style = EntityStyle::new("black").priority(50).tier(tier);
        let hitbox = PolygonEntity::rectangle(surface, render, center, size, width, angle, &style)?;

        let v = hitbox.vertices();
        let along = (v[1] - v[0]).normalize_or_zero() * side;
        let across = (v[3] - v[0]).normalize_or_zero() * side;
        let origin = v[0] + (along + across) / 2.0;

        let mut checkers = Vec::with_capacity(3 * columns);
        for row in 0..3 {
            for col in 0..columns {
                let fill = if (row + col) % 2 == 1 { "black" } else { "white" };
                let style = EntityStyle::new(fill).priority(51).tier(tier);
                let center = origin + col as f32 * across + row as f32 * along;
                checkers.push(PolygonEntity::square(surface, render, center, side, angle, &style)?);
            }
        }

        Ok(Self {
            hitbox,
            checkers,
            angle,
        })
    }

    /// Placed across the start of a road, facing along its first segment.
    pub fn at_road_start(
        surface: Surface,
        render: &mut dyn RenderSurface,
        road: &Ribbon,
        size: f32,
        tier: TileTier,
    ) -> Result<Self> {
        let direction = road.center[1] - road.center[0];
        let angle = direction.y.atan2(direction.x);
        Self::new(
            surface,
            render,
            road.center[0],
            angle,
            size,
            road.amplitudes[0],
            tier,
        )
    }

    /// Region whose containment counts as a crossing
    pub fn hitbox(&self) -> &PolygonEntity {
        &self.hitbox
    }

    /// Checker squares, render only
    pub fn checkers(&self) -> &[PolygonEntity] {
        &self.checkers
    }

    /// Facing direction of the track at the line
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Point `distance` behind the line
    pub fn start_position(&self, distance: f32) -> Vec2 {
        self.hitbox.position() - distance * Vec2::from_angle(self.angle)
    }

    pub fn hide(&mut self, render: &mut dyn RenderSurface) {
        self.hitbox.hide(render);
        for checker in &mut self.checkers {
            checker.hide(render);
        }
    }
}

/// Ghost car replaying a stored trajectory
#[derive(Debug, Clone)]
pub struct Rival {
    body: PolygonEntity,
    trajectory: Vec<TrajectorySample>,
    cursor: usize,
    shown: Option<usize>,
    heading: f32,
}

impl Rival {
    /// The ghost starts hidden. Timestamps must be strictly increasing.
    pub fn new(
        surface: Surface,
        render: &mut dyn RenderSurface,
        car: &CarConfig,
        position: Vec2,
        heading: f32,
        trajectory: Vec<TrajectorySample>,
    ) -> Result<Self> {
        if trajectory.is_empty() {
            return Err(Error::InvalidTrajectory("no samples".to_string()));
        }
        if let Some(i) = trajectory.windows(2).position(|w| w[1].t <= w[0].t) {
            return Err(Error::InvalidTrajectory(format!(
                "timestamp at sample {} does not increase",
                i + 1
            )));
        }

        let style = EntityStyle::new("red").priority(99).tier(TileTier::Full);
        let mut body =
            PolygonEntity::rectangle(surface, render, position, car.length, car.width, heading, &style)?;
        body.hide(render);

        Ok(Self {
            body,
            trajectory,
            cursor: 0,
            shown: None,
            heading,
        })
    }

    /// Ghost body, hidden outside a running race
    pub fn body(&self) -> &PolygonEntity {
        &self.body
    }

    /// Index of the sample currently shown
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Recorded run being replayed
    pub fn trajectory(&self) -> &[TrajectorySample] {
        &self.trajectory
    }

    pub fn start(&mut self, render: &mut dyn RenderSurface) {
        self.body.unhide(render);
    }

    pub fn stop(&mut self, render: &mut dyn RenderSurface) {
        self.body.hide(render);
    }

    /// Jumps to the first sample later than `elapsed`, scanning forward from
    /// the current cursor only. Past the end the ghost stays on its last
    /// shown sample.
    pub fn advance(&mut self, render: &mut dyn RenderSurface, elapsed: f32) {
        let Some(offset) = self.trajectory[self.cursor..]
            .iter()
            .position(|s| s.t > elapsed)
        else {
            return;
        };
        self.cursor += offset;
        if self.shown == Some(self.cursor) {
            return;
        }

        let sample = self.trajectory[self.cursor];
        let delta = sample.position() - self.body.position();
        self.body.move_by(render, delta);
        self.body.rotate(render, sample.heading - self.heading);
        self.heading = sample.heading;
        self.shown = Some(self.cursor);
    }

    /// Back to the first sample, hidden
    fn rewind(&mut self, render: &mut dyn RenderSurface) {
        self.cursor = 0;
        self.shown = None;
        self.stop(render);
    }
}

/// Finish-line crossing, lap counting, timing and trajectory recording
#[derive(Debug, Clone)]
pub struct RaceController {
    status: RaceStatus,
    lap_count: u32,
    total_laps: u32,
    armed: bool,
    start_timestamp: Option<f32>,
    elapsed: f32,
    trajectory: Vec<TrajectorySample>,
    finish_line: FinishLine,
    rival: Option<Rival>,
    rearm_distance: f32,
    pending: Option<RaceOutcome>,
}

impl RaceController {
    /// `total_laps` below 1 is raised to 1; configs reject it earlier in
    /// [`RaceConfig::validate`].
    pub fn new(
        finish_line: FinishLine,
        rival: Option<Rival>,
        total_laps: u32,
        rearm_distance: f32,
    ) -> Self {
        Self {
            status: RaceStatus::Idle,
            lap_count: 0,
            total_laps: total_laps.max(1),
            armed: true,
            start_timestamp: None,
            elapsed: 0.0,
            trajectory: Vec::new(),
            finish_line,
            rival,
            rearm_distance,
            pending: None,
        }
    }

    /// Current race status
    pub fn status(&self) -> RaceStatus {
        self.status
    }

    /// Crossings counted so far, the starting one included
    pub fn lap_count(&self) -> u32 {
        self.lap_count
    }

    pub fn laps_completed(&self) -> u32 {
        self.lap_count.saturating_sub(1).min(self.total_laps)
    }

    /// Laps to complete after the starting crossing
    pub fn total_laps(&self) -> u32 {
        self.total_laps
    }

    /// Whether the next crossing counts
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Check if the race clock is running
    pub fn is_running(&self) -> bool {
        self.status == RaceStatus::Running
    }

    /// Seconds since the starting crossing
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Samples recorded so far in the current run
    pub fn trajectory(&self) -> &[TrajectorySample] {
        &self.trajectory
    }

    /// Get the finish line
    pub fn finish_line(&self) -> &FinishLine {
        &self.finish_line
    }

    /// Get the ghost, if one is replaying
    pub fn rival(&self) -> Option<&Rival> {
        self.rival.as_ref()
    }

    /// One frame. `now` is the simulation clock in seconds.
    pub fn update(
        &mut self,
        render: &mut dyn RenderSurface,
        now: f32,
        car: &CarState,
    ) -> Option<RaceEvent> {
        let running = self.is_running();
        if running {
            if let Some(start) = self.start_timestamp {
                self.elapsed = now - start;
            }
            if let Some(rival) = &mut self.rival {
                rival.advance(render, self.elapsed);
            }
            // a zero-length frame must not repeat a timestamp
            if self.trajectory.last().map_or(true, |last| self.elapsed > last.t) {
                self.trajectory.push(TrajectorySample {
                    x: car.position.x,
                    y: car.position.y,
                    heading: car.heading,
                    t: self.elapsed,
                });
            }
        }

        if self.armed {
            if self.finish_line.hitbox().contains_point(car.position) {
                return Some(self.cross(render, now));
            }
        } else if self.status != RaceStatus::Finished
            && self.finish_line.hitbox().distance_to(car.position) > self.rearm_distance
        {
            self.armed = true;
            log::debug!("finish line re-armed at lap {}", self.lap_count);
        }
        None
    }

    fn cross(&mut self, render: &mut dyn RenderSurface, now: f32) -> RaceEvent {
        let event = if self.lap_count == 0 {
            self.status = RaceStatus::Running;
            self.start_timestamp = Some(now);
            self.elapsed = 0.0;
            self.trajectory.clear();
            if let Some(rival) = &mut self.rival {
                rival.start(render);
            }
            log::info!("race started");
            RaceEvent::Started
        } else if self.lap_count == self.total_laps {
            self.status = RaceStatus::Finished;
            let trajectory = std::mem::take(&mut self.trajectory);
            let final_time = trajectory.last().map_or(self.elapsed, |s| s.t);
            self.pending = Some(RaceOutcome {
                final_time,
                trajectory,
            });
            if let Some(rival) = &mut self.rival {
                rival.stop(render);
            }
            log::info!("race finished in {:.2}s", final_time);
            RaceEvent::Finished { time: final_time }
        } else {
            log::info!("lap {} completed at {:.2}s", self.lap_count, self.elapsed);
            RaceEvent::LapCompleted {
                lap: self.lap_count,
                time: self.elapsed,
            }
        };
        self.lap_count += 1;
        self.armed = false;
        event
    }

    /// Ends a running race early. What was recorded so far becomes the
    /// pending outcome, timed at its last sample.
    pub fn stop(&mut self, render: &mut dyn RenderSurface) {
        if !self.is_running() {
            return;
        }
        self.status = RaceStatus::Finished;
        self.armed = false;
        if let Some(rival) = &mut self.rival {
            rival.stop(render);
        }
        let trajectory = std::mem::take(&mut self.trajectory);
        match trajectory.last() {
            Some(last) => {
                log::info!("race stopped early at {:.2}s", last.t);
                self.pending = Some(RaceOutcome {
                    final_time: last.t,
                    trajectory,
                });
            }
            None => log::debug!("race stopped before any sample was recorded"),
        }
    }

    /// Hides the finish line and the ghost
    pub fn hide(&mut self, render: &mut dyn RenderSurface) {
        self.finish_line.hide(render);
        if let Some(rival) = &mut self.rival {
            rival.stop(render);
        }
    }

    /// Hands out the finished run once; later calls return `None`.
    pub fn take_outcome(&mut self) -> Option<RaceOutcome> {
        self.pending.take()
    }

    /// Back to `Idle`, dropping the current run
    pub fn restart(&mut self, render: &mut dyn RenderSurface) {
        self.status = RaceStatus::Idle;
        self.lap_count = 0;
        self.armed = true;
        self.start_timestamp = None;
        self.elapsed = 0.0;
        self.trajectory.clear();
        self.pending = None;
        if let Some(rival) = &mut self.rival {
            rival.rewind(render);
        }
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        RaceSnapshot {
            status: self.status,
            lap_count: self.lap_count,
            laps_completed: self.laps_completed(),
            total_laps: self.total_laps,
            armed: self.armed,
            elapsed_time: self.elapsed,
            rival: self.rival.as_ref().and_then(|r| {
                r.body().is_visible().then(|| {
                    let p = r.body().position();
                    TrajectorySample {
                        x: p.x,
                        y: p.y,
                        heading: r.heading,
                        t: self.elapsed,
                    }
                })
            }),
        }
    }
}

/// Compact race snapshot for the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub status: RaceStatus,
    pub lap_count: u32,
    pub laps_completed: u32,
    pub total_laps: u32,
    pub armed: bool,
    pub elapsed_time: f32,
    pub rival: Option<TrajectorySample>,
}
