//! Simulation - Main game server and loop
//!
//! Owns the render surface, the current race session and the record store.
//! One tick runs the car, then the race controller, then flushes a finished
//! run to disk.

use std::collections::VecDeque;
use std::time::Instant;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::game_server::car::{Car, CarSnapshot};
use crate::game_server::input::InputState;
use crate::game_server::maps::Track;
use crate::game_server::race::{
    FinishLine, RaceConfig, RaceController, RaceEvent, RaceSnapshot, RaceStatus, Rival,
};
use crate::game_server::records::{RaceRecord, RecordStore};
use crate::topology::{RenderSurface, Scene, Surface};

const STATS_WINDOW: usize = 60;

/// Game state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    Idle,
    Ready,
    Racing,
    Results,
}

/// Server statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStats {
    pub tick_rate: f32,
    pub avg_tick_time_ms: f32,
    pub ticks: u64,
    pub game_state: GameState,
}

/// Full per-tick view for the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub game_state: GameState,
    pub clock: f32,
    pub car: CarSnapshot,
    pub race: RaceSnapshot,
    pub last_saved: Option<bool>,
}

/// Fixed-step accumulator between wall-clock time and simulation steps
#[derive(Debug, Clone)]
pub struct FrameClock {
    step: f32,
    accumulator: f32,
    max_steps: u32,
}

impl FrameClock {
    pub fn new(tick_rate: f32) -> Self {
        Self {
            step: 1.0 / tick_rate.max(1.0),
            accumulator: 0.0,
            max_steps: 8,
        }
    }

    /// Seconds per fixed step
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Banks `elapsed` seconds and returns how many whole steps to run.
    /// Time beyond `max_steps` is dropped so a stall cannot snowball.
    pub fn advance(&mut self, elapsed: f32) -> u32 {
        self.accumulator += elapsed.max(0.0);
        let steps = (self.accumulator / self.step).floor() as u32;
        if steps > self.max_steps {
            self.accumulator = 0.0;
            return self.max_steps;
        }
        self.accumulator -= steps as f32 * self.step;
        steps
    }
}

/// Scroll offset that centres the home-block image of a point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub viewport: Vec2,
}

impl Camera {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            viewport: Vec2::new(width, height),
        }
    }

    /// Offset for a chart position
    pub fn offset(&self, surface: &Surface, position: Vec2) -> Vec2 {
        position + surface.home_offset() - self.viewport / 2.0
    }
}

/// Everything built for one race
struct Session {
    config: RaceConfig,
    surface: Surface,
    track: Track,
    car: Car,
    race: RaceController,
    start: Vec2,
    heading: f32,
}

impl Session {
    fn hide(&mut self, render: &mut dyn RenderSurface) {
        self.track.hide(render);
        self.race.hide(render);
        self.car.hide(render);
    }
}

/// Main game server
pub struct GameServer<R: RenderSurface = Scene> {
    /// Current game state
    state: GameState,
    render: R,
    records: RecordStore,
    session: Option<Session>,
    input: InputState,
    /// Simulation time in seconds
    clock: f32,
    /// Target tick rate (ticks per second)
    tick_rate: f32,
    frame_clock: FrameClock,
    /// Last tick timestamp
    last_tick: Instant,
    /// Recent tick durations for averaging
    tick_times: VecDeque<f32>,
    ticks: u64,
    /// Whether the simulation advances on tick
    running: bool,
    /// Outcome of the last persistence attempt
    last_saved: Option<bool>,
}

impl<R: RenderSurface> GameServer<R> {
    pub fn new(render: R, records: RecordStore) -> Self {
        let tick_rate = 60.0;
        Self {
            state: GameState::Idle,
            render,
            records,
            session: None,
            input: InputState::default(),
            clock: 0.0,
            tick_rate,
            frame_clock: FrameClock::new(tick_rate),
            last_tick: Instant::now(),
            tick_times: VecDeque::with_capacity(STATS_WINDOW),
            ticks: 0,
            running: false,
            last_saved: None,
        }
    }

    /// Builds map, finish line, car and rival. A missing rival record fails
    /// the call before anything is built; retry without a rival to race
    /// alone.
    pub fn init_race(&mut self, config: RaceConfig) -> Result<()> {
        config.validate()?;
        let rival_trajectory = match &config.rival {
            Some(name) => Some(self.records.load(config.map, config.topology, name)?.trajectory),
            None => None,
        };

        self.close()?;
        let render = &mut self.render;
        let surface = config.surface();
        let track = config.map.build(surface, render, config.tier)?;
        let finish_line = FinishLine::at_road_start(
            surface,
            render,
            &track.road,
            config.finish_line_size,
            config.tier,
        )?;
        let start = finish_line.start_position(config.start_distance);
        let heading = finish_line.angle();

        let rival = match rival_trajectory {
            Some(trajectory) => Some(Rival::new(
                surface,
                render,
                &config.car,
                start,
                heading,
                trajectory,
            )?),
            None => None,
        };

        let mut car = Car::new(surface, render, Vec2::ZERO, 0.0, config.car.clone())?;
        car.place(render, start, heading);

        let race = RaceController::new(
            finish_line,
            rival,
            config.total_laps,
            config.rearm_distance(),
        );

        log::info!(
            "race initialized on {} / {} for {} ({} laps)",
            config.map,
            config.topology,
            config.player,
            race.total_laps()
        );
        self.session = Some(Session {
            config,
            surface,
            track,
            car,
            race,
            start,
            heading,
        });
        self.clock = 0.0;
        self.last_saved = None;
        self.input = InputState::default();
        self.state = GameState::Ready;
        Ok(())
    }

    /// Lets ticks advance the simulation
    pub fn start(&mut self) {
        if self.session.is_some() {
            self.state = GameState::Racing;
            self.running = true;
            self.last_tick = Instant::now();
        }
    }

    /// One fixed step of `dt` seconds. Steps that are not positive are
    /// ignored.
    pub fn tick(&mut self, dt: f32) -> Result<Option<RaceEvent>> {
        if self.input.quit {
            self.close()?;
            return Ok(None);
        }
        if !self.running || dt.is_nan() || dt <= 0.0 {
            return Ok(None);
        }
        let Some(session) = &mut self.session else {
            return Ok(None);
        };

        let tick_start = Instant::now();
        self.clock += dt;
        session
            .car
            .update(&self.input, &session.track.terrain, &mut self.render, dt);
        let event = session
            .race
            .update(&mut self.render, self.clock, &session.car.state);

        if session.race.status() == RaceStatus::Finished {
            self.state = GameState::Results;
            self.running = false;
        }
        self.flush()?;

        let tick_time = tick_start.elapsed().as_secs_f32() * 1000.0;
        self.tick_times.push_back(tick_time);
        if self.tick_times.len() > STATS_WINDOW {
            self.tick_times.pop_front();
        }
        self.ticks += 1;
        Ok(event)
    }

    /// Runs as many fixed steps as wall-clock time since the last call
    /// allows. Returns the events raised.
    pub fn tick_realtime(&mut self) -> Result<Vec<RaceEvent>> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        let mut events = Vec::new();
        for _ in 0..self.frame_clock.advance(elapsed) {
            if let Some(event) = self.tick(self.frame_clock.step())? {
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Persists a finished run if one is pending.
    fn flush(&mut self) -> Result<Option<bool>> {
        let Some(session) = &mut self.session else {
            return Ok(None);
        };
        let Some(outcome) = session.race.take_outcome() else {
            return Ok(None);
        };
        let config = &session.config;
        let record = RaceRecord::new(config.map, config.topology, &config.player, outcome);
        let saved = self.records.save(&record)?;
        self.last_saved = Some(saved);
        Ok(Some(saved))
    }

    /// Ends the session. A running race is stopped and what it recorded is
    /// flushed like a finished run; a pending run is written at most once.
    /// Safe to call repeatedly.
    pub fn close(&mut self) -> Result<Option<bool>> {
        if let Some(session) = &mut self.session {
            session.race.stop(&mut self.render);
        }
        let saved = self.flush()?;
        if let Some(mut session) = self.session.take() {
            session.hide(&mut self.render);
            log::info!("race closed");
        }
        self.running = false;
        self.input = InputState::default();
        self.state = GameState::Idle;
        Ok(saved)
    }

    /// Flushes the current run like [`GameServer::close`], then puts the car
    /// back behind the line with a fresh race.
    pub fn restart(&mut self) -> Result<Option<bool>> {
        if let Some(session) = &mut self.session {
            session.race.stop(&mut self.render);
        }
        let saved = self.flush()?;
        if let Some(session) = &mut self.session {
            session.race.restart(&mut self.render);
            session
                .car
                .place(&mut self.render, session.start, session.heading);
            self.clock = 0.0;
            self.running = false;
            self.state = GameState::Ready;
            log::info!("race restarted");
        }
        Ok(saved)
    }

    /// Pause the simulation
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Resume the simulation
    pub fn resume(&mut self) {
        if self.state == GameState::Racing {
            self.running = true;
            self.last_tick = Instant::now();
        }
    }

    /// Reset to idle state, closing any session first
    pub fn reset(&mut self) -> Result<()> {
        self.close()?;
        self.tick_times.clear();
        self.ticks = 0;
        Ok(())
    }

    /// Forward a key press to the control map
    pub fn key_pressed(&mut self, key: &str) {
        self.input.key_pressed(key);
    }

    /// Forward a key release to the control map
    pub fn key_released(&mut self, key: &str) {
        self.input.key_released(key);
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    /// Get a snapshot of the current session
    pub fn snapshot(&self) -> Option<SimulationSnapshot> {
        self.session.as_ref().map(|s| SimulationSnapshot {
            game_state: self.state,
            clock: self.clock,
            car: CarSnapshot::from(&s.car),
            race: s.race.snapshot(),
            last_saved: self.last_saved,
        })
    }

    /// Scroll offset keeping the car centred
    pub fn camera_offset(&self, camera: &Camera) -> Option<Vec2> {
        self.session
            .as_ref()
            .map(|s| camera.offset(&s.surface, s.car.position()))
    }

    /// Get server statistics
    pub fn stats(&self) -> ServerStats {
        let avg_tick_time = if self.tick_times.is_empty() {
            0.0
        } else {
            self.tick_times.iter().sum::<f32>() / self.tick_times.len() as f32
        };

        ServerStats {
            tick_rate: self.tick_rate,
            avg_tick_time_ms: avg_tick_time,
            ticks: self.ticks,
            game_state: self.state,
        }
    }

    /// Get current game state
    pub fn state(&self) -> GameState {
        self.state
    }

    /// Check if the simulation is ticking
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Race clock in seconds
    pub fn clock(&self) -> f32 {
        self.clock
    }

    /// Result of the last record write, if any
    pub fn last_saved(&self) -> Option<bool> {
        self.last_saved
    }

    pub fn render(&self) -> &R {
        &self.render
    }

    /// Get the record store
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Get the player car
    pub fn car(&self) -> Option<&Car> {
        self.session.as_ref().map(|s| &s.car)
    }

    /// Get the race controller
    pub fn race(&self) -> Option<&RaceController> {
        self.session.as_ref().map(|s| &s.race)
    }

    /// Get the built track
    pub fn track(&self) -> Option<&Track> {
        self.session.as_ref().map(|s| &s.track)
    }
}

impl Default for GameServer<Scene> {
    fn default() -> Self {
        Self::new(Scene::new(), RecordStore::new("data"))
    }
}

impl<R: RenderSurface> Drop for GameServer<R> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("failed to flush race on shutdown: {}", err);
        }
    }
}

/// Missing-rival errors are the only init failure a host can recover from.
pub fn is_missing_rival(err: &Error) -> bool {
    matches!(err, Error::MissingRecord { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_server::maps::MapId;
    use crate::topology::{TileTier, Topology};
    use tempfile::TempDir;

    fn server(tmp: &TempDir) -> GameServer {
        GameServer::new(Scene::new(), RecordStore::new(tmp.path()))
    }

    fn config() -> RaceConfig {
        RaceConfig {
            topology: Topology::KleinBottleH,
            map: MapId::ZHomology,
            total_laps: 1,
            tier: TileTier::Home,
            ..Default::default()
        }
    }

    #[test]
    fn frame_clock_banks_remainders() {
        let mut clock = FrameClock::new(50.0);
        assert_eq!(clock.advance(0.015), 0);
        assert_eq!(clock.advance(0.015), 1);
        assert_eq!(clock.advance(0.045), 2);
        assert_eq!(clock.advance(10.0), 8);
        assert_eq!(clock.advance(0.0), 0);
    }

    #[test]
    fn camera_centres_home_image() {
        let surface = Surface::from_topology(Topology::Torus, 100.0, 100.0);
        let camera = Camera::new(80.0, 60.0);
        assert_eq!(
            camera.offset(&surface, Vec2::new(10.0, 20.0)),
            Vec2::new(170.0, 190.0)
        );
    }

    #[test]
    fn init_places_car_behind_the_line() {
        let tmp = TempDir::new().unwrap();
        let mut server = server(&tmp);
        server.init_race(config()).unwrap();
        assert_eq!(server.state(), GameState::Ready);

        let car = server.car().unwrap();
        let line = server.race().unwrap().finish_line();
        let gap = line.hitbox().position() - car.position();
        assert!((gap - Vec2::new(30.0, 0.0)).length() < 1e-3);
        assert!(!line.hitbox().contains_point(car.position()));
    }

    #[test]
    fn ticks_do_nothing_until_started() {
        let tmp = TempDir::new().unwrap();
        let mut server = server(&tmp);
        server.init_race(config()).unwrap();
        server.key_pressed("w");
        assert_eq!(server.tick(0.1).unwrap(), None);
        assert_eq!(server.clock(), 0.0);

        server.start();
        server.tick(0.1).unwrap();
        assert!(server.car().unwrap().speed() > 0.0);

        server.pause();
        let clock = server.clock();
        server.tick(0.1).unwrap();
        assert_eq!(server.clock(), clock);
    }

    #[test]
    fn missing_rival_fails_before_building() {
        let tmp = TempDir::new().unwrap();
        let mut server = server(&tmp);
        let err = server
            .init_race(RaceConfig {
                rival: Some("nobody".to_string()),
                ..config()
            })
            .unwrap_err();
        assert!(is_missing_rival(&err));
        assert_eq!(server.state(), GameState::Idle);
        assert!(server.render().is_empty());
    }

    #[test]
    fn closing_a_running_race_flushes_it_once() {
        let tmp = TempDir::new().unwrap();
        let mut server = server(&tmp);
        server.init_race(config()).unwrap();
        server.start();
        server.key_pressed("w");
        for _ in 0..120 {
            server.tick(1.0 / 60.0).unwrap();
        }
        let recorded = server.race().unwrap().trajectory().to_vec();
        assert!(server.race().unwrap().is_running());
        assert!(!recorded.is_empty());

        assert_eq!(server.close().unwrap(), Some(true));
        assert_eq!(server.close().unwrap(), None);
        assert_eq!(server.state(), GameState::Idle);

        let board = server
            .records()
            .leaderboard(MapId::ZHomology, Topology::KleinBottleH)
            .unwrap();
        assert_eq!(board.len(), 1);
        let record = server
            .records()
            .load(MapId::ZHomology, Topology::KleinBottleH, "player")
            .unwrap();
        assert_eq!(record.trajectory, recorded);
        assert_eq!(record.final_time, recorded.last().unwrap().t);
    }

    #[test]
    fn closing_before_the_start_line_saves_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut server = server(&tmp);
        server.init_race(config()).unwrap();
        server.start();
        server.tick(1.0 / 60.0).unwrap();
        assert_eq!(server.close().unwrap(), None);
        assert!(server
            .records()
            .leaderboard(MapId::ZHomology, Topology::KleinBottleH)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn zero_length_ticks_keep_the_run_replayable() {
        let tmp = TempDir::new().unwrap();
        let mut server = server(&tmp);
        server.init_race(config()).unwrap();
        server.start();
        server.key_pressed("w");
        for tick in 0..6000 {
            let dt = if tick % 50 == 0 { 0.0 } else { 1.0 / 60.0 };
            server.tick(dt).unwrap();
            if server.state() == GameState::Results {
                break;
            }
        }
        assert_eq!(server.state(), GameState::Results);
        assert_eq!(server.last_saved(), Some(true));

        server
            .init_race(RaceConfig {
                rival: Some("player".to_string()),
                ..config()
            })
            .unwrap();
        assert!(server.race().unwrap().rival().is_some());
    }

    #[test]
    fn closing_hides_the_previous_race() {
        let tmp = TempDir::new().unwrap();
        let mut server = server(&tmp);
        server.init_race(config()).unwrap();
        let single_race = server.render().visible_count();
        assert!(single_race > 0);

        server.close().unwrap();
        assert_eq!(server.render().visible_count(), 0);

        server.init_race(config()).unwrap();
        assert_eq!(server.render().visible_count(), single_race);
    }

    #[test]
    fn invalid_config_is_rejected_before_building() {
        let tmp = TempDir::new().unwrap();
        let mut server = server(&tmp);
        let err = server
            .init_race(RaceConfig {
                finish_line_size: 0.0,
                ..config()
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(server.render().is_empty());
    }

    #[test]
    fn quit_key_closes_the_session() {
        let tmp = TempDir::new().unwrap();
        let mut server = server(&tmp);
        server.init_race(config()).unwrap();
        server.start();
        server.key_pressed("escape");
        server.tick(0.1).unwrap();
        assert_eq!(server.state(), GameState::Idle);
        assert!(server.snapshot().is_none());
    }

    #[test]
    fn stats_average_recent_ticks() {
        let tmp = TempDir::new().unwrap();
        let mut server = server(&tmp);
        server.init_race(config()).unwrap();
        server.start();
        for _ in 0..100 {
            server.tick(1.0 / 60.0).unwrap();
        }
        let stats = server.stats();
        assert_eq!(stats.ticks, 100);
        assert_eq!(stats.game_state, GameState::Racing);
        assert!(stats.avg_tick_time_ms >= 0.0);
    }
}
