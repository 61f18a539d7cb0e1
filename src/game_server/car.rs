//! Car - Arcade car dynamics on a glued surface
//!
//! Each frame the ground under the car is sampled, forces are integrated
//! into the velocity, steering rotates heading and body together, and the
//! body is moved with wrap-around.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::game_server::input::InputState;
use crate::game_server::terrain::{Ground, TrackQuery};
use crate::topology::{EntityStyle, PolygonEntity, RenderSurface, Surface, TileTier};

/// Grip reduction with speed. Both curves are strictly decreasing and stay
/// in (0, 1] for non-negative speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "curve", rename_all = "snake_case")]
pub enum GripFalloff {
    Exponential { scale: f32 },
    Rational { scale: f32 },
}

impl GripFalloff {
    pub fn factor(&self, speed: f32) -> f32 {
        let speed = speed.max(0.0);
        match *self {
            GripFalloff::Exponential { scale } => (-speed / scale).exp(),
            GripFalloff::Rational { scale } => 1.0 / (1.0 + speed / scale),
        }
    }
}

impl Default for GripFalloff {
    fn default() -> Self {
        GripFalloff::Exponential { scale: 250.0 }
    }
}

/// Car tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarConfig {
    /// Drive force at full torque and traction
    pub base_accel: f32,
    /// Air drag per unit of velocity
    pub air_drag: f32,
    /// Turning rate at full turn coefficient (rad/s)
    pub angular_rate: f32,
    /// Momentum gained per second of throttle
    pub momentum_ramp: f32,
    /// Momentum lost per second off throttle
    pub momentum_decay: f32,
    pub max_momentum: f32,
    /// Momentum needed for the torque curve to reach ~63% of its headroom
    pub torque_scale: f32,
    /// Torque already available from a standstill, as an exponent offset
    pub torque_offset: f32,
    pub reverse_torque: f32,
    /// How quickly steering authority builds with speed
    pub turn_sharpness: f32,
    pub grip_falloff: GripFalloff,
    /// Body extent along the heading
    pub length: f32,
    pub width: f32,
    pub fill: String,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            base_accel: 400.0,
            air_drag: 1.0,
            angular_rate: 2.5,
            momentum_ramp: 1.0,
            momentum_decay: 3.0,
            max_momentum: 20.0,
            torque_scale: 5.0,
            torque_offset: 0.2,
            reverse_torque: 0.1,
            turn_sharpness: 0.1,
            grip_falloff: GripFalloff::default(),
            length: 20.0,
            width: 10.0,
            fill: "blue".to_string(),
        }
    }
}

/// Integrated car state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CarState {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Radians; 0 faces +x
    pub heading: f32,
    pub throttle_momentum: f32,
    /// |velocity|, refreshed every step
    pub speed: f32,
}

/// Car body plus its dynamics
#[derive(Debug, Clone)]
pub struct Car {
    pub state: CarState,
    body: PolygonEntity,
    config: CarConfig,
}

impl Car {
    pub fn new(
        surface: Surface,
        render: &mut dyn RenderSurface,
        position: Vec2,
        heading: f32,
        config: CarConfig,
    ) -> Result<Self> {
        let style = EntityStyle::new(&config.fill)
            .priority(100)
            .tier(TileTier::Full);
        let body = PolygonEntity::rectangle(
            surface,
            render,
            position,
            config.length,
            config.width,
            heading,
            &style,
        )?;
        let state = CarState {
            position: body.position(),
            heading,
            ..Default::default()
        };
        Ok(Self {
            state,
            body,
            config,
        })
    }

    /// Chart position of the body
    pub fn position(&self) -> Vec2 {
        self.state.position
    }

    /// Heading in radians
    pub fn heading(&self) -> f32 {
        self.state.heading
    }

    /// Current speed
    pub fn speed(&self) -> f32 {
        self.state.speed
    }

    /// Get the drawn body
    pub fn body(&self) -> &PolygonEntity {
        &self.body
    }

    /// Get the tuning in use
    pub fn config(&self) -> &CarConfig {
        &self.config
    }

    /// Hides the body
    pub fn hide(&mut self, render: &mut dyn RenderSurface) {
        self.body.hide(render);
    }

    /// Teleports the car to `position` facing `heading`, at rest.
    pub fn place(&mut self, render: &mut dyn RenderSurface, position: Vec2, heading: f32) {
        let delta = position - self.body.position();
        self.body.move_wrapped(render, delta);
        self.body.rotate(render, heading - self.state.heading);
        self.body.raise(render);
        self.state = CarState {
            position: self.body.position(),
            heading,
            ..Default::default()
        };
    }

    /// One frame: forces, steering, then wrapped displacement.
    pub fn update(
        &mut self,
        input: &InputState,
        track: &TrackQuery,
        render: &mut dyn RenderSurface,
        dt: f32,
    ) {
        let ground = track.friction_at(self.body.position());
        self.integrate_forces(input, ground, dt);

        if input.turn_left {
            self.turn(-1.0, render, dt);
        }
        if input.turn_right {
            self.turn(1.0, render, dt);
        }

        let displacement = self.state.velocity * dt;
        self.body.move_wrapped(render, displacement);
        self.state.position = self.body.position();
    }

    /// Engine torque from the throttle; also advances the momentum ramp.
    fn torque(&mut self, input: &InputState, dt: f32) -> f32 {
        let cfg = &self.config;
        let momentum = &mut self.state.throttle_momentum;
        if input.reverse {
            -cfg.reverse_torque
        } else if input.forward {
            *momentum = (*momentum + cfg.momentum_ramp * dt).min(cfg.max_momentum);
            1.0 - (-*momentum / cfg.torque_scale - cfg.torque_offset).exp()
        } else {
            *momentum = (*momentum - cfg.momentum_decay * dt).max(0.0);
            0.0
        }
    }

    fn integrate_forces(&mut self, input: &InputState, ground: Ground, dt: f32) {
        let torque = self.torque(input, dt);
        let cfg = &self.config;

        let tangent = Vec2::from_angle(self.state.heading);
        let perp = Vec2::new(tangent.y, -tangent.x);
        let velocity = self.state.velocity;

        let mut force = tangent * cfg.base_accel * ground.traction * torque;
        force -= velocity * cfg.air_drag;
        force -= sign(velocity.dot(tangent)) * tangent * ground.friction;
        let grip = cfg.grip_falloff.factor(self.state.speed) * ground.grip;
        force -= grip * velocity.dot(perp) * perp;

        self.state.velocity += force * dt;
        self.state.speed = self.state.velocity.length();
    }

    /// `direction` is -1 for left, +1 for right; inverted while reversing.
    fn turn(&mut self, direction: f32, render: &mut dyn RenderSurface, dt: f32) {
        let tangent = Vec2::from_angle(self.state.heading);
        let orientation = if self.state.velocity.dot(tangent) < 0.0 {
            -direction
        } else {
            direction
        };
        let turn_coef = 1.0 - (-self.config.turn_sharpness * self.state.speed).exp();
        let delta = orientation * dt * self.config.angular_rate * turn_coef;
        if delta == 0.0 {
            return;
        }
        self.state.heading += delta;
        self.body.rotate(render, delta);
    }
}

/// Zero maps to zero, unlike `f32::signum`
fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Compact car state for snapshots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarSnapshot {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
    pub speed: f32,
}

impl From<&Car> for CarSnapshot {
    fn from(car: &Car) -> Self {
        Self {
            x: car.state.position.x,
            y: car.state.position.y,
            heading: car.state.heading,
            speed: car.state.speed,
        }
    }
}
