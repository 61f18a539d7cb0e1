//! Input - Live control state
//!
//! The host event loop writes key presses and releases; the simulation only
//! reads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    Forward,
    Reverse,
    TurnLeft,
    TurnRight,
    Quit,
}

impl Control {
    /// Maps a key name to its control, case-insensitively
    pub fn from_key(key: &str) -> Option<Control> {
        match key.to_ascii_lowercase().as_str() {
            "w" | "up" => Some(Control::Forward),
            "s" | "down" => Some(Control::Reverse),
            "a" | "left" => Some(Control::TurnLeft),
            "d" | "right" => Some(Control::TurnRight),
            "escape" => Some(Control::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputState {
    pub forward: bool,
    pub reverse: bool,
    pub turn_left: bool,
    pub turn_right: bool,
    pub quit: bool,
}

impl InputState {
    pub fn set(&mut self, control: Control, pressed: bool) {
        match control {
            Control::Forward => self.forward = pressed,
            Control::Reverse => self.reverse = pressed,
            Control::TurnLeft => self.turn_left = pressed,
            Control::TurnRight => self.turn_right = pressed,
            Control::Quit => self.quit = pressed,
        }
    }

    pub fn is_pressed(&self, control: Control) -> bool {
        match control {
            Control::Forward => self.forward,
            Control::Reverse => self.reverse,
            Control::TurnLeft => self.turn_left,
            Control::TurnRight => self.turn_right,
            Control::Quit => self.quit,
        }
    }

    /// Unknown keys are ignored
    pub fn key_pressed(&mut self, key: &str) {
        if let Some(control) = Control::from_key(key) {
            self.set(control, true);
        }
    }

    pub fn key_released(&mut self, key: &str) {
        if let Some(control) = Control::from_key(key) {
            self.set(control, false);
        }
    }
}
