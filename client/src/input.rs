//! Keyboard input mapped to turn commands and connection controls

use macroquad::prelude::*;
use shared::Direction;

/// Raw key sample for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeySample {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub reconnect: bool,
    pub disconnect: bool,
    pub quit: bool,
}

/// What the player asked for this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub turn: Option<Direction>,
    pub reconnect: bool,
    pub disconnect: bool,
    pub quit: bool,
}

/// Turns key presses into controls, firing once per press
pub struct InputManager {
    previous: KeySample,
    last_turn: Option<Direction>,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            previous: KeySample::default(),
            last_turn: None,
        }
    }

    /// Samples the keyboard (arrows or WASD, R reconnect, X disconnect, Esc quit)
    pub fn update(&mut self) -> Controls {
        let sample = KeySample {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            reconnect: is_key_down(KeyCode::R),
            disconnect: is_key_down(KeyCode::X),
            quit: is_key_down(KeyCode::Escape),
        };
        self.apply(sample)
    }

    /// Edge detection: a key counts on the frame it goes down. A turn that
    /// repeats the last one sent is swallowed.
    pub fn apply(&mut self, sample: KeySample) -> Controls {
        let prev = self.previous;
        self.previous = sample;

        let pressed = [
            (sample.up && !prev.up, Direction::Up),
            (sample.down && !prev.down, Direction::Down),
            (sample.left && !prev.left, Direction::Left),
            (sample.right && !prev.right, Direction::Right),
        ];

        let turn = pressed
            .iter()
            .find(|(is_pressed, _)| *is_pressed)
            .map(|&(_, direction)| direction)
            .filter(|direction| Some(*direction) != self.last_turn);

        if turn.is_some() {
            self.last_turn = turn;
        }

        Controls {
            turn,
            reconnect: sample.reconnect && !prev.reconnect,
            disconnect: sample.disconnect && !prev.disconnect,
            quit: sample.quit,
        }
    }

    /// Forgets the last turn, e.g. after the snake respawned with a new heading
    pub fn reset(&mut self) {
        self.last_turn = None;
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
