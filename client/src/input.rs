//! Client input state with per-frame edge detection and smoothed axes

use crate::rendering::Surface;
use macroquad::prelude::{is_key_down, is_mouse_button_down, mouse_position, mouse_wheel, KeyCode, MouseButton};
use mirror_shared::InputSync;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Button {
    pub down: bool,
    /// Frame on which the button last went down
    pub frame_down: u64,
    /// Frame on which the button last went up
    pub frame_up: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AxisSource {
    Buttons { positive: String, negative: String },
    MouseX,
    MouseY,
    MouseWheel,
}

/// Named value in `[-1, 1]` driven by buttons or the mouse.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub name: String,
    pub source: AxisSource,
    pub value: f32,
    /// Units per second the value moves while a button is held
    pub sensitivity: f32,
    /// Units per second the value falls back to zero once released
    pub gravity: f32,
    pub dead: f32,
}

impl Axis {
    pub fn buttons(name: &str, positive: &str, negative: &str) -> Self {
        Self {
            name: name.to_string(),
            source: AxisSource::Buttons {
                positive: positive.to_string(),
                negative: negative.to_string(),
            },
            value: 0.0,
            sensitivity: 3.0,
            gravity: 3.0,
            dead: 0.001,
        }
    }

    pub fn mouse(name: &str, source: AxisSource) -> Self {
        Self {
            name: name.to_string(),
            source,
            value: 0.0,
            sensitivity: 0.1,
            gravity: 3.0,
            dead: 0.001,
        }
    }
}

pub struct Input {
    buttons: HashMap<String, Button>,
    axes: Vec<Axis>,
    pub mouse_position: [f32; 2],
    pub mouse_delta: [f32; 2],
    pub mouse_wheel: f32,
    frame: u64,
    surface: Option<u64>,
}

impl Input {
    pub fn new() -> Self {
        Self {
            buttons: HashMap::new(),
            axes: vec![
                Axis::buttons("horizontal", "right", "left"),
                Axis::buttons("vertical", "up", "down"),
                Axis::mouse("mouse_x", AxisSource::MouseX),
                Axis::mouse("mouse_y", AxisSource::MouseY),
                Axis::mouse("mouse_wheel", AxisSource::MouseWheel),
            ],
            mouse_position: [0.0, 0.0],
            mouse_delta: [0.0, 0.0],
            mouse_wheel: 0.0,
            frame: 0,
            surface: None,
        }
    }

    pub fn add_axis(&mut self, axis: Axis) {
        self.axes.retain(|existing| existing.name != axis.name);
        self.axes.push(axis);
    }

    /// Marks the start of a frame, before the source is sampled.
    pub fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
        self.mouse_delta = [0.0, 0.0];
        self.mouse_wheel = 0.0;
    }

    pub fn press(&mut self, name: &str) {
        let frame = self.frame;
        let button = self.buttons.entry(name.to_string()).or_default();
        if !button.down {
            button.down = true;
            button.frame_down = frame;
        }
    }

    pub fn release(&mut self, name: &str) {
        let frame = self.frame;
        if let Some(button) = self.buttons.get_mut(name) {
            if button.down {
                button.down = false;
                button.frame_up = frame;
            }
        }
    }

    pub fn set_button(&mut self, name: &str, down: bool) {
        if down {
            self.press(name);
        } else {
            self.release(name);
        }
    }

    pub fn move_mouse(&mut self, x: f32, y: f32) {
        self.mouse_delta[0] += x - self.mouse_position[0];
        self.mouse_delta[1] += y - self.mouse_position[1];
        self.mouse_position = [x, y];
    }

    pub fn scroll(&mut self, amount: f32) {
        self.mouse_wheel += amount;
    }

    /// Advances every axis by `delta` seconds.
    pub fn update(&mut self, delta: f32) {
        for axis in &mut self.axes {
            let mut value = axis.value;
            let mut positive = false;
            let mut negative = false;

            match &axis.source {
                AxisSource::Buttons { positive: pos, negative: neg } => {
                    positive = self.buttons.get(pos).map_or(false, |button| button.down);
                    negative = self.buttons.get(neg).map_or(false, |button| button.down);
                }
                AxisSource::MouseX => value = self.mouse_delta[0] * axis.sensitivity,
                AxisSource::MouseY => value = self.mouse_delta[1] * axis.sensitivity,
                AxisSource::MouseWheel => value += self.mouse_wheel * axis.sensitivity,
            }

            if negative {
                value -= axis.sensitivity * delta;
            }
            if positive {
                value += axis.sensitivity * delta;
            }
            if !positive && !negative {
                let magnitude = value.abs();
                value -= (value.signum() * axis.gravity * delta).clamp(-magnitude, magnitude);
            }

            value = value.clamp(-1.0, 1.0);
            if value.abs() <= axis.dead {
                value = 0.0;
            }
            axis.value = value;
        }
    }

    pub fn key(&self, name: &str) -> bool {
        self.buttons.get(name).map_or(false, |button| button.down)
    }

    /// Went down this frame.
    pub fn key_down(&self, name: &str) -> bool {
        self.buttons
            .get(name)
            .map_or(false, |button| button.down && button.frame_down >= self.frame)
    }

    /// Went up this frame.
    pub fn key_up(&self, name: &str) -> bool {
        self.buttons
            .get(name)
            .map_or(false, |button| !button.down && button.frame_up >= self.frame)
    }

    pub fn axis(&self, name: &str) -> f32 {
        self.axes
            .iter()
            .find(|axis| axis.name == name)
            .map_or(0.0, |axis| axis.value)
    }

    /// Records which surface pointer coordinates refer to.
    pub fn bind(&mut self, surface: &Surface) {
        self.surface = Some(surface.binding());
    }

    pub fn bound_surface(&self) -> Option<u64> {
        self.surface
    }

    pub fn to_sync(&self) -> InputSync {
        InputSync {
            buttons: self
                .buttons
                .iter()
                .map(|(name, button)| (name.clone(), button.down))
                .collect(),
            axes: self
                .axes
                .iter()
                .map(|axis| (axis.name.clone(), axis.value))
                .collect(),
            mouse_position: self.mouse_position,
            mouse_delta: self.mouse_delta,
            mouse_wheel: self.mouse_wheel,
        }
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}

/// Feeds device state into [`Input`] once per frame.
pub trait InputSource {
    fn sample(&mut self, input: &mut Input);
}

/// Source that never reports anything; used headless and in tests.
#[derive(Debug, Default)]
pub struct NullInput;

impl InputSource for NullInput {
    fn sample(&mut self, _input: &mut Input) {}
}

/// Keyboard and mouse through macroquad.
pub struct MacroquadInput {
    keys: Vec<(KeyCode, &'static str)>,
}

impl MacroquadInput {
    pub fn new() -> Self {
        Self {
            keys: vec![
                (KeyCode::A, "left"),
                (KeyCode::Left, "left"),
                (KeyCode::D, "right"),
                (KeyCode::Right, "right"),
                (KeyCode::W, "up"),
                (KeyCode::Up, "up"),
                (KeyCode::S, "down"),
                (KeyCode::Down, "down"),
                (KeyCode::Space, "space"),
                (KeyCode::Enter, "enter"),
                (KeyCode::Escape, "escape"),
            ],
        }
    }
}

impl Default for MacroquadInput {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSource for MacroquadInput {
    fn sample(&mut self, input: &mut Input) {
        // several keys may map to one button name
        let mut held: HashMap<&'static str, bool> = HashMap::new();
        for (key, name) in &self.keys {
            *held.entry(*name).or_default() |= is_key_down(*key);
        }
        for (name, down) in held {
            input.set_button(name, down);
        }

        input.set_button("mouse0", is_mouse_button_down(MouseButton::Left));
        input.set_button("mouse1", is_mouse_button_down(MouseButton::Right));

        let (x, y) = mouse_position();
        input.move_mouse(x, y);
        let (_, wheel) = mouse_wheel();
        input.scroll(wheel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_edges_last_one_frame() {
        let mut input = Input::new();
        input.begin_frame(1);
        input.press("space");
        assert!(input.key("space"));
        assert!(input.key_down("space"));

        input.begin_frame(2);
        input.press("space");
        assert!(input.key("space"));
        assert!(!input.key_down("space"));

        input.release("space");
        assert!(input.key_up("space"));
        input.begin_frame(3);
        assert!(!input.key_up("space"));
    }

    #[test]
    fn test_added_axis_replaces_same_name() {
        let mut input = Input::new();
        let mut fast = Axis::buttons("horizontal", "d", "a");
        fast.sensitivity = 10.0;
        input.add_axis(fast);

        input.begin_frame(1);
        input.press("right");
        input.update(0.1);
        assert_eq!(input.axis("horizontal"), 0.0);

        input.press("d");
        input.update(0.05);
        assert_approx_eq!(input.axis("horizontal"), 0.5, 1e-5);
    }

    #[test]
    fn test_button_axis_ramps_and_falls_back() {
        let mut input = Input::new();
        input.begin_frame(1);
        input.press("right");
        input.update(0.1);
        assert_approx_eq!(input.axis("horizontal"), 0.3, 1e-5);

        for _ in 0..10 {
            input.update(0.1);
        }
        assert_eq!(input.axis("horizontal"), 1.0);

        input.release("right");
        input.update(0.1);
        assert_approx_eq!(input.axis("horizontal"), 0.7, 1e-5);
        for _ in 0..10 {
            input.update(0.1);
        }
        assert_eq!(input.axis("horizontal"), 0.0);
    }

    #[test]
    fn test_mouse_delta_resets_each_frame() {
        let mut input = Input::new();
        input.begin_frame(1);
        input.move_mouse(10.0, 5.0);
        input.move_mouse(12.0, 5.0);
        assert_eq!(input.mouse_delta, [12.0, 5.0]);

        input.begin_frame(2);
        assert_eq!(input.mouse_delta, [0.0, 0.0]);
        assert_eq!(input.mouse_position, [12.0, 5.0]);
    }

    #[test]
    fn test_sync_payload() {
        let mut input = Input::new();
        input.begin_frame(1);
        input.press("left");
        input.update(0.5);

        let sync = input.to_sync();
        assert_eq!(sync.buttons.get("left"), Some(&true));
        assert_approx_eq!(sync.axes["horizontal"], -1.0, 1e-6);
        assert_eq!(sync.axes["mouse_x"], 0.0);
    }

    #[test]
    fn test_unknown_names_read_as_idle() {
        let input = Input::new();
        assert!(!input.key("missing"));
        assert_eq!(input.axis("missing"), 0.0);
    }

    #[test]
    fn test_bind_records_surface() {
        let mut input = Input::new();
        assert_eq!(input.bound_surface(), None);
        input.bind(&Surface::new(10, 10));
        assert_eq!(input.bound_surface(), Some(0));
    }
}
