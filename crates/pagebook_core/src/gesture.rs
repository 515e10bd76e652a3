//! Press/hold/drag timing.
//!
//! Hosts feed pointer events and the frame delta; `update` reports when a
//! hold has lasted long enough to act on. Dragging suspends the hold.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldMode {
    /// Fires once per press.
    OneShot,
    /// Keeps firing while held, at most once per `cooldown`.
    Repeat { cooldown: Duration },
}

#[derive(Debug, Clone)]
pub struct HoldGesture {
    required: Duration,
    mode: HoldMode,
    pressed: bool,
    dragging: bool,
    held: Duration,
    cooldown_left: Duration,
    fired: bool,
}

impl HoldGesture {
    pub fn new(required: Duration, mode: HoldMode) -> Self {
        Self {
            required,
            mode,
            pressed: false,
            dragging: false,
            held: Duration::ZERO,
            cooldown_left: Duration::ZERO,
            fired: false,
        }
    }

    pub fn pointer_down(&mut self) {
        if self.dragging {
            return;
        }
        self.pressed = true;
        self.held = Duration::ZERO;
        self.fired = false;
    }

    pub fn pointer_up(&mut self) {
        self.pressed = false;
        self.held = Duration::ZERO;
    }

    pub fn begin_drag(&mut self) {
        self.dragging = true;
        self.pressed = false;
        self.held = Duration::ZERO;
    }

    pub fn end_drag(&mut self) {
        self.dragging = false;
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Advances timers by `dt`; returns `true` on the tick the hold fires.
    pub fn update(&mut self, dt: Duration) -> bool {
        self.cooldown_left = self.cooldown_left.saturating_sub(dt);
        if !self.pressed || self.dragging {
            return false;
        }

        self.held = self.held.saturating_add(dt);
        if self.held < self.required || !self.cooldown_left.is_zero() {
            return false;
        }

        match self.mode {
            HoldMode::OneShot => {
                self.pressed = false;
                self.held = Duration::ZERO;
                self.fired = true;
            }
            HoldMode::Repeat { cooldown } => {
                self.cooldown_left = cooldown;
                self.fired = true;
            }
        }
        true
    }

    /// Whether the current or last press has fired.
    pub fn has_fired(&self) -> bool {
        self.fired
    }
}
