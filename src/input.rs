use std::collections::HashSet;

use glam::Vec2;
use log::debug;
use serde::{Deserialize, Serialize};

/// Size of the drawable area in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Maps a pixel position (origin top-left, y down) to normalized device
    /// coordinates (origin centered, y up).
    pub fn to_ndc(&self, position: Vec2) -> Vec2 {
        Vec2::new(
            position.x / self.width as f32 * 2.0 - 1.0,
            -(position.y / self.height as f32) * 2.0 + 1.0,
        )
    }
}

/// Pointer position used for raycasting.
///
/// It only changes on clicks; moving the cursor without clicking keeps the
/// last clicked position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointerState {
    ndc: Vec2,
}

impl PointerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ndc(&self) -> Vec2 {
        self.ndc
    }

    /// Records a click at `position` (pixels) and returns the new NDC.
    pub fn click(&mut self, position: Vec2, viewport: &Viewport) -> Vec2 {
        self.ndc = viewport.to_ndc(position);
        debug!("pointer at ({:.3}, {:.3})", self.ndc.x, self.ndc.y);
        self.ndc
    }
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);
    pub const MIDDLE: Self = Self(2);

    pub fn new(index: u8) -> Self {
        Self(index)
    }
}

/// Raw button and cursor bookkeeping used for orbit dragging and click
/// detection.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    buttons: HashSet<MouseButton>,
    cursor: Vec2,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, button: MouseButton) {
        self.buttons.insert(button);
    }

    /// Returns `true` when the button was held, i.e. the release completes a
    /// click.
    pub fn release(&mut self, button: MouseButton) -> bool {
        self.buttons.remove(&button)
    }

    pub fn is_down(&self, button: MouseButton) -> bool {
        self.buttons.contains(&button)
    }

    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    /// Moves the cursor and returns the pixel delta travelled.
    pub fn move_cursor(&mut self, position: Vec2) -> Vec2 {
        let delta = position - self.cursor;
        self.cursor = position;
        delta
    }
}
