//! Recognizing the start of a drag from raw pointer input.

use dpi::PhysicalPosition;

use crate::action::ModifiersState;
use crate::config::DragConfig;
use crate::error::DragError;

/// The input that starts a drag: a held button and the motion that carried the pointer away from
/// the press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragTrigger {
    pub button: u8,
    /// Where the button went down.
    pub origin: PhysicalPosition<i32>,
    /// Where the pointer is now.
    pub position: PhysicalPosition<i32>,
    pub screen: usize,
    /// Server time of the latest event, used to claim the drag selection.
    pub time: u32,
    pub modifiers: ModifiersState,
}

impl DragTrigger {
    pub fn new(
        button: u8,
        origin: PhysicalPosition<i32>,
        position: PhysicalPosition<i32>,
        screen: usize,
        time: u32,
    ) -> Self {
        Self { button, origin, position, screen, time, modifiers: ModifiersState::empty() }
    }

    pub fn with_modifiers(mut self, modifiers: ModifiersState) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Whether the pointer moved further than `threshold` pixels on either axis.
    pub fn exceeds(&self, threshold: u32) -> bool {
        let dx = self.position.x.abs_diff(self.origin.x);
        let dy = self.position.y.abs_diff(self.origin.y);
        dx > threshold || dy > threshold
    }

    pub(crate) fn validate(&self, config: &DragConfig) -> Result<(), DragError> {
        if self.button != config.drag_button {
            return Err(DragError::ButtonNotHeld);
        }
        if !self.exceeds(config.drag_threshold) {
            return Err(DragError::BelowThreshold);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Press {
    origin: PhysicalPosition<i32>,
    screen: usize,
    fired: bool,
}

/// Tracks the drag button and reports when a press turned into a drag.
///
/// Feed it the host's pointer events; [`pointer_moved`](Self::pointer_moved) returns a trigger
/// exactly once per press, the first time the pointer leaves the threshold box.
#[derive(Debug, Clone)]
pub struct DragDetector {
    button: u8,
    threshold: u32,
    press: Option<Press>,
    modifiers: ModifiersState,
}

impl DragDetector {
    pub fn new(config: &DragConfig) -> Self {
        Self {
            button: config.drag_button,
            threshold: config.drag_threshold,
            press: None,
            modifiers: ModifiersState::empty(),
        }
    }

    pub fn button_pressed(&mut self, button: u8, position: PhysicalPosition<i32>, screen: usize) {
        if button == self.button {
            self.press = Some(Press { origin: position, screen, fired: false });
        }
    }

    pub fn button_released(&mut self, button: u8) {
        if button == self.button {
            self.press = None;
        }
    }

    pub fn modifiers_changed(&mut self, modifiers: ModifiersState) {
        self.modifiers = modifiers;
    }

    /// Whether the drag button is held.
    pub fn is_armed(&self) -> bool {
        self.press.is_some()
    }

    pub fn pointer_moved(
        &mut self,
        position: PhysicalPosition<i32>,
        screen: usize,
        time: u32,
    ) -> Option<DragTrigger> {
        let press = self.press.as_mut()?;
        if press.fired || press.screen != screen {
            return None;
        }

        let trigger = DragTrigger::new(self.button, press.origin, position, screen, time)
            .with_modifiers(self.modifiers);
        if !trigger.exceeds(self.threshold) {
            return None;
        }
        press.fired = true;
        Some(trigger)
    }
}
