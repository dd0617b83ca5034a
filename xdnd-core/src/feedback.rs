//! Visual feedback the embedding UI provides during a drag.

use cursor_icon::CursorIcon;
use dpi::PhysicalPosition;

use crate::action::DndAction;
use crate::error::BackendError;
use crate::payload::WindowToken;
use crate::session::DragOutcome;

/// The image that follows the pointer.
///
/// Dropping the preview releases it.
pub trait DragPreview {
    fn move_to(&mut self, position: PhysicalPosition<i32>);

    fn hide(&mut self);
}

/// Hooks into the host UI. Every method has a no-op default.
pub trait DragFeedback {
    /// Create a preview on `screen`. Returning `Ok(None)` runs the drag without one.
    fn create_preview(
        &mut self,
        _screen: usize,
    ) -> Result<Option<Box<dyn DragPreview>>, BackendError> {
        Ok(None)
    }

    fn set_cursor(&mut self, _cursor: CursorIcon) {}

    /// Called once when the session ends.
    fn restore_cursor(&mut self) {}

    /// Move the host's own top-level windows so the first one lands at `position` and every
    /// further one 20 pixels below and to the right of the previous.
    ///
    /// Used for window token payloads dropped where no target accepted them. Returns whether the
    /// windows were moved.
    fn reorder_windows(
        &mut self,
        _windows: &[WindowToken],
        _position: PhysicalPosition<i32>,
    ) -> bool {
        false
    }

    fn drag_ended(&mut self, _outcome: &DragOutcome) {}
}

impl<T: DragFeedback + ?Sized> DragFeedback for Box<T> {
    fn create_preview(
        &mut self,
        screen: usize,
    ) -> Result<Option<Box<dyn DragPreview>>, BackendError> {
        (**self).create_preview(screen)
    }

    fn set_cursor(&mut self, cursor: CursorIcon) {
        (**self).set_cursor(cursor)
    }

    fn restore_cursor(&mut self) {
        (**self).restore_cursor()
    }

    fn reorder_windows(&mut self, windows: &[WindowToken], position: PhysicalPosition<i32>) -> bool {
        (**self).reorder_windows(windows, position)
    }

    fn drag_ended(&mut self, outcome: &DragOutcome) {
        (**self).drag_ended(outcome)
    }
}

/// Feedback that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl DragFeedback for NoFeedback {}

/// The cursor shown for the current negotiation state.
///
/// `local_reorder` is set while window tokens are dragged over the screen they came from, where a
/// release rearranges windows instead of being refused.
pub fn drag_cursor(accepted: bool, action: DndAction, local_reorder: bool) -> CursorIcon {
    if !accepted {
        return if local_reorder { CursorIcon::Default } else { CursorIcon::NoDrop };
    }
    match action {
        DndAction::Copy => CursorIcon::Copy,
        DndAction::Link => CursorIcon::Alias,
        DndAction::Move => CursorIcon::Move,
        DndAction::Ask | DndAction::Private | DndAction::None => CursorIcon::Default,
    }
}
