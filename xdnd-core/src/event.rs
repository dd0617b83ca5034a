//! Events fed into a running drag session.

use dpi::PhysicalPosition;

use crate::action::ModifiersState;
use crate::protocol::ClientMessage;
use crate::{XAtom, XWindow};

/// A request from another client for the contents of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionRequest {
    pub requestor: XWindow,
    pub selection: XAtom,
    /// The representation asked for.
    pub target: XAtom,
    /// Where the requestor wants the data stored.
    pub property: XAtom,
    pub time: u32,
}

/// Everything the event pump can hand to the engine.
///
/// Positions are in root window coordinates of `screen`.
#[derive(Debug, Clone, PartialEq)]
pub enum DragEvent {
    PointerMoved { position: PhysicalPosition<i32>, screen: usize, time: u32 },
    ButtonPressed { button: u8, time: u32 },
    ButtonReleased { button: u8, position: PhysicalPosition<i32>, time: u32 },
    /// A key was pressed or released. `modifiers` is the state after the key event.
    Keyboard { modifiers: ModifiersState, escape: bool, time: u32 },
    ClientMessage(ClientMessage),
    SelectionRequest(SelectionRequest),
    SelectionClear { selection: XAtom },
    SelectionNotify { selection: XAtom },
    /// The armed timeout elapsed.
    TimerExpired,
    /// A top-level window of this application was opened or closed.
    ToplevelsChanged,
    /// The window the drag started from is gone.
    SourceDestroyed,
    /// The host wants the drag gone.
    Cancel,
}
