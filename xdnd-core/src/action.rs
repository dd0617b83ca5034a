//! Drag actions and the keyboard modifiers that select them.

use bitflags::bitflags;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolAtoms;
use crate::XAtom;

bitflags! {
    /// Represents the keyboard modifiers held during a drag.
    ///
    /// Only [`SHIFT`](Self::SHIFT) and [`CONTROL`](Self::CONTROL) influence the requested action;
    /// the other flags are carried so hosts can forward the full state.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct ModifiersState: u32 {
        /// The "shift" key.
        const SHIFT = 0b100;
        /// The "control" key.
        const CONTROL = 0b100 << 3;
        /// The "alt" key.
        const ALT = 0b100 << 6;
        /// This is the "windows" key on PC.
        const META = 0b100 << 9;
    }
}

impl ModifiersState {
    /// Returns whether the shift modifier is active.
    pub fn shift_key(&self) -> bool {
        self.intersects(Self::SHIFT)
    }

    /// Returns whether the control modifier is active.
    pub fn control_key(&self) -> bool {
        self.intersects(Self::CONTROL)
    }

    /// The part of the state that selects an action.
    pub(crate) fn action_mask(self) -> Self {
        self & (Self::SHIFT | Self::CONTROL)
    }
}

/// A transfer action as defined by the XDND protocol.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DndAction {
    Copy,
    Move,
    Link,
    Ask,
    Private,
    #[default]
    None,
}

impl DndAction {
    /// Map a target supplied atom back to an action.
    ///
    /// Returns `None` for atoms that do not name an action, which makes the carrying message
    /// malformed.
    pub fn from_atom(atom: XAtom, atoms: &ProtocolAtoms) -> Option<Self> {
        match atom {
            0 => Some(DndAction::None),
            x if x == atoms.action_copy => Some(DndAction::Copy),
            x if x == atoms.action_move => Some(DndAction::Move),
            x if x == atoms.action_link => Some(DndAction::Link),
            x if x == atoms.action_ask => Some(DndAction::Ask),
            x if x == atoms.action_private => Some(DndAction::Private),
            _ => None,
        }
    }

    pub fn to_atom(self, atoms: &ProtocolAtoms) -> XAtom {
        match self {
            DndAction::Copy => atoms.action_copy,
            DndAction::Move => atoms.action_move,
            DndAction::Link => atoms.action_link,
            DndAction::Ask => atoms.action_ask,
            DndAction::Private => atoms.action_private,
            DndAction::None => 0,
        }
    }

    /// The action requested in `XdndPosition` for the given modifiers.
    pub fn requested(modifiers: ModifiersState) -> Self {
        match modifiers.action_mask() {
            m if m == ModifiersState::SHIFT => DndAction::Move,
            m if m == ModifiersState::SHIFT | ModifiersState::CONTROL => DndAction::Link,
            _ => DndAction::Copy,
        }
    }

    /// The actions announced through `XdndActionList` for the given modifiers.
    ///
    /// A single modifier combination pins one action; without modifiers every action is offered so
    /// file managers can pick the one they prefer.
    pub fn offered(modifiers: ModifiersState) -> &'static [DndAction] {
        match modifiers.action_mask() {
            m if m == ModifiersState::CONTROL => &[DndAction::Copy],
            m if m == ModifiersState::SHIFT => &[DndAction::Move],
            m if m == ModifiersState::SHIFT | ModifiersState::CONTROL => &[DndAction::Link],
            _ => &[DndAction::Copy, DndAction::Move, DndAction::Link],
        }
    }
}
