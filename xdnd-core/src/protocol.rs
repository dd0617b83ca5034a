//! The XDND wire format.
//!
//! Every XDND message is a format 32 `ClientMessage` with five data words. This module packs and
//! unpacks those words; it never talks to the server itself.
//!
//! See <https://www.freedesktop.org/wiki/Specifications/XDND/>.

use crate::{XAtom, XWindow};

/// Bit 0 of the second `XdndEnter` word: the type list property holds more than three types.
const ENTER_MORE_TYPES: u32 = 1;
/// Bit 0 of the second `XdndStatus` word: the target accepts the drop.
const STATUS_ACCEPT: u32 = 1;
/// Bit 1 of the second `XdndStatus` word: send positions even inside the rectangle.
const STATUS_ALWAYS_RESEND: u32 = 1 << 1;
/// Bit 0 of the second `XdndFinished` word: the drop was performed.
const FINISHED_SUCCESS: u32 = 1;

/// The atoms the engine needs to speak the protocol, interned by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolAtoms {
    pub aware: XAtom,
    pub proxy: XAtom,
    pub enter: XAtom,
    pub position: XAtom,
    pub status: XAtom,
    pub leave: XAtom,
    pub drop: XAtom,
    pub finished: XAtom,
    pub selection: XAtom,
    pub type_list: XAtom,
    pub action_list: XAtom,
    pub action_copy: XAtom,
    pub action_move: XAtom,
    pub action_link: XAtom,
    pub action_ask: XAtom,
    pub action_private: XAtom,
}

impl ProtocolAtoms {
    /// Distinct placeholder atoms for exercising the engine without a server.
    #[doc(hidden)]
    pub fn for_testing() -> Self {
        Self {
            aware: 301,
            proxy: 302,
            enter: 303,
            position: 304,
            status: 305,
            leave: 306,
            drop: 307,
            finished: 308,
            selection: 309,
            type_list: 310,
            action_list: 311,
            action_copy: 312,
            action_move: 313,
            action_link: 314,
            action_ask: 315,
            action_private: 316,
        }
    }
}

/// A raw format 32 client message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientMessage {
    /// The `window` field of the event. For XDND this is always the real target, even when the
    /// message is delivered to a proxy.
    pub window: XWindow,
    pub message_type: XAtom,
    pub data: [u32; 5],
}

/// A rectangle in root window coordinates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// A rectangle without area asks for a position on every motion.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && y >= self.y
            && i64::from(x) < i64::from(self.x) + i64::from(self.width)
            && i64::from(y) < i64::from(self.y) + i64::from(self.height)
    }
}

/// Pack a coordinate pair as `x << 16 | y`.
pub fn pack_point(x: i32, y: i32) -> u32 {
    ((x as u32 & 0xffff) << 16) | (y as u32 & 0xffff)
}

/// Inverse of [`pack_point`]; coordinates are signed 16-bit values.
pub fn unpack_point(word: u32) -> (i32, i32) {
    (i32::from((word >> 16) as u16 as i16), i32::from(word as u16 as i16))
}

fn unpack_size(word: u32) -> (u32, u32) {
    (word >> 16, word & 0xffff)
}

/// The messages of the source side conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XdndMessage {
    Enter { source: XWindow, version: u32, more_types: bool, types: [XAtom; 3] },
    Position { source: XWindow, x: i32, y: i32, time: u32, action: XAtom },
    Status { target: XWindow, accept: bool, always_resend: bool, rect: Rect, action: XAtom },
    Leave { source: XWindow },
    Drop { source: XWindow, time: u32 },
    Finished { target: XWindow, success: bool, action: XAtom },
}

impl XdndMessage {
    /// Build the wire form addressed to `target`.
    pub fn encode(&self, target: XWindow, atoms: &ProtocolAtoms) -> ClientMessage {
        let (message_type, data) = match *self {
            XdndMessage::Enter { source, version, more_types, types } => {
                let flags = (version << 24) | if more_types { ENTER_MORE_TYPES } else { 0 };
                (atoms.enter, [source, flags, types[0], types[1], types[2]])
            },
            XdndMessage::Position { source, x, y, time, action } => {
                (atoms.position, [source, 0, pack_point(x, y), time, action])
            },
            XdndMessage::Status { target, accept, always_resend, rect, action } => {
                let mut flags = 0;
                if accept {
                    flags |= STATUS_ACCEPT;
                }
                if always_resend {
                    flags |= STATUS_ALWAYS_RESEND;
                }
                let size = ((rect.width & 0xffff) << 16) | (rect.height & 0xffff);
                (atoms.status, [target, flags, pack_point(rect.x, rect.y), size, action])
            },
            XdndMessage::Leave { source } => (atoms.leave, [source, 0, 0, 0, 0]),
            XdndMessage::Drop { source, time } => (atoms.drop, [source, 0, time, 0, 0]),
            XdndMessage::Finished { target, success, action } => {
                let flags = if success { FINISHED_SUCCESS } else { 0 };
                (atoms.finished, [target, flags, action, 0, 0])
            },
        };
        ClientMessage { window: target, message_type, data }
    }

    /// Parse a client message. Messages that are not XDND yield `None`.
    pub fn decode(message: &ClientMessage, atoms: &ProtocolAtoms) -> Option<Self> {
        let data = message.data;
        let kind = message.message_type;
        if kind == atoms.enter {
            Some(XdndMessage::Enter {
                source: data[0],
                version: data[1] >> 24,
                more_types: data[1] & ENTER_MORE_TYPES != 0,
                types: [data[2], data[3], data[4]],
            })
        } else if kind == atoms.position {
            let (x, y) = unpack_point(data[2]);
            Some(XdndMessage::Position { source: data[0], x, y, time: data[3], action: data[4] })
        } else if kind == atoms.status {
            let (x, y) = unpack_point(data[2]);
            let (width, height) = unpack_size(data[3]);
            Some(XdndMessage::Status {
                target: data[0],
                accept: data[1] & STATUS_ACCEPT != 0,
                always_resend: data[1] & STATUS_ALWAYS_RESEND != 0,
                rect: Rect { x, y, width, height },
                action: data[4],
            })
        } else if kind == atoms.leave {
            Some(XdndMessage::Leave { source: data[0] })
        } else if kind == atoms.drop {
            Some(XdndMessage::Drop { source: data[0], time: data[2] })
        } else if kind == atoms.finished {
            Some(XdndMessage::Finished {
                target: data[0],
                success: data[1] & FINISHED_SUCCESS != 0,
                action: data[2],
            })
        } else {
            None
        }
    }

    /// Human readable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            XdndMessage::Enter { .. } => "XdndEnter",
            XdndMessage::Position { .. } => "XdndPosition",
            XdndMessage::Status { .. } => "XdndStatus",
            XdndMessage::Leave { .. } => "XdndLeave",
            XdndMessage::Drop { .. } => "XdndDrop",
            XdndMessage::Finished { .. } => "XdndFinished",
        }
    }
}
