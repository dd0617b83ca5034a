//! Per drag state.

use cursor_icon::CursorIcon;
use dpi::PhysicalPosition;

use crate::action::{DndAction, ModifiersState};
use crate::feedback::DragPreview;
use crate::payload::DragPayload;
use crate::protocol::Rect;
use crate::resolver::TargetDescriptor;
use crate::XWindow;

/// How a drag session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// The target performed the drop and confirmed it with `XdndFinished`.
    Dropped { action: DndAction, success: bool },
    /// The drop was sent but the target never confirmed it.
    DropUnconfirmed { action: DndAction },
    /// Nothing accepted the drop.
    NotAccepted,
    /// The application's own windows were rearranged at the release point.
    LocalDrop,
    Cancelled(CancelReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Escape was pressed.
    UserEscape,
    /// The window the drag started from was destroyed.
    SourceDestroyed,
    /// The host injected [`DragEvent::Cancel`](crate::DragEvent::Cancel).
    Host,
    /// The display connection failed or a resource could not be created.
    Backend,
}

/// What the armed timeout means when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimeoutAction {
    /// The pointer moved to a new target while the old one still owes a status.
    StatusWait,
    /// The button was released while a status was outstanding.
    ReleaseWait,
    /// `XdndDrop` was sent and `XdndFinished` is due.
    Finished,
}

/// What a release decided while the last status was still outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseOutcome {
    /// Drop if the outstanding status accepts.
    Drop,
    Leave,
}

/// The latest motion received while a status was outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingMove {
    pub position: PhysicalPosition<i32>,
    pub screen: usize,
    pub time: u32,
    pub force: bool,
}

/// The state of one drag operation, from the first motion until termination.
pub(crate) struct DragSession {
    pub payload: DragPayload,

    /// The window under the pointer, whether or not it speaks the protocol.
    pub target: Option<TargetDescriptor>,
    /// `XdndEnter` was sent to `target`.
    pub entered: bool,
    /// Negotiated with `target`, valid while `entered`.
    pub version: u32,
    pub awaiting_status: bool,
    /// At least one status arrived from the current target.
    pub status_received: bool,
    pub rect: Rect,
    pub always_resend: bool,
    pub action: DndAction,
    pub accepted: bool,

    pub drop_sent: bool,
    pub dropped_on: Option<XWindow>,
    pub cancelled: bool,
    pub released: bool,
    pub pending_release: Option<ReleaseOutcome>,
    pub pending_move: Option<PendingMove>,
    pub timeout: Option<TimeoutAction>,

    pub origin_screen: usize,
    pub current_screen: usize,
    pub position: PhysicalPosition<i32>,
    pub time: u32,
    pub modifiers: ModifiersState,

    pub preview: Option<Box<dyn DragPreview>>,
    pub cursor: Option<CursorIcon>,
}

impl DragSession {
    pub fn new(
        payload: DragPayload,
        screen: usize,
        position: PhysicalPosition<i32>,
        time: u32,
        modifiers: ModifiersState,
    ) -> Self {
        Self {
            payload,
            target: None,
            entered: false,
            version: 0,
            awaiting_status: false,
            status_received: false,
            rect: Rect::default(),
            always_resend: false,
            action: DndAction::None,
            accepted: false,
            drop_sent: false,
            dropped_on: None,
            cancelled: false,
            released: false,
            pending_release: None,
            pending_move: None,
            timeout: None,
            origin_screen: screen,
            current_screen: screen,
            position,
            time,
            modifiers,
            preview: None,
            cursor: None,
        }
    }

    /// The target that is owed an `XdndLeave` if the drag moves away.
    pub fn engaged(&self) -> Option<TargetDescriptor> {
        self.target.filter(|_| self.entered && !self.drop_sent)
    }

    /// Whether a status from `window` should be honored.
    pub fn is_live_target(&self, window: XWindow) -> bool {
        self.engaged().is_some_and(|target| target.window == window)
    }

    /// Forget everything negotiated with the current target.
    pub fn reset_target(&mut self) {
        self.entered = false;
        self.version = 0;
        self.awaiting_status = false;
        self.status_received = false;
        self.rect = Rect::default();
        self.always_resend = false;
        self.action = DndAction::None;
        self.accepted = false;
    }

    /// Whether a position at `(x, y)` must be sent to the current target.
    pub fn needs_position(&self, x: i32, y: i32, force: bool) -> bool {
        self.rect.is_empty() || self.always_resend || !self.rect.contains(x, y) || force
    }

    /// Window tokens over their own screen are rearranged rather than refused.
    pub fn local_reorder(&self) -> bool {
        self.payload.windows().is_some() && self.current_screen == self.origin_screen
    }

    pub fn hide_preview(&mut self) {
        if let Some(preview) = self.preview.as_mut() {
            preview.hide();
        }
    }
}
