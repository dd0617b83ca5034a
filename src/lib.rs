//! xdnd is the drag source half of the XDND protocol.
//!
//! It lets an application start a drag, negotiate with whatever window is under the pointer and
//! deliver the payload when the button is released. The protocol engine is platform independent;
//! on X11 systems the [`x11`] module provides a ready to use backend.
//!
//! # Starting a drag
//!
//! Drags begin from a button press that travelled far enough. [`DragDetector`] tracks the press
//! and hands out a [`DragTrigger`] once the threshold is crossed, which is passed to
//! [`DragManager::begin`]:
//!
//! ```no_run
//! # #[cfg(all(unix, not(target_vendor = "apple"), feature = "x11"))]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use xdnd::{DragConfig, DragDetector, DragOutcome, DragPayload, NoFeedback, UrlList};
//!
//! let backend = xdnd::x11::X11Backend::connect(None)?;
//! let config = DragConfig::default();
//! let mut detector = DragDetector::new(&config);
//! let mut manager = backend.drag_manager(config, Box::new(NoFeedback))?;
//!
//! // Forwarded from the application's own event handling.
//! detector.button_pressed(1, (100, 100).into(), 0);
//! if let Some(trigger) = detector.pointer_moved((120, 100).into(), 0, 0) {
//!     let payload = DragPayload::from(UrlList::new(["/home/user/notes.txt"]));
//!     match manager.begin(payload, trigger)? {
//!         DragOutcome::Dropped { action, success } => println!("{action:?} ({success})"),
//!         outcome => println!("{outcome:?}"),
//!     }
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(all(unix, not(target_vendor = "apple"), feature = "x11")))]
//! # fn main() {}
//! ```
//!
//! [`DragManager::begin`] blocks until the drag ends. Every event the drag needs is read from the
//! backend while it runs; the [`DragOutcome`] says what happened to the payload.
//!
//! # Other backends
//!
//! The engine only talks to the collaborator traits in [`backend`], [`resolver`] and
//! [`feedback`], so anything that can send client messages and walk a window tree can host it.
//! Pass the implementations to [`DragManager::new`].
//!
//! # Cargo Features
//!
//! xdnd provides the following Cargo features:
//!
//! * `x11` (enabled by default): On Unix platforms, enables the X11 backend.
//! * `serde`: Enables serialization/deserialization of the public value types using serde.
#![cfg_attr(docsrs, feature(doc_auto_cfg, doc_cfg_hide), doc(cfg_hide(doc, docsrs)))]
#![forbid(unsafe_code)]

pub use xdnd_core::{
    action, backend, config, error, event, feedback, gesture, manager, mime, payload, protocol,
    resolver, session,
};
pub use xdnd_core::{
    os_error, Audience, BackendError, CancelReason, DndAction, DragConfig, DragDetector,
    DragError, DragEvent, DragFeedback, DragManager, DragOutcome, DragPayload, DragPreview,
    DragTrigger, MimeNegotiator, MimeType, ModifiersState, NoFeedback, SelectionRequest,
    TargetDescriptor, TargetResolver, UrlList, WindowToken, XAtom, XWindow, XDND_VERSION,
};
pub use {cursor_icon, dpi};

/// The X11 backend.
///
/// [`X11Backend`](x11::X11Backend) connects to the display and builds [`DragManager`]s that read
/// their events from it.
#[cfg(x11_platform)]
pub mod x11 {
    pub use xdnd_x11::{
        EventInjector, X11Backend, X11CursorFeedback, X11Error, X11EventPump, X11MessageChannel,
        X11Timer, X11WindowTree,
    };

    /// Connect to `$DISPLAY` and create a drag source window.
    pub fn connect() -> Result<X11Backend, X11Error> {
        X11Backend::connect(None)
    }
}
