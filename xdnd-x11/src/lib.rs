//! # X11
//!
//! Runs an XDND drag source over an [x11rb] connection.
//!
//! [`X11Backend`] owns the connection and the source window that identifies this process to drop
//! targets. [`X11Backend::drag_manager`] wires the engine collaborators together:
//!
//! ```no_run
//! use xdnd_core::{DragConfig, DragPayload, DragTrigger, NoFeedback};
//! use xdnd_x11::X11Backend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = X11Backend::connect(None)?;
//! let mut manager = backend.drag_manager(DragConfig::default(), Box::new(NoFeedback))?;
//! let trigger = DragTrigger::new(1, (10, 10).into(), (40, 10).into(), 0, x11rb::CURRENT_TIME);
//! let outcome = manager.begin(DragPayload::from("hello"), trigger)?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

use std::cell::Cell;
use std::rc::Rc;

use tracing::warn;
use x11rb::connection::Connection as _;
use x11rb::protocol::xproto::{
    self, ChangeWindowAttributesAux, ConnectionExt as _, CreateWindowAux, EventMask, WindowClass,
};
use xdnd_core::event::DragEvent;
use xdnd_core::feedback::DragFeedback;
use xdnd_core::{DragConfig, DragManager, XWindow};

pub use crate::channel::X11MessageChannel;
pub use crate::cursor::X11CursorFeedback;
pub use crate::event_loop::{X11EventPump, X11Timer};
pub use crate::tree::X11WindowTree;
pub use crate::xdisplay::X11Error;

mod atoms;
mod channel;
mod cursor;
mod event_loop;
mod tree;
mod util;
mod xdisplay;

use crate::channel::LocalWindows;
use crate::event_loop::{Deadline, Injected};
use crate::xdisplay::XConnection;

/// An X connection prepared for dragging.
#[derive(Debug)]
pub struct X11Backend {
    xconn: Rc<XConnection>,
    window: xproto::Window,
    owns_window: bool,
    local_windows: LocalWindows,
    injected: Injected,
}

impl X11Backend {
    /// Connect to `display_name`, or `$DISPLAY` when `None`, and create a source window.
    pub fn connect(display_name: Option<&str>) -> Result<Self, X11Error> {
        let xconn = Rc::new(XConnection::new(display_name)?);
        let window = create_source_window(&xconn)?;
        Ok(Self {
            xconn,
            window,
            owns_window: true,
            local_windows: Default::default(),
            injected: Default::default(),
        })
    }

    /// Identify the drag with an existing window of this connection instead.
    ///
    /// Structure events are selected on the window so its destruction cancels the drag.
    pub fn with_source_window(mut self, window: XWindow) -> Result<Self, X11Error> {
        let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::STRUCTURE_NOTIFY);
        let conn = self.xconn.xcb_connection();
        conn.change_window_attributes(window, &aux)?.check()?;
        self.destroy_owned_window();
        self.window = window;
        self.owns_window = false;
        Ok(self)
    }

    pub fn source_window(&self) -> XWindow {
        self.window
    }

    /// Treat `window` as belonging to this application.
    ///
    /// Windows created through this connection are recognized automatically; this is for windows
    /// of the same process on other connections. Local windows are offered internal types.
    pub fn add_local_window(&self, window: XWindow) {
        self.local_windows.borrow_mut().insert(window);
    }

    pub fn remove_local_window(&self, window: XWindow) {
        self.local_windows.borrow_mut().remove(&window);
    }

    /// A handle for injecting events into a running drag.
    pub fn injector(&self) -> EventInjector {
        EventInjector { queue: self.injected.clone() }
    }

    /// Build a manager running drags over this connection.
    ///
    /// `feedback` receives preview and window reorder requests; drag cursors are shown on the
    /// pointer grab before being forwarded to it.
    pub fn drag_manager(
        &self,
        config: DragConfig,
        feedback: Box<dyn DragFeedback>,
    ) -> Result<DragManager, X11Error> {
        let deadline = Deadline::new(Cell::new(None));
        let channel =
            X11MessageChannel::new(self.xconn.clone(), self.window, self.local_windows.clone());
        let tree = X11WindowTree::new(self.xconn.clone());
        let timer = X11Timer::new(deadline.clone());
        let pump =
            X11EventPump::new(self.xconn.clone(), self.window, deadline, self.injected.clone())?;
        let feedback = X11CursorFeedback::new(self.xconn.clone(), feedback);

        Ok(DragManager::new(
            config,
            Box::new(channel),
            Box::new(tree),
            Box::new(timer),
            Box::new(pump),
            Box::new(feedback),
        ))
    }

    fn destroy_owned_window(&mut self) {
        if !self.owns_window {
            return;
        }
        let conn = self.xconn.xcb_connection();
        if let Err(err) = conn.destroy_window(self.window).map(|cookie| cookie.ignore_error()) {
            warn!("Failed to destroy the drag source window: {err}");
        }
        if let Err(err) = conn.flush() {
            warn!("Failed to flush: {err}");
        }
        self.owns_window = false;
    }
}

impl Drop for X11Backend {
    fn drop(&mut self) {
        self.destroy_owned_window();
    }
}

/// Queues events for the drag running on the same thread.
///
/// The pump delivers injected events before it blocks again, so this is meant to be used from
/// callbacks the drag invokes, such as [`DragFeedback`].
#[derive(Debug, Clone)]
pub struct EventInjector {
    queue: Injected,
}

impl EventInjector {
    pub fn inject(&self, event: DragEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    /// A top-level window of the application was opened or closed.
    pub fn toplevels_changed(&self) {
        self.inject(DragEvent::ToplevelsChanged);
    }

    pub fn cancel(&self) {
        self.inject(DragEvent::Cancel);
    }
}

/// An unmapped input-only window the drag speaks for.
fn create_source_window(xconn: &XConnection) -> Result<xproto::Window, X11Error> {
    let conn = xconn.xcb_connection();
    let root = xconn.root(xconn.default_screen).ok_or(X11Error::NoScreen(xconn.default_screen))?;
    let window = conn.generate_id()?;
    let aux = CreateWindowAux::new().event_mask(EventMask::STRUCTURE_NOTIFY).override_redirect(1);
    conn.create_window(
        x11rb::COPY_DEPTH_FROM_PARENT,
        window,
        root,
        -100,
        -100,
        1,
        1,
        0,
        WindowClass::INPUT_ONLY,
        x11rb::COPY_FROM_PARENT,
        &aux,
    )?
    .check()?;
    Ok(window)
}
