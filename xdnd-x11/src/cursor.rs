use std::rc::Rc;

use ahash::AHashMap;
use cursor_icon::CursorIcon;
use dpi::PhysicalPosition;
use tracing::warn;
use x11rb::cursor::Handle as CursorHandle;
use x11rb::protocol::xproto::{self, ConnectionExt as _};
use x11rb::resource_manager;
use xdnd_core::feedback::{DragFeedback, DragPreview};
use xdnd_core::{BackendError, DragOutcome, WindowToken};

use crate::event_loop::grab_events;
use crate::xdisplay::{X11Error, XConnection};

/// Shows drag cursors on the active pointer grab and forwards everything else to the host.
pub struct X11CursorFeedback {
    xconn: Rc<XConnection>,
    handle: Option<CursorHandle>,
    cursor_cache: AHashMap<CursorIcon, xproto::Cursor>,
    inner: Box<dyn DragFeedback>,
}

impl X11CursorFeedback {
    pub(crate) fn new(xconn: Rc<XConnection>, inner: Box<dyn DragFeedback>) -> Self {
        let handle = match load_handle(&xconn) {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!("Failed to load the cursor theme, drag cursors are disabled: {err}");
                None
            },
        };
        Self { xconn, handle, cursor_cache: AHashMap::new(), inner }
    }

    fn get_cursor(&mut self, icon: CursorIcon) -> Option<xproto::Cursor> {
        if let Some(&cursor) = self.cursor_cache.get(&icon) {
            return Some(cursor);
        }

        let handle = self.handle.as_ref()?;
        let conn = self.xconn.xcb_connection();
        let cursor = std::iter::once(icon.name())
            .chain(icon.alt_names().iter().copied())
            .find_map(|name| match handle.load_cursor(conn, name) {
                Ok(cursor) if cursor != x11rb::NONE => Some(cursor),
                _ => None,
            })?;
        self.cursor_cache.insert(icon, cursor);
        Some(cursor)
    }

    fn update_cursor(&self, cursor: xproto::Cursor) {
        let result = self.xconn.xcb_connection().change_active_pointer_grab(
            cursor,
            x11rb::CURRENT_TIME,
            grab_events(),
        );
        match result {
            Ok(cookie) => cookie.ignore_error(),
            Err(err) => warn!("Failed to set the drag cursor: {err}"),
        }
    }
}

fn load_handle(xconn: &XConnection) -> Result<CursorHandle, X11Error> {
    let conn = xconn.xcb_connection();
    let database = resource_manager::new_from_default(conn)?;
    Ok(CursorHandle::new(conn, xconn.default_screen, &database)?.reply()?)
}

impl DragFeedback for X11CursorFeedback {
    fn create_preview(
        &mut self,
        screen: usize,
    ) -> Result<Option<Box<dyn DragPreview>>, BackendError> {
        self.inner.create_preview(screen)
    }

    fn set_cursor(&mut self, icon: CursorIcon) {
        if let Some(cursor) = self.get_cursor(icon) {
            self.update_cursor(cursor);
        }
        self.inner.set_cursor(icon);
    }

    fn restore_cursor(&mut self) {
        self.update_cursor(x11rb::NONE);
        self.inner.restore_cursor();
    }

    fn reorder_windows(&mut self, windows: &[WindowToken], position: PhysicalPosition<i32>) -> bool {
        self.inner.reorder_windows(windows, position)
    }

    fn drag_ended(&mut self, outcome: &DragOutcome) {
        self.inner.drag_ended(outcome);
    }
}

impl Drop for X11CursorFeedback {
    fn drop(&mut self) {
        let conn = self.xconn.xcb_connection();
        for (_, cursor) in self.cursor_cache.drain() {
            if let Err(err) = conn.free_cursor(cursor) {
                warn!("Failed to free cursor: {err}");
            }
        }
    }
}
