use std::rc::Rc;

use tracing::trace;
use x11rb::errors::ReplyError;
use x11rb::protocol::xproto::{self, ConnectionExt as _};
use x11rb::protocol::ErrorKind;
use xdnd_core::os_error;
use xdnd_core::resolver::WindowTree;
use xdnd_core::{BackendError, XWindow};

use crate::atoms::*;
use crate::util::GetPropertyError;
use crate::xdisplay::XConnection;

/// Window hierarchy queries over an X connection.
#[derive(Debug)]
pub struct X11WindowTree {
    xconn: Rc<XConnection>,
}

impl X11WindowTree {
    pub(crate) fn new(xconn: Rc<XConnection>) -> Self {
        Self { xconn }
    }

    fn read_window_property(
        &self,
        window: XWindow,
        property: xproto::Atom,
        property_type: xproto::AtomEnum,
    ) -> Result<Option<u32>, BackendError> {
        match self.xconn.get_cardinal(window, property, property_type) {
            Ok(value) => Ok(value),
            Err(err) if err.is_bad_window() => {
                trace!(window, "window vanished while reading property");
                Ok(None)
            },
            // Clients put all sorts of junk into these properties.
            Err(GetPropertyError::FormatMismatch(_) | GetPropertyError::TypeMismatch(_)) => Ok(None),
            Err(err) => Err(os_error!(err)),
        }
    }
}

fn is_bad_window(err: &ReplyError) -> bool {
    matches!(err, ReplyError::X11Error(e) if e.error_kind == ErrorKind::Window)
}

impl WindowTree for X11WindowTree {
    fn root(&self, screen: usize) -> Option<XWindow> {
        self.xconn.root(screen)
    }

    fn child_at(
        &self,
        parent: XWindow,
        x: i32,
        y: i32,
    ) -> Result<Option<(XWindow, i32, i32)>, BackendError> {
        let conn = self.xconn.xcb_connection();
        let (Ok(x), Ok(y)) = (i16::try_from(x), i16::try_from(y)) else {
            return Ok(None);
        };

        let child = match conn.translate_coordinates(parent, parent, x, y) {
            Ok(cookie) => match cookie.reply() {
                Ok(reply) => reply.child,
                Err(err) if is_bad_window(&err) => return Ok(None),
                Err(err) => return Err(os_error!(err)),
            },
            Err(err) => return Err(os_error!(err)),
        };
        if child == x11rb::NONE {
            return Ok(None);
        }

        match conn.translate_coordinates(parent, child, x, y).map_err(|err| os_error!(err))?.reply() {
            Ok(reply) => Ok(Some((child, reply.dst_x.into(), reply.dst_y.into()))),
            Err(err) if is_bad_window(&err) => Ok(None),
            Err(err) => Err(os_error!(err)),
        }
    }

    fn awareness(&self, window: XWindow) -> Result<Option<u32>, BackendError> {
        let aware = self.xconn.atoms()[XdndAware];
        self.read_window_property(window, aware, xproto::AtomEnum::ANY)
    }

    fn proxy_property(&self, window: XWindow) -> Result<Option<XWindow>, BackendError> {
        let proxy = self.xconn.atoms()[XdndProxy];
        let value = self.read_window_property(window, proxy, xproto::AtomEnum::WINDOW)?;
        Ok(value.filter(|&proxy| proxy != x11rb::NONE))
    }
}
