use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashSet;
use tracing::trace;
use x11rb::connection::Connection as _;
use x11rb::protocol::xproto::{self, ConnectionExt as _, EventMask};
use xdnd_core::backend::MessageChannel;
use xdnd_core::event::SelectionRequest;
use xdnd_core::os_error;
use xdnd_core::protocol::{ClientMessage, ProtocolAtoms};
use xdnd_core::{BackendError, XAtom, XWindow};

use crate::xdisplay::{X11Error, XConnection};

/// Windows of the host application that live on other connections.
pub(crate) type LocalWindows = Rc<RefCell<AHashSet<XWindow>>>;

/// Protocol messages and selection traffic of the drag source window.
#[derive(Debug)]
pub struct X11MessageChannel {
    xconn: Rc<XConnection>,
    window: xproto::Window,
    local_windows: LocalWindows,
}

impl X11MessageChannel {
    pub(crate) fn new(
        xconn: Rc<XConnection>,
        window: xproto::Window,
        local_windows: LocalWindows,
    ) -> Self {
        Self { xconn, window, local_windows }
    }
}

impl MessageChannel for X11MessageChannel {
    fn source_window(&self) -> XWindow {
        self.window
    }

    fn atoms(&self) -> ProtocolAtoms {
        self.xconn.atoms().protocol()
    }

    fn send(&mut self, destination: XWindow, message: ClientMessage) -> Result<(), BackendError> {
        let event = xproto::ClientMessageEvent::new(
            32,
            message.window,
            message.message_type,
            message.data,
        );
        self.xconn
            .xcb_connection()
            .send_event(false, destination, EventMask::NO_EVENT, event)
            .map_err(|err| os_error!(err))?
            .ignore_error();
        Ok(())
    }

    fn intern(&mut self, name: &str) -> Result<XAtom, BackendError> {
        self.xconn.intern(name).map_err(|err| os_error!(err))
    }

    fn atom_name(&mut self, atom: XAtom) -> Result<String, BackendError> {
        self.xconn.atom_name(atom).map_err(|err| os_error!(err))
    }

    fn set_atom_list(&mut self, property: XAtom, atoms: &[XAtom]) -> Result<(), BackendError> {
        self.xconn
            .change_property32(
                self.window,
                property,
                xproto::AtomEnum::ATOM,
                xproto::PropMode::REPLACE,
                atoms,
            )
            .map_err(|err| os_error!(err))?
            .ignore_error();
        Ok(())
    }

    fn delete_property(&mut self, property: XAtom) -> Result<(), BackendError> {
        self.xconn
            .xcb_connection()
            .delete_property(self.window, property)
            .map_err(|err| os_error!(err))?
            .ignore_error();
        Ok(())
    }

    fn acquire_selection(&mut self, selection: XAtom, time: u32) -> Result<(), BackendError> {
        let conn = self.xconn.xcb_connection();
        conn.set_selection_owner(self.window, selection, time)
            .map_err(|err| os_error!(err))?
            .ignore_error();

        let owner = conn
            .get_selection_owner(selection)
            .map_err(|err| os_error!(err))?
            .reply()
            .map_err(|err| os_error!(err))?
            .owner;
        if owner != self.window {
            return Err(os_error!(X11Error::SelectionNotOwned));
        }
        Ok(())
    }

    fn answer_selection(
        &mut self,
        request: &SelectionRequest,
        data: Option<&[u8]>,
    ) -> Result<(), BackendError> {
        // Obsolete clients leave the property unset and expect the target to be used.
        let property =
            if request.property == x11rb::NONE { request.target } else { request.property };

        let property = match data {
            Some(data) => {
                self.xconn
                    .change_property8(request.requestor, property, request.target, data)
                    .map_err(|err| os_error!(err))?
                    .ignore_error();
                property
            },
            None => x11rb::NONE,
        };
        trace!(requestor = request.requestor, refused = data.is_none(), "answering selection");

        let notify = xproto::SelectionNotifyEvent {
            response_type: xproto::SELECTION_NOTIFY_EVENT,
            sequence: 0,
            time: request.time,
            requestor: request.requestor,
            selection: request.selection,
            target: request.target,
            property,
        };
        self.xconn
            .xcb_connection()
            .send_event(false, request.requestor, EventMask::NO_EVENT, notify)
            .map_err(|err| os_error!(err))?
            .ignore_error();
        Ok(())
    }

    fn is_local_window(&self, window: XWindow) -> bool {
        window == self.window
            || self.xconn.owns_resource(window)
            || self.local_windows.borrow().contains(&window)
    }

    fn flush(&mut self) -> Result<(), BackendError> {
        self.xconn.xcb_connection().flush().map_err(|err| os_error!(err))
    }
}
