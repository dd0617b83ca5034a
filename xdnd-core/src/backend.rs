//! Interfaces to the windowing system.
//!
//! The engine never touches a connection directly. A backend provides these collaborators and the
//! [`DragManager`](crate::DragManager) drives them; every call is made from the thread that runs
//! the drag.

use std::time::Duration;

use crate::error::BackendError;
use crate::event::{DragEvent, SelectionRequest};
use crate::protocol::{ClientMessage, ProtocolAtoms};
use crate::{XAtom, XWindow};

/// Sends protocol messages and owns the source side properties.
///
/// Sends are fire and forget; an `Err` means the request could not even be queued.
pub trait MessageChannel {
    /// The window that identifies this process to targets.
    fn source_window(&self) -> XWindow;

    fn atoms(&self) -> ProtocolAtoms;

    /// Deliver `message` to `destination`, which is either the target or its proxy.
    fn send(&mut self, destination: XWindow, message: ClientMessage) -> Result<(), BackendError>;

    fn intern(&mut self, name: &str) -> Result<XAtom, BackendError>;

    fn atom_name(&mut self, atom: XAtom) -> Result<String, BackendError>;

    /// Replace an atom list property on the source window.
    fn set_atom_list(&mut self, property: XAtom, atoms: &[XAtom]) -> Result<(), BackendError>;

    /// Remove a property from the source window.
    fn delete_property(&mut self, property: XAtom) -> Result<(), BackendError>;

    /// Take ownership of `selection` for the source window.
    fn acquire_selection(&mut self, selection: XAtom, time: u32) -> Result<(), BackendError>;

    /// Answer a selection request. `None` refuses it.
    fn answer_selection(
        &mut self,
        request: &SelectionRequest,
        data: Option<&[u8]>,
    ) -> Result<(), BackendError>;

    /// Whether `window` belongs to this process.
    fn is_local_window(&self, window: XWindow) -> bool {
        window == self.source_window()
    }

    /// Push queued requests to the server.
    fn flush(&mut self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// A single slot, one shot timer.
///
/// Expiry is reported by the pump as [`DragEvent::TimerExpired`]. Arming replaces whatever was
/// armed before.
pub trait TimeoutScheduler {
    fn arm(&mut self, after: Duration);

    fn disarm(&mut self);
}

/// What the pump should do after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpStatus {
    Continue,
    Exit,
}

/// The blocking loop the session runs in.
pub trait EventPump {
    /// Feed events to `handler` until it returns [`PumpStatus::Exit`].
    ///
    /// Events that are not relevant to the drag stay with the host.
    fn run(
        &mut self,
        handler: &mut dyn FnMut(DragEvent) -> PumpStatus,
    ) -> Result<(), BackendError>;
}

impl<T: MessageChannel + ?Sized> MessageChannel for Box<T> {
    fn source_window(&self) -> XWindow {
        (**self).source_window()
    }

    fn atoms(&self) -> ProtocolAtoms {
        (**self).atoms()
    }

    fn send(&mut self, destination: XWindow, message: ClientMessage) -> Result<(), BackendError> {
        (**self).send(destination, message)
    }

    fn intern(&mut self, name: &str) -> Result<XAtom, BackendError> {
        (**self).intern(name)
    }

    fn atom_name(&mut self, atom: XAtom) -> Result<String, BackendError> {
        (**self).atom_name(atom)
    }

    fn set_atom_list(&mut self, property: XAtom, atoms: &[XAtom]) -> Result<(), BackendError> {
        (**self).set_atom_list(property, atoms)
    }

    fn delete_property(&mut self, property: XAtom) -> Result<(), BackendError> {
        (**self).delete_property(property)
    }

    fn acquire_selection(&mut self, selection: XAtom, time: u32) -> Result<(), BackendError> {
        (**self).acquire_selection(selection, time)
    }

    fn answer_selection(
        &mut self,
        request: &SelectionRequest,
        data: Option<&[u8]>,
    ) -> Result<(), BackendError> {
        (**self).answer_selection(request, data)
    }

    fn is_local_window(&self, window: XWindow) -> bool {
        (**self).is_local_window(window)
    }

    fn flush(&mut self) -> Result<(), BackendError> {
        (**self).flush()
    }
}
