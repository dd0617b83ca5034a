use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::os::unix::io::{AsFd, OwnedFd};
use std::rc::Rc;
use std::time::{Duration, Instant};

use calloop::generic::Generic;
use calloop::EventLoop as Loop;
use dpi::PhysicalPosition;
use tracing::{debug, trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{self, ConnectionExt as _, EventMask, GrabMode, GrabStatus, KeyButMask};
use x11rb::protocol::Event;
use xdnd_core::backend::{EventPump, PumpStatus, TimeoutScheduler};
use xdnd_core::event::{DragEvent, SelectionRequest};
use xdnd_core::protocol::ClientMessage;
use xdnd_core::{os_error, BackendError, ModifiersState};

use crate::xdisplay::{X11Error, XConnection};

type X11Source = Generic<OwnedFd>;

const XK_ESCAPE: u32 = 0xff1b;

/// The pointer events the drag grab listens to.
pub(crate) fn grab_events() -> EventMask {
    EventMask::BUTTON_PRESS | EventMask::BUTTON_RELEASE | EventMask::POINTER_MOTION
}

/// When the armed timeout fires, shared between the scheduler and the pump.
pub(crate) type Deadline = Rc<Cell<Option<Instant>>>;

/// Events the host injects from inside drag callbacks.
pub(crate) type Injected = Rc<RefCell<VecDeque<DragEvent>>>;

/// One-shot timer driven by [`X11EventPump`].
#[derive(Debug)]
pub struct X11Timer {
    deadline: Deadline,
}

impl X11Timer {
    pub(crate) fn new(deadline: Deadline) -> Self {
        Self { deadline }
    }
}

impl TimeoutScheduler for X11Timer {
    fn arm(&mut self, after: Duration) {
        self.deadline.set(Some(Instant::now() + after));
    }

    fn disarm(&mut self) {
        self.deadline.set(None);
    }
}

/// Feeds events to a drag session from the host's connection.
///
/// Places a pointer and keyboard grab on the root window for the duration of [`EventPump::run`]
/// and blocks in a calloop loop between events.
#[derive(Debug)]
pub struct X11EventPump {
    xconn: Rc<XConnection>,
    source: xproto::Window,
    deadline: Deadline,
    injected: Injected,
    escape_keycodes: Vec<xproto::Keycode>,
}

impl X11EventPump {
    pub(crate) fn new(
        xconn: Rc<XConnection>,
        source: xproto::Window,
        deadline: Deadline,
        injected: Injected,
    ) -> Result<Self, X11Error> {
        let escape_keycodes = keycodes_for(&xconn, XK_ESCAPE)?;
        if escape_keycodes.is_empty() {
            warn!("no key produces Escape, drags can only end by releasing the button");
        }
        Ok(Self { xconn, source, deadline, injected, escape_keycodes })
    }

    fn grab(&self) -> Result<GrabGuard<'_>, X11Error> {
        let conn = self.xconn.xcb_connection();
        let root = self.xconn.root(self.xconn.default_screen).unwrap_or(self.source);

        let status = conn
            .grab_pointer(
                false,
                root,
                grab_events(),
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                x11rb::CURRENT_TIME,
            )?
            .reply()?
            .status;
        if status != GrabStatus::SUCCESS {
            return Err(X11Error::GrabFailed("pointer", status));
        }
        let mut guard = GrabGuard { xconn: &self.xconn, keyboard: false };

        let status = conn
            .grab_keyboard(false, root, x11rb::CURRENT_TIME, GrabMode::ASYNC, GrabMode::ASYNC)?
            .reply()?
            .status;
        if status != GrabStatus::SUCCESS {
            return Err(X11Error::GrabFailed("keyboard", status));
        }
        guard.keyboard = true;
        Ok(guard)
    }

    /// Translate an X event, dropping what the drag does not care about.
    fn translate(&self, event: Event) -> Option<DragEvent> {
        match event {
            Event::MotionNotify(e) => {
                let screen = self.xconn.screen_of_root(e.root)?;
                Some(DragEvent::PointerMoved {
                    position: PhysicalPosition::new(e.root_x.into(), e.root_y.into()),
                    screen,
                    time: e.time,
                })
            },
            Event::ButtonPress(e) => Some(DragEvent::ButtonPressed { button: e.detail, time: e.time }),
            Event::ButtonRelease(e) => Some(DragEvent::ButtonReleased {
                button: e.detail,
                position: PhysicalPosition::new(e.root_x.into(), e.root_y.into()),
                time: e.time,
            }),
            Event::KeyPress(e) => Some(DragEvent::Keyboard {
                modifiers: self.modifiers().unwrap_or_else(|| mods_from_mask(e.state)),
                escape: self.escape_keycodes.contains(&e.detail),
                time: e.time,
            }),
            Event::KeyRelease(e) => Some(DragEvent::Keyboard {
                modifiers: self.modifiers().unwrap_or_else(|| mods_from_mask(e.state)),
                escape: false,
                time: e.time,
            }),
            Event::ClientMessage(e) if e.format == 32 => {
                Some(DragEvent::ClientMessage(ClientMessage {
                    window: e.window,
                    message_type: e.type_,
                    data: e.data.as_data32(),
                }))
            },
            Event::SelectionRequest(e) => Some(DragEvent::SelectionRequest(SelectionRequest {
                requestor: e.requestor,
                selection: e.selection,
                target: e.target,
                property: e.property,
                time: e.time,
            })),
            Event::SelectionClear(e) => Some(DragEvent::SelectionClear { selection: e.selection }),
            Event::SelectionNotify(e) => {
                Some(DragEvent::SelectionNotify { selection: e.selection })
            },
            Event::DestroyNotify(e) if e.window == self.source => Some(DragEvent::SourceDestroyed),
            Event::Error(e) => {
                // Mostly sends to windows that vanished mid drag.
                debug!("X11 error during drag: {e:?}");
                None
            },
            other => {
                trace!("ignoring {other:?}");
                None
            },
        }
    }

    /// The modifier state after a key event; the event itself carries the state before it.
    fn modifiers(&self) -> Option<ModifiersState> {
        let root = self.xconn.root(self.xconn.default_screen)?;
        let reply = self.xconn.xcb_connection().query_pointer(root).ok()?.reply().ok()?;
        Some(mods_from_mask(reply.mask))
    }

    fn next_injected(&self) -> Option<DragEvent> {
        self.injected.borrow_mut().pop_front()
    }
}

impl EventPump for X11EventPump {
    fn run(
        &mut self,
        handler: &mut dyn FnMut(DragEvent) -> PumpStatus,
    ) -> Result<(), BackendError> {
        let _grab = self.grab().map_err(|err| os_error!(err))?;

        let mut event_loop: Loop<'_, ()> = Loop::try_new().map_err(|err| os_error!(err))?;
        let fd = self
            .xconn
            .xcb_connection()
            .stream()
            .as_fd()
            .try_clone_to_owned()
            .map_err(|err| os_error!(err))?;
        event_loop
            .handle()
            .insert_source(
                X11Source::new(fd, calloop::Interest::READ, calloop::Mode::Level),
                |_, _, _| Ok(calloop::PostAction::Continue),
            )
            .map_err(|err| os_error!(err.error))?;

        loop {
            while let Some(event) = self.next_injected() {
                if handler(event) == PumpStatus::Exit {
                    return Ok(());
                }
            }

            while let Some(event) =
                self.xconn.xcb_connection().poll_for_event().map_err(|err| os_error!(err))?
            {
                if let Some(event) = self.translate(event) {
                    if handler(event) == PumpStatus::Exit {
                        return Ok(());
                    }
                }
            }

            if self.deadline.get().is_some_and(|deadline| deadline <= Instant::now()) {
                self.deadline.set(None);
                if handler(DragEvent::TimerExpired) == PumpStatus::Exit {
                    return Ok(());
                }
                continue;
            }

            if !self.injected.borrow().is_empty() {
                continue;
            }

            self.xconn.flush().map_err(|err| os_error!(err))?;
            let timeout =
                self.deadline.get().map(|deadline| deadline.saturating_duration_since(Instant::now()));
            event_loop.dispatch(timeout, &mut ()).map_err(|err| os_error!(err))?;
        }
    }
}

/// Releases the drag grabs.
struct GrabGuard<'a> {
    xconn: &'a XConnection,
    keyboard: bool,
}

impl Drop for GrabGuard<'_> {
    fn drop(&mut self) {
        let conn = self.xconn.xcb_connection();
        if self.keyboard {
            if let Err(err) = conn.ungrab_keyboard(x11rb::CURRENT_TIME) {
                warn!("Failed to release keyboard grab: {err}");
            }
        }
        if let Err(err) = conn.ungrab_pointer(x11rb::CURRENT_TIME) {
            warn!("Failed to release pointer grab: {err}");
        }
        if let Err(err) = conn.flush() {
            warn!("Failed to flush after releasing grabs: {err}");
        }
    }
}

fn mods_from_mask(mask: KeyButMask) -> ModifiersState {
    let mut mods = ModifiersState::empty();
    mods.set(ModifiersState::SHIFT, mask.contains(KeyButMask::SHIFT));
    mods.set(ModifiersState::CONTROL, mask.contains(KeyButMask::CONTROL));
    mods.set(ModifiersState::ALT, mask.contains(KeyButMask::MOD1));
    mods.set(ModifiersState::META, mask.contains(KeyButMask::MOD4));
    mods
}

/// All keycodes that produce `keysym` in any column.
fn keycodes_for(xconn: &XConnection, keysym: u32) -> Result<Vec<xproto::Keycode>, X11Error> {
    let setup = xconn.xcb_connection().setup();
    let (min, max) = (setup.min_keycode, setup.max_keycode);
    let mapping = xconn.xcb_connection().get_keyboard_mapping(min, max - min + 1)?.reply()?;

    let per_keycode = usize::from(mapping.keysyms_per_keycode).max(1);
    Ok(mapping
        .keysyms
        .chunks(per_keycode)
        .zip(min..=max)
        .filter(|(syms, _)| syms.contains(&keysym))
        .map(|(_, keycode)| keycode)
        .collect())
}
