//! The drag source state machine.
//!
//! A [`DragManager`] runs one drag at a time. [`DragManager::begin`] claims the drag selection,
//! then blocks inside the [`EventPump`] and feeds every event to the engine until the session
//! reaches a terminal state:
//!
//! ```text
//! Idle -> Entered -> AwaitingStatus <-> Armed -> DropPending -> AwaitingFinished -> Terminated
//!                          \___________________________________________________/
//!                                          (Cancelled from anywhere)
//! ```
//!
//! At most one `XdndPosition` is in flight per target. Motion that arrives while a status is
//! outstanding is folded into a single pending move which is replayed once the status arrives.

use std::cell::Cell;

use dpi::PhysicalPosition;
use tracing::{debug, trace, warn};

use crate::action::{DndAction, ModifiersState};
use crate::backend::{EventPump, MessageChannel, PumpStatus, TimeoutScheduler};
use crate::config::DragConfig;
use crate::error::DragError;
use crate::event::{DragEvent, SelectionRequest};
use crate::feedback::{drag_cursor, DragFeedback};
use crate::gesture::DragTrigger;
use crate::mime::{Audience, MimeNegotiator};
use crate::payload::DragPayload;
use crate::protocol::{ClientMessage, ProtocolAtoms, Rect, XdndMessage};
use crate::resolver::{TargetDescriptor, TargetResolver, WindowTree};
use crate::session::{
    CancelReason, DragOutcome, DragSession, PendingMove, ReleaseOutcome, TimeoutAction,
};
use crate::{BackendError, XAtom, XWindow};

/// Number of type atoms that fit into `XdndEnter`.
const INLINE_TYPES: usize = 3;

thread_local! {
    static DRAG_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Marks a drag as running on this thread until dropped.
struct ActiveGuard(());

impl ActiveGuard {
    fn acquire() -> Result<Self, DragError> {
        DRAG_ACTIVE.with(|active| {
            if active.replace(true) {
                Err(DragError::AlreadyActive)
            } else {
                Ok(ActiveGuard(()))
            }
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        DRAG_ACTIVE.with(|active| active.set(false));
    }
}

/// Logs and sends protocol messages.
struct Wire {
    channel: Box<dyn MessageChannel>,
    atoms: ProtocolAtoms,
}

impl Wire {
    fn source(&self) -> XWindow {
        self.channel.source_window()
    }

    fn post(&mut self, target: &TargetDescriptor, message: XdndMessage) {
        let raw = message.encode(target.window, &self.atoms);
        trace!(
            window = target.window,
            destination = target.destination(),
            data = ?raw.data,
            "sending {}",
            message.name()
        );
        if let Err(err) = self.channel.send(target.destination(), raw) {
            warn!("failed to send {}: {err}", message.name());
        }
    }

    fn leave(&mut self, target: &TargetDescriptor) {
        let source = self.source();
        self.post(target, XdndMessage::Leave { source });
    }

    fn announce_actions(&mut self, modifiers: ModifiersState) {
        let actions: Vec<XAtom> =
            DndAction::offered(modifiers).iter().map(|action| action.to_atom(&self.atoms)).collect();
        if let Err(err) = self.channel.set_atom_list(self.atoms.action_list, &actions) {
            warn!("failed to set XdndActionList: {err}");
        }
    }

    fn type_atoms(
        &mut self,
        negotiator: &MimeNegotiator,
        payload: &DragPayload,
        audience: Audience,
    ) -> Result<Vec<XAtom>, BackendError> {
        negotiator
            .exportable(payload, audience)
            .into_iter()
            .map(|mime| self.channel.intern(mime.as_str()))
            .collect()
    }
}

/// Everything except the pump, so the pump can borrow the engine mutably while it runs.
struct Engine {
    config: DragConfig,
    wire: Wire,
    resolver: TargetResolver,
    timer: Box<dyn TimeoutScheduler>,
    feedback: Box<dyn DragFeedback>,
    negotiator: MimeNegotiator,
    session: Option<DragSession>,
    outcome: Option<DragOutcome>,
}

/// Starts and runs drag sessions over the injected collaborators.
pub struct DragManager {
    engine: Engine,
    pump: Box<dyn EventPump>,
}

impl DragManager {
    pub fn new(
        config: DragConfig,
        channel: Box<dyn MessageChannel>,
        tree: Box<dyn WindowTree>,
        timer: Box<dyn TimeoutScheduler>,
        pump: Box<dyn EventPump>,
        feedback: Box<dyn DragFeedback>,
    ) -> Self {
        let atoms = channel.atoms();
        let engine = Engine {
            config,
            wire: Wire { channel, atoms },
            resolver: TargetResolver::new(tree),
            timer,
            feedback,
            negotiator: MimeNegotiator,
            session: None,
            outcome: None,
        };
        Self { engine, pump }
    }

    pub fn config(&self) -> &DragConfig {
        &self.engine.config
    }

    /// Run a drag of `payload` and block until it ends.
    ///
    /// `trigger` must show the drag button held and the pointer moved past the threshold. Starts
    /// that are refused return an error; once the session runs every result, cancellation
    /// included, is reported as a [`DragOutcome`].
    pub fn begin(
        &mut self,
        payload: DragPayload,
        trigger: DragTrigger,
    ) -> Result<DragOutcome, DragError> {
        let _guard = ActiveGuard::acquire()?;
        trigger.validate(&self.engine.config)?;
        if payload.is_empty() {
            return Err(DragError::EmptyPayload);
        }

        let engine = &mut self.engine;
        let atoms = engine.wire.atoms.clone();
        engine.wire.channel.acquire_selection(atoms.selection, trigger.time)?;
        debug!(?trigger, "drag started");

        engine.outcome = None;
        engine.resolver.invalidate();
        engine.session = Some(DragSession::new(
            payload,
            trigger.screen,
            trigger.position,
            trigger.time,
            trigger.modifiers,
        ));
        engine.start(trigger);

        if engine.session.is_some() {
            let result = self.pump.run(&mut |event| engine.handle(event));
            if let Err(err) = result {
                warn!("event pump failed: {err}");
            }
            // The pump may return without the session reaching an end.
            engine.cancel(CancelReason::Backend);
        }

        Ok(engine.outcome.take().unwrap_or(DragOutcome::Cancelled(CancelReason::Backend)))
    }
}

impl Engine {
    fn start(&mut self, trigger: DragTrigger) {
        let preview = match self.feedback.create_preview(trigger.screen) {
            Ok(preview) => preview,
            Err(err) => {
                warn!("failed to create drag preview: {err}");
                self.cancel(CancelReason::Backend);
                return;
            },
        };
        if let Some(session) = self.session.as_mut() {
            session.preview = preview;
        }
        self.pointer_moved(trigger.position, trigger.screen, trigger.time, false);
    }

    fn handle(&mut self, event: DragEvent) -> PumpStatus {
        match event {
            DragEvent::PointerMoved { position, screen, time } => {
                self.pointer_moved(position, screen, time, false)
            },
            DragEvent::ButtonPressed { button, .. } => {
                trace!(button, "button press swallowed");
            },
            DragEvent::ButtonReleased { button, position, time } => {
                if button == self.config.drag_button {
                    self.button_released(position, time);
                }
            },
            DragEvent::Keyboard { modifiers, escape, time } => {
                self.key_event(modifiers, escape, time)
            },
            DragEvent::ClientMessage(message) => self.protocol_message(&message),
            DragEvent::SelectionRequest(request) => self.selection_request(&request),
            DragEvent::SelectionClear { selection } | DragEvent::SelectionNotify { selection } => {
                trace!(selection, "selection event consumed");
            },
            DragEvent::TimerExpired => self.timer_expired(),
            DragEvent::ToplevelsChanged => self.toplevels_changed(),
            DragEvent::SourceDestroyed => self.cancel(CancelReason::SourceDestroyed),
            DragEvent::Cancel => self.cancel(CancelReason::Host),
        }

        if self.session.is_some() {
            PumpStatus::Continue
        } else {
            PumpStatus::Exit
        }
    }

    fn pointer_moved(
        &mut self,
        position: PhysicalPosition<i32>,
        screen: usize,
        time: u32,
        force: bool,
    ) {
        let Some(session) = self.session.as_mut() else { return };
        if session.cancelled || session.released || session.drop_sent {
            return;
        }
        session.position = position;
        session.time = time;

        if screen != session.current_screen {
            session.current_screen = screen;
            session.preview = None;
            match self.feedback.create_preview(screen) {
                Ok(preview) => session.preview = preview,
                Err(err) => {
                    warn!(screen, "failed to recreate drag preview: {err}");
                    self.cancel(CancelReason::Backend);
                    return;
                },
            }
        }
        if let Some(preview) = session.preview.as_mut() {
            preview.move_to(position);
        }

        if session.awaiting_status {
            let force = force || session.pending_move.is_some_and(|pending| pending.force);
            session.pending_move = Some(PendingMove { position, screen, time, force });

            let target = self.resolver.resolve(position.x, position.y, screen);
            let current = session.target.map(|current| current.window);
            if current == Some(target.window) {
                return;
            }
            if !session.status_received {
                trace!("target changed before any status, leaving at once");
                session.pending_move = None;
                self.switch_target(target, position, time);
            } else if session.timeout.is_none() {
                session.timeout = Some(TimeoutAction::StatusWait);
                self.timer.arm(self.config.status_timeout);
            }
            return;
        }

        self.send_motion(position, screen, time, force);
    }

    /// Act on motion while no status is outstanding.
    fn send_motion(
        &mut self,
        position: PhysicalPosition<i32>,
        screen: usize,
        time: u32,
        force: bool,
    ) {
        let target = self.resolver.resolve(position.x, position.y, screen);
        let Some(session) = self.session.as_mut() else { return };

        if session.target.map(|current| current.window) != Some(target.window) {
            self.switch_target(target, position, time);
            return;
        }

        if let Some(engaged) = session.engaged() {
            if session.needs_position(position.x, position.y, force) {
                let action = DndAction::requested(session.modifiers).to_atom(&self.wire.atoms);
                let source = self.wire.source();
                self.wire.post(&engaged, XdndMessage::Position {
                    source,
                    x: position.x,
                    y: position.y,
                    time,
                    action,
                });
                session.awaiting_status = true;
            }
        }
    }

    /// Leave the current target, if entered, and enter `target` if it speaks the protocol.
    fn switch_target(&mut self, target: TargetDescriptor, position: PhysicalPosition<i32>, time: u32) {
        let Some(session) = self.session.as_mut() else { return };

        if let Some(old) = session.engaged() {
            self.wire.leave(&old);
        }
        if session.timeout == Some(TimeoutAction::StatusWait) {
            session.timeout = None;
            self.timer.disarm();
        }
        session.reset_target();
        session.target = Some(target);

        let Some(remote) = target.version else {
            trace!(window = target.window, "target is not XDND aware");
            self.update_cursor();
            return;
        };

        let audience = if self.wire.channel.is_local_window(target.window) {
            Audience::Local
        } else {
            Audience::Foreign
        };
        let types = match self.wire.type_atoms(&self.negotiator, &session.payload, audience) {
            Ok(types) => types,
            Err(err) => {
                warn!("failed to build type list: {err}");
                self.cancel(CancelReason::Backend);
                return;
            },
        };

        let more_types = types.len() > INLINE_TYPES;
        if more_types {
            if let Err(err) = self.wire.channel.set_atom_list(self.wire.atoms.type_list, &types) {
                warn!("failed to set XdndTypeList: {err}");
                self.cancel(CancelReason::Backend);
                return;
            }
        }
        self.wire.announce_actions(session.modifiers);

        let mut inline = [0; INLINE_TYPES];
        for (slot, atom) in inline.iter_mut().zip(&types) {
            *slot = *atom;
        }

        let version = remote.min(self.config.local_version());
        let source = self.wire.source();
        self.wire.post(&target, XdndMessage::Enter { source, version, more_types, types: inline });
        session.entered = true;
        session.version = version;
        session.rect = Rect::new(position.x - 2, position.y - 2, 5, 5);

        let action = DndAction::requested(session.modifiers).to_atom(&self.wire.atoms);
        self.wire.post(&target, XdndMessage::Position {
            source,
            x: position.x,
            y: position.y,
            time,
            action,
        });
        session.awaiting_status = true;
        self.update_cursor();
    }

    fn button_released(&mut self, position: PhysicalPosition<i32>, time: u32) {
        let Some(session) = self.session.as_mut() else { return };
        if session.cancelled {
            self.terminate(DragOutcome::Cancelled(CancelReason::UserEscape));
            return;
        }
        if session.released {
            return;
        }
        session.released = true;
        session.hide_preview();
        self.feedback.restore_cursor();

        let engaged = session.engaged();
        if engaged.is_some() && session.awaiting_status {
            let target_changing = session.timeout == Some(TimeoutAction::StatusWait);
            // The late status decides whether the drop goes ahead.
            let outcome = if session.status_received && !target_changing {
                ReleaseOutcome::Drop
            } else {
                ReleaseOutcome::Leave
            };
            debug!(?outcome, "released while awaiting status");
            session.pending_release = Some(outcome);
            session.timeout = Some(TimeoutAction::ReleaseWait);
            self.timer.arm(self.config.status_timeout);
        } else if let Some(target) = engaged.filter(|_| session.accepted) {
            self.send_drop(target, time);
        } else {
            if let Some(target) = engaged {
                self.wire.leave(&target);
            }
            let outcome = self.local_drop(position);
            self.terminate(outcome);
        }
    }

    /// Rearrange the host's windows when window tokens are dropped on their own screen.
    fn local_drop(&mut self, position: PhysicalPosition<i32>) -> DragOutcome {
        let Some(session) = self.session.as_ref() else { return DragOutcome::NotAccepted };
        if let Some(windows) = session.payload.windows() {
            if session.local_reorder() && self.feedback.reorder_windows(windows, position) {
                return DragOutcome::LocalDrop;
            }
        }
        DragOutcome::NotAccepted
    }

    fn send_drop(&mut self, target: TargetDescriptor, time: u32) {
        let Some(session) = self.session.as_mut() else { return };
        let source = self.wire.source();
        self.wire.post(&target, XdndMessage::Drop { source, time });
        session.drop_sent = true;
        session.dropped_on = Some(target.window);
        session.timeout = Some(TimeoutAction::Finished);
        self.timer.arm(self.config.finish_timeout);
    }

    fn key_event(&mut self, modifiers: ModifiersState, escape: bool, time: u32) {
        let Some(session) = self.session.as_mut() else { return };
        if session.cancelled {
            return;
        }

        if escape {
            debug!("drag cancelled with escape");
            session.cancelled = true;
            session.hide_preview();
            if let Some(target) = session.engaged() {
                self.wire.leave(&target);
            }
            session.reset_target();
            session.pending_move = None;
            session.pending_release = None;
            session.timeout = None;
            self.timer.disarm();
            if session.released {
                self.terminate(DragOutcome::Cancelled(CancelReason::UserEscape));
            }
            return;
        }

        if modifiers == session.modifiers {
            return;
        }
        let actions_changed = modifiers.action_mask() != session.modifiers.action_mask();
        session.modifiers = modifiers;
        if session.released || session.drop_sent {
            return;
        }
        if actions_changed && session.engaged().is_some() {
            self.wire.announce_actions(modifiers);
        }
        let (position, screen) = (session.position, session.current_screen);
        self.pointer_moved(position, screen, time, true);
    }

    fn protocol_message(&mut self, message: &ClientMessage) {
        let Some(decoded) = XdndMessage::decode(message, &self.wire.atoms) else {
            trace!(message_type = message.message_type, "ignoring foreign client message");
            return;
        };
        match decoded {
            XdndMessage::Status { target, accept, always_resend, rect, action } => {
                self.status(target, accept, always_resend, rect, action)
            },
            XdndMessage::Finished { target, success, action } => {
                self.finished(target, success, action)
            },
            other => debug!("ignoring {} sent to the drag source", other.name()),
        }
    }

    fn status(
        &mut self,
        target: XWindow,
        accept: bool,
        always_resend: bool,
        rect: Rect,
        action: XAtom,
    ) {
        let Some(session) = self.session.as_mut() else { return };
        if !session.is_live_target(target) {
            debug!(target, current = ?session.target.map(|t| t.window), "ignoring stale XdndStatus");
            return;
        }
        let Some(action) = DndAction::from_atom(action, &self.wire.atoms) else {
            debug!(action, "ignoring XdndStatus with unknown action");
            return;
        };

        session.accepted = accept;
        session.action = if accept { action } else { DndAction::None };
        session.always_resend = always_resend;
        session.rect = rect;
        session.awaiting_status = false;
        session.status_received = true;
        if matches!(session.timeout, Some(TimeoutAction::StatusWait | TimeoutAction::ReleaseWait)) {
            session.timeout = None;
            self.timer.disarm();
        }
        trace!(accept, ?action, ?rect, "status received");

        if let Some(release) = session.pending_release.take() {
            session.pending_move = None;
            let engaged = session.engaged();
            match engaged {
                Some(target) if release == ReleaseOutcome::Drop && accept => {
                    let time = session.time;
                    self.send_drop(target, time);
                },
                _ => {
                    if let Some(target) = engaged {
                        self.wire.leave(&target);
                    }
                    self.terminate(DragOutcome::NotAccepted);
                },
            }
            return;
        }

        if let Some(pending) = session.pending_move.take() {
            self.send_motion(pending.position, pending.screen, pending.time, pending.force);
        }
        self.update_cursor();
    }

    fn finished(&mut self, target: XWindow, success: bool, action: XAtom) {
        let Some(session) = self.session.as_ref() else { return };
        if !session.drop_sent || session.dropped_on != Some(target) {
            debug!(target, "ignoring XdndFinished that does not answer our drop");
            return;
        }
        let Some(used) = DndAction::from_atom(action, &self.wire.atoms) else {
            debug!(action, "ignoring XdndFinished with unknown action");
            return;
        };

        // Before version 5 the message carries neither a flag nor an action.
        let outcome = if session.version < 5 {
            DragOutcome::Dropped { action: session.action, success: true }
        } else {
            let action = if used == DndAction::None { session.action } else { used };
            DragOutcome::Dropped { action, success }
        };
        self.terminate(outcome);
    }

    fn timer_expired(&mut self) {
        let Some(session) = self.session.as_mut() else { return };
        let Some(action) = session.timeout.take() else {
            trace!("stale timer expiry");
            return;
        };
        debug!(?action, "timed out");

        match action {
            TimeoutAction::StatusWait => {
                if let Some(target) = session.engaged() {
                    self.wire.leave(&target);
                }
                session.reset_target();
                session.target = None;
                if let Some(pending) = session.pending_move.take() {
                    self.send_motion(pending.position, pending.screen, pending.time, pending.force);
                }
            },
            TimeoutAction::ReleaseWait => {
                if let Some(target) = session.engaged() {
                    self.wire.leave(&target);
                }
                self.terminate(DragOutcome::NotAccepted);
            },
            TimeoutAction::Finished => {
                let action = session.action;
                self.terminate(DragOutcome::DropUnconfirmed { action });
            },
        }
    }

    fn toplevels_changed(&mut self) {
        let Some(session) = self.session.as_mut() else { return };
        if session.released {
            return;
        }
        if let Some(target) = session.engaged() {
            debug!("top-level windows changed, leaving target");
            self.wire.leave(&target);
        }
        session.reset_target();
        session.target = None;
        session.pending_move = None;
        if session.timeout == Some(TimeoutAction::StatusWait) {
            session.timeout = None;
            self.timer.disarm();
        }
        self.resolver.invalidate();
    }

    fn selection_request(&mut self, request: &SelectionRequest) {
        let Some(session) = self.session.as_ref() else { return };
        let data = if request.selection == self.wire.atoms.selection {
            let audience = if self.wire.channel.is_local_window(request.requestor) {
                Audience::Local
            } else {
                Audience::Foreign
            };
            match self.wire.channel.atom_name(request.target) {
                Ok(name) => {
                    let data = self.negotiator.serialize_named(&session.payload, &name, audience);
                    trace!(name, found = data.is_some(), "selection request");
                    data
                },
                Err(err) => {
                    warn!("failed to look up requested type: {err}");
                    None
                },
            }
        } else {
            None
        };

        if let Err(err) = self.wire.channel.answer_selection(request, data.as_deref()) {
            warn!("failed to answer selection request: {err}");
        }
    }

    fn update_cursor(&mut self) {
        let Some(session) = self.session.as_mut() else { return };
        if session.released {
            return;
        }
        let cursor = drag_cursor(session.accepted, session.action, session.local_reorder());
        if session.cursor != Some(cursor) {
            session.cursor = Some(cursor);
            self.feedback.set_cursor(cursor);
        }
    }

    /// End the session with a best effort `XdndLeave`.
    fn cancel(&mut self, reason: CancelReason) {
        let Some(session) = self.session.as_mut() else { return };
        if let Some(target) = session.engaged() {
            self.wire.leave(&target);
        }
        self.terminate(DragOutcome::Cancelled(reason));
    }

    fn terminate(&mut self, outcome: DragOutcome) {
        let Some(mut session) = self.session.take() else { return };
        self.timer.disarm();
        if let Some(mut preview) = session.preview.take() {
            preview.hide();
        }
        if !session.released {
            self.feedback.restore_cursor();
        }

        for property in [self.wire.atoms.type_list, self.wire.atoms.action_list] {
            if let Err(err) = self.wire.channel.delete_property(property) {
                warn!("failed to clean up source window: {err}");
            }
        }
        if let Err(err) = self.wire.channel.flush() {
            warn!("failed to flush connection: {err}");
        }

        debug!(?outcome, "drag finished");
        self.feedback.drag_ended(&outcome);
        self.outcome = Some(outcome);
    }
}
