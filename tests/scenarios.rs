//! End to end drags against scripted collaborators.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use xdnd::backend::{EventPump, MessageChannel, PumpStatus, TimeoutScheduler};
use xdnd::cursor_icon::CursorIcon;
use xdnd::dpi::PhysicalPosition;
use xdnd::protocol::{ClientMessage, ProtocolAtoms, Rect, XdndMessage};
use xdnd::resolver::WindowTree;
use xdnd::{
    BackendError, CancelReason, DndAction, DragConfig, DragError, DragEvent, DragFeedback,
    DragManager, DragOutcome, DragPayload, DragPreview, DragTrigger, ModifiersState,
    SelectionRequest, UrlList, WindowToken, XAtom, XWindow,
};

const ROOT: XWindow = 1;
const SOURCE: XWindow = 50;
const EDITOR: XWindow = 10;
const VIEWER: XWindow = 20;

fn atoms() -> ProtocolAtoms {
    ProtocolAtoms::for_testing()
}

fn at(x: i32, y: i32) -> PhysicalPosition<i32> {
    PhysicalPosition::new(x, y)
}

#[derive(Debug)]
struct Sent {
    destination: XWindow,
    window: XWindow,
    message: XdndMessage,
}

#[derive(Default)]
struct Log {
    names: Vec<String>,
    local: HashSet<XWindow>,
    refuse_selection: bool,
    selections: Vec<XAtom>,
    sent: Vec<Sent>,
    lists: Vec<(XAtom, Vec<XAtom>)>,
    deleted: Vec<XAtom>,
    answers: Vec<(XAtom, Option<Vec<u8>>)>,
    arms: Vec<Duration>,
    armed: Option<Duration>,
    cursors: Vec<CursorIcon>,
    restores: usize,
    preview_moves: Vec<PhysicalPosition<i32>>,
    previews_hidden: usize,
    reorder: bool,
    reordered: Vec<(Vec<WindowToken>, PhysicalPosition<i32>)>,
    ended: Vec<DragOutcome>,
}

type Shared = Rc<RefCell<Log>>;

impl Log {
    fn intern(&mut self, name: &str) -> XAtom {
        let index = match self.names.iter().position(|known| known == name) {
            Some(index) => index,
            None => {
                self.names.push(name.to_owned());
                self.names.len() - 1
            },
        };
        1000 + index as XAtom
    }

    fn messages(&self) -> Vec<&'static str> {
        self.sent.iter().map(|sent| sent.message.name()).collect()
    }

    fn destinations(&self) -> Vec<XWindow> {
        self.sent.iter().map(|sent| sent.destination).collect()
    }

    fn positions(&self) -> Vec<(i32, i32, XAtom)> {
        self.sent
            .iter()
            .filter_map(|sent| match sent.message {
                XdndMessage::Position { x, y, action, .. } => Some((x, y, action)),
                _ => None,
            })
            .collect()
    }

    fn enters(&self) -> Vec<(u32, bool, [XAtom; 3])> {
        self.sent
            .iter()
            .filter_map(|sent| match sent.message {
                XdndMessage::Enter { version, more_types, types, .. } => {
                    Some((version, more_types, types))
                },
                _ => None,
            })
            .collect()
    }

    fn last_list(&self, property: XAtom) -> Option<&[XAtom]> {
        self.lists.iter().rev().find(|(p, _)| *p == property).map(|(_, list)| list.as_slice())
    }
}

struct RecordingChannel {
    log: Shared,
}

impl MessageChannel for RecordingChannel {
    fn source_window(&self) -> XWindow {
        SOURCE
    }

    fn atoms(&self) -> ProtocolAtoms {
        atoms()
    }

    fn send(&mut self, destination: XWindow, message: ClientMessage) -> Result<(), BackendError> {
        let decoded = XdndMessage::decode(&message, &atoms()).expect("only XDND is sent");
        self.log.borrow_mut().sent.push(Sent {
            destination,
            window: message.window,
            message: decoded,
        });
        Ok(())
    }

    fn intern(&mut self, name: &str) -> Result<XAtom, BackendError> {
        Ok(self.log.borrow_mut().intern(name))
    }

    fn atom_name(&mut self, atom: XAtom) -> Result<String, BackendError> {
        let log = self.log.borrow();
        atom.checked_sub(1000)
            .and_then(|index| log.names.get(index as usize))
            .cloned()
            .ok_or_else(|| xdnd::os_error!(format!("bad atom {atom}")))
    }

    fn set_atom_list(&mut self, property: XAtom, atoms: &[XAtom]) -> Result<(), BackendError> {
        self.log.borrow_mut().lists.push((property, atoms.to_vec()));
        Ok(())
    }

    fn delete_property(&mut self, property: XAtom) -> Result<(), BackendError> {
        self.log.borrow_mut().deleted.push(property);
        Ok(())
    }

    fn acquire_selection(&mut self, selection: XAtom, _time: u32) -> Result<(), BackendError> {
        let mut log = self.log.borrow_mut();
        if log.refuse_selection {
            return Err(xdnd::os_error!("selection owned elsewhere"));
        }
        log.selections.push(selection);
        Ok(())
    }

    fn answer_selection(
        &mut self,
        request: &SelectionRequest,
        data: Option<&[u8]>,
    ) -> Result<(), BackendError> {
        self.log.borrow_mut().answers.push((request.target, data.map(<[u8]>::to_vec)));
        Ok(())
    }

    fn is_local_window(&self, window: XWindow) -> bool {
        window == SOURCE || self.log.borrow().local.contains(&window)
    }
}

struct ManualTimer {
    log: Shared,
}

impl TimeoutScheduler for ManualTimer {
    fn arm(&mut self, after: Duration) {
        let mut log = self.log.borrow_mut();
        log.arms.push(after);
        log.armed = Some(after);
    }

    fn disarm(&mut self) {
        self.log.borrow_mut().armed = None;
    }
}

/// Replays a fixed list of events. Timer expiries are only delivered while a timeout is armed.
struct ScriptedPump {
    script: VecDeque<DragEvent>,
    log: Shared,
}

impl EventPump for ScriptedPump {
    fn run(
        &mut self,
        handler: &mut dyn FnMut(DragEvent) -> PumpStatus,
    ) -> Result<(), BackendError> {
        while let Some(event) = self.script.pop_front() {
            if event == DragEvent::TimerExpired {
                let armed = self.log.borrow_mut().armed.take();
                if armed.is_none() {
                    continue;
                }
            }
            if handler(event) == PumpStatus::Exit {
                return Ok(());
            }
        }
        Ok(())
    }
}

struct RecordingPreview {
    log: Shared,
}

impl DragPreview for RecordingPreview {
    fn move_to(&mut self, position: PhysicalPosition<i32>) {
        self.log.borrow_mut().preview_moves.push(position);
    }

    fn hide(&mut self) {
        self.log.borrow_mut().previews_hidden += 1;
    }
}

struct RecordingFeedback {
    log: Shared,
}

impl DragFeedback for RecordingFeedback {
    fn create_preview(
        &mut self,
        _screen: usize,
    ) -> Result<Option<Box<dyn DragPreview>>, BackendError> {
        Ok(Some(Box::new(RecordingPreview { log: self.log.clone() })))
    }

    fn set_cursor(&mut self, cursor: CursorIcon) {
        self.log.borrow_mut().cursors.push(cursor);
    }

    fn restore_cursor(&mut self) {
        self.log.borrow_mut().restores += 1;
    }

    fn reorder_windows(&mut self, windows: &[WindowToken], position: PhysicalPosition<i32>) -> bool {
        let mut log = self.log.borrow_mut();
        log.reordered.push((windows.to_vec(), position));
        log.reorder
    }

    fn drag_ended(&mut self, outcome: &DragOutcome) {
        self.log.borrow_mut().ended.push(*outcome);
    }
}

/// Top-level windows are squares given as (parent, x, y, size) in parent coordinates.
#[derive(Default)]
struct FakeTree {
    windows: Vec<(XWindow, XWindow, i32, i32, i32)>,
    aware: HashMap<XWindow, u32>,
    proxies: HashMap<XWindow, XWindow>,
    queries: Rc<Cell<usize>>,
}

impl FakeTree {
    fn window(mut self, id: XWindow, parent: XWindow, x: i32, y: i32, size: i32) -> Self {
        self.windows.push((id, parent, x, y, size));
        self
    }

    fn aware(mut self, id: XWindow, version: u32) -> Self {
        self.aware.insert(id, version);
        self
    }

    fn proxy(mut self, id: XWindow, proxy: XWindow) -> Self {
        self.proxies.insert(id, proxy);
        self
    }
}

impl WindowTree for FakeTree {
    fn root(&self, screen: usize) -> Option<XWindow> {
        (screen == 0).then_some(ROOT)
    }

    fn child_at(
        &self,
        parent: XWindow,
        x: i32,
        y: i32,
    ) -> Result<Option<(XWindow, i32, i32)>, BackendError> {
        Ok(self
            .windows
            .iter()
            .rev()
            .find(|&&(_, p, wx, wy, size)| {
                p == parent && x >= wx && y >= wy && x < wx + size && y < wy + size
            })
            .map(|&(id, _, wx, wy, _)| (id, x - wx, y - wy)))
    }

    fn awareness(&self, window: XWindow) -> Result<Option<u32>, BackendError> {
        self.queries.set(self.queries.get() + 1);
        Ok(self.aware.get(&window).copied())
    }

    fn proxy_property(&self, window: XWindow) -> Result<Option<XWindow>, BackendError> {
        Ok(self.proxies.get(&window).copied())
    }
}

/// An editor on the left and a viewer on the right, both speaking XDND 5.
fn desktop() -> FakeTree {
    FakeTree::default()
        .window(EDITOR, ROOT, 0, 0, 100)
        .aware(EDITOR, 5)
        .window(VIEWER, ROOT, 200, 0, 100)
        .aware(VIEWER, 5)
}

fn manager(
    tree: FakeTree,
    config: DragConfig,
    script: Vec<DragEvent>,
    log: &Shared,
) -> DragManager {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    DragManager::new(
        config,
        Box::new(RecordingChannel { log: log.clone() }),
        Box::new(tree),
        Box::new(ManualTimer { log: log.clone() }),
        Box::new(ScriptedPump { script: script.into(), log: log.clone() }),
        Box::new(RecordingFeedback { log: log.clone() }),
    )
}

/// Press at (10, 10) and drag to (30, 30), over the editor.
fn trigger() -> DragTrigger {
    DragTrigger::new(1, at(10, 10), at(30, 30), 0, 5)
}

fn run(
    tree: FakeTree,
    payload: impl Into<DragPayload>,
    script: Vec<DragEvent>,
) -> (Result<DragOutcome, DragError>, Shared) {
    let log = Shared::default();
    let mut manager = manager(tree, DragConfig::default(), script, &log);
    let result = manager.begin(payload.into(), trigger());
    (result, log)
}

fn moved(x: i32, y: i32) -> DragEvent {
    DragEvent::PointerMoved { position: at(x, y), screen: 0, time: 10 }
}

fn released(x: i32, y: i32) -> DragEvent {
    DragEvent::ButtonReleased { button: 1, position: at(x, y), time: 20 }
}

fn keys(modifiers: ModifiersState) -> DragEvent {
    DragEvent::Keyboard { modifiers, escape: false, time: 15 }
}

fn escape() -> DragEvent {
    DragEvent::Keyboard { modifiers: ModifiersState::empty(), escape: true, time: 15 }
}

fn status(target: XWindow, accept: bool, rect: Rect, action: DndAction) -> DragEvent {
    let atoms = atoms();
    let message = XdndMessage::Status {
        target,
        accept,
        always_resend: false,
        rect,
        action: action.to_atom(&atoms),
    };
    DragEvent::ClientMessage(message.encode(SOURCE, &atoms))
}

fn finished(target: XWindow, success: bool, action: DndAction) -> DragEvent {
    let atoms = atoms();
    let message = XdndMessage::Finished { target, success, action: action.to_atom(&atoms) };
    DragEvent::ClientMessage(message.encode(SOURCE, &atoms))
}

fn outcome(result: Result<DragOutcome, DragError>) -> DragOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(err) => panic!("drag refused: {err}"),
    }
}

#[test]
fn accepted_drop_completes() {
    let script = vec![
        moved(35, 30),
        moved(40, 30),
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        status(EDITOR, true, Rect::new(0, 0, 100, 100), DndAction::Copy),
        released(40, 30),
        finished(EDITOR, true, DndAction::Copy),
    ];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Dropped { action: DndAction::Copy, success: true });

    let mut log = log.borrow_mut();
    assert_eq!(log.messages(), ["XdndEnter", "XdndPosition", "XdndPosition", "XdndDrop"]);
    assert!(log.destinations().iter().all(|&window| window == EDITOR));

    // Motion while the first position was unanswered collapsed into one.
    let copy = atoms().action_copy;
    assert_eq!(log.positions(), [(30, 30, copy), (40, 30, copy)]);

    let text = log.intern("text/unicode");
    let utf8 = log.intern("UTF8_STRING");
    let latin1 = log.intern("STRING");
    assert_eq!(log.enters(), [(5, true, [text, utf8, latin1])]);
    assert_eq!(log.last_list(atoms().type_list).map(<[XAtom]>::len), Some(5));

    assert!(log.deleted.contains(&atoms().type_list));
    assert!(log.deleted.contains(&atoms().action_list));
    assert_eq!(log.selections, [atoms().selection]);
    assert_eq!(log.cursors, [CursorIcon::NoDrop, CursorIcon::Copy]);
    assert_eq!(log.restores, 1);
    assert_eq!(log.armed, None);
    assert_eq!(log.ended, [DragOutcome::Dropped { action: DndAction::Copy, success: true }]);
}

#[test]
fn rectangle_suppresses_positions() {
    let tree = FakeTree::default().window(EDITOR, ROOT, 0, 0, 500).aware(EDITOR, 5);
    let script = vec![
        status(EDITOR, true, Rect::new(90, 190, 20, 20), DndAction::Copy),
        moved(95, 195),
        moved(130, 250),
        status(EDITOR, true, Rect::new(120, 240, 20, 20), DndAction::Copy),
        released(130, 250),
        finished(EDITOR, true, DndAction::Copy),
    ];
    let log = Shared::default();
    let mut manager = manager(tree, DragConfig::default(), script, &log);
    let trigger = DragTrigger::new(1, at(80, 200), at(100, 200), 0, 5);
    let result = manager.begin("hello".into(), trigger);

    assert_eq!(outcome(result), DragOutcome::Dropped { action: DndAction::Copy, success: true });
    let log = log.borrow();
    let copy = atoms().action_copy;
    assert_eq!(log.positions(), [(100, 200, copy), (130, 250, copy)]);
    assert_eq!(log.messages().last(), Some(&"XdndDrop"));
    assert_eq!(log.armed, None);
}

#[test]
fn silent_target_is_left_after_release() {
    let (result, log) = run(desktop(), "hello", vec![released(30, 30), DragEvent::TimerExpired]);

    assert_eq!(outcome(result), DragOutcome::NotAccepted);
    let log = log.borrow();
    assert_eq!(log.messages(), ["XdndEnter", "XdndPosition", "XdndLeave"]);
    assert_eq!(log.arms, [DragConfig::default().status_timeout]);
}

#[test]
fn late_status_completes_drop() {
    let script = vec![
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        moved(40, 30),
        released(40, 30),
        status(EDITOR, true, Rect::default(), DndAction::Move),
        finished(EDITOR, true, DndAction::Move),
    ];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Dropped { action: DndAction::Move, success: true });
    let log = log.borrow();
    assert_eq!(log.messages(), ["XdndEnter", "XdndPosition", "XdndPosition", "XdndDrop"]);
    assert!(matches!(log.sent[3].message, XdndMessage::Drop { source: SOURCE, time: 10 }));
}

#[test]
fn late_acceptance_after_refusal_drops() {
    let script = vec![
        status(EDITOR, false, Rect::default(), DndAction::None),
        moved(40, 30),
        released(40, 30),
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        finished(EDITOR, true, DndAction::Copy),
    ];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Dropped { action: DndAction::Copy, success: true });
    let log = log.borrow();
    assert_eq!(log.messages(), ["XdndEnter", "XdndPosition", "XdndPosition", "XdndDrop"]);
}

#[test]
fn release_before_any_status_leaves_even_if_accepted_late() {
    let script = vec![released(30, 30), status(EDITOR, true, Rect::default(), DndAction::Copy)];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::NotAccepted);
    assert_eq!(log.borrow().messages(), ["XdndEnter", "XdndPosition", "XdndLeave"]);
}

#[test]
fn late_refusal_leaves() {
    let script = vec![
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        moved(40, 30),
        released(40, 30),
        status(EDITOR, false, Rect::default(), DndAction::None),
    ];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::NotAccepted);
    let log = log.borrow();
    assert_eq!(log.messages(), ["XdndEnter", "XdndPosition", "XdndPosition", "XdndLeave"]);
}

#[test]
fn escape_cancels_and_waits_for_release() {
    let script = vec![
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        escape(),
        moved(50, 50),
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        released(50, 50),
    ];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Cancelled(CancelReason::UserEscape));
    let log = log.borrow();
    assert_eq!(log.messages(), ["XdndEnter", "XdndPosition", "XdndLeave"]);
    assert_eq!(log.preview_moves, [at(30, 30)]);
    assert!(log.previews_hidden >= 1);
    assert_eq!(log.ended, [DragOutcome::Cancelled(CancelReason::UserEscape)]);
}

#[test]
fn escape_after_release_ends_at_once() {
    let script = vec![released(30, 30), escape(), released(30, 30)];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Cancelled(CancelReason::UserEscape));
    let log = log.borrow();
    assert_eq!(log.messages(), ["XdndEnter", "XdndPosition", "XdndLeave"]);
    assert_eq!(log.ended.len(), 1);
}

#[test]
fn modifier_change_forces_position() {
    let inside = Rect::new(0, 0, 100, 100);
    let script = vec![
        status(EDITOR, true, inside, DndAction::Copy),
        moved(35, 30),
        keys(ModifiersState::ALT),
        status(EDITOR, true, inside, DndAction::Copy),
        keys(ModifiersState::ALT),
        keys(ModifiersState::ALT | ModifiersState::SHIFT),
        DragEvent::Cancel,
    ];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Cancelled(CancelReason::Host));
    let log = log.borrow();
    let atoms = atoms();
    assert_eq!(log.messages(), [
        "XdndEnter",
        "XdndPosition",
        "XdndPosition",
        "XdndPosition",
        "XdndLeave"
    ]);
    // Alt alone keeps the action but is still reported; a repeated state is not.
    assert_eq!(log.positions(), [
        (30, 30, atoms.action_copy),
        (35, 30, atoms.action_copy),
        (35, 30, atoms.action_move)
    ]);
    // The action list is only rewritten when the action changes.
    let announced = log.lists.iter().filter(|(property, _)| *property == atoms.action_list);
    assert_eq!(announced.count(), 2);
    assert_eq!(log.last_list(atoms.action_list), Some(&[atoms.action_move][..]));
}

#[test]
fn target_change_before_any_status_leaves_at_once() {
    let (result, log) = run(desktop(), "hello", vec![moved(250, 30), DragEvent::Cancel]);

    assert_eq!(outcome(result), DragOutcome::Cancelled(CancelReason::Host));
    let log = log.borrow();
    assert_eq!(log.messages(), [
        "XdndEnter",
        "XdndPosition",
        "XdndLeave",
        "XdndEnter",
        "XdndPosition",
        "XdndLeave"
    ]);
    assert_eq!(log.destinations(), [EDITOR, EDITOR, EDITOR, VIEWER, VIEWER, VIEWER]);
}

#[test]
fn target_change_gives_up_on_silent_target() {
    let script = vec![
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        moved(35, 30),
        moved(250, 30),
        moved(260, 30),
        DragEvent::TimerExpired,
        status(VIEWER, false, Rect::default(), DndAction::None),
        released(260, 30),
    ];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::NotAccepted);
    let log = log.borrow();
    assert_eq!(log.messages(), [
        "XdndEnter",
        "XdndPosition",
        "XdndPosition",
        "XdndLeave",
        "XdndEnter",
        "XdndPosition",
        "XdndLeave"
    ]);
    assert_eq!(log.destinations(), [EDITOR, EDITOR, EDITOR, EDITOR, VIEWER, VIEWER, VIEWER]);
    // The viewer is entered at the latest pointer position.
    assert_eq!(log.positions()[2].0, 260);
}

#[test]
fn status_during_target_change_switches_without_timeout() {
    let script = vec![
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        moved(35, 30),
        moved(250, 30),
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        DragEvent::TimerExpired,
        DragEvent::Cancel,
    ];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Cancelled(CancelReason::Host));
    let log = log.borrow();
    assert_eq!(log.destinations(), [EDITOR, EDITOR, EDITOR, EDITOR, VIEWER, VIEWER, VIEWER]);
    assert_eq!(log.messages()[3], "XdndLeave");
}

#[test]
fn stale_status_is_ignored() {
    let mut bogus = status(EDITOR, true, Rect::default(), DndAction::Copy);
    if let DragEvent::ClientMessage(message) = &mut bogus {
        message.data[4] = 9999;
    }
    let script = vec![
        status(VIEWER, true, Rect::default(), DndAction::Copy),
        bogus,
        moved(40, 30),
        DragEvent::Cancel,
    ];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Cancelled(CancelReason::Host));
    let log = log.borrow();
    // Still waiting for the first status, so the move was held back.
    assert_eq!(log.messages(), ["XdndEnter", "XdndPosition", "XdndLeave"]);
    assert_eq!(log.cursors, [CursorIcon::NoDrop]);
}

#[test]
fn version_is_the_lower_of_both_sides() {
    let old = FakeTree::default().window(EDITOR, ROOT, 0, 0, 100).aware(EDITOR, 3);
    let (_, log) = run(old, "hello", vec![DragEvent::Cancel]);
    assert_eq!(log.borrow().enters()[0].0, 3);

    let log = Shared::default();
    let config = DragConfig::default().with_protocol_version(4);
    let mut manager = manager(desktop(), config, vec![DragEvent::Cancel], &log);
    manager.begin("hello".into(), trigger()).unwrap();
    assert_eq!(log.borrow().enters()[0].0, 4);
}

#[test]
fn finished_before_version_five_is_a_success() {
    let tree = FakeTree::default().window(EDITOR, ROOT, 0, 0, 100).aware(EDITOR, 4);
    let script = vec![
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        released(30, 30),
        finished(EDITOR, false, DndAction::None),
    ];
    let (result, _) = run(tree, "hello", script);

    assert_eq!(outcome(result), DragOutcome::Dropped { action: DndAction::Copy, success: true });
}

#[test]
fn finished_without_action_keeps_negotiated_one() {
    let script = vec![
        status(EDITOR, true, Rect::default(), DndAction::Link),
        released(30, 30),
        finished(EDITOR, false, DndAction::None),
    ];
    let (result, _) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Dropped { action: DndAction::Link, success: false });
}

#[test]
fn missing_finished_is_unconfirmed() {
    let log = Shared::default();
    let config = DragConfig::default().with_finish_timeout(Duration::from_secs(5));
    let script = vec![
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        released(30, 30),
        DragEvent::TimerExpired,
    ];
    let mut manager = manager(desktop(), config, script, &log);
    let result = manager.begin("hello".into(), trigger());

    assert_eq!(outcome(result), DragOutcome::DropUnconfirmed { action: DndAction::Copy });
    assert_eq!(log.borrow().arms, [Duration::from_secs(5)]);
}

#[test]
fn drop_is_sent_once() {
    let script = vec![
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        released(30, 30),
        released(30, 30),
        moved(40, 40),
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        finished(VIEWER, true, DndAction::Copy),
        finished(EDITOR, true, DndAction::Copy),
    ];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Dropped { action: DndAction::Copy, success: true });
    assert_eq!(log.borrow().messages(), ["XdndEnter", "XdndPosition", "XdndDrop"]);
}

#[test]
fn unaware_desktop_sees_no_messages() {
    let tree = FakeTree::default().window(EDITOR, ROOT, 0, 0, 100);
    let (result, log) = run(tree, "hello", vec![moved(40, 40), released(40, 40)]);

    assert_eq!(outcome(result), DragOutcome::NotAccepted);
    let log = log.borrow();
    assert!(log.sent.is_empty());
    assert_eq!(log.cursors, [CursorIcon::NoDrop]);
}

#[test]
fn messages_go_through_the_proxy() {
    let proxy = 30;
    let tree = FakeTree::default()
        .window(EDITOR, ROOT, 0, 0, 100)
        .proxy(EDITOR, proxy)
        .proxy(proxy, proxy)
        .aware(proxy, 5);
    let (_, log) = run(tree, "hello", vec![DragEvent::Cancel]);

    let log = log.borrow();
    assert_eq!(log.messages(), ["XdndEnter", "XdndPosition", "XdndLeave"]);
    assert!(log.sent.iter().all(|sent| sent.destination == proxy && sent.window == EDITOR));
}

#[test]
fn resolved_target_is_cached_between_moves() {
    let tree = desktop();
    let queries = tree.queries.clone();
    let (_, _log) = run(tree, "hello", vec![
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        moved(31, 30),
        status(EDITOR, true, Rect::default(), DndAction::Copy),
        moved(32, 30),
        DragEvent::Cancel,
    ]);

    assert_eq!(queries.get(), 1);
}

#[test]
fn toplevel_change_reenters() {
    let script = vec![DragEvent::ToplevelsChanged, moved(31, 30), DragEvent::Cancel];
    let (result, log) = run(desktop(), "hello", script);

    assert_eq!(outcome(result), DragOutcome::Cancelled(CancelReason::Host));
    assert_eq!(log.borrow().messages(), [
        "XdndEnter",
        "XdndPosition",
        "XdndLeave",
        "XdndEnter",
        "XdndPosition",
        "XdndLeave"
    ]);
}

#[test]
fn source_destruction_cancels() {
    let (result, log) = run(desktop(), "hello", vec![DragEvent::SourceDestroyed]);

    assert_eq!(outcome(result), DragOutcome::Cancelled(CancelReason::SourceDestroyed));
    assert_eq!(log.borrow().messages(), ["XdndEnter", "XdndPosition", "XdndLeave"]);
}

#[test]
fn exhausted_pump_cancels() {
    let (result, log) = run(desktop(), "hello", Vec::new());

    assert_eq!(outcome(result), DragOutcome::Cancelled(CancelReason::Backend));
    let log = log.borrow();
    assert_eq!(log.messages(), ["XdndEnter", "XdndPosition", "XdndLeave"]);
    assert_eq!(log.ended.len(), 1);
}

#[test]
fn selection_requests_are_answered() {
    let log = Shared::default();
    let (uri_list, png) = {
        let mut log = log.borrow_mut();
        (log.intern("text/uri-list"), log.intern("image/png"))
    };
    let request = |selection, target| {
        DragEvent::SelectionRequest(SelectionRequest {
            requestor: EDITOR,
            selection,
            target,
            property: 400,
            time: 11,
        })
    };
    let selection = atoms().selection;
    let script = vec![
        request(selection, uri_list),
        request(selection, png),
        request(999, uri_list),
        DragEvent::Cancel,
    ];
    let mut manager = manager(desktop(), DragConfig::default(), script, &log);
    let payload = DragPayload::from(UrlList::new(["https://example.org/"]));
    manager.begin(payload, trigger()).unwrap();

    assert_eq!(log.borrow().answers, [
        (uri_list, Some(b"https://example.org/\r\n".to_vec())),
        (png, None),
        (uri_list, None),
    ]);
}

#[test]
fn local_targets_get_window_tokens() {
    let log = Shared::default();
    log.borrow_mut().local.insert(EDITOR);
    let mut manager = manager(desktop(), DragConfig::default(), vec![DragEvent::Cancel], &log);
    let payload = DragPayload::Windows(vec![WindowToken(7)]);
    manager.begin(payload, trigger()).unwrap();

    let mut log = log.borrow_mut();
    let toplevel = log.intern("application/x-xdnd-toplevel");
    assert_eq!(log.enters(), [(5, false, [toplevel, 0, 0])]);
    assert_eq!(log.last_list(atoms().type_list), None);
}

#[test]
fn window_tokens_reorder_on_release() {
    let log = Shared::default();
    log.borrow_mut().reorder = true;
    let tree = FakeTree::default();
    let mut manager = manager(tree, DragConfig::default(), vec![released(150, 150)], &log);
    let result = manager.begin(DragPayload::Windows(vec![WindowToken(7)]), trigger());

    assert_eq!(outcome(result), DragOutcome::LocalDrop);
    let log = log.borrow();
    assert_eq!(log.reordered, [(vec![WindowToken(7)], at(150, 150))]);
    assert_eq!(log.cursors, [CursorIcon::Default]);
}

#[test]
fn refused_reorder_is_not_accepted() {
    let log = Shared::default();
    let tree = FakeTree::default();
    let mut manager = manager(tree, DragConfig::default(), vec![released(150, 150)], &log);
    let result = manager.begin(DragPayload::Windows(vec![WindowToken(7)]), trigger());

    assert_eq!(outcome(result), DragOutcome::NotAccepted);
    assert_eq!(log.borrow().reordered.len(), 1);
}

#[test]
fn invalid_starts_are_refused() {
    let log = Shared::default();
    let mut manager = manager(desktop(), DragConfig::default(), Vec::new(), &log);

    let wrong_button = DragTrigger::new(3, at(10, 10), at(30, 30), 0, 5);
    assert!(matches!(
        manager.begin("hello".into(), wrong_button),
        Err(DragError::ButtonNotHeld)
    ));
    let short = DragTrigger::new(1, at(10, 10), at(14, 18), 0, 5);
    assert!(matches!(manager.begin("hello".into(), short), Err(DragError::BelowThreshold)));
    assert!(matches!(manager.begin("".into(), trigger()), Err(DragError::EmptyPayload)));

    log.borrow_mut().refuse_selection = true;
    assert!(matches!(manager.begin("hello".into(), trigger()), Err(DragError::Backend(_))));

    let log = log.borrow();
    assert!(log.sent.is_empty());
    assert!(log.selections.is_empty());
    assert!(log.ended.is_empty());
}

/// Tries to start a second drag from inside the first one.
struct NestedStart {
    inner: Option<DragManager>,
    result: Rc<RefCell<Option<Result<DragOutcome, DragError>>>>,
}

impl DragFeedback for NestedStart {
    fn create_preview(
        &mut self,
        _screen: usize,
    ) -> Result<Option<Box<dyn DragPreview>>, BackendError> {
        if let Some(mut inner) = self.inner.take() {
            *self.result.borrow_mut() = Some(inner.begin("nested".into(), trigger()));
        }
        Ok(None)
    }
}

#[test]
fn only_one_drag_at_a_time() {
    let inner_log = Shared::default();
    let inner = manager(desktop(), DragConfig::default(), Vec::new(), &inner_log);
    let result = Rc::new(RefCell::new(None));

    let log = Shared::default();
    let mut outer = DragManager::new(
        DragConfig::default(),
        Box::new(RecordingChannel { log: log.clone() }),
        Box::new(desktop()),
        Box::new(ManualTimer { log: log.clone() }),
        Box::new(ScriptedPump { script: vec![DragEvent::Cancel].into(), log: log.clone() }),
        Box::new(NestedStart { inner: Some(inner), result: result.clone() }),
    );
    let outcome = outer.begin("hello".into(), trigger());

    assert!(matches!(outcome, Ok(DragOutcome::Cancelled(CancelReason::Host))));
    assert!(matches!(*result.borrow(), Some(Err(DragError::AlreadyActive))));
    assert!(inner_log.borrow().selections.is_empty());

    // The guard is gone once the drag ended.
    let mut again = manager(desktop(), DragConfig::default(), vec![DragEvent::Cancel], &log);
    assert!(again.begin("hello".into(), trigger()).is_ok());
}
