//! Platform independent core of the XDND drag source.
//!
//! This crate holds the protocol state machine that drives an outgoing drag: it negotiates with
//! the window under the pointer, coalesces motion into `XdndPosition` messages, answers
//! selection requests for the payload and guarantees that the session always ends, even against
//! targets that never reply.
//!
//! Nothing in here talks to a display server. A backend (such as `xdnd-x11`) implements the
//! collaborator traits in [`backend`], [`resolver::WindowTree`] and [`feedback`], and the
//! [`DragManager`] drives them.
//!
//! ```no_run
//! # fn backend() -> (
//! #     Box<dyn xdnd_core::backend::MessageChannel>,
//! #     Box<dyn xdnd_core::resolver::WindowTree>,
//! #     Box<dyn xdnd_core::backend::TimeoutScheduler>,
//! #     Box<dyn xdnd_core::backend::EventPump>,
//! # ) { unimplemented!() }
//! use xdnd_core::{DragConfig, DragManager, DragPayload, DragTrigger, NoFeedback, UrlList};
//!
//! let (channel, tree, timer, pump) = backend();
//! let mut manager =
//!     DragManager::new(DragConfig::default(), channel, tree, timer, pump, Box::new(NoFeedback));
//!
//! let payload = DragPayload::from(UrlList::new(["https://example.org/"]));
//! let trigger = DragTrigger::new(1, (10, 10).into(), (30, 10).into(), 0, 0);
//! match manager.begin(payload, trigger) {
//!     Ok(outcome) => println!("drag ended: {outcome:?}"),
//!     Err(err) => eprintln!("drag refused: {err}"),
//! }
//! ```

pub mod action;
pub mod backend;
pub mod config;
#[macro_use]
pub mod error;
pub mod event;
pub mod feedback;
pub mod gesture;
pub mod manager;
pub mod mime;
pub mod payload;
pub mod protocol;
pub mod resolver;
pub mod session;

/// An X window identifier.
pub type XWindow = u32;
/// An X atom.
pub type XAtom = u32;

pub use crate::action::{DndAction, ModifiersState};
pub use crate::config::{DragConfig, XDND_VERSION};
pub use crate::error::{BackendError, DragError};
pub use crate::event::{DragEvent, SelectionRequest};
pub use crate::feedback::{DragFeedback, DragPreview, NoFeedback};
pub use crate::gesture::{DragDetector, DragTrigger};
pub use crate::manager::DragManager;
pub use crate::mime::{Audience, MimeNegotiator, MimeType};
pub use crate::payload::{DragPayload, UrlList, WindowToken};
pub use crate::resolver::{TargetDescriptor, TargetResolver};
pub use crate::session::{CancelReason, DragOutcome};
