use std::cell::RefCell;
use std::fmt;

use ahash::AHashMap;
use tracing::debug;
use x11rb::connection::Connection;
use x11rb::errors::{ConnectError, ConnectionError, IdsExhausted, ReplyError, ReplyOrIdError};
use x11rb::protocol::xproto::{self, ConnectionExt as _};
use x11rb::rust_connection::RustConnection;
use x11rb::x11_utils::X11Error as LogicalError;

use crate::atoms::Atoms;
use crate::util::GetPropertyError;

/// A connection to an X server.
pub(crate) struct XConnection {
    conn: RustConnection,

    /// The screen the display was opened on.
    pub default_screen: usize,

    /// Atoms the drag source always needs.
    atoms: Atoms,

    /// Atoms interned on demand, usually MIME type names.
    atom_cache: RefCell<AtomCache>,
}

#[derive(Default)]
struct AtomCache {
    by_name: AHashMap<String, xproto::Atom>,
    by_atom: AHashMap<xproto::Atom, String>,
}

impl XConnection {
    pub fn new(display_name: Option<&str>) -> Result<XConnection, X11Error> {
        let (conn, default_screen) = RustConnection::connect(display_name)?;
        let atoms = Atoms::new(&conn)?.reply()?;
        debug!(default_screen, "connected to X server");

        Ok(XConnection { conn, default_screen, atoms, atom_cache: Default::default() })
    }

    /// Get the underlying x11rb connection.
    #[inline]
    pub fn xcb_connection(&self) -> &RustConnection {
        &self.conn
    }

    #[inline]
    pub fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    #[inline]
    pub fn screens(&self) -> &[xproto::Screen] {
        &self.conn.setup().roots
    }

    pub fn root(&self, screen: usize) -> Option<xproto::Window> {
        self.screens().get(screen).map(|screen| screen.root)
    }

    /// The screen whose root window is `root`.
    pub fn screen_of_root(&self, root: xproto::Window) -> Option<usize> {
        self.screens().iter().position(|screen| screen.root == root)
    }

    /// Whether `window` was created through this connection.
    pub fn owns_resource(&self, window: xproto::Window) -> bool {
        let setup = self.conn.setup();
        window & !setup.resource_id_mask == setup.resource_id_base
    }

    pub fn intern(&self, name: &str) -> Result<xproto::Atom, X11Error> {
        if let Some(&atom) = self.atom_cache.borrow().by_name.get(name) {
            return Ok(atom);
        }

        let atom = self.conn.intern_atom(false, name.as_bytes())?.reply()?.atom;
        let mut cache = self.atom_cache.borrow_mut();
        cache.by_name.insert(name.to_owned(), atom);
        cache.by_atom.insert(atom, name.to_owned());
        Ok(atom)
    }

    pub fn atom_name(&self, atom: xproto::Atom) -> Result<String, X11Error> {
        if let Some(name) = self.atom_cache.borrow().by_atom.get(&atom) {
            return Ok(name.clone());
        }

        let reply = self.conn.get_atom_name(atom)?.reply()?;
        let name = String::from_utf8_lossy(&reply.name).into_owned();
        let mut cache = self.atom_cache.borrow_mut();
        cache.by_name.insert(name.clone(), atom);
        cache.by_atom.insert(atom, name.clone());
        Ok(name)
    }

    /// Send queued requests to the server.
    pub fn flush(&self) -> Result<(), X11Error> {
        self.conn.flush()?;
        Ok(())
    }
}

impl fmt::Debug for XConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XConnection").field("default_screen", &self.default_screen).finish()
    }
}

/// Generic sum error type for X11 errors.
#[derive(Debug)]
pub enum X11Error {
    /// An error that occurred while trying to connect to the X server.
    Connect(ConnectError),

    /// An error that occurred over the connection medium.
    Connection(ConnectionError),

    /// An error that occurred logically on the X11 end.
    X11(LogicalError),

    /// The XID range has been exhausted.
    XidsExhausted(IdsExhausted),

    /// Failed to get property.
    GetProperty(GetPropertyError),

    /// A grab could not be established.
    GrabFailed(&'static str, xproto::GrabStatus),

    /// Another client kept the selection.
    SelectionNotOwned,

    /// The server does not report the requested screen.
    NoScreen(usize),
}

impl fmt::Display for X11Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            X11Error::Connect(e) => write!(f, "X11 connection error: {e}"),
            X11Error::Connection(e) => write!(f, "X11 connection error: {e}"),
            X11Error::X11(e) => write!(f, "X11 error: {e:?}"),
            X11Error::XidsExhausted(e) => write!(f, "XID range exhausted: {e}"),
            X11Error::GetProperty(e) => write!(f, "Failed to get X property {e}"),
            X11Error::GrabFailed(device, status) => {
                write!(f, "Failed to grab the {device}: {status:?}")
            },
            X11Error::SelectionNotOwned => f.write_str("Failed to take ownership of XdndSelection"),
            X11Error::NoScreen(screen) => write!(f, "X server has no screen {screen}"),
        }
    }
}

impl std::error::Error for X11Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            X11Error::Connect(e) => Some(e),
            X11Error::Connection(e) => Some(e),
            X11Error::XidsExhausted(e) => Some(e),
            X11Error::GetProperty(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConnectError> for X11Error {
    fn from(e: ConnectError) -> Self {
        X11Error::Connect(e)
    }
}

impl From<ConnectionError> for X11Error {
    fn from(e: ConnectionError) -> Self {
        X11Error::Connection(e)
    }
}

impl From<LogicalError> for X11Error {
    fn from(e: LogicalError) -> Self {
        X11Error::X11(e)
    }
}

impl From<ReplyError> for X11Error {
    fn from(value: ReplyError) -> Self {
        match value {
            ReplyError::ConnectionError(e) => e.into(),
            ReplyError::X11Error(e) => e.into(),
        }
    }
}

impl From<ReplyOrIdError> for X11Error {
    fn from(value: ReplyOrIdError) -> Self {
        match value {
            ReplyOrIdError::ConnectionError(e) => e.into(),
            ReplyOrIdError::X11Error(e) => e.into(),
            ReplyOrIdError::IdsExhausted => Self::XidsExhausted(IdsExhausted),
        }
    }
}

impl From<GetPropertyError> for X11Error {
    fn from(value: GetPropertyError) -> Self {
        Self::GetProperty(value)
    }
}
