use std::error::Error;
use std::fmt;
use std::sync::Arc;

use x11rb::cookie::VoidCookie;
use x11rb::errors::{ConnectionError, ReplyError};
use x11rb::protocol::xproto::{self, ConnectionExt as _};
use x11rb::protocol::ErrorKind;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::xdisplay::XConnection;

#[derive(Debug, Clone)]
pub enum GetPropertyError {
    X11rbError(Arc<ReplyError>),
    TypeMismatch(xproto::Atom),
    FormatMismatch(u8),
}

impl GetPropertyError {
    /// Whether the request failed because the window no longer exists.
    pub fn is_bad_window(&self) -> bool {
        match self {
            GetPropertyError::X11rbError(err) => {
                matches!(&**err, ReplyError::X11Error(e) if e.error_kind == ErrorKind::Window)
            },
            _ => false,
        }
    }
}

impl<T: Into<ReplyError>> From<T> for GetPropertyError {
    fn from(e: T) -> Self {
        Self::X11rbError(Arc::new(e.into()))
    }
}

impl fmt::Display for GetPropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GetPropertyError::X11rbError(err) => err.fmt(f),
            GetPropertyError::TypeMismatch(err) => write!(f, "type mismatch: {err}"),
            GetPropertyError::FormatMismatch(err) => write!(f, "format mismatch: {err}"),
        }
    }
}

impl Error for GetPropertyError {}

impl XConnection {
    /// Read the first value of a format 32 property.
    ///
    /// A missing property reads as `None`. Pass [`xproto::AtomEnum::ANY`] to accept any type.
    pub fn get_cardinal(
        &self,
        window: xproto::Window,
        property: xproto::Atom,
        property_type: impl Into<xproto::Atom>,
    ) -> Result<Option<u32>, GetPropertyError> {
        let property_type = property_type.into();
        let reply = self
            .xcb_connection()
            .get_property(false, window, property, property_type, 0, 1)?
            .reply()?;
        first_value32(&reply, property_type)
    }

    pub fn change_property32<'a>(
        &'a self,
        window: xproto::Window,
        property: xproto::Atom,
        property_type: impl Into<xproto::Atom>,
        mode: xproto::PropMode,
        new_value: &[u32],
    ) -> Result<VoidCookie<'a, RustConnection>, ConnectionError> {
        self.xcb_connection().change_property32(mode, window, property, property_type, new_value)
    }

    pub fn change_property8<'a>(
        &'a self,
        window: xproto::Window,
        property: xproto::Atom,
        property_type: xproto::Atom,
        new_value: &[u8],
    ) -> Result<VoidCookie<'a, RustConnection>, ConnectionError> {
        self.xcb_connection().change_property8(
            xproto::PropMode::REPLACE,
            window,
            property,
            property_type,
            new_value,
        )
    }
}

fn first_value32(
    reply: &xproto::GetPropertyReply,
    property_type: xproto::Atom,
) -> Result<Option<u32>, GetPropertyError> {
    if reply.type_ == u32::from(xproto::AtomEnum::NONE) {
        return Ok(None);
    }
    if property_type != u32::from(xproto::AtomEnum::ANY) && reply.type_ != property_type {
        return Err(GetPropertyError::TypeMismatch(reply.type_));
    }
    if reply.format != 32 {
        return Err(GetPropertyError::FormatMismatch(reply.format));
    }
    Ok(reply.value32().and_then(|mut values| values.next()))
}
