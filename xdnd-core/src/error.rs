//! Common error types.

use std::{error, fmt};

/// Create a [`BackendError`] that records where it was raised.
#[macro_export]
macro_rules! os_error {
    ($error:expr) => {{
        $crate::error::BackendError::new(line!(), file!(), $error)
    }};
}

/// The error type returned when a drag could not be started.
///
/// Once a session is running nothing is reported through this type: failures inside the session
/// are logged and resolved into a [`DragOutcome`](crate::DragOutcome) instead.
#[derive(Debug)]
pub enum DragError {
    /// A drag session is already running on this thread.
    AlreadyActive,
    /// The drag button was not held when the drag was requested.
    ButtonNotHeld,
    /// The pointer has not travelled far enough from the press position.
    BelowThreshold,
    /// The payload has nothing to offer.
    EmptyPayload,
    /// The windowing backend failed before the session could start.
    Backend(BackendError),
}

impl fmt::Display for DragError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyActive => f.write_str("a drag session is already active"),
            Self::ButtonNotHeld => f.write_str("the drag button is not held"),
            Self::BelowThreshold => f.write_str("the pointer did not move past the drag threshold"),
            Self::EmptyPayload => f.write_str("the drag payload is empty"),
            Self::Backend(err) => write!(f, "backend error: {err}"),
        }
    }
}

impl error::Error for DragError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for DragError {
    fn from(value: BackendError) -> Self {
        Self::Backend(value)
    }
}

/// The error type for when the windowing system fails to carry out a request.
#[derive(Clone)]
pub struct BackendError {
    line: u32,
    file: &'static str,
    error: String,
}

impl BackendError {
    pub fn new(line: u32, file: &'static str, error: impl fmt::Display) -> BackendError {
        BackendError { line, file, error: error.to_string() }
    }

    /// The message of the underlying error.
    pub fn message(&self) -> &str {
        &self.error
    }
}

impl fmt::Debug for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("backend error at {}:{}: {}", self.file, self.line, self.error))
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.error)
    }
}

impl error::Error for BackendError {}
