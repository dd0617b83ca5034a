//! The content carried by a drag.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies one of the application's own top-level windows.
///
/// Tokens are opaque to the engine; they only travel to other windows of the same process and
/// back to the host through [`DragFeedback::reorder_windows`](crate::DragFeedback::reorder_windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowToken(pub u64);

/// A list of URLs, optionally described by a title.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UrlList {
    /// URLs or absolute local paths.
    pub urls: Vec<String>,
    /// A human readable description, usually a page or file title.
    pub title: Option<String>,
}

impl UrlList {
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { urls: urls.into_iter().map(Into::into).collect(), title: None }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// The title, if it has any content.
    pub(crate) fn description(&self) -> Option<&str> {
        self.title.as_deref().filter(|title| !title.is_empty())
    }
}

/// What is being dragged. Exactly one kind of content is active per drag.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DragPayload {
    Urls(UrlList),
    Text(String),
    /// The application's own top-level windows, dragged to be rearranged.
    Windows(Vec<WindowToken>),
}

impl DragPayload {
    /// Whether there is anything to transfer.
    pub fn is_empty(&self) -> bool {
        match self {
            DragPayload::Urls(list) => list.urls.iter().all(|url| url.is_empty()),
            DragPayload::Text(text) => text.is_empty(),
            DragPayload::Windows(windows) => windows.is_empty(),
        }
    }

    pub fn windows(&self) -> Option<&[WindowToken]> {
        match self {
            DragPayload::Windows(windows) => Some(windows),
            _ => None,
        }
    }
}

impl From<UrlList> for DragPayload {
    fn from(value: UrlList) -> Self {
        DragPayload::Urls(value)
    }
}

impl From<String> for DragPayload {
    fn from(value: String) -> Self {
        DragPayload::Text(value)
    }
}

impl From<&str> for DragPayload {
    fn from(value: &str) -> Self {
        DragPayload::Text(value.to_owned())
    }
}
