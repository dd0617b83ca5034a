//! Finding the drop target under the pointer.

use tracing::{debug, trace, warn};

use crate::error::BackendError;
use crate::XWindow;

/// Deepest window hierarchy the resolver descends into.
const MAX_DEPTH: usize = 64;

/// Read access to the window hierarchy of the display.
///
/// Windows can disappear at any moment; implementations report a vanished window as having no
/// children and no properties rather than as an error.
pub trait WindowTree {
    /// The root window of `screen`, if that screen exists.
    fn root(&self, screen: usize) -> Option<XWindow>;

    /// The mapped child of `parent` containing the point, with the point translated into the
    /// child's coordinates. `(x, y)` are relative to `parent`.
    fn child_at(
        &self,
        parent: XWindow,
        x: i32,
        y: i32,
    ) -> Result<Option<(XWindow, i32, i32)>, BackendError>;

    /// The protocol version advertised through `XdndAware`.
    fn awareness(&self, window: XWindow) -> Result<Option<u32>, BackendError>;

    /// The raw value of the `XdndProxy` property.
    fn proxy_property(&self, window: XWindow) -> Result<Option<XWindow>, BackendError>;
}

impl<T: WindowTree + ?Sized> WindowTree for Box<T> {
    fn root(&self, screen: usize) -> Option<XWindow> {
        (**self).root(screen)
    }

    fn child_at(
        &self,
        parent: XWindow,
        x: i32,
        y: i32,
    ) -> Result<Option<(XWindow, i32, i32)>, BackendError> {
        (**self).child_at(parent, x, y)
    }

    fn awareness(&self, window: XWindow) -> Result<Option<u32>, BackendError> {
        (**self).awareness(window)
    }

    fn proxy_property(&self, window: XWindow) -> Result<Option<XWindow>, BackendError> {
        (**self).proxy_property(window)
    }
}

/// The window a drag is currently over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub window: XWindow,
    /// Receives the protocol messages on behalf of `window`.
    pub proxy: Option<XWindow>,
    /// Version advertised by the target. `None` means the window does not speak XDND.
    pub version: Option<u32>,
    pub screen: usize,
}

impl TargetDescriptor {
    fn unaware(window: XWindow, screen: usize) -> Self {
        Self { window, proxy: None, version: None, screen }
    }

    /// Where protocol messages for this target are delivered.
    pub fn destination(&self) -> XWindow {
        self.proxy.unwrap_or(self.window)
    }

    pub fn is_aware(&self) -> bool {
        self.version.is_some()
    }
}

/// Maps a point to the XDND target below it.
pub struct TargetResolver<T = Box<dyn WindowTree>> {
    tree: T,
    cached: Option<TargetDescriptor>,
}

impl<T: WindowTree> TargetResolver<T> {
    pub fn new(tree: T) -> Self {
        Self { tree, cached: None }
    }

    pub fn tree(&self) -> &T {
        &self.tree
    }

    /// Forget the cached descriptor.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Resolve the target at root coordinates `(x, y)` of `screen`.
    ///
    /// Descends from the root through the children containing the point and stops at the first
    /// window that speaks XDND, either itself or through a valid proxy. When nothing qualifies the
    /// root is returned, carrying the root's own proxy if the desktop installed one.
    pub fn resolve(&mut self, x: i32, y: i32, screen: usize) -> TargetDescriptor {
        let Some(root) = self.tree.root(screen) else {
            warn!(screen, "no root window for screen");
            return TargetDescriptor::unaware(0, screen);
        };

        let found = match self.walk(root, x, y, screen) {
            Ok(found) => found,
            Err(err) => {
                warn!("failed to query window tree: {err}");
                None
            },
        };

        let descriptor = match found {
            Some(descriptor) => descriptor,
            None => match self.describe(root, screen) {
                Ok(Some(descriptor)) => descriptor,
                Ok(None) => TargetDescriptor::unaware(root, screen),
                Err(err) => {
                    warn!("failed to read root window properties: {err}");
                    TargetDescriptor::unaware(root, screen)
                },
            },
        };

        if self.cached != Some(descriptor) {
            trace!(?descriptor, "target resolved");
        }
        self.cached = Some(descriptor);
        descriptor
    }

    fn walk(
        &self,
        root: XWindow,
        x: i32,
        y: i32,
        screen: usize,
    ) -> Result<Option<TargetDescriptor>, BackendError> {
        let (mut parent, mut x, mut y) = (root, x, y);
        for _ in 0..MAX_DEPTH {
            let Some((child, child_x, child_y)) = self.tree.child_at(parent, x, y)? else {
                return Ok(None);
            };

            if let Some(cached) = self.cached.filter(|c| c.window == child && c.screen == screen) {
                return Ok(Some(cached));
            }
            if let Some(descriptor) = self.describe(child, screen)? {
                return Ok(Some(descriptor));
            }

            (parent, x, y) = (child, child_x, child_y);
        }

        debug!("window tree deeper than {MAX_DEPTH} levels, giving up");
        Ok(None)
    }

    /// Describe `window` if it takes part in the protocol.
    fn describe(
        &self,
        window: XWindow,
        screen: usize,
    ) -> Result<Option<TargetDescriptor>, BackendError> {
        let proxy = self.valid_proxy(window)?;
        let version = self.tree.awareness(proxy.unwrap_or(window))?;
        Ok(version.map(|version| TargetDescriptor { window, proxy, version: Some(version), screen }))
    }

    /// The proxy of `window`, accepted only when it names itself as its own proxy.
    fn valid_proxy(&self, window: XWindow) -> Result<Option<XWindow>, BackendError> {
        let Some(proxy) = self.tree.proxy_property(window)? else {
            return Ok(None);
        };
        if self.tree.proxy_property(proxy)? == Some(proxy) {
            Ok(Some(proxy))
        } else {
            debug!(window, proxy, "ignoring stale XdndProxy");
            Ok(None)
        }
    }
}
