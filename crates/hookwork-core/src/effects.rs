use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Cleanup handle returned by an effect or a subscription.
///
/// Clones share the same closure; whichever clone runs first consumes it.
#[derive(Clone)]
pub struct Dispose(Rc<RefCell<Option<Box<dyn FnOnce()>>>>);

impl Dispose {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Rc::new(RefCell::new(Some(Box::new(f)))))
    }

    /// A handle with nothing to clean up.
    pub fn noop() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }

    /// Runs at most once (safe to call multiple times).
    pub fn run(&self) {
        // Take before calling so a cleanup that touches this handle again does not re-borrow.
        let f = self.0.borrow_mut().take();
        if let Some(f) = f {
            f()
        }
    }

    pub fn is_spent(&self) -> bool {
        self.0.borrow().is_none()
    }
}

impl fmt::Debug for Dispose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispose")
            .field("spent", &self.is_spent())
            .finish()
    }
}

/// Helper to build the cleanup returned from an effect body.
pub fn on_unmount(f: impl FnOnce() + 'static) -> Dispose {
    Dispose::new(f)
}

/// Anything an effect body may return.
///
/// `()` means "no cleanup"; a `Result` lets the effect fail, in which case the
/// error is handed back to whoever called `end_render`.
pub trait IntoCleanup {
    fn into_cleanup(self) -> anyhow::Result<Option<Dispose>>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> anyhow::Result<Option<Dispose>> {
        Ok(None)
    }
}

impl IntoCleanup for Dispose {
    fn into_cleanup(self) -> anyhow::Result<Option<Dispose>> {
        Ok(Some(self))
    }
}

impl IntoCleanup for Option<Dispose> {
    fn into_cleanup(self) -> anyhow::Result<Option<Dispose>> {
        Ok(self)
    }
}

impl<T, E> IntoCleanup for Result<T, E>
where
    T: IntoCleanup,
    E: Into<anyhow::Error>,
{
    fn into_cleanup(self) -> anyhow::Result<Option<Dispose>> {
        self.map_err(Into::into)?.into_cleanup()
    }
}
