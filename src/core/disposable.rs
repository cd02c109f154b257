//! Disposable handles and the composite container.
//!
//! A [`Disposable`] stands for one piece of cancellable work or one live
//! resource. `dispose` is idempotent and the disposed flag never goes back to
//! `false`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

/// Capability to cancel a pending task or release a resource.
pub trait Disposable: Send + Sync {
    /// Cancel or release. Calling it more than once has no further effect.
    fn dispose(&self);

    /// Whether this resource is disposed. Never blocks for long and never fails.
    fn is_disposed(&self) -> bool;
}

/// Shared, type-erased disposable handle.
pub type DisposableRef = Arc<dyn Disposable>;

/// Identity of a disposable: the address of its data.
fn identity(d: &dyn Disposable) -> usize {
    std::ptr::from_ref(d).cast::<()>() as usize
}

struct Disposed;

impl Disposable for Disposed {
    fn dispose(&self) {}

    fn is_disposed(&self) -> bool {
        true
    }
}

static DISPOSED: OnceLock<DisposableRef> = OnceLock::new();

/// A handle that is already disposed. The same instance is shared.
#[must_use]
pub fn disposed() -> DisposableRef {
    Arc::clone(DISPOSED.get_or_init(|| Arc::new(Disposed)))
}

/// Disposable running `f` on the first `dispose` call.
struct FnDisposable {
    action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Disposable for FnDisposable {
    fn dispose(&self) {
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    fn is_disposed(&self) -> bool {
        self.action.lock().is_none()
    }
}

/// Wrap a callback into a disposable that runs it at most once.
pub fn from_fn<F>(f: F) -> DisposableRef
where
    F: FnOnce() + Send + 'static,
{
    Arc::new(FnDisposable {
        action: Mutex::new(Some(Box::new(f))),
    })
}

/// Create an empty composite.
#[must_use]
pub fn composite() -> Arc<CompositeDisposable> {
    Arc::new(CompositeDisposable::new())
}

/// Unordered set of disposables disposed together.
///
/// Members are keyed by identity. Once the composite is disposed, `add`
/// disposes the incoming member right away instead of storing it. Members are
/// always disposed outside the internal lock, so a member may call back into
/// [`CompositeDisposable::remove`] while being disposed.
pub struct CompositeDisposable {
    /// `None` once disposed.
    members: Mutex<Option<HashMap<usize, DisposableRef>>>,
}

impl CompositeDisposable {
    /// Create an empty, live composite.
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: Mutex::new(Some(HashMap::new())),
        }
    }

    /// Add a member. Returns `false` (and disposes `d`) if the composite is
    /// already disposed.
    pub fn add(&self, d: DisposableRef) -> bool {
        {
            let mut members = self.members.lock();
            if let Some(map) = members.as_mut() {
                map.insert(identity(d.as_ref()), d);
                return true;
            }
        }
        d.dispose();
        false
    }

    /// Remove a member without disposing it. Returns whether it was present.
    pub fn remove(&self, d: &dyn Disposable) -> bool {
        self.members
            .lock()
            .as_mut()
            .is_some_and(|map| map.remove(&identity(d)).is_some())
    }

    /// Number of live members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.lock().as_ref().map_or(0, HashMap::len)
    }

    /// Whether no member is currently held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose the composite and every member. Returns `true` only for the
    /// call that performed the transition.
    pub fn dispose_once(&self) -> bool {
        let Some(map) = self.members.lock().take() else {
            return false;
        };
        for member in map.into_values() {
            member.dispose();
        }
        true
    }
}

impl Default for CompositeDisposable {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) {
        self.dispose_once();
    }

    fn is_disposed(&self) -> bool {
        self.members.lock().is_none()
    }
}
