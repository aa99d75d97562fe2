use children_loaded_core::NodeKey;
use futures::future::{self, FutureExt, LocalBoxFuture};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::rc::Rc;
use tokio::sync::watch;

/// Resolving half of a [`PendingCheck`]. Dropping it without resolving
/// abandons the check.
pub(crate) struct Resolver(watch::Sender<bool>);

impl Resolver {
    /// Returns `true` only on the call that actually resolved the check.
    pub(crate) fn resolve(&self) -> bool {
        self.0.send_if_modified(|loaded| {
            if *loaded {
                false
            } else {
                *loaded = true;
                true
            }
        })
    }
}

pub(crate) fn channel(id: u64, node: NodeKey) -> (PendingCheck, Resolver) {
    let (sender, receiver) = watch::channel(false);
    let check = PendingCheck {
        inner: Rc::new(Inner { id, node, receiver }),
    };
    (check, Resolver(sender))
}

struct Inner {
    id: u64,
    node: NodeKey,
    receiver: watch::Receiver<bool>,
}

/// An in-flight load check for one element.
///
/// Clones share identity: every caller that received the check from the
/// same registration sees `same_check` return `true` and is woken by the
/// same resolution. The check only ever resolves to `true`.
#[derive(Clone)]
pub struct PendingCheck {
    inner: Rc<Inner>,
}

impl PendingCheck {
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Key of the element being watched.
    pub fn node(&self) -> NodeKey {
        self.inner.node
    }

    pub fn same_check(&self, other: &PendingCheck) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_resolved(&self) -> bool {
        *self.inner.receiver.borrow()
    }

    /// Whether the check was superseded, or its detector dropped, before it
    /// resolved. An abandoned check stays pending forever.
    pub fn is_abandoned(&self) -> bool {
        !self.is_resolved() && self.inner.receiver.has_changed().is_err()
    }

    /// Future that completes with `true` once the children are loaded.
    ///
    /// Can be called any number of times; every future completes on the same
    /// resolution. For an abandoned check the future never completes.
    pub fn wait(&self) -> impl Future<Output = bool> + use<> {
        let mut receiver = self.inner.receiver.clone();
        async move {
            let resolved = receiver.wait_for(|loaded| *loaded).await.is_ok();
            if resolved {
                true
            } else {
                future::pending().await
            }
        }
    }
}

impl fmt::Debug for PendingCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCheck")
            .field("id", &self.inner.id)
            .field("node", &self.inner.node)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl IntoFuture for PendingCheck {
    type Output = bool;
    type IntoFuture = LocalBoxFuture<'static, bool>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed_local()
    }
}

/// Answer of [`LoadDetector::is_loaded`](crate::LoadDetector::is_loaded).
///
/// `Loaded` means the heuristic already holds and no observation was set
/// up, so the caller can continue without yielding. `Pending` carries the
/// shared check to wait on.
#[derive(Debug, Clone)]
pub enum LoadState {
    Loaded,
    Pending(PendingCheck),
}

impl LoadState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded)
    }

    pub fn pending(&self) -> Option<&PendingCheck> {
        match self {
            LoadState::Loaded => None,
            LoadState::Pending(check) => Some(check),
        }
    }

    pub fn into_pending(self) -> Option<PendingCheck> {
        match self {
            LoadState::Loaded => None,
            LoadState::Pending(check) => Some(check),
        }
    }
}

impl IntoFuture for LoadState {
    type Output = bool;
    type IntoFuture = LocalBoxFuture<'static, bool>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            LoadState::Loaded => future::ready(true).boxed_local(),
            LoadState::Pending(check) => check.into_future(),
        }
    }
}
