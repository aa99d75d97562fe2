use crate::config::DetectorConfig;
use crate::heuristic::is_loaded_sync;
use crate::pending::{self, LoadState, PendingCheck, Resolver};
use crate::registry::PendingRegistry;
use children_loaded_core::{
    ChildListObserver, LoadError, MutationCallback, MutationSummary, TreeNode, WeakNode,
};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

/// Memoizes asynchronous load checks per element.
///
/// At most one check per element is in flight. Every caller asking about the
/// same element gets the same [`PendingCheck`] until it resolves, unless it
/// forces a new one. Checks still pending when the detector is dropped lose
/// their observation and are abandoned.
pub struct LoadDetector<N, O>
where
    N: TreeNode,
    O: ChildListObserver<N>,
{
    observer: O,
    config: DetectorConfig,
    registry: Rc<RefCell<PendingRegistry<N>>>,
    next_check: Cell<u64>,
}

impl<N, O> LoadDetector<N, O>
where
    N: TreeNode,
    O: ChildListObserver<N>,
{
    pub fn new(observer: O) -> Self {
        Self::with_config(observer, DetectorConfig::default())
    }

    pub fn with_config(observer: O, config: DetectorConfig) -> Self {
        Self {
            observer,
            config,
            registry: Rc::new(RefCell::new(PendingRegistry::new())),
            next_check: Cell::new(1),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Same as the free function [`is_loaded_sync`](crate::is_loaded_sync).
    pub fn is_loaded_sync(&self, element: &N) -> bool {
        is_loaded_sync(element)
    }

    /// Returns [`LoadState::Loaded`] if the children of `element` are already
    /// known to be parsed. Otherwise returns the pending check for `element`,
    /// creating one if none exists or if `force_new_check` is set.
    ///
    /// A forced check replaces the previous one: its observation is
    /// disconnected and the old [`PendingCheck`] never resolves.
    pub fn is_loaded(&self, element: &N, force_new_check: bool) -> Result<LoadState, LoadError> {
        if is_loaded_sync(element) {
            trace!(node = element.key().raw(), "children already loaded");
            return Ok(LoadState::Loaded);
        }

        if !force_new_check {
            let (existing, stale) = self.registry.borrow_mut().get(element);
            drop(stale);
            if let Some(check) = existing {
                trace!(check = check.id(), "reusing pending load check");
                return Ok(LoadState::Pending(check));
            }
        }

        let id = self.next_check.get();
        self.next_check.set(id + 1);
        let (check, resolver) = pending::channel(id, element.key());

        let callback = self.resolve_when_loaded(element, id, resolver);
        let subscription = self
            .observer
            .observe(element, self.config.observe, callback)?;

        let (replaced, swept) = self
            .registry
            .borrow_mut()
            .insert(element, check.clone(), subscription);
        if !swept.is_empty() {
            debug!(count = swept.len(), "swept checks for reclaimed elements");
        }
        drop(swept);
        match &replaced {
            Some(old) => debug!(
                check = id,
                superseded = old.check.id(),
                "forced new load check"
            ),
            None => debug!(check = id, node = element.key().raw(), "started load check"),
        }
        drop(replaced);

        Ok(LoadState::Pending(check))
    }

    /// The in-flight check for `element`, without creating one.
    pub fn pending(&self, element: &N) -> Option<PendingCheck> {
        let (existing, stale) = self.registry.borrow_mut().get(element);
        drop(stale);
        existing
    }

    /// Number of checks in flight, after dropping those whose element has
    /// been reclaimed.
    pub fn pending_count(&self) -> usize {
        let swept = self.registry.borrow_mut().sweep();
        if !swept.is_empty() {
            debug!(count = swept.len(), "swept checks for reclaimed elements");
        }
        drop(swept);
        self.registry.borrow().len()
    }

    fn resolve_when_loaded(&self, element: &N, id: u64, resolver: Resolver) -> MutationCallback {
        let node = element.downgrade();
        let key = element.key();
        let registry: Weak<RefCell<PendingRegistry<N>>> = Rc::downgrade(&self.registry);

        Box::new(move |summary: &MutationSummary| {
            let Some(element) = node.upgrade() else {
                return;
            };
            trace!(
                check = id,
                added = summary.added,
                removed = summary.removed,
                "child list changed"
            );
            if !is_loaded_sync(&element) {
                return;
            }

            let mut entry = None;
            if let Some(registry) = registry.upgrade() {
                entry = registry.borrow_mut().take(key, id);
            }
            // Disconnects the observation before anyone is woken.
            drop(entry);
            if resolver.resolve() {
                debug!(check = id, "children loaded");
            }
        })
    }
}
