use crate::pending::PendingCheck;
use children_loaded_core::{NodeKey, Subscription, TreeNode, WeakNode};
use std::collections::HashMap;

/// Registry size at which `insert` first sweeps reclaimed elements.
pub(crate) const SWEEP_THRESHOLD: usize = 64;

pub(crate) struct Entry<N: TreeNode> {
    node: N::Weak,
    pub(crate) check: PendingCheck,
    // Dropped together with the entry, which disconnects it.
    _subscription: Box<dyn Subscription>,
}

/// Pending checks keyed by element identity.
///
/// Entries only hold weak handles, so the registry never keeps an element
/// alive. Entries whose element is gone are swept on lookup, by `sweep`, and
/// by `insert` whenever the registry has grown past its sweep mark.
/// Removed entries are returned to the caller so their subscriptions are
/// dropped outside any borrow of the registry.
pub(crate) struct PendingRegistry<N: TreeNode> {
    entries: HashMap<NodeKey, Entry<N>>,
    sweep_at: usize,
}

impl<N: TreeNode> PendingRegistry<N> {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            sweep_at: SWEEP_THRESHOLD,
        }
    }

    /// Live check for `node`, if any, plus an entry to drop if the key was
    /// held by a reclaimed element.
    pub(crate) fn get(&mut self, node: &N) -> (Option<PendingCheck>, Option<Entry<N>>) {
        let key = node.key();
        let live = match self.entries.get(&key) {
            None => return (None, None),
            Some(entry) => entry
                .node
                .upgrade()
                .is_some_and(|current| current.key() == key),
        };
        if live {
            (self.entries.get(&key).map(|entry| entry.check.clone()), None)
        } else {
            (None, self.entries.remove(&key))
        }
    }

    /// Registers `check` for `node`. Returns the entry it replaces and any
    /// entries swept for reclaimed elements.
    ///
    /// The sweep mark doubles with the number of live entries, so sweeping
    /// stays amortized constant per insert.
    pub(crate) fn insert(
        &mut self,
        node: &N,
        check: PendingCheck,
        subscription: Box<dyn Subscription>,
    ) -> (Option<Entry<N>>, Vec<Entry<N>>) {
        let swept = if self.entries.len() >= self.sweep_at {
            let swept = self.sweep();
            self.sweep_at = (self.entries.len() * 2).max(SWEEP_THRESHOLD);
            swept
        } else {
            Vec::new()
        };
        let replaced = self.entries.insert(
            node.key(),
            Entry {
                node: node.downgrade(),
                check,
                _subscription: subscription,
            },
        );
        (replaced, swept)
    }

    /// Removes the entry for `key` if it still belongs to check `id`.
    pub(crate) fn take(&mut self, key: NodeKey, id: u64) -> Option<Entry<N>> {
        match self.entries.get(&key) {
            Some(entry) if entry.check.id() == id => self.entries.remove(&key),
            _ => None,
        }
    }

    /// Removes entries whose element has been reclaimed.
    pub(crate) fn sweep(&mut self) -> Vec<Entry<N>> {
        let dead: Vec<NodeKey> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.node.upgrade().is_none())
            .map(|(key, _)| *key)
            .collect();
        dead.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
