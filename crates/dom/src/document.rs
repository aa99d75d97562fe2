use crate::error::DomError;
use crate::node::{DomCallback, MutationRecord, Node, NodeData};
use children_loaded_core::ReadyState;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::trace;

pub(crate) struct QueuedRecord {
    pub(crate) registration: u64,
    pub(crate) callback: Weak<RefCell<DomCallback>>,
    pub(crate) record: MutationRecord,
}

/// State every node of a document can reach without holding the tree.
pub(crate) struct DocumentShared {
    pub(crate) ready_state: Cell<ReadyState>,
    pub(crate) queue: RefCell<Vec<QueuedRecord>>,
    next_registration: Cell<u64>,
}

impl DocumentShared {
    pub(crate) fn next_registration_id(&self) -> u64 {
        let id = self.next_registration.get();
        self.next_registration.set(id + 1);
        id
    }
}

/// Handle to a document. Clones share the same tree.
#[derive(Clone)]
pub struct Document {
    root: Node,
    shared: Rc<DocumentShared>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document in the `loading` state.
    pub fn new() -> Self {
        let shared = Rc::new(DocumentShared {
            ready_state: Cell::new(ReadyState::Loading),
            queue: RefCell::new(Vec::new()),
            next_registration: Cell::new(1),
        });
        let root = Node::new(Rc::clone(&shared), NodeData::Document);
        Self { root, shared }
    }

    /// The document node itself.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// First element child of the document node, usually `<html>`.
    pub fn document_element(&self) -> Option<Node> {
        self.root.children().into_iter().find(Node::is_element)
    }

    pub fn ready_state(&self) -> ReadyState {
        self.shared.ready_state.get()
    }

    /// Moves the document forward through its lifecycle. Going backwards is
    /// an error; setting the current state again is a no-op.
    pub fn set_ready_state(&self, state: ReadyState) -> Result<(), DomError> {
        let current = self.shared.ready_state.get();
        if state < current {
            return Err(DomError::ReadyStateRegression {
                from: current,
                to: state,
            });
        }
        if state != current {
            trace!(from = %current, to = %state, "ready state changed");
            self.shared.ready_state.set(state);
        }
        Ok(())
    }

    pub fn create_element(&self, name: &str) -> Node {
        self.create_element_with_attrs(name, Vec::new())
    }

    pub fn create_element_with_attrs(&self, name: &str, attrs: Vec<(String, String)>) -> Node {
        self.create_node(NodeData::Element {
            name: name.to_string(),
            attrs,
        })
    }

    pub fn create_text(&self, text: &str) -> Node {
        self.create_node(NodeData::Text(text.to_string()))
    }

    pub fn create_comment(&self, text: &str) -> Node {
        self.create_node(NodeData::Comment(text.to_string()))
    }

    pub(crate) fn create_node(&self, data: NodeData) -> Node {
        Node::new(Rc::clone(&self.shared), data)
    }

    /// Whether `node` was created by this document.
    pub fn owns(&self, node: &Node) -> bool {
        Rc::ptr_eq(&self.shared, node.shared())
    }

    /// First element in tree order whose `id` attribute equals `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<Node> {
        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            if node.id() == Some(id) {
                return Some(node);
            }
            stack.extend(node.children().into_iter().rev());
        }
        None
    }

    /// Number of records waiting for [`Document::deliver_mutations`].
    pub fn pending_mutations(&self) -> usize {
        self.shared.queue.borrow().len()
    }

    /// Hands queued records to their observers, one batch per registration,
    /// until no callback produces new records. Returns the number of callback
    /// invocations.
    ///
    /// Records queued for a registration that has since been disconnected
    /// are dropped.
    pub fn deliver_mutations(&self) -> usize {
        let mut delivered = 0;
        let mut busy = Vec::new();

        loop {
            let queued = std::mem::take(&mut *self.shared.queue.borrow_mut());
            if queued.is_empty() {
                break;
            }

            let mut batches: Vec<(u64, Weak<RefCell<DomCallback>>, Vec<QueuedRecord>)> =
                Vec::new();
            for item in queued {
                match batches.iter_mut().find(|(id, _, _)| *id == item.registration) {
                    Some((_, _, items)) => items.push(item),
                    None => batches.push((item.registration, item.callback.clone(), vec![item])),
                }
            }

            for (registration, callback, items) in batches {
                let Some(callback) = callback.upgrade() else {
                    trace!(registration, "dropping records for disconnected observer");
                    continue;
                };
                // A callback that delivers mutations itself must not re-enter.
                let Ok(mut callback) = callback.try_borrow_mut() else {
                    busy.extend(items);
                    continue;
                };
                let records: Vec<MutationRecord> =
                    items.into_iter().map(|item| item.record).collect();
                trace!(registration, records = records.len(), "delivering mutations");
                (&mut *callback)(&records);
                delivered += 1;
            }
        }

        self.shared.queue.borrow_mut().extend(busy);
        delivered
    }
}
