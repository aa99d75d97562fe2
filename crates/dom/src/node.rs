use crate::document::{DocumentShared, QueuedRecord};
use crate::error::DomError;
use children_loaded_core::{NodeKey, ObserveOptions, ReadyState, TreeNode, WeakNode};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

pub(crate) type DomCallback = Box<dyn FnMut(&[MutationRecord])>;

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Document,
    Element {
        name: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
    Comment(String),
}

impl NodeData {
    fn kind(&self) -> &'static str {
        match self {
            NodeData::Document => "document",
            NodeData::Element { .. } => "element",
            NodeData::Text(_) => "text",
            NodeData::Comment(_) => "comment",
        }
    }

    fn accepts_children(&self) -> bool {
        matches!(self, NodeData::Document | NodeData::Element { .. })
    }
}

/// One child-list change, as handed to observer callbacks.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    /// The node whose children changed.
    pub target: Node,
    pub added: Vec<Node>,
    pub removed: Vec<Node>,
}

pub(crate) struct Registration {
    id: u64,
    options: ObserveOptions,
    callback: Rc<RefCell<DomCallback>>,
}

pub(crate) struct NodeInner {
    data: NodeData,
    parent: RefCell<Weak<NodeInner>>,
    // Position in the parent's child list. Meaningless while detached.
    index: Cell<usize>,
    children: RefCell<Vec<Node>>,
    registrations: RefCell<Vec<Registration>>,
    shared: Rc<DocumentShared>,
}

/// Shared handle to a node. Cloning the handle does not clone the node.
#[derive(Clone)]
pub struct Node(Rc<NodeInner>);

/// Handle that does not keep its node alive.
#[derive(Clone)]
pub struct WeakNodeRef(Weak<NodeInner>);

impl Node {
    pub(crate) fn new(shared: Rc<DocumentShared>, data: NodeData) -> Self {
        Node(Rc::new(NodeInner {
            data,
            parent: RefCell::new(Weak::new()),
            index: Cell::new(0),
            children: RefCell::new(Vec::new()),
            registrations: RefCell::new(Vec::new()),
            shared,
        }))
    }

    pub(crate) fn shared(&self) -> &Rc<DocumentShared> {
        &self.0.shared
    }

    pub fn data(&self) -> &NodeData {
        &self.0.data
    }

    pub fn is_element(&self) -> bool {
        matches!(self.0.data, NodeData::Element { .. })
    }

    pub fn tag_name(&self) -> Option<&str> {
        match &self.0.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match &self.0.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    /// Contents of a text or comment node.
    pub fn text(&self) -> Option<&str> {
        match &self.0.data {
            NodeData::Text(text) | NodeData::Comment(text) => Some(text),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn parent_node(&self) -> Option<Node> {
        self.0.parent.borrow().upgrade().map(Node)
    }

    pub fn children(&self) -> Vec<Node> {
        self.0.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.0.children.borrow().len()
    }

    pub fn first_child(&self) -> Option<Node> {
        self.0.children.borrow().first().cloned()
    }

    pub fn last_child(&self) -> Option<Node> {
        self.0.children.borrow().last().cloned()
    }

    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent_node()?;
        let children = parent.0.children.borrow();
        children.get(self.0.index.get() + 1).cloned()
    }

    pub fn previous_sibling(&self) -> Option<Node> {
        let parent = self.parent_node()?;
        let children = parent.0.children.borrow();
        let index = self.0.index.get().checked_sub(1)?;
        children.get(index).cloned()
    }

    /// Whether `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if node.ptr_eq(self) {
                return true;
            }
            current = node.parent_node();
        }
        false
    }

    pub fn append_child(&self, child: &Node) -> Result<(), DomError> {
        self.insert_before(child, None)
    }

    /// Inserts `child` before `reference`, or at the end when `reference` is
    /// `None`. A child that already has a parent is moved.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<(), DomError> {
        self.ensure_insertable(child)?;

        let mut reference = reference.cloned();
        if let Some(node) = &reference {
            if !self.is_parent_of(node) {
                return Err(DomError::NotFound(format!(
                    "reference {:?} is not a child of {:?}",
                    node, self
                )));
            }
            if node.ptr_eq(child) {
                reference = child.next_sibling();
            }
        }

        if let Some(old_parent) = child.parent_node() {
            old_parent.detach(child);
            old_parent.queue_record(Vec::new(), vec![child.clone()]);
        }

        {
            let mut children = self.0.children.borrow_mut();
            let index = match &reference {
                Some(node) => node.0.index.get(),
                None => children.len(),
            };
            children.insert(index, child.clone());
            renumber(&children, index);
        }
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);

        self.queue_record(vec![child.clone()], Vec::new());
        Ok(())
    }

    pub fn remove_child(&self, child: &Node) -> Result<Node, DomError> {
        if !self.is_parent_of(child) {
            return Err(DomError::NotFound(format!(
                "{:?} is not a child of {:?}",
                child, self
            )));
        }
        self.detach(child);
        self.queue_record(Vec::new(), vec![child.clone()]);
        Ok(child.clone())
    }

    /// Registers `callback` for child-list records on this node, and on its
    /// descendants when `options.subtree` is set.
    pub fn observe<F>(&self, options: ObserveOptions, callback: F) -> Result<Observation, DomError>
    where
        F: FnMut(&[MutationRecord]) + 'static,
    {
        if !options.child_list {
            return Err(DomError::InvalidObserveOptions(
                "child_list must be requested".to_string(),
            ));
        }

        let id = self.0.shared.next_registration_id();
        self.0.registrations.borrow_mut().push(Registration {
            id,
            options,
            callback: Rc::new(RefCell::new(Box::new(callback))),
        });

        Ok(Observation {
            target: Rc::downgrade(&self.0),
            id,
            connected: true,
        })
    }

    /// Number of live observations registered directly on this node.
    pub fn observer_count(&self) -> usize {
        self.0.registrations.borrow().len()
    }

    fn ensure_insertable(&self, child: &Node) -> Result<(), DomError> {
        if !self.0.data.accepts_children() {
            return Err(DomError::HierarchyRequest(format!(
                "{} nodes cannot have children",
                self.0.data.kind()
            )));
        }
        if matches!(child.0.data, NodeData::Document) {
            return Err(DomError::HierarchyRequest(
                "a document node cannot be inserted".to_string(),
            ));
        }
        if !Rc::ptr_eq(&self.0.shared, &child.0.shared) {
            return Err(DomError::HierarchyRequest(
                "node belongs to another document".to_string(),
            ));
        }
        if child.contains(self) {
            return Err(DomError::HierarchyRequest(
                "a node cannot be inserted into itself or its descendants".to_string(),
            ));
        }
        Ok(())
    }

    fn is_parent_of(&self, node: &Node) -> bool {
        node.parent_node().is_some_and(|parent| parent.ptr_eq(self))
    }

    fn detach(&self, child: &Node) {
        {
            let mut children = self.0.children.borrow_mut();
            let index = child.0.index.get();
            if children.get(index).is_some_and(|c| c.ptr_eq(child)) {
                children.remove(index);
                renumber(&children, index);
            }
        }
        *child.0.parent.borrow_mut() = Weak::new();
    }

    fn unregister(&self, id: u64) -> bool {
        let removed = {
            let mut registrations = self.0.registrations.borrow_mut();
            let index = registrations.iter().position(|r| r.id == id);
            index.map(|index| registrations.remove(index))
        };
        removed.is_some()
    }

    fn queue_record(&self, added: Vec<Node>, removed: Vec<Node>) {
        let mut interested = Vec::new();
        for registration in self.0.registrations.borrow().iter() {
            if registration.options.child_list {
                interested.push((registration.id, Rc::downgrade(&registration.callback)));
            }
        }
        let mut ancestor = self.parent_node();
        while let Some(node) = ancestor {
            for registration in node.0.registrations.borrow().iter() {
                if registration.options.child_list && registration.options.subtree {
                    interested.push((registration.id, Rc::downgrade(&registration.callback)));
                }
            }
            ancestor = node.parent_node();
        }
        if interested.is_empty() {
            return;
        }

        let record = MutationRecord {
            target: self.clone(),
            added,
            removed,
        };
        let mut queue = self.0.shared.queue.borrow_mut();
        for (registration, callback) in interested {
            queue.push(QueuedRecord {
                registration,
                callback,
                record: record.clone(),
            });
        }
    }
}

/// Refreshes the stored positions of `children[from..]`.
fn renumber(children: &[Node], from: usize) {
    for (index, child) in children.iter().enumerate().skip(from) {
        child.0.index.set(index);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.data {
            NodeData::Element { name, .. } => match self.id() {
                Some(id) => write!(f, "<{}#{}>", name, id),
                None => write!(f, "<{}>", name),
            },
            NodeData::Text(text) => write!(f, "#text({:?})", text),
            NodeData::Comment(_) => f.write_str("#comment"),
            NodeData::Document => f.write_str("#document"),
        }
    }
}

impl TreeNode for Node {
    type Weak = WeakNodeRef;

    fn next_sibling(&self) -> Option<Self> {
        Node::next_sibling(self)
    }

    fn parent(&self) -> Option<Self> {
        self.parent_node()
    }

    fn ready_state(&self) -> ReadyState {
        self.0.shared.ready_state.get()
    }

    fn downgrade(&self) -> WeakNodeRef {
        WeakNodeRef(Rc::downgrade(&self.0))
    }

    fn key(&self) -> NodeKey {
        NodeKey::from_ptr(Rc::as_ptr(&self.0))
    }
}

impl WeakNode for WeakNodeRef {
    type Node = Node;

    fn upgrade(&self) -> Option<Node> {
        self.0.upgrade().map(Node)
    }
}

/// Registration returned by [`Node::observe`]. Dropping it disconnects.
pub struct Observation {
    target: Weak<NodeInner>,
    id: u64,
    connected: bool,
}

impl Observation {
    /// Stops further callbacks, including ones for records already queued.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        if let Some(inner) = self.target.upgrade() {
            Node(inner).unregister(self.id);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected && self.target.strong_count() > 0
    }
}

impl Drop for Observation {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use crate::{Document, DomError};
    use children_loaded_core::ObserveOptions;

    #[test]
    fn siblings_follow_insertion_order() {
        let doc = Document::new();
        let body = doc.create_element("body");
        let a = doc.create_element("div");
        let b = doc.create_element("span");
        doc.root().append_child(&body).unwrap();
        body.append_child(&b).unwrap();
        body.insert_before(&a, Some(&b)).unwrap();

        assert!(a.next_sibling().unwrap().ptr_eq(&b));
        assert!(b.previous_sibling().unwrap().ptr_eq(&a));
        assert!(b.next_sibling().is_none());
        assert!(a.parent_node().unwrap().ptr_eq(&body));
    }

    #[test]
    fn siblings_stay_ordered_across_edits() {
        let doc = Document::new();
        let list = doc.create_element("ul");
        let items: Vec<_> = (0..5).map(|_| doc.create_element("li")).collect();
        for item in &items {
            list.append_child(item).unwrap();
        }

        list.remove_child(&items[1]).unwrap();
        list.insert_before(&items[4], Some(&items[0])).unwrap();
        list.insert_before(&items[2], Some(&items[2])).unwrap();

        // 4, 0, 2, 3
        let order = [&items[4], &items[0], &items[2], &items[3]];
        for pair in order.windows(2) {
            assert!(pair[0].next_sibling().unwrap().ptr_eq(pair[1]));
            assert!(pair[1].previous_sibling().unwrap().ptr_eq(pair[0]));
        }
        assert!(items[4].previous_sibling().is_none());
        assert!(items[3].next_sibling().is_none());
        assert!(items[1].next_sibling().is_none());
        assert!(items[1].previous_sibling().is_none());
    }

    #[test]
    fn walks_a_wide_child_list() {
        let doc = Document::new();
        let list = doc.create_element("ul");
        for _ in 0..10_000 {
            list.append_child(&doc.create_element("li")).unwrap();
        }

        let mut steps = 0;
        let mut current = list.first_child();
        while let Some(node) = current {
            steps += 1;
            current = node.next_sibling();
        }

        assert_eq!(steps, 10_000);
        let last = list.last_child().unwrap();
        assert!(list.children()[9_998].next_sibling().unwrap().ptr_eq(&last));
    }

    #[test]
    fn moving_a_node_detaches_it_from_its_old_parent() {
        let doc = Document::new();
        let first = doc.create_element("div");
        let second = doc.create_element("div");
        let child = doc.create_element("p");
        doc.root().append_child(&first).unwrap();
        doc.root().append_child(&second).unwrap();
        first.append_child(&child).unwrap();

        second.append_child(&child).unwrap();

        assert_eq!(first.child_count(), 0);
        assert!(child.parent_node().unwrap().ptr_eq(&second));
    }

    #[test]
    fn rejects_cycles_and_leaf_parents() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        let text = doc.create_text("hello");
        outer.append_child(&inner).unwrap();

        assert!(matches!(
            inner.append_child(&outer),
            Err(DomError::HierarchyRequest(_))
        ));
        assert!(matches!(
            outer.append_child(&outer),
            Err(DomError::HierarchyRequest(_))
        ));
        assert!(matches!(
            text.append_child(&inner),
            Err(DomError::HierarchyRequest(_))
        ));
    }

    #[test]
    fn rejects_nodes_from_another_document() {
        let doc = Document::new();
        let other = Document::new();
        let foreign = other.create_element("div");

        assert!(matches!(
            doc.root().append_child(&foreign),
            Err(DomError::HierarchyRequest(_))
        ));
    }

    #[test]
    fn remove_child_requires_a_child() {
        let doc = Document::new();
        let parent = doc.create_element("ul");
        let stranger = doc.create_element("li");

        assert!(matches!(
            parent.remove_child(&stranger),
            Err(DomError::NotFound(_))
        ));
        assert!(matches!(
            parent.insert_before(&doc.create_element("li"), Some(&stranger)),
            Err(DomError::NotFound(_))
        ));
    }

    #[test]
    fn observe_requires_child_list() {
        let doc = Document::new();
        let options = ObserveOptions {
            child_list: false,
            subtree: true,
        };

        let result = doc.root().observe(options, |_| {});

        assert!(matches!(result, Err(DomError::InvalidObserveOptions(_))));
        assert_eq!(doc.root().observer_count(), 0);
    }

    #[test]
    fn dropping_an_observation_unregisters_it() {
        let doc = Document::new();
        let observation = doc.root().observe(ObserveOptions::default(), |_| {}).unwrap();
        assert_eq!(doc.root().observer_count(), 1);
        assert!(observation.is_connected());

        drop(observation);

        assert_eq!(doc.root().observer_count(), 0);
    }
}
