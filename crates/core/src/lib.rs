use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle stage of the document a node belongs to.
///
/// Serialized with the same lowercase strings `document.readyState` reports,
/// so a value read from a live page can be parsed straight back in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    /// The parser is still inserting nodes.
    #[default]
    Loading,
    /// Parsing finished; subresources may still be in flight.
    Interactive,
    /// Parsing and subresources are done.
    Complete,
}

impl ReadyState {
    /// Whether the parser has finished with the whole document.
    pub fn is_parsed(self) -> bool {
        matches!(self, ReadyState::Interactive | ReadyState::Complete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReadyState::Loading => "loading",
            ReadyState::Interactive => "interactive",
            ReadyState::Complete => "complete",
        }
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadyState {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loading" => Ok(ReadyState::Loading),
            "interactive" => Ok(ReadyState::Interactive),
            "complete" => Ok(ReadyState::Complete),
            other => Err(LoadError::InvalidArgument(format!(
                "unknown ready state: {}",
                other
            ))),
        }
    }
}

/// Errors surfaced while setting up a load check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    /// The caller passed something the host cannot work with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The host refused to attach an observer.
    #[error("failed to observe node: {0}")]
    Observe(String),
}

/// Identity of a node, stable for as long as the node is alive.
///
/// Two handles to the same node compare equal; equal-looking but distinct
/// nodes do not. A key may be reused once its node has been dropped, so
/// anything caching by key must confirm liveness through a [`WeakNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(usize);

impl NodeKey {
    pub fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Key derived from the address of a shared allocation.
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    pub fn raw(self) -> usize {
        self.0
    }
}

/// Read-only navigation over a node tree.
pub trait TreeNode: Clone + 'static {
    type Weak: WeakNode<Node = Self>;

    fn next_sibling(&self) -> Option<Self>;

    fn parent(&self) -> Option<Self>;

    /// Ready state of the document that owns this node.
    fn ready_state(&self) -> ReadyState;

    /// Non-owning handle that does not keep the node alive.
    fn downgrade(&self) -> Self::Weak;

    fn key(&self) -> NodeKey;
}

pub trait WeakNode: Clone + 'static {
    type Node;

    fn upgrade(&self) -> Option<Self::Node>;
}

/// Which mutations an observation should be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserveOptions {
    /// Report children added to or removed from the target.
    pub child_list: bool,
    /// Extend reporting to every descendant of the target.
    pub subtree: bool,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            child_list: true,
            subtree: false,
        }
    }
}

impl ObserveOptions {
    pub fn child_list() -> Self {
        Self::default()
    }

    pub fn with_subtree(mut self) -> Self {
        self.subtree = true;
        self
    }
}

/// What changed since the previous notification to one observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationSummary {
    pub records: usize,
    pub added: usize,
    pub removed: usize,
}

pub type MutationCallback = Box<dyn FnMut(&MutationSummary)>;

/// Live registration of a callback with a [`ChildListObserver`].
///
/// Implementations disconnect on drop; `disconnect` is idempotent.
pub trait Subscription {
    fn disconnect(&mut self);

    fn is_connected(&self) -> bool;
}

/// Host capability that reports child-list changes of a node.
///
/// The callback runs after the mutation, never from inside the call that
/// mutated the tree, and keeps running until the returned subscription is
/// disconnected or dropped.
pub trait ChildListObserver<N: TreeNode> {
    fn observe(
        &self,
        target: &N,
        options: ObserveOptions,
        callback: MutationCallback,
    ) -> Result<Box<dyn Subscription>, LoadError>;
}
