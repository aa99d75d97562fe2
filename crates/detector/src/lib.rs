//! Best-effort detection of whether an element's children have been parsed.
//!
//! [`is_loaded_sync`] (also exported as [`sync`]) answers immediately from
//! the document's ready state and the element's position in the tree.
//! [`LoadDetector::is_loaded`] returns the same answer when it is already
//! known, or a shared [`PendingCheck`] that resolves once a child-list
//! mutation makes the heuristic true.

mod config;
mod detector;
mod heuristic;
mod pending;
mod registry;

pub use config::DetectorConfig;
pub use detector::LoadDetector;
pub use heuristic::is_loaded_sync;
pub use heuristic::is_loaded_sync as sync;
pub use pending::{LoadState, PendingCheck};

pub use children_loaded_core::{
    ChildListObserver, LoadError, MutationCallback, MutationSummary, NodeKey, ObserveOptions,
    ReadyState, Subscription, TreeNode, WeakNode,
};
