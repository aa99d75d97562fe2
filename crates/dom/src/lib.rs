//! Reference-counted node tree that implements the traits of
//! `children_loaded_core`.
//!
//! Mutations never call observers directly. Records are queued on the owning
//! [`Document`] and handed out by [`Document::deliver_mutations`], the same way
//! a browser defers mutation observer callbacks to a microtask checkpoint.

mod document;
mod error;
mod node;
mod observer;
mod replay;

pub use document::Document;
pub use error::DomError;
pub use node::{MutationRecord, Node, NodeData, Observation, WeakNodeRef};
pub use observer::DomObserver;
pub use replay::ParseReplay;
