use children_loaded_core::ReadyState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The insertion would produce a tree the DOM does not allow.
    #[error("hierarchy request: {0}")]
    HierarchyRequest(String),
    #[error("node not found: {0}")]
    NotFound(String),
    #[error("ready state cannot move from {from} back to {to}")]
    ReadyStateRegression { from: ReadyState, to: ReadyState },
    #[error("invalid observe options: {0}")]
    InvalidObserveOptions(String),
}
