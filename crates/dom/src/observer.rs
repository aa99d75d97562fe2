use crate::error::DomError;
use crate::node::{MutationRecord, Node, Observation};
use children_loaded_core::{
    ChildListObserver, LoadError, MutationCallback, MutationSummary, ObserveOptions, Subscription,
};

/// Exposes [`Node::observe`] through the host-neutral observer trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomObserver;

impl ChildListObserver<Node> for DomObserver {
    fn observe(
        &self,
        target: &Node,
        options: ObserveOptions,
        mut callback: MutationCallback,
    ) -> Result<Box<dyn Subscription>, LoadError> {
        let observation = target
            .observe(options, move |records: &[MutationRecord]| {
                callback(&summarize(records));
            })
            .map_err(|e| match e {
                DomError::InvalidObserveOptions(message) => LoadError::InvalidArgument(message),
                other => LoadError::Observe(other.to_string()),
            })?;
        Ok(Box::new(observation))
    }
}

impl Subscription for Observation {
    fn disconnect(&mut self) {
        Observation::disconnect(self)
    }

    fn is_connected(&self) -> bool {
        Observation::is_connected(self)
    }
}

fn summarize(records: &[MutationRecord]) -> MutationSummary {
    records.iter().fold(
        MutationSummary {
            records: records.len(),
            ..MutationSummary::default()
        },
        |mut summary, record| {
            summary.added += record.added.len();
            summary.removed += record.removed.len();
            summary
        },
    )
}
