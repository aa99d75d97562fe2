use children_loaded_core::ObserveOptions;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Options passed to the observer for every new pending check.
    pub observe: ObserveOptions,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            observe: ObserveOptions::child_list(),
        }
    }
}

impl DetectorConfig {
    /// Re-checks on mutations anywhere below the element instead of only on
    /// its direct children.
    pub fn deep() -> Self {
        Self::default().with_subtree()
    }

    pub fn with_subtree(mut self) -> Self {
        self.observe = self.observe.with_subtree();
        self
    }

    pub fn with_observe(mut self, observe: ObserveOptions) -> Self {
        self.observe = observe;
        self
    }
}
