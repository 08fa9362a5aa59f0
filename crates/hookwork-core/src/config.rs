/// Engine tuning knobs.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Upper bound on back-to-back re-renders `Host::settle` performs before
    /// reporting a render loop.
    pub max_settle_passes: usize,
    /// Slots reserved up front for each newly mounted instance.
    pub slot_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_settle_passes: 64,
            slot_capacity: 8,
        }
    }
}

impl EngineConfig {
    pub fn max_settle_passes(mut self, passes: usize) -> Self {
        self.max_settle_passes = passes.max(1);
        self
    }

    pub fn slot_capacity(mut self, capacity: usize) -> Self {
        self.slot_capacity = capacity;
        self
    }
}
