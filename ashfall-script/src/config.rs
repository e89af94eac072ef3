use serde::{Deserialize, Serialize};

/// Per-instance execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmConfig {
    /// Data-stack depth ceiling.
    pub max_stack_depth: usize,
    /// Call-frame depth ceiling (catches runaway recursion).
    pub max_call_depth: usize,
    /// Instructions one engine-level call may execute, counted across all
    /// nested frames. An infinite script loop otherwise blocks the whole
    /// update tick.
    pub step_budget: u64,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 256,
            max_call_depth: 64,
            step_budget: 1_000_000,
        }
    }
}
