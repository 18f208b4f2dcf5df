// Traversal limits
//
// Automata compiled from `*` and `+` contain cycles, and compositions can
// grow multiplicatively, so every traversal and expansion is bounded by an
// explicit, caller-owned configuration.

use crate::MAX_LOOP_COUNT;

/// Default maximum path length, matching the usual DFS stack size.
pub const DEFAULT_MAX_DEPTH: usize = 2000;

/// Default limit on states produced by materializing a composition.
pub const DEFAULT_MAX_STATES: usize = 1_000_000;

/// Limits for path enumeration and composition materialization.
///
/// `max_depth` bounds the number of labels on one path. `max_steps` bounds
/// the work done by a single `next` call of a path walker; when exceeded,
/// enumeration stops. `max_states` bounds how many composed states
/// `materialize` may create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalConfig {
    pub max_depth: usize,
    pub max_steps: u32,
    pub max_states: usize,
}

impl TraversalConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = max_states;
        self
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_steps: MAX_LOOP_COUNT,
            max_states: DEFAULT_MAX_STATES,
        }
    }
}
