//! Configuration for the move processor and the editor

use serde::{Deserialize, Serialize};

/// How a batch of actions is committed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Apply in order, keep everything up to the first rejection
    #[default]
    Prefix,
    /// Run against a copy and commit only if every action succeeds
    AllOrNothing,
}

/// Move processor configuration
#[derive(Clone, Debug, Default)]
pub struct ProcessorConfig {
    pub batch_policy: BatchPolicy,
}

impl ProcessorConfig {
    pub fn all_or_nothing() -> Self {
        Self {
            batch_policy: BatchPolicy::AllOrNothing,
        }
    }

    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }
}

/// Editor configuration
#[derive(Clone, Debug)]
pub struct EditorConfig {
    /// Snapshots kept for undo/redo, including the current one
    pub max_history: usize,
    /// Largest accepted brush radius
    pub max_brush_size: i32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_history: 50,
            max_brush_size: 5,
        }
    }
}

impl EditorConfig {
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn with_max_brush_size(mut self, max_brush_size: i32) -> Self {
        self.max_brush_size = max_brush_size;
        self
    }
}
