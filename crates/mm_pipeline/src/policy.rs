//! Repair policy for schema-validation failures.

use mm_core::Settings;

/// How many times a task is re-prompted after its response fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_repairs: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_repairs: 1 }
    }
}

impl RetryPolicy {
    pub fn new(max_repairs: u32) -> Self {
        Self { max_repairs }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.max_repair_attempts)
    }

    /// Total LLM calls allowed per task.
    pub fn max_attempts(&self) -> u32 {
        self.max_repairs.saturating_add(1)
    }
}
