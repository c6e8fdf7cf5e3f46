//! Numbered progress lines for batch jobs

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::info;

/// Progress reporter handed by the entry point to the job's run function.
///
/// `step` lines are numbered automatically, `substep` lines carry an
/// explicit index and are indented under the current step.
#[derive(Debug, Default)]
pub struct Progress {
    steps: AtomicU32,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self, msg: impl Display) {
        let n = self.steps.fetch_add(1, Ordering::Relaxed) + 1;
        info!("{}) {}", n, msg);
    }

    pub fn substep(&self, n: u32, msg: impl Display) {
        info!("\t> {}) {}", n, msg);
    }

    /// Unnumbered line under the current step.
    pub fn detail(&self, msg: impl Display) {
        info!("   {}", msg);
    }

    pub fn steps_logged(&self) -> u32 {
        self.steps.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_are_numbered_in_order() {
        let progress = Progress::new();
        progress.step("Connecting");
        progress.substep(1, "ignored by the counter");
        progress.step("Loading");
        assert_eq!(progress.steps_logged(), 2);
    }
}
