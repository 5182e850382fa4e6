//! Nested progress reporting.
//!
//! An import announces how many steps a phase has with
//! [`ProgressSink::enter_substeps`], reports each finished step with
//! [`ProgressSink::step`] and closes the phase with
//! [`ProgressSink::leave_substeps`]. Phases nest.

use tracing::info;

pub trait ProgressSink {
    /// Opens a phase of `count` steps.
    fn enter_substeps(&mut self, count: usize, label: &str);

    /// Marks one step of the innermost phase finished.
    fn step(&mut self, message: Option<&str>);

    /// Closes the innermost phase.
    fn leave_substeps(&mut self);
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn enter_substeps(&mut self, _count: usize, _label: &str) {}

    fn step(&mut self, _message: Option<&str>) {}

    fn leave_substeps(&mut self) {}
}

#[derive(Debug, Clone)]
struct Phase {
    label: String,
    done: usize,
    total: usize,
}

/// Logs progress through `tracing` at INFO level.
#[derive(Debug, Default)]
pub struct TracingProgress {
    phases: Vec<Phase>,
}

impl TracingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nesting depth of the currently open phases.
    pub fn depth(&self) -> usize {
        self.phases.len()
    }

    /// `(done, total)` of the innermost phase.
    pub fn current(&self) -> Option<(usize, usize)> {
        self.phases.last().map(|phase| (phase.done, phase.total))
    }

    fn path(&self) -> String {
        self.phases
            .iter()
            .map(|phase| phase.label.as_str())
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

impl ProgressSink for TracingProgress {
    fn enter_substeps(&mut self, count: usize, label: &str) {
        self.phases.push(Phase {
            label: label.to_string(),
            done: 0,
            total: count,
        });
        info!(phase = %self.path(), steps = count, "begin");
    }

    fn step(&mut self, message: Option<&str>) {
        let path = self.path();
        let Some(phase) = self.phases.last_mut() else {
            return;
        };
        phase.done += 1;
        let (done, total) = (phase.done, phase.total);
        match message {
            Some(message) => info!(phase = %path, "[{}/{}] {}", done, total, message),
            None => info!(phase = %path, "[{}/{}]", done, total),
        }
    }

    fn leave_substeps(&mut self) {
        let path = self.path();
        if let Some(phase) = self.phases.pop() {
            info!(phase = %path, steps = phase.done, "end");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_phases() {
        let mut progress = TracingProgress::new();
        progress.enter_substeps(2, "import");
        progress.step(Some("parsed"));
        progress.enter_substeps(3, "meshes");
        assert_eq!(progress.depth(), 2);
        progress.step(None);
        progress.step(None);
        assert_eq!(progress.current(), Some((2, 3)));
        progress.leave_substeps();
        assert_eq!(progress.current(), Some((1, 2)));
        progress.leave_substeps();
        assert_eq!(progress.depth(), 0);
    }

    #[test]
    fn test_unbalanced_calls_are_ignored() {
        let mut progress = TracingProgress::new();
        progress.step(Some("nothing open"));
        progress.leave_substeps();
        assert_eq!(progress.current(), None);
    }
}
