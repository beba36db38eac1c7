use crate::model::{BackendId, RevertFailure};

/// Failures from every backend group, in group processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureReport {
    failures: Vec<RevertFailure>,
    per_backend: Vec<(BackendId, usize)>,
}

impl FailureReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one group's failures. No deduplication, no sorting.
    pub fn absorb(&mut self, backend: &BackendId, failures: Vec<RevertFailure>) {
        self.per_backend.push((backend.clone(), failures.len()));
        self.failures.extend(failures);
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failures(&self) -> &[RevertFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<RevertFailure> {
        self.failures
    }

    pub fn count_for(&self, backend: &BackendId) -> usize {
        self.per_backend
            .iter()
            .filter(|(id, _)| id == backend)
            .map(|(_, count)| count)
            .sum()
    }

    /// Backends absorbed so far, in order.
    pub fn backends(&self) -> impl Iterator<Item = &BackendId> {
        self.per_backend.iter().map(|(id, _)| id)
    }
}
