use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{BooleanError, Result};

/// Shared flag that stops a running Boolean operation at the next phase
/// boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Every clone of the token observes it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Parameters of a Boolean operation.
#[derive(Debug, Clone)]
pub struct BooleanOptions {
    /// Extra distance added to every coincidence test.
    pub fuzzy: f64,
    /// Largest tolerance a merged entity may reach before a
    /// [`Warning::ToleranceConflict`](super::Warning::ToleranceConflict)
    /// is reported.
    pub tolerance_bound: f64,
    /// Iteration cap for each root search.
    pub max_iterations: usize,
    /// Run pairwise intersection and face building on the rayon pool.
    pub parallel: bool,
    /// Merge adjacent coplanar faces of the result.
    pub merge_coplanar: bool,
    pub cancel: Option<CancelToken>,
}

impl Default for BooleanOptions {
    fn default() -> Self {
        Self {
            fuzzy: 0.0,
            tolerance_bound: 1e-3,
            max_iterations: 64,
            parallel: true,
            merge_coplanar: false,
            cancel: None,
        }
    }
}

impl BooleanOptions {
    #[must_use]
    pub fn with_fuzzy(mut self, fuzzy: f64) -> Self {
        self.fuzzy = fuzzy.max(0.0);
        self
    }

    #[must_use]
    pub fn with_tolerance_bound(mut self, bound: f64) -> Self {
        self.tolerance_bound = bound;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    #[must_use]
    pub fn with_merge_coplanar(mut self, merge: bool) -> Self {
        self.merge_coplanar = merge;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Fails with [`BooleanError::Cancelled`] once the token is set.
    pub(crate) fn check_cancel(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(BooleanError::Cancelled.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_seen_by_clones() {
        let token = CancelToken::new();
        let options = BooleanOptions::default().with_cancel(token.clone());
        assert!(options.check_cancel().is_ok());
        token.cancel();
        assert!(options.check_cancel().is_err());
    }

    #[test]
    fn builder_clamps_values() {
        let options = BooleanOptions::default()
            .with_fuzzy(-1.0)
            .with_max_iterations(0)
            .with_merge_coplanar(true);
        assert!(options.fuzzy.abs() < f64::EPSILON);
        assert_eq!(options.max_iterations, 1);
        assert!(options.merge_coplanar);
    }
}
