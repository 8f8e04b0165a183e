//! Reusable execution context for repeated normalizations.
//!
//! Stands in for the device argument of a tensor framework: the caller owns
//! the buffers the marginals live in, and the normalizer borrows them per
//! call. A training loop that keeps one `Workspace` alive re-allocates the
//! marginals only when the batch shape changes.

use crate::marginals::Marginals;

/// Caller-owned buffer context for [`crate::sinkhorn::Sinkhorn::normalize_in`].
#[derive(Clone, Debug, Default)]
pub struct Workspace {
    marginals: Option<Marginals>,
    allocations: usize,
}

impl Workspace {
    /// Empty workspace; the first call allocates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uniform marginals for a `k × b` matrix, reusing the cached buffers
    /// when the shape matches the previous call.
    pub fn prepare(&mut self, k: usize, b: usize) -> &Marginals {
        if matches!(&self.marginals, Some(m) if !m.is_uniform_for(k, b)) {
            self.marginals = None;
        }
        self.marginals.get_or_insert_with(|| {
            self.allocations += 1;
            tracing::trace!(k, b, "allocating uniform marginals");
            Marginals::uniform(k, b)
        })
    }

    /// `(k, b)` of the cached marginals, if any.
    pub fn capacity(&self) -> Option<(usize, usize)> {
        self.marginals
            .as_ref()
            .map(|m| (m.rows().len(), m.cols().len()))
    }

    /// Number of times marginal buffers were (re)built.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_shape_reuses_buffers() {
        let mut ws = Workspace::new();
        ws.prepare(3, 16);
        ws.prepare(3, 16);
        assert_eq!(ws.allocations(), 1);
        assert_eq!(ws.capacity(), Some((3, 16)));
    }

    #[test]
    fn shape_change_reallocates() {
        let mut ws = Workspace::new();
        ws.prepare(3, 16);
        let m = ws.prepare(3, 8);
        assert_eq!(m.cols().len(), 8);
        assert_eq!(ws.allocations(), 2);
    }

    #[test]
    fn stale_buffers_replaced_with_matching_shape() {
        let mut ws = Workspace::new();
        ws.prepare(4, 2);
        let m = ws.prepare(2, 5);
        assert!(m.is_uniform_for(2, 5));
        assert!(m.rows().iter().all(|&r| r == 0.5));
        assert!(m.cols().iter().all(|&c| c == 0.2));
        ws.prepare(2, 5);
        assert_eq!(ws.allocations(), 2);
        assert_eq!(ws.capacity(), Some((2, 5)));
    }

    #[test]
    fn fresh_workspace_has_no_capacity() {
        assert_eq!(Workspace::new().capacity(), None);
    }
}
