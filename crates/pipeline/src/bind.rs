//! Pipeline topology bookkeeping.
//!
//! Module graphs must form a DAG by prepare time; a bind that would
//! close a cycle is rejected on the spot, so prepare can always walk
//! instances in dependency order.

use heapless::Vec;

use stream::CoreError;

/// Directed producer-to-consumer edges between module instances,
/// keyed by instance id.
#[derive(Debug, Default)]
pub struct Topology<const N: usize> {
    edges: Vec<(u32, u32), N>,
}

impl<const N: usize> Topology<N> {
    /// Empty topology.
    #[must_use]
    pub const fn new() -> Self {
        Topology { edges: Vec::new() }
    }

    /// Record a producer-to-consumer edge.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArg`] when the edge is a self-loop, already
    /// exists, or would close a cycle; [`CoreError::OutOfMemory`] when
    /// the edge table is full.
    pub fn bind(&mut self, producer: u32, consumer: u32) -> Result<(), CoreError> {
        if producer == consumer || self.edges.iter().any(|&e| e == (producer, consumer)) {
            return Err(CoreError::InvalidArg);
        }
        // A path consumer -> producer means this edge closes a cycle.
        if self.reaches(consumer, producer) {
            return Err(CoreError::InvalidArg);
        }
        self.edges
            .push((producer, consumer))
            .map_err(|_| CoreError::OutOfMemory)
    }

    /// Remove an edge. Unknown edges are ignored.
    pub fn unbind(&mut self, producer: u32, consumer: u32) {
        if let Some(idx) = self.edges.iter().position(|&e| e == (producer, consumer)) {
            let _ = self.edges.swap_remove(idx);
        }
    }

    /// `true` when `to` is reachable from `from` along recorded edges.
    ///
    /// Answers `true` on traversal-table overflow as well; for the
    /// bind check that errs on the side of rejecting the edge.
    #[must_use]
    pub fn reaches(&self, from: u32, to: u32) -> bool {
        if from == to {
            return true;
        }
        let mut stack: Vec<u32, N> = Vec::new();
        let mut visited: Vec<u32, N> = Vec::new();
        if stack.push(from).is_err() {
            return true;
        }

        while let Some(node) = stack.pop() {
            if visited.iter().any(|&v| v == node) {
                continue;
            }
            if visited.push(node).is_err() {
                return true;
            }
            for &(p, c) in &self.edges {
                if p != node {
                    continue;
                }
                if c == to {
                    return true;
                }
                if !visited.iter().any(|&v| v == c) && stack.push(c).is_err() {
                    return true;
                }
            }
        }
        false
    }

    /// Number of recorded edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// `true` when no edges are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}
