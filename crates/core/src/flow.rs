//! Dense flow identifiers.
//!
//! Every distinct 5-tuple gets the next integer in order of first
//! appearance, starting at 0. The index only grows; one index is shared by
//! all archives of a run so IDs stay consistent across file boundaries.

use crate::packet::FiveTuple;
use std::collections::HashMap;

/// Insertion-ordered map from 5-tuple to dense flow ID.
#[derive(Debug, Default, Clone)]
pub struct FlowIndex {
    /// Canonical tuple key -> flow ID
    ids: HashMap<[u8; 13], u64>,

    /// Tuples in ID order
    flows: Vec<FiveTuple>,
}

impl FlowIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the ID of `tuple`, assigning the next one if it is new.
    pub fn lookup_or_insert(&mut self, tuple: &FiveTuple) -> u64 {
        let next = self.flows.len() as u64;
        let id = *self.ids.entry(tuple.canonical_key()).or_insert(next);
        if id == next {
            self.flows.push(*tuple);
            tracing::trace!(id, flow = %tuple, "new flow");
        }
        id
    }

    /// ID of a previously seen tuple.
    pub fn get(&self, tuple: &FiveTuple) -> Option<u64> {
        self.ids.get(&tuple.canonical_key()).copied()
    }

    /// Tuple that was assigned `id`.
    pub fn flow(&self, id: u64) -> Option<&FiveTuple> {
        self.flows.get(id as usize)
    }

    /// Number of distinct flows seen.
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Flows in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &FiveTuple)> {
        self.flows.iter().enumerate().map(|(id, t)| (id as u64, t))
    }
}
