//! Reverse-edge (use-list) index (§4.4, component F): an optional, per-graph
//! structure mapping each node to the (using-node, input-position) pairs
//! that reference it. Grounded in `original_source/ir/ir/irnodemap.h`'s
//! dense, node-index-keyed array (`ir_nodemap_init`/`ir_nodemap_get`/
//! `ir_nodemap_set`, preferred "if the info is dense... for most nodes in
//! the graph"), expressed as a plain owned table rather than the original's
//! embedded doubly-linked out-edge list (Rust's ownership model makes an
//! intrusive list on arena-indexed nodes needlessly awkward; a side
//! `HashMap` is the idiomatic equivalent used by `cranelift-entity`'s
//! secondary-map style container).

use crate::entity::NodeId;
use std::collections::HashMap;

/// A single use: the node doing the referencing, and which input position.
pub type Use = (NodeId, u32);

/// The use-list index. Activated/deactivated wholesale on a [`Graph`](crate::ir::graph::Graph).
#[derive(Default)]
pub struct ReverseEdges {
    uses: HashMap<NodeId, Vec<Use>>,
    dep_uses: HashMap<NodeId, Vec<NodeId>>,
}

impl ReverseEdges {
    pub fn new() -> Self {
        ReverseEdges::default()
    }

    /// Records that `user` references `target` at input position `pos`.
    pub fn add(&mut self, target: NodeId, user: NodeId, pos: u32) {
        self.uses.entry(target).or_default().push((user, pos));
    }

    /// Removes a previously recorded `(user, pos)` use of `target` (called
    /// when an input is overwritten via `set_input`).
    pub fn remove(&mut self, target: NodeId, user: NodeId, pos: u32) {
        if let Some(list) = self.uses.get_mut(&target) {
            if let Some(i) = list.iter().position(|&u| u == (user, pos)) {
                list.swap_remove(i);
            }
        }
    }

    /// Records an artificial-dependency use.
    pub fn add_dep(&mut self, target: NodeId, user: NodeId) {
        self.dep_uses.entry(target).or_default().push(user);
    }

    /// All (using-node, input-position) pairs that currently reference
    /// `target` as a data/control input.
    pub fn uses_of(&self, target: NodeId) -> impl Iterator<Item = Use> + '_ {
        self.uses.get(&target).into_iter().flatten().copied()
    }

    /// All nodes that depend on `target` via an artificial dependency edge.
    pub fn dep_uses_of(&self, target: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.dep_uses.get(&target).into_iter().flatten().copied()
    }

    /// Does anything at all still reference `target` (data, control, or
    /// artificial-dependency)?
    pub fn has_any_use(&self, target: NodeId) -> bool {
        self.uses.get(&target).map_or(false, |v| !v.is_empty())
            || self.dep_uses.get(&target).map_or(false, |v| !v.is_empty())
    }

    /// Repoints every recorded use of `old` to `new` — the bookkeeping half
    /// of `exchange` (§4.8); callers still must rewrite the using nodes'
    /// actual input slots.
    pub(crate) fn rename(&mut self, old: NodeId, new: NodeId) {
        if let Some(list) = self.uses.remove(&old) {
            self.uses.entry(new).or_default().extend(list);
        }
        if let Some(list) = self.dep_uses.remove(&old) {
            self.dep_uses.entry(new).or_default().extend(list);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_query() {
        let mut idx = ReverseEdges::new();
        let v = NodeId::from_index(1);
        let u1 = NodeId::from_index(2);
        let u2 = NodeId::from_index(3);
        idx.add(v, u1, 0);
        idx.add(v, u2, 1);
        let mut uses: Vec<_> = idx.uses_of(v).collect();
        uses.sort_by_key(|&(n, _)| n.index());
        assert_eq!(uses, vec![(u1, 0), (u2, 1)]);
    }

    #[test]
    fn remove_drops_single_use() {
        let mut idx = ReverseEdges::new();
        let v = NodeId::from_index(1);
        let u = NodeId::from_index(2);
        idx.add(v, u, 0);
        idx.remove(v, u, 0);
        assert!(!idx.has_any_use(v));
    }

    #[test]
    fn rename_moves_uses() {
        let mut idx = ReverseEdges::new();
        let old = NodeId::from_index(1);
        let new = NodeId::from_index(2);
        let u = NodeId::from_index(3);
        idx.add(old, u, 0);
        idx.rename(old, new);
        assert!(!idx.has_any_use(old));
        assert_eq!(idx.uses_of(new).collect::<Vec<_>>(), vec![(u, 0)]);
    }
}
