//! The rewriting engine (§4.8, component H): `exchange`, `kill`, scoped
//! peephole registration, and CSE.
//!
//! Grounded in `original_source/ir/be/ia32/ia32_optimize.c`'s peephole pass
//! structure (a pass walking the graph and rewriting matched node shapes in
//! place, e.g. `peephole_Load`/`peephole_IncSP`), generalized from its
//! per-backend matchers into this crate's scoped, client-registrable
//! peephole-function table; and in cranelift-codegen's own
//! simple-GVN-over-DataFlowGraph shape (a hashmap keyed by an instruction's
//! structural identity), adapted to this crate's arena/`NodeId` ownership
//! model.

use crate::entity::NodeId;
use crate::ir::graph::{Graph, Properties};
use crate::ir::node::Attrs;
use crate::mode::Mode;
use crate::op::{self, OpCode};
use log::{debug, trace};
use std::collections::HashMap;

/// Rewrites every live use of `old` (input, dep, or reverse-edge entry) to
/// `new`, leaving `old` allocated but unreferenced (§4.8, rule 1).
///
/// Clears the consistency properties that any CFG/data-edge mutation must
/// invalidate; callers that know a narrower invalidation suffices may
/// `set_properties` back what they can prove still holds.
pub fn exchange(graph: &mut Graph, old: NodeId, new: NodeId) {
    if old == new {
        return;
    }
    trace!("exchange {} -> {}", old, new);
    let users = graph.users(old);
    for user in users {
        let changed = graph.node_mut(user).replace_input_value(old, new);
        debug_assert!(changed, "users() reported {} but no input matched", user);
    }
    if let Some(idx) = graph.reverse_edges_mut() {
        idx.rename(old, new);
    }
    graph.clear_properties(
        Properties::CONSISTENT_DOMINANCE
            | Properties::CONSISTENT_POST_DOMINANCE
            | Properties::CONSISTENT_LOOPINFO
            | Properties::CONSISTENT_OUT_EDGES,
    );
}

/// Orphans and frees the index of a node that is already unused (§4.8, rule
/// 2). This crate's arena never reclaims the slot (§5, "Arena discipline");
/// `kill` only asserts the precondition and clears any scratch state a
/// dangling reference might observe.
pub fn kill(graph: &mut Graph, node: NodeId) {
    debug_assert!(
        graph.users(node).is_empty(),
        "kill() called on node {} which still has uses",
        node
    );
    trace!("kill {}", node);
}

/// A CSE key: everything that determines whether two nodes are the "same"
/// value (§4.8, rule 4).
#[derive(Clone, PartialEq, Eq, Hash)]
struct CseKey {
    op: OpCode,
    mode: Mode,
    inputs: Vec<NodeId>,
    attr_tag: AttrTag,
}

/// A hashable/comparable projection of `Attrs`, since `Attrs::Extra` carries
/// an opaque `dyn Any` that can't derive `Eq`/`Hash` itself.
#[derive(Clone, PartialEq, Eq, Hash)]
enum AttrTag {
    None,
    Const(i128),
    ConstFloat(u64),
    Proj(u32),
    Extra(usize),
}

fn attr_tag(attrs: &Attrs) -> AttrTag {
    match attrs {
        Attrs::None => AttrTag::None,
        Attrs::Const(tv) => match tv.as_i128() {
            Some(i) => AttrTag::Const(i),
            None => AttrTag::ConstFloat(tv.as_f64().unwrap_or(0.0).to_bits()),
        },
        Attrs::Proj(idx) => AttrTag::Proj(*idx),
        Attrs::Extra(arc) => AttrTag::Extra(std::sync::Arc::as_ptr(arc) as *const () as usize),
    }
}

/// A per-graph common-subexpression table (§4.8, rule 4).
#[derive(Default)]
pub struct CseTable {
    table: HashMap<CseKey, NodeId>,
}

impl CseTable {
    pub fn new() -> Self {
        CseTable::default()
    }

    /// Builds (or reuses) a node for `(op, mode, inputs, attrs)`: if a
    /// structurally identical node already exists in this table, its id is
    /// returned and no new node is allocated (P8). `constlike`/`cse-neutral`
    /// ops bypass the table entirely, each call allocating fresh.
    pub fn make_node(
        &mut self,
        graph: &mut Graph,
        code: OpCode,
        mode: Mode,
        inputs: Vec<NodeId>,
        attrs: Attrs,
    ) -> NodeId {
        let cse_eligible = op::with_op(code, |descr| {
            !descr
                .flags()
                .intersects(op::OpFlags::CONSTLIKE | op::OpFlags::CSE_NEUTRAL)
        });
        if !cse_eligible {
            return graph.new_node(code, mode, inputs, attrs);
        }
        let key = CseKey {
            op: code,
            mode,
            inputs: inputs.clone(),
            attr_tag: attr_tag(&attrs),
        };
        if let Some(&existing) = self.table.get(&key) {
            debug!("cse hit for {:?}", key.op);
            return existing;
        }
        let id = graph.new_node(code, mode, inputs, attrs);
        self.table.insert(key, id);
        id
    }

    /// Drops `node` from the table, if present under any key — used after
    /// `exchange` merges it away, so a later structurally-distinct node
    /// sharing the same slot (never happens in practice, but kept for
    /// defensiveness) doesn't collide.
    pub fn forget(&mut self, node: NodeId) {
        self.table.retain(|_, v| *v != node);
    }
}

/// Re-exported for callers that don't want to depend on `crate::op`
/// directly just to name a handler's type.
pub use crate::op::PeepholeFn;

/// Scoped peephole registration (§4.8, rule 3): installs `handler` into
/// `code`'s generic slot, runs `body`, then restores whatever was there
/// before — an acquire/release pair, not a permanent registration.
pub fn with_peephole<R>(code: OpCode, handler: PeepholeFn, body: impl FnOnce() -> R) -> R {
    let previous = op::with_op(code, |descr| descr.set_generic(Some(handler)));
    let result = body();
    op::with_op(code, |descr| descr.set_generic(previous));
    result
}

/// Drives one peephole pass over every node reachable from `graph`'s `End`
/// anchor, in topological order, applying whichever handler is currently
/// installed in each visited node's op slot.
pub fn run_peephole_pass(graph: &mut Graph) {
    let order = crate::walk::walk_topo_from_end(graph);
    for node in order {
        let code = graph.node(node).op();
        let handler = op::with_op(code, |descr| descr.generic());
        if let Some(handler) = handler {
            if let Some(replacement) = handler(graph, node) {
                exchange(graph, node, replacement);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::NodeId;
    use crate::ir::graph::Graph;
    use crate::mode;
    use crate::op::builtin;
    use crate::tarval::TargetValue;

    #[test]
    fn s5_exchange_invariant() {
        let mut g = Graph::new("p", "f");
        let bb = g.anchors().start_block.unwrap();
        let m = mode::s32_mode();
        let tv = TargetValue::from_i128(m, 5);
        let a = g.new_node(builtin::r#const(), m, vec![bb], Attrs::Const(tv));
        let b = g.new_node(builtin::r#const(), m, vec![bb], Attrs::Const(tv));
        let s = g.new_node(builtin::add(), m, vec![bb, a, b], Attrs::None);

        exchange(&mut g, b, a);

        assert_eq!(g.node(s).inputs(), &[bb, a, a]);
        assert!(g.users(b).is_empty());
    }

    #[test]
    fn cse_merges_structurally_identical_nodes() {
        let mut g = Graph::new("p", "f");
        let bb = g.anchors().start_block.unwrap();
        let m = mode::s32_mode();
        let mut cse = CseTable::new();
        let a = cse.make_node(&mut g, builtin::add(), m, vec![bb, bb, bb], Attrs::None);
        let b = cse.make_node(&mut g, builtin::add(), m, vec![bb, bb, bb], Attrs::None);
        assert_eq!(a, b);
    }

    #[test]
    fn cse_keeps_constlike_ops_distinct() {
        let mut g = Graph::new("p", "f");
        let bb = g.anchors().start_block.unwrap();
        let m = mode::s32_mode();
        let tv = TargetValue::from_i128(m, 1);
        let mut cse = CseTable::new();
        let a = cse.make_node(&mut g, builtin::r#const(), m, vec![bb], Attrs::Const(tv));
        let b = cse.make_node(&mut g, builtin::r#const(), m, vec![bb], Attrs::Const(tv));
        assert_ne!(a, b);
    }

    #[test]
    fn kill_asserts_no_remaining_uses() {
        let mut g = Graph::new("p", "f");
        let bb = g.anchors().start_block.unwrap();
        let m = mode::s32_mode();
        let n = g.new_node(builtin::r#const(), m, vec![bb], Attrs::None);
        // no users were ever created; safe to kill.
        kill(&mut g, n);
    }

    fn compare_zero_to_test(graph: &mut Graph, node: NodeId) -> Option<NodeId> {
        let n = graph.node(node);
        if n.op() != builtin::cmp() {
            return None;
        }
        let inputs = n.inputs().to_vec();
        let (block, x, rhs) = (inputs[0], inputs[1], inputs[2]);
        let is_zero = graph
            .node(rhs)
            .attrs()
            .as_const()
            .and_then(|tv| tv.as_i128())
            == Some(0);
        if !is_zero {
            return None;
        }
        let mode = n.mode();
        Some(graph.new_node(builtin::test(), mode, vec![block, x, x], Attrs::None))
    }

    #[test]
    fn s6_peephole_compare_zero_to_test() {
        let mut g = Graph::new("p", "f");
        let bb = g.anchors().start_block.unwrap();
        let m = mode::s32_mode();
        let x = g.new_node(builtin::r#const(), m, vec![bb], Attrs::Const(TargetValue::from_i128(m, 7)));
        let zero = g.new_node(builtin::r#const(), m, vec![bb], Attrs::Const(TargetValue::from_i128(m, 0)));
        let c = g.new_node(builtin::cmp(), m, vec![bb, x, zero], Attrs::None);
        let br = g.new_node(builtin::cond(), mode::tuple(), vec![bb, c], Attrs::None);

        with_peephole(builtin::cmp(), compare_zero_to_test, || {
            if let Some(replacement) = compare_zero_to_test(&mut g, c) {
                exchange(&mut g, c, replacement);
            }
        });

        assert_eq!(g.node(br).input(1).map(|id| g.node(id).op()), Some(builtin::test()));
        assert!(g.users(c).is_empty());
    }
}
