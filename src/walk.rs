//! Graph walks (§4.7, §4.11, component L): the shared traversal primitives
//! every analysis and pass is built on, so dominance, loop analysis, the
//! writer/dumper, and the rewriter all share one visited-counter discipline
//! instead of re-deriving their own.
//!
//! Grounded in `original_source/include/libfirm/firm_types.h`'s
//! "Visited Counters" discipline (`ir_visited_t`, the `irg_walk_func`
//! callback typedef) and `original_source/include/libfirm/irnode.h`'s
//! `get_irn_visited`/`mark_irn_visited`/`irn_visited_else_mark` accessors,
//! restructured the way cranelift-codegen factors its own dominator tree
//! and loop analysis atop a single reverse-postorder primitive
//! (`dominator_tree.rs`'s `compute_postorder`).

use crate::entity::NodeId;
use crate::ir::graph::Graph;
use crate::op::builtin;

/// Post-order over data/control inputs (ties broken by input index),
/// starting from `roots`. Every input is visited before the node itself.
pub fn walk_topo(graph: &mut Graph, roots: &[NodeId]) -> Vec<NodeId> {
    graph.bump_visited();
    let mut order = Vec::new();
    for &root in roots {
        walk_topo_one(graph, root, &mut order);
    }
    order
}

fn walk_topo_one(graph: &mut Graph, node: NodeId, order: &mut Vec<NodeId>) {
    if graph.is_visited(node) {
        return;
    }
    graph.mark_visited(node);
    let inputs = graph.node(node).inputs().to_vec();
    let deps = graph.node(node).deps().to_vec();
    for input in inputs {
        walk_topo_one(graph, input, order);
    }
    for dep in deps {
        walk_topo_one(graph, dep, order);
    }
    order.push(node);
}

/// A topological walk seeded from `graph`'s `End` anchor (the common case:
/// "every node that matters to the final result").
pub fn walk_topo_from_end(graph: &mut Graph) -> Vec<NodeId> {
    let end = graph.anchors().end.expect("graph has no End anchor");
    walk_topo(graph, &[end])
}

/// A topological walk seeded from all nine anchors (§4.7: guarantees
/// Start/End/NoMem/etc. are visited even if rewriting disconnected them
/// from End).
pub fn walk_anchors(graph: &mut Graph) -> Vec<NodeId> {
    let roots: Vec<NodeId> = graph.anchors().all().into_iter().flatten().collect();
    walk_topo(graph, &roots)
}

/// Block-wise order (§4.7): reverse-post-order over the control-flow
/// subgraph (Blocks linked by their predecessor inputs), then, within each
/// block, the topological order of its non-Block nodes.
pub fn walk_blocks(graph: &mut Graph) -> Vec<NodeId> {
    let end_block = graph
        .anchors()
        .end_block
        .expect("graph has no End-block anchor");
    let rpo = reverse_postorder_blocks(graph, end_block);

    let mut order = Vec::new();
    graph.bump_visited();
    for block in rpo {
        order.push(block);
        let users = graph.users(block);
        let mut body: Vec<NodeId> = users
            .into_iter()
            .filter(|&u| graph.node(u).block() == Some(block) && graph.node(u).op() != builtin::block())
            .collect();
        body.sort_by_key(|n| n.index());
        for node in body {
            walk_topo_one(graph, node, &mut order);
        }
    }
    order
}

/// Reverse post-order over Blocks only, walking each Block's control-flow
/// predecessor inputs (a Block's own `inputs()` *are* its cf predecessors —
/// §3 invariant 1's exception for the Block op itself).
fn reverse_postorder_blocks(graph: &mut Graph, end_block: NodeId) -> Vec<NodeId> {
    let mut postorder = Vec::new();
    graph.bump_visited();
    postorder_blocks_one(graph, end_block, &mut postorder);
    postorder.reverse();
    postorder
}

fn postorder_blocks_one(graph: &mut Graph, block: NodeId, out: &mut Vec<NodeId>) {
    if graph.is_visited(block) {
        return;
    }
    graph.mark_visited(block);
    let preds = graph.node(block).inputs().to_vec();
    for pred in preds {
        if graph.node(pred).op() == builtin::block() {
            postorder_blocks_one(graph, pred, out);
        }
    }
    out.push(block);
}

/// Outs-order (§4.7): mirrors the topological order with edges reversed,
/// i.e. a post-order over the reverse-edge index. Requires reverse edges
/// to be active (§4.4).
pub fn walk_outs(graph: &mut Graph, roots: &[NodeId]) -> Vec<NodeId> {
    assert!(
        graph.reverse_edges().is_some(),
        "walk_outs requires reverse edges to be active"
    );
    graph.bump_visited();
    let mut order = Vec::new();
    for &root in roots {
        walk_outs_one(graph, root, &mut order);
    }
    order
}

fn walk_outs_one(graph: &mut Graph, node: NodeId, order: &mut Vec<NodeId>) {
    if graph.is_visited(node) {
        return;
    }
    graph.mark_visited(node);
    let mut users = graph.users(node);
    users.sort_by_key(|n| n.index());
    for user in users {
        walk_outs_one(graph, user, order);
    }
    order.push(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::Attrs;
    use crate::mode;
    use crate::op::builtin;

    #[test]
    fn topo_visits_inputs_before_node() {
        let mut g = Graph::new("p", "f");
        let bb = g.anchors().start_block.unwrap();
        let m = mode::s32_mode();
        let a = g.new_node(builtin::r#const(), m, vec![bb], Attrs::None);
        let b = g.new_node(builtin::r#const(), m, vec![bb], Attrs::None);
        let add = g.new_node(builtin::add(), m, vec![bb, a, b], Attrs::None);

        let order = walk_topo(&mut g, &[add]);
        let pos = |n: NodeId| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(a) < pos(add));
        assert!(pos(b) < pos(add));
        assert!(pos(bb) < pos(add));
    }

    #[test]
    fn topo_visits_each_node_once() {
        let mut g = Graph::new("p", "f");
        let bb = g.anchors().start_block.unwrap();
        let m = mode::s32_mode();
        let a = g.new_node(builtin::r#const(), m, vec![bb], Attrs::None);
        let add1 = g.new_node(builtin::add(), m, vec![bb, a, a], Attrs::None);
        let add2 = g.new_node(builtin::add(), m, vec![bb, add1, a], Attrs::None);

        let order = walk_topo(&mut g, &[add2]);
        let count_a = order.iter().filter(|&&n| n == a).count();
        assert_eq!(count_a, 1);
    }

    #[test]
    fn anchors_walk_reaches_no_mem_even_if_orphaned() {
        let mut g = Graph::new("p", "f");
        let order = walk_anchors(&mut g);
        let no_mem = g.anchors().no_mem.unwrap();
        assert!(order.contains(&no_mem));
    }

    #[test]
    fn outs_walk_requires_active_reverse_edges() {
        let mut g = Graph::new("p", "f");
        g.activate_reverse_edges();
        let bb = g.anchors().start_block.unwrap();
        let m = mode::s32_mode();
        let a = g.new_node(builtin::r#const(), m, vec![bb], Attrs::None);
        let add = g.new_node(builtin::add(), m, vec![bb, a, a], Attrs::None);

        let order = walk_outs(&mut g, &[a]);
        let pos = |n: NodeId| order.iter().position(|&x| x == n).unwrap();
        assert!(pos(add) < pos(a));
    }
}
