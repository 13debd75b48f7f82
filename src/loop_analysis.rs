//! Loop analysis (§4.6, component G): a loop-nesting tree over Blocks,
//! with back-edges marked on the CFG.
//!
//! Grounded in `original_source/include/libfirm/irloop.h`'s API shape
//! (`get_loop_father`, `get_loop_n_elements`, `is_backedge`) and built, like
//! `dominator_tree.rs`, on Tarjan's algorithm — here for strongly-connected
//! components rather than dominance, recursively peeling each loop's
//! header to discover nested loops, the construction
//! `original_source/ir/ana/irloop.c` also performs (`construct_cf_backedges`
//! recursing into each SCC it finds).

use crate::entity::{LoopId, NodeId};
use crate::ir::graph::Graph;
use crate::op::builtin;
use std::collections::{HashMap, HashSet};

struct LoopNode {
    parent: Option<LoopId>,
    children: Vec<LoopId>,
    /// Blocks directly contained in this loop (not further nested in a
    /// child loop).
    blocks: Vec<NodeId>,
    depth: u32,
}

/// The loop-nesting forest over a graph's Blocks, plus which CFG edges are
/// back-edges.
pub struct LoopInfo {
    loops: Vec<LoopNode>,
    roots: Vec<LoopId>,
    block_loop: HashMap<NodeId, LoopId>,
    /// `(header, pred)` pairs where the `pred -> header` edge is a
    /// back-edge.
    back_edges: HashSet<(NodeId, NodeId)>,
}

impl LoopInfo {
    fn new() -> Self {
        LoopInfo {
            loops: Vec::new(),
            roots: Vec::new(),
            block_loop: HashMap::new(),
            back_edges: HashSet::new(),
        }
    }

    fn new_loop(&mut self, parent: Option<LoopId>, depth: u32) -> LoopId {
        let id = LoopId::from_index(self.loops.len() as u32);
        self.loops.push(LoopNode {
            parent,
            children: Vec::new(),
            blocks: Vec::new(),
            depth,
        });
        id
    }

    fn add_block(&mut self, loop_id: LoopId, block: NodeId) {
        self.loops[loop_id.index()].blocks.push(block);
        self.block_loop.insert(block, loop_id);
    }

    fn set_children(&mut self, loop_id: LoopId, children: Vec<LoopId>) {
        self.loops[loop_id.index()].children = children;
    }

    /// The loop tree's top-level loops (direct children of the
    /// whole-graph pseudo-root).
    pub fn roots(&self) -> &[LoopId] {
        &self.roots
    }

    /// `loop_id`'s parent loop, if any.
    pub fn parent(&self, loop_id: LoopId) -> Option<LoopId> {
        self.loops[loop_id.index()].parent
    }

    /// `loop_id`'s directly nested child loops.
    pub fn children(&self, loop_id: LoopId) -> &[LoopId] {
        &self.loops[loop_id.index()].children
    }

    /// Blocks directly in `loop_id` (excluding blocks absorbed into a
    /// nested child loop).
    pub fn blocks(&self, loop_id: LoopId) -> &[NodeId] {
        &self.loops[loop_id.index()].blocks
    }

    /// `loop_id`'s nesting depth (outermost loop is depth 1).
    pub fn depth(&self, loop_id: LoopId) -> u32 {
        self.loops[loop_id.index()].depth
    }

    /// The maximum nesting depth of the whole tree (0 if no loops).
    pub fn max_depth(&self) -> u32 {
        self.loops.iter().map(|l| l.depth).max().unwrap_or(0)
    }

    /// The innermost loop `block` belongs to, if any.
    pub fn loop_of(&self, block: NodeId) -> Option<LoopId> {
        self.block_loop.get(&block).copied()
    }

    /// Is the `pred -> header` CFG edge a back-edge?
    pub fn is_backedge(&self, header: NodeId, pred: NodeId) -> bool {
        self.back_edges.contains(&(header, pred))
    }

    /// Does `loop_id` (or any of its nested children) contain `block`?
    fn contains_block(&self, loop_id: LoopId, block: NodeId) -> bool {
        if self.loops[loop_id.index()].blocks.contains(&block) {
            return true;
        }
        self.loops[loop_id.index()]
            .children
            .iter()
            .any(|&c| self.contains_block(c, block))
    }

    /// `is_loop_invariant(n, block)` (§4.6): true iff `n`'s defining block
    /// does not lie inside `block`'s innermost loop — i.e. `n` was not
    /// (re)defined on any iteration of that loop.
    pub fn is_loop_invariant(&self, graph: &Graph, n: NodeId, block: NodeId) -> bool {
        let def_block = if graph.node(n).op() == builtin::block() {
            n
        } else {
            graph.node(n).block().unwrap_or(n)
        };
        match self.loop_of(block) {
            None => true,
            Some(loop_id) => !self.contains_block(loop_id, def_block),
        }
    }
}

fn successors(graph: &Graph, block: NodeId) -> Vec<NodeId> {
    graph
        .users(block)
        .into_iter()
        .filter(|&u| graph.node(u).op() == builtin::block())
        .collect()
}

fn predecessors(graph: &Graph, block: NodeId) -> Vec<NodeId> {
    graph
        .node(block)
        .inputs()
        .iter()
        .copied()
        .filter(|&p| graph.node(p).op() == builtin::block())
        .collect()
}

/// Tarjan's SCC algorithm, restricted to the induced subgraph over `scope`.
fn strongly_connected_components(graph: &Graph, scope: &HashSet<NodeId>) -> Vec<Vec<NodeId>> {
    struct Tarjan<'a> {
        graph: &'a Graph,
        scope: &'a HashSet<NodeId>,
        index: HashMap<NodeId, u32>,
        lowlink: HashMap<NodeId, u32>,
        on_stack: HashSet<NodeId>,
        stack: Vec<NodeId>,
        counter: u32,
        sccs: Vec<Vec<NodeId>>,
    }

    impl<'a> Tarjan<'a> {
        fn strongconnect(&mut self, v: NodeId) {
            self.index.insert(v, self.counter);
            self.lowlink.insert(v, self.counter);
            self.counter += 1;
            self.stack.push(v);
            self.on_stack.insert(v);

            for w in successors(self.graph, v) {
                if !self.scope.contains(&w) {
                    continue;
                }
                if !self.index.contains_key(&w) {
                    self.strongconnect(w);
                    let wl = self.lowlink[&w];
                    let vl = self.lowlink[&v];
                    self.lowlink.insert(v, vl.min(wl));
                } else if self.on_stack.contains(&w) {
                    let wi = self.index[&w];
                    let vl = self.lowlink[&v];
                    self.lowlink.insert(v, vl.min(wi));
                }
            }

            if self.lowlink[&v] == self.index[&v] {
                let mut component = Vec::new();
                loop {
                    let w = self.stack.pop().unwrap();
                    self.on_stack.remove(&w);
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                self.sccs.push(component);
            }
        }
    }

    let mut t = Tarjan {
        graph,
        scope,
        index: HashMap::new(),
        lowlink: HashMap::new(),
        on_stack: HashSet::new(),
        stack: Vec::new(),
        counter: 0,
        sccs: Vec::new(),
    };
    for &v in scope {
        if !t.index.contains_key(&v) {
            t.strongconnect(v);
        }
    }
    t.sccs
}

/// The block within `scc` reached by an edge originating outside `scope`
/// (the loop's natural entry), falling back to the lowest-indexed block if
/// no such single entry exists (irreducible/multi-entry regions — an
/// explicit simplification; the loop tree is still sound, just not
/// guaranteed minimal in that case).
fn choose_header(graph: &Graph, scc: &HashSet<NodeId>, scope: &HashSet<NodeId>) -> NodeId {
    let mut best: Option<NodeId> = None;
    for &b in scc {
        let entered_from_outside = predecessors(graph, b)
            .into_iter()
            .any(|p| scope.contains(&p) && !scc.contains(&p));
        if entered_from_outside {
            best = Some(match best {
                None => b,
                Some(cur) if b.index() < cur.index() => b,
                Some(cur) => cur,
            });
        }
    }
    best.unwrap_or_else(|| *scc.iter().min_by_key(|n| n.index()).unwrap())
}

fn analyze_region(
    graph: &Graph,
    scope: HashSet<NodeId>,
    depth: u32,
    parent: Option<LoopId>,
    info: &mut LoopInfo,
) -> Vec<LoopId> {
    let mut result = Vec::new();
    for scc in strongly_connected_components(graph, &scope) {
        let scc_set: HashSet<NodeId> = scc.iter().copied().collect();
        let is_self_loop = scc.len() == 1 && {
            let b = scc[0];
            successors(graph, b).contains(&b)
        };
        if scc.len() == 1 && !is_self_loop {
            continue;
        }

        let header = choose_header(graph, &scc_set, &scope);
        for pred in predecessors(graph, header) {
            if scc_set.contains(&pred) {
                info.back_edges.insert((header, pred));
            }
        }

        let loop_id = info.new_loop(parent, depth + 1);
        let inner_scope: HashSet<NodeId> = scc_set.iter().copied().filter(|&b| b != header).collect();
        let nested = analyze_region(graph, inner_scope, depth + 1, Some(loop_id), info);

        let mut absorbed: HashSet<NodeId> = HashSet::new();
        for &child in &nested {
            absorbed.extend(info.blocks(child).iter().copied());
        }
        for &b in &scc_set {
            if !absorbed.contains(&b) {
                info.add_block(loop_id, b);
            }
        }
        info.set_children(loop_id, nested);
        result.push(loop_id);
    }
    result
}

/// Runs loop analysis over every Block reachable from `graph`'s `Start`
/// anchor.
pub fn compute_loop_info(graph: &mut Graph) -> LoopInfo {
    let start_block = graph.anchors().start_block.expect("graph has no Start block");
    let order = crate::walk::walk_topo_from_end(graph);
    let scope: HashSet<NodeId> = order
        .into_iter()
        .filter(|&n| graph.node(n).op() == builtin::block())
        .collect();
    let mut scope = scope;
    scope.insert(start_block);

    let mut info = LoopInfo::new();
    info.roots = analyze_region(graph, scope, 0, None, &mut info);
    graph.set_properties(crate::ir::graph::Properties::CONSISTENT_LOOPINFO);
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::Attrs;
    use crate::mode;

    /// S4 — Loop detection: Start -> H; H -> {Body, Exit}; Body -> H.
    #[test]
    fn s4_single_loop() {
        let mut g = Graph::new("p", "f");
        let start_block = g.anchors().start_block.unwrap();
        let end_block = g.anchors().end_block.unwrap();

        let h = g.new_node(builtin::block(), mode::block(), vec![start_block], Attrs::None);
        let body = g.new_node(builtin::block(), mode::block(), vec![h], Attrs::None);
        // H's predecessors are Start and Body (the back-edge).
        g.set_input(h, 0, start_block);
        g.add_input(h, body);
        let exit = g.new_node(builtin::block(), mode::block(), vec![h], Attrs::None);
        g.add_input(end_block, exit);

        let info = compute_loop_info(&mut g);

        assert!(info.is_backedge(h, body));
        assert_eq!(info.roots().len(), 1);
        let root = info.roots()[0];
        assert_eq!(info.depth(root), 1);
        let mut members = info.blocks(root).to_vec();
        members.sort_by_key(|n| n.index());
        let mut expected = vec![h, body];
        expected.sort_by_key(|n| n.index());
        assert_eq!(members, expected);
        assert_eq!(info.children(root).len(), 0);
    }

    #[test]
    fn acyclic_graph_has_no_loops() {
        let mut g = Graph::new("p", "f");
        let info = compute_loop_info(&mut g);
        assert!(info.roots().is_empty());
    }
}
