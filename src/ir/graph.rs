//! The per-procedure graph container (§3, component C): owns the node
//! arena, the anchors, and the bookkeeping consulted by every other
//! component (dominance, loops, rewriting, dumping).

use crate::entity::NodeId;
use crate::config::FloatModel;
use crate::ir::node::{Attrs, DebugInfo, Node, PinState};
use crate::ir::reverse_edges::ReverseEdges;
use crate::mode::{self, Mode};
use crate::op::{self, builtin, Arity, OpCode};

/// Which phase of construction/lowering a graph is currently in.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ConstructionState {
    /// Still under SSA construction (§4.3); not yet safe to optimise.
    Building,
    /// Fully built, high-level (pre-lowering) form.
    High,
    /// Lowered to low-level (machine-independent) form.
    Low,
    /// Lowered further to backend-specific form.
    Backend,
}

bitflags::bitflags! {
    /// Analysis-consistency flags (§4.9). Set by the analysis that
    /// establishes the property; cleared by any rewrite that could
    /// invalidate it.
    #[derive(Default)]
    pub struct Properties: u32 {
        const CONSISTENT_DOMINANCE = 1 << 0;
        const CONSISTENT_POST_DOMINANCE = 1 << 1;
        const CONSISTENT_OUT_EDGES = 1 << 2;
        const CONSISTENT_LOOPINFO = 1 << 3;
        const CONSISTENT_ENTITY_USAGE = 1 << 4;
        const NO_BADS = 1 << 5;
        const NO_UNREACHABLE_CODE = 1 << 6;
        const NO_CRITICAL_EDGES = 1 << 7;
        const ONE_RETURN = 1 << 8;
    }
}

bitflags::bitflags! {
    /// Structural constraints a graph may be required to satisfy (§4.9).
    #[derive(Default)]
    pub struct Constraints: u32 {
        const ARCH_DEP = 1 << 0;
        const MODEB_LOWERED = 1 << 1;
        const NORMALISATION2 = 1 << 2;
        const OPTIMIZE_UNREACHABLE_CODE = 1 << 3;
    }
}

/// The fixed set of nine distinguished nodes every graph anchors itself on
/// (§3), guaranteeing Start/End/NoMem etc. are reachable even after
/// rewriting disconnects everything else.
#[derive(Copy, Clone, Debug, Default)]
pub struct Anchors {
    pub start_block: Option<NodeId>,
    pub start: Option<NodeId>,
    pub end_block: Option<NodeId>,
    pub end: Option<NodeId>,
    pub initial_exec: Option<NodeId>,
    pub frame: Option<NodeId>,
    pub initial_mem: Option<NodeId>,
    pub args: Option<NodeId>,
    pub no_mem: Option<NodeId>,
}

impl Anchors {
    /// The nine anchors, in a fixed iteration order, for anchor-seeded
    /// walks (§4.7).
    pub fn all(&self) -> [Option<NodeId>; 9] {
        [
            self.start_block,
            self.start,
            self.end_block,
            self.end,
            self.initial_exec,
            self.frame,
            self.initial_mem,
            self.args,
            self.no_mem,
        ]
    }
}

/// One procedure's graph: the node arena plus all graph-level bookkeeping.
pub struct Graph {
    owner_entity: String,
    frame_type: String,
    arena: Vec<Node>,
    anchors: Anchors,
    construction_state: ConstructionState,
    properties: Properties,
    constraints: Constraints,
    visited: u32,
    block_visited: u32,
    fp_model: FloatModel,
    reverse_edges: Option<ReverseEdges>,
}

impl Graph {
    /// Builds a fresh graph for `owner_entity`, with the nine anchors
    /// already wired up: `start_block` dominates `start`; `end_block` is
    /// the sole successor feeding `end`.
    pub fn new(owner_entity: impl Into<String>, frame_type: impl Into<String>) -> Self {
        let mut g = Graph {
            owner_entity: owner_entity.into(),
            frame_type: frame_type.into(),
            arena: Vec::new(),
            anchors: Anchors::default(),
            construction_state: ConstructionState::Building,
            properties: Properties::empty(),
            constraints: Constraints::empty(),
            visited: 0,
            block_visited: 0,
            fp_model: FloatModel::default(),
            reverse_edges: None,
        };
        g.init_anchors();
        g
    }

    fn init_anchors(&mut self) {
        let start_block = self.new_node_raw(builtin::block(), mode::block(), Vec::new(), Attrs::None);
        let start = self.new_node_raw(builtin::start(), mode::tuple(), vec![start_block], Attrs::None);
        let end_block =
            self.new_node_raw(builtin::block(), mode::block(), Vec::new(), Attrs::None);
        let end = self.new_node_raw(builtin::end(), mode::tuple(), vec![end_block], Attrs::None);
        let initial_exec =
            self.new_node_raw(builtin::proj(), mode::execution(), vec![start], Attrs::Proj(0));
        let frame = self.new_node_raw(builtin::proj(), mode::pointer(), vec![start], Attrs::Proj(1));
        let initial_mem =
            self.new_node_raw(builtin::proj(), mode::memory(), vec![start], Attrs::Proj(2));
        let args = self.new_node_raw(builtin::proj(), mode::tuple(), vec![start], Attrs::Proj(3));
        let no_mem = self.new_node_raw(builtin::no_mem(), mode::memory(), Vec::new(), Attrs::None);

        self.anchors = Anchors {
            start_block: Some(start_block),
            start: Some(start),
            end_block: Some(end_block),
            end: Some(end),
            initial_exec: Some(initial_exec),
            frame: Some(frame),
            initial_mem: Some(initial_mem),
            args: Some(args),
            no_mem: Some(no_mem),
        };
    }

    /// This graph's owner-entity name.
    pub fn owner_entity(&self) -> &str {
        &self.owner_entity
    }

    /// This graph's frame-type description.
    pub fn frame_type(&self) -> &str {
        &self.frame_type
    }

    /// This graph's nine anchors.
    pub fn anchors(&self) -> &Anchors {
        &self.anchors
    }

    /// This graph's construction state.
    pub fn construction_state(&self) -> ConstructionState {
        self.construction_state
    }

    pub fn set_construction_state(&mut self, state: ConstructionState) {
        self.construction_state = state;
    }

    /// Currently-set consistency properties.
    pub fn properties(&self) -> Properties {
        self.properties
    }

    /// Drops the given properties from the consistency set (e.g. because a
    /// rewrite invalidated them) — §4.9's `clear_properties`.
    pub fn clear_properties(&mut self, dropped: Properties) {
        self.properties &= !dropped;
    }

    /// Marks the given properties as established.
    pub fn set_properties(&mut self, established: Properties) {
        self.properties |= established;
    }

    /// This graph's structural constraints.
    pub fn constraints(&self) -> Constraints {
        self.constraints
    }

    pub fn set_constraints(&mut self, constraints: Constraints) {
        self.constraints = constraints;
    }

    /// This graph's floating-point folding model.
    pub fn fp_model(&self) -> FloatModel {
        self.fp_model
    }

    pub fn set_fp_model(&mut self, model: FloatModel) {
        self.fp_model = model;
    }

    /// The number of node slots ever allocated (including orphaned ones;
    /// §3 invariant 5: indices are never reused within a graph's lifetime).
    pub fn last_node_idx(&self) -> u32 {
        self.arena.len() as u32
    }

    /// Looks up a node by id. Panics on an out-of-range id — ids from this
    /// graph are always valid by construction (invariant 5, §3).
    pub fn node(&self, id: NodeId) -> &Node {
        &self.arena[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.arena[id.index()]
    }

    /// Iterates all allocated node ids, including orphaned ones (callers
    /// that need only reachable nodes should use a walk from End instead).
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.arena.len()).map(|i| NodeId::from_index(i as u32))
    }

    /// Bumps and returns this graph's visited counter, for a fresh walk
    /// (§4.7).
    pub fn bump_visited(&mut self) -> u32 {
        self.visited += 1;
        self.visited
    }

    pub fn visited(&self) -> u32 {
        self.visited
    }

    /// Bumps and returns this graph's block-visited counter.
    pub fn bump_block_visited(&mut self) -> u32 {
        self.block_visited += 1;
        self.block_visited
    }

    pub fn block_visited(&self) -> u32 {
        self.block_visited
    }

    /// Is `id` marked visited for the current counter value?
    pub fn is_visited(&self, id: NodeId) -> bool {
        self.node(id).visited() == self.visited
    }

    /// Marks `id` visited for the current counter value.
    pub fn mark_visited(&mut self, id: NodeId) {
        let v = self.visited;
        self.node_mut(id).set_visited(v);
    }

    /// Activates the reverse-edge (use-list) index (§4.4), populating it
    /// from every currently-live input/dep edge.
    pub fn activate_reverse_edges(&mut self) {
        if self.reverse_edges.is_some() {
            return;
        }
        let mut idx = ReverseEdges::new();
        for id in self.node_ids() {
            let node = self.node(id);
            for (pos, &input) in node.inputs().iter().enumerate() {
                idx.add(input, id, pos as u32);
            }
            for &dep in node.deps() {
                idx.add_dep(dep, id);
            }
        }
        self.reverse_edges = Some(idx);
    }

    /// Drops the reverse-edge index.
    pub fn deactivate_reverse_edges(&mut self) {
        self.reverse_edges = None;
    }

    pub fn reverse_edges(&self) -> Option<&ReverseEdges> {
        self.reverse_edges.as_ref()
    }

    pub(crate) fn reverse_edges_mut(&mut self) -> Option<&mut ReverseEdges> {
        self.reverse_edges.as_mut()
    }

    /// The generic node constructor (§4.2): allocates in the arena, assigns
    /// the next index, and mirrors the reverse-edge index if active.
    pub fn new_node(&mut self, op: OpCode, mode: Mode, inputs: Vec<NodeId>, attrs: Attrs) -> NodeId {
        self.check_arity(op, &inputs);
        let id = self.new_node_raw(op, mode, inputs.clone(), attrs);
        if let Some(idx) = self.reverse_edges.as_mut() {
            for (pos, input) in inputs.into_iter().enumerate() {
                idx.add(input, id, pos as u32);
            }
        }
        id
    }

    fn new_node_raw(&mut self, op: OpCode, mode: Mode, inputs: Vec<NodeId>, attrs: Attrs) -> NodeId {
        let id = NodeId::from_index(self.arena.len() as u32);
        let node = Node::new(id, op, mode, inputs, attrs, PinState::Floats, DebugInfo::default());
        self.arena.push(node);
        id
    }

    fn check_arity(&self, code: OpCode, inputs: &[NodeId]) {
        op::with_op(code, |descr| match descr.arity() {
            Arity::Unary => debug_assert!(
                inputs.len() == 1 || inputs.len() == 2,
                "unary op `{}` given {} inputs",
                descr.name(),
                inputs.len()
            ),
            Arity::Binary => debug_assert!(
                inputs.len() == 2 || inputs.len() == 3,
                "binary op `{}` given {} inputs",
                descr.name(),
                inputs.len()
            ),
            Arity::Variable | Arity::Dynamic | Arity::Any => {}
        });
    }

    /// Appends an input to a variable-arity node (Phi, Call, Block, End,
    /// Sync, Tuple — §4.2). Mirrors the reverse-edge index if active.
    pub fn add_input(&mut self, node: NodeId, value: NodeId) {
        let pos = self.node(node).inputs().len() as u32;
        self.node_mut(node).add_input(value);
        if let Some(idx) = self.reverse_edges.as_mut() {
            idx.add(value, node, pos);
        }
    }

    /// Overwrites the input at `index`, mirroring the reverse-edge index.
    pub fn set_input(&mut self, node: NodeId, index: usize, value: NodeId) {
        let old = self.node(node).input(index);
        self.node_mut(node).set_input(index, value);
        if let Some(idx) = self.reverse_edges.as_mut() {
            if let Some(old) = old {
                idx.remove(old, node, index as u32);
            }
            idx.add(value, node, index as u32);
        }
    }

    /// Every node that currently references `target`, as a data/control
    /// input or an artificial dependency. Uses the reverse-edge index when
    /// active; otherwise falls back to a full arena scan — correct either
    /// way, just not O(1) without the index (§4.4, §4.8).
    pub fn users(&self, target: NodeId) -> Vec<NodeId> {
        if let Some(idx) = &self.reverse_edges {
            let mut out: Vec<NodeId> = idx.uses_of(target).map(|(u, _)| u).collect();
            out.extend(idx.dep_uses_of(target));
            out.sort_by_key(|n| n.index());
            out.dedup();
            out
        } else {
            let mut out = Vec::new();
            for id in self.node_ids() {
                let node = self.node(id);
                if node.inputs().contains(&target) || node.deps().contains(&target) {
                    out.push(id);
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_are_wired() {
        let g = Graph::new("test_proc", "test_frame");
        let a = g.anchors();
        assert!(a.start_block.is_some());
        assert!(a.start.is_some());
        assert!(a.end_block.is_some());
        assert!(a.end.is_some());
        assert_eq!(g.node(a.start.unwrap()).block(), a.start_block);
        assert_eq!(g.node(a.end.unwrap()).block(), a.end_block);
    }

    #[test]
    fn new_node_assigns_increasing_indices() {
        let mut g = Graph::new("p", "f");
        let before = g.last_node_idx();
        let bb = g.anchors().start_block.unwrap();
        let c1 = g.new_node(builtin::r#const(), mode::s32_mode(), vec![bb], Attrs::None);
        let c2 = g.new_node(builtin::r#const(), mode::s32_mode(), vec![bb], Attrs::None);
        assert!(c1.index() >= before as usize);
        assert!(c2.index() > c1.index());
        assert_eq!(g.last_node_idx(), before + 2);
    }

    #[test]
    fn visited_counter_discipline() {
        let mut g = Graph::new("p", "f");
        let bb = g.anchors().start_block.unwrap();
        let n = g.new_node(builtin::r#const(), mode::s32_mode(), vec![bb], Attrs::None);
        assert!(!g.is_visited(n));
        g.bump_visited();
        assert!(!g.is_visited(n));
        g.mark_visited(n);
        assert!(g.is_visited(n));
        g.bump_visited();
        assert!(!g.is_visited(n));
    }

    #[test]
    fn reverse_edges_mirror_inputs() {
        let mut g = Graph::new("p", "f");
        g.activate_reverse_edges();
        let bb = g.anchors().start_block.unwrap();
        let a = g.new_node(builtin::r#const(), mode::s32_mode(), vec![bb], Attrs::None);
        let add = g.new_node(builtin::add(), mode::s32_mode(), vec![bb, a, a], Attrs::None);
        let uses: Vec<_> = g.reverse_edges().unwrap().uses_of(a).collect();
        assert_eq!(uses.len(), 2);
        assert!(uses.iter().all(|&(user, _)| user == add));
    }
}
