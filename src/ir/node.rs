//! Graph vertices (§3, component C).
//!
//! A C-style "fixed struct header + per-op attribute bytes" layout doesn't
//! translate idiomatically into Rust: there's no way to give an op-specific
//! byte blob a typed, safe view without `unsafe` transmutes at every call
//! site. Instead `Attrs` is a closed enum of the attribute shapes this IR's
//! built-in ops actually need (mirroring how cranelift-codegen's
//! `InstructionData` is one enum over instruction formats rather than a
//! generic byte buffer) — clients extending the op set store their own
//! attributes through [`crate::op::OpMethods`]'s `init` hook into an
//! `Attrs::Extra` slot instead.

use crate::entity::{LoopId, NodeId};
use crate::mode::Mode;
use crate::op::OpCode;
use crate::tarval::TargetValue;

/// Whether/when a fragile or memory-touching node may be scheduled freely.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum PinState {
    /// May float: scheduling is unconstrained by control or memory order.
    Floats,
    /// Pinned to its block; may not move across block boundaries.
    Pinned,
    /// Pinned because it may raise an exception (a fragile op that
    /// demonstrably can throw).
    ExcPinned,
    /// Pinned because it touches memory order.
    MemPinned,
}

/// Op-specific payload. `None` covers the large majority of ops (Add, Sub,
/// Jmp, Phi, ...) whose full behaviour is captured by op + mode + inputs.
#[derive(Clone, Debug)]
pub enum Attrs {
    /// No extra attributes.
    None,
    /// A `Const` node's folded value.
    Const(TargetValue),
    /// A `Proj` node's projection index into its tuple-producing input.
    Proj(u32),
    /// Extension point for client-registered ops: an opaque, clonable slot.
    /// Populated by the op's `init` method (§4.2 step (e)); this crate's
    /// built-in ops never use it.
    Extra(std::sync::Arc<dyn std::any::Any + Send + Sync>),
}

impl Attrs {
    /// The `TargetValue` carried by a `Const` node, if any.
    pub fn as_const(&self) -> Option<TargetValue> {
        match self {
            Attrs::Const(tv) => Some(*tv),
            _ => None,
        }
    }

    /// The projection index carried by a `Proj` node, if any.
    pub fn as_proj(&self) -> Option<u32> {
        match self {
            Attrs::Proj(idx) => Some(*idx),
            _ => None,
        }
    }
}

/// Debug/source-location info attached to a node at construction. Kept
/// deliberately minimal — frontends that need richer provenance store it in
/// their own side tables keyed by `NodeId`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DebugInfo {
    /// A free-form source label (file:line, or a frontend-defined tag).
    pub label: Option<String>,
}

/// A graph vertex.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    op: OpCode,
    mode: Mode,
    /// Element 0 is the owning block (except for `Block` itself, whose
    /// inputs are its control-flow predecessors) — invariant 1, §3.
    inputs: Vec<NodeId>,
    /// Artificial scheduling dependencies, independent of data/control
    /// flow (§3).
    deps: Vec<NodeId>,
    attrs: Attrs,
    pin_state: PinState,
    debug: DebugInfo,

    // Scratch fields (§3):
    visited: u32,
    link: Option<NodeId>,
    loop_id: Option<LoopId>,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        op: OpCode,
        mode: Mode,
        inputs: Vec<NodeId>,
        attrs: Attrs,
        pin_state: PinState,
        debug: DebugInfo,
    ) -> Self {
        Node {
            id,
            op,
            mode,
            inputs,
            deps: Vec::new(),
            attrs,
            pin_state,
            debug,
            visited: 0,
            link: None,
            loop_id: None,
        }
    }

    /// This node's own id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// This node's operation.
    pub fn op(&self) -> OpCode {
        self.op
    }

    /// This node's result mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// This node's ordered inputs (element 0 is the owning block, for all
    /// ops but `Block` itself).
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// The owning block, for non-`Block` nodes.
    pub fn block(&self) -> Option<NodeId> {
        self.inputs.first().copied()
    }

    /// This node's artificial dependency edges.
    pub fn deps(&self) -> &[NodeId] {
        &self.deps
    }

    /// Appends an artificial dependency edge.
    pub fn add_dep(&mut self, dep: NodeId) {
        self.deps.push(dep);
    }

    /// This node's attribute payload.
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// This node's pin state.
    pub fn pin_state(&self) -> PinState {
        self.pin_state
    }

    /// This node's debug info.
    pub fn debug(&self) -> &DebugInfo {
        &self.debug
    }

    /// This node's scratch "loop" pointer, set by loop analysis.
    pub fn loop_id(&self) -> Option<LoopId> {
        self.loop_id
    }

    pub(crate) fn set_loop_id(&mut self, loop_id: Option<LoopId>) {
        self.loop_id = loop_id;
    }

    /// The scratch "link" pointer, used by passes (e.g. trivial-Phi
    /// worklists) as scratch storage that doesn't need its own side table.
    pub fn link(&self) -> Option<NodeId> {
        self.link
    }

    pub(crate) fn set_link(&mut self, link: Option<NodeId>) {
        self.link = link;
    }

    pub(crate) fn visited(&self) -> u32 {
        self.visited
    }

    pub(crate) fn set_visited(&mut self, v: u32) {
        self.visited = v;
    }

    /// Reads the input at `index`, if present.
    pub fn input(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index).copied()
    }

    /// Overwrites the input at `index`. Panics if out of range — variable
    /// arity nodes must `resize`/`add_input` first.
    pub(crate) fn set_input(&mut self, index: usize, value: NodeId) {
        self.inputs[index] = value;
    }

    /// Appends an input (used by variable-arity ops: Phi, Call, Block, End,
    /// Sync, Tuple).
    pub(crate) fn add_input(&mut self, value: NodeId) {
        self.inputs.push(value);
    }

    /// Removes the input at `index`, shifting later inputs down.
    pub(crate) fn remove_input(&mut self, index: usize) {
        self.inputs.remove(index);
    }

    pub(crate) fn replace_input_value(&mut self, old: NodeId, new: NodeId) -> bool {
        let mut changed = false;
        for slot in self.inputs.iter_mut() {
            if *slot == old {
                *slot = new;
                changed = true;
            }
        }
        for slot in self.deps.iter_mut() {
            if *slot == old {
                *slot = new;
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode;
    use crate::op::builtin;

    fn sample_node(id: u32, inputs: Vec<NodeId>) -> Node {
        Node::new(
            NodeId::from_index(id),
            builtin::add(),
            mode::s32_mode(),
            inputs,
            Attrs::None,
            PinState::Floats,
            DebugInfo::default(),
        )
    }

    #[test]
    fn block_is_input_zero() {
        let block = NodeId::from_index(0);
        let lhs = NodeId::from_index(1);
        let rhs = NodeId::from_index(2);
        let n = sample_node(3, vec![block, lhs, rhs]);
        assert_eq!(n.block(), Some(block));
        assert_eq!(n.inputs(), &[block, lhs, rhs]);
    }

    #[test]
    fn replace_input_value_rewrites_all_occurrences() {
        let block = NodeId::from_index(0);
        let old = NodeId::from_index(1);
        let new = NodeId::from_index(5);
        let mut n = sample_node(3, vec![block, old, old]);
        assert!(n.replace_input_value(old, new));
        assert_eq!(n.inputs(), &[block, new, new]);
    }

    #[test]
    fn const_attrs_roundtrip() {
        let block = NodeId::from_index(0);
        let m = mode::s32_mode();
        let tv = TargetValue::from_i128(m, 5);
        let n = Node::new(
            NodeId::from_index(1),
            builtin::r#const(),
            m,
            vec![block],
            Attrs::Const(tv),
            PinState::Floats,
            DebugInfo::default(),
        );
        assert_eq!(n.attrs().as_const(), Some(tv));
    }
}
