//! Deterministic textual IR writer (§4.12, component M, part 1).
//!
//! Renders a graph as an s-expression-like block/instruction listing, the
//! way `cranelift-codegen::write` renders a `Function` — used for golden-
//! output diagnostics and tests that don't want to round-trip through a
//! parser. Purely a reader of graph state; it never mutates.

use crate::ir::graph::Graph;
use crate::ir::node::Attrs;
use crate::op::builtin;
use std::fmt::Write as _;

/// Renders `graph` as deterministic text, block-wise in reverse post-order
/// (§4.7), each block's body in topological order.
pub fn write_function(graph: &mut Graph) -> String {
    let mut out = String::new();
    writeln!(out, "graph {} {{", graph.owner_entity()).unwrap();

    let order = crate::walk::walk_blocks(graph);
    let mut current_block = None;
    for id in order {
        let node = graph.node(id);
        if node.op() == builtin::block() {
            if current_block.is_some() {
                writeln!(out, "  }}").unwrap();
            }
            current_block = Some(id);
            let preds: Vec<String> = node.inputs().iter().map(|n| n.to_string()).collect();
            writeln!(out, "  block {}({}):", id, preds.join(", ")).unwrap();
            continue;
        }
        write_instruction(&mut out, graph, id);
    }
    if current_block.is_some() {
        writeln!(out, "  }}").unwrap();
    }
    writeln!(out, "}}").unwrap();
    out
}

fn write_instruction(out: &mut String, graph: &Graph, id: crate::entity::NodeId) {
    let node = graph.node(id);
    let op_name = crate::op::with_op(node.op(), |d| d.name().to_string());
    let inputs: Vec<String> = node.inputs()[1..].iter().map(|n| n.to_string()).collect();
    let attr = match node.attrs() {
        Attrs::None => String::new(),
        Attrs::Const(tv) => match tv.as_i128() {
            Some(i) => format!(" #{}", i),
            None => format!(" #{:?}", tv.as_f64()),
        },
        Attrs::Proj(idx) => format!(" proj{}", idx),
        Attrs::Extra(_) => " <extra>".to_string(),
    };
    let label = node
        .debug()
        .label
        .as_ref()
        .map(|l| format!(" ; {}", l))
        .unwrap_or_default();
    writeln!(
        out,
        "    {} = {}:{} ({}){}{}",
        id,
        op_name,
        node.mode(),
        inputs.join(", "),
        attr,
        label
    )
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::Attrs;
    use crate::mode;

    #[test]
    fn writer_is_deterministic_across_runs() {
        let mut g = Graph::new("example", "frame");
        let bb = g.anchors().start_block.unwrap();
        let m = mode::s32_mode();
        let a = g.new_node(builtin::r#const(), m, vec![bb], Attrs::None);
        let _ = g.new_node(builtin::add(), m, vec![bb, a, a], Attrs::None);

        let first = write_function(&mut g);
        let second = write_function(&mut g);
        assert_eq!(first, second);
        assert!(first.contains("graph example {"));
    }

    #[test]
    fn writer_renders_block_headers_with_predecessors() {
        let mut g = Graph::new("p", "f");
        let start_block = g.anchors().start_block.unwrap();
        let bb2 = g.new_node(builtin::block(), mode::block(), vec![start_block], Attrs::None);
        let end_block = g.anchors().end_block.unwrap();
        g.add_input(end_block, bb2);

        let text = write_function(&mut g);
        assert!(text.contains(&format!("block {}({})", bb2, start_block)));
    }
}
