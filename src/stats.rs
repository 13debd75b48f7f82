//! Option-gated statistics counters (§4.14, component O).
//!
//! Grounded in `original_source/ir/stat/firmstat.c`'s counter set, scoped
//! down to what this crate's graph core actually tracks (no call-graph or
//! pattern-history mining — that requires call-graph construction, out of
//! scope per the Non-goals). Gated behind `Config`'s [`StatFlags`](crate::config::StatFlags)
//! bitmask the way the rest of this crate threads `Config` rather than
//! reaching for a mutable global.

use crate::config::{Config, StatFlags};
use crate::ir::graph::Graph;
use crate::op::builtin;
use std::collections::HashSet;
use std::fmt::Write as _;

/// Per-graph statistics, accumulated only for the counters `Config::stats`
/// enables.
#[derive(Default, Clone, Debug)]
pub struct Stats {
    /// Count of nodes reachable from End with at least one use
    /// (`count_strong_op`).
    pub strong_op_count: u64,
    /// Count of nodes whose inputs form a DAG-shaped (non-cyclic, through
    /// Phi) substructure (`count_dag`).
    pub dag_count: u64,
    /// Count of nodes explicitly dropped via `rewrite::kill`
    /// (`count_deleted`) — tracked externally and folded in via
    /// [`Stats::record_deleted`], since the arena itself never reclaims.
    pub deleted_count: u64,
    /// Count of Proj-like projection nodes (`count_sels`).
    pub sel_count: u64,
    /// Count of distinct constant values (`count_consts`).
    pub const_count: u64,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }

    /// Registers one `rewrite::kill` call against `deleted_count`, if
    /// `StatFlags::COUNT_DELETED` tracking is enabled. Since `kill` does not
    /// reclaim arena slots (§5), this is the only place that count is ever
    /// incremented.
    pub fn record_deleted(&mut self, config: &Config) {
        if config.stats.contains(StatFlags::ENABLED | StatFlags::COUNT_DELETED) {
            self.deleted_count += 1;
        }
    }

    /// Recomputes the node-shaped counters by walking `graph` once, each
    /// gated on its own `StatFlags` bit (`count_strong_op`, `count_dag`,
    /// `count_sels`, `count_consts`) behind the `ENABLED` master switch. Call
    /// after a pass settles, not per-mutation.
    pub fn recompute(&mut self, graph: &mut Graph, config: &Config) {
        if !config.stats.contains(StatFlags::ENABLED) {
            return;
        }
        let order = crate::walk::walk_topo_from_end(graph);
        let mut strong = 0u64;
        let mut sels = 0u64;
        let mut consts = HashSet::new();
        let mut dag = 0u64;

        for &id in &order {
            if config.stats.contains(StatFlags::COUNT_STRONG_OP) && !graph.users(id).is_empty() {
                strong += 1;
            }
            let op = graph.node(id).op();
            if config.stats.contains(StatFlags::COUNT_SELS) && op == builtin::proj() {
                sels += 1;
            }
            if config.stats.contains(StatFlags::COUNT_CONSTS) && op == builtin::r#const() {
                if let Some(tag) = const_tag(graph, id) {
                    consts.insert(tag);
                }
            }
            if config.stats.contains(StatFlags::COUNT_DAG) && op != builtin::phi() && op != builtin::phi_m() {
                dag += 1;
            }
        }

        self.strong_op_count = strong;
        self.sel_count = sels;
        self.const_count = consts.len() as u64;
        self.dag_count = dag;
    }

    /// A CSV row of this graph's counters (`csv_output`, §6.4): header then
    /// one data line, so multiple graphs' rows concatenate into one file
    /// with a single header the caller writes once.
    pub fn to_csv_row(&self, owner_entity: &str) -> String {
        let mut out = String::new();
        write!(
            out,
            "{},{},{},{},{},{}",
            owner_entity, self.strong_op_count, self.dag_count, self.deleted_count, self.sel_count, self.const_count
        )
        .unwrap();
        out
    }

    pub fn csv_header() -> &'static str {
        "entity,strong_op_count,dag_count,deleted_count,sel_count,const_count"
    }
}

/// A hashable tag for a distinct constant value, used to dedupe
/// `count_consts` without requiring `TargetValue` itself to be `Hash`.
fn const_tag(graph: &Graph, id: crate::entity::NodeId) -> Option<(u32, i128)> {
    let node = graph.node(id);
    let tv = node.attrs().as_const()?;
    let bits = tv.as_i128().unwrap_or_else(|| tv.as_f64().unwrap_or(0.0).to_bits() as i128);
    Some((node.mode().size_bits(), bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::Attrs;
    use crate::mode;
    use crate::tarval::TargetValue;

    #[test]
    fn recompute_is_noop_when_flag_disabled() {
        let mut g = Graph::new("p", "f");
        let config = Config::quiet();
        let mut stats = Stats::new();
        stats.recompute(&mut g, &config);
        assert_eq!(stats.strong_op_count, 0);
    }

    #[test]
    fn recompute_counts_distinct_constants() {
        let mut g = Graph::new("p", "f");
        let bb = g.anchors().start_block.unwrap();
        let m = mode::s32_mode();
        let c1 = g.new_node(builtin::r#const(), m, vec![bb], Attrs::Const(TargetValue::from_i128(m, 1)));
        let c2 = g.new_node(builtin::r#const(), m, vec![bb], Attrs::Const(TargetValue::from_i128(m, 1)));
        let end = g.anchors().end.unwrap();
        g.add_input(end, c1);
        g.add_input(end, c2);

        let mut config = Config::quiet();
        config.stats = StatFlags::ENABLED | StatFlags::COUNT_CONSTS;
        let mut stats = Stats::new();
        stats.recompute(&mut g, &config);
        assert_eq!(stats.const_count, 1);
    }

    #[test]
    fn csv_row_has_one_field_per_header_column() {
        let stats = Stats::new();
        let header_fields = Stats::csv_header().split(',').count();
        let row_fields = stats.to_csv_row("p").split(',').count();
        assert_eq!(header_fields, row_fields);
    }
}
