//! Idempotent analysis recompute/invalidate wrappers (§4.9, component I).
//!
//! `Graph` itself only tracks *whether* an analysis is consistent (the
//! `Properties` bitset in `ir::graph`); it doesn't own the analysis results,
//! since not every graph needs them computed. `AnalysisCache` is the
//! side-table a pass manager threads alongside a `Graph`: `assure_X`
//! recomputes only when the corresponding flag is clear, `free_X` drops the
//! cached result and clears the flag. Grounded in
//! `original_source/ir/ir/irgraph_t.h`'s cached per-graph state pattern —
//! `get_irg_phase_state`/`set_irg_phase_state` and
//! `get_irg_callee_info_state`/`set_irg_callee_info_state` gate a cached
//! result behind a consistency flag the same way `assure_X`/`free_X` do
//! here — generalised to this crate's dominance/loop analyses.

use crate::dominator_tree::{self, DomInfo};
use crate::ir::graph::{Graph, Properties};
use crate::loop_analysis::{self, LoopInfo};

/// Per-graph cache of on-demand analysis results, kept in sync with
/// `Graph::properties()`.
#[derive(Default)]
pub struct AnalysisCache {
    dominance: Option<DomInfo>,
    post_dominance: Option<DomInfo>,
    loop_info: Option<LoopInfo>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        AnalysisCache::default()
    }

    /// Returns the graph's forward dominance info, recomputing it iff
    /// `CONSISTENT_DOMINANCE` is currently clear.
    pub fn assure_dominance(&mut self, graph: &mut Graph) -> &DomInfo {
        if !graph.properties().contains(Properties::CONSISTENT_DOMINANCE) {
            self.dominance = Some(dominator_tree::compute_dominance(graph));
        }
        self.dominance
            .as_ref()
            .expect("assure_dominance just computed it or the flag said it was already valid")
    }

    /// Drops the cached dominance result and clears its consistency flag.
    pub fn free_dominance(&mut self, graph: &mut Graph) {
        self.dominance = None;
        graph.clear_properties(Properties::CONSISTENT_DOMINANCE);
    }

    /// Returns the graph's post-dominance info, recomputing it iff
    /// `CONSISTENT_POST_DOMINANCE` is currently clear.
    pub fn assure_post_dominance(&mut self, graph: &mut Graph) -> &DomInfo {
        if !graph.properties().contains(Properties::CONSISTENT_POST_DOMINANCE) {
            self.post_dominance = Some(dominator_tree::compute_post_dominance(graph));
        }
        self.post_dominance
            .as_ref()
            .expect("assure_post_dominance just computed it or the flag said it was already valid")
    }

    pub fn free_post_dominance(&mut self, graph: &mut Graph) {
        self.post_dominance = None;
        graph.clear_properties(Properties::CONSISTENT_POST_DOMINANCE);
    }

    /// Returns the graph's loop-nesting tree, recomputing it iff
    /// `CONSISTENT_LOOPINFO` is currently clear.
    pub fn assure_loopinfo(&mut self, graph: &mut Graph) -> &LoopInfo {
        if !graph.properties().contains(Properties::CONSISTENT_LOOPINFO) {
            self.loop_info = Some(loop_analysis::compute_loop_info(graph));
        }
        self.loop_info
            .as_ref()
            .expect("assure_loopinfo just computed it or the flag said it was already valid")
    }

    pub fn free_loopinfo(&mut self, graph: &mut Graph) {
        self.loop_info = None;
        graph.clear_properties(Properties::CONSISTENT_LOOPINFO);
    }

    /// Drops every cached analysis and clears all of their flags — used
    /// before a pass that may invalidate everything at once (e.g. inlining).
    pub fn free_all(&mut self, graph: &mut Graph) {
        self.free_dominance(graph);
        self.free_post_dominance(graph);
        self.free_loopinfo(graph);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::Attrs;
    use crate::mode;
    use crate::op::builtin;

    #[test]
    fn assure_is_idempotent_until_freed() {
        let mut g = Graph::new("p", "f");
        let start_block = g.anchors().start_block.unwrap();
        let a = g.new_node(builtin::block(), mode::block(), vec![start_block], Attrs::None);
        let _ = a;

        let mut cache = AnalysisCache::new();
        assert!(!g.properties().contains(Properties::CONSISTENT_DOMINANCE));
        cache.assure_dominance(&mut g);
        assert!(g.properties().contains(Properties::CONSISTENT_DOMINANCE));

        // A second assure with the flag still set must not recompute (same
        // cached pointer contents — checked indirectly via the flag
        // remaining set without an intervening invalidation).
        cache.assure_dominance(&mut g);
        assert!(g.properties().contains(Properties::CONSISTENT_DOMINANCE));

        cache.free_dominance(&mut g);
        assert!(!g.properties().contains(Properties::CONSISTENT_DOMINANCE));
    }

    #[test]
    fn free_all_clears_every_flag() {
        let mut g = Graph::new("p", "f");
        let mut cache = AnalysisCache::new();
        cache.assure_dominance(&mut g);
        cache.assure_post_dominance(&mut g);
        cache.assure_loopinfo(&mut g);
        cache.free_all(&mut g);
        assert!(g.properties().is_empty());
    }
}
