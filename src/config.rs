//! Runtime configuration (§4.14, §6.4): one `Config` value threaded through
//! by the caller, not a global singleton — so embedding two independently
//! configured instances of this IR in the same process (e.g. a test
//! harness driving several graphs with different dump settings) never
//! fights over shared mutable state the way the original's file-scope
//! globals would.

use std::path::PathBuf;

bitflags::bitflags! {
    /// Which statistics counters (§4.14, §6.4) are active. Each bit gates
    /// one family of counters; clients combine them with `|` the way
    /// cranelift callers combine `settings` flags. Names and bit set follow
    /// §6.4's documented option list literally.
    #[derive(Default)]
    pub struct StatFlags: u32 {
        /// No statistics are collected (the default — collection has a
        /// real cost on hot construction/rewrite paths).
        const NONE = 0;
        /// Master switch: statistics collection runs at all.
        const ENABLED = 1 << 0;
        /// Pattern-history accounting (`firmstat.c`'s pattern tables).
        const PATTERN = 1 << 1;
        /// Count nodes reachable from End with at least one use
        /// (`count_strong_op`).
        const COUNT_STRONG_OP = 1 << 2;
        /// Count nodes whose inputs form a DAG-shaped substructure
        /// (`count_dag`).
        const COUNT_DAG = 1 << 3;
        /// Count nodes explicitly dropped via `rewrite::kill`
        /// (`count_deleted`).
        const COUNT_DELETED = 1 << 4;
        /// Count Proj-like projection nodes (`count_sels`).
        const COUNT_SELS = 1 << 5;
        /// Count distinct constant values (`count_consts`).
        const COUNT_CONSTS = 1 << 6;
        /// Emit a CSV row per graph rather than only populating `Stats`
        /// in-memory (`csv_output`).
        const CSV_OUTPUT = 1 << 7;
        /// All of the above.
        const ALL = Self::ENABLED.bits | Self::PATTERN.bits | Self::COUNT_STRONG_OP.bits
            | Self::COUNT_DAG.bits | Self::COUNT_DELETED.bits | Self::COUNT_SELS.bits
            | Self::COUNT_CONSTS.bits | Self::CSV_OUTPUT.bits;
    }
}

bitflags::bitflags! {
    /// How floating-point constant folding should behave (§6.4): a bitset,
    /// not an either/or choice, since a caller may e.g. allow FMA contraction
    /// while still wanting strict rounding elsewhere.
    pub struct FloatModel: u32 {
        /// Fold strictly per IEEE 754 semantics, as if running on the target.
        const STRICT = 1 << 0;
        /// Allow folding that does not exactly reproduce target rounding —
        /// what `tarval.rs` does today for `binary128`, by computing in
        /// `f64`.
        const NON_STRICT = 1 << 1;
        /// Allow contracting separate multiply/add nodes into a fused
        /// multiply-add during constant folding.
        const FMA_ALLOWED = 1 << 2;
        /// Allow reassociation/approximation that does not preserve bit-exact
        /// IEEE 754 results (e.g. reciprocal-multiply instead of divide).
        const FAST_MATH = 1 << 3;
    }
}

impl Default for FloatModel {
    fn default() -> Self {
        FloatModel::STRICT
    }
}

/// Process/session-wide knobs. Constructed once by the embedder and passed
/// by reference to the APIs that consult it (dump, stats, verify).
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Only dump graphs whose owner-entity name contains this substring.
    /// Empty means "dump everything".
    pub dump_filter: String,
    /// Directory textual/VCG dumps are written under.
    pub dump_path: Option<PathBuf>,
    /// Which statistics families are active.
    pub stats: StatFlags,
    /// The floating-point folding model to use.
    pub float_model: FloatModel,
}

impl Config {
    /// A config with everything off: no dumps, no statistics, strict FP.
    pub fn quiet() -> Self {
        Config::default()
    }

    /// Does `name` pass this config's dump filter?
    pub fn accepts_dump(&self, name: &str) -> bool {
        self.dump_filter.is_empty() || name.contains(self.dump_filter.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_has_no_stats() {
        let cfg = Config::quiet();
        assert_eq!(cfg.stats, StatFlags::NONE);
        assert_eq!(cfg.float_model, FloatModel::STRICT);
    }

    #[test]
    fn dump_filter_empty_accepts_all() {
        let cfg = Config::quiet();
        assert!(cfg.accepts_dump("anything"));
    }

    #[test]
    fn dump_filter_substring() {
        let mut cfg = Config::quiet();
        cfg.dump_filter = "main".to_string();
        assert!(cfg.accepts_dump("main_loop"));
        assert!(!cfg.accepts_dump("helper"));
    }

    #[test]
    fn stat_flags_combine() {
        let f = StatFlags::COUNT_STRONG_OP | StatFlags::PATTERN;
        assert!(f.contains(StatFlags::COUNT_STRONG_OP));
        assert!(f.contains(StatFlags::PATTERN));
        assert!(!f.contains(StatFlags::COUNT_DAG));
    }

    #[test]
    fn float_model_bits_combine() {
        let f = FloatModel::STRICT | FloatModel::FMA_ALLOWED;
        assert!(f.contains(FloatModel::STRICT));
        assert!(f.contains(FloatModel::FMA_ALLOWED));
        assert!(!f.contains(FloatModel::FAST_MATH));
    }
}
