//! A graph-based SSA compiler intermediate representation.
//!
//! `firm-ir` models one procedure as a `Graph` (component C): an arena of
//! `Node`s referencing each other by index rather than by pointer, built
//! incrementally by an on-the-fly SSA construction algorithm (`ir::ssacons`)
//! that lets a frontend think in mutable local variables. Once built, a
//! graph supports dominance and post-dominance (`dominator_tree`), loop
//! analysis (`loop_analysis`), a rewriting engine with CSE and scoped
//! peephole registration (`rewrite`), and the shared walk primitives
//! (`walk`) every analysis is built on.
//!
//! See `DESIGN.md` in the repository root for the grounding ledger behind
//! each module's design.

#![warn(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

pub mod config;
pub mod dominator_tree;
pub mod dump;
pub mod entity;
pub mod error;
pub mod hash;
pub mod hooks;
pub mod ir;
pub mod loop_analysis;
pub mod mode;
pub mod op;
pub mod pass;
pub mod relation;
pub mod rewrite;
pub mod stats;
pub mod tarval;
pub mod verify;
pub mod walk;
pub mod write;

pub use crate::config::Config;
pub use crate::error::{FirmError, FirmResult};
pub use crate::ir::graph::Graph;
pub use crate::ir::node::Node;
pub use crate::ir::ssacons::SsaBuilder;
pub use crate::verify::verify_function;
pub use crate::write::write_function;

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
