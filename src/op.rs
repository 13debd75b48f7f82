//! The operations registry (§3, §4.1): a catalogue of opcodes, each with a
//! stable tag, flags, arity discipline and a method table of op-specific
//! behaviour.
//!
//! Opcodes in this IR are a closed, known-at-startup set — exactly the
//! situation §9's "Dynamic dispatch per op" design note calls for a static
//! array indexed by opcode tag, each cell a struct of function handles,
//! rather than `dyn Trait` objects. `OpCode` is the array index; `Op`
//! carries everything [`new_node`](crate::ir::graph::Graph::new_node) needs
//! to allocate and validate a node of that opcode, following the registry
//! pattern cranelift-codegen's own `ir::Opcode`/instruction-format lookup
//! tables use, but populated by runtime registration (`register`) instead of
//! a build-time code generator, since clients of this IR add node kinds the
//! core is not aware of in advance.

use crate::hash::hash_ptr;
use once_cell::sync::Lazy;
use std::sync::Mutex;

/// How many inputs an operation's node takes.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Arity {
    /// Exactly one input (plus the owning block).
    Unary,
    /// Exactly two inputs (plus the owning block).
    Binary,
    /// A variable but client-declared number of inputs, frozen at
    /// construction time.
    Variable,
    /// An open-ended, dynamically growable input list (Phi, End, Call,
    /// Sync, Tuple, Block, ASM — see §4.2).
    Dynamic,
    /// No arity discipline is enforced (used sparingly, e.g. by `Bad`).
    Any,
}

bitflags::bitflags! {
    /// Per-operation behavioural flags (§3).
    #[derive(Default)]
    pub struct OpFlags: u32 {
        const NONE = 0;
        /// Operands may be freely swapped without changing semantics.
        const COMMUTATIVE = 1 << 0;
        /// This is a control-flow opcode.
        const CFOPCODE = 1 << 1;
        /// May be reordered/duplicated only with great care (has
        /// externally-visible side effects beyond its explicit memory edge).
        const FRAGILE = 1 << 2;
        /// Has more than one successor in the control-flow graph.
        const FORKING = 1 << 3;
        /// A high-level (pre-lowering) opcode.
        const HIGHLEVEL = 1 << 4;
        /// Behaves like a constant: can float freely, participates in CSE
        /// independent of position.
        const CONSTLIKE = 1 << 5;
        /// Must be kept alive even with no real uses (anchored).
        const KEEP = 1 << 6;
        /// Must be placed in the start block.
        const START_BLOCK_PLACED = 1 << 7;
        /// Reads or writes `mode_M`.
        const USES_MEMORY = 1 << 8;
        /// Dumped without an explicit block edge.
        const DUMP_NOBLOCK = 1 << 9;
        /// Excluded from CSE even though it might otherwise qualify.
        const CSE_NEUTRAL = 1 << 10;
        /// A branch whose destinations aren't all known statically.
        const UNKNOWN_JUMP = 1 << 11;
    }
}

/// A stable reference to a registered operation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct OpCode(u32);

impl OpCode {
    fn from_index(i: usize) -> Self {
        OpCode(i as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-op method table: the op-specific behaviour that would be virtual
/// dispatch in an object-oriented host, collapsed here into a struct of
/// optional function pointers looked up through the static `OpCode` index.
#[derive(Default)]
pub struct OpMethods {
    /// Runs when a node of this op is constructed, to set up its attribute
    /// struct's defaults (§4.2, step (e)).
    pub init: Option<fn(&mut dyn std::any::Any)>,
    /// Op-defined equality over attribute structs, for CSE (§4.8). Defaults
    /// to "always equal" (attribute-free ops, or ops whose equality is
    /// fully captured by their inputs).
    pub attrs_equal: Option<fn(&dyn std::any::Any, &dyn std::any::Any) -> bool>,
    /// Op-defined attribute hash, for CSE. Defaults to a hash over nothing
    /// (the CSE key's (op, mode, inputs) triple already discriminates most
    /// ops).
    pub attrs_hash: Option<fn(&dyn std::any::Any) -> u32>,
    /// Verifies op-specific invariants beyond the universal P1–P4 checks.
    pub verify: Option<fn(crate::entity::NodeId, &crate::ir::graph::Graph) -> Result<(), String>>,
}

/// A peephole handler: examines a node and optionally returns a
/// replacement id the caller should `exchange` it with (§4.8, rule 3).
///
/// This is the one concrete shape the per-op generic slot holds today;
/// typed here (rather than behind an erased `usize`/`dyn Any`) so
/// installing and reading a handler never needs `unsafe`.
pub type PeepholeFn = fn(&mut crate::ir::graph::Graph, crate::entity::NodeId) -> Option<crate::entity::NodeId>;

/// A registered operation descriptor.
pub struct Op {
    code: OpCode,
    name: String,
    arity: Arity,
    flags: OpFlags,
    attr_size: usize,
    methods: OpMethods,
    /// Transient, per-pass callback slot (§4.1, §4.8): peephole handlers
    /// install themselves here for the duration of a driven walk, then
    /// clear it — a scoped acquire/release, not a permanent registration.
    generic_slot: Mutex<Option<PeepholeFn>>,
}

impl Op {
    /// This op's stable tag.
    pub fn code(&self) -> OpCode {
        self.code
    }

    /// This op's registered name (e.g. `"Add"`, `"Load"`, `"Phi"`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This op's arity discipline.
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// This op's behavioural flags.
    pub fn flags(&self) -> OpFlags {
        self.flags
    }

    /// Size in bytes reserved for this op's attribute struct.
    pub fn attr_size(&self) -> usize {
        self.attr_size
    }

    /// This op's method table.
    pub fn methods(&self) -> &OpMethods {
        &self.methods
    }

    /// A process-wide hash contribution for this op: the pointer identity
    /// of its interned registry slot (ops never move once registered).
    pub fn identity_hash(&self) -> u32 {
        hash_ptr(self as *const Op)
    }

    /// Installs a peephole handler into this op's generic slot, returning
    /// the previous occupant.
    ///
    /// Peephole registration is "acquire, install, run, release": callers
    /// must restore the previous value (usually `None`) once their pass
    /// finishes (§4.8).
    pub fn set_generic(&self, value: Option<PeepholeFn>) -> Option<PeepholeFn> {
        std::mem::replace(&mut self.generic_slot.lock().unwrap(), value)
    }

    /// Reads this op's generic slot.
    pub fn generic(&self) -> Option<PeepholeFn> {
        *self.generic_slot.lock().unwrap()
    }
}

struct OpRegistry {
    ops: Vec<Op>,
    by_name: std::collections::HashMap<String, OpCode>,
}

static REGISTRY: Lazy<Mutex<OpRegistry>> = Lazy::new(|| {
    Mutex::new(OpRegistry {
        ops: Vec::new(),
        by_name: std::collections::HashMap::new(),
    })
});

/// Registers a new operation, returning its stable `OpCode`.
///
/// Re-registering a name already present in the registry is a programming
/// error in this IR (opcodes form a closed set fixed at startup) and
/// panics, matching the source's `assert`-backed registration discipline.
pub fn register(name: &str, arity: Arity, flags: OpFlags, attr_size: usize) -> OpCode {
    register_with_methods(name, arity, flags, attr_size, OpMethods::default())
}

/// As [`register`], but also installs a non-default method table.
pub fn register_with_methods(
    name: &str,
    arity: Arity,
    flags: OpFlags,
    attr_size: usize,
    methods: OpMethods,
) -> OpCode {
    let mut reg = REGISTRY.lock().unwrap();
    assert!(
        !reg.by_name.contains_key(name),
        "operation `{}` already registered",
        name
    );
    let code = OpCode::from_index(reg.ops.len());
    reg.ops.push(Op {
        code,
        name: name.to_string(),
        arity,
        flags,
        attr_size,
        methods,
        generic_slot: Mutex::new(None),
    });
    reg.by_name.insert(name.to_string(), code);
    code
}

/// Looks up a previously registered op by name.
pub fn lookup(name: &str) -> Option<OpCode> {
    REGISTRY.lock().unwrap().by_name.get(name).copied()
}

/// Runs `f` with a reference to the op descriptor for `code`.
///
/// Taking a callback rather than returning `&Op` keeps the registry's lock
/// scope obvious at call sites and sidesteps lifetime entanglement with the
/// global `Mutex`.
pub fn with_op<R>(code: OpCode, f: impl FnOnce(&Op) -> R) -> R {
    let reg = REGISTRY.lock().unwrap();
    f(&reg.ops[code.index()])
}

/// Built-in opcodes every graph relies on, registered lazily on first use so
/// that `OpCode`s for e.g. `Block`/`Start`/`End`/`Bad` are stable process-wide
/// singletons (mirroring the `Mode` builtins of `crate::mode`).
pub mod builtin {
    use super::*;

    macro_rules! builtin_op {
        ($fn_name:ident, $name:expr, $arity:expr, $flags:expr) => {
            pub fn $fn_name() -> OpCode {
                static CELL: Lazy<OpCode> =
                    Lazy::new(|| register($name, $arity, $flags, 0));
                *CELL
            }
        };
    }

    builtin_op!(block, "Block", Arity::Dynamic, OpFlags::CFOPCODE);
    builtin_op!(start, "Start", Arity::Any, OpFlags::CFOPCODE);
    builtin_op!(end, "End", Arity::Dynamic, OpFlags::CFOPCODE | OpFlags::KEEP);
    builtin_op!(bad, "Bad", Arity::Any, OpFlags::CONSTLIKE);
    builtin_op!(unknown, "Unknown", Arity::Any, OpFlags::CONSTLIKE);
    builtin_op!(jmp, "Jmp", Arity::Any, OpFlags::CFOPCODE);
    builtin_op!(cond, "Cond", Arity::Unary, OpFlags::CFOPCODE | OpFlags::FORKING);
    builtin_op!(proj, "Proj", Arity::Unary, OpFlags::NONE);
    builtin_op!(phi, "Phi", Arity::Dynamic, OpFlags::NONE);
    builtin_op!(phi_m, "PhiM", Arity::Dynamic, OpFlags::USES_MEMORY);
    builtin_op!(r#const, "Const", Arity::Any, OpFlags::CONSTLIKE);
    builtin_op!(add, "Add", Arity::Binary, OpFlags::COMMUTATIVE);
    builtin_op!(sub, "Sub", Arity::Binary, OpFlags::NONE);
    builtin_op!(mul, "Mul", Arity::Binary, OpFlags::COMMUTATIVE);
    builtin_op!(and, "And", Arity::Binary, OpFlags::COMMUTATIVE);
    builtin_op!(or, "Or", Arity::Binary, OpFlags::COMMUTATIVE);
    builtin_op!(xor, "Xor", Arity::Binary, OpFlags::COMMUTATIVE);
    builtin_op!(cmp, "Cmp", Arity::Binary, OpFlags::NONE);
    builtin_op!(test, "Test", Arity::Binary, OpFlags::NONE);
    builtin_op!(
        load,
        "Load",
        Arity::Binary,
        OpFlags::FRAGILE | OpFlags::USES_MEMORY
    );
    builtin_op!(
        store,
        "Store",
        Arity::Variable,
        OpFlags::FRAGILE | OpFlags::USES_MEMORY
    );
    builtin_op!(
        call,
        "Call",
        Arity::Dynamic,
        OpFlags::FRAGILE | OpFlags::USES_MEMORY
    );
    builtin_op!(return_, "Return", Arity::Dynamic, OpFlags::CFOPCODE);
    builtin_op!(sync, "Sync", Arity::Dynamic, OpFlags::USES_MEMORY);
    builtin_op!(tuple, "Tuple", Arity::Dynamic, OpFlags::NONE);
    builtin_op!(no_mem, "NoMem", Arity::Any, OpFlags::CONSTLIKE);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let code = register("TestOpA", Arity::Binary, OpFlags::COMMUTATIVE, 0);
        assert_eq!(lookup("TestOpA"), Some(code));
        with_op(code, |op| {
            assert_eq!(op.name(), "TestOpA");
            assert_eq!(op.arity(), Arity::Binary);
            assert!(op.flags().contains(OpFlags::COMMUTATIVE));
        });
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn double_registration_panics() {
        register("TestOpDup", Arity::Unary, OpFlags::NONE, 0);
        register("TestOpDup", Arity::Unary, OpFlags::NONE, 0);
    }

    #[test]
    fn generic_slot_is_scoped() {
        fn dummy_handler(
            _graph: &mut crate::ir::graph::Graph,
            _node: crate::entity::NodeId,
        ) -> Option<crate::entity::NodeId> {
            None
        }

        let code = register("TestOpB", Arity::Unary, OpFlags::NONE, 0);
        with_op(code, |op| {
            assert!(op.generic().is_none());
            let prev = op.set_generic(Some(dummy_handler));
            assert!(prev.is_none());
            assert!(op.generic().is_some());
            op.set_generic(None);
            assert!(op.generic().is_none());
        });
    }

    #[test]
    fn flag_algebra() {
        let both = OpFlags::COMMUTATIVE | OpFlags::CONSTLIKE;
        assert!(both.contains(OpFlags::COMMUTATIVE));
        assert!(both.contains(OpFlags::CONSTLIKE));
        assert!(!both.contains(OpFlags::FRAGILE));
    }

    #[test]
    fn builtins_are_stable() {
        assert_eq!(builtin::add(), builtin::add());
        assert_ne!(builtin::add(), builtin::sub());
    }
}
