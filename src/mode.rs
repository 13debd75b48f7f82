//! Modes: the typing lattice for SSA values (§3, §4.1).
//!
//! A `Mode` is an interned, process-wide handle — two modes constructed with
//! identical defining parameters compare equal by identity (P5), mirroring
//! how `cranelift-codegen`'s own `ir::Type` is a small `Copy` handle shared
//! across every function in a `Program`. Unlike Cranelift's fixed type set,
//! this IR's frontends can register additional integer/float/reference modes
//! at runtime, so the registry is a lazily-initialised, mutex-guarded table
//! (`once_cell::sync::Lazy<Mutex<...>>`) rather than a compile-time enum —
//! the idiom this project family uses elsewhere for process-wide singletons.

use crate::error::{FirmError, FirmResult};
use once_cell::sync::Lazy;
use std::sync::Mutex;

/// The broad category of values a mode describes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Sort {
    /// Modes with no arithmetic of their own (e.g. used for grouping).
    Auxiliary,
    /// A single-bit internal boolean, not a target-visible integer.
    InternalBoolean,
    /// A fixed-width integer.
    Integer,
    /// A pointer/reference value.
    Reference,
    /// A floating-point value.
    Float,
    /// The single-threaded memory value.
    Memory,
    /// The execution/control-flow token produced by control nodes.
    Execution,
    /// The mode of Block nodes.
    Block,
    /// The mode of tuple-producing nodes (before projection).
    Tuple,
    /// The universal "any" mode used by polymorphic nodes (e.g. `Bad`).
    Any,
    /// The mode of the distinguished `Bad` node.
    BadSort,
}

/// How a mode's values are represented and computed over.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Arithmetic {
    /// No representation is specified (auxiliary/internal-boolean sorts).
    None,
    /// Two's-complement integer arithmetic.
    TwosComplement,
    /// IEEE-754 binary floating point.
    Ieee754,
    /// x86 80-bit extended-precision floating point.
    X86ExtendedFloat,
}

/// An interned mode handle.
///
/// `Mode` is `Copy` and compares by identity (the interned slot index);
/// [`Sort`]/[`Arithmetic`] parameters that look equal always resolve to the
/// same handle (P5), so this never needs to be wrapped in an `Rc`.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Mode(u32);

/// The interned data behind a [`Mode`] handle.
#[derive(Clone, Debug)]
struct ModeData {
    name: String,
    sort: Sort,
    bits: u32,
    signed: bool,
    arithmetic: Arithmetic,
    modulo_shift: u32,
    exponent_bits: u32,
    mantissa_bits: u32,
    /// The paired signed/unsigned integer mode, for reference modes whose
    /// frontend has set up an integer lowering.
    signed_pair: Option<Mode>,
    unsigned_pair: Option<Mode>,
}

struct ModeTable {
    modes: Vec<ModeData>,
}

impl ModeTable {
    fn find(&self, data: &ModeData) -> Option<Mode> {
        self.modes.iter().position(|m| modes_equal_params(m, data))
            .map(|i| Mode(i as u32))
    }

    fn intern(&mut self, data: ModeData) -> Mode {
        if let Some(existing) = self.find(&data) {
            return existing;
        }
        let id = Mode(self.modes.len() as u32);
        self.modes.push(data);
        id
    }
}

fn modes_equal_params(a: &ModeData, b: &ModeData) -> bool {
    a.name == b.name
        && a.sort == b.sort
        && a.bits == b.bits
        && a.signed == b.signed
        && a.arithmetic == b.arithmetic
        && a.modulo_shift == b.modulo_shift
        && a.exponent_bits == b.exponent_bits
        && a.mantissa_bits == b.mantissa_bits
}

static TABLE: Lazy<Mutex<ModeTable>> = Lazy::new(|| Mutex::new(ModeTable { modes: Vec::new() }));

macro_rules! builtin_int {
    ($name:ident, $label:expr, $bits:expr, $signed:expr) => {
        pub fn $name() -> Mode {
            static CELL: Lazy<Mode> = Lazy::new(|| {
                new_int_mode($label, Arithmetic::TwosComplement, $bits, $signed, $bits)
            });
            *CELL
        }
    };
}

impl Mode {
    fn data(self) -> ModeData {
        TABLE.lock().unwrap().modes[self.0 as usize].clone()
    }

    /// The mode's registered name.
    pub fn name(self) -> String {
        self.data().name
    }

    /// The broad category this mode belongs to.
    pub fn sort(self) -> Sort {
        self.data().sort
    }

    /// Size of values of this mode, in bits.
    pub fn size_bits(self) -> u32 {
        self.data().bits
    }

    /// Size of values of this mode, in bytes, if evenly divisible by 8.
    pub fn size_bytes(self) -> Option<u32> {
        let bits = self.size_bits();
        if bits % 8 == 0 {
            Some(bits / 8)
        } else {
            None
        }
    }

    /// Is this mode signed?
    pub fn is_signed(self) -> bool {
        self.data().signed
    }

    /// This mode's arithmetic discipline.
    pub fn arithmetic(self) -> Arithmetic {
        self.data().arithmetic
    }

    /// The modulo-shift bit count (only meaningful for integer modes).
    pub fn modulo_shift(self) -> u32 {
        self.data().modulo_shift
    }

    /// Exponent width in bits (only meaningful for float modes).
    pub fn exponent_bits(self) -> u32 {
        self.data().exponent_bits
    }

    /// Mantissa width in bits (only meaningful for float modes).
    pub fn mantissa_bits(self) -> u32 {
        self.data().mantissa_bits
    }

    /// Is this an integer-sorted mode?
    pub fn is_int(self) -> bool {
        self.sort() == Sort::Integer
    }

    /// Is this a float-sorted mode?
    pub fn is_float(self) -> bool {
        self.sort() == Sort::Float
    }

    /// Is this a reference-sorted mode?
    pub fn is_reference(self) -> bool {
        self.sort() == Sort::Reference
    }

    /// Sets this reference mode's paired signed/unsigned integer modes.
    ///
    /// Used by lowerings that turn pointers into integers.
    pub fn set_int_pairs(self, signed: Mode, unsigned: Mode) {
        let mut table = TABLE.lock().unwrap();
        let data = &mut table.modes[self.0 as usize];
        data.signed_pair = Some(signed);
        data.unsigned_pair = Some(unsigned);
    }

    /// This mode's signed integer counterpart, if one was registered.
    pub fn find_signed_mode(self) -> FirmResult<Mode> {
        self.data().signed_pair.ok_or_else(|| FirmError::NoModePairing {
            name: self.name(),
            counterpart: "signed",
        })
    }

    /// This mode's unsigned integer counterpart, if one was registered.
    pub fn find_unsigned_mode(self) -> FirmResult<Mode> {
        self.data().unsigned_pair.ok_or_else(|| FirmError::NoModePairing {
            name: self.name(),
            counterpart: "unsigned",
        })
    }

    /// True iff every value representable in `self` is representable in
    /// `larger` without loss, under `larger`'s arithmetic.
    ///
    /// Integer modes only widen into same-signedness integer modes of equal
    /// or greater bit width; float modes only widen into float modes whose
    /// mantissa and exponent are both at least as wide.
    pub fn smaller_mode(self, larger: Mode) -> bool {
        let a = self.data();
        let b = larger.data();
        match (a.sort, b.sort) {
            (Sort::Integer, Sort::Integer) => a.signed == b.signed && a.bits <= b.bits,
            (Sort::Float, Sort::Float) => {
                a.exponent_bits <= b.exponent_bits && a.mantissa_bits <= b.mantissa_bits
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Interns (or looks up) an integer mode.
///
/// `modulo_shift` is ignored for non-integer modes; here it is always an
/// integer mode, so it is stored verbatim.
pub fn new_int_mode(
    name: &str,
    arithmetic: Arithmetic,
    bits: u32,
    signed: bool,
    modulo_shift: u32,
) -> Mode {
    let data = ModeData {
        name: name.to_string(),
        sort: Sort::Integer,
        bits,
        signed,
        arithmetic,
        modulo_shift,
        exponent_bits: 0,
        mantissa_bits: 0,
        signed_pair: None,
        unsigned_pair: None,
    };
    TABLE.lock().unwrap().intern(data)
}

/// Interns (or looks up) a reference mode. Reference modes are always
/// unsigned.
pub fn new_reference_mode(
    name: &str,
    arithmetic: Arithmetic,
    bits: u32,
    modulo_shift: u32,
) -> Mode {
    let data = ModeData {
        name: name.to_string(),
        sort: Sort::Reference,
        bits,
        signed: false,
        arithmetic,
        modulo_shift,
        exponent_bits: 0,
        mantissa_bits: 0,
        signed_pair: None,
        unsigned_pair: None,
    };
    TABLE.lock().unwrap().intern(data)
}

/// Interns (or looks up) an IEEE-754-style float mode. Float modes are
/// always signed and have no modulo shift.
pub fn new_float_mode(
    name: &str,
    arithmetic: Arithmetic,
    exponent_bits: u32,
    mantissa_bits: u32,
) -> Mode {
    let data = ModeData {
        name: name.to_string(),
        sort: Sort::Float,
        bits: 1 + exponent_bits + mantissa_bits,
        signed: true,
        arithmetic,
        modulo_shift: 0,
        exponent_bits,
        mantissa_bits,
        signed_pair: None,
        unsigned_pair: None,
    };
    TABLE.lock().unwrap().intern(data)
}

fn new_simple_mode(name: &str, sort: Sort, bits: u32) -> Mode {
    let data = ModeData {
        name: name.to_string(),
        sort,
        bits,
        signed: false,
        arithmetic: Arithmetic::None,
        modulo_shift: 0,
        exponent_bits: 0,
        mantissa_bits: 0,
        signed_pair: None,
        unsigned_pair: None,
    };
    TABLE.lock().unwrap().intern(data)
}

builtin_int!(u8_mode, "Bu8", 8, false);
builtin_int!(s8_mode, "Bs8", 8, true);
builtin_int!(u16_mode, "Hu16", 16, false);
builtin_int!(s16_mode, "Hs16", 16, true);
builtin_int!(u32_mode, "Iu32", 32, false);
builtin_int!(s32_mode, "Is32", 32, true);
builtin_int!(u64_mode, "Lu64", 64, false);
builtin_int!(s64_mode, "Ls64", 64, true);
builtin_int!(u128_mode, "LLu128", 128, false);
builtin_int!(s128_mode, "LLs128", 128, true);

/// IEEE-754 binary32 (single precision).
pub fn binary32() -> Mode {
    static CELL: Lazy<Mode> = Lazy::new(|| new_float_mode("F", Arithmetic::Ieee754, 8, 23));
    *CELL
}

/// IEEE-754 binary64 (double precision).
pub fn binary64() -> Mode {
    static CELL: Lazy<Mode> = Lazy::new(|| new_float_mode("D", Arithmetic::Ieee754, 11, 52));
    *CELL
}

/// IEEE-754 binary128 (quadruple precision).
pub fn binary128() -> Mode {
    static CELL: Lazy<Mode> = Lazy::new(|| new_float_mode("Q", Arithmetic::Ieee754, 15, 112));
    *CELL
}

/// Host pointer mode (unsigned reference, word-sized).
pub fn pointer() -> Mode {
    static CELL: Lazy<Mode> =
        Lazy::new(|| new_reference_mode("P", Arithmetic::TwosComplement, 64, 64));
    *CELL
}

/// The single-threaded memory mode.
pub fn memory() -> Mode {
    static CELL: Lazy<Mode> = Lazy::new(|| new_simple_mode("M", Sort::Memory, 0));
    *CELL
}

/// The control-flow execution-token mode.
pub fn execution() -> Mode {
    static CELL: Lazy<Mode> = Lazy::new(|| new_simple_mode("X", Sort::Execution, 0));
    *CELL
}

/// The mode of Block nodes.
pub fn block() -> Mode {
    static CELL: Lazy<Mode> = Lazy::new(|| new_simple_mode("BB", Sort::Block, 0));
    *CELL
}

/// The mode of tuple-valued nodes, before projection.
pub fn tuple() -> Mode {
    static CELL: Lazy<Mode> = Lazy::new(|| new_simple_mode("T", Sort::Tuple, 0));
    *CELL
}

/// The universal "any" mode.
pub fn any() -> Mode {
    static CELL: Lazy<Mode> = Lazy::new(|| new_simple_mode("ANY", Sort::Any, 0));
    *CELL
}

/// The mode of the distinguished `Bad` node.
pub fn bad() -> Mode {
    static CELL: Lazy<Mode> = Lazy::new(|| new_simple_mode("BAD", Sort::BadSort, 0));
    *CELL
}

/// The single-bit internal boolean mode, used by some comparison lowerings.
pub fn internal_boolean() -> Mode {
    static CELL: Lazy<Mode> = Lazy::new(|| new_simple_mode("b", Sort::InternalBoolean, 1));
    *CELL
}

#[cfg(test)]
mod tests {
    use super::*;

    // S1 — Interning.
    #[test]
    fn s1_interning() {
        let a = new_int_mode("u32_test", Arithmetic::TwosComplement, 32, false, 32);
        let b = new_int_mode("u32_test", Arithmetic::TwosComplement, 32, false, 32);
        assert_eq!(a, b);
        assert_eq!(a.size_bits(), 32);
        assert!(!a.is_signed());

        let u64_test = new_int_mode("u64_test", Arithmetic::TwosComplement, 64, false, 64);
        let s32_test = new_int_mode("s32_test", Arithmetic::TwosComplement, 32, true, 32);
        assert!(a.smaller_mode(u64_test));
        assert!(!a.smaller_mode(s32_test));
    }

    #[test]
    fn builtins_are_stable_handles() {
        assert_eq!(u32_mode(), u32_mode());
        assert_ne!(u32_mode(), s32_mode());
        assert!(u8_mode().smaller_mode(u32_mode()));
        assert!(!s8_mode().smaller_mode(u32_mode()));
    }

    #[test]
    fn float_mode_layout() {
        let f = binary32();
        assert_eq!(f.exponent_bits(), 8);
        assert_eq!(f.mantissa_bits(), 23);
        assert_eq!(f.size_bits(), 32);
        assert!(f.is_signed());
    }

    #[test]
    fn pairing_roundtrip() {
        let r = new_reference_mode("ref_test", Arithmetic::TwosComplement, 64, 64);
        let s = new_int_mode("ref_test_s", Arithmetic::TwosComplement, 64, true, 64);
        let u = new_int_mode("ref_test_u", Arithmetic::TwosComplement, 64, false, 64);
        assert!(r.find_signed_mode().is_err());
        r.set_int_pairs(s, u);
        assert_eq!(r.find_signed_mode().unwrap(), s);
        assert_eq!(r.find_unsigned_mode().unwrap(), u);
    }
}
