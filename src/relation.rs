//! `ir_relation`: the comparison lattice returned by `TargetValue` comparison
//! and consumed by `Cmp`/`Cond`-family nodes.
//!
//! A relation is a 4-bit set over `{false, equal, less, greater, unordered}`;
//! all the named relations (`<=`, `>=`, `!=`, ...) are bitwise unions of
//! those four. The algebra (`negated`, `inversed`) must hold exactly for all
//! sixteen values (property P6).

use core::ops::{BitAnd, BitOr, BitXor, Not};

/// A bitset of the four primitive comparison outcomes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Relation(u8);

impl Relation {
    /// Always false.
    pub const FALSE: Relation = Relation(0);
    /// Operands compare equal.
    pub const EQUAL: Relation = Relation(1 << 0);
    /// Left operand is less than right.
    pub const LESS: Relation = Relation(1 << 1);
    /// Left operand is greater than right.
    pub const GREATER: Relation = Relation(1 << 2);
    /// Operands are unordered (one or both is NaN).
    pub const UNORDERED: Relation = Relation(1 << 3);

    /// `less` or `equal`.
    pub const LESS_EQUAL: Relation = Relation(Self::EQUAL.0 | Self::LESS.0);
    /// `greater` or `equal`.
    pub const GREATER_EQUAL: Relation = Relation(Self::EQUAL.0 | Self::GREATER.0);
    /// `less` or `greater` ("not equal" for integers).
    pub const LESS_GREATER: Relation = Relation(Self::LESS.0 | Self::GREATER.0);
    /// `less`, `equal` or `greater` ("not unordered").
    pub const LESS_EQUAL_GREATER: Relation =
        Relation(Self::EQUAL.0 | Self::LESS.0 | Self::GREATER.0);
    /// `unordered` or `equal`.
    pub const UNORDERED_EQUAL: Relation = Relation(Self::UNORDERED.0 | Self::EQUAL.0);
    /// `unordered` or `less`.
    pub const UNORDERED_LESS: Relation = Relation(Self::UNORDERED.0 | Self::LESS.0);
    /// `unordered`, `less` or `equal`.
    pub const UNORDERED_LESS_EQUAL: Relation =
        Relation(Self::UNORDERED.0 | Self::LESS.0 | Self::EQUAL.0);
    /// `unordered` or `greater`.
    pub const UNORDERED_GREATER: Relation = Relation(Self::UNORDERED.0 | Self::GREATER.0);
    /// `unordered`, `greater` or `equal`.
    pub const UNORDERED_GREATER_EQUAL: Relation =
        Relation(Self::UNORDERED.0 | Self::GREATER.0 | Self::EQUAL.0);
    /// `unordered`, `less` or `greater` ("not equal" for floats).
    pub const UNORDERED_LESS_GREATER: Relation =
        Relation(Self::UNORDERED.0 | Self::LESS.0 | Self::GREATER.0);
    /// Always true.
    pub const TRUE: Relation =
        Relation(Self::EQUAL.0 | Self::LESS.0 | Self::GREATER.0 | Self::UNORDERED.0);

    /// Does this relation set contain `other` entirely?
    pub fn contains(self, other: Relation) -> bool {
        self.0 & other.0 == other.0
    }

    /// Is this relation set empty (never holds)?
    pub fn is_false(self) -> bool {
        self.0 == 0
    }

    /// The logical negation: `r XOR true`.
    pub fn negated(self) -> Relation {
        self ^ Relation::TRUE
    }

    /// Swap `less` and `greater`, keep `equal` and `unordered` as-is.
    ///
    /// This is the relation that holds between `(b, a)` given that `self`
    /// holds between `(a, b)`.
    pub fn inversed(self) -> Relation {
        let mut bits = self.0 & (Relation::EQUAL.0 | Relation::UNORDERED.0);
        if self.0 & Relation::LESS.0 != 0 {
            bits |= Relation::GREATER.0;
        }
        if self.0 & Relation::GREATER.0 != 0 {
            bits |= Relation::LESS.0;
        }
        Relation(bits)
    }

    /// All sixteen relation values, in bit-pattern order, for exhaustive
    /// property tests.
    pub fn all() -> [Relation; 16] {
        let mut out = [Relation::FALSE; 16];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = Relation(i as u8);
        }
        out
    }
}

impl BitOr for Relation {
    type Output = Relation;
    fn bitor(self, rhs: Relation) -> Relation {
        Relation(self.0 | rhs.0)
    }
}

impl BitAnd for Relation {
    type Output = Relation;
    fn bitand(self, rhs: Relation) -> Relation {
        Relation(self.0 & rhs.0)
    }
}

impl BitXor for Relation {
    type Output = Relation;
    fn bitxor(self, rhs: Relation) -> Relation {
        Relation(self.0 ^ rhs.0)
    }
}

impl Not for Relation {
    type Output = Relation;
    fn not(self) -> Relation {
        Relation(!self.0) & Relation::TRUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p6_negated_involution() {
        for r in Relation::all() {
            assert_eq!(r.negated().negated(), r);
        }
    }

    #[test]
    fn p6_inversed_involution() {
        for r in Relation::all() {
            assert_eq!(r.inversed().inversed(), r);
        }
    }

    #[test]
    fn p6_and_identities() {
        for r in Relation::all() {
            assert_eq!(r & Relation::TRUE, r);
            assert_eq!(r & Relation::FALSE, Relation::FALSE);
        }
    }

    #[test]
    fn negated_examples() {
        assert_eq!(Relation::EQUAL.negated(), Relation::LESS_GREATER | Relation::UNORDERED);
        assert_eq!(Relation::TRUE.negated(), Relation::FALSE);
    }

    #[test]
    fn inversed_examples() {
        assert_eq!(Relation::LESS.inversed(), Relation::GREATER);
        assert_eq!(Relation::LESS_EQUAL.inversed(), Relation::GREATER_EQUAL);
        assert_eq!(Relation::UNORDERED.inversed(), Relation::UNORDERED);
        assert_eq!(Relation::EQUAL.inversed(), Relation::EQUAL);
    }
}
