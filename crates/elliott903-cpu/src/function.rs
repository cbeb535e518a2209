//! The 16 function codes of the Elliott 903/920B instruction set.

/// A decoded 4-bit function code.
///
/// The hardware's function field is dense (0..=15 used exhaustively), so
/// decode is a total, infallible mapping rather than the sparse 256-entry
/// opcode tables a byte-oriented ISA needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// f=0: Load B — `Q := store[m]; store[B] := Q`.
    LoadB,
    /// f=1: Add — `A := A + store[m]`.
    Add,
    /// f=2: Negate and add — `Q := store[m]; A := Q - A`.
    NegateAndAdd,
    /// f=3: Store Q — `store[m] := Q >> 1`.
    StoreQ,
    /// f=4: Load A — `A := store[m]`.
    LoadA,
    /// f=5: Store A (guarded against the Initial Orders while in level 1).
    StoreA,
    /// f=6: Collate — `A := A AND store[m]`.
    Collate,
    /// f=7: Jump if zero.
    JumpIfZero,
    /// f=8: Jump.
    Jump,
    /// f=9: Jump if negative.
    JumpIfNegative,
    /// f=10: Count — `store[m] := store[m] + 1`.
    Count,
    /// f=11: Store S — split SCR into module/offset.
    StoreS,
    /// f=12: Multiply — signed 18x18 -> 36, placed in A:Q.
    Multiply,
    /// f=13: Divide — signed 36/18 -> 18 quotient.
    Divide,
    /// f=14: Shift (or unsupported I/O-14 in the reserved middle range).
    Shift,
    /// f=15: I/O — see [`crate::IoEvent`].
    Io,
}

impl From<u32> for Function {
    /// Decode a 4-bit function code (0..=15). The field is masked by the
    /// caller, so all 16 values are valid and this never fails.
    fn from(f: u32) -> Self {
        match f & 0xF {
            0 => Self::LoadB,
            1 => Self::Add,
            2 => Self::NegateAndAdd,
            3 => Self::StoreQ,
            4 => Self::LoadA,
            5 => Self::StoreA,
            6 => Self::Collate,
            7 => Self::JumpIfZero,
            8 => Self::Jump,
            9 => Self::JumpIfNegative,
            10 => Self::Count,
            11 => Self::StoreS,
            12 => Self::Multiply,
            13 => Self::Divide,
            14 => Self::Shift,
            _ => Self::Io,
        }
    }
}

impl Function {
    /// The numeric function code (0..=15) this variant decodes from.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::LoadB => 0,
            Self::Add => 1,
            Self::NegateAndAdd => 2,
            Self::StoreQ => 3,
            Self::LoadA => 4,
            Self::StoreA => 5,
            Self::Collate => 6,
            Self::JumpIfZero => 7,
            Self::Jump => 8,
            Self::JumpIfNegative => 9,
            Self::Count => 10,
            Self::StoreS => 11,
            Self::Multiply => 12,
            Self::Divide => 13,
            Self::Shift => 14,
            Self::Io => 15,
        }
    }
}
