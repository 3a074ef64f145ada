//! The cells which make up the tape.
//!
//! The machine is generic over its cell type, so the same dispatch loop is
//! monomorphized once per width instead of being written three times.
use core::fmt;
use serde_derive::{Deserialize, Serialize};

/// A single fixed-width unit of the tape.
pub trait Cell: Copy + Default + PartialEq + fmt::Debug + Send + 'static {
    /// The width of the cell in bits.
    const BITS: u32;

    fn zero() -> Self {
        Self::default()
    }

    fn is_zero(self) -> bool {
        self == Self::zero()
    }

    /// Add a delta with this width's overflow behavior.
    fn wrapping_add(self, delta: i32) -> Self;

    /// The cell's bits read as an unsigned number, used as a code point for output.
    fn to_unsigned(self) -> u32;

    /// Store a character code read from input, truncated to the cell's width.
    fn from_code(code: u32) -> Self;
}

impl Cell for u8 {
    const BITS: u32 = 8;

    fn wrapping_add(self, delta: i32) -> Self {
        u8::wrapping_add(self, delta as u8)
    }

    fn to_unsigned(self) -> u32 {
        self as u32
    }

    fn from_code(code: u32) -> Self {
        code as u8
    }
}

impl Cell for u16 {
    const BITS: u32 = 16;

    fn wrapping_add(self, delta: i32) -> Self {
        u16::wrapping_add(self, delta as u16)
    }

    fn to_unsigned(self) -> u32 {
        self as u32
    }

    fn from_code(code: u32) -> Self {
        code as u16
    }
}

/// 32-bit cells are plain signed integers: `0 - 1` is `-1`, not `u32::MAX`.
impl Cell for i32 {
    const BITS: u32 = 32;

    fn wrapping_add(self, delta: i32) -> Self {
        i32::wrapping_add(self, delta)
    }

    fn to_unsigned(self) -> u32 {
        self as u32
    }

    fn from_code(code: u32) -> Self {
        code as i32
    }
}

/// The cell widths a machine can be configured with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellWidth {
    #[default]
    Eight,
    Sixteen,
    ThirtyTwo,
}

impl CellWidth {
    pub fn bits(&self) -> u32 {
        match self {
            Self::Eight => <u8 as Cell>::BITS,
            Self::Sixteen => <u16 as Cell>::BITS,
            Self::ThirtyTwo => <i32 as Cell>::BITS,
        }
    }
}

impl fmt::Display for CellWidth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}
