//! Width-bounded signal values.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ============================================================================
// BitWidth
// ============================================================================

/// Number of bits a signal carries, 1..=32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BitWidth(u8);

impl BitWidth {
    pub const MAX_BITS: u32 = 32;

    /// Single-bit width used by control lines (clock, reset, enable).
    pub const ONE: BitWidth = BitWidth(1);

    pub fn new(bits: u32) -> Result<Self> {
        if (1..=Self::MAX_BITS).contains(&bits) {
            Ok(BitWidth(bits as u8))
        } else {
            Err(Error::InvalidBitWidth(bits))
        }
    }

    pub fn bits(self) -> u32 {
        self.0 as u32
    }

    /// `2^bits - 1`
    pub fn mask(self) -> u32 {
        if self.bits() == Self::MAX_BITS {
            u32::MAX
        } else {
            (1u32 << self.bits()) - 1
        }
    }

    /// Truncate a raw value to this width.
    pub fn apply(self, raw: u32) -> u32 {
        raw & self.mask()
    }
}

impl Default for BitWidth {
    fn default() -> Self {
        BitWidth::ONE
    }
}

impl TryFrom<u32> for BitWidth {
    type Error = Error;

    fn try_from(bits: u32) -> Result<Self> {
        BitWidth::new(bits)
    }
}

impl From<BitWidth> for u32 {
    fn from(width: BitWidth) -> u32 {
        width.bits()
    }
}

impl fmt::Display for BitWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Signal
// ============================================================================

/// The value on a node: a masked unsigned integer, or unknown (floating /
/// never driven).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum Signal {
    #[default]
    Unknown,
    Value(u32),
}

impl Signal {
    /// Build a known signal already truncated to `width`.
    pub fn masked(raw: u32, width: BitWidth) -> Self {
        Signal::Value(width.apply(raw))
    }

    /// Re-mask this signal to `width`. Unknown stays unknown.
    pub fn mask_to(self, width: BitWidth) -> Self {
        match self {
            Signal::Unknown => Signal::Unknown,
            Signal::Value(v) => Signal::Value(width.apply(v)),
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, Signal::Value(_))
    }

    pub fn as_u32(self) -> Option<u32> {
        match self {
            Signal::Unknown => None,
            Signal::Value(v) => Some(v),
        }
    }

    /// True only for a known value equal to 1. Unknown is never high.
    pub fn is_high(self) -> bool {
        self == Signal::Value(1)
    }
}

impl From<u32> for Signal {
    fn from(v: u32) -> Self {
        Signal::Value(v)
    }
}

impl From<Option<u32>> for Signal {
    fn from(v: Option<u32>) -> Self {
        v.map(Signal::Value).unwrap_or(Signal::Unknown)
    }
}

impl From<Signal> for Option<u32> {
    fn from(s: Signal) -> Self {
        s.as_u32()
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Unknown => write!(f, "x"),
            Signal::Value(v) => write!(f, "{v}"),
        }
    }
}

// ============================================================================
// SignalCell: value + width in one atomic word
// ============================================================================

// Layout of the packed word:
//   bits  0..32  value
//   bit   32     known flag
//   bits 40..46  width
const VALUE_MASK: u64 = 0xFFFF_FFFF;
const KNOWN_BIT: u64 = 1 << 32;
const WIDTH_SHIFT: u32 = 40;

fn pack(signal: Signal, width: BitWidth) -> u64 {
    let width_bits = (width.bits() as u64) << WIDTH_SHIFT;
    match signal.mask_to(width) {
        Signal::Unknown => width_bits,
        Signal::Value(v) => width_bits | KNOWN_BIT | v as u64,
    }
}

fn unpack(word: u64) -> (Signal, BitWidth) {
    let width = BitWidth(((word >> WIDTH_SHIFT) & 0x3F) as u8);
    let signal = if word & KNOWN_BIT != 0 {
        Signal::Value((word & VALUE_MASK) as u32)
    } else {
        Signal::Unknown
    };
    (signal, width)
}

/// Storage for a node's value and width.
///
/// Both live in a single `AtomicU64`, so a write is always a whole-value
/// replacement and a width change re-masks the stored value in the same
/// compare-and-swap. A concurrent reader sees either the old word or the
/// new one, never a mix, and never a value wider than the width stored
/// alongside it.
#[derive(Debug)]
pub struct SignalCell {
    packed: AtomicU64,
}

impl SignalCell {
    pub fn new(width: BitWidth) -> Self {
        Self { packed: AtomicU64::new(pack(Signal::Unknown, width)) }
    }

    pub fn load(&self) -> Signal {
        self.snapshot().0
    }

    pub fn width(&self) -> BitWidth {
        self.snapshot().1
    }

    /// Value and width read together.
    pub fn snapshot(&self) -> (Signal, BitWidth) {
        unpack(self.packed.load(Ordering::Acquire))
    }

    /// Replace the value, masked to whatever width is current at the
    /// instant of the swap. Returns the value actually stored.
    pub fn store(&self, signal: Signal) -> Signal {
        let prev = self.update(|_, width| (signal, width));
        signal.mask_to(unpack(prev).1)
    }

    /// Change the width and re-mask the stored value in one step.
    /// Returns the re-masked value.
    pub fn set_width(&self, width: BitWidth) -> Signal {
        let prev = self.update(|current, _| (current, width));
        unpack(prev).0.mask_to(width)
    }

    fn update(&self, f: impl Fn(Signal, BitWidth) -> (Signal, BitWidth)) -> u64 {
        let result = self.packed.fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
            let (signal, width) = unpack(word);
            let (next_signal, next_width) = f(signal, width);
            Some(pack(next_signal, next_width))
        });
        match result {
            Ok(prev) | Err(prev) => prev,
        }
    }
}
