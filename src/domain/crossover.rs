//! Crossover detection between two comparable series.
//!
//! Every strategy variant reduces to "did `left - right` change sign at this
//! bar". A series value is `None` while its indicator is still warming up.
//!
//! Rules, for `CrossDirection::Above` (mirror for `Below`):
//! - fires at `i` when `left[i] - right[i] > 0` and the most recent non-zero
//!   difference before `i` was `< 0`, so a pass through exactly zero still
//!   counts once the difference leaves zero;
//! - the look-back stops at the first bar where either series is undefined;
//! - also fires when `i` is the first bar with both series defined and the
//!   difference is already `> 0`;
//! - a zero difference at `i` never fires, and neither does leaving a run of
//!   zeros that began the defined stretch.

use std::fmt;

/// Decision for a single bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Hold,
    Buy,
    Sell,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Hold => write!(f, "HOLD"),
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossDirection {
    /// `left` moves from below `right` to above it.
    Above,
    /// `left` moves from above `right` to below it.
    Below,
}

/// One side of a comparison: an indicator series or a fixed threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand<'a> {
    Series(&'a [Option<f64>]),
    Constant(f64),
}

impl Operand<'_> {
    fn at(&self, index: usize) -> Option<f64> {
        match self {
            Operand::Series(values) => values.get(index).copied().flatten(),
            Operand::Constant(c) => Some(*c),
        }
    }
}

/// A directional cross of `left` over `right`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossover<'a> {
    pub left: Operand<'a>,
    pub right: Operand<'a>,
    pub direction: CrossDirection,
}

impl<'a> Crossover<'a> {
    pub fn new(left: Operand<'a>, right: Operand<'a>, direction: CrossDirection) -> Self {
        Self {
            left,
            right,
            direction,
        }
    }

    fn difference(&self, index: usize) -> Option<f64> {
        Some(self.left.at(index)? - self.right.at(index)?)
    }

    /// Walk back from `index - 1` over the defined stretch and report the
    /// first non-zero difference found.
    fn prior(&self, index: usize) -> Prior {
        let mut flat = false;
        for i in (0..index).rev() {
            match self.difference(i) {
                None => break,
                Some(d) if d != 0.0 => return Prior::Signed(d),
                Some(_) => flat = true,
            }
        }
        if flat {
            Prior::Flat
        } else {
            Prior::Fresh
        }
    }

    /// Whether the cross fires at `index`. Only bars `<= index` are read.
    pub fn fires_at(&self, index: usize) -> bool {
        let Some(current) = self.difference(index) else {
            return false;
        };
        let sign = match self.direction {
            CrossDirection::Above => 1.0,
            CrossDirection::Below => -1.0,
        };
        if current * sign <= 0.0 {
            return false;
        }

        match self.prior(index) {
            Prior::Fresh => true,
            Prior::Flat => false,
            Prior::Signed(p) => p * sign < 0.0,
        }
    }
}

/// What precedes a bar within its defined stretch.
enum Prior {
    /// The bar opens the stretch.
    Fresh,
    /// Only zero differences since the stretch opened.
    Flat,
    Signed(f64),
}

/// Combine an entry and an exit cross into one decision.
///
/// Both firing on the same bar is ambiguous and resolves to Hold.
pub fn decide(entry: bool, exit: bool) -> Signal {
    match (entry, exit) {
        (true, false) => Signal::Buy,
        (false, true) => Signal::Sell,
        _ => Signal::Hold,
    }
}
