//! Dictionary-based compression of posting list integer sequences.
//!
//! The crate implements the DINT scheme: a corpus scan collects frequent
//! fixed-size blocks of delta values ([`stats`]), a cost model ranks and
//! selects the most profitable ones ([`selection`]), and the resulting
//! [`dictionary::Dictionary`] lets the codec ([`dint`]) replace whole blocks
//! of integers with single 16-bit codewords. Runs of gap-1 deltas and literal
//! exceptions are handled by reserved codewords, so every sequence remains
//! representable even with an empty dictionary.

pub mod config;
pub mod dictionary;
pub mod dint;
pub mod gaps;
pub mod selection;
pub mod stats;
