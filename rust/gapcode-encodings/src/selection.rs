//! Cost model and ranked selection of dictionary entries.
//!
//! A block of length `L` seen `F` times saves `F * (P*L - B)` bits when its
//! occurrences are replaced by one `B`-bit codeword, against an assumed
//! baseline of `P = 3B` bits per integer. The saving is normalized by the
//! corpus size so thresholds are comparable across corpora.

use gapcode_common::Result;
use log::info;

use crate::config;
use crate::dictionary::DictionaryBuilder;
use crate::stats::BlockStats;

/// Codeword width in bits (`B`).
pub const CODEWORD_BITS: f64 = config::LOG2_NUM_ENTRIES as f64;

/// Assumed bits-per-integer cost with no dictionary (`P`).
pub const INITIAL_BPI: f64 = 3.0 * CODEWORD_BITS;

/// Admission threshold used when flattening raw statistics.
pub const EPS: f64 = 0.0001;

fn cost(len: usize, freq: u64) -> f64 {
    freq as f64 * (INITIAL_BPI * len as f64 - CODEWORD_BITS)
}

/// Bits saved per corpus integer by admitting this block.
pub fn saving(len: usize, freq: u64, total_integers: u64) -> f64 {
    cost(len, freq) / total_integers as f64
}

/// Admission predicate over the computed saving.
#[derive(Debug, Clone, Copy)]
pub struct CostFilter {
    threshold: f64,
}

impl CostFilter {
    pub fn new(threshold: f64) -> CostFilter {
        CostFilter { threshold }
    }

    pub fn admits(&self, len: usize, freq: u64, total_integers: u64) -> bool {
        saving(len, freq, total_integers) > self.threshold
    }
}

impl Default for CostFilter {
    fn default() -> Self {
        CostFilter::new(EPS)
    }
}

/// Decreasing-static-frequencies selection: admits candidates in the rank
/// order produced by the statistics stage until the dictionary is full.
pub struct DsfSelection;

impl DsfSelection {
    /// Identity embedded in dictionary side-file names.
    pub fn identity() -> String {
        format!("dsf-{}-{}", config::NUM_ENTRIES, config::MAX_ENTRY_SIZE)
    }

    /// The filter handed to the statistics stage. Deliberately looser than
    /// [`EPS`] so the final selection sees more candidates than would be
    /// admitted by the persistence-stage threshold.
    pub fn filter() -> CostFilter {
        CostFilter::new(EPS / 1000.0)
    }

    /// Appends the ranked candidates to the dictionary builder, most valuable
    /// first, stopping once the learned-entry capacity is reached. Codeword
    /// assignment is a pure function of the sorted candidate list.
    pub fn build(stats: &BlockStats, builder: &mut DictionaryBuilder) -> Result<()> {
        info!(
            "building {} dictionary for {} integers",
            Self::identity(),
            stats.total_integers
        );
        for block in &stats.blocks {
            if !builder.append(&block.data, block.freq)? {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Block;

    #[test]
    fn test_saving_formula() {
        // One block of 16 integers seen once over 16 integers: replacing
        // 16 * 48 bits with a 16-bit codeword saves (768 - 16) / 16 bpi.
        let s = saving(16, 1, 16);
        assert!((s - 47.0).abs() < 1e-9);
    }

    #[test]
    fn test_filter_thresholds() {
        let filter = CostFilter::default();
        assert!(filter.admits(16, 1000, 100_000));
        assert!(!filter.admits(1, 1, u64::MAX / 2));
        // The selection filter admits strictly more than the default one.
        assert!(DsfSelection::filter().admits(2, 1, 500_000_000));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let stats = BlockStats {
            total_integers: 1000,
            blocks: vec![
                Block {
                    data: vec![1, 2, 1, 2],
                    freq: 40,
                },
                Block {
                    data: vec![7, 7],
                    freq: 40,
                },
                Block {
                    data: vec![3],
                    freq: 9,
                },
            ],
        };
        let build = || {
            let mut builder = DictionaryBuilder::new(stats.total_integers);
            DsfSelection::build(&stats, &mut builder).unwrap();
            builder.build()
        };
        let a = build();
        let b = build();
        for code in 0..a.num_entries() as u16 {
            assert_eq!(a.entry(code), b.entry(code));
        }
    }
}
