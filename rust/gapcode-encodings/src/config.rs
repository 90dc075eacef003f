//! Fixed format parameters and collector configuration.

use gapcode_common::{Result, error::Error};

/// Total number of codewords addressable by the 16-bit index space.
pub const NUM_ENTRIES: usize = 65536;

/// Codeword width in bits (`log2(NUM_ENTRIES)`).
pub const LOG2_NUM_ENTRIES: u32 = 16;

/// Largest block length a dictionary entry may have.
pub const MAX_ENTRY_SIZE: usize = 16;

/// Block granularities sampled by the statistics collector, largest first.
/// These are also the probe lengths tried by the encoder.
pub const TARGET_SIZES: [usize; 5] = [16, 8, 4, 2, 1];

/// Number of reserved codewords: one exception code plus five run tiers.
pub const RESERVED: usize = 6;

/// Codeword 0 marks a literal exception: the next 4 bytes carry one raw value.
pub const EXCEPTION_CODE: u16 = 0;

/// Reserved run codewords and the run length each one stands for.
pub const RUN_CODES: [(u16, usize); 5] = [(1, 256), (2, 128), (3, 64), (4, 32), (5, 16)];

/// Longest run a single codeword can cover.
pub const MAX_RUN_LENGTH: usize = 256;

/// Shortest run tier; shorter runs fall through to dictionary matching
/// unless they extend to the end of the sequence.
pub const MIN_RUN_LENGTH: usize = 16;

/// Sequences at or below this length are skipped by the statistics collector.
pub const DEFAULT_MIN_SEQUENCE_LEN: usize = 4096;

/// Selector context for block statistics. Only the single "maximum" context
/// is implemented; the enum is the seam for position-dependent dictionaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectorContext {
    #[default]
    Maximum,
}

impl SelectorContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorContext::Maximum => "max",
        }
    }

    /// Fails for any context other than the implemented one.
    pub fn verify_supported(&self) -> Result<()> {
        match self {
            SelectorContext::Maximum => Ok(()),
        }
    }
}

/// Configuration of the block statistics collector.
#[derive(Debug, Clone)]
pub struct StatsConfig {
    /// Sequences must be strictly longer than this to contribute blocks.
    pub min_sequence_len: usize,
    pub context: SelectorContext,
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            min_sequence_len: DEFAULT_MIN_SEQUENCE_LEN,
            context: SelectorContext::Maximum,
        }
    }
}

impl StatsConfig {
    pub fn with_min_sequence_len(mut self, min_sequence_len: usize) -> Self {
        self.min_sequence_len = min_sequence_len;
        self
    }

    pub fn with_context(mut self, context: SelectorContext) -> Self {
        self.context = context;
        self
    }
}

/// Expands a run codeword into its run length.
pub fn run_length(codeword: u16) -> Result<usize> {
    RUN_CODES
        .iter()
        .find(|&&(code, _)| code == codeword)
        .map(|&(_, len)| len)
        .ok_or_else(|| Error::corrupt_stream(format!("unknown run codeword {codeword}")))
}
