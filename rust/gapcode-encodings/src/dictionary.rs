//! The DINT dictionary: a fixed-capacity bijection between learned blocks of
//! delta values and 16-bit codewords.
//!
//! Codewords `0..6` are reserved (`0` for literal exceptions, `1..=5` for the
//! run tiers); learned entries start at codeword 6 and are assigned in
//! selection order, most valuable first. Once built the dictionary is
//! immutable and safe to share read-only across concurrent encoders and
//! decoders.

use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use ahash::AHashMap;
use gapcode_common::{Result, error::Error};
use log::{debug, warn};

use crate::config::{self, RESERVED, RUN_CODES};
use crate::stats::{self, Block};

const STRIDE: usize = config::MAX_ENTRY_SIZE + 1;

/// An immutable, built dictionary.
///
/// Decoding uses the codeword-indexed table ([`copy`](Dictionary::copy));
/// encoding additionally needs the content-keyed reverse map, populated by
/// [`prepare_for_encoding`](Dictionary::prepare_for_encoding).
pub struct Dictionary {
    /// `STRIDE` words per entry: the block length followed by its values.
    /// Reserved entries carry no payload.
    table: Vec<u32>,
    num_entries: usize,
    encode_map: AHashMap<Box<[u32]>, u16>,
}

impl Dictionary {
    /// A dictionary holding only the reserved codewords. Every input remains
    /// encodable through runs and exceptions.
    pub fn empty() -> Dictionary {
        Dictionary {
            table: vec![0; RESERVED * STRIDE],
            num_entries: RESERVED,
            encode_map: AHashMap::new(),
        }
    }

    /// Number of assigned codewords, reserved ones included.
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// Length of the longest learned block this dictionary can hold.
    pub fn entry_size(&self) -> usize {
        config::MAX_ENTRY_SIZE
    }

    /// The values of a learned entry, or `None` for reserved or unassigned
    /// codewords.
    pub fn entry(&self, codeword: u16) -> Option<&[u32]> {
        let index = codeword as usize;
        if index < RESERVED || index >= self.num_entries {
            return None;
        }
        let entry = &self.table[index * STRIDE..(index + 1) * STRIDE];
        Some(&entry[1..1 + entry[0] as usize])
    }

    /// Appends the block identified by `codeword` to `out` and returns the
    /// number of values written. Reserved and unassigned codewords are
    /// stream corruption as far as the decoder is concerned.
    pub fn copy(&self, codeword: u16, out: &mut Vec<u32>) -> Result<usize> {
        match self.entry(codeword) {
            Some(values) => {
                out.extend_from_slice(values);
                Ok(values.len())
            }
            None => Err(Error::corrupt_stream(format!(
                "codeword {codeword} is not a dictionary entry"
            ))),
        }
    }

    /// Builds the content → codeword map used by the encoder. The five run
    /// patterns are seeded first, so probing a window of all ones resolves to
    /// the reserved run codeword rather than missing. Idempotent.
    pub fn prepare_for_encoding(&mut self) {
        if !self.encode_map.is_empty() {
            return;
        }
        for &(code, len) in &RUN_CODES {
            self.encode_map
                .entry(vec![1u32; len].into_boxed_slice())
                .or_insert(code);
        }
        for index in RESERVED..self.num_entries {
            let entry = &self.table[index * STRIDE..(index + 1) * STRIDE];
            let values = &entry[1..1 + entry[0] as usize];
            self.encode_map
                .entry(values.to_vec().into_boxed_slice())
                .or_insert(index as u16);
        }
    }

    /// Finds the codeword whose block exactly matches `window`, if any.
    /// Requires [`prepare_for_encoding`](Dictionary::prepare_for_encoding)
    /// to have run; an unprepared dictionary matches nothing.
    pub fn lookup(&self, window: &[u32]) -> Option<u16> {
        self.encode_map.get(window).copied()
    }
}

/// Accumulates selected blocks in codeword order and freezes them into a
/// [`Dictionary`]. Can persist its contents to a side file and be restored
/// from one, skipping statistics collection and selection entirely.
pub struct DictionaryBuilder {
    total_integers: u64,
    blocks: Vec<Block>,
}

impl DictionaryBuilder {
    pub fn new(total_integers: u64) -> DictionaryBuilder {
        DictionaryBuilder {
            total_integers,
            blocks: Vec::new(),
        }
    }

    /// Number of learned entries the dictionary can hold.
    pub fn capacity() -> usize {
        config::NUM_ENTRIES - RESERVED
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn total_integers(&self) -> u64 {
        self.total_integers
    }

    /// Appends one block in rank order. Returns `false` once the capacity is
    /// reached; the block length must be a supported granularity.
    pub fn append(&mut self, data: &[u32], freq: u64) -> Result<bool> {
        if self.blocks.len() == Self::capacity() {
            return Ok(false);
        }
        if !config::TARGET_SIZES.contains(&data.len()) {
            return Err(Error::invalid_arg(
                "data",
                format!("unsupported block length {}", data.len()),
            ));
        }
        self.blocks.push(Block {
            data: data.to_vec(),
            freq,
        });
        Ok(true)
    }

    /// Freezes codeword assignment: entry `i` of the builder becomes codeword
    /// `RESERVED + i`.
    pub fn build(&self) -> Dictionary {
        let num_entries = RESERVED + self.blocks.len();
        let mut table = vec![0u32; num_entries * STRIDE];
        for (i, block) in self.blocks.iter().enumerate() {
            let offset = (RESERVED + i) * STRIDE;
            table[offset] = block.data.len() as u32;
            table[offset + 1..offset + 1 + block.data.len()].copy_from_slice(&block.data);
        }
        debug!("built dictionary with {} learned entries", self.blocks.len());
        Dictionary {
            table,
            num_entries,
            encode_map: AHashMap::new(),
        }
    }

    /// Restores a builder from a dictionary side file.
    pub fn load_from_file(path: &Path) -> Result<DictionaryBuilder> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        let mut reader = BufReader::new(file);
        let (total_integers, blocks) = stats::read_block_table(&mut reader, "dictionary")?;
        debug!(
            "loaded dictionary with {} learned entries from {}",
            blocks.len(),
            path.display()
        );
        Ok(DictionaryBuilder {
            total_integers,
            blocks,
        })
    }

    /// Stores the selected blocks in codeword order, returning `false`
    /// (after logging) when the file cannot be written.
    pub fn try_store_to_file(&self, path: &Path) -> bool {
        match self.store_to_file(path) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "cannot store dictionary to {}; will rebuild next run: {e}",
                    path.display()
                );
                false
            }
        }
    }

    fn store_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        let mut writer = BufWriter::new(file);
        stats::write_block_table(&mut writer, self.total_integers, &self.blocks)?;
        writer.flush()?;
        Ok(())
    }
}
