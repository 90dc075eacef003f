//! Block statistics collector: samples candidate dictionary entries from a
//! corpus of posting list sequences.
//!
//! Each sequence longer than the configured cutoff is delta-transformed and
//! chopped into non-overlapping blocks at every supported granularity
//! (16, 8, 4, 2, 1 values). A frequency counter keyed by exact block content
//! accumulates how often each block occurs across the corpus. After the scan
//! the raw table is filtered by the caller-supplied admission predicate
//! (singleton blocks always survive, so every observed value stays
//! representable without the exception path) and sorted by decreasing
//! `(frequency, length)`.
//!
//! The flattened table can be persisted to a side file and reloaded verbatim,
//! skipping the corpus scan on subsequent builds.

use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ahash::AHashMap;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use gapcode_common::{Result, error::Error, verify_data};
use log::{debug, info, warn};

use crate::config::{self, StatsConfig, TARGET_SIZES};
use crate::gaps::{self, SequenceKind};
use crate::selection::CostFilter;

/// A candidate dictionary entry: a fixed-length tuple of delta values plus
/// its observed occurrence count. Immutable once captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub data: Vec<u32>,
    pub freq: u64,
}

/// The flattened result of a corpus scan: candidate blocks ranked by
/// decreasing `(frequency, length)`.
#[derive(Debug)]
pub struct BlockStats {
    /// Total number of integers contributed by sequences that passed the
    /// minimum-length cutoff.
    pub total_integers: u64,
    pub blocks: Vec<Block>,
}

impl BlockStats {
    /// Identity of this collector, embedded in side-file names so that
    /// differently configured scans never share a cached artifact.
    pub fn identity(config: &StatsConfig) -> String {
        format!(
            "block-stats-{}-{}",
            config::MAX_ENTRY_SIZE,
            config.context.as_str()
        )
    }

    /// Deterministic side-file path for a named source list.
    pub fn side_file_path(
        dir: &Path,
        name: &str,
        kind: SequenceKind,
        config: &StatsConfig,
    ) -> PathBuf {
        dir.join(format!(
            "{}.{}.{}",
            name,
            kind.extension(),
            Self::identity(config)
        ))
    }

    /// Loads the statistics from the side file when it exists, otherwise
    /// scans the corpus and stores the result best-effort (a failed store
    /// logs a warning and the run continues).
    pub fn create_or_load<'a, I>(
        dir: &Path,
        name: &str,
        kind: SequenceKind,
        config: &StatsConfig,
        filter: &CostFilter,
        sequences: I,
    ) -> Result<BlockStats>
    where
        I: IntoIterator<Item = &'a [u32]>,
    {
        let path = Self::side_file_path(dir, name, kind, config);
        if path.exists() {
            debug!("reusing block statistics from {}", path.display());
            return Self::load_from_file(&path);
        }
        let stats = Self::from_sequences(sequences, kind, config, filter)?;
        stats.try_store_to_file(&path);
        Ok(stats)
    }

    /// Scans a corpus of raw sequences and produces the ranked candidate
    /// table. Document-id sequences are delta-transformed first.
    pub fn from_sequences<'a, I>(
        sequences: I,
        kind: SequenceKind,
        config: &StatsConfig,
        filter: &CostFilter,
    ) -> Result<BlockStats>
    where
        I: IntoIterator<Item = &'a [u32]>,
    {
        config.context.verify_supported()?;
        info!(
            "collecting block statistics ({})",
            Self::identity(config)
        );

        let mut block_map: AHashMap<Box<[u32]>, u64> = AHashMap::new();
        let mut total_integers = 0u64;
        let mut buf = Vec::new();
        for list in sequences {
            if list.len() <= config.min_sequence_len {
                continue;
            }
            total_integers += list.len() as u64;
            buf.clear();
            gaps::to_deltas(list, kind, &mut buf);
            collect(&buf, &mut block_map);
        }

        let mut num_singletons = 0u64;
        let mut blocks = Vec::with_capacity(block_map.len());
        for (data, freq) in block_map {
            if data.len() == 1 {
                num_singletons += 1;
            }
            // Singletons are always retained so that every observed value
            // remains representable through the dictionary.
            if data.len() == 1 || filter.admits(data.len(), freq, total_integers) {
                blocks.push(Block {
                    data: data.into_vec(),
                    freq,
                });
            }
        }
        sort_by_rank(&mut blocks);
        debug!(
            "selected {} candidate blocks ({} singletons) over {} integers",
            blocks.len(),
            num_singletons,
            total_integers
        );

        Ok(BlockStats {
            total_integers,
            blocks,
        })
    }

    /// Reads a previously stored table. At most [`config::NUM_ENTRIES`]
    /// records are loaded back regardless of the stored count.
    pub fn load_from_file(path: &Path) -> Result<BlockStats> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        let mut reader = BufReader::new(file);
        let (total_integers, blocks) = read_block_table(&mut reader, "block statistics")?;
        debug!(
            "loaded {} candidate blocks over {} integers from {}",
            blocks.len(),
            total_integers,
            path.display()
        );
        Ok(BlockStats {
            total_integers,
            blocks,
        })
    }

    /// Stores the table, returning `false` (after logging) when the file
    /// cannot be written. Missing side files only cost a rescan.
    pub fn try_store_to_file(&self, path: &Path) -> bool {
        match self.store_to_file(path) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "cannot store block statistics to {}; will rebuild next run: {e}",
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
        write_block_table(&mut writer, self.total_integers, &self.blocks)?;
        writer.flush()?;
        Ok(())
    }
}

/// Chops the delta sequence into non-overlapping blocks at every target
/// granularity and bumps the per-content frequency counters.
fn collect(deltas: &[u32], block_map: &mut AHashMap<Box<[u32]>, u64>) {
    for &size in &TARGET_SIZES {
        for chunk in deltas.chunks_exact(size) {
            if let Some(freq) = block_map.get_mut(chunk) {
                *freq += 1;
            } else {
                block_map.insert(chunk.to_vec().into_boxed_slice(), 1);
            }
        }
    }
}

/// Decreasing `(frequency, length)`; content breaks remaining ties so the
/// ranking is a pure function of the observed blocks.
pub(crate) fn sort_by_rank(blocks: &mut [Block]) {
    blocks.sort_unstable_by(|a, b| {
        b.freq
            .cmp(&a.freq)
            .then(b.data.len().cmp(&a.data.len()))
            .then_with(|| a.data.cmp(&b.data))
    });
}

/// Writes `{total:u64, count:u32, {len:u32, freq:u32, values:u32[len]}*}`,
/// all little-endian. Frequencies saturate at `u32::MAX`.
pub(crate) fn write_block_table<W: Write>(
    writer: &mut W,
    total_integers: u64,
    blocks: &[Block],
) -> Result<()> {
    writer.write_u64::<LittleEndian>(total_integers)?;
    writer.write_u32::<LittleEndian>(blocks.len() as u32)?;
    let mut buf = [0u8; 4 * config::MAX_ENTRY_SIZE];
    for block in blocks {
        writer.write_u32::<LittleEndian>(block.data.len() as u32)?;
        writer.write_u32::<LittleEndian>(block.freq.min(u32::MAX as u64) as u32)?;
        let bytes = &mut buf[..4 * block.data.len()];
        LittleEndian::write_u32_into(&block.data, bytes);
        writer.write_all(bytes)?;
    }
    Ok(())
}

/// Reads the layout written by [`write_block_table`], bounding the number of
/// records to the dictionary entry cap and validating each block length.
pub(crate) fn read_block_table<R: Read>(
    reader: &mut R,
    element: &str,
) -> Result<(u64, Vec<Block>)> {
    let truncated = |_| Error::invalid_format(element, "truncated file");
    let total_integers = reader.read_u64::<LittleEndian>().map_err(truncated)?;
    let stored = reader.read_u32::<LittleEndian>().map_err(truncated)? as usize;
    let count = stored.min(config::NUM_ENTRIES);
    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.read_u32::<LittleEndian>().map_err(truncated)? as usize;
        verify_data!(element, TARGET_SIZES.contains(&len));
        let freq = reader.read_u32::<LittleEndian>().map_err(truncated)? as u64;
        let mut data = vec![0u32; len];
        reader
            .read_u32_into::<LittleEndian>(&mut data)
            .map_err(truncated)?;
        blocks.push(Block { data, freq });
    }
    Ok((total_integers, blocks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection;

    fn tiny_config() -> StatsConfig {
        StatsConfig::default().with_min_sequence_len(4)
    }

    fn corpus() -> Vec<Vec<u32>> {
        // Strictly increasing doc ids; gaps repeat so blocks accumulate.
        let mut lists = Vec::new();
        for start in [10u32, 500, 9000] {
            let list = (0..64).map(|i| start + 7 * i).collect::<Vec<_>>();
            lists.push(list);
        }
        lists
    }

    #[test]
    fn test_collect_counts_all_granularities() {
        let mut map = AHashMap::new();
        collect(&[1, 1, 1, 1], &mut map);
        // One block of 4, two of 2, four of 1.
        assert_eq!(map.get([1u32, 1, 1, 1].as_slice()), Some(&1));
        assert_eq!(map.get([1u32, 1].as_slice()), Some(&2));
        assert_eq!(map.get([1u32].as_slice()), Some(&4));
    }

    #[test]
    fn test_short_sequences_are_skipped() {
        let lists = vec![vec![1u32, 2, 3]];
        let stats = BlockStats::from_sequences(
            lists.iter().map(|l| l.as_slice()),
            SequenceKind::DocIds,
            &tiny_config(),
            &CostFilter::default(),
        )
        .unwrap();
        assert_eq!(stats.total_integers, 0);
        assert!(stats.blocks.is_empty());
    }

    #[test]
    fn test_singletons_survive_the_filter() {
        let lists = corpus();
        // A filter that rejects everything still lets singletons through.
        let stats = BlockStats::from_sequences(
            lists.iter().map(|l| l.as_slice()),
            SequenceKind::DocIds,
            &tiny_config(),
            &CostFilter::new(f64::INFINITY),
        )
        .unwrap();
        assert!(!stats.blocks.is_empty());
        assert!(stats.blocks.iter().all(|b| b.data.len() == 1));
    }

    #[test]
    fn test_ranking_is_by_decreasing_frequency_then_length() {
        let lists = corpus();
        let stats = BlockStats::from_sequences(
            lists.iter().map(|l| l.as_slice()),
            SequenceKind::DocIds,
            &tiny_config(),
            &selection::DsfSelection::filter(),
        )
        .unwrap();
        for pair in stats.blocks.windows(2) {
            let key = |b: &Block| (b.freq, b.data.len());
            assert!(key(&pair[0]) >= key(&pair[1]));
        }
    }

    #[test]
    fn test_store_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let lists = corpus();
        let stats = BlockStats::from_sequences(
            lists.iter().map(|l| l.as_slice()),
            SequenceKind::DocIds,
            &tiny_config(),
            &CostFilter::default(),
        )
        .unwrap();
        let path = dir.path().join("corpus.docs.stats");
        assert!(stats.try_store_to_file(&path));
        let loaded = BlockStats::load_from_file(&path).unwrap();
        assert_eq!(loaded.total_integers, stats.total_integers);
        assert_eq!(loaded.blocks, stats.blocks);
    }

    #[test]
    fn test_create_or_load_reuses_the_side_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = tiny_config();
        let filter = CostFilter::default();
        let lists = corpus();
        let first = BlockStats::create_or_load(
            dir.path(),
            "corpus",
            SequenceKind::DocIds,
            &config,
            &filter,
            lists.iter().map(|l| l.as_slice()),
        )
        .unwrap();
        // Second run must not need the corpus at all.
        let second = BlockStats::create_or_load(
            dir.path(),
            "corpus",
            SequenceKind::DocIds,
            &config,
            &filter,
            std::iter::empty(),
        )
        .unwrap();
        assert_eq!(second.total_integers, first.total_integers);
        assert_eq!(second.blocks, first.blocks);
    }

    #[test]
    fn test_load_rejects_bad_block_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.stats");
        let mut bytes = Vec::new();
        bytes.write_u64::<LittleEndian>(100).unwrap();
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.write_u32::<LittleEndian>(3).unwrap(); // 3 is not a granularity
        bytes.write_u32::<LittleEndian>(1).unwrap();
        bytes.extend_from_slice(&[0u8; 12]);
        std::fs::write(&path, bytes).unwrap();
        let err = BlockStats::load_from_file(&path).unwrap_err();
        assert!(matches!(
            err.kind(),
            gapcode_common::error::ErrorKind::InvalidFormat { .. }
        ));
    }

    #[test]
    fn test_load_rejects_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc.stats");
        std::fs::write(&path, [0u8; 10]).unwrap();
        assert!(BlockStats::load_from_file(&path).is_err());
    }

    #[test]
    fn test_load_caps_the_record_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("over.stats");
        let stored = config::NUM_ENTRIES + 10;
        let mut bytes = Vec::with_capacity(12 + 12 * stored);
        bytes.write_u64::<LittleEndian>(1_000_000).unwrap();
        bytes.write_u32::<LittleEndian>(stored as u32).unwrap();
        for i in 0..stored {
            bytes.write_u32::<LittleEndian>(1).unwrap();
            bytes.write_u32::<LittleEndian>(1).unwrap();
            bytes.write_u32::<LittleEndian>(i as u32).unwrap();
        }
        std::fs::write(&path, bytes).unwrap();
        // A header claiming more records than the codeword space can hold
        // loads back at most the dictionary entry cap.
        let stats = BlockStats::load_from_file(&path).unwrap();
        assert_eq!(stats.blocks.len(), config::NUM_ENTRIES);
        assert_eq!(stats.blocks[0].data, vec![0]);
        assert_eq!(
            stats.blocks.last().unwrap().data,
            vec![config::NUM_ENTRIES as u32 - 1]
        );
    }

    #[test]
    fn test_create_or_load_survives_an_unwritable_store() {
        let lists = corpus();
        // The side-file directory does not exist, so the store fails; the
        // scan result is still returned and the next run simply rescans.
        let stats = BlockStats::create_or_load(
            Path::new("/nonexistent/gapcode-stats"),
            "corpus",
            SequenceKind::DocIds,
            &tiny_config(),
            &CostFilter::default(),
            lists.iter().map(|l| l.as_slice()),
        )
        .unwrap();
        assert!(!stats.blocks.is_empty());
    }
}
