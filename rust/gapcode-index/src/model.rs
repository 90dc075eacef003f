//! Dictionary model construction with build-or-load caching.
//!
//! Cached artifacts are keyed by deterministic names derived from the source
//! list name, the sequence kind, and the identity of the collector or
//! selection algorithm, so a build-or-load decision follows purely from
//! filesystem presence and differently configured builds never collide.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gapcode_common::Result;
use gapcode_encodings::config::StatsConfig;
use gapcode_encodings::dictionary::{Dictionary, DictionaryBuilder};
use gapcode_encodings::gaps::SequenceKind;
use gapcode_encodings::selection::DsfSelection;
use gapcode_encodings::stats::BlockStats;
use log::{debug, info};

/// Location of cached statistics and dictionary side files for one corpus.
pub struct ModelCache {
    dir: PathBuf,
    name: String,
}

impl ModelCache {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> ModelCache {
        ModelCache {
            dir: dir.into(),
            name: name.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the cached dictionary for one sequence kind.
    pub fn dictionary_path(&self, kind: SequenceKind) -> PathBuf {
        self.dir.join(format!(
            "dict.{}.{}.{}",
            self.name,
            kind.extension(),
            DsfSelection::identity()
        ))
    }
}

/// The two dictionaries a posting list index encodes with: one trained on
/// document-id gaps, one on frequencies. Shared read-only across workers.
pub struct Model {
    pub docs: Arc<Dictionary>,
    pub freqs: Arc<Dictionary>,
}

impl Model {
    /// Builds both dictionaries from the corpus, or loads them from the
    /// cache when present. Each is prepared for encoding before being
    /// shared.
    pub fn build<'a, D, F>(
        docs_sequences: D,
        freqs_sequences: F,
        config: &StatsConfig,
        cache: Option<&ModelCache>,
    ) -> Result<Model>
    where
        D: IntoIterator<Item = &'a [u32]>,
        F: IntoIterator<Item = &'a [u32]>,
    {
        info!("building or loading dictionary for docs");
        let docs = build_or_load(docs_sequences, SequenceKind::DocIds, config, cache)?;
        info!("building or loading dictionary for freqs");
        let freqs = build_or_load(freqs_sequences, SequenceKind::Frequencies, config, cache)?;
        Ok(Model { docs, freqs })
    }
}

fn build_or_load<'a, I>(
    sequences: I,
    kind: SequenceKind,
    config: &StatsConfig,
    cache: Option<&ModelCache>,
) -> Result<Arc<Dictionary>>
where
    I: IntoIterator<Item = &'a [u32]>,
{
    let builder = match cache {
        Some(cache) => {
            let path = cache.dictionary_path(kind);
            if path.exists() {
                debug!("reusing dictionary from {}", path.display());
                DictionaryBuilder::load_from_file(&path)?
            } else {
                let stats = BlockStats::create_or_load(
                    cache.dir(),
                    cache.name(),
                    kind,
                    config,
                    &DsfSelection::filter(),
                    sequences,
                )?;
                let builder = select(&stats)?;
                builder.try_store_to_file(&path);
                builder
            }
        }
        None => {
            let stats =
                BlockStats::from_sequences(sequences, kind, config, &DsfSelection::filter())?;
            select(&stats)?
        }
    };
    let mut dictionary = builder.build();
    dictionary.prepare_for_encoding();
    Ok(Arc::new(dictionary))
}

fn select(stats: &BlockStats) -> Result<DictionaryBuilder> {
    let mut builder = DictionaryBuilder::new(stats.total_integers);
    DsfSelection::build(stats, &mut builder)?;
    Ok(builder)
}
