//! The concurrent posting list index builder.

use std::sync::Arc;

use gapcode_common::{Result, error::Error, verify_arg};
use gapcode_encodings::config::StatsConfig;
use gapcode_encodings::dictionary::Dictionary;
use gapcode_encodings::dint::{self, CodecState};
use gapcode_encodings::gaps::SequenceKind;
use gapcode_workflow::ordered_commit::{CommitJob, CommitPipeline};
use log::info;

use crate::model::{Model, ModelCache};

/// One posting list of a corpus: parallel document-id and frequency arrays.
#[derive(Debug, Clone)]
pub struct PostingList {
    pub docs: Vec<u32>,
    pub freqs: Vec<u32>,
}

/// Construction parameters for [`IndexBuilder`].
#[derive(Debug, Clone)]
pub struct IndexBuilderOptions {
    /// Worker threads running list encodes.
    pub num_workers: usize,
    /// Outstanding-cost budget of the pipeline; each list costs `2n`.
    pub cost_budget: u64,
    /// Configuration of the statistics collector behind `build_model`.
    pub stats: StatsConfig,
}

impl Default for IndexBuilderOptions {
    fn default() -> Self {
        IndexBuilderOptions {
            num_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            cost_budget: 1 << 24,
            stats: StatsConfig::default(),
        }
    }
}

struct ListSink {
    blob: Vec<u8>,
    endpoints: Vec<u64>,
}

/// One pipeline unit: encodes a single posting list into a private buffer
/// (prepare), then appends it to the shared blob (commit).
struct ListJob {
    docs: Vec<u32>,
    freqs: Vec<u32>,
    docs_dict: Arc<Dictionary>,
    freqs_dict: Arc<Dictionary>,
    bytes: Vec<u8>,
}

impl CommitJob for ListJob {
    type Context = CodecState;
    type Sink = ListSink;

    fn prepare(&mut self, state: &mut CodecState) -> Result<()> {
        dint::encode_list(
            &self.docs,
            SequenceKind::DocIds,
            &self.docs_dict,
            state,
            &mut self.bytes,
        );
        dint::encode_list(
            &self.freqs,
            SequenceKind::Frequencies,
            &self.freqs_dict,
            state,
            &mut self.bytes,
        );
        Ok(())
    }

    fn commit(self, sink: &mut ListSink) -> Result<()> {
        sink.blob.extend_from_slice(&self.bytes);
        sink.endpoints.push(sink.blob.len() as u64);
        Ok(())
    }
}

/// Builds a DINT-compressed index over many posting lists.
///
/// Usage: [`build_model`](IndexBuilder::build_model) once, then
/// [`add_posting_list`](IndexBuilder::add_posting_list) for every list, then
/// [`build`](IndexBuilder::build) to drain the pipeline and obtain the
/// [`EncodedIndex`].
pub struct IndexBuilder {
    num_docs: u64,
    options: IndexBuilderOptions,
    model: Option<Model>,
    pipeline: Option<CommitPipeline<ListJob>>,
    counts: Vec<u32>,
}

impl IndexBuilder {
    pub fn new(num_docs: u64, options: IndexBuilderOptions) -> IndexBuilder {
        IndexBuilder {
            num_docs,
            options,
            model: None,
            pipeline: None,
            counts: Vec::new(),
        }
    }

    /// Builds or loads the document-id and frequency dictionaries from the
    /// corpus. Must run before any list is added.
    pub fn build_model(&mut self, corpus: &[PostingList], cache: Option<&ModelCache>) -> Result<()> {
        let model = Model::build(
            corpus.iter().map(|l| l.docs.as_slice()),
            corpus.iter().map(|l| l.freqs.as_slice()),
            &self.options.stats,
            cache,
        )?;
        self.model = Some(model);
        Ok(())
    }

    /// Submits one posting list for encoding. Lists commit in submission
    /// order no matter how their encodes interleave.
    pub fn add_posting_list(&mut self, docs: &[u32], freqs: &[u32]) -> Result<()> {
        verify_arg!(docs, !docs.is_empty());
        verify_arg!(freqs, freqs.len() == docs.len());
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| Error::invalid_operation("add_posting_list before build_model"))?;
        let job = ListJob {
            docs: docs.to_vec(),
            freqs: freqs.to_vec(),
            docs_dict: model.docs.clone(),
            freqs_dict: model.freqs.clone(),
            bytes: Vec::new(),
        };
        let cost = 2 * docs.len() as u64;
        let pipeline = self.pipeline.get_or_insert_with(|| {
            CommitPipeline::new(
                ListSink {
                    blob: Vec::new(),
                    endpoints: vec![0],
                },
                self.options.num_workers,
                self.options.cost_budget,
            )
        });
        pipeline.submit(job, cost)?;
        self.counts.push(docs.len() as u32);
        Ok(())
    }

    /// Drains the pipeline and assembles the encoded index.
    pub fn build(self) -> Result<EncodedIndex> {
        let model = self
            .model
            .ok_or_else(|| Error::invalid_operation("build before build_model"))?;
        let sink = match self.pipeline {
            Some(pipeline) => pipeline.finish()?,
            None => ListSink {
                blob: Vec::new(),
                endpoints: vec![0],
            },
        };
        info!(
            "encoded {} posting lists into {} bytes",
            self.counts.len(),
            sink.blob.len()
        );
        Ok(EncodedIndex {
            num_docs: self.num_docs,
            blob: sink.blob,
            endpoints: sink.endpoints,
            counts: self.counts,
            docs_dict: model.docs,
            freqs_dict: model.freqs,
        })
    }
}

/// The built index: one byte blob, the endpoint table slicing it into
/// per-list ranges, per-list element counts, and the two dictionaries.
pub struct EncodedIndex {
    num_docs: u64,
    blob: Vec<u8>,
    endpoints: Vec<u64>,
    counts: Vec<u32>,
    docs_dict: Arc<Dictionary>,
    freqs_dict: Arc<Dictionary>,
}

impl EncodedIndex {
    pub fn num_docs(&self) -> u64 {
        self.num_docs
    }

    pub fn num_lists(&self) -> usize {
        self.counts.len()
    }

    /// Monotone byte offsets, one per list plus a trailing sentinel.
    pub fn endpoints(&self) -> &[u64] {
        &self.endpoints
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }

    /// Number of postings in list `i`.
    pub fn list_len(&self, i: usize) -> usize {
        self.counts[i] as usize
    }

    /// The encoded byte range of list `i`: the docs encoding immediately
    /// followed by the freqs encoding.
    pub fn list_bytes(&self, i: usize) -> &[u8] {
        let begin = self.endpoints[i] as usize;
        let end = self.endpoints[i + 1] as usize;
        &self.blob[begin..end]
    }

    /// Decodes list `i` back into its document ids and frequencies.
    pub fn decode_list(&self, i: usize) -> Result<(Vec<u32>, Vec<u32>)> {
        let n = self.list_len(i);
        let bytes = self.list_bytes(i);
        let mut docs = Vec::with_capacity(n);
        let consumed = dint::decode_list(bytes, n, SequenceKind::DocIds, &self.docs_dict, &mut docs)?;
        let mut freqs = Vec::with_capacity(n);
        let tail = dint::decode_list(
            &bytes[consumed..],
            n,
            SequenceKind::Frequencies,
            &self.freqs_dict,
            &mut freqs,
        )?;
        if consumed + tail != bytes.len() {
            return Err(Error::corrupt_stream(format!(
                "list {i} occupies {} bytes but decoding consumed {}",
                bytes.len(),
                consumed + tail
            )));
        }
        Ok((docs, freqs))
    }
}
