//! Concurrent construction of a DINT-compressed posting list index.
//!
//! [`IndexBuilder`] builds (or loads) one dictionary for document-id gap
//! sequences and an independent one for frequency sequences, then encodes
//! posting lists on a worker pool while appending each list's bytes to a
//! single blob in submission order. The result is an [`EncodedIndex`]: the
//! blob, the endpoint table slicing it into per-list ranges, and the two
//! dictionaries needed to decode.

mod builder;
mod model;

pub use builder::{EncodedIndex, IndexBuilder, IndexBuilderOptions, PostingList};
pub use model::{Model, ModelCache};
