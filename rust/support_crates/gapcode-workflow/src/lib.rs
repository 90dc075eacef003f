//! Concurrency utilities for the index construction pipeline.
//!
//! - [`simple_mpmc`] - a blocking multi-producer, multi-consumer channel used
//!   to feed work to a fixed pool of worker threads (to be replaced with
//!   `std::sync::mpmc` once that stabilizes)
//! - [`ordered_commit`] - a parallel-prepare / ordered-commit pipeline with
//!   weighted admission control

pub mod ordered_commit;
pub mod simple_mpmc;
