//! Delta transforms applied before encoding and undone after decoding.

/// Flavor of an input sequence, deciding whether the delta transform applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    /// Strictly increasing document ids, rewritten as d-gaps: the first delta
    /// is the first value, then `d[i] = v[i] - v[i-1]`. Consecutive documents
    /// produce literal `1` deltas, the pattern the run tiers target.
    DocIds,
    /// Term frequencies are small positive integers already and pass through
    /// unchanged (runs of frequency `1` map directly onto run tiers).
    Frequencies,
}

impl SequenceKind {
    /// Short name used in side-file names.
    pub fn extension(&self) -> &'static str {
        match self {
            SequenceKind::DocIds => "docs",
            SequenceKind::Frequencies => "freqs",
        }
    }
}

/// Rewrites `values` into the delta domain, appending to `out`.
///
/// Document ids must be strictly increasing; frequencies are copied verbatim.
pub fn to_deltas(values: &[u32], kind: SequenceKind, out: &mut Vec<u32>) {
    match kind {
        SequenceKind::DocIds => {
            let mut prev = None;
            for &v in values {
                match prev {
                    Some(p) => {
                        debug_assert!(v > p, "document ids must be strictly increasing");
                        out.push(v - p);
                    }
                    None => out.push(v),
                }
                prev = Some(v);
            }
        }
        SequenceKind::Frequencies => out.extend_from_slice(values),
    }
}

/// Undoes the delta transform in place (prefix sums for document ids).
pub fn from_deltas(deltas: &mut [u32], kind: SequenceKind) {
    if kind == SequenceKind::DocIds {
        let mut acc = 0u32;
        for d in deltas.iter_mut() {
            acc = acc.wrapping_add(*d);
            *d = acc;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docid_gaps_round_trip() {
        let values = vec![5, 6, 7, 10, 100, 101];
        let mut deltas = Vec::new();
        to_deltas(&values, SequenceKind::DocIds, &mut deltas);
        assert_eq!(deltas, vec![5, 1, 1, 3, 90, 1]);
        from_deltas(&mut deltas, SequenceKind::DocIds);
        assert_eq!(deltas, values);
    }

    #[test]
    fn test_frequencies_pass_through() {
        let values = vec![1, 1, 3, 1, 2];
        let mut deltas = Vec::new();
        to_deltas(&values, SequenceKind::Frequencies, &mut deltas);
        assert_eq!(deltas, values);
        from_deltas(&mut deltas, SequenceKind::Frequencies);
        assert_eq!(deltas, values);
    }

    #[test]
    fn test_first_docid_delta_is_the_value() {
        let mut deltas = Vec::new();
        to_deltas(&[42], SequenceKind::DocIds, &mut deltas);
        assert_eq!(deltas, vec![42]);
    }
}
