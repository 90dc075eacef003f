//! The DINT encoder and decoder.
//!
//! The encoder walks a delta sequence with a greedy priority chain: the
//! longest reserved run tier covered by the upcoming gap-1 run, then
//! dictionary blocks probed from the longest granularity down to single
//! values, then a literal exception. Every step advances the cursor, so
//! encoding terminates in at most `n` steps.
//!
//! The decoder free-runs over 2-byte codewords until exactly `n` values have
//! been produced; anything that would land past `n` or run off the end of the
//! byte stream is reported as a corrupt stream.

use gapcode_common::{Result, error::Error};

use crate::config::{self, EXCEPTION_CODE, RESERVED, RUN_CODES, TARGET_SIZES};
use crate::dictionary::Dictionary;
use crate::gaps::{self, SequenceKind};

/// Reusable per-thread scratch for the list encode path. One instance per
/// worker keeps buffer reuse without hidden shared state.
#[derive(Default)]
pub struct CodecState {
    deltas: Vec<u32>,
}

impl CodecState {
    pub fn new() -> CodecState {
        CodecState::default()
    }
}

/// Matches the largest run tier covered by the gap-1 run at the cursor.
///
/// A run shorter than the smallest tier only qualifies when it extends to the
/// end of the sequence; the emitted tier is then clamped by the decoder, which
/// never produces more than the expected element count.
fn try_run(deltas: &[u32]) -> Option<(u16, usize)> {
    let window = deltas.len().min(config::MAX_RUN_LENGTH);
    let run = deltas[..window].iter().take_while(|&&d| d == 1).count();
    if run == 0 || (run < config::MIN_RUN_LENGTH && run < deltas.len()) {
        return None;
    }
    for &(code, tier) in &RUN_CODES {
        if tier <= run || tier == config::MIN_RUN_LENGTH {
            return Some((code, tier.min(deltas.len())));
        }
    }
    None
}

/// Probes the dictionary from the largest granularity down to single values,
/// each probe clipped to the remaining element count.
fn try_entry(dict: &Dictionary, deltas: &[u32]) -> Option<(u16, usize)> {
    for &size in &TARGET_SIZES {
        let len = size.min(deltas.len());
        if let Some(code) = dict.lookup(&deltas[..len]) {
            return Some((code, len));
        }
    }
    None
}

/// Encodes a delta sequence into 2-byte codewords, appending to `out`.
///
/// The dictionary must be prepared for encoding; an unprepared or empty
/// dictionary degrades to runs and exceptions only.
pub fn encode(deltas: &[u32], dict: &Dictionary, out: &mut Vec<u8>) {
    let mut cursor = 0;
    while cursor < deltas.len() {
        let rest = &deltas[cursor..];
        if let Some((code, len)) = try_run(rest).or_else(|| try_entry(dict, rest)) {
            out.extend_from_slice(&code.to_le_bytes());
            cursor += len;
        } else {
            out.extend_from_slice(&EXCEPTION_CODE.to_le_bytes());
            out.extend_from_slice(&rest[0].to_le_bytes());
            cursor += 1;
        }
    }
}

fn read_codeword(bytes: &[u8], pos: &mut usize) -> Result<u16> {
    let end = *pos + 2;
    let slice = bytes
        .get(*pos..end)
        .ok_or_else(|| Error::corrupt_stream("byte stream ends mid-codeword"))?;
    *pos = end;
    Ok(u16::from_le_bytes([slice[0], slice[1]]))
}

fn read_literal(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    let end = *pos + 4;
    let slice = bytes
        .get(*pos..end)
        .ok_or_else(|| Error::corrupt_stream("byte stream ends mid-literal"))?;
    *pos = end;
    Ok(u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

/// Decodes exactly `n` delta values from `bytes`, appending to `out`, and
/// returns the number of bytes consumed. Trailing bytes are left untouched
/// (per-list payloads concatenate several encodings back to back).
pub fn decode(bytes: &[u8], n: usize, dict: &Dictionary, out: &mut Vec<u32>) -> Result<usize> {
    let mut pos = 0;
    let mut written = 0;
    while written < n {
        let code = read_codeword(bytes, &mut pos)?;
        if code as usize >= RESERVED {
            written += dict.copy(code, out)?;
            if written > n {
                return Err(Error::corrupt_stream(format!(
                    "decoded {written} values where {n} were expected"
                )));
            }
        } else if code == EXCEPTION_CODE {
            out.push(read_literal(bytes, &mut pos)?);
            written += 1;
        } else {
            let take = config::run_length(code)?.min(n - written);
            out.extend(std::iter::repeat_n(1u32, take));
            written += take;
        }
    }
    Ok(pos)
}

/// Delta-transforms `values` using `state` as scratch and encodes the result.
pub fn encode_list(
    values: &[u32],
    kind: SequenceKind,
    dict: &Dictionary,
    state: &mut CodecState,
    out: &mut Vec<u8>,
) {
    state.deltas.clear();
    gaps::to_deltas(values, kind, &mut state.deltas);
    encode(&state.deltas, dict, out);
}

/// Decodes `n` values and undoes the delta transform in place, returning the
/// number of bytes consumed.
pub fn decode_list(
    bytes: &[u8],
    n: usize,
    kind: SequenceKind,
    dict: &Dictionary,
    out: &mut Vec<u32>,
) -> Result<usize> {
    let start = out.len();
    let consumed = decode(bytes, n, dict, out)?;
    gaps::from_deltas(&mut out[start..], kind);
    Ok(consumed)
}
