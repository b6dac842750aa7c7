//! BPS: a block-oriented patch format with four action types, a nonstandard
//! base-128 varint encoding, and CRC32-wrapped framing.
//!
//! The teacher never implements a BPS *encoder* (its `patch::bps` is
//! apply-only); the decode control flow below is grounded on its
//! `bps::patch`/`apply_patch`/`ReadBPS::decode_command`, adapted from
//! `Read + Seek` streams to slice indexing the way
//! `other_examples/…afishhh-ftlman…bps.rs.rs` does. The encoder — both the
//! easy path and the full substring-search path — is grounded directly on
//! `original_source/qromp_enc_bps.py::create_bps`, which spec.md §4.5
//! describes step for step.

use super::varint::{self, DecodeError};
use super::{Error, Outcome, Warning};
use crate::crc::{Crc32, Crc32Hasher};
use checked_signed_diff::prelude::*;
use std::collections::HashSet;
use std::ops::RangeInclusive;

pub const MAGIC: &[u8; 3] = b"BPS";
const FOOTER_LEN: usize = 12;

pub const MIN_COPY_LEN_RANGE: RangeInclusive<u8> = 1..=32;
pub const DEFAULT_MIN_COPY_LEN: u8 = 4;

fn map_varint_err(err: DecodeError) -> Error {
  match err {
    DecodeError::Truncated => Error::bad_patch("truncated BPS varint"),
    DecodeError::Overflow => Error::bad_patch("BPS varint exceeds the 2^64 ceiling"),
  }
}

/// Applies a BPS patch to `source`, returning the patched bytes plus any
/// non-fatal warnings (header size mismatches, CRC mismatches), per
/// spec.md §4.4.
pub fn apply(source: &[u8], patch: &[u8]) -> Result<Outcome, Error> {
  if patch.len() < 4 + FOOTER_LEN {
    return Err(Error::bad_patch(
      "patch is too short to hold a BPS header and footer",
    ));
  }

  let mut warnings = Vec::new();

  if &patch[..3] != MAGIC {
    return Err(Error::bad_patch("missing \"BPS\" magic"));
  }
  if patch[3] != b'1' {
    warnings.push(Warning::UnsupportedBpsVersion(patch[3]));
  }

  let body_end = patch.len() - FOOTER_LEN;
  let mut cursor = &patch[4..body_end];

  let hdr_source_size = varint::decode_uint(&mut cursor).map_err(map_varint_err)?;
  let hdr_target_size = varint::decode_uint(&mut cursor).map_err(map_varint_err)?;
  let metadata_size =
    usize::try_from(varint::decode_uint(&mut cursor).map_err(map_varint_err)?)
      .map_err(|_| Error::bad_patch("metadata size too large to address"))?;
  if metadata_size > cursor.len() {
    return Err(Error::bad_patch("metadata size exceeds the patch body"));
  }
  cursor = &cursor[metadata_size..];

  if hdr_source_size != source.len() as u64 {
    warnings.push(Warning::HeaderSourceSizeMismatch {
      header: hdr_source_size,
      actual: source.len() as u64,
    });
  }

  let out = decode_blocks(source, cursor)?;

  if out.len() as u64 != hdr_target_size {
    warnings.push(Warning::HeaderTargetSizeMismatch {
      header: hdr_target_size,
      actual: out.len() as u64,
    });
  }

  let footer = &patch[body_end..];
  let expected_source_crc = Crc32::new(u32::from_le_bytes(footer[0..4].try_into().unwrap()));
  let expected_target_crc = Crc32::new(u32::from_le_bytes(footer[4..8].try_into().unwrap()));
  let expected_patch_crc = Crc32::new(u32::from_le_bytes(footer[8..12].try_into().unwrap()));

  let actual_source_crc = Crc32::of(source);
  if actual_source_crc != expected_source_crc {
    warnings.push(Warning::SourceCrcMismatch {
      expected: expected_source_crc,
      actual: actual_source_crc,
    });
  }
  let actual_target_crc = Crc32::of(&out);
  if actual_target_crc != expected_target_crc {
    warnings.push(Warning::TargetCrcMismatch {
      expected: expected_target_crc,
      actual: actual_target_crc,
    });
  }
  let actual_patch_crc = Crc32::of(&patch[..patch.len() - 4]);
  if actual_patch_crc != expected_patch_crc {
    warnings.push(Warning::PatchCrcMismatch {
      expected: expected_patch_crc,
      actual: actual_patch_crc,
    });
  }

  Ok(Outcome { bytes: out, warnings })
}

fn decode_blocks(source: &[u8], mut cursor: &[u8]) -> Result<Vec<u8>, Error> {
  let mut out: Vec<u8> = Vec::new();
  let mut src_off: i64 = 0;
  let mut dst_off: i64 = 0;

  while !cursor.is_empty() {
    let code = varint::decode_uint(&mut cursor).map_err(map_varint_err)?;
    let length =
      usize::try_from((code >> 2) + 1).map_err(|_| Error::bad_patch("block length overflow"))?;
    match code & 3 {
      // SourceRead: same offset as the current output length.
      0 => {
        let start = out.len();
        let end = start
          .checked_add(length)
          .filter(|&end| end <= source.len())
          .ok_or_else(|| Error::invalid_read("SourceRead reaches past the end of source"))?;
        out.extend_from_slice(&source[start..end]);
      }
      // TargetRead: raw bytes that follow the header in the patch.
      1 => {
        if length > cursor.len() {
          return Err(Error::bad_patch("TargetRead reaches past the end of the patch"));
        }
        let (data, rest) = cursor.split_at(length);
        out.extend_from_slice(data);
        cursor = rest;
      }
      // SourceCopy: arbitrary offset in source, tracked by a signed delta.
      2 => {
        let delta = varint::decode_sint(&mut cursor).map_err(map_varint_err)?;
        src_off = src_off
          .checked_add(delta)
          .ok_or_else(|| Error::invalid_read("SourceCopy delta overflowed the source cursor"))?;
        let start = usize::try_from(src_off)
          .map_err(|_| Error::invalid_read("SourceCopy offset is negative"))?;
        let end = start
          .checked_add(length)
          .filter(|&end| end <= source.len())
          .ok_or_else(|| Error::invalid_read("SourceCopy reaches past the end of source"))?;
        out.extend_from_slice(&source[start..end]);
        src_off = src_off
          .checked_add(length as i64)
          .ok_or_else(|| Error::invalid_read("SourceCopy cursor overflow"))?;
      }
      // TargetCopy: arbitrary offset already written to the output, which
      // may overlap the write position (self-referential RLE).
      3 => {
        let delta = varint::decode_sint(&mut cursor).map_err(map_varint_err)?;
        dst_off = dst_off
          .checked_add(delta)
          .ok_or_else(|| Error::invalid_read("TargetCopy delta overflowed the target cursor"))?;
        if dst_off < 0 || dst_off as u64 >= out.len() as u64 {
          return Err(Error::invalid_read("TargetCopy offset is not yet written"));
        }
        // Copied one byte at a time: a TargetCopy block may read bytes it
        // just wrote (the canonical use is RLE), so growing the output in
        // larger chunks would read stale or out-of-bounds data.
        let mut read_pos = dst_off as usize;
        for _ in 0..length {
          out.push(out[read_pos]);
          read_pos += 1;
        }
        dst_off = dst_off
          .checked_add(length as i64)
          .ok_or_else(|| Error::invalid_read("TargetCopy cursor overflow"))?;
      }
      _ => unreachable!("2-bit action code"),
    }
  }

  Ok(out)
}

/// A lazy sink for emitted block bytes, threading them to both the output
/// buffer and a streaming CRC32 accumulator in one pass — the "emit(bytes)"
/// callback interface from spec.md §9.
struct BlockWriter {
  bytes: Vec<u8>,
  hasher: Crc32Hasher,
}

impl BlockWriter {
  fn new() -> Self {
    Self { bytes: Vec::new(), hasher: Crc32Hasher::new() }
  }

  fn emit(&mut self, data: &[u8]) {
    self.bytes.extend_from_slice(data);
    self.hasher.update(data);
  }

  fn emit_uint(&mut self, n: u64) {
    let mut buf = Vec::new();
    varint::encode_uint(n, &mut buf);
    self.emit(&buf);
  }

  fn emit_sint(&mut self, n: i64) {
    let mut buf = Vec::new();
    varint::encode_sint(n, &mut buf);
    self.emit(&buf);
  }

  fn emit_block_header(&mut self, length: u64, action: u8) {
    self.emit_uint(((length - 1) << 2) | u64::from(action));
  }
}

fn write_header(w: &mut BlockWriter, source_len: u64, target_len: u64, metadata: &[u8]) {
  w.emit(b"BPS1");
  w.emit_uint(source_len);
  w.emit_uint(target_len);
  w.emit_uint(metadata.len() as u64);
  w.emit(metadata);
}

fn finish(w: BlockWriter, source: &[u8], target: &[u8]) -> Vec<u8> {
  let BlockWriter { mut bytes, mut hasher } = w;
  let source_crc = Crc32::of(source);
  let target_crc = Crc32::of(target);
  for crc in [source_crc, target_crc] {
    let encoded = crc.value().to_le_bytes();
    bytes.extend_from_slice(&encoded);
    hasher.update(&encoded);
  }
  let patch_crc = hasher.finish();
  bytes.extend_from_slice(&patch_crc.value().to_le_bytes());
  bytes
}

fn emit_source_read(w: &mut BlockWriter, length: u64) {
  w.emit_block_header(length, 0);
}

fn emit_target_read(w: &mut BlockWriter, payload: &[u8]) {
  w.emit_block_header(payload.len() as u64, 1);
  w.emit(payload);
}

fn emit_source_copy(w: &mut BlockWriter, length: u64, delta: i64) {
  w.emit_block_header(length, 2);
  w.emit_sint(delta);
}

fn emit_target_copy(w: &mut BlockWriter, length: u64, delta: i64) {
  w.emit_block_header(length, 3);
  w.emit_sint(delta);
}

/// Easy-path BPS encoder: same-size inputs only, SourceRead/TargetRead runs.
/// Produces a valid but larger patch than [`create`], per spec.md §4.5.
pub fn create_easy(source: &[u8], target: &[u8], metadata: &[u8]) -> Result<Vec<u8>, Error> {
  if source.len() != target.len() {
    return Err(Error::SizeMismatch(
      "the BPS easy-path encoder requires source and modified inputs of equal length".into(),
    ));
  }

  let mut w = BlockWriter::new();
  write_header(&mut w, source.len() as u64, target.len() as u64, metadata);

  let mut pos = 0;
  while pos < source.len() {
    let equal = source[pos] == target[pos];
    let start = pos;
    while pos < source.len() && (source[pos] == target[pos]) == equal {
      pos += 1;
    }
    if equal {
      emit_source_read(&mut w, (pos - start) as u64);
    } else {
      emit_target_read(&mut w, &target[start..pos]);
    }
  }

  Ok(finish(w, source, target))
}

/// Full-path BPS encoder: for each position in `target`, finds the longest
/// prefix occurring anywhere in `source` and anywhere in the already-emitted
/// prefix of `target`, then chooses the cheapest action. See spec.md §4.5.
pub fn create(
  source: &[u8],
  target: &[u8],
  min_copy_len: u8,
  metadata: &[u8],
) -> Result<Vec<u8>, Error> {
  debug_assert!(MIN_COPY_LEN_RANGE.contains(&min_copy_len));
  let m = min_copy_len as usize;

  let mut w = BlockWriter::new();
  write_header(&mut w, source.len() as u64, target.len() as u64, metadata);

  if target.is_empty() {
    return Ok(finish(w, source, target));
  }

  let source_windows: HashSet<&[u8]> = if source.len() >= m {
    (0..=source.len() - m).map(|i| &source[i..i + m]).collect()
  } else {
    HashSet::new()
  };
  let mut target_windows: HashSet<&[u8]> = HashSet::new();

  let mut pos: usize = 0;
  let mut prev_pos: usize = 0;
  let mut target_read_start: Option<usize> = None;
  let mut src_copy_off: u64 = 0;
  let mut trg_copy_off: u64 = 0;

  while pos < target.len() {
    // The decoder can only TargetCopy from bytes it has already produced,
    // so newly visible m-byte windows are added incrementally, not all at
    // once, before any block covering `pos` is chosen.
    let grow_from = prev_pos.saturating_sub(m - 1);
    let grow_to = pos.saturating_sub(m - 1);
    for i in grow_from..grow_to {
      target_windows.insert(&target[i..i + m]);
    }
    prev_pos = pos;

    let window_end = (pos + m).min(target.len());
    let window = &target[pos..window_end];

    let src_len = if window.len() == m && source_windows.contains(window) {
      longest_prefix(&target[pos..], source)
    } else {
      0
    };
    let trg_len = if window.len() == m && target_windows.contains(window) {
      longest_prefix(&target[pos..], &target[..pos])
    } else {
      0
    };

    if src_len >= trg_len.max(m) {
      flush_target_read(&mut w, target, &mut target_read_start, pos);
      if source.get(pos..pos + src_len) == target.get(pos..pos + src_len) {
        emit_source_read(&mut w, src_len as u64);
      } else {
        let copy_pos = find_subsequence(source, &target[pos..pos + src_len])
          .expect("src_len was verified to occur in source by longest_prefix");
        let delta = (copy_pos as u64)
          .checked_signed_difference(src_copy_off)
          .expect("ROM-sized offsets fit in an i64 delta");
        emit_source_copy(&mut w, src_len as u64, delta);
        src_copy_off = copy_pos as u64 + src_len as u64;
      }
      pos += src_len;
    } else if trg_len >= m {
      flush_target_read(&mut w, target, &mut target_read_start, pos);
      let copy_pos = find_subsequence(&target[..pos], &target[pos..pos + trg_len])
        .expect("trg_len was verified to occur in target's prefix by longest_prefix");
      let delta = (copy_pos as u64)
        .checked_signed_difference(trg_copy_off)
        .expect("ROM-sized offsets fit in an i64 delta");
      emit_target_copy(&mut w, trg_len as u64, delta);
      trg_copy_off = copy_pos as u64 + trg_len as u64;
      pos += trg_len;
    } else {
      if target_read_start.is_none() {
        target_read_start = Some(pos);
      }
      pos += 1;
    }
  }

  flush_target_read(&mut w, target, &mut target_read_start, target.len());

  Ok(finish(w, source, target))
}

fn flush_target_read(
  w: &mut BlockWriter,
  target: &[u8],
  start: &mut Option<usize>,
  upto: usize,
) {
  if let Some(s) = start.take() {
    emit_target_read(w, &target[s..upto]);
  }
}

/// The length of the longest prefix of `needle_source` that occurs anywhere
/// in `haystack`, found via binary search on the prefix length using
/// `haystack.contains(prefix)` as the oracle (spec.md §4.5 step 3).
fn longest_prefix(needle_source: &[u8], haystack: &[u8]) -> usize {
  let mut lo = 0usize;
  let mut hi = needle_source.len().min(haystack.len());
  while lo < hi {
    let mid = (lo + hi + 1) / 2;
    if contains_subsequence(haystack, &needle_source[..mid]) {
      lo = mid;
    } else {
      hi = mid - 1;
    }
  }
  lo
}

fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
  if needle.is_empty() {
    return true;
  }
  if needle.len() > haystack.len() {
    return false;
  }
  haystack.windows(needle.len()).any(|w| w == needle)
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
  if needle.is_empty() {
    return Some(0);
  }
  haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn footer_crcs(patch: &[u8]) -> (Crc32, Crc32, Crc32) {
    let footer = &patch[patch.len() - FOOTER_LEN..];
    (
      Crc32::new(u32::from_le_bytes(footer[0..4].try_into().unwrap())),
      Crc32::new(u32::from_le_bytes(footer[4..8].try_into().unwrap())),
      Crc32::new(u32::from_le_bytes(footer[8..12].try_into().unwrap())),
    )
  }

  #[test]
  fn no_op_patch_round_trips_with_matching_crcs() {
    // S3: S = T = 01 02 03 04.
    let data = [0x01, 0x02, 0x03, 0x04];
    let patch = create_easy(&data, &data, &[]).unwrap();
    let outcome = apply(&data, &patch).unwrap();
    assert_eq!(outcome.bytes, data);
    assert!(outcome.warnings.is_empty());

    let (src_crc, dst_crc, patch_crc) = footer_crcs(&patch);
    assert_eq!(src_crc, Crc32::of(&data));
    assert_eq!(dst_crc, Crc32::of(&data));
    assert_eq!(patch_crc, Crc32::of(&patch[..patch.len() - 4]));
  }

  #[test]
  fn full_encoder_round_trips_equal_size_inputs() {
    let source = b"the quick brown fox jumps over the lazy dog";
    let target = b"the slow brown fox leaps over the lazy dog!";
    let patch = create(source, target, DEFAULT_MIN_COPY_LEN, &[]).unwrap();
    let outcome = apply(source, &patch).unwrap();
    assert_eq!(outcome.bytes, target);
    assert!(outcome.warnings.is_empty());
  }

  #[test]
  fn full_encoder_round_trips_growing_target() {
    let source = b"AAAABBBBCCCC";
    let target = b"AAAABBBBCCCCDDDDEEEE";
    let patch = create(source, target, DEFAULT_MIN_COPY_LEN, &[]).unwrap();
    let outcome = apply(source, &patch).unwrap();
    assert_eq!(outcome.bytes, target);
  }

  #[test]
  fn full_encoder_can_emit_target_copy_self_reference() {
    // S4: S = AB, T = AB CD CD CD CD CD.
    let source = b"\xab";
    let target = [0xab, 0xcd, 0xcd, 0xcd, 0xcd, 0xcd];
    let patch = create(source, &target, 1, &[]).unwrap();
    let outcome = apply(source, &patch).unwrap();
    assert_eq!(outcome.bytes, target);
  }

  #[test]
  fn hand_built_target_copy_rle_expands_from_empty_source() {
    // S5: S = empty, T = 256 copies of 0x5A, via a TargetCopy reading one
    // byte back from the end of the growing output.
    let target = vec![0x5au8; 256];
    let mut w = BlockWriter::new();
    write_header(&mut w, 0, target.len() as u64, &[]);
    emit_target_read(&mut w, &target[..1]);
    emit_target_copy(&mut w, (target.len() - 1) as u64, -1);
    let patch = finish(w, &[], &target);

    let outcome = apply(&[], &patch).unwrap();
    assert_eq!(outcome.bytes, target);
  }

  #[test]
  fn decoder_rejects_truncated_patch() {
    let err = apply(&[], &[b'B', b'P', b'S', b'1']).unwrap_err();
    assert!(matches!(err, Error::BadPatch(_)));
  }

  #[test]
  fn decoder_rejects_varint_overflowing_the_ceiling() {
    let mut patch = Vec::from(*b"BPS1");
    patch.extend([0x00; 12]); // an unterminated run of non-final varint bytes
    patch.extend([0u8; FOOTER_LEN]);
    let err = apply(&[], &patch).unwrap_err();
    assert!(matches!(err, Error::BadPatch(_)));
  }

  #[test]
  fn decoder_warns_but_delivers_output_on_crc_mismatch() {
    let data = [1u8, 2, 3];
    let mut patch = create_easy(&data, &data, &[]).unwrap();
    let last = patch.len() - 1;
    patch[last] ^= 0xff;
    let outcome = apply(&data, &patch).unwrap();
    assert_eq!(outcome.bytes, data);
    assert!(!outcome.warnings.is_empty());
  }

  #[test]
  fn easy_path_rejects_mismatched_sizes() {
    let err = create_easy(b"abc", b"abcd", &[]).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch(_)));
  }
}
