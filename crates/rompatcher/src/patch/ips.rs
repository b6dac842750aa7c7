//! IPS: the oldest and simplest of the two formats here — ASCII framing,
//! fixed-width big-endian fields, and a decoder loop with no checksums at
//! all. Grounded on `original_source/qromp_ips.py` (decode) and
//! `original_source/qromp_enc_ips.py` (the four encoder stages), in the
//! teacher's slice/cursor idiom rather than its `Read + Seek` one — the
//! teacher's own `ips.rs` is apply-only, same as its BPS counterpart.

use super::{Error, Outcome, Warning};
use byteorder::{BigEndian, ByteOrder};

const HEADER: &[u8; 5] = b"PATCH";
const TRAILER: &[u8; 3] = b"EOF";
/// The 24-bit value of the ASCII trailer "EOF", read as a big-endian offset.
/// A legitimate record whose offset happens to equal this value is
/// indistinguishable from the trailer — the format's oldest bug, and one
/// this crate preserves rather than works around (spec.md §4.6).
const EOF_MARKER: u32 = 0x0045_4f46;
/// IPS offsets are 24-bit, so neither input may exceed this size.
const MAX_FILE_SIZE: usize = 1 << 24;
const MAX_BLOCK_LEN: usize = 0xffff;

pub const DEFAULT_MIN_RLE_LEN: usize = 9;
pub const DEFAULT_MAX_UNCHANGED_LEN: usize = 1;

fn encode_offset(offset: usize) -> Result<[u8; 3], Error> {
  if offset > 0xff_ffff {
    return Err(Error::SizeMismatch(
      "IPS record offset exceeds the format's 24-bit field".into(),
    ));
  }
  let mut buf = [0u8; 3];
  BigEndian::write_u24(&mut buf, offset as u32);
  Ok(buf)
}

/// Applies an IPS patch to `source`, per spec.md §4.6. An offset that would
/// leave a gap past the current end of the output is fatal; everything else
/// a record touches is overwritten or appended in place.
pub fn apply(source: &[u8], patch: &[u8]) -> Result<Outcome, Error> {
  if patch.len() < HEADER.len() + TRAILER.len() {
    return Err(Error::bad_patch(
      "patch is too short to hold an IPS header and EOF trailer",
    ));
  }
  if &patch[..HEADER.len()] != HEADER {
    return Err(Error::bad_patch("missing \"PATCH\" magic"));
  }

  let mut out = source.to_vec();
  let mut cursor = &patch[HEADER.len()..];
  let mut warnings = Vec::new();

  loop {
    if cursor.len() < 3 {
      return Err(Error::bad_patch("truncated IPS record offset"));
    }
    let offset = BigEndian::read_u24(cursor);
    cursor = &cursor[3..];
    if offset == EOF_MARKER {
      break;
    }

    if cursor.len() < 2 {
      return Err(Error::bad_patch("truncated IPS record length"));
    }
    let length = BigEndian::read_u16(cursor) as usize;
    cursor = &cursor[2..];

    let offset = offset as usize;
    if offset > out.len() {
      return Err(Error::PastEnd(format!(
        "record at offset {offset:#08x} starts past the end of a {}-byte output",
        out.len()
      )));
    }

    if length == 0 {
      if cursor.len() < 3 {
        return Err(Error::bad_patch("truncated IPS RLE record"));
      }
      let count = BigEndian::read_u16(cursor) as usize;
      let byte = cursor[2];
      cursor = &cursor[3..];
      if count < 3 {
        warnings.push(Warning::ShortRleRun { offset: offset as u32, count: count as u16 });
      }
      let end = offset + count;
      if end > out.len() {
        out.resize(end, 0);
      }
      out[offset..end].fill(byte);
    } else {
      if cursor.len() < length {
        return Err(Error::bad_patch("truncated IPS literal record"));
      }
      let (data, rest) = cursor.split_at(length);
      cursor = rest;
      let end = offset + length;
      if end > out.len() {
        out.resize(end, 0);
      }
      out[offset..end].copy_from_slice(data);
    }
  }

  // Some third-party encoders append a 3-byte truncation length after EOF
  // to represent a target smaller than source; this encoder never emits
  // one (spec.md requires rejecting a shrinking target at creation), but
  // applying a patch that has one still works, for compatibility.
  if cursor.len() >= 3 {
    let truncated_len = BigEndian::read_u24(cursor) as usize;
    out.truncate(truncated_len.min(out.len()));
  }

  Ok(Outcome { bytes: out, warnings })
}

/// Stage 1: contiguous byte ranges where `source` and `target` disagree,
/// plus a trailing range for any bytes `target` adds past `source`'s length.
fn diff_ranges(source: &[u8], target: &[u8]) -> Vec<(usize, usize)> {
  let mut ranges = Vec::new();
  let common_len = source.len().min(target.len());
  let mut i = 0;
  while i < common_len {
    if source[i] == target[i] {
      i += 1;
      continue;
    }
    let start = i;
    while i < common_len && source[i] != target[i] {
      i += 1;
    }
    ranges.push((start, i - start));
  }
  if target.len() > source.len() {
    ranges.push((source.len(), target.len() - source.len()));
  }
  ranges
}

/// Stage 2: merges adjacent diff ranges separated by a run of unchanged
/// bytes no longer than `max_unchanged_len`, absorbing those unchanged bytes
/// as literal data rather than paying for a second record header. A merge
/// that would grow the combined span past the format's 16-bit length field
/// is refused even when the gap itself is small enough.
fn merge_gaps(ranges: &[(usize, usize)], max_unchanged_len: usize) -> Vec<(usize, usize)> {
  let mut merged: Vec<(usize, usize)> = Vec::new();
  for &(start, len) in ranges {
    if let Some(last) = merged.last_mut() {
      let gap = start - (last.0 + last.1);
      let span = (start + len) - last.0;
      if gap <= max_unchanged_len && span <= MAX_BLOCK_LEN {
        last.1 = span;
        continue;
      }
    }
    merged.push((start, len));
  }
  merged
}

enum Subblock {
  Literal(usize, usize),
  Rle(usize, usize, u8),
}

/// Stage 3: splits one merged range into literal chunks and RLE runs, each
/// respecting the format's 16-bit length field.
fn split_subblocks(start: usize, len: usize, target: &[u8], min_rle_len: usize) -> Vec<Subblock> {
  let end = start + len;
  let mut out = Vec::new();
  let mut literal_start = start;
  let mut i = start;
  while i < end {
    let byte = target[i];
    let mut run_end = i + 1;
    while run_end < end && target[run_end] == byte {
      run_end += 1;
    }
    let run_len = run_end - i;
    if run_len >= min_rle_len {
      push_literal_chunks(&mut out, literal_start, i);
      let mut remaining = run_len;
      let mut pos = i;
      while remaining > 0 {
        let chunk = remaining.min(MAX_BLOCK_LEN);
        out.push(Subblock::Rle(pos, chunk, byte));
        pos += chunk;
        remaining -= chunk;
      }
      literal_start = run_end;
    }
    i = run_end;
  }
  push_literal_chunks(&mut out, literal_start, end);
  out
}

fn push_literal_chunks(out: &mut Vec<Subblock>, start: usize, end: usize) {
  let mut pos = start;
  while pos < end {
    let chunk = (end - pos).min(MAX_BLOCK_LEN);
    out.push(Subblock::Literal(pos, chunk));
    pos += chunk;
  }
}

/// Full IPS encoder: diff, merge, split into records, serialize. See
/// spec.md §4.7.
pub fn create(
  source: &[u8],
  target: &[u8],
  min_rle_len: usize,
  max_unchanged_len: usize,
) -> Result<Vec<u8>, Error> {
  if source.len() > MAX_FILE_SIZE || target.len() > MAX_FILE_SIZE {
    return Err(Error::SizeMismatch(
      "IPS offsets are 24-bit; inputs must not exceed 16 MiB".into(),
    ));
  }
  if target.len() < source.len() {
    return Err(Error::SizeMismatch(
      "the modified file must be at least as large as the original".into(),
    ));
  }

  let raw = diff_ranges(source, target);
  let merged = merge_gaps(&raw, max_unchanged_len);

  let mut out = Vec::from(*HEADER);
  for (start, len) in merged {
    for sub in split_subblocks(start, len, target, min_rle_len) {
      match sub {
        Subblock::Literal(pos, len) => {
          out.extend_from_slice(&encode_offset(pos)?);
          let mut len_buf = [0u8; 2];
          BigEndian::write_u16(&mut len_buf, len as u16);
          out.extend_from_slice(&len_buf);
          out.extend_from_slice(&target[pos..pos + len]);
        }
        Subblock::Rle(pos, len, byte) => {
          out.extend_from_slice(&encode_offset(pos)?);
          out.extend_from_slice(&[0, 0]);
          let mut count_buf = [0u8; 2];
          BigEndian::write_u16(&mut count_buf, len as u16);
          out.extend_from_slice(&count_buf);
          out.push(byte);
        }
      }
    }
  }
  out.extend_from_slice(TRAILER);

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn literal_patch_round_trips() {
    // S1: a handful of scattered single-byte edits, below the RLE floor.
    let source = b"the quick brown fox".to_vec();
    let target = b"the slow brown fax!".to_vec();
    let patch = create(&source, &target, DEFAULT_MIN_RLE_LEN, DEFAULT_MAX_UNCHANGED_LEN).unwrap();
    let outcome = apply(&source, &patch).unwrap();
    assert_eq!(outcome.bytes, target);
  }

  #[test]
  fn long_run_of_one_byte_is_encoded_as_rle() {
    // S2: a 200-byte run should become a single RLE record, not 200 literal
    // bytes.
    let source = vec![0u8; 200];
    let mut target = source.clone();
    target.iter_mut().for_each(|b| *b = 0xaa);
    let patch = create(&source, &target, DEFAULT_MIN_RLE_LEN, DEFAULT_MAX_UNCHANGED_LEN).unwrap();
    // header(5) + offset(3) + zero-length(2) + count(2) + byte(1) + EOF(3)
    assert_eq!(patch.len(), 5 + 3 + 2 + 2 + 1 + 3);
    let outcome = apply(&source, &patch).unwrap();
    assert_eq!(outcome.bytes, target);
  }

  #[test]
  fn growing_target_appends_past_source_length() {
    let source = b"abc".to_vec();
    let target = b"abcdef".to_vec();
    let patch = create(&source, &target, DEFAULT_MIN_RLE_LEN, DEFAULT_MAX_UNCHANGED_LEN).unwrap();
    let outcome = apply(&source, &patch).unwrap();
    assert_eq!(outcome.bytes, target);
  }

  #[test]
  fn encoder_rejects_a_target_smaller_than_source() {
    let source = b"abcdefghij".to_vec();
    let target = b"abcdef".to_vec();
    let err =
      create(&source, &target, DEFAULT_MIN_RLE_LEN, DEFAULT_MAX_UNCHANGED_LEN).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch(_)));
  }

  #[test]
  fn decoder_applies_a_third_party_truncation_trailer() {
    // Some IPS tools append "EOF" followed by a 3-byte truncated length;
    // this encoder never emits one, but the decoder still honors it.
    let source = b"abcdefghij".to_vec();
    let mut patch = Vec::from(*HEADER);
    patch.extend_from_slice(TRAILER);
    patch.extend_from_slice(&encode_offset(6).unwrap());
    let outcome = apply(&source, &patch).unwrap();
    assert_eq!(outcome.bytes, b"abcdef");
  }

  #[test]
  fn a_record_at_the_eof_offset_is_read_back_as_the_trailer() {
    // S6: a hand-built patch whose sole record sits at offset 0x454f46 gets
    // mistaken for EOF before its length/data are ever read — the bug
    // spec.md requires preserving, not fixing.
    let source = vec![0u8; 0x45_4f49];
    let mut patch = Vec::from(*HEADER);
    patch.extend_from_slice(&encode_offset(0x45_4f46).unwrap());
    patch.extend_from_slice(&[0x00, 0x03]);
    patch.extend_from_slice(b"xyz");
    patch.extend_from_slice(TRAILER);

    let outcome = apply(&source, &patch).unwrap();
    assert_eq!(outcome.bytes, source, "the record was swallowed by the early EOF");
  }

  #[test]
  fn decoder_rejects_an_offset_that_leaves_a_gap() {
    let mut patch = Vec::from(*HEADER);
    patch.extend_from_slice(&encode_offset(50).unwrap());
    patch.extend_from_slice(&[0x00, 0x01]);
    patch.push(b'x');
    patch.extend_from_slice(TRAILER);

    let err = apply(&[0u8; 4], &patch).unwrap_err();
    assert!(matches!(err, Error::PastEnd(_)));
  }

  #[test]
  fn decoder_warns_on_suspiciously_short_rle_run() {
    let mut patch = Vec::from(*HEADER);
    patch.extend_from_slice(&encode_offset(0).unwrap());
    patch.extend_from_slice(&[0x00, 0x00]);
    patch.extend_from_slice(&[0x00, 0x02]); // count = 2, below the floor of 3
    patch.push(b'x');
    patch.extend_from_slice(TRAILER);

    let outcome = apply(&[0u8; 4], &patch).unwrap();
    assert!(outcome
      .warnings
      .iter()
      .any(|w| matches!(w, Warning::ShortRleRun { count: 2, .. })));
  }

  #[test]
  fn merge_refuses_to_grow_a_span_past_the_block_length_field() {
    // Two far-apart edits with a small gap between them: the gap check
    // alone would merge them, but the fused span would exceed 0xffff, so
    // they must stay separate records.
    let ranges = vec![(0, 4), (MAX_BLOCK_LEN, 4)];
    let merged = merge_gaps(&ranges, MAX_BLOCK_LEN);
    assert_eq!(merged, ranges);
  }

  #[test]
  fn encoder_rejects_inputs_over_the_16_mib_bound() {
    let huge = vec![0u8; MAX_FILE_SIZE + 1];
    let err = create(&huge, &[], DEFAULT_MIN_RLE_LEN, DEFAULT_MAX_UNCHANGED_LEN).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch(_)));
  }

  #[test]
  fn rle_threshold_is_exactly_min_rle_len() {
    // A run one byte short of the threshold stays a literal record; a run
    // exactly at the threshold becomes RLE.
    let min_rle = 9;
    for (k, expect_rle) in [(min_rle - 1, false), (min_rle, true)] {
      let source = vec![0u8; 20];
      let mut target = source.clone();
      target[5..5 + k].fill(0xaa);
      let patch = create(&source, &target, min_rle, 0).unwrap();
      let is_rle = patch[5 + 3..5 + 3 + 2] == [0, 0];
      assert_eq!(is_rle, expect_rle, "run length {k} vs threshold {min_rle}");
      let outcome = apply(&source, &patch).unwrap();
      assert_eq!(outcome.bytes, target);
    }
  }

  #[test]
  fn gap_merge_absorbs_short_unchanged_runs_into_one_record() {
    let source = vec![0u8; 20];
    let mut target = source.clone();
    target[2] = 1;
    target[5] = 1; // 2-byte unchanged gap between the two edits
    let patch = create(&source, &target, DEFAULT_MIN_RLE_LEN, 2).unwrap();
    // one merged literal record covering [2, 6): header(5) + offset(3) +
    // len(2) + 4 data bytes + EOF(3)
    assert_eq!(patch.len(), 5 + 3 + 2 + 4 + 3);
    let outcome = apply(&source, &patch).unwrap();
    assert_eq!(outcome.bytes, target);
  }
}
