//! Dispatch between the two patch formats this crate implements, plus the
//! error/warning taxonomy shared by both codecs.
//!
//! The teacher's `patch::mod` also dispatches UPS/PPF/Vcdiff through a
//! `Patcher` enum; this crate only implements BPS and IPS (spec.md's scope),
//! so `Kind` has two variants instead of five and there's no `Patcher`
//! wrapper type — `Kind::apply`/`Kind::create` call straight into `bps`/`ips`.

pub mod bps;
pub mod ips;
mod varint;

use crate::crc::Crc32;
use std::fmt;
use std::path::{Path, PathBuf};

/// Fatal error kinds, matching spec.md §7's taxonomy. `IoError` lives one
/// layer up, in [`crate::fs`], since the core here never touches a
/// filesystem — it only ever sees byte slices.
#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
pub enum Error {
  #[error("patch file is corrupt: {0}")]
  #[diagnostic(code(rompatcher::bad_patch))]
  BadPatch(String),
  #[error("patch block references data out of range: {0}")]
  #[diagnostic(code(rompatcher::invalid_read))]
  InvalidRead(String),
  #[error("patch record writes past the end of the output: {0}")]
  #[diagnostic(code(rompatcher::past_end))]
  PastEnd(String),
  #[error("inputs are not compatible with this encoder: {0}")]
  #[diagnostic(code(rompatcher::size_mismatch))]
  SizeMismatch(String),
  #[error("\"{}\" has no recognized patch extension (expected .bps or .ips)", .0.display())]
  #[diagnostic(code(rompatcher::unknown_format))]
  UnknownFormat(PathBuf),
}

impl Error {
  pub(crate) fn bad_patch(msg: impl Into<String>) -> Self {
    Error::BadPatch(msg.into())
  }

  pub(crate) fn invalid_read(msg: impl Into<String>) -> Self {
    Error::InvalidRead(msg.into())
  }
}

/// A non-fatal condition surfaced alongside successfully produced output,
/// per spec.md §7's `ChecksumWarning` class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
  UnsupportedBpsVersion(u8),
  HeaderSourceSizeMismatch { header: u64, actual: u64 },
  HeaderTargetSizeMismatch { header: u64, actual: u64 },
  SourceCrcMismatch { expected: Crc32, actual: Crc32 },
  TargetCrcMismatch { expected: Crc32, actual: Crc32 },
  PatchCrcMismatch { expected: Crc32, actual: Crc32 },
  InputCrcMismatch { expected: Crc32, actual: Crc32 },
  OutputCrcMismatch { expected: Crc32, actual: Crc32 },
  ShortRleRun { offset: u32, count: u16 },
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Warning::UnsupportedBpsVersion(byte) => {
        write!(f, "possibly unsupported BPS version byte {byte:#04x}")
      }
      Warning::HeaderSourceSizeMismatch { header, actual } => write!(
        f,
        "header declares source size {header} but input is {actual} bytes"
      ),
      Warning::HeaderTargetSizeMismatch { header, actual } => write!(
        f,
        "header declares target size {header} but output is {actual} bytes"
      ),
      Warning::SourceCrcMismatch { expected, actual } => {
        write!(f, "source CRC32 mismatch: expected {expected}, got {actual}")
      }
      Warning::TargetCrcMismatch { expected, actual } => {
        write!(f, "target CRC32 mismatch: expected {expected}, got {actual}")
      }
      Warning::PatchCrcMismatch { expected, actual } => {
        write!(f, "patch CRC32 mismatch: expected {expected}, got {actual}")
      }
      Warning::InputCrcMismatch { expected, actual } => {
        write!(f, "input CRC32 mismatch: expected {expected}, got {actual}")
      }
      Warning::OutputCrcMismatch { expected, actual } => {
        write!(f, "output CRC32 mismatch: expected {expected}, got {actual}")
      }
      Warning::ShortRleRun { offset, count } => write!(
        f,
        "RLE run at offset {offset:#08x} has suspiciously short count {count}"
      ),
    }
  }
}

/// The output of a successful decode or encode: the produced bytes plus any
/// non-fatal warnings collected along the way.
#[derive(Debug, Clone)]
pub struct Outcome {
  pub bytes: Vec<u8>,
  pub warnings: Vec<Warning>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
  Bps,
  Ips,
}

impl Kind {
  /// Dispatches on a patch (apply) or output (create) file extension, per
  /// spec.md §6: `.bps` -> BPS, `.ips` -> IPS, anything else is an error.
  pub fn from_extension(path: &Path) -> Result<Self, Error> {
    match path.extension().and_then(|ext| ext.to_str()) {
      Some(ext) if ext.eq_ignore_ascii_case("bps") => Ok(Kind::Bps),
      Some(ext) if ext.eq_ignore_ascii_case("ips") => Ok(Kind::Ips),
      _ => Err(Error::UnknownFormat(path.to_owned())),
    }
  }

  pub fn apply(self, source: &[u8], patch: &[u8]) -> Result<Outcome, Error> {
    match self {
      Kind::Bps => bps::apply(source, patch),
      Kind::Ips => ips::apply(source, patch),
    }
  }
}

impl fmt::Display for Kind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Kind::Bps => write!(f, "BPS"),
      Kind::Ips => write!(f, "IPS"),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dispatches_by_extension_case_insensitively() {
    assert_eq!(Kind::from_extension(Path::new("a.bps")).unwrap(), Kind::Bps);
    assert_eq!(Kind::from_extension(Path::new("a.IPS")).unwrap(), Kind::Ips);
    assert!(Kind::from_extension(Path::new("a.ups")).is_err());
    assert!(Kind::from_extension(Path::new("a")).is_err());
  }
}
