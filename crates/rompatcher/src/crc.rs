//! CRC32 (zlib/IEEE 802.3 polynomial, reflected) with a streaming updater.
//!
//! The patch formats covered here never need more than one pass over any
//! given byte range, so [`Crc32Hasher`] is a thin incremental wrapper
//! around [`crc32fast::Hasher`] rather than the teacher's background-thread
//! design: spec.md's concurrency model is single-threaded and synchronous,
//! so no second thread is spawned to overlap hashing with I/O.

#[repr(transparent)]
#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct Crc32(u32);

impl Crc32 {
  pub fn new(value: u32) -> Self {
    Self(value)
  }

  pub fn value(self) -> u32 {
    self.0
  }

  pub fn of(data: &[u8]) -> Self {
    Self(crc32fast::hash(data))
  }
}

impl From<u32> for Crc32 {
  fn from(value: u32) -> Self {
    Self::new(value)
  }
}

impl std::fmt::Display for Crc32 {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{:08x}", self.0)
  }
}

/// An incremental CRC32 accumulator. Used by the BPS encoder to compute the
/// patch-internal CRC in the same pass that emits each block, instead of
/// rehashing the whole output afterwards.
#[derive(Clone, Default)]
pub struct Crc32Hasher(crc32fast::Hasher);

impl Crc32Hasher {
  pub fn new() -> Self {
    Self(crc32fast::Hasher::new())
  }

  pub fn update(&mut self, bytes: &[u8]) {
    self.0.update(bytes);
  }

  pub fn finish(self) -> Crc32 {
    Crc32(self.0.finalize())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_input_matches_zlib_known_value() {
    assert_eq!(Crc32::of(b"").value(), 0);
  }

  #[test]
  fn incremental_matches_one_shot() {
    let mut hasher = Crc32Hasher::new();
    hasher.update(b"hello, ");
    hasher.update(b"world");
    assert_eq!(hasher.finish(), Crc32::of(b"hello, world"));
  }
}
