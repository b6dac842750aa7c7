//! File-boundary helpers. The teacher's own `fs.rs` is about tracking a
//! `HasPath` capability across generic readers/writers for its streaming
//! design; since this crate's core works on whole in-memory buffers (no
//! streaming, per spec.md's Non-goals), all that's needed here is "read a
//! whole file" and "write a whole file without clobbering one that already
//! exists" — both via `fs_err` for its path-annotated error messages,
//! same as the teacher.

use crate::error::Error;
use rompatcher_err::prelude::*;
use std::path::Path;

pub fn read(path: &Path) -> Result<Vec<u8>, Error> {
  fs_err::read(path).map_io_err()
}

/// Writes `data` to `path`, refusing to overwrite a pre-existing file —
/// applying or creating a patch should never silently clobber a ROM or
/// patch already sitting at the destination.
pub fn write_new(path: &Path, data: &[u8]) -> Result<(), Error> {
  if path.exists() {
    return Err(Error::already_exists(path));
  }
  fs_err::write(path, data).map_io_err()
}
