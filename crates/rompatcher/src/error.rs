//! The CLI-level error type: everywhere `patch::Error` meets the filesystem.
//! The core `patch::Error` stays filesystem-free (see its module docs);
//! this is the one layer up that actually opens files, so it's the one
//! that owns an I/O variant, following the same split the teacher draws
//! between its per-format `PatchingError` and its outer `apply::Error`.
//!
//! The optional `--input-crc`/`--output-crc` checks spec.md §6 exposes are
//! `ChecksumWarning`-class (spec.md §7: "non-fatal ... output is still
//! delivered"), so a mismatch is reported via `patch::Warning`, not this
//! type — there is no fatal variant for it here.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum Error {
  #[error(transparent)]
  #[diagnostic(code(rompatcher::io))]
  Io(#[from] std::io::Error),
  #[error("refusing to overwrite existing file \"{}\"", .0.display())]
  #[diagnostic(code(rompatcher::already_exists))]
  AlreadyExists(PathBuf),
  #[error(transparent)]
  #[diagnostic(transparent)]
  Patch(#[from] crate::patch::Error),
}

impl rompatcher_err::FromIoError for Error {
  fn from_io_error(err: std::io::Error) -> Self {
    Error::Io(err)
  }

  fn already_exists(path: &std::path::Path) -> Self {
    Error::AlreadyExists(path.to_owned())
  }
}

/// Maps each variant to a distinct nonzero process exit code, the way the
/// teacher's old `main.rs` mapped its own `apply::ErrorKind`.
impl Error {
  pub fn exit_code(&self) -> u8 {
    match self {
      Error::Io(_) => 1,
      Error::AlreadyExists(_) => 2,
      Error::Patch(_) => 3,
    }
  }
}
