use std::io;

pub mod prelude {
  pub use super::*;
}

/// Implemented by a crate's top-level error type so file-boundary code can
/// convert a raw [`io::Error`] without repeating a `From` impl everywhere
/// a file gets opened, read, or written.
pub trait FromIoError {
  fn from_io_error(err: io::Error) -> Self;

  /// The destination path already exists and must not be overwritten.
  fn already_exists(path: &std::path::Path) -> Self;
}

pub trait IoResultExt<T> {
  fn map_io_err<E: FromIoError>(self) -> Result<T, E>;
}

impl<T> IoResultExt<T> for io::Result<T> {
  fn map_io_err<E: FromIoError>(self) -> Result<T, E> {
    self.map_err(E::from_io_error)
  }
}
