//! Logging setup, grounded on the teacher's `log.rs`. Named `logging` rather
//! than `log` so this module never shadows the `log` crate it configures.

/// Installs a `pretty_env_logger` subscriber. `verbosity` is the number of
/// times `-v` was given on the command line; 0 shows warnings and above, and
/// each additional `-v` drops the floor by one level.
pub fn init(verbosity: u8) {
  let level = match verbosity {
    0 => log::LevelFilter::Warn,
    1 => log::LevelFilter::Info,
    2 => log::LevelFilter::Debug,
    _ => log::LevelFilter::Trace,
  };
  pretty_env_logger::formatted_builder()
    .filter_level(level)
    .init();
}
