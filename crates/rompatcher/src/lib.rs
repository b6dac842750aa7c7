//! IPS and BPS ROM patch creation and application, as a library the `main`
//! binary (and tests) build on — same split the teacher draws between its
//! `rompatcher` library crate and its thin CLI front-end.

pub mod cli;
pub mod crc;
pub mod error;
pub mod fs;
pub mod logging;
pub mod patch;
