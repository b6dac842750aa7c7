//! Command-line surface, grounded on the teacher's `cli.rs`/`apply.rs`
//! (clap derive, `Apply`/`Validate` subcommands) but with `Validate` swapped
//! for `Create` — this crate can produce patches, not just audit them
//! against a manifest — and with the manifest-backed `RomHack` args dropped,
//! since there's no manifest layer here (spec.md's Non-goals).

use crate::crc::Crc32;
use crate::patch::{bps, ips};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rompatcher", version, about = "Apply and create IPS/BPS patches.")]
pub struct Cli {
  #[command(subcommand)]
  pub command: Command,

  /// Repeat for more detail: warn (default), info, debug, trace.
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Apply a patch to a source file, producing a new output file.
  Apply(ApplyArgs),
  /// Diff two files and write a patch.
  Create(CreateArgs),
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
  pub source: PathBuf,
  pub patch: PathBuf,
  pub output: PathBuf,

  /// Fail instead of applying if the source doesn't match this CRC32.
  #[arg(long, value_parser = parse_crc32)]
  pub input_crc: Option<Crc32>,

  /// Fail after applying if the result doesn't match this CRC32.
  #[arg(long, value_parser = parse_crc32)]
  pub output_crc: Option<Crc32>,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
  pub source: PathBuf,
  pub target: PathBuf,
  pub patch: PathBuf,

  /// Use the easy-path BPS encoder (equal-length inputs only, larger
  /// patches, no substring search). Ignored for `.ips` outputs.
  #[arg(long)]
  pub easy: bool,

  /// Minimum run length BPS will consider copying instead of embedding as
  /// a literal. Ignored for `.ips` outputs.
  #[arg(long, value_parser = clap::value_parser!(u8).range(1..=32), default_value_t = bps::DEFAULT_MIN_COPY_LEN)]
  pub min_copy_len: u8,

  /// Arbitrary bytes stored verbatim in a BPS patch's metadata block.
  /// Ignored for `.ips` outputs.
  #[arg(long)]
  pub metadata: Option<String>,

  /// Minimum repeated-byte run length IPS will encode as an RLE record
  /// instead of literal bytes. Ignored for `.bps` outputs.
  #[arg(long, value_parser = clap::value_parser!(usize).range(1..=16), default_value_t = ips::DEFAULT_MIN_RLE_LEN)]
  pub min_rle_len: usize,

  /// Largest unchanged gap IPS will absorb into a neighboring record
  /// rather than starting a new one. Ignored for `.bps` outputs.
  #[arg(long, value_parser = clap::value_parser!(usize).range(0..=16), default_value_t = ips::DEFAULT_MAX_UNCHANGED_LEN)]
  pub max_unchanged_len: usize,
}

fn parse_crc32(s: &str) -> Result<Crc32, String> {
  u32::from_str_radix(s.trim_start_matches("0x").trim_start_matches("0X"), 16)
    .map(Crc32::new)
    .map_err(|err| format!("'{s}' is not a hex CRC32: {err}"))
}
