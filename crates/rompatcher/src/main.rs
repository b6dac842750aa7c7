//! Thin CLI entry point. Grounded on the teacher's old `src/main.rs`: parse
//! args, init logging, dispatch, map the outer error type to a process exit
//! code via `Termination` instead of `?`-ing straight out of `main` (which
//! would always exit 1).

use clap::Parser;
use rompatcher::cli::{Cli, Command, CreateArgs};
use rompatcher::crc::Crc32;
use rompatcher::error::Error;
use rompatcher::patch::{self, bps, ips, Warning};
use rompatcher::{fs, logging};
use std::process::{ExitCode, Termination};

struct AppResult(Result<(), Error>);

impl Termination for AppResult {
  fn report(self) -> ExitCode {
    match self.0 {
      Ok(()) => ExitCode::SUCCESS,
      Err(err) => {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        ExitCode::from(code)
      }
    }
  }
}

fn main() -> AppResult {
  let cli = Cli::parse();
  logging::init(cli.verbose);
  AppResult(run(cli.command))
}

fn run(command: Command) -> Result<(), Error> {
  match command {
    Command::Apply(args) => apply(args),
    Command::Create(args) => create(args),
  }
}

fn apply(args: rompatcher::cli::ApplyArgs) -> Result<(), Error> {
  let source = fs::read(&args.source)?;
  let patch_bytes = fs::read(&args.patch)?;

  if let Some(expected) = args.input_crc {
    let actual = Crc32::of(&source);
    if actual != expected {
      log::warn!("{}", Warning::InputCrcMismatch { expected, actual });
    }
  }

  let kind = patch::Kind::from_extension(&args.patch)?;
  let outcome = kind.apply(&source, &patch_bytes)?;
  for warning in &outcome.warnings {
    log::warn!("{warning}");
  }

  if let Some(expected) = args.output_crc {
    let actual = Crc32::of(&outcome.bytes);
    if actual != expected {
      log::warn!("{}", Warning::OutputCrcMismatch { expected, actual });
    }
  }

  fs::write_new(&args.output, &outcome.bytes)?;
  log::info!(
    "wrote {} bytes to {}",
    outcome.bytes.len(),
    args.output.display()
  );
  Ok(())
}

fn create(args: CreateArgs) -> Result<(), Error> {
  let source = fs::read(&args.source)?;
  let target = fs::read(&args.target)?;
  let metadata = args.metadata.as_deref().unwrap_or("").as_bytes();

  let kind = patch::Kind::from_extension(&args.patch)?;
  let bytes = match kind {
    patch::Kind::Bps if args.easy => bps::create_easy(&source, &target, metadata)?,
    patch::Kind::Bps => bps::create(&source, &target, args.min_copy_len, metadata)?,
    patch::Kind::Ips => ips::create(&source, &target, args.min_rle_len, args.max_unchanged_len)?,
  };

  fs::write_new(&args.patch, &bytes)?;
  log::info!("wrote {} bytes to {}", bytes.len(), args.patch.display());
  Ok(())
}
