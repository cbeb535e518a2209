//! Reverse the byte order of a paper tape file, capped at one reel
//! (`1000*12*10` = 120 000 bytes), the same cap the emulator's punch and
//! teletype output peripherals enforce.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// One reel of paper tape, in characters.
const REEL_LENGTH: usize = 1000 * 12 * 10;

/// Reverse a paper tape file.
#[derive(Debug, Parser)]
#[command(name = "reverse", version, about)]
struct Args {
    /// Input tape file.
    #[arg(short, long, default_value = ".punch")]
    input: PathBuf,

    /// Output tape file.
    #[arg(short, long, default_value = ".reverse")]
    output: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    println!(
        "opening input {} output {}",
        args.input.display(),
        args.output.display()
    );

    let mut input = Vec::new();
    if let Err(e) = File::open(&args.input).and_then(|mut f| f.read_to_end(&mut input)) {
        eprintln!("Cannot open input file {}: {e}", args.input.display());
        return ExitCode::FAILURE;
    }

    if input.len() > REEL_LENGTH {
        eprintln!("Input file longer than a reel of paper tape");
        return ExitCode::FAILURE;
    }

    input.reverse();

    let mut output = match File::create(&args.output) {
        Ok(f) => BufWriter::new(f),
        Err(e) => {
            eprintln!("Cannot open output file {}: {e}", args.output.display());
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = output.write_all(&input) {
        eprintln!("Unexpected error with output file: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
