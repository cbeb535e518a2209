//! Convert an Elliott 900 telecode file (as punched by the emulator) back
//! to plain ASCII text.
//!
//! The parity bit is stripped from every byte; only newline and printable
//! ASCII `[0x20, 0x7A]` survive the filter. A trailing newline is forced
//! onto non-empty output that doesn't already end with one.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Convert Elliott 900 telecode to ASCII text.
#[derive(Debug, Parser)]
#[command(name = "from900text", version, about)]
struct Args {
    /// Input telecode file.
    #[arg(short, long, default_value = ".punch")]
    input: PathBuf,

    /// Output text file.
    #[arg(short, long, default_value = ".ascii")]
    output: PathBuf,
}

fn convert(input: &[u8], mut out: impl Write) -> std::io::Result<()> {
    let mut wrote_any = false;
    let mut ends_with_newline = false;
    for &byte in input {
        let ch = byte & 0x7F;
        if ch == b'\n' || (0x20..=0x7A).contains(&ch) {
            out.write_all(&[ch])?;
            wrote_any = true;
            ends_with_newline = ch == b'\n';
        }
    }
    if wrote_any && !ends_with_newline {
        out.write_all(b"\n")?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut input = Vec::new();
    if let Err(e) = File::open(&args.input).and_then(|mut f| f.read_to_end(&mut input)) {
        eprintln!("Cannot open input file: {e}");
        return ExitCode::FAILURE;
    }

    let output = match File::create(&args.output) {
        Ok(f) => BufWriter::new(f),
        Err(e) => {
            eprintln!("Cannot open output file: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = convert(&input, output) {
        eprintln!("Unexpected error with output file: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_bit_is_stripped() {
        let mut out = Vec::new();
        convert(&[b'A' | 0x80], &mut out).unwrap();
        assert_eq!(out, b"A");
    }

    #[test]
    fn control_characters_other_than_newline_are_dropped() {
        let mut out = Vec::new();
        convert(&[1, 2, 3], &mut out).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn missing_trailing_newline_is_added() {
        let mut out = Vec::new();
        convert(b"hi", &mut out).unwrap();
        assert_eq!(out, b"hi\n");
    }

    #[test]
    fn existing_trailing_newline_is_not_duplicated() {
        let mut out = Vec::new();
        convert(b"hi\n", &mut out).unwrap();
        assert_eq!(out, b"hi\n");
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let mut out = Vec::new();
        convert(b"", &mut out).unwrap();
        assert!(out.is_empty());
    }
}
