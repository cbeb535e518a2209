//! Convert a UTF-8/ASCII text file to Elliott 900 telecode, suitable for
//! feeding to the emulator's paper tape reader.
//!
//! The literal sequence `<! HALT !>` is translated to the single telecode
//! byte 20 (the loader's end-of-tape marker); every other ASCII byte is
//! written with odd-bit parity added (the low 7 bits plus a parity bit
//! that makes the total number of set bits even). Bytes outside the
//! printable ASCII range are reported and dropped rather than encoded,
//! since 900 telecode has no representation for them.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

const HALT_MARKER: &[u8] = b"<! HALT !>";
const HALT_CODE: u8 = 20;

/// Convert text to Elliott 900 telecode.
#[derive(Debug, Parser)]
#[command(name = "to900text", version, about)]
struct Args {
    /// Input text file.
    input: PathBuf,

    /// Output telecode file.
    #[arg(default_value = ".reader")]
    output: PathBuf,
}

/// Add a parity bit (bit 7) so the total number of set bits is even.
fn add_parity(code: u8) -> u8 {
    if code.count_ones() % 2 == 1 {
        code | 0x80
    } else {
        code
    }
}

fn convert(input: &[u8], mut out: impl Write) -> std::io::Result<()> {
    let mut pending: Vec<u8> = Vec::new();
    for &byte in input {
        if byte > 127 {
            eprintln!("Non-ASCII character ({byte}) in input ignored");
            continue;
        }
        if byte == HALT_MARKER[pending.len()] {
            pending.push(byte);
            if pending.len() == HALT_MARKER.len() {
                out.write_all(&[HALT_CODE])?;
                pending.clear();
            }
        } else {
            for &buffered in &pending {
                out.write_all(&[add_parity(buffered)])?;
            }
            pending.clear();
            out.write_all(&[add_parity(byte)])?;
        }
    }
    // A partial match still pending at end of file is discarded rather
    // than flushed, matching the original converter's behavior.
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
    fn halt_marker_becomes_code_20() {
        let mut out = Vec::new();
        convert(HALT_MARKER, &mut out).unwrap();
        assert_eq!(out, vec![HALT_CODE]);
    }

    #[test]
    fn ordinary_text_gets_parity_added() {
        let mut out = Vec::new();
        convert(b"A", &mut out).unwrap();
        assert_eq!(out, vec![add_parity(b'A')]);
    }

    #[test]
    fn add_parity_makes_set_bit_count_even() {
        for byte in 0u8..=127 {
            assert_eq!(add_parity(byte).count_ones() % 2, 0);
        }
    }

    #[test]
    fn partial_halt_prefix_followed_by_mismatch_is_flushed_literally() {
        let mut out = Vec::new();
        convert(b"<!X", &mut out).unwrap();
        assert_eq!(
            out,
            vec![add_parity(b'<'), add_parity(b'!'), add_parity(b'X')]
        );
    }
}
