//! Teletype input (with local echo) and output (printable filter, line
//! flushing before diagnostics).

use std::fs::File;
use std::io::{Read as _, Write as _};
use std::path::PathBuf;

use crate::punch::REEL_LENGTH;
use crate::MachineError;

/// Lazily-opened teletype input stream.
pub struct TeletypeInput {
    path: PathBuf,
    file: Option<File>,
}

impl TeletypeInput {
    /// Create an input stream bound to `path`, not yet opened.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    fn ensure_open(&mut self) -> Result<(), MachineError> {
        if self.file.is_some() {
            return Ok(());
        }
        let file = File::open(&self.path).map_err(|e| MachineError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        log::info!("teletype input file {} opened", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    /// Read one raw byte. The caller is responsible for echoing it via
    /// [`TeletypeOutput`] (echo is 7-bit masked, as in the hardware).
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Io`] if the file cannot be opened, or
    /// [`MachineError::TtyExhausted`] once input is exhausted.
    pub fn read_byte(&mut self) -> Result<u8, MachineError> {
        self.ensure_open()?;
        let mut buf = [0u8; 1];
        let n = self
            .file
            .as_mut()
            .expect("opened above")
            .read(&mut buf)
            .map_err(|e| MachineError::Io {
                path: self.path.display().to_string(),
                source: e,
            })?;
        if n == 0 {
            log::info!("run off end of teleprinter input");
            Err(MachineError::TtyExhausted)
        } else {
            Ok(buf[0])
        }
    }
}

/// Teletype output: standard output, with a printable-ASCII filter and a
/// shadow of the last byte written so diagnostics can force a newline
/// before interleaving (the "never mid-line" ordering contract).
pub struct TeletypeOutput {
    last_byte: Option<u8>,
    punched: usize,
}

impl TeletypeOutput {
    /// A fresh output stream with no history.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_byte: None,
            punched: 0,
        }
    }

    /// Write `byte` after masking to 7 bits; only newline and printable
    /// ASCII in `[0x20, 0x7A]` are emitted, everything else is dropped
    /// silently. Once a full reel (the same cap punch output observes)
    /// has been written, further bytes are silently dropped rather than
    /// terminating the run: unlike the punch, function 15's teletype
    /// write (z=6148) has no dedicated exit code in the original's exit
    /// status table, so this one-reel cap is enforced as an output bound
    /// only, not a clean-termination trigger.
    pub fn write_byte(&mut self, byte: u8) {
        let masked = byte & 0x7F;
        let filtered = if masked == b'\n' || (0x20..=0x7A).contains(&masked) {
            Some(masked)
        } else {
            None
        };
        if let Some(ch) = filtered {
            if self.punched >= REEL_LENGTH {
                return;
            }
            print!("{}", ch as char);
            let _ = std::io::stdout().flush();
            self.last_byte = Some(ch);
            self.punched += 1;
        }
    }

    /// Echo a byte read from teletype input, masked to 7 bits, to
    /// standard output directly (local echo, unfiltered).
    pub fn echo(&mut self, byte: u8) {
        let masked = byte & 0x7F;
        print!("{}", masked as char);
        let _ = std::io::stdout().flush();
        self.last_byte = Some(masked);
    }

    /// Force a trailing newline if the last byte written wasn't one,
    /// matching the hardware's "never interleave diagnostics mid-line"
    /// rule.
    pub fn flush_line(&mut self) {
        if let Some(last) = self.last_byte {
            if last != b'\n' {
                println!();
                self.last_byte = None;
            }
        }
    }
}

impl Default for TeletypeOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_printable_bytes_are_dropped() {
        let mut out = TeletypeOutput::new();
        out.write_byte(0x01); // control char, dropped
        assert_eq!(out.last_byte, None);
    }

    #[test]
    fn printable_bytes_update_last_byte() {
        let mut out = TeletypeOutput::new();
        out.write_byte(b'A');
        assert_eq!(out.last_byte, Some(b'A'));
    }

    #[test]
    fn flush_line_is_a_no_op_after_newline() {
        let mut out = TeletypeOutput::new();
        out.write_byte(b'\n');
        assert_eq!(out.last_byte, Some(b'\n'));
        out.flush_line();
        assert_eq!(out.last_byte, Some(b'\n'));
    }

    #[test]
    fn missing_input_file_yields_io_error() {
        let mut input = TeletypeInput::new(PathBuf::from("/nonexistent/elliott903-ttyin-test"));
        assert!(matches!(input.read_byte(), Err(MachineError::Io { .. })));
    }
}
