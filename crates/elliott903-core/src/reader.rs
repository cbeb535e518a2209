//! Paper tape reader: a lazily-opened byte stream with end-of-tape
//! detection and residual-tape capture.

use std::fs::File;
use std::io::Read as _;
use std::path::PathBuf;

use crate::MachineError;

/// Lazily-opened paper tape reader.
///
/// The whole file is buffered in memory on first use so that the unread
/// tail can be written back out as the residual-input file on orderly
/// exit, matching the original's "copy remaining bytes" behaviour
/// without reopening the source file mid-run.
pub struct Reader {
    path: PathBuf,
    bytes: Option<Vec<u8>>,
    pos: usize,
}

impl Reader {
    /// Create a reader bound to `path`, not yet opened.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            bytes: None,
            pos: 0,
        }
    }

    fn ensure_open(&mut self) -> Result<(), MachineError> {
        if self.bytes.is_some() {
            return Ok(());
        }
        let mut file = File::open(&self.path).map_err(|e| MachineError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| MachineError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        log::info!("paper tape reader file {} opened", self.path.display());
        self.bytes = Some(bytes);
        Ok(())
    }

    /// Read one byte, advancing the reader.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Io`] if the file cannot be opened, or
    /// [`MachineError::ReaderExhausted`] once every byte has been
    /// consumed.
    pub fn read_byte(&mut self) -> Result<u8, MachineError> {
        self.ensure_open()?;
        let bytes = self.bytes.as_ref().expect("opened above");
        if let Some(&byte) = bytes.get(self.pos) {
            self.pos += 1;
            Ok(byte)
        } else {
            log::info!("run off end of input tape");
            Err(MachineError::ReaderExhausted)
        }
    }

    /// The unread tail of the tape, for writing back out as the
    /// residual-input file. Empty if the reader was never opened.
    #[must_use]
    pub fn residual(&self) -> &[u8] {
        match &self.bytes {
            Some(bytes) => &bytes[self.pos.min(bytes.len())..],
            None => &[],
        }
    }

    /// Whether the reader file has actually been opened.
    ///
    /// Mirrors the original's `tidyExit` guard (`if (ptr != NULL)`): a
    /// run that never executes a tape-read instruction must not touch
    /// the reader file at shutdown, since [`Reader::residual`] can't
    /// otherwise be told apart from "opened, fully consumed".
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.bytes.is_some()
    }
}
