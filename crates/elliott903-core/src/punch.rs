//! Paper tape punch: an append-only byte stream capped at one reel.

use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;

use crate::MachineError;

/// One reel of paper tape, in characters. Shared with the teletype output
/// cap and with `elliott903-tools`' `reverse` utility.
pub const REEL_LENGTH: usize = 1000 * 12 * 10;

/// Lazily-opened paper tape punch.
pub struct Punch {
    path: PathBuf,
    file: Option<File>,
    written: usize,
}

impl Punch {
    /// Create a punch bound to `path`, not yet opened.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            file: None,
            written: 0,
        }
    }

    fn ensure_open(&mut self) -> Result<(), MachineError> {
        if self.file.is_some() {
            return Ok(());
        }
        let file = File::create(&self.path).map_err(|e| MachineError::Io {
            path: self.path.display().to_string(),
            source: e,
        })?;
        log::info!("paper tape punch file {} opened", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    /// Punch one byte.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Io`] if the file cannot be opened or
    /// written, or [`MachineError::PunchCapReached`] once a full reel has
    /// been punched.
    pub fn punch_byte(&mut self, byte: u8) -> Result<(), MachineError> {
        if self.written >= REEL_LENGTH {
            return Err(MachineError::PunchCapReached);
        }
        self.ensure_open()?;
        self.file
            .as_mut()
            .expect("opened above")
            .write_all(&[byte])
            .map_err(|e| MachineError::Io {
                path: self.path.display().to_string(),
                source: e,
            })?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punch_writes_bytes_in_call_order() {
        let dir = std::env::temp_dir().join(format!("elliott903-punch-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".punch");

        let mut punch = Punch::new(path.clone());
        punch.punch_byte(b'H').unwrap();
        punch.punch_byte(b'i').unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"Hi");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn punch_cap_stops_after_one_reel() {
        let dir = std::env::temp_dir().join(format!("elliott903-punch-cap-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".punch");

        let mut punch = Punch::new(path);
        for _ in 0..REEL_LENGTH {
            punch.punch_byte(0).unwrap();
        }
        assert!(matches!(
            punch.punch_byte(0),
            Err(MachineError::PunchCapReached)
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
