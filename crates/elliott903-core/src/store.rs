//! The 16384-word store and the Initial Orders bootstrap.

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use elliott903_cpu::masks::STORE_SIZE;

use crate::MachineError;

/// Store words 8180..=8191 hold the Initial Orders and are immutable from
/// priority level 1.
pub const INITIAL_ORDERS_START: u32 = 8180;
/// One past the last Initial Orders word.
pub const INITIAL_ORDERS_END: u32 = 8192;

const fn make_instruction(b_flag: bool, f: u32, a: u32) -> u32 {
    ((b_flag as u32) << 17) | (f << 13) | a
}

/// The fixed 12-word bootstrap loader, word 8180 first.
///
/// Word 8180 holds -3 (two's complement in 18 bits); the remaining eleven
/// words are the reader-driven bootstrap loop described by the (B-flag,
/// f, a) triples in the hardware's Initial Orders listing.
fn initial_orders() -> [u32; 12] {
    const NEG_THREE: u32 = (-3i32 as u32) & elliott903_cpu::masks::MASK18;
    [
        NEG_THREE,
        make_instruction(false, 0, 8180),
        make_instruction(false, 4, 8189),
        make_instruction(false, 15, 2048),
        make_instruction(false, 9, 8186),
        make_instruction(false, 8, 8183),
        make_instruction(false, 15, 2048),
        make_instruction(true, 5, 8180),
        make_instruction(false, 10, 1),
        make_instruction(false, 4, 1),
        make_instruction(false, 9, 8182),
        make_instruction(false, 8, 8177),
    ]
}

/// The emulated 16384-word core store.
#[derive(Debug, Clone)]
pub struct Store {
    words: Vec<u32>,
}

impl Store {
    /// A zeroed store with the Initial Orders already in place.
    #[must_use]
    pub fn new() -> Self {
        let mut store = Self {
            words: vec![0; STORE_SIZE as usize],
        };
        store.load_initial_orders();
        store
    }

    /// Write the Initial Orders over words 8180..=8191, unconditionally.
    pub fn load_initial_orders(&mut self) {
        for (offset, word) in initial_orders().into_iter().enumerate() {
            self.words[INITIAL_ORDERS_START as usize + offset] = word;
        }
        log::debug!("initial orders loaded");
    }

    /// Read a store word, masked to 18 bits.
    #[must_use]
    pub fn get(&self, addr: u32) -> u32 {
        self.words[addr as usize]
    }

    /// Set a store word. Callers are responsible for the Initial-Orders
    /// write guard; this method always writes.
    pub fn set(&mut self, addr: u32, value: u32) {
        self.words[addr as usize] = value & elliott903_cpu::masks::MASK18;
    }

    /// Total number of words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Whether the store is empty (never true for a constructed `Store`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Load a store image from `path` if it exists, overlaying words
    /// `0..n` read from it; a missing file leaves the store zeroed. The
    /// Initial Orders are reloaded afterwards so a stale image can never
    /// corrupt the bootstrap.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::StoreImageTooLarge`] if the file contains
    /// more than [`STORE_SIZE`] values, or [`MachineError::StoreImageMalformed`]
    /// if a token fails to parse as a decimal integer.
    pub fn load_image(&mut self, path: &Path) -> Result<(), MachineError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let mut count = 0usize;
                for token in contents.split_ascii_whitespace() {
                    if count >= STORE_SIZE as usize {
                        return Err(MachineError::StoreImageTooLarge {
                            path: path.display().to_string(),
                        });
                    }
                    let value: i64 = token.parse().map_err(|_| MachineError::StoreImageMalformed {
                        path: path.display().to_string(),
                        token: token.to_string(),
                    })?;
                    self.words[count] = value as u32;
                    count += 1;
                }
                log::info!("{count} words read in from {}", path.display());
            }
            Err(_) => {
                log::info!("no {} file found, store left empty", path.display());
            }
        }
        self.load_initial_orders();
        Ok(())
    }

    /// Write the entire store to `path`, 7-character fixed-width decimal
    /// fields with a newline after every tenth word, matching the
    /// original image format exactly (so `.store` files remain
    /// interchangeable with the reference tool).
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Io`] if `path` cannot be opened or written.
    pub fn save_image(&self, path: &Path) -> Result<(), MachineError> {
        let mut out = String::with_capacity(self.words.len() * 8);
        for (i, word) in self.words.iter().enumerate() {
            let _ = write!(out, "{word:7}");
            if i % 10 == 0 && i != 0 {
                out.push('\n');
            }
        }
        let mut file = fs::File::create(path).map_err(|e| MachineError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        file.write_all(out.as_bytes())
            .map_err(|e| MachineError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        log::info!("{STORE_SIZE} words written out to {}", path.display());
        Ok(())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_has_initial_orders_preloaded() {
        let store = Store::new();
        assert_eq!(store.get(8181), make_instruction(false, 0, 8180));
        assert_eq!(store.get(8191), make_instruction(false, 8, 8177));
    }

    #[test]
    fn negative_three_is_represented_in_18_bit_twos_complement() {
        let store = Store::new();
        assert_eq!(store.get(8180), 0x3_FFFD);
    }

    #[test]
    fn load_image_round_trips_through_save_image() {
        let dir = std::env::temp_dir().join(format!("elliott903-store-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".store");

        let mut store = Store::new();
        store.set(100, 42);
        store.save_image(&path).unwrap();

        let mut reloaded = Store::new();
        reloaded.load_image(&path).unwrap();
        assert_eq!(reloaded.get(100), 42);
        // Initial orders still intact after reload.
        assert_eq!(reloaded.get(8191), make_instruction(false, 8, 8177));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_store_file_leaves_store_zeroed_outside_initial_orders() {
        let mut store = Store::new();
        let path = Path::new("/nonexistent/path/.store-elliott903-test");
        store.load_image(path).unwrap();
        assert_eq!(store.get(100), 0);
    }
}
