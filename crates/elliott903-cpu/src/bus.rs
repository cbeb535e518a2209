//! Store and peripheral access trait.
//!
//! The [`Bus`] trait is the seam between [`crate::Cpu`] and everything
//! else: the 16384-word store (including the memory-mapped SCR/B
//! registers) and the four peripherals reachable through function 15.
//! Implementors decide how addresses map to storage and how I/O
//! instructions reach real files; the CPU core never opens a file or
//! holds peripheral state itself.

use crate::StepError;

/// Store and peripheral access required to execute one instruction.
pub trait Bus {
    /// Read the word at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::OutOfBounds`] if `addr` is not a valid store
    /// address.
    fn read(&mut self, addr: u32) -> Result<u32, StepError>;

    /// Write `value` to `addr`.
    ///
    /// Implementors are responsible for masking `value` to 18 bits and for
    /// the Initial-Orders write guard (§4.1 Store A guard): that guard is a
    /// property of function 5 only, so [`crate::Cpu::step`] decides whether
    /// to call this method at all rather than this trait silently
    /// discarding the write.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::OutOfBounds`] if `addr` is not a valid store
    /// address.
    fn write(&mut self, addr: u32, value: u32) -> Result<(), StepError>;

    /// Read one byte from the paper tape reader.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::ReaderExhausted`] when the tape has run out, or
    /// [`StepError::Environment`] if the backing file cannot be opened.
    fn read_tape(&mut self) -> Result<u8, StepError>;

    /// Read one byte from the teletype input stream.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::TtyExhausted`] when the input has run out, or
    /// [`StepError::Environment`] if the backing file cannot be opened.
    fn read_tty(&mut self) -> Result<u8, StepError>;

    /// Punch one byte to the paper tape punch.
    ///
    /// # Errors
    ///
    /// Returns [`StepError::PunchCapReached`] once a full reel has been
    /// punched, or [`StepError::Environment`] if the backing file cannot be
    /// opened or written.
    fn write_punch(&mut self, byte: u8) -> Result<(), StepError>;

    /// Write one byte to the teletype output stream.
    ///
    /// Never fails: non-printable bytes are silently filtered by the
    /// implementor (§4.2, §7 "Silent policy").
    fn write_tty(&mut self, byte: u8);

    /// Issue a plotter command word (the low 18 bits of A at the time of
    /// the I/O instruction).
    fn plotter_command(&mut self, word: u32);
}
