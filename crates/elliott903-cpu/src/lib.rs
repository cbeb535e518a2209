//! Decode/execute core for the Elliott 903 / 920B.
//!
//! This crate emulates the 18-bit instruction set of the Elliott 903 /
//! 920B: fixed 16-way function dispatch, B-register modification, the
//! two priority levels, and the µs-granularity cost-accounting model the
//! original hardware's timing was derived from. It holds no file handles
//! and performs no I/O itself; all store access and peripheral effects
//! are routed through the [`Bus`] trait, so the core can be driven by any
//! memory/peripheral implementation (a bare in-memory array for tests, or
//! the full [`elliott903-core`](https://docs.rs/elliott903-core) machine).
//!
//! # Example
//!
//! ```
//! use elliott903_cpu::{Bus, Cpu, StepError};
//!
//! struct FlatBus {
//!     words: [u32; 16384],
//! }
//!
//! impl Bus for FlatBus {
//!     fn read(&mut self, addr: u32) -> Result<u32, StepError> {
//!         self.words.get(addr as usize).copied().ok_or(StepError::OutOfBounds(addr))
//!     }
//!
//!     fn write(&mut self, addr: u32, value: u32) -> Result<(), StepError> {
//!         *self.words.get_mut(addr as usize).ok_or(StepError::OutOfBounds(addr))? = value;
//!         Ok(())
//!     }
//!
//!     fn read_tape(&mut self) -> Result<u8, StepError> { Err(StepError::ReaderExhausted) }
//!     fn read_tty(&mut self) -> Result<u8, StepError> { Err(StepError::TtyExhausted) }
//!     fn write_punch(&mut self, _byte: u8) -> Result<(), StepError> { Ok(()) }
//!     fn write_tty(&mut self, _byte: u8) {}
//!     fn plotter_command(&mut self, _word: u32) {}
//! }
//!
//! let mut bus = FlatBus { words: [0; 16384] };
//! bus.words[0] = 8181; // SCR for level 1
//! bus.words[8181] = (8 << 13) | 8181; // unconditional jump to self: dynamic stop
//! let mut cpu = Cpu::new();
//! let info = cpu.step(&mut bus).unwrap();
//! assert!(info.dynamic_stop);
//! ```

#![warn(missing_docs)]

mod bus;
mod cpu;
mod function;
mod level;

pub use bus::Bus;
pub use cpu::{Cpu, IoEvent, StepInfo};
pub use function::Function;
pub use level::Level;

/// 18-bit word arithmetic constants.
///
/// Named after the original emulator's `BIT19`/`MASK18`/etc. constants so
/// that the decode/execute code in [`cpu`] reads the same way the
/// hardware description does.
pub mod masks {
    /// Modulus for 18-bit arithmetic (2^18).
    pub const BIT19: u32 = 1 << 18;
    /// Sign bit of an 18-bit word (2^17); also the instruction's B-modifier flag bit.
    pub const BIT18: u32 = 1 << 17;
    /// Mask for an 18-bit word.
    pub const MASK18: u32 = 0x3_FFFF;
    /// Mask for a 16-bit effective address after module-bit combination.
    pub const MASK16: u32 = 0xFFFF;
    /// Mask for the 13-bit address field of an instruction.
    pub const ADDR_MASK: u32 = 0x1FFF;
    /// Mask for the 3 module bits (13..16) inherited from the fetching SCR.
    pub const MOD_MASK: u32 = 0xE000;
    /// Bit position of the module field (shift `addr >> MOD_SHIFT` to get
    /// the module number 0..=7).
    pub const MOD_SHIFT: u32 = 13;
    /// Bit position of the function code field.
    pub const FN_SHIFT: u32 = 13;
    /// Mask for the 4-bit function code field (post-shift).
    pub const FN_MASK: u32 = 0xF;
    /// Size of the emulated store, in words.
    pub const STORE_SIZE: u32 = 16_384;
}

/// Errors that can interrupt a single [`Cpu::step`] call.
///
/// Variants map directly onto the "Fatal ISA" and "Clean termination"
/// error kinds from the machine's error-handling design: the
/// integration layer (`elliott903-core`) is responsible for turning
/// these into the process exit codes, persisting the store first for the
/// clean-termination variants.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StepError {
    /// A store access (SCR fetch, B-modified address, or I/O address) fell
    /// outside the 16384-word store.
    #[error("store address {0} is out of bounds")]
    OutOfBounds(u32),
    /// A function-14 shift count fell in the 2048..=6143 "reserved for I/O"
    /// range, which this emulator does not implement.
    #[error("unsupported i/o-14 shift count {0}")]
    UnsupportedShift(u32),
    /// A function-15 I/O instruction addressed a `z` value with no defined
    /// operation.
    #[error("unsupported i/o instruction, z={0}")]
    UnsupportedIo(u32),
    /// Function 13 (Divide) was executed with a zero divisor.
    #[error("divide by zero at function 13")]
    DivideByZero,
    /// The paper tape reader ran off the end of its input.
    #[error("paper tape reader exhausted")]
    ReaderExhausted,
    /// The teletype input stream ran off the end of its input.
    #[error("teletype input exhausted")]
    TtyExhausted,
    /// The paper tape punch has written a full reel (120,000 characters).
    #[error("paper tape punch exceeded one reel")]
    PunchCapReached,
    /// A peripheral could not be opened or written to.
    #[error("{0}")]
    Environment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestBus {
        store: [u32; masks::STORE_SIZE as usize],
        tape: Vec<u8>,
        tape_pos: usize,
        punched: Vec<u8>,
    }

    impl TestBus {
        fn new() -> Self {
            Self {
                store: [0; masks::STORE_SIZE as usize],
                tape: Vec::new(),
                tape_pos: 0,
                punched: Vec::new(),
            }
        }
    }

    impl Bus for TestBus {
        fn read(&mut self, addr: u32) -> Result<u32, StepError> {
            self.store
                .get(addr as usize)
                .copied()
                .ok_or(StepError::OutOfBounds(addr))
        }

        fn write(&mut self, addr: u32, value: u32) -> Result<(), StepError> {
            *self
                .store
                .get_mut(addr as usize)
                .ok_or(StepError::OutOfBounds(addr))? = value & masks::MASK18;
            Ok(())
        }

        fn read_tape(&mut self) -> Result<u8, StepError> {
            let ch = self
                .tape
                .get(self.tape_pos)
                .copied()
                .ok_or(StepError::ReaderExhausted)?;
            self.tape_pos += 1;
            Ok(ch)
        }

        fn read_tty(&mut self) -> Result<u8, StepError> {
            Err(StepError::TtyExhausted)
        }

        fn write_punch(&mut self, byte: u8) -> Result<(), StepError> {
            self.punched.push(byte);
            Ok(())
        }

        fn write_tty(&mut self, _byte: u8) {}

        fn plotter_command(&mut self, _word: u32) {}
    }

    #[test]
    fn reset_state_starts_at_level_one() {
        let cpu = Cpu::new();
        assert_eq!(cpu.level(), Level::One);
        assert_eq!(cpu.a(), 0);
        assert_eq!(cpu.q(), 0);
    }

    #[test]
    fn add_wraps_at_18_bits() {
        let mut bus = TestBus::new();
        bus.store[0] = 100; // SCR
        bus.store[100] = (1 << 13) | 200; // ADD 200
        bus.store[200] = 1;
        let mut cpu = Cpu::new();
        cpu.set_a(masks::MASK18); // -1
        let info = cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.a(), 0);
        assert_eq!(info.function, 1);
    }

    #[test]
    fn negate_and_add_of_zero_minus_zero_is_zero() {
        let mut bus = TestBus::new();
        bus.store[0] = 100;
        bus.store[100] = (2 << 13) | 200; // NEGATE AND ADD 200
        bus.store[200] = 0;
        let mut cpu = Cpu::new();
        cpu.set_a(0);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.a(), 0);
    }

    #[test]
    fn jump_if_zero_does_not_treat_top_bit_as_negative_zero() {
        // A = 2^17 is "negative -2^17" under two's complement, not zero.
        let mut bus = TestBus::new();
        bus.store[0] = 100;
        bus.store[100] = (7 << 13) | 500; // JUMP IF ZERO 500
        let mut cpu = Cpu::new();
        cpu.set_a(masks::BIT18);
        cpu.step(&mut bus).unwrap();
        assert_eq!(bus.store[0], 101); // not taken, ordinary increment
    }

    #[test]
    fn jump_if_negative_is_taken_for_top_bit_set() {
        let mut bus = TestBus::new();
        bus.store[0] = 100;
        bus.store[100] = (9 << 13) | 500; // JUMP IF NEGATIVE 500
        let mut cpu = Cpu::new();
        cpu.set_a(masks::BIT18);
        cpu.step(&mut bus).unwrap();
        assert_eq!(bus.store[0], 500);
    }

    #[test]
    fn dynamic_stop_detected_on_self_jump() {
        let mut bus = TestBus::new();
        bus.store[0] = 8177;
        bus.store[8177] = (8 << 13) | 8177; // JUMP 8177 (to self)
        let mut cpu = Cpu::new();
        let info = cpu.step(&mut bus).unwrap();
        assert!(info.dynamic_stop);
        assert_eq!(info.last_scr, 8177);
    }

    #[test]
    fn multiply_sign_of_multiplicand_sets_q_low_bit() {
        let mut bus = TestBus::new();
        bus.store[0] = 100;
        bus.store[100] = (12 << 13) | 200; // MULTIPLY 200
        bus.store[200] = 2;
        let mut cpu = Cpu::new();
        cpu.set_a(masks::MASK18); // -1
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.a(), masks::MASK18); // -1 * 2 = -2, A holds high word -1
        assert_eq!(cpu.q() & 1, 1); // multiplicand was negative
    }

    #[test]
    fn b_modification_with_zero_b_register_is_a_no_op() {
        let mut bus_plain = TestBus::new();
        bus_plain.store[0] = 100;
        bus_plain.store[100] = (4 << 13) | 300; // LOAD A 300 (B-flag clear)
        bus_plain.store[300] = 42;
        let mut cpu_plain = Cpu::new();
        cpu_plain.step(&mut bus_plain).unwrap();

        let mut bus_modified = TestBus::new();
        bus_modified.store[0] = 100;
        bus_modified.store[1] = 0; // B register is zero
        bus_modified.store[100] = masks::BIT18 | (4 << 13) | 300; // LOAD A 300, B-flag set
        bus_modified.store[300] = 42;
        let mut cpu_modified = Cpu::new();
        cpu_modified.step(&mut bus_modified).unwrap();

        assert_eq!(cpu_plain.a(), cpu_modified.a());
    }

    #[test]
    fn io_function_reads_tape_into_accumulator() {
        let mut bus = TestBus::new();
        bus.store[0] = 100;
        bus.store[100] = (15 << 13) | 2048; // I/O read tape
        bus.tape = vec![0o77];
        let mut cpu = Cpu::new();
        let info = cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.a(), 0o77);
        assert!(matches!(info.io_event, Some(IoEvent::TapeRead(0o77))));
    }

    #[test]
    fn level_terminate_switches_scr_and_b_addresses() {
        let mut bus = TestBus::new();
        bus.store[0] = 100;
        bus.store[100] = (15 << 13) | 7168; // Level terminate
        let mut cpu = Cpu::new();
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.level(), Level::Four);
    }

    proptest::proptest! {
        #[test]
        fn add_result_always_in_18_bit_range(a in 0u32..masks::MASK18, b in 0u32..masks::MASK18) {
            let mut bus = TestBus::new();
            bus.store[0] = 100;
            bus.store[100] = (1 << 13) | 200;
            bus.store[200] = b;
            let mut cpu = Cpu::new();
            cpu.set_a(a);
            cpu.step(&mut bus).unwrap();
            proptest::prop_assert!(cpu.a() <= masks::MASK18);
        }
    }
}
