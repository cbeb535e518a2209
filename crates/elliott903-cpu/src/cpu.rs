//! Decode/execute loop and register file.

use crate::bus::Bus;
use crate::function::Function;
use crate::level::Level;
use crate::masks::{ADDR_MASK, BIT18, BIT19, FN_MASK, FN_SHIFT, MASK16, MASK18, MOD_MASK};
use crate::StepError;

/// An I/O side effect produced by a function-15 instruction, reported to
/// the caller so the integration layer can drive trace gating (§4.4
/// "trace I/O characters") without the CPU core needing to know about
/// verbosity masks or diagnostic formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoEvent {
    /// A character was read from the paper tape reader.
    TapeRead(u8),
    /// A character was read from the teletype input stream.
    TtyRead(u8),
    /// A plotter command word (low 8 bits, the bits plotter cares about)
    /// was issued.
    PlotterCommand(u8),
    /// A character was punched to paper tape.
    PunchWrite(u8),
    /// A character was written to the teletype.
    TtyWrite(u8),
    /// The level-terminate instruction (z=7168) switched to level 4.
    LevelTerminate,
}

/// The outcome of one [`Cpu::step`] call, reported for trace/monitor
/// gating and dynamic-stop detection in the integration layer.
#[derive(Debug, Clone, Copy)]
pub struct StepInfo {
    /// The address the executed instruction was fetched from (SCR before
    /// this step's increment).
    pub last_scr: u32,
    /// The raw instruction word.
    pub instruction: u32,
    /// The decoded function code (0..=15).
    pub function: u8,
    /// The instruction's address field, module-combined with `last_scr`
    /// (before B-modification).
    pub address: u32,
    /// Simulated time consumed by this step, in microseconds.
    pub elapsed_us: u64,
    /// True if, after dispatch, SCR equals `last_scr` — a one-instruction
    /// loop, i.e. a dynamic stop.
    pub dynamic_stop: bool,
    /// Set for functions 7/8/9 when the jump was actually taken (always
    /// true for the unconditional jump, conditional on A for the other
    /// two). Used by the integration layer to mirror the original's
    /// "trace jumps taken" gate, which only fires for the conditional
    /// forms.
    pub jump_taken: bool,
    /// Set when function 5 (Store A) was silently discarded because it
    /// targeted the Initial Orders while in level 1.
    pub blocked_initial_orders_write: bool,
    /// Set when function 15 (I/O) produced an externally observable
    /// effect.
    pub io_event: Option<IoEvent>,
}

/// Sign-extend an 18-bit word to a 64-bit signed integer.
fn sign_extend18(value: u32) -> i64 {
    if value & BIT18 != 0 {
        i64::from(value) - i64::from(BIT19)
    } else {
        i64::from(value)
    }
}

/// The Elliott 903/920B register file and decode/execute loop.
///
/// `A` and `Q` are the only registers the CPU holds directly; SCR and B
/// are memory-mapped (store words 0/1 for level 1, 6/7 for level 4) and
/// are read fresh through the [`Bus`] at the start of every step, per the
/// "do not cache them across instruction boundaries" design note.
#[derive(Debug, Clone)]
pub struct Cpu {
    a: u32,
    q: u32,
    level: Level,
    instruction_count: u64,
    elapsed_us: u64,
    function_counts: [u64; 16],
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Create a new CPU at priority level 1 with A=Q=0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: 0,
            q: 0,
            level: Level::One,
            instruction_count: 0,
            elapsed_us: 0,
            function_counts: [0; 16],
        }
    }

    /// Current accumulator value.
    #[must_use]
    pub const fn a(&self) -> u32 {
        self.a
    }

    /// Current auxiliary (Q) register value.
    #[must_use]
    pub const fn q(&self) -> u32 {
        self.q
    }

    /// Current priority level.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }

    /// Total instructions executed so far.
    #[must_use]
    pub const fn instruction_count(&self) -> u64 {
        self.instruction_count
    }

    /// Total simulated time elapsed so far, in microseconds.
    #[must_use]
    pub const fn elapsed_us(&self) -> u64 {
        self.elapsed_us
    }

    /// Per-function execution counts, indexed by function code.
    #[must_use]
    pub const fn function_counts(&self) -> &[u64; 16] {
        &self.function_counts
    }

    /// Force the accumulator to a value (used by tests and by the
    /// operator's control-panel "set A" front-panel switches, which this
    /// emulator does not otherwise expose).
    pub fn set_a(&mut self, value: u32) {
        self.a = value & MASK18;
    }

    /// Execute exactly one instruction.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] for any fatal or clean-termination condition
    /// encountered while fetching, modifying, or dispatching the
    /// instruction. The caller (the integration layer) decides how to
    /// react; the CPU's register state after an error is unspecified and
    /// the run should not continue.
    pub fn step(&mut self, bus: &mut impl Bus) -> Result<StepInfo, StepError> {
        let scr_addr = self.level.scr_addr();
        let b_addr = self.level.b_addr();

        let last_scr = bus.read(scr_addr)?;
        if last_scr >= crate::masks::STORE_SIZE {
            return Err(StepError::OutOfBounds(last_scr));
        }
        bus.write(scr_addr, (last_scr + 1) & MASK16)?;

        let instruction = bus.read(last_scr)?;
        let b_flag = instruction & BIT18 != 0;
        let f = (instruction >> FN_SHIFT) & FN_MASK;
        self.function_counts[f as usize] += 1;
        let function = Function::from(f);

        let address = (instruction & ADDR_MASK) | (last_scr & MOD_MASK);

        let mut elapsed = 0u64;
        let m = if b_flag {
            let b_val = bus.read(b_addr)?;
            elapsed += 6;
            (address + b_val) & MASK16
        } else {
            address & MASK16
        };

        let mut blocked_initial_orders_write = false;
        let mut io_event = None;
        let mut jump_taken = false;

        match function {
            Function::LoadB => {
                let value = bus.read(m)?;
                self.q = value;
                bus.write(b_addr, value)?;
                elapsed += 30;
            }
            Function::Add => {
                self.a = self.a.wrapping_add(bus.read(m)?) & MASK18;
                elapsed += 23;
            }
            Function::NegateAndAdd => {
                let value = bus.read(m)?;
                self.a = value.wrapping_sub(self.a) & MASK18;
                elapsed += 26;
            }
            Function::StoreQ => {
                bus.write(m, self.q >> 1)?;
                elapsed += 25;
            }
            Function::LoadA => {
                self.a = bus.read(m)?;
                elapsed += 23;
            }
            Function::StoreA => {
                if self.level == Level::One && (8180..=8191).contains(&m) {
                    blocked_initial_orders_write = true;
                    log::debug!("write to initial orders ignored in priority level 1");
                } else {
                    bus.write(m, self.a)?;
                }
                elapsed += 25;
            }
            Function::Collate => {
                self.a &= bus.read(m)?;
                elapsed += 23;
            }
            Function::JumpIfZero => {
                if self.a == 0 {
                    bus.write(scr_addr, m)?;
                    jump_taken = true;
                    elapsed += 28;
                }
                elapsed += if self.a > 0 { 21 } else { 20 };
            }
            Function::Jump => {
                bus.write(scr_addr, m)?;
                elapsed += 23;
                jump_taken = true;
            }
            Function::JumpIfNegative => {
                if self.a >= BIT18 {
                    bus.write(scr_addr, m)?;
                    jump_taken = true;
                    elapsed += 25;
                }
                elapsed += 20;
            }
            Function::Count => {
                let value = bus.read(m)?;
                bus.write(m, (value + 1) & MASK18)?;
                elapsed += 24;
            }
            Function::StoreS => {
                let s = bus.read(scr_addr)?;
                self.q = s & MOD_MASK;
                bus.write(m, s & ADDR_MASK)?;
                elapsed += 30;
            }
            Function::Multiply => {
                let al = sign_extend18(self.a);
                let sl = sign_extend18(bus.read(m)?);
                let prod = al * sl;
                let mut q = ((prod << 1) & i64::from(MASK18)) as u32;
                if al < 0 {
                    q |= 1;
                }
                self.q = q;
                self.a = ((prod >> 17) & i64::from(MASK18)) as u32;
                elapsed += 79;
            }
            Function::Divide => {
                let divisor = sign_extend18(bus.read(m)?);
                if divisor == 0 {
                    return Err(StepError::DivideByZero);
                }
                let al = sign_extend18(self.a);
                let aql = (al << 18) | i64::from(self.q);
                let quot = ((aql / divisor) >> 1) & i64::from(MASK18);
                let quot = quot as u32;
                self.a = quot | 1;
                self.q = quot & 0x3_FFFE;
                elapsed += 79;
            }
            Function::Shift => {
                let raw_places = m & ADDR_MASK;
                let al = sign_extend18(self.a);
                let mut aql = (al << 18) | i64::from(self.q);
                if raw_places <= 2047 {
                    elapsed += 24 + 7 * u64::from(raw_places);
                    aql <<= raw_places.min(36);
                } else if raw_places >= 6144 {
                    let places = 8192 - raw_places;
                    elapsed += 24 + 7 * u64::from(places);
                    aql >>= places.min(36);
                } else {
                    return Err(StepError::UnsupportedShift(raw_places));
                }
                self.q = (aql & i64::from(MASK18)) as u32;
                self.a = ((aql >> 18) & i64::from(MASK18)) as u32;
            }
            Function::Io => {
                let z = m & ADDR_MASK;
                match z {
                    2048 => {
                        let ch = bus.read_tape()?;
                        self.a = ((self.a << 7) | u32::from(ch)) & MASK18;
                        elapsed += 4_000;
                        io_event = Some(IoEvent::TapeRead(ch));
                    }
                    2052 => {
                        let ch = bus.read_tty()?;
                        self.a = ((self.a << 7) | u32::from(ch)) & MASK18;
                        elapsed += 100_000;
                        io_event = Some(IoEvent::TtyRead(ch));
                    }
                    4864 => {
                        let cost = if self.a < 16 { 3_300 } else { 20_000 };
                        bus.plotter_command(self.a);
                        elapsed += cost;
                        io_event = Some(IoEvent::PlotterCommand((self.a & 0xFF) as u8));
                    }
                    6144 => {
                        let byte = (self.a & 0xFF) as u8;
                        bus.write_punch(byte)?;
                        elapsed += 9_091;
                        io_event = Some(IoEvent::PunchWrite(byte));
                    }
                    6148 => {
                        let byte = (self.a & 0xFF) as u8;
                        bus.write_tty(byte);
                        elapsed += 100_000;
                        io_event = Some(IoEvent::TtyWrite(byte));
                    }
                    7168 => {
                        self.level = Level::Four;
                        elapsed += 19;
                        io_event = Some(IoEvent::LevelTerminate);
                    }
                    other => return Err(StepError::UnsupportedIo(other)),
                }
            }
        }

        self.instruction_count += 1;
        self.elapsed_us += elapsed;

        let final_scr = bus.read(scr_addr)?;
        let dynamic_stop = final_scr == last_scr;

        Ok(StepInfo {
            last_scr,
            instruction,
            function: f as u8,
            address,
            elapsed_us: elapsed,
            dynamic_stop,
            jump_taken,
            blocked_initial_orders_write,
            io_event,
        })
    }
}
