//! Integration layer for the Elliott 903 / 920B emulator: the store,
//! Initial Orders bootstrap, the four peripherals reachable through
//! function 15, store/residual-tape persistence, trace/monitor gating,
//! and the [`Machine`] that wires all of it to [`elliott903_cpu::Cpu`]
//! through the [`elliott903_cpu::Bus`] seam and drives the decode/execute
//! loop to completion.
//!
//! # Example
//!
//! ```no_run
//! use elliott903_core::{Machine, MachineConfig};
//!
//! let config = MachineConfig::default();
//! let mut machine = Machine::new(&config).expect("failed to initialize machine");
//! let outcome = machine.run();
//! std::process::exit(outcome.exit_code());
//! ```

#![warn(missing_docs)]

mod config;
mod machine;
mod plotter;
mod punch;
mod reader;
mod store;
mod teletype;
mod trace;

pub use config::{parse_address_literal, MachineConfig};
pub use machine::Machine;
pub use plotter::Plotter;
pub use punch::{Punch, REEL_LENGTH};
pub use reader::Reader;
pub use store::{Store, INITIAL_ORDERS_END, INITIAL_ORDERS_START};
pub use teletype::{TeletypeInput, TeletypeOutput};
pub use trace::{format_addr, format_diagnostic_line, format_time, verbosity, DiagnosticLine, TraceState};

/// Every reason a run can end, fatal or clean, each carrying the exit
/// code §6 of the specification assigns to it so the CLI frontend never
/// has to duplicate that mapping.
///
/// Variants split into two families though the type is not itself split
/// in two: [`MachineError::is_clean`] tells the caller whether the store
/// should be persisted before exiting. "Clean" terminations (dynamic
/// stop, reader/teletype exhaustion, the abandon limit, the punch reel
/// cap) persist the store and the residual tape; anything else is a
/// fatal environment or ISA condition and leaves the store untouched,
/// per §7's error-handling design.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    /// A file could not be opened, read, or written.
    #[error("cannot access {path}: {source}")]
    Io {
        /// Path of the file that could not be accessed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A store image file held more words than the store can hold.
    #[error("store image {path} contains more than 16384 words")]
    StoreImageTooLarge {
        /// Path of the offending store image.
        path: String,
    },
    /// A store image file held a token that did not parse as a decimal
    /// integer.
    #[error("store image {path} contains malformed token {token:?}")]
    StoreImageMalformed {
        /// Path of the offending store image.
        path: String,
        /// The token that failed to parse.
        token: String,
    },
    /// The PNG encoder rejected the plotter raster or its title chunk.
    #[error("plotter PNG encoding failed: {0}")]
    PlotterEncoding(String),
    /// A peripheral-level environment failure with no more specific
    /// variant (surfaced from [`elliott903_cpu::StepError::Environment`]).
    #[error("{0}")]
    Environment(String),
    /// A store access (SCR fetch, B-modified address, or I/O address)
    /// fell outside the 16384-word store.
    #[error("store address {0} is out of bounds")]
    OutOfBounds(u32),
    /// A function-14 shift count fell in the unsupported "reserved for
    /// I/O" range.
    #[error("unsupported i/o-14 shift count {0}")]
    UnsupportedShift(u32),
    /// A function-15 I/O instruction addressed an undefined `z` value.
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
    /// The paper tape punch has written a full reel.
    #[error("paper tape punch exceeded one reel")]
    PunchCapReached,
    /// A dynamic stop (self-referential jump) was detected at `address`.
    #[error("dynamic stop at {address}")]
    DynamicStop {
        /// The SCR value the machine looped on.
        address: u32,
    },
    /// The configured abandon-after-N instruction limit was reached.
    #[error("instruction limit reached")]
    AbandonLimitReached,
    /// An external interrupt request (`SIGINT`) asked for a clean
    /// shutdown. Per §5's cancellation contract this behaves like a
    /// fatal error: the store is not persisted.
    #[error("interrupted")]
    Cancelled,
}

impl MachineError {
    /// The process exit code §6 of the specification assigns to this
    /// termination reason.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::DynamicStop { .. } => 0,
            Self::ReaderExhausted => 2,
            Self::TtyExhausted => 4,
            Self::AbandonLimitReached => 8,
            Self::PunchCapReached => 16,
            _ => 1,
        }
    }

    /// Whether this termination reason is a "clean" one: the store and
    /// residual tape should be persisted before the process exits.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(
            self,
            Self::DynamicStop { .. }
                | Self::ReaderExhausted
                | Self::TtyExhausted
                | Self::AbandonLimitReached
                | Self::PunchCapReached
        )
    }
}

/// Translate a peripheral-level [`MachineError`] into the CPU core's
/// [`elliott903_cpu::StepError`] so it can cross the [`elliott903_cpu::Bus`]
/// seam; the reverse direction happens in [`Machine::run`] once a step
/// fails.
fn to_step_error(err: MachineError) -> elliott903_cpu::StepError {
    use elliott903_cpu::StepError;
    match err {
        MachineError::ReaderExhausted => StepError::ReaderExhausted,
        MachineError::TtyExhausted => StepError::TtyExhausted,
        MachineError::PunchCapReached => StepError::PunchCapReached,
        other => StepError::Environment(other.to_string()),
    }
}

/// Translate a [`elliott903_cpu::StepError`] surfaced from a failed
/// [`elliott903_cpu::Cpu::step`] call into the exit-code-bearing
/// [`MachineError`] the run loop reports.
fn from_step_error(err: elliott903_cpu::StepError) -> MachineError {
    use elliott903_cpu::StepError;
    match err {
        StepError::OutOfBounds(addr) => MachineError::OutOfBounds(addr),
        StepError::UnsupportedShift(n) => MachineError::UnsupportedShift(n),
        StepError::UnsupportedIo(z) => MachineError::UnsupportedIo(z),
        StepError::DivideByZero => MachineError::DivideByZero,
        StepError::ReaderExhausted => MachineError::ReaderExhausted,
        StepError::TtyExhausted => MachineError::TtyExhausted,
        StepError::PunchCapReached => MachineError::PunchCapReached,
        StepError::Environment(msg) => MachineError::Environment(msg),
    }
}
