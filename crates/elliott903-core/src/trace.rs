//! Verbosity-gated diagnostics: trace triggers, the single-address
//! monitor, and the exact line formats the original emulator's
//! `traceprint.py` companion tooling expects.

use elliott903_cpu::masks::{ADDR_MASK, MOD_SHIFT};

/// Verbosity bit-mask flags (`-v` in the original CLI).
pub mod verbosity {
    /// Bit 0: diagnostic reports (store/tape opens, dynamic stop, exit).
    pub const DIAGNOSTICS: u32 = 1;
    /// Bit 1: trace jumps taken.
    pub const JUMPS: u32 = 2;
    /// Bit 2: trace every instruction.
    pub const INSTRUCTIONS: u32 = 4;
    /// Bit 3: trace I/O characters.
    pub const IO: u32 = 8;
}

/// Format a store address in `module^offset` form.
#[must_use]
pub fn format_addr(addr: u32) -> String {
    format!("{}^{:04}", (addr >> MOD_SHIFT) & 7, addr & ADDR_MASK)
}

/// Format simulated microseconds as "H hours, M minutes and S.SS seconds".
///
/// Reproduces the reference implementation's divisors exactly, including
/// its 360_000_000us "hours" unit (six minutes, not sixty) rather than
/// correcting it to 3_600_000_000.
#[must_use]
pub fn format_time(us: u64) -> String {
    let hours = us / 360_000_000;
    let rem = us - hours * 360_000_000;
    let mins = rem / 60_000_000;
    let secs = (rem - mins * 60_000_000) as f64 / 1_000_000.0;
    format!("{hours} hours, {mins} minutes and {secs:.2} seconds")
}

/// Everything [`format_diagnostic_line`] needs to reproduce one line of
/// `printDiagnostics` output exactly.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosticLine {
    /// Instructions executed so far, including this one.
    pub instruction_count: u64,
    /// SCR value the executing instruction was fetched from.
    pub last_scr: u32,
    /// Raw instruction word (used only to read the B-modifier flag).
    pub instruction: u32,
    /// Decoded function code.
    pub function: u8,
    /// Module-combined address field (pre-B-modification).
    pub address: u32,
    /// Accumulator, unsigned store representation.
    pub a: u32,
    /// Auxiliary register, unsigned store representation.
    pub q: u32,
    /// Current B register value (store word at the live B address).
    pub b: u32,
}

fn sign_extend(value: u32) -> i64 {
    if value >= elliott903_cpu::masks::BIT18 {
        i64::from(value) - i64::from(elliott903_cpu::masks::BIT19)
    } else {
        i64::from(value)
    }
}

/// Render one diagnostic line, matching `printDiagnostics` column for
/// column: instruction count, SCR in module^offset form, the B-flag
/// separator (`/` when set), function and address fields, then A/Q/B in
/// signed decimal and octal/module^offset form.
#[must_use]
pub fn format_diagnostic_line(line: DiagnosticLine) -> String {
    let b_flag = line.instruction & elliott903_cpu::masks::BIT18 != 0;
    let sep = match (b_flag, line.function > 9) {
        (true, true) => " /",
        (true, false) => "  /",
        (false, true) => "  ",
        (false, false) => "   ",
    };
    let an = sign_extend(line.a);
    let qn = sign_extend(line.q);
    let bn = sign_extend(line.b);
    format!(
        "{:10}   {}{}{} {:4} A={:+8} (&{:06o}) Q={:+8} (&{:06o}) B={:+7} ({})",
        line.instruction_count,
        format_addr(line.last_scr),
        sep,
        line.function,
        line.address,
        an,
        line.a,
        qn,
        line.q,
        bn,
        format_addr(line.b),
    )
}

/// Trace/monitor gating state, mirroring the original's `diagCount`,
/// `diagFrom`, `diagLimit`, `monLoc`/`monLast`, and `tracing`/`traceOne`
/// globals, grouped behind one value per the "group process-wide state
/// into the machine" design note.
#[derive(Debug, Clone, Default)]
pub struct TraceState {
    verbose: u32,
    diag_count: Option<u64>,
    diag_from: Option<u32>,
    diag_limit: Option<u64>,
    monitor_addr: Option<u32>,
    monitor_last: Option<u32>,
    tracing: bool,
    trace_one: bool,
}

impl TraceState {
    /// Construct gating state from the CLI-exposed trigger settings.
    #[must_use]
    pub fn new(
        verbose: u32,
        diag_count: Option<u64>,
        diag_from: Option<u32>,
        diag_limit: Option<u64>,
        monitor_addr: Option<u32>,
    ) -> Self {
        Self {
            verbose,
            diag_count,
            diag_from,
            diag_limit,
            monitor_addr,
            monitor_last: None,
            tracing: false,
            trace_one: false,
        }
    }

    /// The configured verbosity mask.
    #[must_use]
    pub const fn verbose(&self) -> u32 {
        self.verbose
    }

    /// Whether diagnostic reports (bit 0) are enabled.
    #[must_use]
    pub const fn diagnostics_enabled(&self) -> bool {
        self.verbose & verbosity::DIAGNOSTICS != 0
    }

    /// The address to monitor, if any.
    #[must_use]
    pub const fn monitor_addr(&self) -> Option<u32> {
        self.monitor_addr
    }

    /// Record the monitored word's value before the run loop starts.
    pub fn prime_monitor(&mut self, value: u32) {
        self.monitor_last = Some(value);
    }

    /// Check whether the monitored word changed; if so, force a
    /// single-instruction trace and return the (old, new) pair for
    /// logging.
    pub fn check_monitor(&mut self, current: u32) -> Option<(u32, u32)> {
        let addr = self.monitor_addr?;
        let _ = addr;
        let last = self.monitor_last?;
        if current != last {
            self.monitor_last = Some(current);
            self.trace_one = true;
            Some((last, current))
        } else {
            None
        }
    }

    /// Evaluate the three trace triggers after a step; returns `Some(new
    /// abandon limit)` when the limited-trace trigger fires for the
    /// first time (it additionally arms a 1000-instruction abandon
    /// window, overriding any previously configured abandon count).
    pub fn check_triggers(&mut self, last_scr: u32, instruction_count: u64) -> Option<u64> {
        if self.diag_from == Some(last_scr)
            || self.diag_count.is_some_and(|n| instruction_count >= n)
        {
            self.tracing = true;
        }
        if self.diag_limit == Some(instruction_count) {
            self.tracing = true;
            return Some(instruction_count + 1000);
        }
        None
    }

    /// Called when a conditional jump (f=7 or f=9) is taken, to mirror
    /// `traceOne = tracing && ((verbose & 2) > 0)`.
    pub fn on_jump_taken(&mut self) {
        self.trace_one = self.tracing && (self.verbose & verbosity::JUMPS != 0);
    }

    /// Called on every I/O character transferred (tape read, tty
    /// read/write, punch write), to mirror the unconditional
    /// `traceOne = TRUE` the original sets whenever bit 3 is set.
    pub fn on_io_character(&mut self) {
        if self.verbose & verbosity::IO != 0 {
            self.trace_one = true;
        }
    }

    /// Whether a diagnostic line should be emitted for the step just
    /// executed; clears the one-shot trace flag as a side effect.
    pub fn should_emit(&mut self) -> bool {
        if self.trace_one {
            self.trace_one = false;
            true
        } else {
            self.tracing && (self.verbose & verbosity::INSTRUCTIONS != 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_addr_matches_module_offset_form() {
        assert_eq!(format_addr(8181), "0^8181");
        assert_eq!(format_addr(8192 + 5), "1^0005");
    }

    #[test]
    fn format_time_splits_hours_minutes_seconds() {
        // The original printTime's "hours" divisor is 360_000_000us, not
        // the true 3_600_000_000us/hour; this helper reproduces that
        // exactly rather than correcting it.
        let us = 3 * 360_000_000 + 61_000_000;
        assert_eq!(format_time(us), "3 hours, 1 minutes and 1.00 seconds");
    }

    #[test]
    fn diag_limit_trigger_arms_abandon_window_once() {
        let mut trace = TraceState::new(0, None, None, Some(10), None);
        assert_eq!(trace.check_triggers(0, 10), Some(1010));
        assert_eq!(trace.check_triggers(0, 11), None);
    }

    #[test]
    fn diag_from_trigger_enables_tracing() {
        let mut trace = TraceState::new(verbosity::INSTRUCTIONS, None, Some(500), None, None);
        assert!(!trace.should_emit());
        trace.check_triggers(500, 1);
        assert!(trace.should_emit());
    }

    #[test]
    fn monitor_change_forces_single_trace() {
        let mut trace = TraceState::new(0, None, None, None, Some(100));
        trace.prime_monitor(0);
        assert!(trace.check_monitor(0).is_none());
        assert_eq!(trace.check_monitor(42), Some((0, 42)));
        assert!(trace.should_emit());
        assert!(!trace.should_emit()); // one-shot
    }
}
