//! [`Machine`]: the `Bus` implementation and decode/execute run loop that
//! ties the store, peripherals, and trace/monitor gating to
//! [`elliott903_cpu::Cpu`].

use std::fs::File;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use elliott903_cpu::masks::STORE_SIZE;
use elliott903_cpu::{Bus, Cpu, IoEvent, Level, StepError};

use crate::config::MachineConfig;
use crate::plotter::Plotter;
use crate::punch::Punch;
use crate::reader::Reader;
use crate::store::Store;
use crate::teletype::{TeletypeInput, TeletypeOutput};
use crate::trace::{verbosity, DiagnosticLine};
use crate::{from_step_error, to_step_error, MachineError, TraceState};

/// Store, peripherals, and plotter grouped behind one [`Bus`]
/// implementation, kept separate from [`Machine`] itself so the run loop
/// can borrow the CPU and the bus as two disjoint fields at once (`self.cpu.step(&mut self.io)`).
struct MachineIo {
    store: Store,
    reader: Reader,
    punch: Punch,
    tty_in: TeletypeInput,
    tty_out: TeletypeOutput,
    plotter: Plotter,
}

impl Bus for MachineIo {
    fn read(&mut self, addr: u32) -> Result<u32, StepError> {
        if addr >= STORE_SIZE {
            return Err(StepError::OutOfBounds(addr));
        }
        Ok(self.store.get(addr))
    }

    fn write(&mut self, addr: u32, value: u32) -> Result<(), StepError> {
        if addr >= STORE_SIZE {
            return Err(StepError::OutOfBounds(addr));
        }
        self.store.set(addr, value);
        Ok(())
    }

    fn read_tape(&mut self) -> Result<u8, StepError> {
        self.reader.read_byte().map_err(to_step_error)
    }

    fn read_tty(&mut self) -> Result<u8, StepError> {
        let ch = self.tty_in.read_byte().map_err(to_step_error)?;
        self.tty_out.echo(ch);
        Ok(ch)
    }

    fn write_punch(&mut self, byte: u8) -> Result<(), StepError> {
        self.punch.punch_byte(byte).map_err(to_step_error)
    }

    fn write_tty(&mut self, byte: u8) {
        self.tty_out.write_byte(byte);
    }

    fn plotter_command(&mut self, word: u32) {
        self.plotter.command(word);
    }
}

/// The Elliott 903/920B machine: CPU, store, peripherals, trace/monitor
/// gating, and the paths needed to persist state at shutdown, all in one
/// value per the "group process-wide state into the machine" design
/// note, so the emulator can be embedded and tested without resetting
/// process-global state.
pub struct Machine {
    cpu: Cpu,
    io: MachineIo,
    trace: TraceState,
    abandon: Option<u64>,
    diag: Box<dyn Write + Send>,
    store_path: std::path::PathBuf,
    residual_path: std::path::PathBuf,
    stop_path: std::path::PathBuf,
    plot_path: std::path::PathBuf,
}

impl Machine {
    /// Build a machine from a fully-resolved configuration: loads the
    /// store image (or zeroes it), reloads the Initial Orders over it,
    /// sets the initial SCR, and opens the diagnostics sink.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Io`] if the store image or log file exist
    /// but cannot be read/opened, or the store-image parsing errors
    /// documented on [`crate::Store::load_image`].
    pub fn new(config: &MachineConfig) -> Result<Self, MachineError> {
        let mut store = Store::new();
        store.load_image(&config.store_path)?;
        store.set(Level::One.scr_addr(), config.initial_scr);

        let mut trace = TraceState::new(
            config.verbose,
            config.diag_count,
            config.diag_from,
            config.diag_limit,
            config.monitor,
        );
        if let Some(addr) = config.monitor {
            trace.prime_monitor(store.get(addr));
        }

        let diag: Box<dyn Write + Send> = if config.diagnostics_to_file {
            Box::new(File::create(&config.log_path).map_err(|e| MachineError::Io {
                path: config.log_path.display().to_string(),
                source: e,
            })?)
        } else {
            Box::new(std::io::stderr())
        };

        let io = MachineIo {
            store,
            reader: Reader::new(config.reader_path.clone()),
            punch: Punch::new(config.punch_path.clone()),
            tty_in: TeletypeInput::new(config.tty_in_path.clone()),
            tty_out: TeletypeOutput::new(),
            plotter: Plotter::new(
                config.plotter_width,
                config.plotter_height,
                config.plotter_pen_size.min(12),
            ),
        };

        Ok(Self {
            cpu: Cpu::new(),
            io,
            trace,
            abandon: config.abandon,
            diag,
            store_path: config.store_path.clone(),
            residual_path: config.residual_path.clone(),
            stop_path: config.stop_path.clone(),
            plot_path: config.plot_path.clone(),
        })
    }

    /// Run the decode/execute loop to completion, returning the reason
    /// the run ended. Always persists the store and residual tape for
    /// "clean" terminations (§7); fatal conditions leave the store
    /// untouched. The plotter raster, if ever used, is always written on
    /// the way out since encoding it is not part of the ordering
    /// contract a fatal error needs to preserve.
    ///
    /// Equivalent to [`Machine::run_cancellable`] with a flag that is
    /// never set.
    pub fn run(&mut self) -> MachineError {
        self.run_cancellable(&AtomicBool::new(false))
    }

    /// Run the decode/execute loop to completion, polling `cancelled`
    /// once per step.
    ///
    /// When `cancelled` becomes true, the run ends as the §5
    /// "cancellation" contract requires: the teletype line buffer is
    /// flushed, the store and residual tape are *not* persisted, and
    /// [`MachineError::Cancelled`] is returned. Checking the flag
    /// between instructions rather than via a process signal handler
    /// directly means cancellation is only ever observed at an
    /// instruction boundary, never mid-`Bus` call.
    pub fn run_cancellable(&mut self, cancelled: &AtomicBool) -> MachineError {
        let reason = loop {
            if cancelled.load(Ordering::Relaxed) {
                break MachineError::Cancelled;
            }
            match self.cpu.step(&mut self.io) {
                Ok(info) => {
                    if let Some(addr) = self.trace.monitor_addr() {
                        let current = self.io.store.get(addr);
                        if let Some((old, new)) = self.trace.check_monitor(current) {
                            self.emit_diag(&format!(
                                "Monitored location changed from {old} to {new}"
                            ));
                        }
                    }

                    if let Some(new_abandon) =
                        self.trace.check_triggers(info.last_scr, self.cpu.instruction_count())
                    {
                        self.abandon = Some(new_abandon);
                    }

                    if matches!(info.function, 7 | 9) && info.jump_taken {
                        self.trace.on_jump_taken();
                    }

                    if let Some(event) = info.io_event {
                        self.report_io_event(event);
                    }

                    if self.trace.should_emit() {
                        self.print_diagnostic(&info);
                    }

                    if self
                        .abandon
                        .is_some_and(|limit| self.cpu.instruction_count() >= limit)
                    {
                        self.diag_line_if_enabled("Instruction limit reached");
                        break MachineError::AbandonLimitReached;
                    }

                    if info.dynamic_stop {
                        self.diag_line_if_enabled(&format!(
                            "Dynamic stop at {}",
                            crate::trace::format_addr(info.last_scr)
                        ));
                        break MachineError::DynamicStop {
                            address: info.last_scr,
                        };
                    }
                }
                Err(err) => break from_step_error(err),
            }
        };

        self.io.tty_out.flush_line();
        if reason.is_clean() {
            self.shutdown(&reason);
        }
        reason
    }

    fn shutdown(&mut self, reason: &MachineError) {
        if let Err(e) = self.io.store.save_image(&self.store_path) {
            log::warn!("failed to persist store image: {e}");
        }
        if let MachineError::DynamicStop { address } = reason {
            if let Err(e) = std::fs::write(&self.stop_path, address.to_string()) {
                log::warn!("failed to write stop file: {e}");
            }
        }
        if self.io.reader.is_open() {
            if let Err(e) = std::fs::write(&self.residual_path, self.io.reader.residual()) {
                log::warn!("failed to persist residual tape: {e}");
            }
        }
        if self.io.plotter.is_active() {
            if let Err(e) = self.io.plotter.save_png(&self.plot_path) {
                log::warn!("failed to encode plotter raster: {e}");
            }
        }
    }

    fn report_io_event(&mut self, event: IoEvent) {
        let io_traced = self.trace.verbose() & verbosity::IO != 0;
        match event {
            IoEvent::TapeRead(ch) => {
                self.trace.on_io_character();
                if io_traced {
                    self.emit_diag(&format!("Paper tape character {ch:3} read"));
                }
            }
            IoEvent::TtyRead(ch) => {
                self.trace.on_io_character();
                if io_traced {
                    self.emit_diag(&format!("Read character {ch} from teletype"));
                }
            }
            IoEvent::PunchWrite(ch) => {
                self.trace.on_io_character();
                if io_traced {
                    self.emit_diag(&format!("Paper tape character {ch} punched"));
                }
            }
            IoEvent::TtyWrite(ch) => {
                self.trace.on_io_character();
                if io_traced {
                    let masked = ch & 0x7F;
                    let printable = masked == 10 || (32..=122).contains(&masked);
                    if printable {
                        self.emit_diag(&format!(
                            "Character {masked} output to teletype({})",
                            masked as char
                        ));
                    } else {
                        self.emit_diag(&format!("Character {masked} output to teletype - ignored"));
                    }
                }
            }
            IoEvent::PlotterCommand(_) => {}
            IoEvent::LevelTerminate => {
                log::info!("priority level terminated, now running at level 4");
            }
        }
    }

    fn print_diagnostic(&mut self, info: &elliott903_cpu::StepInfo) {
        let b = self.io.store.get(self.cpu.level().b_addr());
        let line = crate::trace::format_diagnostic_line(DiagnosticLine {
            instruction_count: self.cpu.instruction_count(),
            last_scr: info.last_scr,
            instruction: info.instruction,
            function: info.function,
            address: info.address,
            a: self.cpu.a(),
            q: self.cpu.q(),
            b,
        });
        self.emit_diag(&line);
    }

    fn diag_line_if_enabled(&mut self, line: &str) {
        if self.trace.diagnostics_enabled() {
            self.emit_diag(line);
        }
    }

    fn emit_diag(&mut self, line: &str) {
        self.io.tty_out.flush_line();
        let _ = writeln!(self.diag, "{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_reader_config(dir: &std::path::Path) -> MachineConfig {
        let reader_path = dir.join(".reader");
        std::fs::write(&reader_path, []).unwrap();
        MachineConfig {
            reader_path,
            punch_path: dir.join(".punch"),
            tty_in_path: dir.join(".ttyin"),
            store_path: dir.join(".store"),
            residual_path: dir.join(".reader-residual"),
            stop_path: dir.join(".stop"),
            plot_path: dir.join(".plot.png"),
            log_path: dir.join("log.txt"),
            ..MachineConfig::default()
        }
    }

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("elliott903-machine-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn empty_tape_exhausts_the_reader_through_the_initial_orders() {
        let dir = scratch_dir("empty-tape");
        let config = empty_reader_config(&dir);
        let mut machine = Machine::new(&config).unwrap();
        let outcome = machine.run();
        assert!(matches!(outcome, MachineError::ReaderExhausted));
        assert_eq!(outcome.exit_code(), 2);
        assert!(dir.join(".store").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn dynamic_stop_is_detected_and_persists_the_store() {
        let dir = scratch_dir("dynamic-stop");
        let mut config = empty_reader_config(&dir);
        config.initial_scr = 100;
        let mut machine = Machine::new(&config).unwrap();
        machine.io.store.set(100, (8u32 << 13) | 100); // JUMP 100 (to self)

        let outcome = machine.run();
        assert!(matches!(outcome, MachineError::DynamicStop { address: 100 }));
        assert_eq!(outcome.exit_code(), 0);
        let stop_contents = std::fs::read_to_string(&config.stop_path).unwrap();
        assert_eq!(stop_contents.trim(), "100");
        assert!(dir.join(".store").exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn abandon_limit_stops_execution_after_exactly_n_instructions() {
        let dir = scratch_dir("abandon");
        let mut config = empty_reader_config(&dir);
        config.initial_scr = 100;
        config.abandon = Some(3);
        let mut machine = Machine::new(&config).unwrap();
        machine.io.store.set(100, (8u32 << 13) | 200); // JUMP 200
        machine.io.store.set(200, (8u32 << 13) | 100); // JUMP 100 (2-cycle loop, never dynamic-stops)

        let outcome = machine.run();
        assert!(matches!(outcome, MachineError::AbandonLimitReached));
        assert_eq!(outcome.exit_code(), 8);
        assert_eq!(machine.cpu.instruction_count(), 3);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn abandon_limit_never_touches_an_unopened_reader_tape() {
        let dir = scratch_dir("abandon-residual");
        let reader_path = dir.join(".reader");
        std::fs::write(&reader_path, [1u8, 2, 3, 4]).unwrap();
        let mut config = MachineConfig {
            reader_path: reader_path.clone(),
            punch_path: dir.join(".punch"),
            tty_in_path: dir.join(".ttyin"),
            store_path: dir.join(".store"),
            residual_path: reader_path.clone(),
            stop_path: dir.join(".stop"),
            plot_path: dir.join(".plot.png"),
            log_path: dir.join("log.txt"),
            ..MachineConfig::default()
        };
        config.initial_scr = 100;
        config.abandon = Some(3);
        let mut machine = Machine::new(&config).unwrap();
        machine.io.store.set(100, (8u32 << 13) | 200); // JUMP 200
        machine.io.store.set(200, (8u32 << 13) | 100); // JUMP 100, never reads the tape

        let outcome = machine.run();
        assert!(matches!(outcome, MachineError::AbandonLimitReached));
        assert_eq!(
            std::fs::read(&reader_path).unwrap(),
            vec![1u8, 2, 3, 4],
            "a run that never opened the reader must not truncate its tape file"
        );
        std::fs::remove_dir_all(&dir).ok();
    }
}
