//! Command-line frontend: argument parsing, logging initialization, and
//! mapping the machine's termination reason to a process exit code.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use elliott903_core::{parse_address_literal, Machine, MachineConfig};

/// Parse a `module^offset` or plain-decimal address literal for clap.
fn address_literal(s: &str) -> Result<u32, String> {
    parse_address_literal(s)
}

/// Elliott 903/920B emulator.
///
/// Reads paper tape reader input, teletype input, and an optional store
/// image from disk, runs the decode/execute loop to completion, and
/// persists the store, residual tape, and (if used) the plotter raster
/// before exiting with a code identifying why the run ended.
#[derive(Debug, Parser)]
#[command(name = "elliott903", version, about)]
struct Args {
    /// Paper tape reader input file.
    #[arg(default_value = ".reader")]
    reader: PathBuf,

    /// Paper tape punch output file.
    #[arg(default_value = ".punch")]
    punch: PathBuf,

    /// Teletype input file.
    #[arg(default_value = ".ttyin")]
    tty: PathBuf,

    /// Verbosity bit-mask: 1=diagnostics, 2=jumps, 4=instructions, 8=i/o.
    #[arg(short, long, default_value_t = 0)]
    verbose: u32,

    /// Turn on diagnostics after this many instructions have executed.
    #[arg(short = 't', long = "trace-after")]
    trace_after: Option<u64>,

    /// Turn on diagnostics the first time execution reaches this address.
    #[arg(short = 's', long = "trace-at", value_parser = address_literal)]
    trace_at: Option<u32>,

    /// Turn on full tracing the first time execution reaches this
    /// address, and abandon after 1000 further instructions.
    #[arg(short = 'r', long = "limited-trace-at", value_parser = address_literal)]
    limited_trace_at: Option<u32>,

    /// Abandon execution after this many instructions.
    #[arg(short, long)]
    abandon: Option<u64>,

    /// Write diagnostics to log.txt instead of stderr.
    #[arg(short = 'd', long = "log-to-file")]
    log_to_file: bool,

    /// Monitor this store word for changes, forcing a one-shot trace line
    /// whenever it does.
    #[arg(short, long, value_parser = address_literal)]
    monitor: Option<u32>,

    /// Initial jump address (operator control-panel start switch).
    #[arg(short, long, default_value_t = 8181, value_parser = address_literal)]
    jump: u32,

    /// Store image file to load at startup and save at shutdown.
    #[arg(long, default_value = ".store")]
    store: PathBuf,

    /// File to record the dynamic-stop address in.
    #[arg(long, default_value = ".stop")]
    stop: PathBuf,

    /// Plotter PNG output file.
    #[arg(long, default_value = ".plot.png")]
    plot: PathBuf,

    /// Log file path used with `--log-to-file`.
    #[arg(long, default_value = "log.txt")]
    log_file: PathBuf,

    /// Plotter paper width, in steps.
    #[arg(long, default_value_t = 3000)]
    plotter_width: u32,

    /// Plotter paper height, in steps.
    #[arg(long, default_value_t = 2400)]
    plotter_height: u32,

    /// Plotter pen nib half-width, in steps (clamped to 12).
    #[arg(long, default_value_t = 1)]
    plotter_pen_size: u32,
}

impl From<Args> for MachineConfig {
    fn from(args: Args) -> Self {
        Self {
            reader_path: args.reader.clone(),
            punch_path: args.punch,
            tty_in_path: args.tty,
            store_path: args.store,
            residual_path: args.reader,
            stop_path: args.stop,
            plot_path: args.plot,
            verbose: args.verbose,
            diag_count: args.trace_after,
            diag_from: args.trace_at,
            diag_limit: args.limited_trace_at,
            abandon: args.abandon,
            monitor: args.monitor,
            initial_scr: args.jump,
            diagnostics_to_file: args.log_to_file,
            log_path: args.log_file,
            plotter_width: args.plotter_width,
            plotter_height: args.plotter_height,
            plotter_pen_size: args.plotter_pen_size,
        }
    }
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    let config: MachineConfig = args.into();

    let mut machine = match Machine::new(&config) {
        Ok(machine) => machine,
        Err(err) => {
            log::error!("failed to initialize machine: {err}");
            std::process::exit(1);
        }
    };

    let cancelled = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancelled);
    if let Err(err) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::Relaxed);
    }) {
        log::warn!("failed to install Ctrl-C handler: {err}");
    }

    let outcome = machine.run_cancellable(&cancelled);
    log::info!("run ended: {outcome}");
    std::process::exit(outcome.exit_code());
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn defaults_match_the_original_emulator() {
        let args = Args::parse_from(["elliott903"]);
        let config: MachineConfig = args.into();
        assert_eq!(config.reader_path, PathBuf::from(".reader"));
        assert_eq!(config.punch_path, PathBuf::from(".punch"));
        assert_eq!(config.tty_in_path, PathBuf::from(".ttyin"));
        assert_eq!(config.initial_scr, 8181);
        assert_eq!(config.verbose, 0);
    }

    #[test]
    fn module_offset_address_literals_are_accepted() {
        let args = Args::parse_from(["elliott903", "--jump", "1^5"]);
        let config: MachineConfig = args.into();
        assert_eq!(config.initial_scr, 8192 + 5);
    }

    #[test]
    fn positional_files_override_defaults() {
        let args = Args::parse_from(["elliott903", "tape.in", "tape.out", "tty.in"]);
        let config: MachineConfig = args.into();
        assert_eq!(config.reader_path, PathBuf::from("tape.in"));
        assert_eq!(config.punch_path, PathBuf::from("tape.out"));
        assert_eq!(config.tty_in_path, PathBuf::from("tty.in"));
    }
}
