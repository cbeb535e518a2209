//! CLI-framework-agnostic configuration, collecting every option the
//! external interface exposes in one value.

use std::path::PathBuf;

/// Parse an address literal in plain-decimal or `module^offset` form
/// (`value * 8192 + offset`), matching the original's `argtoi`.
///
/// # Errors
///
/// Returns an error string suitable for a CLI framework to report if
/// `s` contains anything other than ASCII digits and at most one `^`.
pub fn parse_address_literal(s: &str) -> Result<u32, String> {
    if let Some((module, offset)) = s.split_once('^') {
        let module: u32 = module
            .parse()
            .map_err(|_| format!("invalid module in address literal: {s:?}"))?;
        let offset: u32 = offset
            .parse()
            .map_err(|_| format!("invalid offset in address literal: {s:?}"))?;
        Ok(module * 8192 + offset)
    } else {
        s.parse()
            .map_err(|_| format!("invalid address literal: {s:?}"))
    }
}

/// All externally-configurable machine settings, independent of any
/// particular argument-parsing crate.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Paper tape reader input file. Default `.reader`.
    pub reader_path: PathBuf,
    /// Paper tape punch output file. Default `.punch`.
    pub punch_path: PathBuf,
    /// Teletype input file. Default `.ttyin`.
    pub tty_in_path: PathBuf,
    /// Store image file. Default `.store`.
    pub store_path: PathBuf,
    /// Residual-input file written at shutdown. Default `.reader`
    /// (overwriting the reader file, matching the original).
    pub residual_path: PathBuf,
    /// Dynamic-stop address file. Default `.stop`.
    pub stop_path: PathBuf,
    /// Plotter PNG output file. Default `.plot.png`.
    pub plot_path: PathBuf,
    /// Verbosity bit-mask (bits: diagnostics, jumps, instructions, I/O).
    pub verbose: u32,
    /// Turn on diagnostics after this many instructions.
    pub diag_count: Option<u64>,
    /// Turn on diagnostics on first reaching this address.
    pub diag_from: Option<u32>,
    /// Limited-trace trigger: turns on full tracing and arms a
    /// 1000-instruction abandon window.
    pub diag_limit: Option<u64>,
    /// Abandon execution after this many instructions.
    pub abandon: Option<u64>,
    /// Monitor this store word for changes.
    pub monitor: Option<u32>,
    /// Initial SCR (operator control-panel jump address). Default 8181.
    pub initial_scr: u32,
    /// Write diagnostics to a log file instead of stderr.
    pub diagnostics_to_file: bool,
    /// Log file path used when `diagnostics_to_file` is set. Default `log.txt`.
    pub log_path: PathBuf,
    /// Plotter paper width, in steps.
    pub plotter_width: u32,
    /// Plotter paper height, in steps.
    pub plotter_height: u32,
    /// Plotter pen nib half-width, in steps (`<= 12`).
    pub plotter_pen_size: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            reader_path: PathBuf::from(".reader"),
            punch_path: PathBuf::from(".punch"),
            tty_in_path: PathBuf::from(".ttyin"),
            store_path: PathBuf::from(".store"),
            residual_path: PathBuf::from(".reader"),
            stop_path: PathBuf::from(".stop"),
            plot_path: PathBuf::from(".plot.png"),
            verbose: 0,
            diag_count: None,
            diag_from: None,
            diag_limit: None,
            abandon: None,
            monitor: None,
            initial_scr: 8181,
            diagnostics_to_file: false,
            log_path: PathBuf::from("log.txt"),
            plotter_width: 3000,
            plotter_height: 2400,
            plotter_pen_size: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_decimal_parses_directly() {
        assert_eq!(parse_address_literal("8181").unwrap(), 8181);
    }

    #[test]
    fn module_offset_form_matches_argtoi() {
        assert_eq!(parse_address_literal("1^5").unwrap(), 8192 + 5);
        assert_eq!(parse_address_literal("0^0").unwrap(), 0);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_address_literal("not-a-number").is_err());
    }
}
