//! Incremental pen plotter: a 2D raster driven by single-step motion
//! commands, serialized to a 24-bit RGB PNG at shutdown.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::MachineError;

const PEN_UP: u32 = 1 << 4;
const PEN_DOWN: u32 = 1 << 5;

/// Lazily-allocated plotter state.
///
/// The raster is allocated on the first plotter command (§4.3); if
/// allocation fails, the plotter silently becomes a no-op for the rest of
/// the run rather than aborting the emulation (the "silent policy" for
/// raster allocation failure).
pub struct Plotter {
    width: u32,
    height: u32,
    nib: u32,
    state: Option<PlotterState>,
    disabled: bool,
}

struct PlotterState {
    x: i64,
    y: i64,
    pen_down: bool,
    raster: Vec<u8>,
}

impl Plotter {
    /// Create a plotter with the given paper dimensions (in steps) and
    /// pen nib half-width (in steps, clamped by the caller to `<= 12`).
    #[must_use]
    pub fn new(width: u32, height: u32, nib: u32) -> Self {
        Self {
            width,
            height,
            nib,
            state: None,
            disabled: false,
        }
    }

    fn ensure_allocated(&mut self) {
        if self.state.is_some() || self.disabled {
            return;
        }
        let pixels = 3usize
            .checked_mul(self.width as usize)
            .and_then(|n| n.checked_mul(self.height as usize));
        match pixels {
            Some(len) => {
                self.state = Some(PlotterState {
                    x: 1500,
                    y: i64::from(self.height) - 200,
                    pen_down: false,
                    raster: vec![0xFF; len],
                });
            }
            None => {
                log::warn!("plotter raster allocation failed, plotter disabled");
                self.disabled = true;
            }
        }
    }

    /// Issue a command word: the low 6 bits select motion and pen state,
    /// applied as described in the hardware's command-bit table.
    pub fn command(&mut self, word: u32) {
        self.ensure_allocated();
        let Some(state) = self.state.as_mut() else {
            return;
        };

        if word & 1 != 0 {
            state.x = (state.x + 1).min(i64::from(self.width));
        }
        if word & (1 << 1) != 0 {
            state.x = (state.x - 1).max(0);
        }
        if word & (1 << 2) != 0 {
            state.y -= 1;
        }
        if word & (1 << 3) != 0 {
            state.y += 1;
        }
        if word & PEN_UP != 0 {
            state.pen_down = false;
        }
        if word & PEN_DOWN != 0 {
            state.pen_down = true;
        }

        if state.pen_down {
            Self::paint_square(state, self.width, self.height, self.nib);
        }
    }

    fn paint_square(state: &mut PlotterState, width: u32, height: u32, nib: u32) {
        let half = i64::from(nib);
        for dy in -half..=half {
            for dx in -half..=half {
                let px = state.x + dx;
                let py = state.y + dy;
                if px < 0 || py < 0 || px >= i64::from(width) || py >= i64::from(height) {
                    continue;
                }
                let idx = (py as usize * width as usize + px as usize) * 3;
                state.raster[idx] = 0;
                state.raster[idx + 1] = 0;
                state.raster[idx + 2] = 0;
            }
        }
    }

    /// Encode the raster (if any plotter command was ever issued) as a
    /// 24-bit RGB PNG with a "Title" metadata chunk, written to `path`.
    /// A no-op if the plotter was never used.
    ///
    /// # Errors
    ///
    /// Returns [`MachineError::Io`] if `path` cannot be created, or
    /// [`MachineError::PlotterEncoding`] if the PNG encoder rejects the
    /// raster or the title chunk.
    pub fn save_png(&self, path: &Path) -> Result<(), MachineError> {
        let Some(state) = &self.state else {
            return Ok(());
        };
        let file = File::create(path).map_err(|e| MachineError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let writer = BufWriter::new(file);
        let mut encoder = png::Encoder::new(writer, self.width, self.height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder
            .add_text_chunk(
                "Title".to_string(),
                "Elliott 903/920B plotter output".to_string(),
            )
            .map_err(|e| MachineError::PlotterEncoding(e.to_string()))?;
        let mut writer = encoder
            .write_header()
            .map_err(|e| MachineError::PlotterEncoding(e.to_string()))?;
        writer
            .write_image_data(&state.raster)
            .map_err(|e| MachineError::PlotterEncoding(e.to_string()))?;
        Ok(())
    }

    /// Whether any plotter command has ever been issued (used by the
    /// CLI to decide whether to mention the plotter file in its summary).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_command_allocates_raster_at_documented_origin() {
        let mut plotter = Plotter::new(3000, 2000, 1);
        plotter.command(PEN_DOWN);
        let state = plotter.state.as_ref().unwrap();
        assert_eq!(state.x, 1500);
        assert_eq!(state.y, 1800);
    }

    #[test]
    fn east_step_is_clamped_to_paper_width() {
        let mut plotter = Plotter::new(10, 10, 0);
        for _ in 0..100 {
            plotter.command(1); // step east repeatedly
        }
        assert_eq!(plotter.state.as_ref().unwrap().x, 10);
    }

    #[test]
    fn west_step_is_clamped_to_zero() {
        let mut plotter = Plotter::new(10, 10, 0);
        for _ in 0..100 {
            plotter.command(1 << 1); // step west repeatedly
        }
        assert_eq!(plotter.state.as_ref().unwrap().x, 0);
    }

    #[test]
    fn pen_down_paints_the_current_pixel() {
        let mut plotter = Plotter::new(10, 10, 0);
        plotter.command(PEN_DOWN);
        let state = plotter.state.as_ref().unwrap();
        let idx = (state.y as usize * 10 + state.x as usize) * 3;
        assert_eq!(&state.raster[idx..idx + 3], &[0, 0, 0]);
    }

    #[test]
    fn pen_up_does_not_paint_on_motion() {
        let mut plotter = Plotter::new(10, 10, 0);
        plotter.command(PEN_UP | 1); // step east, pen up
        let state = plotter.state.as_ref().unwrap();
        let idx = (state.y as usize * 10 + state.x as usize) * 3;
        assert_eq!(&state.raster[idx..idx + 3], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn inactive_plotter_never_allocates() {
        let plotter = Plotter::new(100, 100, 1);
        assert!(!plotter.is_active());
    }
}
