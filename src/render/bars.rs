use std::io::{self, Write};

use crate::spectrum::SpectrumFrame;

const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";
const CLEAR_LINE: &str = "\x1b[0K";

/// Eighth-block glyphs, empty to full.
const BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// How much of the running peak survives each tick; keeps the auto-scale
/// responsive without making quiet passages flatline.
const PEAK_DECAY: f32 = 0.995;

/// In-place terminal bar spectrum using ANSI escape sequences.
///
/// Each tick redraws a `columns x rows` block-glyph grid plus a status
/// line, moving the cursor back up afterwards. The cursor is hidden for
/// the renderer's lifetime and restored on drop.
pub struct TerminalRenderer {
    columns: usize,
    rows: usize,
    peak: f32,
    started: bool,
}

impl TerminalRenderer {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns: columns.max(8),
            rows: rows.max(2),
            peak: 1e-6,
            started: false,
        }
    }

    pub fn draw(&mut self, frame: &SpectrumFrame, time: f32, duration: f32) -> io::Result<()> {
        let levels = column_levels(&frame.magnitudes, self.columns);

        let frame_peak = levels.iter().cloned().fold(0.0f32, f32::max);
        self.peak = (self.peak * PEAK_DECAY).max(frame_peak).max(1e-6);

        let stdout = io::stdout();
        let mut out = stdout.lock();

        if !self.started {
            write!(out, "{}", HIDE_CURSOR)?;
            self.started = true;
        } else {
            // Back up over the previous grid and status line.
            write!(out, "\x1b[{}A", self.rows + 1)?;
        }

        let mut line = String::with_capacity(self.columns + 8);
        for row in 0..self.rows {
            line.clear();
            // Rows are drawn top-down; a column fills from the bottom.
            let threshold = (self.rows - row) as f32;
            for &level in &levels {
                let filled = (level / self.peak).clamp(0.0, 1.0) * self.rows as f32;
                let glyph = if filled >= threshold {
                    BLOCKS[8]
                } else if filled > threshold - 1.0 {
                    let eighths = ((filled - (threshold - 1.0)) * 8.0) as usize;
                    BLOCKS[eighths.min(8)]
                } else {
                    BLOCKS[0]
                };
                line.push(glyph);
            }
            writeln!(out, "{}{}", line, CLEAR_LINE)?;
        }

        let pulse = "#".repeat(((frame.volume * 0.5).clamp(0.0, 1.0) * 10.0) as usize);
        writeln!(
            out,
            "{:6.1}s / {:6.1}s  [{:<10}]{}",
            time, duration, pulse, CLEAR_LINE
        )?;
        out.flush()
    }
}

impl Drop for TerminalRenderer {
    fn drop(&mut self) {
        if self.started {
            let mut out = io::stdout();
            let _ = write!(out, "{}", SHOW_CURSOR);
            let _ = out.flush();
        }
    }
}

/// Group the lower half of the magnitude array (the non-mirrored bins)
/// into `columns` equal chunks, averaging within each chunk.
fn column_levels(magnitudes: &[f32], columns: usize) -> Vec<f32> {
    let usable = (magnitudes.len() / 2).max(1).min(magnitudes.len());
    let bins = &magnitudes[..usable];
    if bins.is_empty() {
        return vec![0.0; columns];
    }

    (0..columns)
        .map(|c| {
            let start = c * bins.len() / columns;
            let end = (((c + 1) * bins.len()) / columns).max(start + 1).min(bins.len());
            if start >= bins.len() {
                return 0.0;
            }
            let chunk = &bins[start..end];
            chunk.iter().sum::<f32>() / chunk.len() as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_levels_average_their_chunk() {
        // 8 usable bins (half of 16), 4 columns of 2 bins each.
        let mut magnitudes = vec![0.0f32; 16];
        for (i, m) in magnitudes.iter_mut().enumerate().take(8) {
            *m = i as f32;
        }
        let levels = column_levels(&magnitudes, 4);
        assert_eq!(levels, vec![0.5, 2.5, 4.5, 6.5]);
    }

    #[test]
    fn more_columns_than_bins_still_yields_columns() {
        let magnitudes = vec![1.0f32; 4]; // 2 usable bins
        let levels = column_levels(&magnitudes, 8);
        assert_eq!(levels.len(), 8);
        assert!(levels.iter().all(|&l| l >= 0.0));
    }

    #[test]
    fn empty_frame_renders_flat() {
        let levels = column_levels(&SpectrumFrame::empty(64).magnitudes, 16);
        assert!(levels.iter().all(|&l| l == 0.0));
    }
}
