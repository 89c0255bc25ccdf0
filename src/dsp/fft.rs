use num_complex::Complex32;

use crate::error::SpectrumError;

/// Radix strategy for the recursive transform. Both produce identical
/// results; radix-4 trades recursion depth for wider butterflies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Radix {
    Two,
    Four,
}

/// Forward real-input FFT with an integer oversampling ("zoom") factor.
///
/// The transform evaluates the DFT of the input implicitly zero-padded to
/// `size * zoom` points: the recursive decimation-in-time butterflies are
/// run with `zoom` extra output bands, addressed through a twiddle table
/// spanning the full oversampled length. Output is the magnitude spectrum,
/// `size * zoom` non-negative values.
///
/// The twiddle table is tied to `(size, zoom)`; changing either means
/// constructing a new engine.
#[derive(Debug)]
pub struct FastRealFourierTransform {
    size: usize,
    zoom: usize,
    twiddles: Vec<Complex32>,
}

impl FastRealFourierTransform {
    pub fn new(size: usize, zoom: usize) -> Result<Self, SpectrumError> {
        if zoom < 1 {
            return Err(SpectrumError::InvalidZoom(zoom));
        }
        if size < 2 || !size.is_power_of_two() {
            return Err(SpectrumError::InvalidSize(size));
        }

        let total = size * zoom;
        let twiddles = (0..total)
            .map(|k| {
                let theta = -2.0 * std::f64::consts::PI * k as f64 / total as f64;
                Complex32::new(theta.cos() as f32, theta.sin() as f32)
            })
            .collect();

        Ok(Self { size, zoom, twiddles })
    }

    /// Input window length `N` this engine was built for.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Oversampling factor `r`; output bins are spaced `1/r` of a natural bin.
    pub fn zoom(&self) -> usize {
        self.zoom
    }

    /// Compute the oversampled magnitude spectrum of `input`.
    ///
    /// Fails if `input.len()` differs from the construction-time size.
    pub fn transform(&self, input: &[f32], radix: Radix) -> Result<Vec<f32>, SpectrumError> {
        if input.len() != self.size {
            return Err(SpectrumError::WindowLength {
                expected: self.size,
                actual: input.len(),
            });
        }

        let spectrum = match radix {
            Radix::Two => self.radix2(input, 0, 1, self.size),
            Radix::Four => self.radix4(input, 0, 1, self.size),
        };

        Ok(spectrum.iter().map(|c| c.norm()).collect())
    }

    /// Classic even/odd split. `start`/`step` select the interleaved
    /// sub-sequence of `x`; the result holds `zoom * size` bins.
    fn radix2(&self, x: &[f32], start: usize, step: usize, size: usize) -> Vec<Complex32> {
        let r = self.zoom;

        if size == 2 {
            let x0 = x[start];
            let x1 = x[start + step];
            let stride = self.size / 2;

            let mut out = vec![Complex32::default(); 2 * r];
            for k in 0..r {
                let w = self.twiddles[k * stride];
                out[k] = Complex32::new(x0 + x1 * w.re, x1 * w.im);
                out[k + r] = Complex32::new(x0 - x1 * w.re, -x1 * w.im);
            }
            return out;
        }

        let half = size / 2;
        let even = self.radix2(x, start, 2 * step, half);
        let odd = self.radix2(x, start + step, 2 * step, half);

        let stride = self.size / size;
        let mut out = vec![Complex32::default(); r * size];
        for k in 0..r * half {
            let t = self.twiddles[k * stride] * odd[k];
            out[k] = even[k] + t;
            out[k + r * half] = even[k] - t;
        }
        out
    }

    /// Four-way split combined with powers W, W^2, W^3 of the twiddle
    /// factor. Falls back to the radix-2 base case when only two points
    /// remain (sizes of the form 2 * 4^m).
    fn radix4(&self, x: &[f32], start: usize, step: usize, size: usize) -> Vec<Complex32> {
        let r = self.zoom;

        if size == 2 {
            return self.radix2(x, start, step, size);
        }

        if size == 4 {
            let stride = self.size / 4;
            let x0 = Complex32::new(x[start], 0.0);
            let x1 = x[start + step];
            let x2 = x[start + 2 * step];
            let x3 = x[start + 3 * step];

            let mut out = vec![Complex32::default(); 4 * r];
            for k in 0..r {
                let t1 = self.twiddles[k * stride] * x1;
                let t2 = self.twiddles[2 * k * stride] * x2;
                let t3 = self.twiddles[3 * k * stride] * x3;
                butterfly4(&mut out, k, r, x0, t1, t2, t3);
            }
            return out;
        }

        let quarter = size / 4;
        let c0 = self.radix4(x, start, 4 * step, quarter);
        let c1 = self.radix4(x, start + step, 4 * step, quarter);
        let c2 = self.radix4(x, start + 2 * step, 4 * step, quarter);
        let c3 = self.radix4(x, start + 3 * step, 4 * step, quarter);

        let stride = self.size / size;
        let mut out = vec![Complex32::default(); r * size];
        for k in 0..r * quarter {
            let t1 = self.twiddles[k * stride] * c1[k];
            let t2 = self.twiddles[2 * k * stride] * c2[k];
            let t3 = self.twiddles[3 * k * stride] * c3[k];
            butterfly4(&mut out, k, r * quarter, c0[k], t1, t2, t3);
        }
        out
    }
}

/// Four-point butterfly: output band `k + j*band` takes the input terms
/// rotated by `(-i)^j`, the quarter-turn phase between output bands.
#[inline]
fn butterfly4(
    out: &mut [Complex32],
    k: usize,
    band: usize,
    c0: Complex32,
    t1: Complex32,
    t2: Complex32,
    t3: Complex32,
) {
    let neg_i = |c: Complex32| Complex32::new(c.im, -c.re);
    let pos_i = |c: Complex32| Complex32::new(-c.im, c.re);

    out[k] = c0 + t1 + t2 + t3;
    out[k + band] = c0 + neg_i(t1) - t2 + pos_i(t3);
    out[k + 2 * band] = c0 - t1 + t2 - t3;
    out[k + 3 * band] = c0 + pos_i(t1) - t2 + neg_i(t3);
}
