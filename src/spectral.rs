//! Spectral math for MFCC extraction
//!
//! Stateless building blocks: pre-emphasis, Hamming window, sub-framing,
//! FFT magnitude spectrum, mel filter bank, log-mel energies and DCT-II.
//! Everything here operates on plain slices so each step is independently
//! testable.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// First-order high-pass FIR: `y[0] = x[0]; y[i] = x[i] - alpha * x[i-1]`.
pub fn pre_emphasize(signal: &[f32], alpha: f32) -> Vec<f32> {
    if signal.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(signal.len());
    out.push(signal[0]);
    for i in 1..signal.len() {
        out.push(signal[i] - alpha * signal[i - 1]);
    }
    out
}

/// Hamming window coefficients: `0.54 - 0.46 * cos(2*pi*i / (n-1))`.
pub fn hamming_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos()) as f32)
        .collect()
}

/// Number of full sub-frames in a signal; the partial tail is dropped.
pub fn frame_count(signal_len: usize, frame_len: usize, frame_step: usize) -> usize {
    if signal_len < frame_len {
        return 0;
    }
    1 + (signal_len - frame_len) / frame_step
}

/// Iterate the overlapping sub-frames of a signal.
pub fn frames<'a>(
    signal: &'a [f32],
    frame_len: usize,
    frame_step: usize,
) -> impl Iterator<Item = &'a [f32]> + 'a {
    let count = frame_count(signal.len(), frame_len, frame_step);
    (0..count).map(move |i| &signal[i * frame_step..i * frame_step + frame_len])
}

/// FFT magnitude computation for one fixed frame length.
///
/// The plan is built once and reused across sub-frames. The mixed-radix
/// planner supports arbitrary lengths, including the 400-sample frame used
/// at 16 kHz; no power-of-two padding is involved, so the spectrum keeps
/// exactly `frame_len / 2` bins.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    frame_len: usize,
}

impl SpectrumAnalyzer {
    pub fn new(frame_len: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(frame_len),
            frame_len,
        }
    }

    /// Magnitude spectrum of one frame, `frame_len / 2` bins.
    pub fn magnitude_spectrum(&self, frame: &[f32]) -> Vec<f64> {
        debug_assert_eq!(frame.len(), self.frame_len);

        let mut buffer: Vec<Complex<f64>> = frame
            .iter()
            .map(|&s| Complex::new(s as f64, 0.0))
            .collect();

        self.fft.process(&mut buffer);

        buffer[..self.frame_len / 2]
            .iter()
            .map(|c| (c.re * c.re + c.im * c.im).sqrt())
            .collect()
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filter bank: `num_filters` weight vectors over
/// `fft_len / 2` spectral bins.
///
/// Filter edges are evenly spaced in mel between 0 Hz and Nyquist, mapped
/// back to bins via `floor((fft_len + 1) * hz / sample_rate)`. Each filter
/// rises linearly from its left edge to 1.0 at its center bin and falls
/// linearly to its right edge; weight is zero outside that support.
pub fn mel_filter_bank(fft_len: usize, sample_rate: u32, num_filters: usize) -> Vec<Vec<f64>> {
    let low_mel = hz_to_mel(0.0);
    let high_mel = hz_to_mel(sample_rate as f64 / 2.0);

    let bins: Vec<i64> = (0..num_filters + 2)
        .map(|i| low_mel + i as f64 * (high_mel - low_mel) / (num_filters + 1) as f64)
        .map(mel_to_hz)
        .map(|hz| ((fft_len + 1) as f64 * hz / sample_rate as f64).floor() as i64)
        .collect();

    (0..num_filters)
        .map(|i| {
            (0..fft_len / 2)
                .map(|j| {
                    let j = j as i64;
                    if j < bins[i] {
                        0.0
                    } else if j <= bins[i + 1] {
                        (j - bins[i]) as f64 / (bins[i + 1] - bins[i]) as f64
                    } else if j <= bins[i + 2] {
                        (bins[i + 2] - j) as f64 / (bins[i + 2] - bins[i + 1]) as f64
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

/// Per-filter weighted energy, log-compressed. The epsilon floor keeps
/// all-zero spectra (silence) out of `ln(0)`.
pub fn log_mel_energies(spectrum: &[f64], filter_bank: &[Vec<f64>]) -> Vec<f64> {
    filter_bank
        .iter()
        .map(|filter| {
            let energy: f64 = filter
                .iter()
                .zip(spectrum.iter())
                .map(|(w, s)| w * s)
                .sum();
            (energy + 1e-9).ln()
        })
        .collect()
}

/// DCT-II: `c[k] = sum_n x[n] * cos(pi * k * (n + 0.5) / N)`.
pub fn dct2(log_mel: &[f64], num_coeffs: usize) -> Vec<f64> {
    let n = log_mel.len();
    (0..num_coeffs)
        .map(|k| {
            log_mel
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * k as f64 * (i as f64 + 0.5) / n as f64).cos())
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tone(frequency: f64, sample_rate: f64, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f64 / sample_rate;
                amplitude * (2.0 * PI * frequency * t).sin() as f32
            })
            .collect()
    }

    #[test]
    fn test_pre_emphasis_values() {
        let signal = vec![1.0, 1.0, 1.0, 1.0];
        let out = pre_emphasize(&signal, 0.97);

        assert_relative_eq!(out[0], 1.0);
        for &y in &out[1..] {
            assert_relative_eq!(y, 0.03, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_pre_emphasis_empty_signal() {
        assert!(pre_emphasize(&[], 0.97).is_empty());
    }

    #[test]
    fn test_hamming_window_shape() {
        let window = hamming_window(400);
        assert_eq!(window.len(), 400);

        // 0.08 at the edges, 1.0 at the center
        assert_relative_eq!(window[0], 0.08, epsilon = 1e-4);
        assert_relative_eq!(window[399], 0.08, epsilon = 1e-4);
        let peak = window.iter().cloned().fold(f32::MIN, f32::max);
        assert_relative_eq!(peak, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_frame_count_drops_tail() {
        // 1000 samples, 400-frame, 160-step: frames at 0, 160, 240... up to 600
        assert_eq!(frame_count(1000, 400, 160), 4);
        // Exactly one frame
        assert_eq!(frame_count(400, 400, 160), 1);
        // Too short for any frame
        assert_eq!(frame_count(399, 400, 160), 0);
    }

    #[test]
    fn test_frames_overlap() {
        let signal: Vec<f32> = (0..720).map(|i| i as f32).collect();
        let got: Vec<&[f32]> = frames(&signal, 400, 160).collect();

        assert_eq!(got.len(), 3);
        assert_relative_eq!(got[0][160], got[1][0]);
        assert_relative_eq!(got[1][160], got[2][0]);
    }

    #[test]
    fn test_magnitude_spectrum_length() {
        let analyzer = SpectrumAnalyzer::new(400);
        let frame = vec![0.0f32; 400];
        assert_eq!(analyzer.magnitude_spectrum(&frame).len(), 200);
    }

    #[test]
    fn test_tone_energy_concentrates_in_nearest_bin() {
        // Full front half of the chain: pre-emphasis, framing, windowing,
        // magnitude spectrum. 1 kHz at 16 kHz with a 400-point transform
        // lands in bin 25 (40 Hz per bin).
        let sample_rate = 16_000.0;
        let signal = tone(1000.0, sample_rate, 1600, 0.8);
        let emphasized = pre_emphasize(&signal, 0.97);
        let window = hamming_window(400);
        let analyzer = SpectrumAnalyzer::new(400);

        let frame = frames(&emphasized, 400, 160).next().unwrap();
        let windowed: Vec<f32> = frame.iter().zip(window.iter()).map(|(s, w)| s * w).collect();
        let spectrum = analyzer.magnitude_spectrum(&windowed);

        let peak_bin = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();

        assert!(
            (peak_bin as i64 - 25).abs() <= 1,
            "peak at bin {}, expected within one bin of 25",
            peak_bin
        );
    }

    #[test]
    fn test_mel_filter_peaks_strictly_increase() {
        let bank = mel_filter_bank(400, 16_000, 26);
        assert_eq!(bank.len(), 26);

        let mut last_peak = -1i64;
        for filter in &bank {
            assert_eq!(filter.len(), 200);
            let peak = filter
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                .map(|(i, _)| i as i64)
                .unwrap();
            assert!(peak > last_peak, "peak bins must strictly increase");
            last_peak = peak;
        }
    }

    #[test]
    fn test_mel_filter_zero_outside_support() {
        let bank = mel_filter_bank(400, 16_000, 26);

        for filter in &bank {
            let first_nonzero = filter.iter().position(|&w| w > 0.0).unwrap();
            let last_nonzero = filter.iter().rposition(|&w| w > 0.0).unwrap();

            for (j, &w) in filter.iter().enumerate() {
                if j < first_nonzero || j > last_nonzero {
                    assert_eq!(w, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_log_mel_energies_floor_on_silence() {
        let bank = mel_filter_bank(400, 16_000, 26);
        let spectrum = vec![0.0f64; 200];
        let energies = log_mel_energies(&spectrum, &bank);

        assert_eq!(energies.len(), 26);
        for &e in &energies {
            assert!(e.is_finite());
            assert_relative_eq!(e, 1e-9f64.ln(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_dct2_constant_input() {
        // DCT-II of a constant: c[0] = N * value, higher coefficients vanish
        let log_mel = vec![2.0f64; 26];
        let coeffs = dct2(&log_mel, 13);

        assert_relative_eq!(coeffs[0], 52.0, epsilon = 1e-9);
        for &c in &coeffs[1..] {
            assert_relative_eq!(c, 0.0, epsilon = 1e-9);
        }
    }
}
