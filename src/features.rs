//! MFCC feature extraction
//!
//! Reduces one analysis window to a single fixed-length vector of cepstral
//! coefficients: pre-emphasis, overlapping sub-frames, Hamming window, FFT
//! magnitudes, mel filter bank, log compression, DCT-II, then an arithmetic
//! average of the per-sub-frame cepstra. The averaging collapses temporal
//! structure inside the window into one template vector; the classifier sees
//! one vector per window, not a sequence.

use crate::config::PipelineConfig;
use crate::spectral::{
    self, frame_count, hamming_window, mel_filter_bank, pre_emphasize, SpectrumAnalyzer,
};
use thiserror::Error;

/// Pre-emphasis coefficient (first-order high-pass).
pub const PRE_EMPHASIS: f32 = 0.97;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Invalid window length: expected {expected} samples, got {got}")]
    WindowLength { expected: usize, got: usize },
}

/// Extracts one feature vector per analysis window.
///
/// The Hamming coefficients, mel filter bank and FFT plan depend only on the
/// configuration, so they are computed once at construction and reused for
/// every window and sub-frame.
pub struct FeatureExtractor {
    window_len: usize,
    frame_len: usize,
    frame_step: usize,
    n_mfcc: usize,
    hamming: Vec<f32>,
    filter_bank: Vec<Vec<f64>>,
    analyzer: SpectrumAnalyzer,
}

impl FeatureExtractor {
    /// Build an extractor for a validated configuration.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            window_len: config.window_len,
            frame_len: config.frame_len,
            frame_step: config.frame_step,
            n_mfcc: config.n_mfcc,
            hamming: hamming_window(config.frame_len),
            filter_bank: mel_filter_bank(config.frame_len, config.sample_rate, config.n_mel_filters),
            analyzer: SpectrumAnalyzer::new(config.frame_len),
        }
    }

    /// Number of coefficients in each feature vector.
    pub fn n_mfcc(&self) -> usize {
        self.n_mfcc
    }

    /// Extract the feature vector for one normalized analysis window.
    pub fn extract(&self, window: &[f32]) -> Result<Vec<f32>, FeatureError> {
        if window.len() != self.window_len {
            return Err(FeatureError::WindowLength {
                expected: self.window_len,
                got: window.len(),
            });
        }

        let emphasized = pre_emphasize(window, PRE_EMPHASIS);
        let num_frames = frame_count(emphasized.len(), self.frame_len, self.frame_step);

        let mut mfcc_sum = vec![0.0f64; self.n_mfcc];
        let mut windowed = vec![0.0f32; self.frame_len];

        for frame in spectral::frames(&emphasized, self.frame_len, self.frame_step) {
            for (dst, (s, w)) in windowed.iter_mut().zip(frame.iter().zip(self.hamming.iter())) {
                *dst = s * w;
            }

            let spectrum = self.analyzer.magnitude_spectrum(&windowed);
            let log_mel = spectral::log_mel_energies(&spectrum, &self.filter_bank);
            let cepstrum = spectral::dct2(&log_mel, self.n_mfcc);

            for (sum, c) in mfcc_sum.iter_mut().zip(cepstrum.iter()) {
                *sum += c;
            }
        }

        Ok(mfcc_sum
            .iter()
            .map(|&c| (c / num_frames as f64) as f32)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&PipelineConfig::default())
    }

    fn tone_window(frequency: f32, len: usize) -> Vec<f32> {
        let sample_rate = 16_000.0;
        (0..len)
            .map(|i| 0.5 * (2.0 * PI * frequency * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_silence_yields_finite_features() {
        let extractor = extractor();
        let silence = vec![0.0f32; 16_000];

        let features = extractor.extract(&silence).unwrap();

        assert_eq!(features.len(), 13);
        for &c in &features {
            assert!(c.is_finite(), "silence must not produce NaN/Inf");
        }
    }

    #[test]
    fn test_feature_vector_length_matches_config() {
        let config = PipelineConfig {
            n_mfcc: 8,
            ..Default::default()
        };
        let extractor = FeatureExtractor::new(&config);
        let window = tone_window(440.0, 16_000);

        assert_eq!(extractor.extract(&window).unwrap().len(), 8);
    }

    #[test]
    fn test_wrong_window_length_rejected() {
        let extractor = extractor();
        let short = vec![0.0f32; 8000];

        match extractor.extract(&short) {
            Err(FeatureError::WindowLength { expected, got }) => {
                assert_eq!(expected, 16_000);
                assert_eq!(got, 8000);
            }
            other => panic!("expected WindowLength error, got {:?}", other),
        }
    }

    #[test]
    fn test_distinct_tones_produce_distinct_features() {
        let extractor = extractor();

        let low = extractor.extract(&tone_window(300.0, 16_000)).unwrap();
        let high = extractor.extract(&tone_window(3000.0, 16_000)).unwrap();

        let distance: f32 = low
            .iter()
            .zip(high.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt();
        assert!(distance > 1.0, "spectrally distinct inputs too close: {}", distance);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let extractor = extractor();
        let window = tone_window(880.0, 16_000);

        let first = extractor.extract(&window).unwrap();
        let second = extractor.extract(&window).unwrap();
        assert_eq!(first, second);
    }
}
