//! Pipeline configuration
//!
//! A single immutable configuration value handed to every component at
//! construction. Validation runs before a session can start, so a pipeline
//! built from a validated config never has to re-check frame geometry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid frame geometry: {0}")]
    InvalidFrameGeometry(String),

    #[error("Invalid window geometry: {0}")]
    InvalidWindowGeometry(String),

    #[error("Invalid detection parameter: {0}")]
    InvalidDetectionParameter(String),
}

/// Configuration for the whole keyword-spotting pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input sample rate in Hz (mono, 16-bit PCM)
    pub sample_rate: u32,

    /// Analysis window length in samples (one feature vector per window)
    pub window_len: usize,

    /// Window hop in samples; `hop_len == window_len` consumes each window
    /// whole, `hop_len < window_len` slides with overlap
    pub hop_len: usize,

    /// Sub-frame length in samples for spectral analysis
    pub frame_len: usize,

    /// Sub-frame step in samples (sub-frames overlap within a window)
    pub frame_step: usize,

    /// Number of cepstral coefficients per feature vector
    pub n_mfcc: usize,

    /// Number of triangular mel filters
    pub n_mel_filters: usize,

    /// Capacity of the score moving-average window
    pub smooth_window: usize,

    /// Smoothed-score threshold for a hit
    pub threshold: f32,

    /// Consecutive hits required before a detection fires
    pub required_hits: u32,

    /// Minimum time between two detections, in milliseconds
    pub cooldown_ms: i64,

    /// Samples requested per audio-source read
    pub read_chunk: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            window_len: 16_000,
            hop_len: 16_000,
            frame_len: 400,
            frame_step: 160,
            n_mfcc: 13,
            n_mel_filters: 26,
            smooth_window: 5,
            threshold: 0.45,
            required_hits: 3,
            cooldown_ms: 2000,
            read_chunk: 1024,
        }
    }
}

impl PipelineConfig {
    /// Validate the configuration. Must pass before a session starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::InvalidWindowGeometry(
                "sample_rate must be greater than 0".to_string(),
            ));
        }

        if self.frame_step == 0 || self.frame_step > self.frame_len {
            return Err(ConfigError::InvalidFrameGeometry(format!(
                "frame_step ({}) must be in 1..=frame_len ({})",
                self.frame_step, self.frame_len
            )));
        }

        if self.frame_len > self.window_len {
            return Err(ConfigError::InvalidFrameGeometry(format!(
                "frame_len ({}) must not exceed window_len ({})",
                self.frame_len, self.window_len
            )));
        }

        if self.hop_len == 0 || self.hop_len > self.window_len {
            return Err(ConfigError::InvalidWindowGeometry(format!(
                "hop_len ({}) must be in 1..=window_len ({})",
                self.hop_len, self.window_len
            )));
        }

        if self.n_mel_filters == 0 {
            return Err(ConfigError::InvalidFrameGeometry(
                "n_mel_filters must be greater than 0".to_string(),
            ));
        }

        if self.n_mfcc == 0 || self.n_mfcc > self.n_mel_filters {
            return Err(ConfigError::InvalidFrameGeometry(format!(
                "n_mfcc ({}) must be in 1..=n_mel_filters ({})",
                self.n_mfcc, self.n_mel_filters
            )));
        }

        if self.smooth_window == 0 {
            return Err(ConfigError::InvalidDetectionParameter(
                "smooth_window must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ConfigError::InvalidDetectionParameter(
                "threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.required_hits == 0 {
            return Err(ConfigError::InvalidDetectionParameter(
                "required_hits must be greater than 0".to_string(),
            ));
        }

        if self.cooldown_ms < 0 {
            return Err(ConfigError::InvalidDetectionParameter(
                "cooldown_ms must not be negative".to_string(),
            ));
        }

        if self.read_chunk == 0 {
            return Err(ConfigError::InvalidWindowGeometry(
                "read_chunk must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// True when successive windows share samples.
    pub fn is_overlapping(&self) -> bool {
        self.hop_len < self.window_len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.is_overlapping());
    }

    #[test]
    fn test_overlapping_mode() {
        let config = PipelineConfig {
            hop_len: 4000,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.is_overlapping());
    }

    #[test]
    fn test_step_larger_than_frame_rejected() {
        let config = PipelineConfig {
            frame_step: 500,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFrameGeometry(_))
        ));
    }

    #[test]
    fn test_frame_larger_than_window_rejected() {
        let config = PipelineConfig {
            window_len: 300,
            hop_len: 300,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_hop_rejected() {
        let config = PipelineConfig {
            hop_len: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWindowGeometry(_))
        ));
    }

    #[test]
    fn test_hop_larger_than_window_rejected() {
        let config = PipelineConfig {
            hop_len: 20_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let config = PipelineConfig {
            threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDetectionParameter(_))
        ));
    }

    #[test]
    fn test_mfcc_exceeding_filters_rejected() {
        let config = PipelineConfig {
            n_mfcc: 30,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_required_hits_rejected() {
        let config = PipelineConfig {
            required_hits: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
