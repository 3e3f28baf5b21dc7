//! Keyword-spotting front end
//!
//! Converts a live sample stream into fixed-length MFCC feature vectors and
//! turns a sequence of noisy per-window classifier scores into debounced
//! wake-word detection events. The trained classifier itself stays external,
//! consumed through the `Classifier` trait.

pub mod classifier;
pub mod config;
pub mod features;
pub mod pipeline;
pub mod policy;
pub mod smoothing;
pub mod source;
pub mod spectral;
pub mod stream_buffer;

// Re-export main types
pub use classifier::{Classifier, ClassifierError, EnergyProxyClassifier};
pub use config::{ConfigError, PipelineConfig};
pub use features::{FeatureError, FeatureExtractor};
pub use pipeline::{
    PipelineError, PipelineEvent, PipelineStats, ScoreUpdate, WakeWordPipeline,
};
pub use policy::{DetectionEvent, DetectionPolicy};
pub use smoothing::ConfidenceSmoother;
pub use source::{AudioSource, AudioSourceError, MicSource, WavSource};
pub use stream_buffer::{AudioSample, StreamBuffer};
