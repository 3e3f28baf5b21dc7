//! Classifier boundary
//!
//! The trained model stays outside this crate; the pipeline consumes it
//! only through `predict(features) -> probability`. Implementations load
//! their model blob once at startup and surface load failures to the
//! caller instead of swallowing them.

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Model not initialized")]
    NotInitialized,

    #[error("Invalid input size: expected {expected} features, got {got}")]
    InvalidInputSize { expected: usize, got: usize },

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Wake-word probability for one feature vector.
///
/// `predict` returns a value in [0, 1]. A feature vector whose length does
/// not match the model input is an error, never a panic.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[f32]) -> Result<f32, ClassifierError>;
}

/// Energy-proxy classifier.
///
/// NOTE: This is a stand-in so the pipeline runs end-to-end before a trained
/// model is wired in. The zeroth cepstral coefficient tracks overall log
/// energy, so mapping it through a logistic gives a probability that rises
/// with input loudness. It exercises the full `predict` contract, including
/// input-size validation.
pub struct EnergyProxyClassifier {
    n_features: usize,
    center: f32,
    scale: f32,
}

impl EnergyProxyClassifier {
    /// Logistic midpoint on the c0 axis. Silence sits near 26 * ln(1e-9)
    /// (about -539); speech-level input sits far above it.
    const DEFAULT_CENTER: f32 = -400.0;
    const DEFAULT_SCALE: f32 = 60.0;

    pub fn new(n_features: usize) -> Self {
        debug!("Using energy-proxy classifier over {} features", n_features);
        Self {
            n_features,
            center: Self::DEFAULT_CENTER,
            scale: Self::DEFAULT_SCALE,
        }
    }
}

impl Classifier for EnergyProxyClassifier {
    fn predict(&self, features: &[f32]) -> Result<f32, ClassifierError> {
        if features.len() != self.n_features {
            return Err(ClassifierError::InvalidInputSize {
                expected: self.n_features,
                got: features.len(),
            });
        }

        let c0 = features[0];
        let probability = 1.0 / (1.0 + (-(c0 - self.center) / self.scale).exp());
        Ok(probability)
    }
}
