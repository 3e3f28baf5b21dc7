//! Capture pipeline
//!
//! One dedicated blocking worker pulls samples from the audio source and
//! runs the whole chain inline: stream buffer, feature extraction, the
//! external classifier, score smoothing and the detection policy. Keeping
//! everything on one worker makes per-window latency deterministic and
//! gives events a strict temporal order. Consumers only ever see the
//! unbounded event channel; sending never blocks the worker.
//!
//! Stop is cooperative: a flag checked at the top of each loop iteration,
//! so at most one blocking read is pending after a stop request. The source
//! handle is released and the buffer reset on every exit path.

use crate::classifier::Classifier;
use crate::config::{ConfigError, PipelineConfig};
use crate::features::FeatureExtractor;
use crate::policy::{DetectionEvent, DetectionPolicy};
use crate::smoothing::ConfidenceSmoother;
use crate::source::{AudioSource, AudioSourceError};
use crate::stream_buffer::StreamBuffer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Raw and smoothed confidence for one scored window, for diagnostic
/// consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreUpdate {
    pub raw: f32,
    pub smoothed: f32,
    pub timestamp_ms: i64,
}

/// Messages dispatched to the consumer side.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Confidence for one window
    Score(ScoreUpdate),

    /// Accepted, debounced detection
    Detection(DetectionEvent),

    /// The audio source failed; the session has ended
    SourceError(String),
}

/// Point-in-time pipeline counters.
#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub windows_processed: u64,
    pub detections: u64,
    pub buffered_samples: usize,
    pub is_running: bool,
}

/// Worker-side state shared with the controlling handle.
struct Shared {
    buffer: StreamBuffer,
    stop: AtomicBool,
    running: AtomicBool,
    windows_processed: AtomicU64,
    detections: AtomicU64,
}

/// One capture session: source in, events out.
///
/// A pipeline drives a single session; `start` consumes the audio source
/// and `stop` ends the session. Build a fresh pipeline (and source) for the
/// next session.
pub struct WakeWordPipeline {
    config: PipelineConfig,
    shared: Arc<Shared>,
    classifier: Arc<dyn Classifier>,
    source: Mutex<Option<Box<dyn AudioSource>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    event_tx: mpsc::UnboundedSender<PipelineEvent>,
    event_rx: Arc<RwLock<mpsc::UnboundedReceiver<PipelineEvent>>>,
}

impl WakeWordPipeline {
    /// Create a pipeline over a validated configuration.
    pub fn new(
        config: PipelineConfig,
        source: Box<dyn AudioSource>,
        classifier: Arc<dyn Classifier>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        info!(
            "Initializing pipeline: window={} hop={} threshold={} hits={} cooldown={}ms",
            config.window_len,
            config.hop_len,
            config.threshold,
            config.required_hits,
            config.cooldown_ms
        );

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let shared = Shared {
            buffer: StreamBuffer::new(config.window_len, config.hop_len),
            stop: AtomicBool::new(false),
            running: AtomicBool::new(false),
            windows_processed: AtomicU64::new(0),
            detections: AtomicU64::new(0),
        };

        Ok(Self {
            config,
            shared: Arc::new(shared),
            classifier,
            source: Mutex::new(Some(source)),
            worker: Mutex::new(None),
            event_tx,
            event_rx: Arc::new(RwLock::new(event_rx)),
        })
    }

    /// Start the capture worker.
    pub async fn start(&self) -> Result<(), PipelineError> {
        let mut source_slot = self.source.lock().await;
        let source = match source_slot.take() {
            Some(source) => source,
            None => {
                warn!("Pipeline already started");
                return Ok(());
            }
        };
        drop(source_slot);

        self.shared.running.store(true, Ordering::Release);

        let worker = Worker {
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            classifier: Arc::clone(&self.classifier),
            event_tx: self.event_tx.clone(),
        };
        let handle = tokio::task::spawn_blocking(move || worker.run(source));

        *self.worker.lock().await = Some(handle);
        info!("Pipeline started");
        Ok(())
    }

    /// Request a cooperative stop and wait for the worker to finish.
    pub async fn stop(&self) {
        self.shared.stop.store(true, Ordering::Release);

        let handle = self.worker.lock().await.take();
        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    error!("Capture worker panicked: {}", e);
                }
                info!("Pipeline stopped");
            }
            None => warn!("Pipeline not running"),
        }
    }

    /// Get the next event (non-blocking).
    pub async fn try_recv_event(&self) -> Option<PipelineEvent> {
        self.event_rx.write().await.try_recv().ok()
    }

    /// Get the next event (blocking).
    pub async fn recv_event(&self) -> Option<PipelineEvent> {
        self.event_rx.write().await.recv().await
    }

    /// Current counters.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            windows_processed: self.shared.windows_processed.load(Ordering::Relaxed),
            detections: self.shared.detections.load(Ordering::Relaxed),
            buffered_samples: self.shared.buffer.len(),
            is_running: self.shared.running.load(Ordering::Acquire),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

struct Worker {
    config: PipelineConfig,
    shared: Arc<Shared>,
    classifier: Arc<dyn Classifier>,
    event_tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl Worker {
    fn run(self, mut source: Box<dyn AudioSource>) {
        let extractor = FeatureExtractor::new(&self.config);
        let mut smoother = ConfidenceSmoother::new(self.config.smooth_window);
        let mut policy = DetectionPolicy::new(
            self.config.threshold,
            self.config.required_hits,
            self.config.cooldown_ms,
        );

        info!("Capture worker running");

        'session: while !self.shared.stop.load(Ordering::Acquire) {
            let samples = match source.read(self.config.read_chunk) {
                Ok(samples) => samples,
                Err(AudioSourceError::Closed) => {
                    info!("Audio source closed, ending session");
                    break 'session;
                }
                Err(e) => {
                    error!("Audio source failed: {}", e);
                    let _ = self
                        .event_tx
                        .send(PipelineEvent::SourceError(e.to_string()));
                    break 'session;
                }
            };

            // Zero-length reads are tolerated and advance nothing
            if samples.is_empty() {
                continue;
            }
            self.shared.buffer.push(&samples);

            while let Some(window) = self.shared.buffer.try_take_window() {
                if self.shared.stop.load(Ordering::Acquire) {
                    break 'session;
                }

                let features = match extractor.extract(&window) {
                    Ok(features) => features,
                    Err(e) => {
                        warn!("Skipping malformed window: {}", e);
                        continue;
                    }
                };

                let raw = match self.classifier.predict(&features) {
                    Ok(probability) => probability,
                    Err(e) => {
                        // No score this window; the hit streak cannot survive
                        warn!("Classifier error, no score this window: {}", e);
                        policy.clear_hits();
                        continue;
                    }
                };

                let smoothed = smoother.add(raw);
                let now_ms = current_timestamp_ms();
                self.shared.windows_processed.fetch_add(1, Ordering::Relaxed);

                let _ = self.event_tx.send(PipelineEvent::Score(ScoreUpdate {
                    raw,
                    smoothed,
                    timestamp_ms: now_ms,
                }));

                if let Some(event) = policy.evaluate(smoothed, now_ms) {
                    smoother.reset();
                    self.shared.detections.fetch_add(1, Ordering::Relaxed);
                    info!(
                        "Wake word detected: confidence={:.3} at {} ms",
                        event.confidence, event.timestamp_ms
                    );
                    let _ = self.event_tx.send(PipelineEvent::Detection(event));
                }
            }
        }

        // Release the source handle, then clear session state so nothing
        // leaks into a later session
        drop(source);
        self.shared.buffer.reset();
        self.shared.running.store(false, Ordering::Release);
        info!("Capture worker stopped");
    }
}

/// Milliseconds since the Unix epoch.
fn current_timestamp_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}
