//! Audio sources
//!
//! The capture worker pulls samples through the `AudioSource` trait: a
//! blocking `read` that returns between zero and `max_samples` samples.
//! `MicSource` wraps a cpal input stream; `WavSource` streams a 16 kHz mono
//! WAV file through the identical pipeline for offline runs and tests.

use crate::stream_buffer::AudioSample;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum AudioSourceError {
    /// The source has no more samples; the session ends normally.
    #[error("Audio source closed")]
    Closed,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Unsupported audio format: {0}")]
    Format(String),
}

/// Blocking pull source of mono 16-bit PCM.
///
/// `read` blocks until samples are available or the source is closed. A
/// zero-length `Ok` is tolerated by the caller and produces no buffer
/// advancement.
pub trait AudioSource: Send {
    fn read(&mut self, max_samples: usize) -> Result<Vec<AudioSample>, AudioSourceError>;
}

/// Live microphone source.
///
/// cpal stream handles are not `Send`, so the stream lives on a dedicated
/// thread that parks until shutdown; captured chunks arrive over a channel
/// and `read` drains them. Dropping the source stops the stream thread.
pub struct MicSource {
    chunk_rx: Receiver<Vec<AudioSample>>,
    pending: Vec<AudioSample>,
    shutdown_tx: Sender<()>,
    stream_thread: Option<JoinHandle<()>>,
}

impl MicSource {
    /// Open the default input device at the given sample rate (mono i16).
    pub fn open(sample_rate: u32) -> Result<Self, AudioSourceError> {
        let (chunk_tx, chunk_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let stream_thread = std::thread::spawn(move || {
            match Self::build_stream(sample_rate, chunk_tx) {
                Ok(stream) => {
                    if ready_tx.send(Ok(())).is_err() {
                        return;
                    }
                    // Keep the stream alive until shutdown is requested
                    shutdown_rx.recv().ok();
                    drop(stream);
                    debug!("Microphone stream released");
                }
                Err(e) => {
                    ready_tx.send(Err(e)).ok();
                }
            }
        });

        ready_rx
            .recv()
            .map_err(|_| AudioSourceError::Device("Capture thread exited".to_string()))??;

        info!("Microphone open at {} Hz, mono i16", sample_rate);
        Ok(Self {
            chunk_rx,
            pending: Vec::new(),
            shutdown_tx,
            stream_thread: Some(stream_thread),
        })
    }

    fn build_stream(
        sample_rate: u32,
        chunk_tx: Sender<Vec<AudioSample>>,
    ) -> Result<cpal::Stream, AudioSourceError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioSourceError::Device("No input device available".to_string()))?;

        let config = device
            .supported_input_configs()
            .map_err(|e| AudioSourceError::Device(e.to_string()))?
            .filter(|c| c.channels() == 1 && c.sample_format() == SampleFormat::I16)
            .find(|c| {
                c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate
            })
            .map(|c| c.with_sample_rate(SampleRate(sample_rate)))
            .ok_or_else(|| {
                AudioSourceError::Format(format!(
                    "No mono i16 input config at {} Hz",
                    sample_rate
                ))
            })?;

        let err_fn = |err| warn!("Audio stream error: {}", err);

        let stream = device
            .build_input_stream(
                &config.config(),
                move |data: &[AudioSample], _: &cpal::InputCallbackInfo| {
                    let _ = chunk_tx.send(data.to_vec());
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioSourceError::Device(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioSourceError::Device(e.to_string()))?;

        Ok(stream)
    }
}

impl AudioSource for MicSource {
    fn read(&mut self, max_samples: usize) -> Result<Vec<AudioSample>, AudioSourceError> {
        if self.pending.is_empty() {
            match self.chunk_rx.recv() {
                Ok(chunk) => self.pending = chunk,
                Err(_) => return Err(AudioSourceError::Closed),
            }
        }

        let take = self.pending.len().min(max_samples);
        Ok(self.pending.drain(..take).collect())
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.stream_thread.take() {
            let _ = handle.join();
        }
    }
}

/// WAV-file source for offline runs.
pub struct WavSource {
    reader: hound::WavReader<std::io::BufReader<std::fs::File>>,
}

impl WavSource {
    /// Open a mono 16-bit PCM WAV file, rejecting anything that does not
    /// match the configured sample rate.
    pub fn open<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self, AudioSourceError> {
        let reader =
            hound::WavReader::open(path).map_err(|e| AudioSourceError::Device(e.to_string()))?;

        let spec = reader.spec();
        if spec.channels != 1 {
            return Err(AudioSourceError::Format(format!(
                "Expected mono audio, file has {} channels",
                spec.channels
            )));
        }
        if spec.sample_rate != sample_rate {
            return Err(AudioSourceError::Format(format!(
                "Expected {} Hz, file is {} Hz",
                sample_rate, spec.sample_rate
            )));
        }
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(AudioSourceError::Format(
                "Expected 16-bit integer PCM".to_string(),
            ));
        }

        Ok(Self { reader })
    }
}

impl AudioSource for WavSource {
    fn read(&mut self, max_samples: usize) -> Result<Vec<AudioSample>, AudioSourceError> {
        let samples: Result<Vec<AudioSample>, _> = self
            .reader
            .samples::<i16>()
            .take(max_samples)
            .collect();

        let samples = samples.map_err(|e| AudioSourceError::Device(e.to_string()))?;
        if samples.is_empty() {
            return Err(AudioSourceError::Closed);
        }
        Ok(samples)
    }
}
