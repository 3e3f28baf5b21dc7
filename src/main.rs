//! Keyword-spotting service binary
//!
//! Listens on the default microphone (or a WAV file via `WAKESPOT_WAV`) and
//! logs detection events. Runs with the energy-proxy classifier until a
//! trained model is wired in.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use wakespot::{
    AudioSource, EnergyProxyClassifier, MicSource, PipelineConfig, PipelineEvent, WakeWordPipeline,
    WavSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wakespot=debug".parse()?),
        )
        .init();

    info!("Starting wakespot service");

    let config = load_config()?;

    let source: Box<dyn AudioSource> = match std::env::var("WAKESPOT_WAV") {
        Ok(path) => {
            info!("Reading audio from {}", path);
            Box::new(WavSource::open(&path, config.sample_rate)?)
        }
        Err(_) => Box::new(MicSource::open(config.sample_rate)?),
    };

    let classifier = Arc::new(EnergyProxyClassifier::new(config.n_mfcc));

    let pipeline = WakeWordPipeline::new(config, source, classifier)?;
    pipeline.start().await?;
    info!("Listening for the wake word...");

    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    loop {
        tokio::select! {
            event = pipeline.recv_event() => {
                match event {
                    Some(event) => report(&event),
                    None => {
                        info!("Event channel closed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, stopping");
                break;
            }
            _ = ticker.tick() => {
                if !pipeline.stats().is_running {
                    while let Some(event) = pipeline.try_recv_event().await {
                        report(&event);
                    }
                    info!("Session ended");
                    break;
                }
            }
        }
    }

    pipeline.stop().await;

    let stats = pipeline.stats();
    info!(
        "Processed {} windows, {} detections",
        stats.windows_processed, stats.detections
    );
    Ok(())
}

fn report(event: &PipelineEvent) {
    match event {
        PipelineEvent::Detection(detection) => info!(
            "Wake word detected! confidence={:.2}, timestamp={}",
            detection.confidence, detection.timestamp_ms
        ),
        PipelineEvent::Score(score) => debug!(
            "Window scored: raw={:.3} smoothed={:.3}",
            score.raw, score.smoothed
        ),
        PipelineEvent::SourceError(message) => error!("Audio source error: {}", message),
    }
}

/// Load configuration from a JSON file (`WAKESPOT_CONFIG`) with environment
/// overrides for the most commonly tuned knobs.
fn load_config() -> Result<PipelineConfig> {
    let mut config = match std::env::var("WAKESPOT_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Reading config file {}", path))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Parsing config file {}", path))?
        }
        Err(_) => PipelineConfig::default(),
    };

    if let Ok(threshold) = std::env::var("WAKESPOT_THRESHOLD") {
        config.threshold = threshold
            .parse()
            .context("WAKESPOT_THRESHOLD must be a float")?;
    }
    if let Ok(hits) = std::env::var("WAKESPOT_REQUIRED_HITS") {
        config.required_hits = hits
            .parse()
            .context("WAKESPOT_REQUIRED_HITS must be an integer")?;
    }
    if let Ok(hop) = std::env::var("WAKESPOT_HOP_LEN") {
        config.hop_len = hop
            .parse()
            .context("WAKESPOT_HOP_LEN must be an integer")?;
    }

    Ok(config)
}
