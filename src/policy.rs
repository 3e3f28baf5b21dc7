//! Detection policy
//!
//! Converts the stream of smoothed scores into rate-limited detection
//! events. Two mechanisms stack: a score above threshold increments a
//! consecutive-hit counter (anything at or below it resets the counter to
//! zero), and a trigger is accepted only once the counter reaches
//! `required_hits` AND the cooldown since the previous trigger has elapsed.
//! Hits keep accumulating during cooldown; only the final trigger is gated
//! by elapsed time.

use tracing::debug;

/// A single accepted detection.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    /// Smoothed confidence at trigger time (0.0 - 1.0)
    pub confidence: f32,

    /// Trigger time, milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

/// Consecutive-hit + cooldown state machine.
///
/// Timestamps are passed in by the caller, so the machine itself never
/// reads a clock.
pub struct DetectionPolicy {
    threshold: f32,
    required_hits: u32,
    cooldown_ms: i64,
    consecutive_hits: u32,
    last_trigger_ms: Option<i64>,
}

impl DetectionPolicy {
    pub fn new(threshold: f32, required_hits: u32, cooldown_ms: i64) -> Self {
        debug_assert!(required_hits > 0);
        Self {
            threshold,
            required_hits,
            cooldown_ms,
            consecutive_hits: 0,
            last_trigger_ms: None,
        }
    }

    /// Feed one smoothed score observed at `now_ms`.
    ///
    /// Returns a `DetectionEvent` when the trigger condition is met; the
    /// caller must then clear the smoother history so the next detection
    /// starts from fresh scores.
    pub fn evaluate(&mut self, smoothed_score: f32, now_ms: i64) -> Option<DetectionEvent> {
        if smoothed_score > self.threshold {
            self.consecutive_hits += 1;
        } else {
            self.consecutive_hits = 0;
        }

        let cooled_down = match self.last_trigger_ms {
            Some(last) => now_ms - last > self.cooldown_ms,
            None => true,
        };

        if self.consecutive_hits >= self.required_hits && cooled_down {
            self.last_trigger_ms = Some(now_ms);
            self.consecutive_hits = 0;
            debug!(
                "Detection accepted: confidence={:.3} at {} ms",
                smoothed_score, now_ms
            );
            return Some(DetectionEvent {
                confidence: smoothed_score,
                timestamp_ms: now_ms,
            });
        }

        None
    }

    /// Zero the consecutive-hit counter without touching the cooldown.
    /// Used when a window produced no score at all.
    pub fn clear_hits(&mut self) {
        self.consecutive_hits = 0;
    }

    /// Return to the initial state: no hits, no previous trigger.
    pub fn reset(&mut self) {
        self.consecutive_hits = 0;
        self.last_trigger_ms = None;
    }

    pub fn consecutive_hits(&self) -> u32 {
        self.consecutive_hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn policy() -> DetectionPolicy {
        DetectionPolicy::new(0.45, 3, 2000)
    }

    #[test]
    fn test_three_hits_trigger_once() {
        let mut policy = policy();

        assert!(policy.evaluate(0.5, 0).is_none());
        assert!(policy.evaluate(0.5, 100).is_none());

        let event = policy.evaluate(0.5, 200).expect("third hit must trigger");
        assert_relative_eq!(event.confidence, 0.5);
        assert_eq!(event.timestamp_ms, 200);
        assert_eq!(policy.consecutive_hits(), 0);
    }

    #[test]
    fn test_cooldown_suppresses_second_event() {
        let mut policy = policy();

        policy.evaluate(0.5, 0);
        policy.evaluate(0.5, 100);
        assert!(policy.evaluate(0.5, 200).is_some());

        // Three more qualifying scores inside the 2000 ms cooldown
        assert!(policy.evaluate(0.5, 300).is_none());
        assert!(policy.evaluate(0.5, 400).is_none());
        assert!(policy.evaluate(0.5, 500).is_none());

        // After the cooldown a qualifying run triggers again
        let event = policy.evaluate(0.5, 2500).expect("cooldown has elapsed");
        assert_eq!(event.timestamp_ms, 2500);
    }

    #[test]
    fn test_low_score_resets_hit_streak() {
        let mut policy = policy();

        policy.evaluate(0.5, 0);
        policy.evaluate(0.5, 100);
        assert_eq!(policy.consecutive_hits(), 2);

        // At-threshold counts as a miss
        policy.evaluate(0.45, 200);
        assert_eq!(policy.consecutive_hits(), 0);

        policy.evaluate(0.5, 300);
        policy.evaluate(0.5, 400);
        assert!(policy.evaluate(0.5, 500).is_some());
    }

    #[test]
    fn test_single_hit_policy() {
        let mut policy = DetectionPolicy::new(0.6, 1, 2000);

        let event = policy.evaluate(0.7, 0);
        assert!(event.is_some());
        assert!(policy.evaluate(0.7, 100).is_none());
        assert!(policy.evaluate(0.7, 2101).is_some());
    }

    #[test]
    fn test_clear_hits_keeps_cooldown() {
        let mut policy = policy();

        policy.evaluate(0.5, 0);
        policy.evaluate(0.5, 100);
        policy.evaluate(0.5, 200).unwrap();

        policy.clear_hits();

        // Cooldown still active even though hits were cleared separately
        policy.evaluate(0.5, 300);
        policy.evaluate(0.5, 400);
        assert!(policy.evaluate(0.5, 500).is_none());
    }

    #[test]
    fn test_reset_returns_to_initial_state() {
        let mut policy = policy();

        policy.evaluate(0.5, 0);
        policy.evaluate(0.5, 100);
        policy.evaluate(0.5, 200).unwrap();

        policy.reset();

        // No cooldown carries over a reset
        policy.evaluate(0.5, 210);
        policy.evaluate(0.5, 220);
        assert!(policy.evaluate(0.5, 230).is_some());
    }
}
