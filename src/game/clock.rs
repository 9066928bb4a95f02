use crate::types::{PhaseDurations, PlayState};
use std::time::Instant;

/// Seconds remaining in the current phase, rounded up. Derived from the
/// phase-start timestamp on every call; never stored. Goes negative once
/// the phase has overrun -- transition logic compares the raw value
/// against zero, display paths clamp it with [`clamp_for_display`].
pub fn time_left(
    durations: &PhaseDurations,
    phase: PlayState,
    started_at: Instant,
    now: Instant,
) -> i64 {
    let max = durations.for_phase(phase) as f64;
    let elapsed = now.saturating_duration_since(started_at).as_secs_f64();
    (max - elapsed).ceil() as i64
}

pub fn clamp_for_display(time_left: i64) -> i64 {
    time_left.max(0)
}
