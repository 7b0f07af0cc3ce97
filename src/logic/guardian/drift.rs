//! Score Drift Monitor - Population Stability Index over serving scores
//!
//! Cách hoạt động:
//! 1. Rolling window of recent scores from the scoring path
//! 2. Reference histogram captured once the window has `min_samples`
//!    (and re-captured after each promotion via `reset_reference`)
//! 3. PSI = Σ (actual - expected) · ln(actual / expected) over 10 bins

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::logic::config::GuardianConfig;

// ============================================================================
// CONSTANTS
// ============================================================================

const BINS: usize = 10;
/// Floor for empty bins so ln() stays finite
const EPSILON: f64 = 1e-4;

// ============================================================================
// MONITOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftReading {
    pub psi: f64,
    pub samples: usize,
}

struct DriftState {
    reference: Option<[f64; BINS]>,
    recent: VecDeque<f64>,
}

pub struct ScoreDriftMonitor {
    window: usize,
    min_samples: usize,
    state: Mutex<DriftState>,
}

impl ScoreDriftMonitor {
    pub fn new(window: usize, min_samples: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            min_samples: min_samples.clamp(1, window),
            state: Mutex::new(DriftState {
                reference: None,
                recent: VecDeque::with_capacity(window),
            }),
        }
    }

    pub fn from_config(config: &GuardianConfig) -> Self {
        Self::new(config.drift_window, config.drift_min_samples)
    }

    /// Record one serving score
    pub fn record(&self, score: f64) {
        if !score.is_finite() {
            return;
        }
        let mut state = self.state.lock();
        state.recent.push_back(score.clamp(0.0, 1.0));
        if state.recent.len() > self.window {
            state.recent.pop_front();
        }
        if state.reference.is_none() && state.recent.len() >= self.min_samples {
            state.reference = Some(histogram(state.recent.iter().copied()));
            log::debug!("Score drift reference captured from {} samples", state.recent.len());
        }
    }

    /// PSI of the recent window against the reference.
    /// None until a reference exists and the window holds `min_samples`.
    pub fn reading(&self) -> Option<DriftReading> {
        let state = self.state.lock();
        let reference = state.reference.as_ref()?;
        if state.recent.len() < self.min_samples {
            return None;
        }
        let actual = histogram(state.recent.iter().copied());
        Some(DriftReading {
            psi: psi(reference, &actual),
            samples: state.recent.len(),
        })
    }

    pub fn psi(&self) -> Option<f64> {
        self.reading().map(|r| r.psi)
    }

    /// Drop reference and window; the next `min_samples` scores become the
    /// new reference. Called after a promotion.
    pub fn reset_reference(&self) {
        let mut state = self.state.lock();
        state.reference = None;
        state.recent.clear();
    }

    pub fn has_reference(&self) -> bool {
        self.state.lock().reference.is_some()
    }

    pub fn sample_count(&self) -> usize {
        self.state.lock().recent.len()
    }
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

fn histogram(scores: impl Iterator<Item = f64>) -> [f64; BINS] {
    let mut counts = [0.0; BINS];
    let mut total = 0.0;
    for s in scores {
        let bin = ((s * BINS as f64) as usize).min(BINS - 1);
        counts[bin] += 1.0;
        total += 1.0;
    }
    if total > 0.0 {
        for c in counts.iter_mut() {
            *c /= total;
        }
    }
    counts
}

fn psi(expected: &[f64; BINS], actual: &[f64; BINS]) -> f64 {
    expected
        .iter()
        .zip(actual)
        .map(|(&e, &a)| {
            let e = e.max(EPSILON);
            let a = a.max(EPSILON);
            (a - e) * (a / e).ln()
        })
        .sum()
}
