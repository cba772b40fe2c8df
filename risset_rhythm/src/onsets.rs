// Layer onset generation: where each layer's notes start.
//
// Each metabar has two layers that must be loud at opposite edges, so they
// are anchored at opposite edges:
//
// - Forward (fade-out layer): a note is seeded at beat 0, then the
//   accumulator walks 0 -> span. Crossings within `seed_epsilon` of 0 are
//   dropped so the seed is not doubled.
// - Backward (fade-in layer): a note is seeded `anchor_gap` before the
//   span end, then the accumulator walks span -> 0. Crossings within
//   `anchor_exclusion` of the end are dropped, and the result is reversed
//   into time order.
//
// Anchoring each layer independently (rather than cutting one long walk in
// two) puts a predictable note at every seam whatever the ratio or length.
// The two layers are not phase-locked mid-span; only the seam edges and
// the velocity crossfade need to line up.
//
// The continuous-line walk (`continuous_line` + `split_line`) is the
// reference the independent anchoring is audited against. It is never used
// for production output.
//
// `OnsetModel::ClosedForm` swaps the accumulator for an analytic onset
// formula on an exponential rate curve. It shares the seeding contract for
// forward layers (the formula starts at 0) but anchors backward layers only
// when the formula leaves a gap before the seam.

use crate::config::{OnsetModel, SeamPolicy};
use crate::phase::{PhaseAccumulator, Walk};
use crate::tempo::{LinearTempoCurve, TempoCurve, TwoSegmentTempoCurve};
use serde::{Deserialize, Serialize};

/// Notes within this distance below a metabar boundary belong to the next
/// metabar when a continuous line is split.
pub const SPLIT_EPSILON_BEATS: f64 = 0.001;

/// Safety cap on closed-form onset counts.
pub const MAX_CLOSED_FORM_ONSETS: usize = 10_000;

/// Below this deviation from 1 the closed-form rate is treated as constant.
const CONSTANT_RATE_TOLERANCE: f64 = 1e-6;

/// Strictly increasing onset times of one layer, in beats.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OnsetSequence(Vec<f64>);

impl OnsetSequence {
    /// Wrap times that are already in strictly increasing order.
    pub fn from_sorted(times: Vec<f64>) -> Self {
        debug_assert!(
            times.windows(2).all(|w| w[0] < w[1]),
            "onset times must be strictly increasing"
        );
        OnsetSequence(times)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<f64> {
        self.0.first().copied()
    }

    pub fn last(&self) -> Option<f64> {
        self.0.last().copied()
    }

    /// Number of onsets in `[from, to)`.
    pub fn count_in(&self, from: f64, to: f64) -> usize {
        self.0.iter().filter(|&&t| t >= from && t < to).count()
    }
}

/// Builds one layer's onsets under a seam policy and onset model.
#[derive(Debug, Clone, Copy)]
pub struct LayerTimeGenerator {
    policy: SeamPolicy,
    model: OnsetModel,
}

impl LayerTimeGenerator {
    pub fn new(policy: SeamPolicy, model: OnsetModel) -> Self {
        LayerTimeGenerator { policy, model }
    }

    /// Onsets for a layer that must be loud at its start.
    pub fn forward(&self, curve: &LinearTempoCurve) -> OnsetSequence {
        match self.model {
            OnsetModel::PhaseAccumulation => {
                let span = curve.span_beats();
                let crossings =
                    PhaseAccumulator::new(curve).crossings(Walk::Forward { end_beats: span });
                let mut times = Vec::with_capacity(crossings.len() + 1);
                times.push(0.0);
                times.extend(crossings.into_iter().filter(|&t| t > self.policy.seed_epsilon));
                OnsetSequence::from_sorted(times)
            }
            OnsetModel::ClosedForm => OnsetSequence::from_sorted(closed_form_onsets(curve)),
        }
    }

    /// Onsets for a layer that must be loud at its end.
    pub fn backward(&self, curve: &LinearTempoCurve) -> OnsetSequence {
        let span = curve.span_beats();
        let anchor = span - self.policy.anchor_gap;
        match self.model {
            OnsetModel::PhaseAccumulation => {
                let cutoff = span - self.policy.anchor_exclusion;
                let crossings =
                    PhaseAccumulator::new(curve).crossings(Walk::Backward { start_beats: span });
                let mut times = Vec::with_capacity(crossings.len() + 1);
                times.push(anchor);
                times.extend(crossings.into_iter().filter(|&t| t < cutoff));
                times.reverse();
                OnsetSequence::from_sorted(times)
            }
            OnsetModel::ClosedForm => {
                let mut times = closed_form_onsets(curve);
                let needs_anchor = times
                    .last()
                    .is_none_or(|&last| anchor - last > self.policy.closed_form_anchor_threshold);
                if needs_anchor {
                    times.push(anchor);
                }
                OnsetSequence::from_sorted(times)
            }
        }
    }
}

/// Analytic onsets for a rate that grows exponentially from `start / base`
/// to `end / base` over the curve's span.
///
/// With `r0` the start rate, `D` the end/start rate ratio and `tau` the span,
/// onset `n` falls at `tau * ln(1 + n * ln(D) / (r0 * tau)) / ln(D)`; for a
/// constant rate this degenerates to `n / r0`.
pub fn closed_form_onsets(curve: &LinearTempoCurve) -> Vec<f64> {
    let tau = curve.span_beats();
    let start_rate = curve.start_tempo() / curve.base_tempo();
    let end_rate = curve.end_tempo() / curve.base_tempo();
    let growth = end_rate / start_rate;
    let mut times = Vec::new();

    if (growth - 1.0).abs() < CONSTANT_RATE_TOLERANCE {
        for n in 0..MAX_CLOSED_FORM_ONSETS {
            let t = n as f64 / start_rate;
            if t >= tau {
                break;
            }
            times.push(t);
        }
        return times;
    }

    let ln_growth = growth.ln();
    let coeff = ln_growth / (start_rate * tau);
    for n in 0..MAX_CLOSED_FORM_ONSETS {
        let arg = 1.0 + n as f64 * coeff;
        // A shrinking rate runs out of onsets before the span ends.
        if arg <= 0.0 {
            break;
        }
        let t = tau * arg.ln() / ln_growth;
        if t >= tau {
            break;
        }
        times.push(t);
    }
    times
}

/// One unbroken walk across two metabars, seeded at 0 but not at the
/// metabar boundary.
pub fn continuous_line(curve: &TwoSegmentTempoCurve, policy: &SeamPolicy) -> OnsetSequence {
    let crossings = PhaseAccumulator::new(curve).crossings(Walk::Forward {
        end_beats: curve.span_beats(),
    });
    let mut times = Vec::with_capacity(crossings.len() + 1);
    times.push(0.0);
    times.extend(crossings.into_iter().filter(|&t| t > policy.seed_epsilon));
    OnsetSequence::from_sorted(times)
}

/// A continuous line cut at the metabar boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitLine {
    /// First metabar: the part a fade-in layer approximates.
    pub fade_in: OnsetSequence,
    /// Second metabar shifted back to start at 0: the part a fade-out layer
    /// approximates.
    pub fade_out: OnsetSequence,
}

/// Cut `line` at `metabar_beats`. A note landing on the boundary (within
/// `SPLIT_EPSILON_BEATS` below it) opens the second half at time 0.
pub fn split_line(line: &OnsetSequence, metabar_beats: f64) -> SplitLine {
    let split_point = metabar_beats - SPLIT_EPSILON_BEATS;
    let (first, second): (Vec<f64>, Vec<f64>) =
        line.as_slice().iter().copied().partition(|&t| t < split_point);
    let second = second
        .into_iter()
        .map(|t| (t - metabar_beats).max(0.0))
        .collect();
    SplitLine {
        fade_in: OnsetSequence::from_sorted(first),
        fade_out: OnsetSequence::from_sorted(second),
    }
}
