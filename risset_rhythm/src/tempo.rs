// Tempo curves and per-layer tempo plans.
//
// A tempo curve maps a position in beats to an instantaneous tempo. Two
// shapes exist: `LinearTempoCurve`, a single straight ramp over one metabar
// (used by every production layer), and `TwoSegmentTempoCurve`, a pair of
// ramps meeting at the metabar boundary (used only by the continuous-line
// reference in `onsets.rs`). Both carry the base tempo that the phase
// accumulator divides by, so a curve is everything `phase.rs` needs.
//
// `TempoPlan` derives the start and end tempo of the fade-out and fade-in
// layers from base tempo, normalized ratio and direction. It is also the
// per-layer tempo metadata handed back to callers with each generation.
//
// Curves are pure values. Construction validates span and tempos so a zero
// span surfaces as a configuration error instead of a division by zero.

use crate::config::{Direction, Ratio};
use crate::error::{Result, RissetError};
use serde::{Deserialize, Serialize};

/// A tempo function over a finite span of beats.
pub trait TempoCurve {
    /// Tempo that counts as rate 1.0 (one onset per beat).
    fn base_tempo(&self) -> f64;

    /// Instantaneous tempo at `time_beats`.
    fn tempo_at(&self, time_beats: f64) -> f64;

    /// Length of the curve's domain in beats.
    fn span_beats(&self) -> f64;
}

fn check_positive(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(RissetError::invalid(
            field,
            format!("must be a positive number, got {value}"),
        ));
    }
    Ok(())
}

/// Straight tempo ramp from `start_tempo` at beat 0 to `end_tempo` at
/// `span_beats`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTempoCurve {
    base_tempo: f64,
    start_tempo: f64,
    end_tempo: f64,
    span_beats: f64,
}

impl LinearTempoCurve {
    pub fn new(base_tempo: f64, start_tempo: f64, end_tempo: f64, span_beats: f64) -> Result<Self> {
        check_positive("base_tempo_bpm", base_tempo)?;
        check_positive("start_tempo", start_tempo)?;
        check_positive("end_tempo", end_tempo)?;
        check_positive("span_beats", span_beats)?;
        Ok(LinearTempoCurve {
            base_tempo,
            start_tempo,
            end_tempo,
            span_beats,
        })
    }

    /// Curve for one layer of a tempo plan over one metabar.
    pub fn for_layer(plan: &TempoPlan, endpoints: TempoEndpoints, span_beats: f64) -> Result<Self> {
        Self::new(plan.base_tempo_bpm, endpoints.start_bpm, endpoints.end_bpm, span_beats)
    }

    pub fn start_tempo(&self) -> f64 {
        self.start_tempo
    }

    pub fn end_tempo(&self) -> f64 {
        self.end_tempo
    }

    /// Tempo at normalized progress `p` in [0, 1].
    pub fn tempo_at_progress(&self, progress: f64) -> f64 {
        self.start_tempo + (self.end_tempo - self.start_tempo) * progress
    }
}

impl TempoCurve for LinearTempoCurve {
    fn base_tempo(&self) -> f64 {
        self.base_tempo
    }

    fn tempo_at(&self, time_beats: f64) -> f64 {
        self.tempo_at_progress(time_beats / self.span_beats)
    }

    fn span_beats(&self) -> f64 {
        self.span_beats
    }
}

/// Two ramps back to back: `start -> mid` over `[0, segment)`, then
/// `mid -> end` over `[segment, 2 * segment]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoSegmentTempoCurve {
    base_tempo: f64,
    start_tempo: f64,
    mid_tempo: f64,
    end_tempo: f64,
    segment_beats: f64,
}

impl TwoSegmentTempoCurve {
    pub fn new(
        base_tempo: f64,
        start_tempo: f64,
        mid_tempo: f64,
        end_tempo: f64,
        segment_beats: f64,
    ) -> Result<Self> {
        check_positive("base_tempo_bpm", base_tempo)?;
        check_positive("start_tempo", start_tempo)?;
        check_positive("mid_tempo", mid_tempo)?;
        check_positive("end_tempo", end_tempo)?;
        check_positive("span_beats", segment_beats)?;
        Ok(TwoSegmentTempoCurve {
            base_tempo,
            start_tempo,
            mid_tempo,
            end_tempo,
            segment_beats,
        })
    }

    /// The full two-metabar line implied by a tempo plan: the fade-in
    /// layer's ramp followed by the fade-out layer's ramp.
    pub fn continuous_line(plan: &TempoPlan, metabar_beats: f64) -> Result<Self> {
        Self::new(
            plan.base_tempo_bpm,
            plan.fade_in.start_bpm,
            plan.base_tempo_bpm,
            plan.fade_out.end_bpm,
            metabar_beats,
        )
    }

    pub fn segment_beats(&self) -> f64 {
        self.segment_beats
    }
}

impl TempoCurve for TwoSegmentTempoCurve {
    fn base_tempo(&self) -> f64 {
        self.base_tempo
    }

    fn tempo_at(&self, time_beats: f64) -> f64 {
        if time_beats < self.segment_beats {
            let progress = time_beats / self.segment_beats;
            self.start_tempo + (self.mid_tempo - self.start_tempo) * progress
        } else {
            let progress = (time_beats - self.segment_beats) / self.segment_beats;
            self.mid_tempo + (self.end_tempo - self.mid_tempo) * progress
        }
    }

    fn span_beats(&self) -> f64 {
        self.segment_beats * 2.0
    }
}

/// Start and end tempo of one layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoEndpoints {
    pub start_bpm: f64,
    pub end_bpm: f64,
}

/// Tempo endpoints of both layers of a metabar.
///
/// Accel: fade-out `base -> base * r`, fade-in `base / r -> base`.
/// Decel: fade-out `base -> base / r`, fade-in `base * r -> base`.
/// The fade-in layer always ends, and the fade-out layer always starts, at
/// the base tempo, which is what lets the seam hand over seamlessly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoPlan {
    pub base_tempo_bpm: f64,
    /// Normalized ratio, always >= 1.
    pub ratio_value: f64,
    pub direction: Direction,
    pub fade_out: TempoEndpoints,
    pub fade_in: TempoEndpoints,
}

impl TempoPlan {
    pub fn new(base_tempo_bpm: f64, ratio: Ratio, direction: Direction) -> Self {
        let r = ratio.normalized_value();
        let base = base_tempo_bpm;
        let (fade_out, fade_in) = match direction {
            Direction::Accel => (
                TempoEndpoints {
                    start_bpm: base,
                    end_bpm: base * r,
                },
                TempoEndpoints {
                    start_bpm: base / r,
                    end_bpm: base,
                },
            ),
            Direction::Decel => (
                TempoEndpoints {
                    start_bpm: base,
                    end_bpm: base / r,
                },
                TempoEndpoints {
                    start_bpm: base * r,
                    end_bpm: base,
                },
            ),
        };
        TempoPlan {
            base_tempo_bpm,
            ratio_value: r,
            direction,
            fade_out,
            fade_in,
        }
    }
}
