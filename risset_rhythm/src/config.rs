// Generation request and seam policy.
//
// `RissetConfig` is the caller-supplied record for one generation: meter,
// base tempo, length, speed ratio, direction, the two pitches, render mode,
// and the velocity curve exponent. It is plain serde data so hosts can keep
// presets as JSON files. `validate` runs before any simulation work;
// everything downstream assumes a validated config.
//
// `SeamPolicy` gathers the tolerances that decide where notes may sit near a
// seam and how long they ring. Changing any default changes onset counts.
// The simulation time step is not part of the policy (see `phase.rs`).
//
// Consumed by `arc.rs` (metabar length, tempo plan, pitches, mode),
// `onsets.rs` and `duration.rs` (policy), and `velocity.rs` (gamma).

use crate::error::{Result, RissetError};
use crate::velocity::VelocityShaper;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest accepted normalized speed ratio. Onset density, and with it the
/// memory a layer needs, grows linearly with the ratio.
pub const MAX_RATIO: f64 = 16.0;
/// Highest MIDI note number.
pub const MAX_PITCH: u8 = 127;

/// Time signature as written, e.g. 6/8 is `{ numerator: 6, denominator: 8 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        TimeSignature {
            numerator,
            denominator,
        }
    }

    /// Length of one measure in quarter-note beats.
    pub fn beats_per_measure(self) -> f64 {
        self.numerator as f64 * (4.0 / self.denominator as f64)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::new(4, 4)
    }
}

/// Speed ratio between the slow and fast ends of a layer, as integer terms.
///
/// Either orientation is accepted; the engine only ever uses the normalized
/// value, which is at least 1. Direction decides which end is fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u32,
    pub denominator: u32,
}

impl Ratio {
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Ratio {
            numerator,
            denominator,
        }
    }

    /// Raw quotient, before normalization.
    pub fn value(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Same ratio with the larger term on top.
    pub fn normalized(self) -> Ratio {
        if self.numerator < self.denominator {
            Ratio::new(self.denominator, self.numerator)
        } else {
            self
        }
    }

    /// Quotient inverted when below 1.
    ///
    /// Computed as `1 / (num / den)`, not `den / num`; the two can differ in
    /// the last bit, which moves onsets near metabar edges.
    pub fn normalized_value(self) -> f64 {
        let value = self.value();
        if value < 1.0 { 1.0 / value } else { value }
    }

    fn validate(self) -> Result<()> {
        if self.numerator == 0 || self.denominator == 0 {
            return Err(RissetError::invalid(
                "ratio",
                format!(
                    "both terms must be positive, got {}/{}",
                    self.numerator, self.denominator
                ),
            ));
        }
        let value = self.normalized_value();
        if value > MAX_RATIO {
            return Err(RissetError::invalid(
                "ratio",
                format!(
                    "{}/{} normalizes to {value}, above the maximum of {MAX_RATIO}",
                    self.numerator, self.denominator
                ),
            ));
        }
        Ok(())
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Ratio::new(2, 1)
    }
}

/// Which way the illusion moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Endless acceleration: both layers speed up.
    Accel,
    /// Endless deceleration: both layers slow down.
    Decel,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Accel, Direction::Decel];
}

/// How many metabars a render emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Two metabars with pitches swapped in the second, so each pitch traces
    /// a complete quiet-loud-quiet (or loud-quiet-loud) arc.
    #[default]
    Arc,
    /// A single metabar, meant as a building block for stacking.
    Ramp,
}

impl RenderMode {
    pub fn metabar_count(self) -> usize {
        match self {
            RenderMode::Arc => 2,
            RenderMode::Ramp => 1,
        }
    }
}

/// How onset times are derived from a layer's tempo endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnsetModel {
    /// Fixed-step phase accumulation over a linear tempo ramp.
    #[default]
    PhaseAccumulation,
    /// Analytic onsets for an exponential rate curve. Kept for A/B listening
    /// against the accumulator.
    ClosedForm,
}

fn default_base_tempo() -> f64 {
    120.0
}

fn default_measure_count() -> u32 {
    4
}

fn default_pitch_low() -> u8 {
    60
}

fn default_pitch_high() -> u8 {
    64
}

fn default_velocity_gamma() -> f64 {
    1.0
}

/// One generation request.
///
/// Every field except `direction` has a default, so a JSON preset can be as
/// small as `{"direction": "accel"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RissetConfig {
    #[serde(default)]
    pub time_signature: TimeSignature,
    #[serde(default = "default_base_tempo")]
    pub base_tempo_bpm: f64,
    /// Measures in the whole render (both metabars in arc mode).
    #[serde(default = "default_measure_count")]
    pub measure_count: u32,
    #[serde(default)]
    pub ratio: Ratio,
    pub direction: Direction,
    /// Pitch of the first metabar's fade-out layer.
    #[serde(default = "default_pitch_low")]
    pub pitch_low: u8,
    /// Pitch of the first metabar's fade-in layer.
    #[serde(default = "default_pitch_high")]
    pub pitch_high: u8,
    #[serde(default)]
    pub mode: RenderMode,
    #[serde(default = "default_velocity_gamma")]
    pub velocity_gamma: f64,
    #[serde(default)]
    pub onset_model: OnsetModel,
}

impl RissetConfig {
    /// A config with default settings for the given direction.
    pub fn new(direction: Direction) -> Self {
        RissetConfig {
            time_signature: TimeSignature::default(),
            base_tempo_bpm: default_base_tempo(),
            measure_count: default_measure_count(),
            ratio: Ratio::default(),
            direction,
            pitch_low: default_pitch_low(),
            pitch_high: default_pitch_high(),
            mode: RenderMode::default(),
            velocity_gamma: default_velocity_gamma(),
            onset_model: OnsetModel::default(),
        }
    }

    /// Parse and validate a JSON preset.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RissetConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON preset file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Check every field. Called by the assembler before any simulation.
    pub fn validate(&self) -> Result<()> {
        let ts = self.time_signature;
        if ts.numerator == 0 || ts.denominator == 0 {
            return Err(RissetError::invalid(
                "time_signature",
                format!(
                    "both terms must be positive, got {}/{}",
                    ts.numerator, ts.denominator
                ),
            ));
        }
        if !self.base_tempo_bpm.is_finite() || self.base_tempo_bpm <= 0.0 {
            return Err(RissetError::invalid(
                "base_tempo_bpm",
                format!("must be a positive number, got {}", self.base_tempo_bpm),
            ));
        }
        if self.measure_count == 0 {
            return Err(RissetError::invalid("measure_count", "must be at least 1"));
        }
        self.ratio.validate()?;
        for (field, pitch) in [("pitch_low", self.pitch_low), ("pitch_high", self.pitch_high)] {
            if pitch > MAX_PITCH {
                return Err(RissetError::invalid(
                    field,
                    format!("MIDI pitch must be at most {MAX_PITCH}, got {pitch}"),
                ));
            }
        }
        VelocityShaper::new(self.velocity_gamma)?;
        Ok(())
    }

    /// Length of the whole render in beats.
    pub fn total_beats(&self) -> f64 {
        self.time_signature.beats_per_measure() * self.measure_count as f64
    }

    /// Length of one metabar in beats: the whole render in ramp mode, half of
    /// it in arc mode.
    pub fn metabar_beats(&self) -> f64 {
        match self.mode {
            RenderMode::Ramp => self.total_beats(),
            RenderMode::Arc => self.total_beats() / 2.0,
        }
    }
}

/// Seam tolerances and articulation constants, all in beats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeamPolicy {
    /// Forward walks drop accumulator onsets this close to 0, where the
    /// seeded first note already sits.
    pub seed_epsilon: f64,
    /// Backward walks seed their last note this far before the metabar end.
    pub anchor_gap: f64,
    /// Backward walks drop accumulator onsets this close to the metabar end.
    pub anchor_exclusion: f64,
    /// Every note must release at least this long before the metabar end.
    pub release_gap: f64,
    /// Fraction of the inter-onset gap a note sustains for.
    pub legato: f64,
    /// Upper bound on the last note's duration.
    pub max_last_duration: f64,
    /// Notes at or below this duration are dropped.
    pub min_duration: f64,
    /// Closed-form backward layers get an anchor note when their last onset
    /// sits further than this before it.
    pub closed_form_anchor_threshold: f64,
}

impl Default for SeamPolicy {
    fn default() -> Self {
        SeamPolicy {
            seed_epsilon: 0.001,
            anchor_gap: 0.05,
            anchor_exclusion: 0.1,
            release_gap: 0.2,
            legato: 0.8,
            max_last_duration: 1.0,
            min_duration: 0.01,
            closed_form_anchor_threshold: 0.5,
        }
    }
}

impl SeamPolicy {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("seed_epsilon", self.seed_epsilon),
            ("anchor_gap", self.anchor_gap),
            ("anchor_exclusion", self.anchor_exclusion),
            ("release_gap", self.release_gap),
            ("legato", self.legato),
            ("max_last_duration", self.max_last_duration),
            ("min_duration", self.min_duration),
            ("closed_form_anchor_threshold", self.closed_form_anchor_threshold),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(RissetError::invalid(
                    field,
                    format!("must be a non-negative number, got {value}"),
                ));
            }
        }
        if self.legato == 0.0 || self.legato > 1.0 {
            return Err(RissetError::invalid(
                "legato",
                format!("must lie in (0, 1], got {}", self.legato),
            ));
        }
        Ok(())
    }
}
