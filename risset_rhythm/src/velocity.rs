// Velocity crossfade for one layer.
//
// Loudness is a function of a note's index within its (already filtered)
// layer, not of its time, so the first and last notes always hit the ends
// of the ramp however the onsets are spaced.
//
// - Fade-out: linear level `1 - i / (n - 1)`, from full to silent. A lone
//   note gets full level.
// - Fade-in: linear level `i / n`, from silent to just short of full. A
//   lone note gets zero.
//
// The fade-in never reaches full level because the loudest instant of the
// crossfade belongs to the fade-out layer's first note on the other side of
// the seam. Rounding could still push a very long fade-in to 127, so fade-in
// velocities are capped at `FADE_IN_CEILING`.
//
// The linear level is shaped by `level ^ gamma` and mapped onto 1..=127.
// Gamma below 1 lifts the middle of the fade (punchier crossfade), above 1
// sinks it (gentler). Velocity 0 is note-off in MIDI and is never produced.

use crate::error::{Result, RissetError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest accepted velocity curve exponent.
pub const MIN_VELOCITY_GAMMA: f64 = 0.5;
/// Highest accepted velocity curve exponent.
pub const MAX_VELOCITY_GAMMA: f64 = 3.0;

pub const MIN_VELOCITY: u8 = 1;
pub const MAX_VELOCITY: u8 = 127;
/// Loudest velocity a fade-in layer may carry.
pub const FADE_IN_CEILING: u8 = 126;

/// Which way a layer's loudness moves across its metabar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerRole {
    /// Loud first, quiet last. Anchored forward from beat 0.
    FadeOut,
    /// Quiet first, loud last. Anchored backward from the seam.
    FadeIn,
}

impl LayerRole {
    pub const ALL: [LayerRole; 2] = [LayerRole::FadeOut, LayerRole::FadeIn];
}

impl fmt::Display for LayerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerRole::FadeOut => write!(f, "fade-out"),
            LayerRole::FadeIn => write!(f, "fade-in"),
        }
    }
}

/// Power-law velocity curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityShaper {
    gamma: f64,
}

impl VelocityShaper {
    /// The one place the gamma range is checked; `RissetConfig::validate`
    /// defers to it.
    pub fn new(gamma: f64) -> Result<Self> {
        if !gamma.is_finite() || !(MIN_VELOCITY_GAMMA..=MAX_VELOCITY_GAMMA).contains(&gamma) {
            return Err(RissetError::invalid(
                "velocity_gamma",
                format!("must lie in [{MIN_VELOCITY_GAMMA}, {MAX_VELOCITY_GAMMA}], got {gamma}"),
            ));
        }
        Ok(VelocityShaper { gamma })
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Unshaped level in [0, 1] for note `index` of `count`.
    pub fn linear_level(role: LayerRole, index: usize, count: usize) -> f64 {
        match role {
            LayerRole::FadeOut if count > 1 => 1.0 - index as f64 / (count - 1) as f64,
            LayerRole::FadeOut => 1.0,
            LayerRole::FadeIn if count > 1 => index as f64 / count as f64,
            LayerRole::FadeIn => 0.0,
        }
    }

    /// MIDI velocity for note `index` of `count`.
    pub fn velocity(&self, role: LayerRole, index: usize, count: usize) -> u8 {
        let shaped = Self::linear_level(role, index, count).powf(self.gamma);
        // Half-way cases round to even.
        let raw = (1.0 + 126.0 * shaped).round_ties_even();
        let ceiling = match role {
            LayerRole::FadeOut => MAX_VELOCITY,
            LayerRole::FadeIn => FADE_IN_CEILING,
        };
        raw.clamp(MIN_VELOCITY as f64, ceiling as f64) as u8
    }

    /// Velocities for a whole layer of `count` notes, in order.
    pub fn shape(&self, role: LayerRole, count: usize) -> Vec<u8> {
        (0..count).map(|i| self.velocity(role, i, count)).collect()
    }
}
