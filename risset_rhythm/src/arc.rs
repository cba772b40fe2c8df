// Arc assembly: the top of the generation pipeline.
//
// `ArcAssembler::generate` takes a validated config through every stage:
// tempo plan (`tempo.rs`) -> per-layer onsets (`onsets.rs`) -> durations
// (`duration.rs`) -> velocities (`velocity.rs`) -> pitched, offset,
// time-ordered `NoteEvent`s.
//
// Every metabar of a render has identical timing, so each layer is computed
// once and then placed:
//
// - Metabar 0: fade-out layer on `pitch_low`, fade-in layer on `pitch_high`.
// - Metabar 1 (arc mode only): the same two layers with the pitches swapped
//   and every onset shifted by `metabar_beats`. Across the two metabars one
//   pitch traces loud-quiet-loud and the other quiet-loud-quiet.
//
// A layer that loses every note to the duration filter is an error, never
// an empty layer in the output.
//
// The assembler holds only its `SeamPolicy`. It keeps no state between
// calls, so one instance can serve any number of threads (see `batch.rs`).

use crate::config::{RenderMode, RissetConfig, SeamPolicy};
use crate::duration::{DurationAssigner, TimedNote};
use crate::error::{Result, RissetError};
use crate::onsets::{LayerTimeGenerator, OnsetSequence, SplitLine, continuous_line, split_line};
use crate::tempo::{LinearTempoCurve, TempoEndpoints, TempoPlan, TwoSegmentTempoCurve};
use crate::velocity::{LayerRole, VelocityShaper};
use serde::{Deserialize, Serialize};

/// One note of the final output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub onset_beats: f64,
    /// MIDI note number.
    pub pitch: u8,
    /// MIDI velocity, 1..=127.
    pub velocity: u8,
    pub duration_beats: f64,
}

/// One layer as placed in one metabar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedLayer {
    pub role: LayerRole,
    /// 0-based metabar index.
    pub metabar: usize,
    pub pitch: u8,
    pub tempo: TempoEndpoints,
    /// Raw onsets before the duration filter, metabar-relative.
    pub onsets: OnsetSequence,
    /// Emitted notes, metabar-relative.
    pub notes: Vec<NoteEvent>,
}

/// Result of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Generation {
    pub metabar_beats: f64,
    pub total_beats: f64,
    pub mode: RenderMode,
    pub tempo: TempoPlan,
    /// Metabar 0 fade-out, metabar 0 fade-in, then metabar 1 likewise.
    pub layers: Vec<RenderedLayer>,
    /// All notes in absolute time, ordered by onset.
    pub events: Vec<NoteEvent>,
}

impl Generation {
    pub fn layer(&self, metabar: usize, role: LayerRole) -> Option<&RenderedLayer> {
        self.layers
            .iter()
            .find(|l| l.metabar == metabar && l.role == role)
    }

    /// Events sounding on `pitch`, in onset order.
    pub fn events_for_pitch(&self, pitch: u8) -> impl Iterator<Item = &NoteEvent> {
        self.events.iter().filter(move |e| e.pitch == pitch)
    }
}

/// Onsets, timed notes and tempo of one layer, before pitch and offset.
struct ShapedLayer {
    role: LayerRole,
    tempo: TempoEndpoints,
    onsets: OnsetSequence,
    notes: Vec<TimedNote>,
    velocities: Vec<u8>,
}

impl ShapedLayer {
    fn place(&self, metabar: usize, pitch: u8) -> RenderedLayer {
        let notes = self
            .notes
            .iter()
            .zip(&self.velocities)
            .map(|(note, &velocity)| NoteEvent {
                onset_beats: note.onset_beats,
                pitch,
                velocity,
                duration_beats: note.duration_beats,
            })
            .collect();
        RenderedLayer {
            role: self.role,
            metabar,
            pitch,
            tempo: self.tempo,
            onsets: self.onsets.clone(),
            notes,
        }
    }
}

/// Builds complete renders from configs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArcAssembler {
    policy: SeamPolicy,
}

impl ArcAssembler {
    pub fn new(policy: SeamPolicy) -> Self {
        ArcAssembler { policy }
    }

    pub fn policy(&self) -> &SeamPolicy {
        &self.policy
    }

    /// Generate every event for `config`.
    pub fn generate(&self, config: &RissetConfig) -> Result<Generation> {
        config.validate()?;
        self.policy.validate()?;
        let shaper = VelocityShaper::new(config.velocity_gamma)?;

        if config.ratio.value() < 1.0 {
            log::warn!(
                "ratio {}/{} is below 1, using {}/{}",
                config.ratio.numerator,
                config.ratio.denominator,
                config.ratio.denominator,
                config.ratio.numerator
            );
        }
        let plan = TempoPlan::new(config.base_tempo_bpm, config.ratio, config.direction);
        let metabar_beats = config.metabar_beats();

        let times = LayerTimeGenerator::new(self.policy, config.onset_model);
        let assigner = DurationAssigner::new(self.policy, metabar_beats);

        let fade_out_curve = LinearTempoCurve::for_layer(&plan, plan.fade_out, metabar_beats)?;
        let fade_in_curve = LinearTempoCurve::for_layer(&plan, plan.fade_in, metabar_beats)?;
        let shaped = [
            (LayerRole::FadeOut, plan.fade_out, times.forward(&fade_out_curve)),
            (LayerRole::FadeIn, plan.fade_in, times.backward(&fade_in_curve)),
        ]
        .into_iter()
        .map(|(role, tempo, onsets)| {
            let notes = assigner.assign(&onsets);
            if notes.is_empty() {
                return Err(RissetError::DegenerateLayer { role, metabar: 0 });
            }
            let velocities = shaper.shape(role, notes.len());
            log::debug!(
                "{role} layer: {:.1} -> {:.1} bpm, {} onsets, {} notes",
                tempo.start_bpm,
                tempo.end_bpm,
                onsets.len(),
                notes.len()
            );
            Ok(ShapedLayer {
                role,
                tempo,
                onsets,
                notes,
                velocities,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        let mut layers = Vec::with_capacity(shaped.len() * config.mode.metabar_count());
        for metabar in 0..config.mode.metabar_count() {
            // Pitches swap every metabar.
            let (fade_out_pitch, fade_in_pitch) = if metabar % 2 == 0 {
                (config.pitch_low, config.pitch_high)
            } else {
                (config.pitch_high, config.pitch_low)
            };
            for layer in &shaped {
                let pitch = match layer.role {
                    LayerRole::FadeOut => fade_out_pitch,
                    LayerRole::FadeIn => fade_in_pitch,
                };
                layers.push(layer.place(metabar, pitch));
            }
        }

        let mut events: Vec<NoteEvent> = layers
            .iter()
            .flat_map(|layer| {
                let offset = layer.metabar as f64 * metabar_beats;
                layer.notes.iter().map(move |note| NoteEvent {
                    onset_beats: note.onset_beats + offset,
                    ..*note
                })
            })
            .collect();
        // Stable, so ties keep metabar then fade-out-before-fade-in order.
        events.sort_by(|a, b| a.onset_beats.total_cmp(&b.onset_beats));

        let total_beats = metabar_beats * config.mode.metabar_count() as f64;
        log::info!(
            "generated {} events over {total_beats} beats ({:?} {}/{} at {} bpm, {:?})",
            events.len(),
            config.direction,
            config.ratio.numerator,
            config.ratio.denominator,
            config.base_tempo_bpm,
            config.mode
        );

        Ok(Generation {
            metabar_beats,
            total_beats,
            mode: config.mode,
            tempo: plan,
            layers,
            events,
        })
    }

    /// The unbroken two-metabar walk for `config`, split at the metabar
    /// boundary. Reference output only: it has no seeded boundary note and
    /// is what the independently anchored layers are compared against.
    pub fn continuous_reference(&self, config: &RissetConfig) -> Result<SplitLine> {
        config.validate()?;
        self.policy.validate()?;
        let plan = TempoPlan::new(config.base_tempo_bpm, config.ratio, config.direction);
        let metabar_beats = config.metabar_beats();
        let curve = TwoSegmentTempoCurve::continuous_line(&plan, metabar_beats)?;
        let line = continuous_line(&curve, &self.policy);
        Ok(split_line(&line, metabar_beats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Direction, Ratio, TimeSignature};

    fn arc_config(direction: Direction) -> RissetConfig {
        let mut config = RissetConfig::new(direction);
        config.measure_count = 8;
        config
    }

    #[test]
    fn test_arc_has_four_layers_with_swapped_pitches() {
        let generation = ArcAssembler::default().generate(&arc_config(Direction::Accel)).unwrap();
        assert_eq!(generation.metabar_beats, 16.0);
        assert_eq!(generation.total_beats, 32.0);
        assert_eq!(generation.layers.len(), 4);

        let first_out = generation.layer(0, LayerRole::FadeOut).unwrap();
        let first_in = generation.layer(0, LayerRole::FadeIn).unwrap();
        let second_out = generation.layer(1, LayerRole::FadeOut).unwrap();
        let second_in = generation.layer(1, LayerRole::FadeIn).unwrap();
        assert_eq!((first_out.pitch, first_in.pitch), (60, 64));
        assert_eq!((second_out.pitch, second_in.pitch), (64, 60));
        // Same timing in both metabars.
        assert_eq!(first_out.notes.len(), second_out.notes.len());
        assert_eq!(first_in.onsets, second_in.onsets);
    }

    #[test]
    fn test_ramp_has_one_metabar() {
        let mut config = arc_config(Direction::Decel);
        config.mode = RenderMode::Ramp;
        let generation = ArcAssembler::default().generate(&config).unwrap();
        assert_eq!(generation.layers.len(), 2);
        assert_eq!(generation.metabar_beats, 32.0);
        assert!(generation.events.iter().all(|e| e.onset_beats < 32.0));
        assert!(generation.layer(1, LayerRole::FadeOut).is_none());
    }

    #[test]
    fn test_events_sorted_and_offset() {
        let generation = ArcAssembler::default().generate(&arc_config(Direction::Accel)).unwrap();
        assert!(
            generation
                .events
                .windows(2)
                .all(|w| w[0].onset_beats <= w[1].onset_beats)
        );
        let layer_notes: usize = generation.layers.iter().map(|l| l.notes.len()).sum();
        assert_eq!(generation.events.len(), layer_notes);
        // The second metabar opens with the fade-out seed on the high pitch.
        let at_seam = generation
            .events
            .iter()
            .find(|e| e.onset_beats >= 16.0)
            .unwrap();
        assert_eq!(at_seam.onset_beats, 16.0);
        assert_eq!(at_seam.pitch, 64);
        assert_eq!(at_seam.velocity, 127);
    }

    #[test]
    fn test_layer_tempos_follow_plan() {
        let generation = ArcAssembler::default().generate(&arc_config(Direction::Decel)).unwrap();
        let fade_out = generation.layer(0, LayerRole::FadeOut).unwrap();
        let fade_in = generation.layer(0, LayerRole::FadeIn).unwrap();
        assert_eq!(fade_out.tempo, generation.tempo.fade_out);
        assert_eq!(fade_in.tempo.start_bpm, 240.0);
        assert_eq!(fade_in.tempo.end_bpm, 120.0);
    }

    #[test]
    fn test_inverted_ratio_matches_normalized() {
        let assembler = ArcAssembler::default();
        let mut inverted = arc_config(Direction::Accel);
        inverted.ratio = Ratio::new(2, 3);
        let mut normal = arc_config(Direction::Accel);
        normal.ratio = Ratio::new(3, 2);
        assert_eq!(
            assembler.generate(&inverted).unwrap().events,
            assembler.generate(&normal).unwrap().events
        );
    }

    #[test]
    fn test_tiny_metabar_is_degenerate() {
        let mut config = RissetConfig::new(Direction::Accel);
        config.time_signature = TimeSignature::new(1, 16);
        config.measure_count = 1;
        let err = ArcAssembler::default().generate(&config).unwrap_err();
        assert!(matches!(
            err,
            RissetError::DegenerateLayer {
                role: LayerRole::FadeOut,
                metabar: 0
            }
        ));
    }

    #[test]
    fn test_invalid_config_fails_before_generation() {
        let mut config = arc_config(Direction::Accel);
        config.velocity_gamma = 0.1;
        assert!(ArcAssembler::default().generate(&config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let policy = SeamPolicy {
            release_gap: -1.0,
            ..SeamPolicy::default()
        };
        let assembler = ArcAssembler::new(policy);
        assert_eq!(assembler.policy().release_gap, -1.0);
        let err = assembler.generate(&arc_config(Direction::Accel)).unwrap_err();
        assert!(matches!(err, RissetError::InvalidConfig { field: "release_gap", .. }));
    }

    #[test]
    fn test_extreme_ratio_rejected_before_walking() {
        let assembler = ArcAssembler::default();
        assert_eq!(*assembler.policy(), SeamPolicy::default());
        for ratio in [Ratio::new(1_000_000, 1), Ratio::new(u32::MAX, 1), Ratio::new(1, u32::MAX)] {
            let mut config = arc_config(Direction::Accel);
            config.measure_count = 2;
            config.ratio = ratio;
            let err = assembler.generate(&config).unwrap_err();
            assert!(matches!(err, RissetError::InvalidConfig { field: "ratio", .. }));
            let err = assembler.continuous_reference(&config).unwrap_err();
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_closed_form_model_generates() {
        let mut config = arc_config(Direction::Accel);
        config.onset_model = crate::config::OnsetModel::ClosedForm;
        let generation = ArcAssembler::default().generate(&config).unwrap();
        let fade_out = generation.layer(0, LayerRole::FadeOut).unwrap();
        assert_eq!(fade_out.notes[0].onset_beats, 0.0);
        assert_eq!(fade_out.notes[0].velocity, 127);
    }

    #[test]
    fn test_continuous_reference_splits_at_metabar() {
        let split = ArcAssembler::default()
            .continuous_reference(&arc_config(Direction::Accel))
            .unwrap();
        assert_eq!(split.fade_in.first(), Some(0.0));
        assert_eq!(split.fade_in.len(), 12);
        assert_eq!(split.fade_out.len(), 24);
        assert!(split.fade_out.last().unwrap() < 16.0);
    }
}
