// Risset Rhythm Generator
//
// Generates the note events of a Risset rhythm: two layers of repeated notes
// whose tempos drift in the same direction while their loudness crossfades,
// so that a looped render sounds like it accelerates (or decelerates)
// forever. One layer starts at the base tempo and fades out as it speeds
// away; the other arrives at the base tempo from below and fades in, taking
// over exactly where the first started.
//
// Architecture (leaves first):
// - error.rs: RissetError and the crate Result alias
// - config.rs: RissetConfig request record (serde, JSON presets) + SeamPolicy
// - tempo.rs: Linear and two-segment tempo curves, per-layer tempo plan
// - phase.rs: Fixed-step phase accumulator turning a curve into onsets
// - onsets.rs: Forward/backward anchored layer onsets, closed-form model,
//   continuous-line reference walk
// - duration.rs: Legato durations bounded by the seam, short-note filter
// - velocity.rs: Index-based power-law velocity crossfade
// - arc.rs: Pitch assignment, arc/ramp layout, final ordered event list
// - audit.rs: Seam continuity checks on a finished generation
// - batch.rs: Parallel batch generation and the ratio sweep audit
//
// Output is plain data (beats, MIDI pitch, MIDI velocity). Serializing it to
// MIDI, audio, or notation is left to the caller. Generation is fully
// deterministic: identical configs give bit-identical events.

pub mod arc;
pub mod audit;
pub mod batch;
pub mod config;
pub mod duration;
pub mod error;
pub mod onsets;
pub mod phase;
pub mod tempo;
pub mod velocity;
