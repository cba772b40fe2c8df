// Fixed-step phase accumulation: the discretizer at the heart of the engine.
//
// A walk moves a time cursor across a tempo curve in steps of exactly
// `TIME_STEP_BEATS`. Each step adds `(tempo / base) * dt` to a phase
// accumulator; every integer boundary the phase passes becomes an onset.
// After a crossing only the integer part is removed, so the fractional
// remainder carries over and rounding error does not compound.
//
// Onset density therefore tracks the tempo ratio: twice the base tempo gives
// two onsets per walked beat, half gives one every two beats.
//
// **Determinism.** The step size, the order of the arithmetic, and the
// repeated-addition time cursor are all load-bearing: onset counts near the
// metabar edges depend on their exact float behaviour. Do not restructure
// the step (e.g. computing time as `i * dt`) without re-checking the
// scenario tests.
//
// `onsets.rs` decides where walks start and which crossings survive.

use crate::tempo::TempoCurve;

/// Simulation step in beats. Fixed engine-wide.
pub const TIME_STEP_BEATS: f64 = 0.01;

/// Direction and extent of one walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Walk {
    /// From beat 0 up to `end_beats`.
    Forward { end_beats: f64 },
    /// From `start_beats` down to beat 0.
    Backward { start_beats: f64 },
}

impl Walk {
    fn origin(self) -> f64 {
        match self {
            Walk::Forward { .. } => 0.0,
            Walk::Backward { start_beats } => start_beats,
        }
    }

    fn sign(self) -> f64 {
        match self {
            Walk::Forward { .. } => 1.0,
            Walk::Backward { .. } => -1.0,
        }
    }

    /// Whether the cursor may take another step from `time_beats`.
    fn continues_from(self, time_beats: f64) -> bool {
        match self {
            Walk::Forward { end_beats } => time_beats < end_beats,
            Walk::Backward { .. } => time_beats > 0.0,
        }
    }

    /// Whether a crossing at `time_beats` lies inside the walked range.
    fn contains(self, time_beats: f64) -> bool {
        match self {
            Walk::Forward { end_beats } => time_beats <= end_beats,
            Walk::Backward { .. } => time_beats >= 0.0,
        }
    }
}

/// Simulation cursor. Lives for one walk only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseState {
    pub time_beats: f64,
    pub phase: f64,
}

impl PhaseState {
    pub fn at(time_beats: f64) -> Self {
        PhaseState {
            time_beats,
            phase: 0.0,
        }
    }
}

/// Turns a tempo curve into phase-boundary crossing times.
pub struct PhaseAccumulator<'a, C: TempoCurve> {
    curve: &'a C,
}

impl<'a, C: TempoCurve> PhaseAccumulator<'a, C> {
    pub fn new(curve: &'a C) -> Self {
        PhaseAccumulator { curve }
    }

    /// Advance `state` by one step in the direction given by `sign` and
    /// return how many integer phase boundaries the step crossed.
    ///
    /// Tempo is sampled at the cursor's position before it moves.
    pub fn step(&self, state: &mut PhaseState, sign: f64) -> u32 {
        let tempo = self.curve.tempo_at(state.time_beats);
        let increment = (tempo / self.curve.base_tempo()) * TIME_STEP_BEATS;

        let previous = state.phase;
        state.phase += increment;
        let crossed = state.phase.floor() - previous.floor();
        if crossed > 0.0 {
            state.phase -= state.phase.floor();
        }

        state.time_beats += sign * TIME_STEP_BEATS;
        // Phase is non-negative and each step adds a bounded increment, so
        // the difference of floors is a small non-negative integer.
        crossed as u32
    }

    /// Walk the curve and return every crossing time, in walk order.
    ///
    /// A crossing is placed at the cursor position the step moved to. When
    /// a single step crosses several boundaries (tempo ratios above
    /// `1 / TIME_STEP_BEATS`), one onset is emitted per boundary, spread
    /// evenly over the step and ending at the new cursor position, so the
    /// sequence stays strictly monotonic.
    pub fn crossings(&self, walk: Walk) -> Vec<f64> {
        let sign = walk.sign();
        let mut state = PhaseState::at(walk.origin());
        let mut out = Vec::new();

        while walk.continues_from(state.time_beats) {
            let from = state.time_beats;
            let crossed = self.step(&mut state, sign);
            for j in 1..=crossed {
                let at = if j == crossed {
                    state.time_beats
                } else {
                    from + sign * TIME_STEP_BEATS * j as f64 / crossed as f64
                };
                if walk.contains(at) {
                    out.push(at);
                }
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tempo::LinearTempoCurve;

    #[test]
    fn test_constant_tempo_crosses_once_per_beat() {
        let curve = LinearTempoCurve::new(120.0, 120.0, 120.0, 16.0).unwrap();
        let times = PhaseAccumulator::new(&curve).crossings(Walk::Forward { end_beats: 16.0 });
        // Beats 1..=15 plus the final boundary, which the drifting cursor
        // reaches just before 16.
        assert_eq!(times.len(), 16);
        for (i, t) in times.iter().enumerate() {
            assert!((t - (i + 1) as f64).abs() < 1e-9, "crossing {i} at {t}");
        }
    }

    #[test]
    fn test_double_tempo_doubles_density() {
        let curve = LinearTempoCurve::new(120.0, 240.0, 240.0, 8.0).unwrap();
        let times = PhaseAccumulator::new(&curve).crossings(Walk::Forward { end_beats: 8.0 });
        assert!((15..=16).contains(&times.len()), "got {}", times.len());
        assert!((times[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_backward_walk_is_descending() {
        let curve = LinearTempoCurve::new(120.0, 60.0, 120.0, 16.0).unwrap();
        let times = PhaseAccumulator::new(&curve).crossings(Walk::Backward { start_beats: 16.0 });
        assert!(!times.is_empty());
        assert!(times.windows(2).all(|w| w[0] > w[1]));
        assert!(times.iter().all(|&t| (0.0..=16.0).contains(&t)));
    }

    #[test]
    fn test_step_keeps_fractional_remainder() {
        let curve = LinearTempoCurve::new(1.0, 150.0, 150.0, 1.0).unwrap();
        let acc = PhaseAccumulator::new(&curve);
        let mut state = PhaseState::at(0.0);
        // Increment is 1.5 per step: first step crosses one boundary and
        // keeps 0.5, second step reaches 2.0 and crosses two.
        assert_eq!(acc.step(&mut state, 1.0), 1);
        assert!((state.phase - 0.5).abs() < 1e-12);
        assert_eq!(acc.step(&mut state, 1.0), 2);
        assert!(state.phase.abs() < 1e-12);
        assert!((state.time_beats - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_multiple_crossings_per_step_stay_monotonic() {
        // 300x the base tempo: three boundaries per step.
        let curve = LinearTempoCurve::new(1.0, 300.0, 300.0, 0.1).unwrap();
        let times = PhaseAccumulator::new(&curve).crossings(Walk::Forward { end_beats: 0.1 });
        assert!(times.len() >= 27, "got {}", times.len());
        assert!(times.windows(2).all(|w| w[0] < w[1]));
        assert!(times.iter().all(|&t| t > 0.0 && t <= 0.1));
    }

    #[test]
    fn test_identical_walks_are_bit_identical() {
        let curve = LinearTempoCurve::new(120.0, 120.0, 192.0, 16.0).unwrap();
        let acc = PhaseAccumulator::new(&curve);
        let a = acc.crossings(Walk::Forward { end_beats: 16.0 });
        let b = acc.crossings(Walk::Forward { end_beats: 16.0 });
        let bits = |v: &[f64]| v.iter().map(|t| t.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }
}
