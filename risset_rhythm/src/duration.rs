// Note durations for one layer.
//
// Every note sustains for a fixed fraction of the gap to the next onset,
// and never past `release_gap` before the metabar end, so the loop point
// stays clean. The last note has no successor and is capped at
// `max_last_duration` instead. Notes whose duration comes out at or below
// `min_duration` are dropped here, before `velocity.rs` sees the layer, so a
// dropped note never takes a step of the velocity ramp.
//
// A backward layer's seeded anchor sits closer to the seam than the release
// gap, so it always drops out at this stage; its job was to shape the walk
// and the previous note's duration, not to sound.

use crate::config::SeamPolicy;
use crate::onsets::OnsetSequence;
use serde::{Deserialize, Serialize};

/// An onset with the duration it will sound for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedNote {
    pub onset_beats: f64,
    pub duration_beats: f64,
}

/// Assigns durations within one metabar.
#[derive(Debug, Clone, Copy)]
pub struct DurationAssigner {
    policy: SeamPolicy,
    metabar_beats: f64,
}

impl DurationAssigner {
    pub fn new(policy: SeamPolicy, metabar_beats: f64) -> Self {
        DurationAssigner {
            policy,
            metabar_beats,
        }
    }

    /// Time left before the release deadline for a note starting at `onset`.
    fn room_before_seam(&self, onset: f64) -> f64 {
        self.metabar_beats - onset - self.policy.release_gap
    }

    /// Durations for every onset that survives the minimum-duration filter,
    /// in onset order.
    pub fn assign(&self, onsets: &OnsetSequence) -> Vec<TimedNote> {
        let times = onsets.as_slice();
        let mut notes = Vec::with_capacity(times.len());

        for (i, &onset) in times.iter().enumerate() {
            let duration = match times.get(i + 1) {
                Some(&next) => ((next - onset) * self.policy.legato).min(self.room_before_seam(onset)),
                None => self.policy.max_last_duration.min(self.room_before_seam(onset)),
            };
            if duration > self.policy.min_duration {
                notes.push(TimedNote {
                    onset_beats: onset,
                    duration_beats: duration,
                });
            }
        }

        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigner(metabar_beats: f64) -> DurationAssigner {
        DurationAssigner::new(SeamPolicy::default(), metabar_beats)
    }

    #[test]
    fn test_legato_fraction_of_gap() {
        let onsets = OnsetSequence::from_sorted(vec![0.0, 1.0, 1.5]);
        let notes = assigner(16.0).assign(&onsets);
        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].duration_beats, 0.8);
        assert_eq!(notes[1].duration_beats, 0.5 * 0.8);
        // Last note: full beat allowed, plenty of room before the seam.
        assert_eq!(notes[2].duration_beats, 1.0);
    }

    #[test]
    fn test_durations_stop_before_seam() {
        let onsets = OnsetSequence::from_sorted(vec![0.0, 3.0, 3.5]);
        let notes = assigner(4.0).assign(&onsets);
        // 3.0 -> min(0.4, 4 - 3 - 0.2 = 0.8); 3.5 -> min(1.0, 0.3).
        assert!((notes[1].duration_beats - 0.4).abs() < 1e-12);
        assert!((notes[2].duration_beats - 0.3).abs() < 1e-12);
        for note in &notes {
            assert!(note.onset_beats + note.duration_beats <= 4.0 - 0.2 + 1e-9);
        }
    }

    #[test]
    fn test_anchor_note_is_dropped() {
        let onsets = OnsetSequence::from_sorted(vec![0.0, 15.0, 15.95]);
        let notes = assigner(16.0).assign(&onsets);
        assert_eq!(notes.len(), 2);
        // The dropped anchor still bounds the note before it: 0.8 * 0.95.
        assert!((notes[1].duration_beats - 0.76).abs() < 1e-9);
    }

    #[test]
    fn test_short_notes_filtered() {
        let onsets = OnsetSequence::from_sorted(vec![0.0, 0.01, 1.0]);
        let notes = assigner(16.0).assign(&onsets);
        // 0.0 gets 0.008 and is dropped; 0.01 keeps 0.792.
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].onset_beats, 0.01);
    }

    #[test]
    fn test_tiny_metabar_leaves_nothing() {
        let onsets = OnsetSequence::from_sorted(vec![0.0]);
        assert!(assigner(0.125).assign(&onsets).is_empty());
    }
}
