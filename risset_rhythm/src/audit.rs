// Seam audit: checks that a generation will loop without an audible jump.
//
// The audit looks only at metabar 0 of a `Generation`. It treats the
// fade-in layer as the material just before a seam and the fade-out layer
// as the material just after it (which is what happens when the render
// loops, or when metabar 0 hands over to metabar 1). Six checks run:
//
// 1. `VelocityCrossfade`: each layer actually fades (loud end above
//    `LOUD_VELOCITY`, quiet end below `QUIET_VELOCITY`).
// 2. `SeamVelocity`: the fade-in's last note and the fade-out's first note
//    are within `SEAM_VELOCITY_TOLERANCE` of each other.
// 3. `SeamOnsetGap`: the silence across the seam between those two notes
//    is neither a stutter nor a hole.
// 4. `ReleaseGap`: the fade-in's last note releases before the seam.
// 5. `MergedLine`: with both layers merged onto one time line, the gap
//    straddling the seam is in proportion to the gaps around it.
// 6. `LayerSpan`: neither layer has an onset at or past the seam.
//
// The thresholds are listening-test heuristics, not derived values.

use crate::arc::{Generation, RenderedLayer};
use crate::velocity::LayerRole;
use serde::Serialize;
use std::fmt;

pub const LOUD_VELOCITY: u8 = 100;
pub const QUIET_VELOCITY: u8 = 30;
pub const SEAM_VELOCITY_TOLERANCE: u8 = 30;
/// Open interval the cross-seam onset gap must fall in, in beats.
pub const SEAM_GAP_RANGE: (f64, f64) = (0.3, 2.5);
pub const MIN_RELEASE_GAP_BEATS: f64 = 0.1;
pub const MIN_MERGED_GAP_BEATS: f64 = 0.2;
/// The merged seam gap may be at most this multiple of its neighbours' mean.
pub const MERGED_GAP_FACTOR: f64 = 3.0;
/// Neighbouring gaps averaged around the seam gap: `[i - 3, i + 4)`.
const MERGED_WINDOW_BEFORE: usize = 3;
const MERGED_WINDOW_AFTER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SeamCheckKind {
    VelocityCrossfade,
    SeamVelocity,
    SeamOnsetGap,
    ReleaseGap,
    MergedLine,
    LayerSpan,
}

impl fmt::Display for SeamCheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SeamCheckKind::VelocityCrossfade => "velocity crossfade",
            SeamCheckKind::SeamVelocity => "seam velocity",
            SeamCheckKind::SeamOnsetGap => "seam onset gap",
            SeamCheckKind::ReleaseGap => "release gap",
            SeamCheckKind::MergedLine => "merged line",
            SeamCheckKind::LayerSpan => "layer span",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeamCheck {
    pub kind: SeamCheckKind,
    pub passed: bool,
    /// The measured values, for reports.
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeamReport {
    pub metabar_beats: f64,
    pub fade_out_count: usize,
    pub fade_in_count: usize,
    pub checks: Vec<SeamCheck>,
}

impl SeamReport {
    pub fn all_pass(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn check(&self, kind: SeamCheckKind) -> Option<&SeamCheck> {
        self.checks.iter().find(|c| c.kind == kind)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SeamCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Audit the seam of `generation`'s first metabar.
///
/// Returns `None` if the generation lacks either layer of metabar 0, which
/// `ArcAssembler` never produces.
pub fn audit_seam(generation: &Generation) -> Option<SeamReport> {
    let fade_out = generation.layer(0, LayerRole::FadeOut)?;
    let fade_in = generation.layer(0, LayerRole::FadeIn)?;
    let span = generation.metabar_beats;

    // Assembled layers are never empty.
    let out_first = fade_out.notes.first()?;
    let out_last = fade_out.notes.last()?;
    let in_first = fade_in.notes.first()?;
    let in_last = fade_in.notes.last()?;

    let crossfade = SeamCheck {
        kind: SeamCheckKind::VelocityCrossfade,
        passed: out_first.velocity > LOUD_VELOCITY
            && out_last.velocity < QUIET_VELOCITY
            && in_first.velocity < QUIET_VELOCITY
            && in_last.velocity > LOUD_VELOCITY,
        detail: format!(
            "fade-out {} -> {}, fade-in {} -> {}",
            out_first.velocity, out_last.velocity, in_first.velocity, in_last.velocity
        ),
    };

    let velocity_jump = in_last.velocity.abs_diff(out_first.velocity);
    let seam_velocity = SeamCheck {
        kind: SeamCheckKind::SeamVelocity,
        passed: velocity_jump < SEAM_VELOCITY_TOLERANCE,
        detail: format!("jump {velocity_jump}"),
    };

    let gap = (span - in_last.onset_beats) + out_first.onset_beats;
    let onset_gap = SeamCheck {
        kind: SeamCheckKind::SeamOnsetGap,
        passed: gap > SEAM_GAP_RANGE.0 && gap < SEAM_GAP_RANGE.1,
        detail: format!("gap {gap:.3} beats"),
    };

    let release = span - (in_last.onset_beats + in_last.duration_beats);
    let release_gap = SeamCheck {
        kind: SeamCheckKind::ReleaseGap,
        passed: release > MIN_RELEASE_GAP_BEATS,
        detail: format!("release {release:.3} beats before seam"),
    };

    let layer_span = SeamCheck {
        kind: SeamCheckKind::LayerSpan,
        passed: out_last.onset_beats < span && in_last.onset_beats < span,
        detail: format!(
            "last onsets {:.3} / {:.3}",
            out_last.onset_beats, in_last.onset_beats
        ),
    };

    let checks = vec![
        crossfade,
        seam_velocity,
        onset_gap,
        release_gap,
        merged_line_check(fade_out, fade_in, span),
        layer_span,
    ];

    for check in checks.iter().filter(|c| !c.passed) {
        log::warn!("seam check '{}' failed: {}", check.kind, check.detail);
    }

    Some(SeamReport {
        metabar_beats: span,
        fade_out_count: fade_out.notes.len(),
        fade_in_count: fade_in.notes.len(),
        checks,
    })
}

fn merged_line_check(fade_out: &RenderedLayer, fade_in: &RenderedLayer, span: f64) -> SeamCheck {
    let mut merged: Vec<f64> = fade_in
        .notes
        .iter()
        .map(|n| n.onset_beats)
        .chain(fade_out.notes.iter().map(|n| n.onset_beats + span))
        .collect();
    merged.sort_by(f64::total_cmp);
    let gaps: Vec<f64> = merged.windows(2).map(|w| w[1] - w[0]).collect();

    let Some(seam) = merged.windows(2).position(|w| w[0] < span && span <= w[1]) else {
        return SeamCheck {
            kind: SeamCheckKind::MergedLine,
            passed: false,
            detail: "no gap straddles the seam".to_string(),
        };
    };
    let from = seam.saturating_sub(MERGED_WINDOW_BEFORE);
    let to = (seam + MERGED_WINDOW_AFTER).min(gaps.len());
    let window = &gaps[from..to];
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    let seam_gap = gaps[seam];

    SeamCheck {
        kind: SeamCheckKind::MergedLine,
        passed: seam_gap > MIN_MERGED_GAP_BEATS && seam_gap < mean * MERGED_GAP_FACTOR,
        detail: format!("seam gap {seam_gap:.3}, local mean {mean:.3}"),
    }
}
