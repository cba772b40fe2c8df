// Batch generation and the ratio sweep audit.
//
// Generations share nothing, so a batch is a plain rayon `par_iter` over
// configs with results collected back in input order. `audit_matrix` builds
// the ratio x direction x measure-count grid from a template config, runs
// each case through `ArcAssembler::generate` and `audit::audit_seam`, and
// reports one row per case. A case whose generation fails still gets a row,
// carrying the error message, so one degenerate corner does not hide the
// rest of the sweep.

use crate::arc::{ArcAssembler, Generation};
use crate::audit::{SeamReport, audit_seam};
use crate::config::{Direction, Ratio, RissetConfig};
use crate::error::Result;
use rayon::prelude::*;
use serde::Serialize;

/// Ratios the sweep audit covers by default.
pub const STANDARD_AUDIT_RATIOS: [Ratio; 10] = [
    Ratio::new(2, 1),
    Ratio::new(3, 1),
    Ratio::new(3, 2),
    Ratio::new(4, 3),
    Ratio::new(5, 3),
    Ratio::new(5, 4),
    Ratio::new(6, 5),
    Ratio::new(7, 4),
    Ratio::new(7, 5),
    Ratio::new(8, 5),
];

/// Generate every config in parallel. `results[i]` belongs to `configs[i]`.
pub fn generate_batch(
    assembler: &ArcAssembler,
    configs: &[RissetConfig],
) -> Vec<Result<Generation>> {
    let results: Vec<_> = configs.par_iter().map(|c| assembler.generate(c)).collect();
    let failed = results.iter().filter(|r| r.is_err()).count();
    log::info!("batch of {} generations, {failed} failed", configs.len());
    results
}

/// One point of the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuditCase {
    pub ratio: Ratio,
    pub direction: Direction,
    pub measure_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRow {
    pub case: AuditCase,
    /// The seam report, or why the case could not be generated.
    pub outcome: std::result::Result<SeamReport, String>,
}

impl AuditRow {
    pub fn passed(&self) -> bool {
        self.outcome.as_ref().is_ok_and(SeamReport::all_pass)
    }
}

/// Audit every ratio x direction x measure-count combination, with all other
/// settings taken from `template`. Rows come back in grid order: measure
/// count, then direction, then ratio.
pub fn audit_matrix(
    assembler: &ArcAssembler,
    template: &RissetConfig,
    ratios: &[Ratio],
    measure_counts: &[u32],
) -> Vec<AuditRow> {
    let cases: Vec<AuditCase> = measure_counts
        .iter()
        .flat_map(move |&measure_count| {
            Direction::ALL.into_iter().flat_map(move |direction| {
                ratios.iter().map(move |&ratio| AuditCase {
                    ratio,
                    direction,
                    measure_count,
                })
            })
        })
        .collect();

    let rows: Vec<AuditRow> = cases
        .into_par_iter()
        .map(|case| {
            let config = RissetConfig {
                ratio: case.ratio,
                direction: case.direction,
                measure_count: case.measure_count,
                ..template.clone()
            };
            let outcome = assembler
                .generate(&config)
                .map_err(|e| e.to_string())
                .and_then(|generation| {
                    audit_seam(&generation).ok_or_else(|| "metabar 0 is incomplete".to_string())
                });
            AuditRow { case, outcome }
        })
        .collect();

    let passed = rows.iter().filter(|r| r.passed()).count();
    log::info!("seam audit: {passed}/{} cases pass", rows.len());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeSignature;

    #[test]
    fn test_batch_preserves_order() {
        let assembler = ArcAssembler::default();
        let configs: Vec<RissetConfig> = (1..=4)
            .map(|measures| {
                let mut config = RissetConfig::new(Direction::Accel);
                config.measure_count = measures * 2;
                config
            })
            .collect();
        let results = generate_batch(&assembler, &configs);
        assert_eq!(results.len(), 4);
        for (config, result) in configs.iter().zip(&results) {
            let generation = result.as_ref().unwrap();
            assert_eq!(generation.metabar_beats, config.metabar_beats());
            assert_eq!(generation, &assembler.generate(config).unwrap());
        }
    }

    #[test]
    fn test_batch_keeps_failures_in_place() {
        let good = RissetConfig::new(Direction::Decel);
        let mut bad = good.clone();
        bad.velocity_gamma = 9.0;
        let results = generate_batch(&ArcAssembler::default(), &[good, bad]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_matrix_covers_grid_in_order() {
        let template = RissetConfig::new(Direction::Accel);
        let ratios = [Ratio::new(2, 1), Ratio::new(3, 2)];
        let rows = audit_matrix(&ArcAssembler::default(), &template, &ratios, &[4, 8]);
        assert_eq!(rows.len(), 8);
        assert_eq!(
            rows[0].case,
            AuditCase {
                ratio: Ratio::new(2, 1),
                direction: Direction::Accel,
                measure_count: 4
            }
        );
        assert_eq!(rows[3].case.direction, Direction::Decel);
        assert_eq!(rows[7].case.measure_count, 8);
        assert!(rows.iter().all(AuditRow::passed));
    }

    #[test]
    fn test_matrix_reports_generation_errors() {
        let mut template = RissetConfig::new(Direction::Accel);
        template.time_signature = TimeSignature::new(1, 16);
        let rows = audit_matrix(&ArcAssembler::default(), &template, &[Ratio::new(2, 1)], &[1]);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert!(!row.passed());
            let message = row.outcome.as_ref().unwrap_err();
            assert!(message.contains("no playable notes"), "{message}");
        }
    }
}
