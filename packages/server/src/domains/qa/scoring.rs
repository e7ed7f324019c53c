//! QA scoring: weighted content score, browser-check score, and the
//! thresholds that decide whether a site ships.

use serde::{Deserialize, Serialize};

use crate::kernel::browser::VISUAL_CHECKS;
use crate::kernel::VisualReport;

pub const CONTENT_WEIGHT: f64 = 0.7;
pub const VISUAL_WEIGHT: f64 = 0.3;

/// Overall score at or above which a site passes outright.
pub const PASS_THRESHOLD: f64 = 80.0;
/// Overall score at or above which a site goes to manual review.
pub const REVIEW_THRESHOLD: f64 = 60.0;

/// Points per passing browser check.
pub const POINTS_PER_CHECK: f64 = 20.0;

/// LLM sub-scores, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentScores {
    pub clarity: f64,
    pub relevance: f64,
    pub persuasiveness: f64,
    pub completeness: f64,
    pub professionalism: f64,
}

impl ContentScores {
    /// Weighted total: clarity 25%, relevance 25%, persuasiveness 20%,
    /// completeness 15%, professionalism 15%.
    pub fn weighted(&self) -> f64 {
        let clamp = |v: f64| if v.is_finite() { v.clamp(0.0, 100.0) } else { 0.0 };

        clamp(self.clarity) * 0.25
            + clamp(self.relevance) * 0.25
            + clamp(self.persuasiveness) * 0.20
            + clamp(self.completeness) * 0.15
            + clamp(self.professionalism) * 0.15
    }
}

/// 20 points for each known check that passed.
pub fn visual_score(report: &VisualReport) -> f64 {
    let passed = VISUAL_CHECKS
        .iter()
        .filter(|name| report.checks.iter().any(|c| c.name == **name && c.passed))
        .count();
    (passed as f64 * POINTS_PER_CHECK).min(100.0)
}

pub fn overall_score(content: f64, visual: f64) -> f64 {
    CONTENT_WEIGHT * content + VISUAL_WEIGHT * visual
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QaStatus {
    Passed,
    ManualReview,
    Failed,
}

impl QaStatus {
    pub fn from_score(overall: f64) -> Self {
        if overall >= PASS_THRESHOLD {
            QaStatus::Passed
        } else if overall >= REVIEW_THRESHOLD {
            QaStatus::ManualReview
        } else {
            QaStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QaStatus::Passed => "passed",
            QaStatus::ManualReview => "manual_review",
            QaStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for QaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QaStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "passed" => Ok(QaStatus::Passed),
            "manual_review" => Ok(QaStatus::ManualReview),
            "failed" => Ok(QaStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid QA status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::browser::{failed_report, CHECK_CTA, CHECK_IMAGES};
    use crate::kernel::VisualCheck;

    fn report(failing: &[&str]) -> VisualReport {
        VisualReport {
            checks: VISUAL_CHECKS
                .iter()
                .map(|n| {
                    if failing.contains(n) {
                        VisualCheck::fail(*n, "broken")
                    } else {
                        VisualCheck::pass(*n)
                    }
                })
                .collect(),
        }
    }

    #[test]
    fn overall_bounds() {
        assert_eq!(overall_score(100.0, 100.0), 100.0);
        assert_eq!(overall_score(0.0, 0.0), 0.0);
        assert!((overall_score(80.0, 40.0) - 68.0).abs() < 1e-9);
    }

    #[test]
    fn thresholds() {
        assert_eq!(QaStatus::from_score(80.0), QaStatus::Passed);
        assert_eq!(QaStatus::from_score(79.9), QaStatus::ManualReview);
        assert_eq!(QaStatus::from_score(60.0), QaStatus::ManualReview);
        assert_eq!(QaStatus::from_score(59.9), QaStatus::Failed);
    }

    #[test]
    fn content_weights() {
        let scores = ContentScores {
            clarity: 100.0,
            relevance: 100.0,
            persuasiveness: 0.0,
            completeness: 0.0,
            professionalism: 0.0,
        };
        assert!((scores.weighted() - 50.0).abs() < 1e-9);

        let wild = ContentScores {
            clarity: 250.0,
            relevance: -10.0,
            persuasiveness: f64::NAN,
            completeness: 100.0,
            professionalism: 100.0,
        };
        assert!((wild.weighted() - 55.0).abs() < 1e-9);
    }

    #[test]
    fn visual_points_per_check() {
        assert_eq!(visual_score(&report(&[])), 100.0);
        assert_eq!(visual_score(&report(&[CHECK_CTA, CHECK_IMAGES])), 60.0);
        assert_eq!(visual_score(&failed_report("no browser")), 0.0);
    }

    #[test]
    fn unknown_and_repeated_checks_do_not_count() {
        let mut r = report(&[CHECK_CTA]);
        r.checks.push(VisualCheck::pass("extra"));
        r.checks.push(VisualCheck::pass(VISUAL_CHECKS[0]));
        assert_eq!(visual_score(&r), 80.0);
    }
}
