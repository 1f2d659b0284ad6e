//! Surgery decision blender.
//!
//! Averages a severity-conditioned rule probability with a score-based
//! probability and maps the result to a recommendation label.

use crate::domain::{PatientRecord, RecommendationLabel, Severity};

use super::clamp01;

/// Below this combined probability a mild patient may trial non-operative care.
pub const NON_OPERATIVE_CEILING: f64 = 0.35;

/// At or above this combined probability surgery is recommended outright.
pub const STRONG_RECOMMENDATION_FLOOR: f64 = 0.7;

const MILD_DURATION_TRIGGER_MONTHS: f64 = 12.0;

/// Output of the blender.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurgeryDecision {
    pub p_rule: f64,
    pub p_scored: f64,
    pub p_combined: f64,
    pub recommended: bool,
    pub label: RecommendationLabel,
}

/// Severity-conditioned rule probability.
///
/// Mild disease only leans operative when there is a progression marker:
/// symptoms beyond 12 months, any T2 signal change, or gait impairment.
#[must_use]
pub fn rule_probability(patient: &PatientRecord) -> f64 {
    match patient.severity() {
        Severity::Mild => {
            let progression = patient.symptom_duration_months() > MILD_DURATION_TRIGGER_MONTHS
                || patient.t2_signal().is_present()
                || patient.gait_impairment();
            if progression {
                0.8
            } else {
                0.2
            }
        }
        Severity::Moderate => 0.8,
        Severity::Severe => 0.9,
    }
}

/// Score-based probability from the risk and benefit scores.
#[must_use]
pub fn scored_probability(risk_score: u8, benefit_score: u8) -> f64 {
    clamp01(0.2 + 0.4 * (f64::from(risk_score) / 100.0) + 0.2 * (f64::from(benefit_score) / 100.0))
}

/// Map a combined probability to a label.
///
/// Only mild patients can be routed to the non-operative label.
#[must_use]
pub fn classify(p_combined: f64, severity: Severity) -> RecommendationLabel {
    if p_combined < NON_OPERATIVE_CEILING && severity == Severity::Mild {
        RecommendationLabel::NonOperativeTrial
    } else if p_combined < STRONG_RECOMMENDATION_FLOOR {
        RecommendationLabel::ConsiderSurgery
    } else {
        RecommendationLabel::SurgeryRecommended
    }
}

/// Run the full blend for one patient.
#[must_use]
pub fn blend(patient: &PatientRecord, risk_score: u8, benefit_score: u8) -> SurgeryDecision {
    let p_rule = rule_probability(patient);
    let p_scored = scored_probability(risk_score, benefit_score);
    let p_combined = clamp01((p_rule + p_scored) / 2.0);
    let label = classify(p_combined, patient.severity());

    SurgeryDecision {
        p_rule,
        p_scored,
        p_combined,
        recommended: label.is_surgical(),
        label,
    }
}
