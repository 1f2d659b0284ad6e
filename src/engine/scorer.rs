//! Risk/benefit scorer.
//!
//! Two independent additive rule tables over the normalized record:
//! risk of deterioration without surgery, and expected benefit with surgery.
//! Both are clamped to 0-100.

use serde::Serialize;

use crate::domain::{Contribution, PatientRecord, Severity, T2Signal};

const LONG_DURATION_MONTHS: f64 = 24.0;
const PROLONGED_DURATION_MONTHS: f64 = 12.0;
const SEVERE_MJOA: f64 = 12.0;
const HIGH_NDI: f64 = 40.0;
const LOW_PCS: f64 = 35.0;

/// A score with the rule contributions that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub baseline: i32,
    pub contributions: Vec<Contribution>,
    /// Baseline plus contributions, clamped to 0-100
    pub total: u8,
}

impl ScoreBreakdown {
    fn new(baseline: i32, contributions: Vec<Contribution>) -> Self {
        let raw = baseline + contributions.iter().map(|c| c.delta).sum::<i32>();
        // Clamped to 0-100, so the narrowing cast is exact.
        let total = raw.clamp(0, 100) as u8;
        Self {
            baseline,
            contributions,
            total,
        }
    }
}

/// Risk and benefit for one patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scores {
    pub risk: ScoreBreakdown,
    pub benefit: ScoreBreakdown,
}

/// Compute both scores.
#[must_use]
pub fn score(patient: &PatientRecord) -> Scores {
    Scores {
        risk: risk_score(patient),
        benefit: benefit_score(patient),
    }
}

/// Risk of neurological deterioration if managed non-operatively.
#[must_use]
pub fn risk_score(patient: &PatientRecord) -> ScoreBreakdown {
    let baseline = match patient.severity() {
        Severity::Mild => 20,
        Severity::Moderate => 55,
        Severity::Severe => 80,
    };

    let mut fired = Vec::new();
    let mut add = |factor: &'static str, delta: i32| fired.push(Contribution { factor, delta });

    let duration = patient.symptom_duration_months();
    if duration > LONG_DURATION_MONTHS {
        add("symptom duration > 24 months", 8);
    } else if duration > PROLONGED_DURATION_MONTHS {
        add("symptom duration 12-24 months", 4);
    }

    match patient.t2_signal() {
        T2Signal::Focal => add("focal T2 cord signal", 6),
        T2Signal::Multilevel => add("multilevel T2 cord signal", 10),
        T2Signal::None => {}
    }

    if patient.t1_hypointensity() {
        add("T1 hypointensity", 6);
    }
    if patient.gait_impairment() {
        add("gait impairment", 8);
    }
    if patient.opll() {
        add("OPLL", 6);
    }

    ScoreBreakdown::new(baseline, fired)
}

/// Expected benefit from decompression.
#[must_use]
pub fn benefit_score(patient: &PatientRecord) -> ScoreBreakdown {
    let baseline = match patient.severity() {
        Severity::Mild => 80,
        Severity::Moderate => 40,
        Severity::Severe => 10,
    };

    let mut fired = Vec::new();
    let mut add = |factor: &'static str, delta: i32| fired.push(Contribution { factor, delta });

    let duration = patient.symptom_duration_months();
    if duration > LONG_DURATION_MONTHS {
        add("symptom duration > 24 months", -10);
    } else if duration > PROLONGED_DURATION_MONTHS {
        add("symptom duration 12-24 months", -5);
    }

    if patient.baseline_mjoa() < SEVERE_MJOA {
        add("baseline mJOA < 12", -8);
    }
    if patient.baseline_ndi() >= HIGH_NDI {
        add("NDI >= 40", 5);
    }
    if patient.baseline_sf36_pcs() <= LOW_PCS {
        add("SF-36 PCS <= 35", 5);
    }

    ScoreBreakdown::new(baseline, fired)
}
