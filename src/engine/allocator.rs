//! Approach allocator.
//!
//! Distributes probability over anterior, posterior and circumferential
//! approaches in three stages:
//! 1. Rule: a fixed prior shifted by stacking imaging/clinical adjustments
//! 2. Scored: the rule distribution shrunk towards fixed offsets
//! 3. Final: the per-approach mean of the two
//!
//! Every stage is floored at zero and renormalized.

use crate::domain::{
    Approach, ApproachAdjustment, ApproachProbs, ApproachVariant, PatientRecord, T2Signal,
    UncertaintyLevel,
};

/// Rule prior: anterior, posterior, circumferential.
const RULE_PRIOR: [f64; 3] = [0.4, 0.4, 0.2];

/// Additive offsets of the scored distribution.
const SCORED_OFFSETS: [f64; 3] = [0.15, 0.15, 0.10];

/// Weight of the rule distribution inside the scored one.
const SCORED_RULE_WEIGHT: f64 = 0.5;

/// A best-second gap at or above this is low uncertainty.
pub const LOW_UNCERTAINTY_GAP: f64 = 0.25;

/// A best-second gap at or above this (and below the low cut) is moderate.
pub const MODERATE_UNCERTAINTY_GAP: f64 = 0.10;

/// Gaps are rounded to this many parts before comparing against the cuts.
const GAP_SCALE: f64 = 1e9;

const SEVERE_MJOA: f64 = 12.0;

/// Whether an adjustment fires for this patient.
#[must_use]
pub fn applies(adjustment: ApproachAdjustment, patient: &PatientRecord) -> bool {
    let levels = patient.levels_operated();
    match adjustment {
        ApproachAdjustment::ShortSegmentAnterior => {
            levels <= 2
                && !patient.opll()
                && !patient.canal_occupying_ratio().exceeds_60()
                && patient.t2_signal() != T2Signal::Multilevel
        }
        ApproachAdjustment::MultilevelDisease => {
            levels >= 4 || patient.t2_signal() == T2Signal::Multilevel
        }
        ApproachAdjustment::OpllHighOccupancy => {
            patient.opll() && patient.canal_occupying_ratio().exceeds_60()
        }
        ApproachAdjustment::SevereMultilevel => patient.baseline_mjoa() < SEVERE_MJOA && levels >= 4,
    }
}

/// Shift applied to (anterior, posterior, circumferential).
#[must_use]
pub fn shift(adjustment: ApproachAdjustment) -> [f64; 3] {
    match adjustment {
        ApproachAdjustment::ShortSegmentAnterior => [0.2, -0.1, -0.1],
        ApproachAdjustment::MultilevelDisease => [-0.1, 0.2, 0.1],
        ApproachAdjustment::OpllHighOccupancy => [-0.4, 0.1, 0.3],
        ApproachAdjustment::SevereMultilevel => [-0.15, 0.05, 0.1],
    }
}

/// All three distributions and the adjustments that shaped them.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproachAllocation {
    pub rule: ApproachProbs,
    pub scored: ApproachProbs,
    pub combined: ApproachProbs,
    pub adjustments: Vec<ApproachAdjustment>,
}

impl ApproachAllocation {
    /// Allocation used when surgery is not recommended.
    #[must_use]
    pub fn undefined() -> Self {
        Self {
            rule: ApproachProbs::ZERO,
            scored: ApproachProbs::ZERO,
            combined: ApproachProbs::ZERO,
            adjustments: Vec::new(),
        }
    }

    /// The distribution for a variant.
    #[must_use]
    pub fn distribution(&self, variant: ApproachVariant) -> ApproachProbs {
        match variant {
            ApproachVariant::Rule => self.rule,
            ApproachVariant::Scored => self.scored,
            ApproachVariant::Final => self.combined,
        }
    }
}

/// Compute the rule, scored and final distributions.
#[must_use]
pub fn allocate(patient: &PatientRecord) -> ApproachAllocation {
    let adjustments: Vec<ApproachAdjustment> = ApproachAdjustment::ALL
        .into_iter()
        .filter(|a| applies(*a, patient))
        .collect();

    let mut weights = RULE_PRIOR;
    for adjustment in &adjustments {
        for (w, d) in weights.iter_mut().zip(shift(*adjustment)) {
            *w += d;
        }
    }
    let rule = ApproachProbs::normalized(weights[0], weights[1], weights[2]);

    let scored = ApproachProbs::normalized(
        SCORED_RULE_WEIGHT * rule.anterior + SCORED_OFFSETS[0],
        SCORED_RULE_WEIGHT * rule.posterior + SCORED_OFFSETS[1],
        SCORED_RULE_WEIGHT * rule.circumferential + SCORED_OFFSETS[2],
    );

    let combined = ApproachProbs::normalized(
        (rule.anterior + scored.anterior) / 2.0,
        (rule.posterior + scored.posterior) / 2.0,
        (rule.circumferential + scored.circumferential) / 2.0,
    );

    debug_assert!(rule.is_distribution(1e-9), "rule distribution: {rule:?}");
    debug_assert!(combined.is_distribution(1e-9), "final distribution: {combined:?}");

    ApproachAllocation {
        rule,
        scored,
        combined,
        adjustments,
    }
}

/// Best and runner-up approach for one distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApproachRanking {
    pub best: Approach,
    pub best_prob: f64,
    pub second: Approach,
    pub second_prob: f64,
    pub uncertainty: UncertaintyLevel,
}

impl ApproachRanking {
    /// Ranking of the zero distribution: no approach, moderate uncertainty.
    #[must_use]
    pub fn undefined() -> Self {
        Self {
            best: Approach::None,
            best_prob: 0.0,
            second: Approach::None,
            second_prob: 0.0,
            uncertainty: UncertaintyLevel::Moderate,
        }
    }
}

/// Rank a distribution and classify the uncertainty of its leader.
#[must_use]
pub fn rank(probs: &ApproachProbs) -> ApproachRanking {
    if probs.is_zero() {
        return ApproachRanking::undefined();
    }
    let [(best, best_prob), (second, second_prob), _] = probs.ranked();
    ApproachRanking {
        best,
        best_prob,
        second,
        second_prob,
        uncertainty: classify_uncertainty(best_prob - second_prob),
    }
}

/// Map the gap between the top two probabilities to an uncertainty level.
#[must_use]
pub fn classify_uncertainty(gap: f64) -> UncertaintyLevel {
    let gap = (gap * GAP_SCALE).round() / GAP_SCALE;
    if gap >= LOW_UNCERTAINTY_GAP {
        UncertaintyLevel::Low
    } else if gap >= MODERATE_UNCERTAINTY_GAP {
        UncertaintyLevel::Moderate
    } else {
        UncertaintyLevel::High
    }
}
