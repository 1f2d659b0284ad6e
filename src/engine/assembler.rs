//! Result assembler.

use crate::domain::{ApproachVariant, PatientRecord, RecommendationResult};

use super::allocator::{self, ApproachAllocation};
use super::blender::SurgeryDecision;
use super::scorer::Scores;

/// Bundle the component outputs into one result.
///
/// The only choice made here is which distribution `variant` surfaces as
/// `approach_probs`; best, second-best and uncertainty describe that one.
#[must_use]
pub fn assemble(
    input: PatientRecord,
    scores: Scores,
    decision: SurgeryDecision,
    allocation: ApproachAllocation,
    variant: ApproachVariant,
) -> RecommendationResult {
    let approach_probs = allocation.distribution(variant);
    let ranking = allocator::rank(&approach_probs);

    RecommendationResult {
        input,
        risk_score: scores.risk.total,
        benefit_score: scores.benefit.total,
        risk_factors: scores.risk.contributions,
        benefit_factors: scores.benefit.contributions,
        p_surgery_rule: decision.p_rule,
        p_surgery_scored: decision.p_scored,
        p_surgery_combined: decision.p_combined,
        surgery_recommended: decision.recommended,
        recommendation_label: decision.label,
        approach_probs_rule: allocation.rule,
        approach_probs_scored: allocation.scored,
        approach_probs,
        approach_variant: variant,
        approach_adjustments: allocation.adjustments,
        best_approach: ranking.best,
        second_best_approach: ranking.second,
        second_best_approach_prob: ranking.second_prob,
        uncertainty_level: ranking.uncertainty,
    }
}
