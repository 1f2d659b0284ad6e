//! Recommendation engine.
//!
//! A pure pipeline from patient record to recommendation:
//!
//! ```text
//! RawPatientRecord -> normalizer -> PatientRecord
//!     -> scorer -> blender -> allocator -> assembler -> RecommendationResult
//! ```
//!
//! Nothing here performs I/O, logs, or keeps state between calls; the same
//! input always yields the same result.

pub mod allocator;
pub mod assembler;
pub mod blender;
pub mod normalizer;
pub mod scorer;

use crate::config::EngineConfig;
use crate::domain::{PatientRecord, RawPatientRecord, RecommendationResult, ValidationErrors};

use allocator::ApproachAllocation;

/// Clamp to the unit interval (NaN maps to 0).
pub(crate) fn clamp01(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

/// Run the engine on a normalized record.
#[must_use]
pub fn recommend(patient: &PatientRecord, config: &EngineConfig) -> RecommendationResult {
    let scores = scorer::score(patient);
    let decision = blender::blend(patient, scores.risk.total, scores.benefit.total);
    let allocation = if decision.recommended {
        allocator::allocate(patient)
    } else {
        ApproachAllocation::undefined()
    };
    assembler::assemble(
        patient.clone(),
        scores,
        decision,
        allocation,
        config.approach_variant,
    )
}

/// Normalize a raw record, then run the engine.
///
/// # Errors
/// Returns the field-level validation errors of the record.
pub fn evaluate(
    raw: &RawPatientRecord,
    config: &EngineConfig,
) -> Result<RecommendationResult, ValidationErrors> {
    let patient = normalizer::normalize(raw, config)?;
    Ok(recommend(&patient, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Approach, ApproachProbs, ApproachVariant, Field, RecommendationLabel, Severity,
        UncertaintyLevel,
    };

    fn run(raw: RawPatientRecord) -> RecommendationResult {
        evaluate(&raw, &EngineConfig::default()).expect("valid record")
    }

    #[test]
    fn test_moderate_multilevel_considers_surgery() {
        let result = run(RawPatientRecord::new()
            .with(Field::Age, 65)
            .with(Field::BaselineMjoa, 13.0)
            .with(Field::SymptomDurationMonths, 12.0)
            .with(Field::T2Signal, "multilevel")
            .with(Field::Opll, false)
            .with(Field::CanalOccupyingRatio, "50-60%")
            .with(Field::GaitImpairment, true));

        assert_eq!(result.input.severity(), Severity::Moderate);
        assert!((result.p_surgery_rule - 0.8).abs() < f64::EPSILON);
        assert_eq!(result.risk_score, 73);
        assert_eq!(result.benefit_score, 40);
        assert!((result.p_surgery_combined - 0.686).abs() < 1e-9);
        assert!(result.surgery_recommended);
        assert_eq!(result.recommendation_label, RecommendationLabel::ConsiderSurgery);
        assert!(result.approach_probs.is_distribution(1e-9));
        assert_eq!(result.best_approach, Approach::Posterior);
    }

    #[test]
    fn test_quiet_mild_patient_trials_non_operative() {
        let result = run(RawPatientRecord::new()
            .with(Field::BaselineMjoa, 17.0)
            .with(Field::SymptomDurationMonths, 6.0)
            .with(Field::T2Signal, "none")
            .with(Field::GaitImpairment, false));

        assert_eq!(result.input.severity(), Severity::Mild);
        assert!((result.p_surgery_rule - 0.2).abs() < f64::EPSILON);
        assert!(result.p_surgery_combined < 0.35);
        assert!(!result.surgery_recommended);
        assert_eq!(result.recommendation_label, RecommendationLabel::NonOperativeTrial);
        assert_eq!(result.approach_probs, ApproachProbs::ZERO);
        assert_eq!(result.approach_probs_rule, ApproachProbs::ZERO);
        assert_eq!(result.best_approach, Approach::None);
        assert_eq!(result.second_best_approach_prob, 0.0);
        assert_eq!(result.uncertainty_level, UncertaintyLevel::Moderate);
        assert!(result.approach_adjustments.is_empty());
    }

    #[test]
    fn test_severe_patient_surgery_recommended() {
        let result = run(RawPatientRecord::new()
            .with(Field::BaselineMjoa, 9.0)
            .with(Field::T2Signal, "focal")
            .with(Field::GaitImpairment, true)
            .with(Field::SymptomDurationMonths, 30.0));

        // Risk 80 + 8 + 6 + 8 = 102 -> 100; benefit 10 - 10 - 8 -> 0.
        assert_eq!(result.risk_score, 100);
        assert_eq!(result.benefit_score, 0);
        // (0.9 + 0.6) / 2
        assert!((result.p_surgery_combined - 0.75).abs() < 1e-9);
        assert_eq!(result.recommendation_label, RecommendationLabel::SurgeryRecommended);
    }

    #[test]
    fn test_opll_with_high_occupancy() {
        let result = run(RawPatientRecord::new()
            .with(Field::Opll, true)
            .with(Field::CanalOccupyingRatio, ">60%")
            .with(Field::LevelsOperated, 5));

        assert!(result.surgery_recommended);
        assert_eq!(result.approach_probs_rule.anterior, 0.0);
        assert!(result.approach_probs.circumferential > result.approach_probs.anterior);
        assert!(result.approach_probs.circumferential > 0.4);
        assert_eq!(result.second_best_approach, Approach::Circumferential);
    }

    #[test]
    fn test_mild_boundary() {
        let at = run(RawPatientRecord::new().with(Field::BaselineMjoa, 15.5));
        assert_eq!(at.input.severity(), Severity::Mild);
        let below = run(RawPatientRecord::new().with(Field::BaselineMjoa, 15.49));
        assert_eq!(below.input.severity(), Severity::Moderate);
    }

    #[test]
    fn test_rule_variant_surfaces_rule_distribution() {
        let config = EngineConfig {
            approach_variant: ApproachVariant::Rule,
            ..EngineConfig::default()
        };
        let raw = RawPatientRecord::new().with(Field::LevelsOperated, 2);
        let result = evaluate(&raw, &config).expect("valid record");
        assert_eq!(result.approach_probs, result.approach_probs_rule);
        // Rule (0.6, 0.3, 0.1): gap 0.3.
        assert_eq!(result.uncertainty_level, UncertaintyLevel::Low);
    }

    #[test]
    fn test_invalid_record_rejected() {
        let raw = RawPatientRecord::new().with(Field::BaselineMjoa, 25.0);
        let errors = evaluate(&raw, &EngineConfig::default()).expect_err("Should reject");
        assert_eq!(errors.fields(), vec![Field::BaselineMjoa]);
    }

    #[test]
    fn test_result_json_uses_canonical_names() {
        let result = run(RawPatientRecord::new());
        let json = serde_json::to_value(&result).expect("serialize");
        for key in [
            "riskScore",
            "benefitScore",
            "pSurgeryRule",
            "pSurgeryScored",
            "pSurgeryCombined",
            "surgeryRecommended",
            "recommendationLabel",
            "approachProbsRule",
            "approachProbsScored",
            "approachProbs",
            "bestApproach",
            "secondBestApproachProb",
            "uncertaintyLevel",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["input"]["baselineMJOA"], 13.0);
        assert_eq!(json["input"]["severity"], "moderate");
        assert_eq!(json["input"]["canalOccupyingRatio"], "<50%");
        assert_eq!(json["bestApproach"], "anterior");
    }

    #[test]
    fn test_clamp01() {
        assert_eq!(clamp01(-0.5), 0.0);
        assert_eq!(clamp01(1.5), 1.0);
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(0.25), 0.25);
    }
}

#[cfg(test)]
mod proptest_tests {
    use super::*;
    use crate::domain::{Approach, Field, RecommendationLabel, Severity};
    use proptest::prelude::*;

    fn raw_record() -> impl Strategy<Value = RawPatientRecord> {
        (
            (18u32..=100, any::<bool>(), any::<bool>(), 0.0..=480.0f64, 0.0..=18.0f64),
            (0u32..=7, any::<bool>(), prop_oneof![Just("<50%"), Just("50-60%"), Just(">60%")]),
            (prop_oneof![Just("none"), Just("focal"), Just("multilevel")], any::<bool>(), any::<bool>()),
            (any::<bool>(), 0.0..=100.0f64, 0.0..=100.0f64, 0.0..=100.0f64),
        )
            .prop_map(
                |(
                    (age, female, smoker, duration, mjoa),
                    (levels, opll, canal),
                    (t2, t1, gait),
                    (psych, ndi, pcs, mcs),
                )| {
                    RawPatientRecord::new()
                        .with(Field::Age, age)
                        .with(Field::Sex, if female { "F" } else { "M" })
                        .with(Field::Smoker, smoker)
                        .with(Field::SymptomDurationMonths, duration)
                        .with(Field::BaselineMjoa, mjoa)
                        .with(Field::LevelsOperated, levels)
                        .with(Field::Opll, opll)
                        .with(Field::CanalOccupyingRatio, canal)
                        .with(Field::T2Signal, t2)
                        .with(Field::T1Hypointensity, t1)
                        .with(Field::GaitImpairment, gait)
                        .with(Field::PsychDisorder, psych)
                        .with(Field::BaselineNdi, ndi)
                        .with(Field::BaselineSf36Pcs, pcs)
                        .with(Field::BaselineSf36Mcs, mcs)
                },
            )
    }

    proptest! {
        /// The surfaced distribution is a distribution iff surgery is recommended.
        #[test]
        fn approach_probs_well_formed(raw in raw_record()) {
            let result = evaluate(&raw, &EngineConfig::default()).expect("valid record");
            if result.surgery_recommended {
                prop_assert!(result.approach_probs.is_distribution(1e-9), "{:?}", result.approach_probs);
                prop_assert!(result.approach_probs_rule.is_distribution(1e-9));
                prop_assert!(result.approach_probs_scored.is_distribution(1e-9));
                prop_assert_ne!(result.best_approach, Approach::None);
                prop_assert_ne!(result.best_approach, result.second_best_approach);
            } else {
                prop_assert!(result.approach_probs.is_zero());
                prop_assert_eq!(result.best_approach, Approach::None);
            }
        }

        /// Probabilities and scores stay in range and never go NaN.
        #[test]
        fn probabilities_bounded(raw in raw_record()) {
            let result = evaluate(&raw, &EngineConfig::default()).expect("valid record");
            for p in [result.p_surgery_rule, result.p_surgery_scored, result.p_surgery_combined] {
                prop_assert!((0.0..=1.0).contains(&p), "{}", p);
            }
            prop_assert!(result.risk_score <= 100);
            prop_assert!(result.benefit_score <= 100);
            prop_assert!(!result.second_best_approach_prob.is_nan());
        }

        /// Only mild patients are ever routed away from surgery.
        #[test]
        fn non_operative_only_when_mild(raw in raw_record()) {
            let result = evaluate(&raw, &EngineConfig::default()).expect("valid record");
            if result.recommendation_label == RecommendationLabel::NonOperativeTrial {
                prop_assert_eq!(result.input.severity(), Severity::Mild);
                prop_assert!(result.p_surgery_combined < 0.35);
            }
            prop_assert_eq!(result.surgery_recommended, result.recommendation_label.is_surgical());
        }

        /// Higher mJOA never yields a more severe category.
        #[test]
        fn severity_monotone_in_mjoa(a in 0.0..=18.0f64, b in 0.0..=18.0f64) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            let threshold = EngineConfig::default().mild_mjoa_threshold;
            prop_assert!(Severity::from_mjoa(high, threshold) <= Severity::from_mjoa(low, threshold));
        }

        /// Same input, bit-identical output.
        #[test]
        fn engine_is_idempotent(raw in raw_record()) {
            let config = EngineConfig::default();
            let first = evaluate(&raw, &config).expect("valid record");
            let second = evaluate(&raw, &config).expect("valid record");
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(
                serde_json::to_string(&first).expect("serialize"),
                serde_json::to_string(&second).expect("serialize")
            );
        }
    }
}
