//! Recommendation result types.
//!
//! Represents the output of the surgical decision engine.

use serde::{Deserialize, Serialize, Serializer};

use super::patient::PatientRecord;

/// Surgical access strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Approach {
    Anterior,
    Posterior,
    Circumferential,
    /// No approach: surgery is not recommended.
    None,
}

impl Approach {
    /// Surgical approaches in tie-break priority order.
    pub const SURGICAL: [Approach; 3] = [
        Approach::Anterior,
        Approach::Posterior,
        Approach::Circumferential,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anterior => "anterior",
            Self::Posterior => "posterior",
            Self::Circumferential => "circumferential",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for Approach {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Probability mass over the three surgical approaches.
///
/// Either a distribution (all entries non-negative, summing to 1) or the
/// all-zero sentinel meaning "approach undefined".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ApproachProbs {
    pub anterior: f64,
    pub posterior: f64,
    pub circumferential: f64,
}

impl ApproachProbs {
    /// The "approach undefined" sentinel.
    pub const ZERO: Self = Self {
        anterior: 0.0,
        posterior: 0.0,
        circumferential: 0.0,
    };

    /// Floor negative weights at zero and rescale to sum to one.
    ///
    /// Returns [`ApproachProbs::ZERO`] when nothing positive (or finite) is left
    /// to normalize, so a NaN can never escape.
    #[must_use]
    pub fn normalized(anterior: f64, posterior: f64, circumferential: f64) -> Self {
        // f64::max maps NaN to the other operand.
        let a = anterior.max(0.0);
        let p = posterior.max(0.0);
        let c = circumferential.max(0.0);
        let total = a + p + c;
        if !total.is_finite() || total <= 0.0 {
            return Self::ZERO;
        }
        Self {
            anterior: a / total,
            posterior: p / total,
            circumferential: c / total,
        }
    }

    #[must_use]
    pub fn get(&self, approach: Approach) -> f64 {
        match approach {
            Approach::Anterior => self.anterior,
            Approach::Posterior => self.posterior,
            Approach::Circumferential => self.circumferential,
            Approach::None => 0.0,
        }
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.anterior + self.posterior + self.circumferential
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.anterior == 0.0 && self.posterior == 0.0 && self.circumferential == 0.0
    }

    /// True if every entry is non-negative and the entries sum to 1 within `tolerance`.
    #[must_use]
    pub fn is_distribution(&self, tolerance: f64) -> bool {
        Approach::SURGICAL.iter().all(|a| self.get(*a) >= 0.0) && (self.sum() - 1.0).abs() <= tolerance
    }

    /// Approaches by descending probability; ties keep the
    /// anterior > posterior > circumferential priority order.
    #[must_use]
    pub fn ranked(&self) -> [(Approach, f64); 3] {
        let mut ranked = Approach::SURGICAL.map(|a| (a, self.get(a)));
        // Stable sort, so equal probabilities stay in priority order.
        ranked.sort_by(|x, y| y.1.total_cmp(&x.1));
        ranked
    }
}

/// Which approach distribution is surfaced as the canonical `approachProbs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApproachVariant {
    Rule,
    Scored,
    #[default]
    Final,
}

impl ApproachVariant {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Scored => "scored",
            Self::Final => "final",
        }
    }
}

/// Qualitative confidence in the favored approach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UncertaintyLevel {
    Low,
    Moderate,
    High,
}

impl UncertaintyLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for UncertaintyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete recommendation shown to the clinician.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecommendationLabel {
    NonOperativeTrial,
    ConsiderSurgery,
    SurgeryRecommended,
}

impl RecommendationLabel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonOperativeTrial => "Non-operative trial reasonable with close follow-up",
            Self::ConsiderSurgery => "Consider surgery / surgery likely beneficial",
            Self::SurgeryRecommended => "Surgery recommended",
        }
    }

    /// Whether this label routes the patient to surgery.
    #[must_use]
    pub fn is_surgical(&self) -> bool {
        !matches!(self, Self::NonOperativeTrial)
    }
}

impl std::fmt::Display for RecommendationLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RecommendationLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One fired scoring rule and its signed effect on the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contribution {
    pub factor: &'static str,
    pub delta: i32,
}

/// Named adjustment applied to the rule-based approach distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproachAdjustment {
    /// Short, soft-disc disease amenable to an anterior procedure.
    ShortSegmentAnterior,
    /// Four or more levels, or multilevel cord signal.
    MultilevelDisease,
    /// OPLL with more than 60% canal occupancy.
    OpllHighOccupancy,
    /// Severe myelopathy over four or more levels.
    SevereMultilevel,
}

impl ApproachAdjustment {
    pub const ALL: [ApproachAdjustment; 4] = [
        ApproachAdjustment::ShortSegmentAnterior,
        ApproachAdjustment::MultilevelDisease,
        ApproachAdjustment::OpllHighOccupancy,
        ApproachAdjustment::SevereMultilevel,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortSegmentAnterior => "short_segment_anterior",
            Self::MultilevelDisease => "multilevel_disease",
            Self::OpllHighOccupancy => "opll_high_occupancy",
            Self::SevereMultilevel => "severe_multilevel",
        }
    }
}

/// Complete engine output for one patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResult {
    /// The normalized input the result was computed from
    pub input: PatientRecord,

    /// Risk of deterioration without surgery (0-100)
    pub risk_score: u8,

    /// Expected benefit from surgery (0-100)
    pub benefit_score: u8,

    pub risk_factors: Vec<Contribution>,
    pub benefit_factors: Vec<Contribution>,

    pub p_surgery_rule: f64,
    pub p_surgery_scored: f64,
    pub p_surgery_combined: f64,

    pub surgery_recommended: bool,
    pub recommendation_label: RecommendationLabel,

    pub approach_probs_rule: ApproachProbs,
    pub approach_probs_scored: ApproachProbs,

    /// The surfaced distribution, selected by `approach_variant`
    pub approach_probs: ApproachProbs,
    pub approach_variant: ApproachVariant,
    pub approach_adjustments: Vec<ApproachAdjustment>,

    pub best_approach: Approach,
    pub second_best_approach: Approach,
    pub second_best_approach_prob: f64,
    pub uncertainty_level: UncertaintyLevel,
}

/// Column names of [`RecommendationResult::flat_row`].
pub const FLAT_COLUMNS: [&str; 31] = [
    "age",
    "sex",
    "smoker",
    "symptomDurationMonths",
    "baselineMJOA",
    "severity",
    "levelsOperated",
    "opll",
    "canalOccupyingRatio",
    "t2Signal",
    "t1Hypointensity",
    "gaitImpairment",
    "psychDisorder",
    "baselineNDI",
    "baselineSF36PCS",
    "baselineSF36MCS",
    "riskScore",
    "benefitScore",
    "pSurgeryRule",
    "pSurgeryScored",
    "pSurgeryCombined",
    "surgeryRecommended",
    "recommendationLabel",
    "approachVariant",
    "probAnterior",
    "probPosterior",
    "probCircumferential",
    "bestApproach",
    "secondBestApproach",
    "secondBestApproachProb",
    "uncertaintyLevel",
];

fn prob(p: f64) -> String {
    format!("{p:.4}")
}

impl RecommendationResult {
    /// Flatten into one text cell per [`FLAT_COLUMNS`] entry, for tabular export.
    #[must_use]
    pub fn flat_row(&self) -> [String; 31] {
        let p = &self.input;
        [
            p.age.to_string(),
            p.sex.as_str().to_string(),
            p.smoker.to_string(),
            p.symptom_duration_months.to_string(),
            p.baseline_mjoa.to_string(),
            p.severity.as_str().to_string(),
            p.levels_operated.to_string(),
            p.opll.to_string(),
            p.canal_occupying_ratio.as_str().to_string(),
            p.t2_signal.as_str().to_string(),
            p.t1_hypointensity.to_string(),
            p.gait_impairment.to_string(),
            p.psych_disorder.to_string(),
            p.baseline_ndi.to_string(),
            p.baseline_sf36_pcs.to_string(),
            p.baseline_sf36_mcs.to_string(),
            self.risk_score.to_string(),
            self.benefit_score.to_string(),
            prob(self.p_surgery_rule),
            prob(self.p_surgery_scored),
            prob(self.p_surgery_combined),
            self.surgery_recommended.to_string(),
            self.recommendation_label.as_str().to_string(),
            self.approach_variant.as_str().to_string(),
            prob(self.approach_probs.anterior),
            prob(self.approach_probs.posterior),
            prob(self.approach_probs.circumferential),
            self.best_approach.as_str().to_string(),
            self.second_best_approach.as_str().to_string(),
            prob(self.second_best_approach_prob),
            self.uncertainty_level.as_str().to_string(),
        ]
    }
}
