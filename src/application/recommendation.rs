//! Recommendation service: single-patient assessment.

use crate::config::EngineConfig;
use crate::domain::{PatientRecord, RawPatientRecord, RecommendationResult, ValidationErrors};
use crate::engine;
use crate::MyeloError;

/// Runs the engine with a fixed, validated configuration.
#[derive(Debug, Clone)]
pub struct RecommendationService {
    config: EngineConfig,
}

impl RecommendationService {
    /// Create a service.
    ///
    /// # Errors
    /// Returns `MyeloError::Config` if the configuration is invalid.
    pub fn new(config: EngineConfig) -> Result<Self, MyeloError> {
        config.validate()?;
        tracing::debug!(
            mild_threshold = config.mild_mjoa_threshold,
            variant = config.approach_variant.as_str(),
            "Recommendation service ready"
        );
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize and assess a raw record.
    ///
    /// # Errors
    /// Returns every field-level validation error of the record.
    pub fn assess(&self, raw: &RawPatientRecord) -> Result<RecommendationResult, ValidationErrors> {
        match engine::evaluate(raw, &self.config) {
            Ok(result) => {
                trace_result(&result);
                Ok(result)
            }
            Err(errors) => {
                tracing::debug!(fields = ?errors.fields(), "Patient record rejected");
                Err(errors)
            }
        }
    }

    /// Assess an already-normalized record.
    #[must_use]
    pub fn assess_record(&self, patient: &PatientRecord) -> RecommendationResult {
        let result = engine::recommend(patient, &self.config);
        trace_result(&result);
        result
    }
}

fn trace_result(result: &RecommendationResult) {
    tracing::debug!(
        severity = result.input.severity().as_str(),
        label = result.recommendation_label.as_str(),
        best = result.best_approach.as_str(),
        uncertainty = result.uncertainty_level.as_str(),
        "Assessment complete"
    );
}
