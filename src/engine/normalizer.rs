//! Input normalizer: raw record to typed `PatientRecord`.
//!
//! Absent or blank fields take documented defaults. Present values are
//! coerced to their typed form and range-checked; every failure is collected
//! so the caller sees all bad fields of a row at once.

use std::ops::RangeInclusive;

use crate::config::EngineConfig;
use crate::domain::{
    CanalRatio, Field, FieldError, PatientRecord, RawPatientRecord, RawValue, Severity, Sex,
    T2Signal, ValidationErrors, MILD_MJOA_THRESHOLD,
};

pub const DEFAULT_AGE: u32 = 60;
pub const DEFAULT_SEX: Sex = Sex::Male;
pub const DEFAULT_SYMPTOM_DURATION_MONTHS: f64 = 12.0;
pub const DEFAULT_BASELINE_MJOA: f64 = 13.0;
pub const DEFAULT_LEVELS_OPERATED: u32 = 3;
pub const DEFAULT_CANAL_RATIO: CanalRatio = CanalRatio::Below50;
pub const DEFAULT_T2_SIGNAL: T2Signal = T2Signal::None;
pub const DEFAULT_BASELINE_NDI: f64 = 30.0;
pub const DEFAULT_BASELINE_SF36_PCS: f64 = 40.0;
pub const DEFAULT_BASELINE_SF36_MCS: f64 = 45.0;

// Clinically plausible bands.
const AGE_RANGE: RangeInclusive<f64> = 18.0..=100.0;
const DURATION_RANGE: RangeInclusive<f64> = 0.0..=480.0;
const MJOA_RANGE: RangeInclusive<f64> = 0.0..=18.0;
const LEVELS_RANGE: RangeInclusive<f64> = 0.0..=7.0;
const NDI_RANGE: RangeInclusive<f64> = 0.0..=100.0;
const SF36_RANGE: RangeInclusive<f64> = 0.0..=100.0;
const PERCENT_RANGE: RangeInclusive<f64> = 0.0..=100.0;

/// Normalize and validate a raw record.
///
/// Any caller-supplied `severity` is discarded and recomputed from
/// `baselineMJOA` with `config.mild_mjoa_threshold`.
///
/// # Errors
/// Returns every malformed or out-of-range field found.
pub fn normalize(
    raw: &RawPatientRecord,
    config: &EngineConfig,
) -> Result<PatientRecord, ValidationErrors> {
    let mut reader = FieldReader {
        raw,
        errors: Vec::new(),
    };

    let age = reader.integer(Field::Age, DEFAULT_AGE, AGE_RANGE);
    let sex = reader.choice(Field::Sex, DEFAULT_SEX, Sex::parse, "M or F");
    let smoker = reader.flag(Field::Smoker);
    let symptom_duration_months = reader.number(
        Field::SymptomDurationMonths,
        DEFAULT_SYMPTOM_DURATION_MONTHS,
        DURATION_RANGE,
    );
    let baseline_mjoa = reader.number(Field::BaselineMjoa, DEFAULT_BASELINE_MJOA, MJOA_RANGE);
    let levels_operated =
        reader.integer(Field::LevelsOperated, DEFAULT_LEVELS_OPERATED, LEVELS_RANGE);
    let opll = reader.flag(Field::Opll);
    let canal_occupying_ratio = reader.canal_ratio();
    let t2_signal = reader.choice(
        Field::T2Signal,
        DEFAULT_T2_SIGNAL,
        T2Signal::parse,
        "none, focal or multilevel",
    );
    let t1_hypointensity = reader.flag(Field::T1Hypointensity);
    let gait_impairment = reader.flag(Field::GaitImpairment);
    let psych_disorder = reader.flag(Field::PsychDisorder);
    let baseline_ndi = reader.number(Field::BaselineNdi, DEFAULT_BASELINE_NDI, NDI_RANGE);
    let baseline_sf36_pcs =
        reader.number(Field::BaselineSf36Pcs, DEFAULT_BASELINE_SF36_PCS, SF36_RANGE);
    let baseline_sf36_mcs =
        reader.number(Field::BaselineSf36Mcs, DEFAULT_BASELINE_SF36_MCS, SF36_RANGE);

    if !reader.errors.is_empty() {
        return Err(ValidationErrors::new(reader.errors));
    }

    Ok(PatientRecord {
        age,
        sex,
        smoker,
        symptom_duration_months,
        baseline_mjoa,
        severity: Severity::from_mjoa(baseline_mjoa, config.mild_mjoa_threshold),
        levels_operated,
        opll,
        canal_occupying_ratio,
        t2_signal,
        t1_hypointensity,
        gait_impairment,
        psych_disorder,
        baseline_ndi,
        baseline_sf36_pcs,
        baseline_sf36_mcs,
    })
}

impl Default for PatientRecord {
    /// The all-defaults record (moderate severity at mJOA 13).
    fn default() -> Self {
        Self {
            age: DEFAULT_AGE,
            sex: DEFAULT_SEX,
            smoker: false,
            symptom_duration_months: DEFAULT_SYMPTOM_DURATION_MONTHS,
            baseline_mjoa: DEFAULT_BASELINE_MJOA,
            severity: Severity::from_mjoa(DEFAULT_BASELINE_MJOA, MILD_MJOA_THRESHOLD),
            levels_operated: DEFAULT_LEVELS_OPERATED,
            opll: false,
            canal_occupying_ratio: DEFAULT_CANAL_RATIO,
            t2_signal: DEFAULT_T2_SIGNAL,
            t1_hypointensity: false,
            gait_impairment: false,
            psych_disorder: false,
            baseline_ndi: DEFAULT_BASELINE_NDI,
            baseline_sf36_pcs: DEFAULT_BASELINE_SF36_PCS,
            baseline_sf36_mcs: DEFAULT_BASELINE_SF36_MCS,
        }
    }
}

struct FieldReader<'a> {
    raw: &'a RawPatientRecord,
    errors: Vec<FieldError>,
}

impl FieldReader<'_> {
    fn malformed(&mut self, field: Field, value: &RawValue, expected: &'static str) {
        self.errors.push(FieldError::Malformed {
            field,
            raw: value.to_string(),
            expected,
        });
    }

    fn in_range(&mut self, field: Field, value: f64, range: &RangeInclusive<f64>) -> bool {
        if range.contains(&value) {
            return true;
        }
        self.errors.push(FieldError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        });
        false
    }

    fn number(&mut self, field: Field, default: f64, range: RangeInclusive<f64>) -> f64 {
        let Some(value) = self.raw.get(field) else {
            return default;
        };
        match parse_number(value) {
            Some(x) if self.in_range(field, x, &range) => x,
            Some(_) => default,
            None => {
                self.malformed(field, value, "a number");
                default
            }
        }
    }

    fn integer(&mut self, field: Field, default: u32, range: RangeInclusive<f64>) -> u32 {
        let Some(value) = self.raw.get(field) else {
            return default;
        };
        match parse_number(value) {
            Some(x) if x.fract() != 0.0 => {
                self.malformed(field, value, "a whole number");
                default
            }
            // The range lies within u32, so the cast is exact.
            Some(x) if self.in_range(field, x, &range) => x as u32,
            Some(_) => default,
            None => {
                self.malformed(field, value, "a whole number");
                default
            }
        }
    }

    fn flag(&mut self, field: Field) -> bool {
        let Some(value) = self.raw.get(field) else {
            return false;
        };
        match parse_bool(value) {
            Some(b) => b,
            None => {
                self.malformed(field, value, "yes or no");
                false
            }
        }
    }

    fn choice<T: Copy>(
        &mut self,
        field: Field,
        default: T,
        parse: fn(&str) -> Option<T>,
        expected: &'static str,
    ) -> T {
        let Some(value) = self.raw.get(field) else {
            return default;
        };
        let parsed = match value {
            RawValue::Text(s) => parse(s),
            _ => None,
        };
        parsed.unwrap_or_else(|| {
            self.malformed(field, value, expected);
            default
        })
    }

    /// Accepts a band label or a measured percentage.
    fn canal_ratio(&mut self) -> CanalRatio {
        let field = Field::CanalOccupyingRatio;
        let Some(value) = self.raw.get(field) else {
            return DEFAULT_CANAL_RATIO;
        };
        if let RawValue::Text(s) = value {
            if let Some(band) = CanalRatio::parse_band(s) {
                return band;
            }
        }
        match parse_number(value) {
            Some(pct) if self.in_range(field, pct, &PERCENT_RANGE) => CanalRatio::from_percent(pct),
            Some(_) => DEFAULT_CANAL_RATIO,
            None => {
                self.malformed(field, value, "<50%, 50-60% or >60%");
                DEFAULT_CANAL_RATIO
            }
        }
    }
}

fn parse_number(value: &RawValue) -> Option<f64> {
    let x = match value {
        RawValue::Number(x) => *x,
        RawValue::Text(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        RawValue::Bool(_) => return None,
    };
    x.is_finite().then_some(x)
}

fn parse_bool(value: &RawValue) -> Option<bool> {
    match value {
        RawValue::Bool(b) => Some(*b),
        RawValue::Number(x) if *x == 0.0 => Some(false),
        RawValue::Number(x) if *x == 1.0 => Some(true),
        RawValue::Number(_) => None,
        RawValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Some(true),
            "false" | "f" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn test_empty_record_takes_defaults() {
        let record = normalize(&RawPatientRecord::new(), &config()).expect("Should normalize");
        assert_eq!(record.age(), 60);
        assert_eq!(record.sex(), Sex::Male);
        assert!(!record.smoker());
        assert!((record.symptom_duration_months() - 12.0).abs() < f64::EPSILON);
        assert!((record.baseline_mjoa() - 13.0).abs() < f64::EPSILON);
        assert_eq!(record.severity(), Severity::Moderate);
        assert_eq!(record.levels_operated(), 3);
        assert_eq!(record.canal_occupying_ratio(), CanalRatio::Below50);
        assert_eq!(record.t2_signal(), T2Signal::None);
        assert!((record.baseline_ndi() - 30.0).abs() < f64::EPSILON);
        assert!((record.baseline_sf36_pcs() - 40.0).abs() < f64::EPSILON);
        assert!((record.baseline_sf36_mcs() - 45.0).abs() < f64::EPSILON);
        assert_eq!(record, PatientRecord::default());
    }

    #[test]
    fn test_string_values_coerced() {
        let raw: RawPatientRecord = [
            ("age", "72"),
            ("sex", "female"),
            ("smoker", "Yes"),
            ("symptom_duration_months", "30"),
            ("baseline_mjoa", "11.5"),
            ("levels_operated", "4"),
            ("opll", "1"),
            ("canal_occupying_ratio", "62"),
            ("t2_signal", "Multi-level"),
            ("gait", "y"),
        ]
        .into_iter()
        .collect();

        let record = normalize(&raw, &config()).expect("Should normalize");
        assert_eq!(record.age(), 72);
        assert_eq!(record.sex(), Sex::Female);
        assert!(record.smoker());
        assert_eq!(record.severity(), Severity::Severe);
        assert_eq!(record.levels_operated(), 4);
        assert!(record.opll());
        assert_eq!(record.canal_occupying_ratio(), CanalRatio::Above60);
        assert_eq!(record.t2_signal(), T2Signal::Multilevel);
        assert!(record.gait_impairment());
        assert!(!record.psych_disorder());
    }

    #[test]
    fn test_supplied_severity_is_overridden() {
        let raw = RawPatientRecord::new()
            .with(Field::BaselineMjoa, 17.0)
            .with(Field::Severity, "severe");
        let record = normalize(&raw, &config()).expect("Should normalize");
        assert_eq!(record.severity(), Severity::Mild);
    }

    #[test]
    fn test_configured_threshold() {
        let raw = RawPatientRecord::new().with(Field::BaselineMjoa, 15.2);
        let canonical = normalize(&raw, &config()).expect("Should normalize");
        assert_eq!(canonical.severity(), Severity::Moderate);

        let lenient = EngineConfig {
            mild_mjoa_threshold: 15.0,
            ..EngineConfig::default()
        };
        let record = normalize(&raw, &lenient).expect("Should normalize");
        assert_eq!(record.severity(), Severity::Mild);
    }

    #[test]
    fn test_errors_collected_per_field() {
        let raw = RawPatientRecord::new()
            .with(Field::Age, 150)
            .with(Field::BaselineMjoa, 19.0)
            .with(Field::Sex, "x")
            .with(Field::LevelsOperated, 2.5)
            .with(Field::Opll, "maybe")
            .with(Field::BaselineNdi, "abc");

        let errors = normalize(&raw, &config()).expect_err("Should reject");
        assert_eq!(
            errors.fields(),
            vec![
                Field::Age,
                Field::Sex,
                Field::BaselineMjoa,
                Field::LevelsOperated,
                Field::Opll,
                Field::BaselineNdi,
            ]
        );
        assert!(matches!(
            errors.errors()[0],
            FieldError::OutOfRange { field: Field::Age, min, max, .. } if min == 18.0 && max == 100.0
        ));
    }

    #[test]
    fn test_non_finite_is_malformed() {
        let raw = RawPatientRecord::new().with(Field::BaselineSf36Pcs, f64::NAN);
        let errors = normalize(&raw, &config()).expect_err("Should reject");
        assert!(matches!(
            errors.errors()[0],
            FieldError::Malformed { field: Field::BaselineSf36Pcs, .. }
        ));
    }

    #[test]
    fn test_blank_values_are_defaults() {
        let raw: RawPatientRecord = [("age", ""), ("t2", "  "), ("opll", "")].into_iter().collect();
        let record = normalize(&raw, &config()).expect("Should normalize");
        assert_eq!(record.age(), DEFAULT_AGE);
        assert_eq!(record.t2_signal(), T2Signal::None);
        assert!(!record.opll());
    }

    #[test]
    fn test_bool_number_coercion() {
        assert_eq!(parse_bool(&RawValue::Number(1.0)), Some(true));
        assert_eq!(parse_bool(&RawValue::Number(0.0)), Some(false));
        assert_eq!(parse_bool(&RawValue::Number(2.0)), None);
        assert_eq!(parse_number(&RawValue::Text(" 55 % ".into())), Some(55.0));
        assert_eq!(parse_number(&RawValue::Bool(true)), None);
    }
}
