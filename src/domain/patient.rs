//! Patient record types for cervical myelopathy decision support.
//!
//! Two shapes of the same record exist:
//! - [`RawPatientRecord`]: what collaborators hand in. Any subset of fields,
//!   values possibly stringly typed, field names in whatever convention the
//!   caller uses.
//! - [`PatientRecord`]: fully populated and typed. It can only be produced by
//!   the normalizer, which keeps `severity` consistent with `baselineMJOA`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// mJOA at or above this value is mild myelopathy.
pub const MILD_MJOA_THRESHOLD: f64 = 15.5;

/// mJOA below this value is severe myelopathy.
pub const SEVERE_MJOA_THRESHOLD: f64 = 12.0;

/// Biological sex as recorded on the intake form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Sex {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
        }
    }

    pub(crate) fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Some(Self::Male),
            "f" | "female" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Myelopathy severity category derived from the mJOA score.
///
/// Ordered from least to most severe, so `Mild < Moderate < Severe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Classify an mJOA score.
    ///
    /// `mild_threshold` is the lowest score still considered mild; the
    /// moderate/severe cut at 12 is fixed.
    #[must_use]
    pub fn from_mjoa(mjoa: f64, mild_threshold: f64) -> Self {
        if mjoa >= mild_threshold {
            Self::Mild
        } else if mjoa >= SEVERE_MJOA_THRESHOLD {
            Self::Moderate
        } else {
            Self::Severe
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canal occupying ratio band from axial imaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanalRatio {
    #[serde(rename = "<50%")]
    Below50,
    #[serde(rename = "50-60%")]
    From50To60,
    #[serde(rename = ">60%")]
    Above60,
}

impl CanalRatio {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Below50 => "<50%",
            Self::From50To60 => "50-60%",
            Self::Above60 => ">60%",
        }
    }

    /// Bin a measured percentage into its band (50 and 60 fall in the middle band).
    #[must_use]
    pub fn from_percent(percent: f64) -> Self {
        if percent < 50.0 {
            Self::Below50
        } else if percent <= 60.0 {
            Self::From50To60
        } else {
            Self::Above60
        }
    }

    #[must_use]
    pub fn exceeds_60(&self) -> bool {
        matches!(self, Self::Above60)
    }

    pub(crate) fn parse_band(text: &str) -> Option<Self> {
        let compact: String = text
            .trim()
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == '\u{2013}' || c == '\u{2014}' { '-' } else { c })
            .collect();
        match compact.trim_end_matches('%') {
            "<50" => Some(Self::Below50),
            "50-60" => Some(Self::From50To60),
            ">60" => Some(Self::Above60),
            _ => None,
        }
    }
}

/// T2-weighted intramedullary cord signal change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum T2Signal {
    None,
    Focal,
    Multilevel,
}

impl T2Signal {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Focal => "focal",
            Self::Multilevel => "multilevel",
        }
    }

    #[must_use]
    pub fn is_present(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub(crate) fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "none" | "no" | "absent" => Some(Self::None),
            "focal" => Some(Self::Focal),
            "multilevel" | "multi-level" | "multi" | "multiple" => Some(Self::Multilevel),
            _ => None,
        }
    }
}

/// Canonical fields of the request schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Age,
    Sex,
    Smoker,
    SymptomDurationMonths,
    BaselineMjoa,
    Severity,
    LevelsOperated,
    Opll,
    CanalOccupyingRatio,
    T2Signal,
    T1Hypointensity,
    GaitImpairment,
    PsychDisorder,
    BaselineNdi,
    BaselineSf36Pcs,
    BaselineSf36Mcs,
}

impl Field {
    pub const ALL: [Field; 16] = [
        Field::Age,
        Field::Sex,
        Field::Smoker,
        Field::SymptomDurationMonths,
        Field::BaselineMjoa,
        Field::Severity,
        Field::LevelsOperated,
        Field::Opll,
        Field::CanalOccupyingRatio,
        Field::T2Signal,
        Field::T1Hypointensity,
        Field::GaitImpairment,
        Field::PsychDisorder,
        Field::BaselineNdi,
        Field::BaselineSf36Pcs,
        Field::BaselineSf36Mcs,
    ];

    /// The name this field carries in the canonical schema.
    #[must_use]
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Sex => "sex",
            Self::Smoker => "smoker",
            Self::SymptomDurationMonths => "symptomDurationMonths",
            Self::BaselineMjoa => "baselineMJOA",
            Self::Severity => "severity",
            Self::LevelsOperated => "levelsOperated",
            Self::Opll => "opll",
            Self::CanalOccupyingRatio => "canalOccupyingRatio",
            Self::T2Signal => "t2Signal",
            Self::T1Hypointensity => "t1Hypointensity",
            Self::GaitImpairment => "gaitImpairment",
            Self::PsychDisorder => "psychDisorder",
            Self::BaselineNdi => "baselineNDI",
            Self::BaselineSf36Pcs => "baselineSF36PCS",
            Self::BaselineSf36Mcs => "baselineSF36MCS",
        }
    }

    /// Resolve a caller-supplied column or key name.
    ///
    /// Matching ignores case, underscores, hyphens and whitespace, so
    /// `baseline_mJOA`, `baselineMJOA` and `baseline_mjoa` are the same field.
    #[must_use]
    pub fn from_alias(name: &str) -> Option<Self> {
        let key: String = name
            .trim_start_matches('\u{feff}')
            .chars()
            .filter(|c| !matches!(c, '_' | '-') && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        let field = match key.as_str() {
            "age" | "ageyears" => Self::Age,
            "sex" | "gender" => Self::Sex,
            "smoker" | "smoking" | "currentsmoker" => Self::Smoker,
            "symptomdurationmonths" | "symptomduration" | "durationmonths" | "duration" => {
                Self::SymptomDurationMonths
            }
            "baselinemjoa" | "mjoa" => Self::BaselineMjoa,
            "severity" => Self::Severity,
            "levelsoperated" | "levels" | "operatedlevels" | "numlevels" => Self::LevelsOperated,
            "opll" => Self::Opll,
            "canaloccupyingratio" | "canalratio" | "canal" | "cor" => Self::CanalOccupyingRatio,
            "t2signal" | "t2" | "t2cordsignal" => Self::T2Signal,
            "t1hypointensity" | "t1" => Self::T1Hypointensity,
            "gaitimpairment" | "gait" => Self::GaitImpairment,
            "psychdisorder" | "psych" | "psychiatricdisorder" => Self::PsychDisorder,
            "baselinendi" | "ndi" => Self::BaselineNdi,
            "baselinesf36pcs" | "sf36pcs" | "pcs" => Self::BaselineSf36Pcs,
            "baselinesf36mcs" | "sf36mcs" | "mcs" => Self::BaselineSf36Mcs,
            _ => return None,
        };
        Some(field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// A field value before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Blank text counts as an absent value.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(s) if s.trim().is_empty())
    }

    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(Self::Number),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            other => Some(Self::Text(other.to_string())),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for RawValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Partial, loosely typed patient record as received from a form, CSV row or
/// JSON document. Unknown field names are dropped on insertion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPatientRecord {
    values: BTreeMap<Field, RawValue>,
}

impl RawPatientRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, field: Field, value: impl Into<RawValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<RawValue>) {
        self.values.insert(field, value.into());
    }

    /// Insert a value under a caller-named key.
    ///
    /// Returns `false` (and stores nothing) when the name maps to no known field.
    pub fn insert_named(&mut self, name: &str, value: impl Into<RawValue>) -> bool {
        match Field::from_alias(name) {
            Some(field) => {
                self.set(field, value);
                true
            }
            None => false,
        }
    }

    /// The value for `field`, treating blank text as absent.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<&RawValue> {
        self.values.get(&field).filter(|v| !v.is_blank())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Build from a JSON object, ignoring unknown keys and `null` values.
    ///
    /// # Errors
    /// Returns `FieldError::Duplicate` if two keys name the same field.
    pub fn from_json_map(
        map: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, FieldError> {
        let mut record = Self::new();
        let mut keys: BTreeMap<Field, &str> = BTreeMap::new();
        for (key, value) in map {
            let (Some(field), Some(raw)) = (Field::from_alias(key), RawValue::from_json(value))
            else {
                continue;
            };
            if let Some(first) = keys.insert(field, key) {
                return Err(FieldError::Duplicate {
                    field,
                    first: first.to_string(),
                    second: key.clone(),
                });
            }
            record.set(field, raw);
        }
        Ok(record)
    }
}

impl<'de> Deserialize<'de> for RawPatientRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Self::from_json_map(&map).map_err(serde::de::Error::custom)
    }
}

impl<K, V> FromIterator<(K, V)> for RawPatientRecord
where
    K: AsRef<str>,
    V: Into<RawValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (name, value) in iter {
            record.insert_named(name.as_ref(), value);
        }
        record
    }
}

/// Fully populated, typed patient record consumed by the engine.
///
/// Construct it with [`crate::engine::normalizer::normalize`]; fields are
/// read-only so `severity` can never drift from `baseline_mjoa`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub(crate) age: u32,
    pub(crate) sex: Sex,
    pub(crate) smoker: bool,
    pub(crate) symptom_duration_months: f64,
    #[serde(rename = "baselineMJOA")]
    pub(crate) baseline_mjoa: f64,
    pub(crate) severity: Severity,
    pub(crate) levels_operated: u32,
    pub(crate) opll: bool,
    pub(crate) canal_occupying_ratio: CanalRatio,
    pub(crate) t2_signal: T2Signal,
    pub(crate) t1_hypointensity: bool,
    pub(crate) gait_impairment: bool,
    pub(crate) psych_disorder: bool,
    #[serde(rename = "baselineNDI")]
    pub(crate) baseline_ndi: f64,
    #[serde(rename = "baselineSF36PCS")]
    pub(crate) baseline_sf36_pcs: f64,
    #[serde(rename = "baselineSF36MCS")]
    pub(crate) baseline_sf36_mcs: f64,
}

impl PatientRecord {
    #[must_use]
    pub fn age(&self) -> u32 {
        self.age
    }

    #[must_use]
    pub fn sex(&self) -> Sex {
        self.sex
    }

    #[must_use]
    pub fn smoker(&self) -> bool {
        self.smoker
    }

    #[must_use]
    pub fn symptom_duration_months(&self) -> f64 {
        self.symptom_duration_months
    }

    #[must_use]
    pub fn baseline_mjoa(&self) -> f64 {
        self.baseline_mjoa
    }

    /// Severity derived from `baseline_mjoa` at normalization time.
    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn levels_operated(&self) -> u32 {
        self.levels_operated
    }

    #[must_use]
    pub fn opll(&self) -> bool {
        self.opll
    }

    #[must_use]
    pub fn canal_occupying_ratio(&self) -> CanalRatio {
        self.canal_occupying_ratio
    }

    #[must_use]
    pub fn t2_signal(&self) -> T2Signal {
        self.t2_signal
    }

    #[must_use]
    pub fn t1_hypointensity(&self) -> bool {
        self.t1_hypointensity
    }

    #[must_use]
    pub fn gait_impairment(&self) -> bool {
        self.gait_impairment
    }

    #[must_use]
    pub fn psych_disorder(&self) -> bool {
        self.psych_disorder
    }

    #[must_use]
    pub fn baseline_ndi(&self) -> f64 {
        self.baseline_ndi
    }

    #[must_use]
    pub fn baseline_sf36_pcs(&self) -> f64 {
        self.baseline_sf36_pcs
    }

    #[must_use]
    pub fn baseline_sf36_mcs(&self) -> f64 {
        self.baseline_sf36_mcs
    }
}

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("{field}: value {value} outside [{min}, {max}]")]
    OutOfRange {
        field: Field,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field}: cannot interpret {raw:?} as {expected}")]
    Malformed {
        field: Field,
        raw: String,
        expected: &'static str,
    },

    #[error("{field}: given twice, as {first:?} and {second:?}")]
    Duplicate {
        field: Field,
        first: String,
        second: String,
    },
}

impl FieldError {
    #[must_use]
    pub fn field(&self) -> Field {
        match self {
            Self::OutOfRange { field, .. }
            | Self::Malformed { field, .. }
            | Self::Duplicate { field, .. } => *field,
        }
    }
}

/// Every field error found in one record.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    #[must_use]
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self(errors)
    }

    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        self.0.iter().map(FieldError::field).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid patient record: ")?;
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
