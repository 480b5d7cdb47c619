//! Risk score interpretation
//!
//! Maps the fused risk score returned by the inference service onto the
//! discrete categories shown to the user. Pure functions only: the same score
//! always yields the same result.
//!
//! The three per-modality labels are all derived from the aggregate score with
//! the same thresholds. The inference service does not expose per-modality
//! sub-scores.

use serde::{Deserialize, Serialize};

/// Scores below this value are low risk
pub const LOW_RISK_THRESHOLD: f64 = 0.3;

/// Scores at or above this value are high risk
pub const HIGH_RISK_THRESHOLD: f64 = 0.6;

/// Discrete risk category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// Classify a risk score
    ///
    /// `< 0.3` is Low, `< 0.6` is Moderate, anything else is High.
    pub fn from_score(score: f64) -> Self {
        if score < LOW_RISK_THRESHOLD {
            RiskLevel::Low
        } else if score < HIGH_RISK_THRESHOLD {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }

    /// Overall label, e.g. "Low Risk"
    pub fn class_label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Moderate => "Moderate Risk",
            RiskLevel::High => "High Risk",
        }
    }

    /// Label used for each sub-analysis (motor, speech, facial)
    pub fn modality_label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Normal",
            RiskLevel::Moderate => "Mild Irregularity",
            RiskLevel::High => "Irregular",
        }
    }
}

/// Interpreted assessment outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    /// Fused risk score in [0, 1]
    pub risk_score: f64,
    pub level: RiskLevel,
    /// Overall class label (server-provided when available)
    pub risk_class: String,
    pub motor_control: String,
    pub speech_pattern: String,
    pub facial_expression: String,
}

impl AssessmentResult {
    /// Risk score as a whole percentage, e.g. "15%"
    pub fn display_percent(&self) -> String {
        format!("{}%", (self.risk_score * 100.0).round() as i64)
    }
}

/// Interpret a risk score with the fixed thresholds
///
/// Scores outside [0, 1] are clamped first.
///
/// # Examples
///
/// ```
/// use ns_common::risk::interpret;
///
/// let result = interpret(0.15);
/// assert_eq!(result.risk_class, "Low Risk");
/// assert_eq!(result.motor_control, "Normal");
/// assert_eq!(result.display_percent(), "15%");
/// ```
pub fn interpret(risk_score: f64) -> AssessmentResult {
    interpret_with_class(risk_score, None)
}

/// Interpret a risk score, preferring the class label reported by the server
///
/// A missing or blank server label falls back to the threshold label.
pub fn interpret_with_class(risk_score: f64, risk_class: Option<&str>) -> AssessmentResult {
    let risk_score = risk_score.clamp(0.0, 1.0);
    let level = RiskLevel::from_score(risk_score);
    let modality = level.modality_label().to_string();

    let risk_class = match risk_class.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => level.class_label().to_string(),
    };

    AssessmentResult {
        risk_score,
        level,
        risk_class,
        motor_control: modality.clone(),
        speech_pattern: modality.clone(),
        facial_expression: modality,
    }
}
