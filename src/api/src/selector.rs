//! Model variant selection.
//!
//! Four models were trained, differing only in which categorical feature
//! groups they saw. The variant is a pure function of which of situation and
//! shot type the caller supplied.

use std::fmt;

/// Fixed xG for a penalty (historical conversion rate).
pub const PENALTY_XG: f64 = 0.76;
/// Penalty spot as a normalised coordinate.
pub const PENALTY_SPOT: (f64, f64) = (0.895, 0.5);
/// Feature list reported for the penalty constant.
pub const PENALTY_FEATURES: [&str; 1] = ["is_Penalty"];
pub const PENALTY_MODEL_NAME: &str = "penalty_default";

/// A trained model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    BasicModel,
    SituationModel,
    ShottypeModel,
    AdvancedModel,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 4] = [
        ModelVariant::BasicModel,
        ModelVariant::SituationModel,
        ModelVariant::ShottypeModel,
        ModelVariant::AdvancedModel,
    ];

    /// Directory name of the variant's artifacts.
    pub fn name(&self) -> &'static str {
        match self {
            ModelVariant::BasicModel => "basic_model",
            ModelVariant::SituationModel => "situation_model",
            ModelVariant::ShottypeModel => "shottype_model",
            ModelVariant::AdvancedModel => "advanced_model",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == s)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What produced a prediction: a trained variant or the penalty constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    Trained(ModelVariant),
    PenaltyDefault,
}

impl ModelChoice {
    pub fn name(&self) -> &'static str {
        match self {
            ModelChoice::Trained(v) => v.name(),
            ModelChoice::PenaltyDefault => PENALTY_MODEL_NAME,
        }
    }
}

/// Pick the variant from which categorical inputs are present.
pub fn select(situation_present: bool, shot_type_present: bool) -> ModelVariant {
    match (situation_present, shot_type_present) {
        (false, false) => ModelVariant::BasicModel,
        (false, true) => ModelVariant::ShottypeModel,
        (true, false) => ModelVariant::SituationModel,
        (true, true) => ModelVariant::AdvancedModel,
    }
}
