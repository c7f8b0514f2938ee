//! Request and response types for the xG API.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{XgError, XgResult};

/// Phase of play a shot originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Situation {
    OpenPlay,
    SetPiece,
    DirectFreekick,
    FromCorner,
    Penalty,
}

impl Situation {
    pub const ALL: [Situation; 5] = [
        Situation::OpenPlay,
        Situation::SetPiece,
        Situation::DirectFreekick,
        Situation::FromCorner,
        Situation::Penalty,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Situation::OpenPlay => "OpenPlay",
            Situation::SetPiece => "SetPiece",
            Situation::DirectFreekick => "DirectFreekick",
            Situation::FromCorner => "FromCorner",
            Situation::Penalty => "Penalty",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == s)
    }

    /// Parse an optional raw JSON field. Absent and `null` both mean "any".
    pub fn from_json(value: Option<&Value>) -> XgResult<Option<Self>> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Self::from_name(s)
                .map(Some)
                .ok_or_else(|| XgError::InvalidSituation(s.clone())),
            Some(other) => Err(XgError::InvalidSituation(other.to_string())),
        }
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Body part used to take a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ShotType {
    Head,
    RightFoot,
    LeftFoot,
    OtherBodyPart,
}

impl ShotType {
    pub const ALL: [ShotType; 4] = [
        ShotType::Head,
        ShotType::RightFoot,
        ShotType::LeftFoot,
        ShotType::OtherBodyPart,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ShotType::Head => "Head",
            ShotType::RightFoot => "RightFoot",
            ShotType::LeftFoot => "LeftFoot",
            ShotType::OtherBodyPart => "OtherBodyPart",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.name() == s)
    }

    pub fn from_json(value: Option<&Value>) -> XgResult<Option<Self>> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Self::from_name(s)
                .map(Some)
                .ok_or_else(|| XgError::InvalidShotType(s.clone())),
            Some(other) => Err(XgError::InvalidShotType(other.to_string())),
        }
    }
}

impl fmt::Display for ShotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw shot as received from a client.
///
/// Fields stay as loose JSON so each malformed shape maps onto a precise
/// [`XgError`] instead of a generic deserialization failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShotInput {
    #[serde(default)]
    pub x: Option<Value>,
    #[serde(default)]
    pub y: Option<Value>,
    #[serde(default)]
    pub situation: Option<Value>,
    #[serde(default)]
    pub shot_type: Option<Value>,
    #[serde(default)]
    pub normalisation: Option<Value>,
}

/// Inputs echoed back with a prediction (coordinates after normalisation).
#[derive(Debug, Clone, Serialize)]
pub struct EchoedInputs {
    pub x: f64,
    pub y: f64,
    pub situation: Option<Situation>,
    pub shot_type: Option<ShotType>,
    pub normalisation: Value,
}

/// Prediction endpoint response
#[derive(Debug, Clone, Serialize)]
pub struct PredictResponse {
    #[serde(rename = "xG")]
    pub xg: f64,
    pub inputs: EchoedInputs,
    pub chosen_model: String,
    pub chosen_model_features: Vec<String>,
}

/// Query parameters of the heatmap grid endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GridQuery {
    pub situation: Option<String>,
    pub shot_type: Option<String>,
    pub max_length: Option<f64>,
    pub max_width: Option<f64>,
}

/// Axis coordinates shared by every heatmap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDefinition {
    pub x_coords: Vec<f64>,
    pub y_coords: Vec<f64>,
}

/// Heatmap grid endpoint response
#[derive(Debug, Serialize)]
pub struct GridResponse {
    pub grid_definition: GridDefinition,
    pub heatmap: Vec<Vec<f64>>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// One loaded model variant
#[derive(Debug, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub kind: String,
    pub num_features: usize,
    pub feature_names: Vec<String>,
}

/// Model info response
#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub models_dir: String,
    pub models: Vec<ModelSummary>,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
