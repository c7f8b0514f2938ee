//! Error taxonomy for the xG pipeline.
//!
//! Every variant is request-local: the caller fixes the input and resubmits.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum XgError {
    #[error("Missing x or y coordinate - coordinates must be included to create a prediction")]
    MissingCoordinate,

    #[error("x and y must be numeric values")]
    NonNumericCoordinate,

    #[error("Normalisation object must contain an 'is_normalised' key")]
    MissingNormalisationFlag,

    #[error("max_pitch_width and max_pitch_length are required to normalise coordinates")]
    MissingPitchDimensions,

    #[error("max_pitch_width and max_pitch_length must be positive numbers")]
    InvalidPitchDimensions,

    #[error(
        "Coordinates ({x}, {y}) are outside [0, 1] - set is_normalised to false or normalise the coordinates"
    )]
    CoordinateOutOfRange { x: f64, y: f64 },

    #[error(
        "Invalid situation '{0}' - valid values are: OpenPlay, SetPiece, DirectFreekick, FromCorner, Penalty"
    )]
    InvalidSituation(String),

    #[error("Invalid shot type '{0}' - valid values are: Head, RightFoot, LeftFoot, OtherBodyPart")]
    InvalidShotType(String),

    #[error("Model '{0}' is not available")]
    ModelNotAvailable(String),

    #[error("Feature schema violation: {0}")]
    SchemaViolation(String),

    #[error("Model inference failed: {0}")]
    Inference(String),
}

impl XgError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            XgError::MissingCoordinate => "MissingCoordinate",
            XgError::NonNumericCoordinate => "NonNumericCoordinate",
            XgError::MissingNormalisationFlag => "MissingNormalisationFlag",
            XgError::MissingPitchDimensions => "MissingPitchDimensions",
            XgError::InvalidPitchDimensions => "InvalidPitchDimensions",
            XgError::CoordinateOutOfRange { .. } => "CoordinateOutOfRange",
            XgError::InvalidSituation(_) => "InvalidSituation",
            XgError::InvalidShotType(_) => "InvalidShotType",
            XgError::ModelNotAvailable(_) => "ModelNotAvailable",
            XgError::SchemaViolation(_) => "SchemaViolation",
            XgError::Inference(_) => "Inference",
        }
    }

    /// True when the error is caused by the request payload.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            XgError::ModelNotAvailable(_) | XgError::SchemaViolation(_) | XgError::Inference(_)
        )
    }
}

pub type XgResult<T> = Result<T, XgError>;
