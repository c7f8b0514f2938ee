//! Pitch coordinate normalisation.
//!
//! Shot locations arrive either already normalised to [0, 1] or in pitch
//! units together with the pitch dimensions. Everything downstream works on
//! [`NormalizedCoordinate`].

use serde::Serialize;
use serde_json::Value;

use crate::error::{XgError, XgResult};

/// A shot location as a fraction of the pitch, both axes in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedCoordinate {
    pub x: f64,
    pub y: f64,
}

impl NormalizedCoordinate {
    /// Validate an already normalised pair.
    pub fn new(x: f64, y: f64) -> XgResult<Self> {
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return Err(XgError::CoordinateOutOfRange { x, y });
        }
        Ok(Self { x, y })
    }
}

/// How the incoming coordinates are expressed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalisation {
    /// Coordinates are already fractions of the pitch.
    Normalised,
    /// Coordinates are in pitch units.
    ///
    /// x is divided by `max_pitch_width` and y by `max_pitch_length`. The
    /// pairing looks transposed but existing clients depend on it.
    Raw {
        max_pitch_width: f64,
        max_pitch_length: f64,
    },
}

impl Normalisation {
    /// Parse the raw `normalisation` object of a request.
    pub fn from_json(value: Option<&Value>) -> XgResult<Self> {
        let obj = match value {
            Some(Value::Object(obj)) => obj,
            _ => return Err(XgError::MissingNormalisationFlag),
        };
        let flag = obj
            .get("is_normalised")
            .ok_or(XgError::MissingNormalisationFlag)?;

        if is_normalised(flag) {
            return Ok(Normalisation::Normalised);
        }

        let width = obj.get("max_pitch_width").filter(|v| !v.is_null());
        let length = obj.get("max_pitch_length").filter(|v| !v.is_null());
        let (width, length) = match (width, length) {
            (Some(w), Some(l)) => (w, l),
            _ => return Err(XgError::MissingPitchDimensions),
        };

        let max_pitch_width = parse_float(width).ok_or(XgError::InvalidPitchDimensions)?;
        let max_pitch_length = parse_float(length).ok_or(XgError::InvalidPitchDimensions)?;
        if max_pitch_width <= 0.0 || max_pitch_length <= 0.0 {
            return Err(XgError::InvalidPitchDimensions);
        }

        Ok(Normalisation::Raw {
            max_pitch_width,
            max_pitch_length,
        })
    }

    /// Scale a numeric pair into pitch fractions and range-check it.
    pub fn apply(&self, x: f64, y: f64) -> XgResult<NormalizedCoordinate> {
        match *self {
            Normalisation::Normalised => NormalizedCoordinate::new(x, y),
            Normalisation::Raw {
                max_pitch_width,
                max_pitch_length,
            } => NormalizedCoordinate::new(x / max_pitch_width, y / max_pitch_length),
        }
    }
}

/// Only an explicit `false` (or numeric zero) marks coordinates as raw.
fn is_normalised(flag: &Value) -> bool {
    match flag {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
        _ => true,
    }
}

/// Accept JSON numbers and numeric strings; reject anything non-finite.
pub fn parse_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Turn raw request coordinates into a validated [`NormalizedCoordinate`].
///
/// Checks run in a fixed order: presence, numeric parse, normalisation flag,
/// pitch dimensions, range.
pub fn normalize(
    x: Option<&Value>,
    y: Option<&Value>,
    normalisation: Option<&Value>,
) -> XgResult<NormalizedCoordinate> {
    let (x, y) = match (x, y) {
        (Some(x), Some(y)) if !x.is_null() && !y.is_null() => (x, y),
        _ => return Err(XgError::MissingCoordinate),
    };
    let x = parse_float(x).ok_or(XgError::NonNumericCoordinate)?;
    let y = parse_float(y).ok_or(XgError::NonNumericCoordinate)?;

    Normalisation::from_json(normalisation)?.apply(x, y)
}
