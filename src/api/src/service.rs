//! Prediction pipeline.
//!
//! normalise -> select variant -> build features -> infer. Penalties skip the
//! learned pipeline entirely and return a fixed value.

use serde_json::Value;

use crate::error::{XgError, XgResult};
use crate::features;
use crate::pitch::{self, NormalizedCoordinate};
use crate::registry::SharedRegistry;
use crate::selector::{self, ModelChoice, PENALTY_FEATURES, PENALTY_SPOT, PENALTY_XG};
use crate::types::{EchoedInputs, PredictResponse, ShotInput, ShotType, Situation};

/// Result of one prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    /// Goal probability rounded to 2 decimals.
    pub xg: f64,
    pub coordinate: NormalizedCoordinate,
    pub situation: Option<Situation>,
    pub shot_type: Option<ShotType>,
    pub choice: ModelChoice,
    pub features: Vec<String>,
}

impl PredictionOutcome {
    fn penalty(shot_type: Option<ShotType>) -> Self {
        Self {
            xg: PENALTY_XG,
            coordinate: NormalizedCoordinate {
                x: PENALTY_SPOT.0,
                y: PENALTY_SPOT.1,
            },
            situation: Some(Situation::Penalty),
            shot_type,
            choice: ModelChoice::PenaltyDefault,
            features: PENALTY_FEATURES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Wire response, echoing the caller's normalisation object.
    pub fn into_response(self, normalisation: Value) -> PredictResponse {
        PredictResponse {
            xg: self.xg,
            inputs: EchoedInputs {
                x: self.coordinate.x,
                y: self.coordinate.y,
                situation: self.situation,
                shot_type: self.shot_type,
                normalisation,
            },
            chosen_model: self.choice.name().to_string(),
            chosen_model_features: self.features,
        }
    }
}

/// Orchestrates a prediction against a shared, read-only registry.
#[derive(Clone)]
pub struct PredictionService {
    registry: SharedRegistry,
}

impl PredictionService {
    pub fn new(registry: SharedRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    /// Full pipeline for one raw shot.
    pub fn predict(&self, input: &ShotInput) -> XgResult<PredictionOutcome> {
        let situation = Situation::from_json(input.situation.as_ref())?;
        let shot_type = ShotType::from_json(input.shot_type.as_ref())?;

        if situation == Some(Situation::Penalty) {
            return Ok(PredictionOutcome::penalty(shot_type));
        }

        let coordinate = pitch::normalize(
            input.x.as_ref(),
            input.y.as_ref(),
            input.normalisation.as_ref(),
        )?;

        let variant = selector::select(situation.is_some(), shot_type.is_some());
        let entry = self.registry.get(variant.name())?;
        let prob = self.predict_point(coordinate, situation, shot_type)?;

        Ok(PredictionOutcome {
            xg: round_to(prob, 2),
            coordinate,
            situation,
            shot_type,
            choice: ModelChoice::Trained(variant),
            features: entry.schema.names().to_vec(),
        })
    }

    /// Unrounded goal probability for an already normalised point.
    pub fn predict_point(
        &self,
        coordinate: NormalizedCoordinate,
        situation: Option<Situation>,
        shot_type: Option<ShotType>,
    ) -> XgResult<f64> {
        if situation == Some(Situation::Penalty) {
            return Ok(PENALTY_XG);
        }

        let variant = selector::select(situation.is_some(), shot_type.is_some());
        let entry = self.registry.get(variant.name())?;
        let row = features::build(coordinate, situation, shot_type, &entry.schema);
        let probs = entry
            .model
            .predict_proba(row.into_matrix())
            .map_err(|e| XgError::Inference(format!("{:#}", e)))?;
        let prob = probs
            .first()
            .copied()
            .ok_or_else(|| XgError::Inference("model returned no output".into()))?;
        check_probability(prob)
    }

    /// Unrounded goal probabilities for many points sharing one context,
    /// scored in a single model call.
    pub fn predict_batch(
        &self,
        coordinates: &[NormalizedCoordinate],
        situation: Option<Situation>,
        shot_type: Option<ShotType>,
    ) -> XgResult<Vec<f64>> {
        if situation == Some(Situation::Penalty) {
            return Ok(vec![PENALTY_XG; coordinates.len()]);
        }
        if coordinates.is_empty() {
            return Ok(Vec::new());
        }

        let variant = selector::select(situation.is_some(), shot_type.is_some());
        let entry = self.registry.get(variant.name())?;
        let matrix = features::build_matrix(coordinates, situation, shot_type, &entry.schema);

        let probs = entry
            .model
            .predict_proba(matrix)
            .map_err(|e| XgError::Inference(format!("{:#}", e)))?;
        if probs.len() != coordinates.len() {
            return Err(XgError::Inference(format!(
                "model returned {} probabilities for {} rows",
                probs.len(),
                coordinates.len()
            )));
        }
        probs.into_iter().map(check_probability).collect()
    }
}

fn check_probability(p: f64) -> XgResult<f64> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(XgError::Inference(format!("probability {} outside [0, 1]", p)))
    }
}

/// Round to `decimals` places, ties to even.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use crate::model::XgModel;
    use crate::registry::{ModelEntry, ModelRegistry};
    use crate::selector::ModelVariant;
    use anyhow::Result;
    use ndarray::Array2;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Goal probability falls linearly with the first feature's distance
    /// from the goal line; counts calls.
    pub(crate) struct StubModel {
        pub calls: Arc<AtomicUsize>,
    }

    impl XgModel for StubModel {
        fn predict_proba(&self, features: Array2<f32>) -> Result<Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(features
                .rows()
                .into_iter()
                .map(|row| (row[0] as f64 * 0.5).clamp(0.0, 1.0))
                .collect())
        }

        fn kind(&self) -> &'static str {
            "stub"
        }
    }

    struct BrokenModel;

    impl XgModel for BrokenModel {
        fn predict_proba(&self, features: Array2<f32>) -> Result<Vec<f64>> {
            Ok(vec![1.5; features.nrows()])
        }

        fn kind(&self) -> &'static str {
            "broken"
        }
    }

    pub(crate) fn schema_for(variant: ModelVariant) -> FeatureSchema {
        let mut names = vec!["X", "Y", "distance_to_goal", "angle_to_goal"];
        let situations = [
            "situation_DirectFreekick",
            "situation_FromCorner",
            "situation_OpenPlay",
            "situation_SetPiece",
        ];
        let shot_types = [
            "shotType_Head",
            "shotType_LeftFoot",
            "shotType_OtherBodyPart",
            "shotType_RightFoot",
        ];
        match variant {
            ModelVariant::BasicModel => {}
            ModelVariant::SituationModel => names.extend(situations),
            ModelVariant::ShottypeModel => names.extend(shot_types),
            ModelVariant::AdvancedModel => {
                names.extend(situations);
                names.extend(shot_types);
                names.extend(["interaction_OpenPlay_Head", "interaction_SetPiece_RightFoot"]);
            }
        }
        FeatureSchema::new(names.into_iter().map(String::from).collect()).unwrap()
    }

    pub(crate) fn stub_registry(variants: &[ModelVariant], calls: Arc<AtomicUsize>) -> SharedRegistry {
        Arc::new(ModelRegistry::from_entries(variants.iter().map(|v| {
            (
                v.name().to_string(),
                ModelEntry {
                    model: Box::new(StubModel {
                        calls: calls.clone(),
                    }),
                    schema: schema_for(*v),
                },
            )
        })))
    }

    fn service(calls: Arc<AtomicUsize>) -> PredictionService {
        PredictionService::new(stub_registry(&ModelVariant::ALL, calls))
    }

    fn input(value: serde_json::Value) -> ShotInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_scenario_basic_normalised() {
        let svc = service(Arc::default());
        let out = svc
            .predict(&input(json!({
                "x": 0.5, "y": 0.3, "situation": null, "shot_type": null,
                "normalisation": {"is_normalised": true}
            })))
            .unwrap();

        assert_eq!(out.choice, ModelChoice::Trained(ModelVariant::BasicModel));
        assert!((0.0..=1.0).contains(&out.xg));
        assert_eq!(out.xg, 0.25);
        assert_eq!(out.coordinate, NormalizedCoordinate { x: 0.5, y: 0.3 });
        assert_eq!(out.features.len(), 4);
    }

    #[test]
    fn test_scenario_basic_raw_coordinates() {
        let svc = service(Arc::default());
        let out = svc
            .predict(&input(json!({
                "x": 34.0, "y": 52.5,
                "normalisation": {"is_normalised": false, "max_pitch_width": 68.0, "max_pitch_length": 105.0}
            })))
            .unwrap();

        assert_eq!(out.choice, ModelChoice::Trained(ModelVariant::BasicModel));
        assert!((out.coordinate.x - 0.5).abs() < 1e-12);
        assert!((out.coordinate.y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_scenario_penalty_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = service(calls.clone());
        let out = svc
            .predict(&input(json!({
                "x": 0.1, "y": 0.9, "situation": "Penalty", "shot_type": "LeftFoot",
                "normalisation": {"is_normalised": true}
            })))
            .unwrap();

        assert_eq!(out.xg, 0.76);
        assert_eq!(out.coordinate, NormalizedCoordinate { x: 0.895, y: 0.5 });
        assert_eq!(out.choice.name(), "penalty_default");
        assert_eq!(out.features, vec!["is_Penalty".to_string()]);
        assert_eq!(out.shot_type, Some(ShotType::LeftFoot));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_penalty_ignores_bad_coordinates() {
        let svc = service(Arc::default());
        let out = svc
            .predict(&input(json!({"x": "far away", "situation": "Penalty"})))
            .unwrap();
        assert_eq!(out.choice, ModelChoice::PenaltyDefault);
    }

    #[test]
    fn test_scenario_out_of_range() {
        let svc = service(Arc::default());
        let err = svc
            .predict(&input(json!({
                "x": 70.0, "y": 110.0, "normalisation": {"is_normalised": true}
            })))
            .unwrap_err();
        assert_eq!(err, XgError::CoordinateOutOfRange { x: 70.0, y: 110.0 });
    }

    #[test]
    fn test_scenario_invalid_situation_checked_first() {
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = service(calls.clone());
        // Coordinates are also broken; the situation error must win.
        let err = svc
            .predict(&input(json!({"situation": "InvalidSituation"})))
            .unwrap_err();
        assert_eq!(err, XgError::InvalidSituation("InvalidSituation".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let err = svc
            .predict(&input(json!({"x": 0.5, "y": 0.5, "shot_type": "Chest"})))
            .unwrap_err();
        assert_eq!(err, XgError::InvalidShotType("Chest".into()));
    }

    #[test]
    fn test_variant_follows_presence() {
        let svc = service(Arc::default());
        let cases = [
            (json!(null), json!("Head"), ModelVariant::ShottypeModel),
            (json!("OpenPlay"), json!(null), ModelVariant::SituationModel),
            (json!("SetPiece"), json!("RightFoot"), ModelVariant::AdvancedModel),
        ];
        for (situation, shot_type, expected) in cases {
            let out = svc
                .predict(&input(json!({
                    "x": 0.8, "y": 0.4, "situation": situation, "shot_type": shot_type,
                    "normalisation": {"is_normalised": true}
                })))
                .unwrap();
            assert_eq!(out.choice, ModelChoice::Trained(expected));
            assert_eq!(out.features, schema_for(expected).names());
        }
    }

    #[test]
    fn test_missing_variant() {
        let svc = PredictionService::new(stub_registry(
            &[ModelVariant::BasicModel],
            Arc::default(),
        ));
        let err = svc
            .predict(&input(json!({
                "x": 0.8, "y": 0.4, "shot_type": "Head",
                "normalisation": {"is_normalised": true}
            })))
            .unwrap_err();
        assert_eq!(err, XgError::ModelNotAvailable("shottype_model".into()));
    }

    #[test]
    fn test_out_of_range_probability_is_rejected() {
        let registry = Arc::new(ModelRegistry::from_entries([(
            "basic_model".to_string(),
            ModelEntry {
                model: Box::new(BrokenModel),
                schema: schema_for(ModelVariant::BasicModel),
            },
        )]));
        let svc = PredictionService::new(registry);
        let err = svc
            .predict_point(NormalizedCoordinate { x: 0.5, y: 0.5 }, None, None)
            .unwrap_err();
        assert!(matches!(err, XgError::Inference(_)));
    }

    #[test]
    fn test_batch_matches_single_points() {
        let svc = service(Arc::default());
        let points = [
            NormalizedCoordinate { x: 0.2, y: 0.1 },
            NormalizedCoordinate { x: 0.9, y: 0.5 },
        ];
        let batch = svc
            .predict_batch(&points, Some(Situation::FromCorner), Some(ShotType::Head))
            .unwrap();
        for (p, expected) in points.iter().zip(batch) {
            let single = svc
                .predict_point(*p, Some(Situation::FromCorner), Some(ShotType::Head))
                .unwrap();
            assert_eq!(single, expected);
        }
    }

    #[test]
    fn test_penalty_batch_never_calls_model() {
        let calls = Arc::new(AtomicUsize::new(0));
        let svc = service(calls.clone());
        let points = vec![NormalizedCoordinate { x: 0.3, y: 0.3 }; 5];
        let out = svc
            .predict_batch(&points, Some(Situation::Penalty), None)
            .unwrap();
        assert_eq!(out, vec![0.76; 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_response_shape() {
        let svc = service(Arc::default());
        let out = svc
            .predict(&input(json!({
                "x": 0.6, "y": 0.4, "situation": "OpenPlay",
                "normalisation": {"is_normalised": true}
            })))
            .unwrap();
        let resp = out.into_response(json!({"is_normalised": true}));
        assert_eq!(resp.chosen_model, "situation_model");
        assert_eq!(resp.inputs.situation, Some(Situation::OpenPlay));
        assert_eq!(resp.xg, 0.3);
    }

    #[test]
    fn test_predict_rounds_point_probability() {
        let svc = service(Arc::default());
        let shot = input(json!({
            "x": 0.37, "y": 0.2, "situation": "SetPiece",
            "normalisation": {"is_normalised": true}
        }));
        let out = svc.predict(&shot).unwrap();
        let point = svc
            .predict_point(out.coordinate, Some(Situation::SetPiece), None)
            .unwrap();

        assert_eq!(point, 0.37f32 as f64 * 0.5);
        assert_eq!(out.xg, round_to(point, 2));
        assert_eq!(out.choice, ModelChoice::Trained(ModelVariant::SituationModel));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 2), 0.12);
        assert_eq!(round_to(0.125, 4), 0.125);
        assert_eq!(round_to(0.99999, 4), 1.0);
    }

    #[test]
    fn test_round_to_breaks_ties_to_even() {
        assert_eq!(round_to(0.125, 2), 0.12);
        assert_eq!(round_to(0.375, 2), 0.38);
        assert_eq!(round_to(0.625, 2), 0.62);
        assert_eq!(round_to(0.875, 2), 0.88);
        assert_eq!(round_to(0.03125, 4), 0.0312);
    }
}
