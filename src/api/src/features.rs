//! Feature builder for xG model input.
//!
//! Each trained variant persists the ordered list of feature names it was
//! fitted on. The builder parses that list once into a [`FeatureSchema`] and
//! then projects a shot onto it, so a single code path serves all variants.

use ndarray::{Array1, Array2, Axis};
use std::collections::HashSet;

use crate::error::{XgError, XgResult};
use crate::pitch::NormalizedCoordinate;
use crate::types::{ShotType, Situation};

/// Centre of the goal mouth
pub const GOAL_CENTER: (f64, f64) = (1.0, 0.5);
/// Goalposts
pub const GOAL_POSTS: [(f64, f64); 2] = [(1.0, 0.45), (1.0, 0.55)];

/// A recognised feature column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    X,
    Y,
    DistanceToGoal,
    AngleToGoal,
    Situation(Situation),
    ShotType(ShotType),
    Interaction(Situation, ShotType),
}

impl FeatureKind {
    /// Parse a persisted column name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "X" => return Some(FeatureKind::X),
            "Y" => return Some(FeatureKind::Y),
            "distance_to_goal" => return Some(FeatureKind::DistanceToGoal),
            "angle_to_goal" => return Some(FeatureKind::AngleToGoal),
            _ => {}
        }

        if let Some(rest) = name.strip_prefix("situation_") {
            return Situation::from_name(rest).map(FeatureKind::Situation);
        }
        if let Some(rest) = name.strip_prefix("shotType_") {
            return ShotType::from_name(rest).map(FeatureKind::ShotType);
        }
        if let Some(rest) = name.strip_prefix("interaction_") {
            let (situation, shot_type) = rest.split_once('_')?;
            return Some(FeatureKind::Interaction(
                Situation::from_name(situation)?,
                ShotType::from_name(shot_type)?,
            ));
        }
        None
    }

    /// Value of this column for one shot.
    fn value(
        &self,
        coord: NormalizedCoordinate,
        situation: Option<Situation>,
        shot_type: Option<ShotType>,
    ) -> f64 {
        let flag = |hit: bool| if hit { 1.0 } else { 0.0 };
        match *self {
            FeatureKind::X => coord.x,
            FeatureKind::Y => coord.y,
            FeatureKind::DistanceToGoal => distance_to_goal(coord.x, coord.y),
            FeatureKind::AngleToGoal => angle_to_goal(coord.x, coord.y),
            FeatureKind::Situation(s) => flag(situation == Some(s)),
            FeatureKind::ShotType(t) => flag(shot_type == Some(t)),
            FeatureKind::Interaction(s, t) => {
                flag(situation == Some(s) && shot_type == Some(t))
            }
        }
    }
}

/// Validated, ordered feature list of one model variant.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
    kinds: Vec<FeatureKind>,
}

impl FeatureSchema {
    /// Build a schema, rejecting empty lists, unknown names and duplicates.
    pub fn new(names: Vec<String>) -> XgResult<Self> {
        if names.is_empty() {
            return Err(XgError::SchemaViolation("feature list is empty".into()));
        }

        let mut seen = HashSet::with_capacity(names.len());
        let mut kinds = Vec::with_capacity(names.len());
        for name in &names {
            let kind = FeatureKind::parse(name).ok_or_else(|| {
                XgError::SchemaViolation(format!("unrecognised feature '{}'", name))
            })?;
            if !seen.insert(kind) {
                return Err(XgError::SchemaViolation(format!(
                    "duplicate feature '{}'",
                    name
                )));
            }
            kinds.push(kind);
        }

        Ok(Self { names, kinds })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}

/// One model input row, ordered as its schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    #[cfg(test)]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Shape (1, n_features) for a single-row inference call.
    pub fn into_matrix(self) -> Array2<f32> {
        Array1::from(self.values).insert_axis(Axis(0))
    }
}

/// Project one shot onto a schema.
pub fn build(
    coord: NormalizedCoordinate,
    situation: Option<Situation>,
    shot_type: Option<ShotType>,
    schema: &FeatureSchema,
) -> FeatureVector {
    let values = schema
        .kinds
        .iter()
        .map(|kind| kind.value(coord, situation, shot_type) as f32)
        .collect();
    FeatureVector { values }
}

/// Build a (n_points, n_features) matrix for many shots sharing one context.
pub fn build_matrix(
    coords: &[NormalizedCoordinate],
    situation: Option<Situation>,
    shot_type: Option<ShotType>,
    schema: &FeatureSchema,
) -> Array2<f32> {
    let n_features = schema.len();
    let mut features = Array2::<f32>::zeros((coords.len(), n_features));

    for (i, coord) in coords.iter().enumerate() {
        for (j, kind) in schema.kinds.iter().enumerate() {
            features[[i, j]] = kind.value(*coord, situation, shot_type) as f32;
        }
    }

    features
}

/// Euclidean distance to the centre of the goal.
pub fn distance_to_goal(x: f64, y: f64) -> f64 {
    ((x - GOAL_CENTER.0).powi(2) + (y - GOAL_CENTER.1).powi(2)).sqrt()
}

/// Angle in radians subtended by the goalposts at the shot location.
///
/// Zero when the shot is taken exactly on a post.
pub fn angle_to_goal(x: f64, y: f64) -> f64 {
    let (v1_x, v1_y) = (GOAL_POSTS[0].0 - x, GOAL_POSTS[0].1 - y);
    let (v2_x, v2_y) = (GOAL_POSTS[1].0 - x, GOAL_POSTS[1].1 - y);

    let dot = v1_x * v2_x + v1_y * v2_y;
    let mag_v1 = (v1_x * v1_x + v1_y * v1_y).sqrt();
    let mag_v2 = (v2_x * v2_x + v2_y * v2_y).sqrt();

    if mag_v1 == 0.0 || mag_v2 == 0.0 {
        return 0.0;
    }

    (dot / (mag_v1 * mag_v2)).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    const BASE: [&str; 4] = ["X", "Y", "distance_to_goal", "angle_to_goal"];

    /// Feature lists as persisted by the training pipeline.
    fn real_schemas() -> Vec<(&'static str, Vec<String>)> {
        let situations = [
            "situation_DirectFreekick",
            "situation_FromCorner",
            "situation_OpenPlay",
            "situation_Penalty",
            "situation_SetPiece",
        ];
        let shot_types = [
            "shotType_Head",
            "shotType_LeftFoot",
            "shotType_OtherBodyPart",
            "shotType_RightFoot",
        ];
        let interactions = [
            "interaction_DirectFreekick_LeftFoot",
            "interaction_DirectFreekick_RightFoot",
            "interaction_FromCorner_Head",
            "interaction_FromCorner_LeftFoot",
            "interaction_FromCorner_OtherBodyPart",
            "interaction_FromCorner_RightFoot",
            "interaction_OpenPlay_Head",
            "interaction_OpenPlay_LeftFoot",
            "interaction_OpenPlay_OtherBodyPart",
            "interaction_OpenPlay_RightFoot",
            "interaction_Penalty_LeftFoot",
            "interaction_Penalty_RightFoot",
            "interaction_SetPiece_Head",
            "interaction_SetPiece_LeftFoot",
            "interaction_SetPiece_OtherBodyPart",
            "interaction_SetPiece_RightFoot",
        ];

        let base = names(&BASE);
        let with = |extra: &[&[&str]]| {
            let mut v = base.clone();
            for group in extra {
                v.extend(names(group));
            }
            v
        };

        vec![
            ("basic_model", base.clone()),
            ("situation_model", with(&[&situations[..]])),
            ("shottype_model", with(&[&shot_types[..]])),
            (
                "advanced_model",
                with(&[&situations[..], &shot_types[..], &interactions[..]]),
            ),
        ]
    }

    fn coord(x: f64, y: f64) -> NormalizedCoordinate {
        NormalizedCoordinate { x, y }
    }

    #[test]
    fn test_parse_feature_names() {
        assert_eq!(FeatureKind::parse("X"), Some(FeatureKind::X));
        assert_eq!(
            FeatureKind::parse("situation_FromCorner"),
            Some(FeatureKind::Situation(Situation::FromCorner))
        );
        assert_eq!(
            FeatureKind::parse("shotType_OtherBodyPart"),
            Some(FeatureKind::ShotType(ShotType::OtherBodyPart))
        );
        assert_eq!(
            FeatureKind::parse("interaction_SetPiece_Head"),
            Some(FeatureKind::Interaction(Situation::SetPiece, ShotType::Head))
        );
        assert_eq!(FeatureKind::parse("zone_wide"), None);
        assert_eq!(FeatureKind::parse("situation_Corner"), None);
        assert_eq!(FeatureKind::parse("interaction_OpenPlay"), None);
    }

    #[test]
    fn test_schema_rejects_empty_unknown_and_duplicate() {
        assert!(matches!(
            FeatureSchema::new(vec![]),
            Err(XgError::SchemaViolation(_))
        ));
        assert!(matches!(
            FeatureSchema::new(names(&["X", "zone_central"])),
            Err(XgError::SchemaViolation(_))
        ));
        assert!(matches!(
            FeatureSchema::new(names(&["X", "Y", "X"])),
            Err(XgError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_basic_central_shot() {
        let schema = FeatureSchema::new(names(&BASE)).unwrap();
        let row = build(coord(0.5, 0.5), None, None, &schema);
        let v = row.values();

        assert_eq!(v.len(), 4);
        assert!((v[0] - 0.5).abs() < 1e-6);
        assert!((v[1] - 0.5).abs() < 1e-6);
        assert!((v[2] - 0.5).abs() < 1e-6);
        // Posts 0.05 either side of centre, 0.5 out.
        let expected = 2.0 * (0.05f64 / 0.5).atan();
        assert!((v[3] as f64 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_column_order_follows_schema() {
        let schema = FeatureSchema::new(names(&["angle_to_goal", "Y", "X"])).unwrap();
        let row = build(coord(0.8, 0.1), None, None, &schema);
        assert!((row.values()[1] - 0.1).abs() < 1e-6);
        assert!((row.values()[2] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_one_hot_and_interaction() {
        let schema = FeatureSchema::new(names(&[
            "X",
            "situation_OpenPlay",
            "situation_SetPiece",
            "shotType_Head",
            "shotType_RightFoot",
            "interaction_SetPiece_RightFoot",
            "interaction_OpenPlay_Head",
        ]))
        .unwrap();

        let row = build(
            coord(0.9, 0.5),
            Some(Situation::SetPiece),
            Some(ShotType::RightFoot),
            &schema,
        );
        assert_eq!(row.values(), &[0.9, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_categories_ignored_when_not_in_schema() {
        let schema = FeatureSchema::new(names(&BASE)).unwrap();
        let with = build(
            coord(0.7, 0.6),
            Some(Situation::OpenPlay),
            Some(ShotType::Head),
            &schema,
        );
        let without = build(coord(0.7, 0.6), None, None, &schema);
        assert_eq!(with, without);
    }

    #[test]
    fn test_real_schemas_project_exactly() {
        for (variant, list) in real_schemas() {
            let schema = FeatureSchema::new(list.clone()).unwrap();
            let (situation, shot_type) = match variant {
                "basic_model" => (None, None),
                "situation_model" => (Some(Situation::OpenPlay), None),
                "shottype_model" => (None, Some(ShotType::LeftFoot)),
                _ => (Some(Situation::FromCorner), Some(ShotType::Head)),
            };
            let row = build(coord(0.6, 0.4), situation, shot_type, &schema);
            assert_eq!(row.values().len(), list.len(), "{variant}");
            assert_eq!(schema.names(), list.as_slice());

            let hot: f32 = row.values()[4..].iter().sum();
            let expected = [situation.is_some(), shot_type.is_some(), variant == "advanced_model"]
                .iter()
                .filter(|b| **b)
                .count() as f32;
            assert_eq!(hot, expected, "{variant}");
        }
    }

    #[test]
    fn test_build_matrix_matches_rows() {
        let schema = FeatureSchema::new(names(&BASE)).unwrap();
        let points = [coord(0.1, 0.2), coord(0.95, 0.5), coord(0.5, 0.9)];
        let matrix = build_matrix(&points, None, None, &schema);

        assert_eq!(matrix.dim(), (3, 4));
        for (i, p) in points.iter().enumerate() {
            let row = build(*p, None, None, &schema);
            assert_eq!(matrix.row(i).to_vec(), row.values().to_vec());
        }
    }

    #[test]
    fn test_angle_zero_on_post() {
        assert_eq!(angle_to_goal(1.0, 0.45), 0.0);
        assert_eq!(angle_to_goal(1.0, 0.55), 0.0);
    }

    #[test]
    fn test_angle_on_goal_line_between_posts() {
        // Standing in the goal mouth, the posts are directly either side.
        assert!((angle_to_goal(1.0, 0.5) - PI).abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_goal() {
        assert_eq!(distance_to_goal(1.0, 0.5), 0.0);
        assert!((distance_to_goal(0.0, 0.5) - 1.0).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_angle_symmetric_in_y(x in 0.0f64..0.99, y in 0.0f64..=1.0) {
            let a = angle_to_goal(x, y);
            let b = angle_to_goal(x, 1.0 - y);
            prop_assert!((a - b).abs() < 1e-9);
        }

        #[test]
        fn prop_angle_positive_off_the_posts(x in 0.0f64..0.999, y in 0.0f64..=1.0) {
            let a = angle_to_goal(x, y);
            prop_assert!(a > 0.0 && a <= PI);
        }
    }
}
