use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use validator::{Validate, ValidationError};

use crate::models::test::{Test, TestQuestion};
use crate::utils::token::is_valid_group_id;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionSelection {
    pub question_pool: i64,
    #[validate(length(min = 1))]
    pub positions: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateTestPayload {
    /// Subject id.
    pub subject: i64,
    pub instructor_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    /// Variant labels such as `["A", "B"]`. The first keeps the requested order.
    #[validate(length(min = 1), custom(function = "validate_variants"))]
    pub variants: Vec<String>,
    #[validate(length(min = 1), nested)]
    pub question_selections: Vec<QuestionSelection>,
    #[validate(length(max = 255))]
    pub notes: Option<String>,
    #[validate(length(max = 255))]
    pub instructions: Option<String>,
    #[validate(custom(function = "validate_group_id"))]
    pub group_id: Option<String>,
    #[serde(default)]
    pub resample_per_variant: bool,
}

fn validate_variants(variants: &Vec<String>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for label in variants {
        let len = label.chars().count();
        if len == 0 || len > 2 {
            return Err(ValidationError::new("variant_length"));
        }
        if !seen.insert(label.as_str()) {
            return Err(ValidationError::new("duplicate_variant"));
        }
    }
    Ok(())
}

fn validate_group_id(group_id: &String) -> Result<(), ValidationError> {
    if is_valid_group_id(group_id) {
        Ok(())
    } else {
        Err(ValidationError::new("group_id_format"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTestSummary {
    pub test_id: i64,
    pub assessment_id: String,
    pub variant: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateTestResponse {
    pub group_id: String,
    pub generated_tests: Vec<GeneratedTestSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TestListQuery {
    pub subject: Option<i64>,
    pub instructor_id: Option<i64>,
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementResponse {
    pub position: i32,
    pub question_id: i64,
}

impl From<TestQuestion> for PlacementResponse {
    fn from(value: TestQuestion) -> Self {
        Self {
            position: value.position,
            question_id: value.question_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResponse {
    pub id: i64,
    pub subject_id: i64,
    pub instructor_id: i64,
    pub group_id: Option<String>,
    pub assessment_id: String,
    pub name: String,
    pub variant: String,
    pub notes: Option<String>,
    pub instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<PlacementResponse>>,
}

impl From<Test> for TestResponse {
    fn from(value: Test) -> Self {
        Self {
            id: value.id,
            subject_id: value.subject_id,
            instructor_id: value.instructor_id,
            group_id: value.group_id,
            assessment_id: value.assessment_id,
            name: value.name,
            variant: value.variant,
            notes: value.notes,
            instructions: value.instructions,
            created_at: value.created_at,
            questions: None,
        }
    }
}

impl TestResponse {
    pub fn with_placements(mut self, placements: Vec<TestQuestion>) -> Self {
        self.questions = Some(placements.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupResponse {
    pub group_id: String,
    pub tests: Vec<TestResponse>,
}

/// Entries keyed by question position, serialized as a JSON object whose keys
/// are the stringified positions in ascending order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionMap<T>(pub Vec<(i32, T)>);

impl<T> PositionMap<T> {
    pub fn get(&self, position: i32) -> Option<&T> {
        self.0
            .iter()
            .find(|(pos, _)| *pos == position)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Serialize> Serialize for PositionMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (position, value) in &self.0 {
            map.serialize_entry(&position.to_string(), value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AnswerKey {
    pub correct_answers: PositionMap<String>,
    pub points: PositionMap<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantAnswerKey {
    pub test_id: i64,
    pub assessment_id: String,
    pub variant: String,
    #[serde(flatten)]
    pub key: AnswerKey,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupAnswerKeysResponse {
    pub group_id: String,
    pub variants: Vec<VariantAnswerKey>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(variants: Vec<&str>) -> GenerateTestPayload {
        GenerateTestPayload {
            subject: 1,
            instructor_id: 7,
            name: "Midterm".into(),
            variants: variants.into_iter().map(String::from).collect(),
            question_selections: vec![QuestionSelection {
                question_pool: 1,
                positions: vec![1, 2],
            }],
            notes: None,
            instructions: None,
            group_id: None,
            resample_per_variant: false,
        }
    }

    #[test]
    fn accepts_well_formed_payload() {
        assert!(payload(vec!["A", "B"]).validate().is_ok());
    }

    #[test]
    fn rejects_empty_or_long_variant_labels() {
        assert!(payload(vec![]).validate().is_err());
        assert!(payload(vec![""]).validate().is_err());
        assert!(payload(vec!["ABC"]).validate().is_err());
    }

    #[test]
    fn rejects_repeated_variant_labels() {
        assert!(payload(vec!["A", "B", "A"]).validate().is_err());
    }

    #[test]
    fn rejects_selection_without_positions() {
        let mut p = payload(vec!["A"]);
        p.question_selections[0].positions.clear();
        assert!(p.validate().is_err());

        let mut p = payload(vec!["A"]);
        p.question_selections.clear();
        assert!(p.validate().is_err());
    }

    #[test]
    fn group_id_is_limited_to_six_characters() {
        let mut p = payload(vec!["A"]);
        p.group_id = Some("ABCDEFG".into());
        assert!(p.validate().is_err());
        p.group_id = Some("ABC234".into());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn group_id_rejects_blank_and_header_breaking_input() {
        for bad in ["", "   ", "AB\"C", "A;B", "abc"] {
            let mut p = payload(vec!["A"]);
            p.group_id = Some(bad.into());
            assert!(p.validate().is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn resample_flag_defaults_to_false() {
        let p: GenerateTestPayload = serde_json::from_value(json!({
            "subject": 1,
            "instructor_id": 2,
            "name": "Quiz",
            "variants": ["A"],
            "question_selections": [{"question_pool": 4, "positions": [1]}]
        }))
        .unwrap();
        assert!(!p.resample_per_variant);
        assert!(p.notes.is_none());
    }

    #[test]
    fn position_map_serializes_in_position_order() {
        let key = AnswerKey {
            correct_answers: PositionMap(vec![
                (2, "C".to_string()),
                (10, "A".to_string()),
            ]),
            points: PositionMap(vec![(2, 1.0), (10, 2.5)]),
        };
        let text = serde_json::to_string(&key).unwrap();
        assert_eq!(
            text,
            r#"{"correct_answers":{"2":"C","10":"A"},"points":{"2":1.0,"10":2.5}}"#
        );
        assert_eq!(key.correct_answers.get(10).map(String::as_str), Some("A"));
        assert_eq!(key.points.len(), 2);
    }
}
