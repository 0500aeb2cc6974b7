//! Wire types for the backend HTTP API, plus the normalization that maps
//! its loosely-shaped responses onto the fixed domain types. Upstream models
//! disagree on field names and scales; all of that is absorbed here so
//! nothing past this module sees a raw payload.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use triage_core::confidence;
use triage_core::{DiseaseDetail, FollowUpQuestion, ParsedIntent, Prediction, TestOutcome, TestRegistry};

// --- Requests ---

#[derive(Serialize)]
pub(crate) struct ParseRequest<'a> {
    pub message: &'a str,
}

#[derive(Serialize)]
pub(crate) struct PredictionsRequest {
    /// Space-joined active symptoms.
    pub symptoms: String,
}

#[derive(Serialize)]
pub(crate) struct DetailsRequest<'a> {
    pub diseases: &'a [String],
}

#[derive(Serialize)]
pub(crate) struct FollowUpsRequest<'a> {
    pub current_symptoms: &'a [String],
    pub symptoms_removed: &'a [String],
    pub max_per_disease: u32,
    pub max_total: u32,
}

// --- Responses ---

#[derive(Deserialize)]
pub(crate) struct AvailableTestsResponse {
    #[serde(default)]
    pub available_tests: BTreeMap<String, String>,
}

impl AvailableTestsResponse {
    pub fn into_registry(self) -> TestRegistry {
        TestRegistry::new(self.available_tests)
    }
}

#[derive(Deserialize)]
pub(crate) struct ParseResponse {
    pub normalized: Option<NormalizedIntent>,
    pub error: Option<String>,
}

/// The parse endpoint's field names, misspelling included.
#[derive(Default, Deserialize)]
pub(crate) struct NormalizedIntent {
    #[serde(default)]
    pub symptoms_to_add: Vec<String>,
    #[serde(default, rename = "symptoms_to_removed")]
    pub symptoms_to_remove: Vec<String>,
    #[serde(default)]
    pub specific_tests_to_run: Vec<String>,
}

impl NormalizedIntent {
    pub fn into_intent(self) -> ParsedIntent {
        ParsedIntent {
            symptoms_to_add: self.symptoms_to_add,
            symptoms_to_remove: self.symptoms_to_remove,
            requested_tests: self.specific_tests_to_run,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct PredictionsResponse {
    #[serde(default)]
    pub predictions: Vec<PredictionDto>,
}

/// Some upstream models report `confidence`, others `confidence_score`.
#[derive(Deserialize)]
pub(crate) struct PredictionDto {
    pub disease: String,
    pub confidence: Option<f64>,
    pub confidence_score: Option<f64>,
}

impl PredictionDto {
    pub fn into_prediction(self) -> Prediction {
        let raw = self.confidence.or(self.confidence_score).unwrap_or(0.0);
        Prediction {
            disease: self.disease,
            confidence: confidence::normalize(raw),
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct DetailsResponse {
    #[serde(default)]
    pub results: Vec<DetailDto>,
}

#[derive(Deserialize)]
pub(crate) struct DetailDto {
    pub disease: String,
    pub description: Option<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl DetailDto {
    pub fn into_detail(self) -> DiseaseDetail {
        DiseaseDetail {
            disease: self.disease,
            description: self.description.filter(|d| !d.trim().is_empty()),
            recommendations: self.recommendations,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct FollowUpsResponse {
    #[serde(default)]
    pub follow_up_questions: Vec<FollowUpDto>,
}

#[derive(Deserialize)]
pub(crate) struct FollowUpDto {
    pub disease: String,
    #[serde(default)]
    pub symptoms: Vec<String>,
    pub question: String,
    #[serde(default)]
    pub confidence: f64,
}

impl FollowUpDto {
    pub fn into_question(self) -> FollowUpQuestion {
        FollowUpQuestion {
            disease: self.disease,
            symptoms: self.symptoms,
            question: self.question,
            confidence: self.confidence,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct TestPredictResponse {
    pub predicted_class: Option<String>,
    pub confidence: Option<f64>,
    pub error: Option<String>,
}

impl TestPredictResponse {
    pub fn into_outcome(self) -> TestOutcome {
        if let Some(error) = self.error {
            return TestOutcome::Failed { message: error };
        }
        match self.predicted_class {
            Some(predicted_class) => TestOutcome::Completed {
                predicted_class,
                confidence: confidence::normalize(self.confidence.unwrap_or(0.0)),
            },
            None => TestOutcome::Failed {
                message: "Failed to get test result".to_string(),
            },
        }
    }
}
