use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::registry::{TabularFeatures, TestOutcome, TestRegistry};

/// What the language model extracted from one free-text message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParsedIntent {
    pub symptoms_to_add: Vec<String>,
    pub symptoms_to_remove: Vec<String>,
    /// Test names the user explicitly asked to run.
    pub requested_tests: Vec<String>,
}

impl ParsedIntent {
    pub fn is_empty(&self) -> bool {
        self.symptoms_to_add.is_empty()
            && self.symptoms_to_remove.is_empty()
            && self.requested_tests.is_empty()
    }
}

/// One disease candidate with its confidence, already normalized to percent.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub disease: String,
    pub confidence: f64,
}

/// Narrative details for a finalized disease.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiseaseDetail {
    pub disease: String,
    pub description: Option<String>,
    pub recommendations: Vec<String>,
}

/// A clarifying question tied to the disease it would discriminate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FollowUpQuestion {
    pub disease: String,
    pub symptoms: Vec<String>,
    pub question: String,
    pub confidence: f64,
}

/// Backend surface the analysis loop talks to. One implementation speaks
/// HTTP to the real service; tests swap in a scripted mock.
#[async_trait]
pub trait TriageApi: Send + Sync {
    /// Fetch the catalog of runnable tests (name -> model id).
    async fn available_tests(&self) -> Result<TestRegistry, ApiError>;

    /// Run a free-text message through intent extraction.
    async fn parse_intent(&self, message: &str) -> Result<ParsedIntent, ApiError>;

    /// Rank disease candidates for the given active symptoms.
    async fn top_predictions(&self, symptoms: &[String]) -> Result<Vec<Prediction>, ApiError>;

    /// Fetch description and recommendations for the named diseases.
    async fn disease_details(&self, diseases: &[String]) -> Result<Vec<DiseaseDetail>, ApiError>;

    /// Fetch follow-up questions given current and denied symptoms.
    async fn follow_ups(
        &self,
        current_symptoms: &[String],
        symptoms_removed: &[String],
    ) -> Result<Vec<FollowUpQuestion>, ApiError>;

    /// Run the tabular model on one feature row.
    async fn tabular_test(&self, features: &TabularFeatures) -> Result<TestOutcome, ApiError>;

    /// Run the image model on raw file bytes.
    async fn image_test(&self, file_name: &str, bytes: Vec<u8>) -> Result<TestOutcome, ApiError>;
}
