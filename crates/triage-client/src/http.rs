use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use triage_core::{
    ApiError, DiseaseDetail, FollowUpQuestion, ParsedIntent, Prediction, TabularFeatures,
    TestOutcome, TestRegistry, TriageApi,
};

use crate::models::{
    AvailableTestsResponse, DetailsRequest, DetailsResponse, FollowUpsRequest, FollowUpsResponse,
    ParseRequest, ParseResponse, PredictionsRequest, PredictionsResponse, TestPredictResponse,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Request bounds for the follow-up endpoint. The backend enforces them;
/// the client only declares them.
const MAX_SYMPTOMS_PER_DISEASE: u32 = 3;
const MAX_TOTAL_QUESTIONS: u32 = 10;

/// HTTP implementation of [`TriageApi`] against the inference backend.
pub struct HttpTriageApi {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpTriageApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.request_timeout)
        } else {
            ApiError::Network(e.to_string())
        }
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, body));
        }
        resp.json::<T>().await.map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self
            .client
            .get(self.url(path))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::decode(resp).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(self.url(path))
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        Self::decode(resp).await
    }
}

#[async_trait]
impl TriageApi for HttpTriageApi {
    #[instrument(skip(self))]
    async fn available_tests(&self) -> Result<TestRegistry, ApiError> {
        let resp: AvailableTestsResponse = self.get_json("/api/tests/available").await?;
        Ok(resp.into_registry())
    }

    #[instrument(skip(self, message))]
    async fn parse_intent(&self, message: &str) -> Result<ParsedIntent, ApiError> {
        let resp: ParseResponse = self
            .post_json("/api/llm/parse", &ParseRequest { message })
            .await?;
        if let Some(error) = resp.error.filter(|e| !e.is_empty()) {
            return Err(ApiError::Service(error));
        }
        match resp.normalized {
            Some(normalized) => Ok(normalized.into_intent()),
            None => Err(ApiError::Decode("parse response missing normalized payload".into())),
        }
    }

    #[instrument(skip(self, symptoms), fields(count = symptoms.len()))]
    async fn top_predictions(&self, symptoms: &[String]) -> Result<Vec<Prediction>, ApiError> {
        if symptoms.is_empty() {
            return Ok(Vec::new());
        }
        let body = PredictionsRequest { symptoms: symptoms.join(" ") };
        let resp: PredictionsResponse = self.post_json("/api/general/top_predictions", &body).await?;
        Ok(resp.predictions.into_iter().map(|p| p.into_prediction()).collect())
    }

    #[instrument(skip(self, diseases), fields(count = diseases.len()))]
    async fn disease_details(&self, diseases: &[String]) -> Result<Vec<DiseaseDetail>, ApiError> {
        if diseases.is_empty() {
            return Ok(Vec::new());
        }
        let resp: DetailsResponse = self
            .post_json("/api/general/disease_info", &DetailsRequest { diseases })
            .await?;
        Ok(resp.results.into_iter().map(|d| d.into_detail()).collect())
    }

    #[instrument(skip(self, current_symptoms, symptoms_removed))]
    async fn follow_ups(
        &self,
        current_symptoms: &[String],
        symptoms_removed: &[String],
    ) -> Result<Vec<FollowUpQuestion>, ApiError> {
        let body = FollowUpsRequest {
            current_symptoms,
            symptoms_removed,
            max_per_disease: MAX_SYMPTOMS_PER_DISEASE,
            max_total: MAX_TOTAL_QUESTIONS,
        };
        let resp: FollowUpsResponse = self.post_json("/api/general/followup", &body).await?;
        Ok(resp.follow_up_questions.into_iter().map(|q| q.into_question()).collect())
    }

    #[instrument(skip(self, features))]
    async fn tabular_test(&self, features: &TabularFeatures) -> Result<TestOutcome, ApiError> {
        if !features.has_signal() {
            return Err(ApiError::InvalidRequest(
                "Please enter valid parameters (all values cannot be 0)".into(),
            ));
        }
        let resp: TestPredictResponse = self.post_json("/api/diabetes/predict", features).await?;
        Ok(resp.into_outcome())
    }

    #[instrument(skip(self, bytes), fields(file = %file_name, size = bytes.len()))]
    async fn image_test(&self, file_name: &str, bytes: Vec<u8>) -> Result<TestOutcome, ApiError> {
        if bytes.is_empty() {
            return Err(ApiError::InvalidRequest("Please select an image".into()));
        }
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        let resp = self
            .client
            .post(self.url("/api/skin/predict"))
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let resp: TestPredictResponse = Self::decode(resp).await?;
        Ok(resp.into_outcome())
    }
}
