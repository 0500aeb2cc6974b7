use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use triage_core::{
    ApiError, DiseaseDetail, FollowUpQuestion, ParsedIntent, Prediction, TabularFeatures,
    TestOutcome, TestRegistry, TriageApi,
};

type Scripted<T> = Mutex<VecDeque<Result<T, ApiError>>>;

/// Pre-programmed responses for deterministic testing without a live
/// backend. Each method pops its own queue in call order; an exhausted
/// queue yields a degradable error naming the method.
#[derive(Default)]
pub struct MockApi {
    registries: Scripted<TestRegistry>,
    intents: Scripted<ParsedIntent>,
    predictions: Scripted<Vec<Prediction>>,
    details: Scripted<Vec<DiseaseDetail>>,
    follow_ups: Scripted<Vec<FollowUpQuestion>>,
    tabular_outcomes: Scripted<TestOutcome>,
    image_outcomes: Scripted<TestOutcome>,
    intent_calls: AtomicUsize,
    prediction_calls: AtomicUsize,
    detail_calls: AtomicUsize,
    follow_up_calls: AtomicUsize,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(self, response: Result<TestRegistry, ApiError>) -> Self {
        push(&self.registries, response);
        self
    }

    pub fn with_intent(self, response: Result<ParsedIntent, ApiError>) -> Self {
        push(&self.intents, response);
        self
    }

    pub fn with_predictions(self, response: Result<Vec<Prediction>, ApiError>) -> Self {
        push(&self.predictions, response);
        self
    }

    pub fn with_details(self, response: Result<Vec<DiseaseDetail>, ApiError>) -> Self {
        push(&self.details, response);
        self
    }

    pub fn with_follow_ups(self, response: Result<Vec<FollowUpQuestion>, ApiError>) -> Self {
        push(&self.follow_ups, response);
        self
    }

    pub fn with_tabular_outcome(self, response: Result<TestOutcome, ApiError>) -> Self {
        push(&self.tabular_outcomes, response);
        self
    }

    pub fn with_image_outcome(self, response: Result<TestOutcome, ApiError>) -> Self {
        push(&self.image_outcomes, response);
        self
    }

    pub fn intent_calls(&self) -> usize {
        self.intent_calls.load(Ordering::Relaxed)
    }

    pub fn prediction_calls(&self) -> usize {
        self.prediction_calls.load(Ordering::Relaxed)
    }

    pub fn detail_calls(&self) -> usize {
        self.detail_calls.load(Ordering::Relaxed)
    }

    pub fn follow_up_calls(&self) -> usize {
        self.follow_up_calls.load(Ordering::Relaxed)
    }
}

fn push<T>(queue: &Scripted<T>, response: Result<T, ApiError>) {
    queue
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push_back(response);
}

fn pop<T>(queue: &Scripted<T>, method: &str) -> Result<T, ApiError> {
    queue
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .pop_front()
        .unwrap_or_else(|| {
            Err(ApiError::Service(format!("MockApi: no response configured for {method}")))
        })
}

#[async_trait]
impl TriageApi for MockApi {
    async fn available_tests(&self) -> Result<TestRegistry, ApiError> {
        pop(&self.registries, "available_tests")
    }

    async fn parse_intent(&self, _message: &str) -> Result<ParsedIntent, ApiError> {
        self.intent_calls.fetch_add(1, Ordering::Relaxed);
        pop(&self.intents, "parse_intent")
    }

    async fn top_predictions(&self, _symptoms: &[String]) -> Result<Vec<Prediction>, ApiError> {
        self.prediction_calls.fetch_add(1, Ordering::Relaxed);
        pop(&self.predictions, "top_predictions")
    }

    async fn disease_details(&self, _diseases: &[String]) -> Result<Vec<DiseaseDetail>, ApiError> {
        self.detail_calls.fetch_add(1, Ordering::Relaxed);
        pop(&self.details, "disease_details")
    }

    async fn follow_ups(
        &self,
        _current_symptoms: &[String],
        _symptoms_removed: &[String],
    ) -> Result<Vec<FollowUpQuestion>, ApiError> {
        self.follow_up_calls.fetch_add(1, Ordering::Relaxed);
        pop(&self.follow_ups, "follow_ups")
    }

    async fn tabular_test(&self, _features: &TabularFeatures) -> Result<TestOutcome, ApiError> {
        pop(&self.tabular_outcomes, "tabular_test")
    }

    async fn image_test(&self, _file_name: &str, _bytes: Vec<u8>) -> Result<TestOutcome, ApiError> {
        pop(&self.image_outcomes, "image_test")
    }
}
