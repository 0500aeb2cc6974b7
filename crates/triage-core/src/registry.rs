use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Catalog of runnable diagnostic tests, keyed by display name with the
/// backing model identifier as the value. Loaded from the backend at
/// startup; an empty registry just means no tests can be recommended.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TestRegistry {
    tests: BTreeMap<String, String>,
}

impl TestRegistry {
    pub fn new(tests: BTreeMap<String, String>) -> Self {
        Self { tests }
    }

    pub fn model_for(&self, name: &str) -> Option<&str> {
        self.tests.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tests.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tests.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tests.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}

/// Input row for the tabular diabetes model. Field names match the wire
/// format expected by the predict endpoint.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TabularFeatures {
    pub pregnancies: f64,
    pub glucose: f64,
    pub blood_pressure: f64,
    pub skin_thickness: f64,
    pub insulin: f64,
    pub bmi: f64,
    pub diabetes_pedigree_function: f64,
    pub age: f64,
}

impl TabularFeatures {
    /// True when at least one clinical measurement is non-zero.
    /// Pregnancies alone does not count; zero is a legitimate value there.
    pub fn has_signal(&self) -> bool {
        [
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree_function,
            self.age,
        ]
        .iter()
        .any(|v| *v != 0.0)
    }
}

/// How a single test run ended. Storing one of these against a test name
/// is what marks the test as done; reruns overwrite the previous outcome.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestOutcome {
    Completed { predicted_class: String, confidence: f64 },
    Failed { message: String },
}

impl TestOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Whether a test was asked for by the user or surfaced by a prediction.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TestSource {
    UserRequested,
    Recommended,
}

impl TestSource {
    /// Label used when reporting results back into the transcript.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UserRequested => "User-asked",
            Self::Recommended => "Recommended",
        }
    }
}
