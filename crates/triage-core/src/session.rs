use serde::{Deserialize, Serialize};

pub const MIN_TARGET_CONFIDENCE: f64 = 1.0;
pub const MAX_TARGET_CONFIDENCE: f64 = 100.0;
pub const DEFAULT_TARGET_CONFIDENCE: f64 = 80.0;

pub const MIN_ITERATIONS: u32 = 1;
pub const MAX_ITERATIONS: u32 = 20;
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// User-tunable knobs for the analysis loop.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnalysisSettings {
    /// Confidence (percent) at which analysis finalizes, in `[1, 100]`.
    pub target_confidence: f64,
    /// Hard cap on follow-up rounds per analysis run, in `[1, 20]`.
    pub max_iterations: u32,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            target_confidence: DEFAULT_TARGET_CONFIDENCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl AnalysisSettings {
    pub fn new(target_confidence: f64, max_iterations: u32) -> Self {
        let mut s = Self::default();
        s.set_target_confidence(target_confidence);
        s.set_max_iterations(max_iterations);
        s
    }

    pub fn set_target_confidence(&mut self, pct: f64) {
        self.target_confidence = pct.clamp(MIN_TARGET_CONFIDENCE, MAX_TARGET_CONFIDENCE);
    }

    pub fn set_max_iterations(&mut self, n: u32) {
        self.max_iterations = n.clamp(MIN_ITERATIONS, MAX_ITERATIONS);
    }
}

/// Where the analysis loop currently stands.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    /// No analysis in progress.
    #[default]
    Idle,
    /// A tick is executing or has just finalized a prediction.
    Running,
    /// The loop paused to ask the user follow-up questions.
    AwaitingFollowups,
}

impl AnalysisPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::AwaitingFollowups => "awaiting_followups",
        }
    }
}
