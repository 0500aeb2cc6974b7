use std::collections::{BTreeMap, BTreeSet};

use triage_core::{
    AnalysisPhase, AnalysisSettings, FollowUpQuestion, SessionId, SymptomSet, TestOutcome,
    TestRegistry, TestSource, Transcript,
};

/// All mutable state for one symptom-checking session. Owned by the
/// orchestrator; every mutation goes through it on a single control flow.
#[derive(Debug)]
pub struct Session {
    pub(crate) id: SessionId,
    pub(crate) symptoms: SymptomSet,
    pub(crate) transcript: Transcript,
    pub(crate) settings: AnalysisSettings,
    pub(crate) phase: AnalysisPhase,
    pub(crate) iteration: u32,
    pub(crate) skip_follow_ups: bool,
    pub(crate) pending_follow_ups: Vec<FollowUpQuestion>,
    pub(crate) registry: TestRegistry,
    pub(crate) user_tests: BTreeSet<String>,
    pub(crate) recommended_tests: BTreeSet<String>,
    pub(crate) test_records: BTreeMap<String, TestOutcome>,
}

impl Session {
    pub fn new(settings: AnalysisSettings, registry: TestRegistry) -> Self {
        Self {
            id: SessionId::new(),
            symptoms: SymptomSet::new(),
            transcript: Transcript::new(),
            settings,
            phase: AnalysisPhase::Idle,
            iteration: 0,
            skip_follow_ups: false,
            pending_follow_ups: Vec::new(),
            registry,
            user_tests: BTreeSet::new(),
            recommended_tests: BTreeSet::new(),
            test_records: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn symptoms(&self) -> &SymptomSet {
        &self.symptoms
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn phase(&self) -> AnalysisPhase {
        self.phase
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn pending_follow_ups(&self) -> &[FollowUpQuestion] {
        &self.pending_follow_ups
    }

    pub fn registry(&self) -> &TestRegistry {
        &self.registry
    }

    pub fn user_tests(&self) -> &BTreeSet<String> {
        &self.user_tests
    }

    pub fn recommended_tests(&self) -> &BTreeSet<String> {
        &self.recommended_tests
    }

    /// Last stored outcome for `name`; `Some` means the test has run.
    pub fn test_record(&self, name: &str) -> Option<&TestOutcome> {
        self.test_records.get(name)
    }

    pub fn test_records(&self) -> &BTreeMap<String, TestOutcome> {
        &self.test_records
    }

    /// Which label a completed run of `name` gets in the transcript.
    pub fn test_source(&self, name: &str) -> TestSource {
        if self.user_tests.contains(name) {
            TestSource::UserRequested
        } else {
            TestSource::Recommended
        }
    }

    /// Clears everything accumulated during the session. Settings and the
    /// test registry survive; both are configuration, not session state.
    pub fn reset(&mut self) {
        self.symptoms.clear();
        self.transcript.clear();
        self.phase = AnalysisPhase::Idle;
        self.iteration = 0;
        self.skip_follow_ups = false;
        self.pending_follow_ups.clear();
        self.user_tests.clear();
        self.recommended_tests.clear();
        self.test_records.clear();
    }
}
