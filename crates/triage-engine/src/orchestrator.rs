use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

use triage_core::confidence;
use triage_core::{
    AnalysisPhase, AnalysisSettings, Message, Prediction, SessionEvent, TestOutcome, TestRegistry,
    TriageApi,
};

use crate::error::EngineError;
use crate::session::Session;

/// How a controller tick ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Analysis stopped without a prediction (no symptoms, or none returned).
    Halted,
    /// A prediction message was appended and the loop returned to idle.
    Finalized,
    /// Follow-up questions are pending user answers.
    AwaitingFollowUps,
}

/// Drives the symptom-checking loop: applies parsed intents to the symptom
/// store, runs prediction rounds, and decides after each round whether to
/// ask follow-ups or finalize. All session state lives in [`Session`];
/// every transcript append goes through [`Orchestrator::append`] so event
/// subscribers see the same causal order the transcript records.
pub struct Orchestrator {
    session: Session,
    api: Arc<dyn TriageApi>,
    event_tx: broadcast::Sender<SessionEvent>,
    /// Ticks are triggered by discrete user actions; this flag rejects a
    /// second trigger while a tick's calls are still outstanding.
    in_flight: bool,
}

impl Orchestrator {
    pub fn new(
        api: Arc<dyn TriageApi>,
        registry: TestRegistry,
        settings: AnalysisSettings,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            session: Session::new(settings, registry),
            api,
            event_tx,
            in_flight: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn update_settings(&mut self, target_confidence: f64, max_iterations: u32) {
        self.session.settings.set_target_confidence(target_confidence);
        self.session.settings.set_max_iterations(max_iterations);
    }

    fn emit(&self, event: SessionEvent) {
        if self.event_tx.send(event).is_err() {
            warn!("no event receivers — event dropped");
        }
    }

    fn append(&mut self, message: Message) {
        self.session.transcript.append(message.clone());
        self.emit(SessionEvent::MessageAppended {
            session_id: self.session.id.clone(),
            message,
        });
    }

    /// Runs one free-text user message through intent extraction and applies
    /// the result. Parse failures become a generic notice in the transcript
    /// and leave the symptom sets untouched.
    #[instrument(skip(self, message), fields(session_id = %self.session.id))]
    pub async fn handle_message(&mut self, message: &str) -> Result<(), EngineError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(EngineError::EmptyMessage);
        }

        // 1. Record the user turn before anything can fail.
        self.append(Message::user(message));

        // 2. Extract intent.
        let intent = match self.api.parse_intent(message).await {
            Ok(intent) => intent,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "intent parse failed");
                self.append(Message::assistant(
                    "I had trouble understanding. Please try again.",
                ));
                return Ok(());
            }
        };

        // 3. Apply symptom changes and summarize them.
        let changed = !intent.symptoms_to_add.is_empty() || !intent.symptoms_to_remove.is_empty();
        let active = self
            .session
            .symptoms
            .apply(&intent.symptoms_to_add, &intent.symptoms_to_remove);
        if changed {
            let mut parts = Vec::new();
            if !intent.symptoms_to_add.is_empty() {
                parts.push(format!(
                    "I recognized these new symptoms: {}",
                    intent.symptoms_to_add.join(", ")
                ));
            }
            if !intent.symptoms_to_remove.is_empty() {
                parts.push(format!(
                    "You indicated you do not have: {}",
                    intent.symptoms_to_remove.join(", ")
                ));
            }
            parts.push(format!("Current symptoms: {}", join_or_none(&active)));
            self.append(Message::assistant(parts.join("\n")));
        }

        // 4. Cross-reference any explicitly requested tests.
        if !intent.requested_tests.is_empty() {
            self.register_requested_tests(&intent.requested_tests);
        }

        Ok(())
    }

    /// Requested names not present in the registry are silently dropped.
    fn register_requested_tests(&mut self, requested: &[String]) {
        let matched: Vec<String> = requested
            .iter()
            .filter(|name| self.session.registry.contains(name))
            .cloned()
            .collect();

        if matched.is_empty() {
            self.append(Message::assistant("No specific tests available for your input."));
            return;
        }

        let listing = matched
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n");
        self.session.user_tests.extend(matched);
        self.append(Message::assistant(format!(
            "Recommended tests based on your input:\n{listing}"
        )));
    }

    /// Starts a fresh analysis run. With no active symptoms the loop stops
    /// again immediately without touching the transcript.
    #[instrument(skip(self), fields(session_id = %self.session.id))]
    pub async fn start_analysis(&mut self) -> Result<TickOutcome, EngineError> {
        if self.in_flight {
            return Err(EngineError::Busy);
        }
        self.session.iteration = 0;
        self.session.phase = AnalysisPhase::Running;
        self.emit(SessionEvent::AnalysisStarted {
            session_id: self.session.id.clone(),
        });
        self.tick(true).await
    }

    /// Applies yes/no follow-up answers (true = has symptom, false = does
    /// not) and runs the next prediction round.
    pub async fn submit_follow_ups(
        &mut self,
        answers: &[(String, bool)],
    ) -> Result<TickOutcome, EngineError> {
        if self.in_flight {
            return Err(EngineError::Busy);
        }
        if self.session.phase != AnalysisPhase::AwaitingFollowups {
            return Err(EngineError::NoPendingFollowUps);
        }

        let mut to_add = Vec::new();
        let mut to_remove = Vec::new();
        for (symptom, present) in answers {
            if *present {
                to_add.push(symptom.clone());
            } else {
                to_remove.push(symptom.clone());
            }
        }

        let active = self.session.symptoms.apply(&to_add, &to_remove);
        if !to_add.is_empty() || !to_remove.is_empty() {
            self.append(Message::user(format!(
                "Additional symptoms: {}\nRemoved symptoms: {}\nCurrent symptoms: {}",
                to_add.join(", "),
                to_remove.join(", "),
                active.join(", ")
            )));
        }

        self.tick(false).await
    }

    /// Forces the current round to finalize instead of asking more questions.
    pub async fn skip_follow_ups(&mut self) -> Result<TickOutcome, EngineError> {
        if self.in_flight {
            return Err(EngineError::Busy);
        }
        if self.session.phase != AnalysisPhase::AwaitingFollowups {
            return Err(EngineError::NoPendingFollowUps);
        }
        self.session.skip_follow_ups = true;
        self.tick(false).await
    }

    async fn tick(&mut self, force_running: bool) -> Result<TickOutcome, EngineError> {
        if self.in_flight {
            return Err(EngineError::Busy);
        }
        self.in_flight = true;
        let outcome = self.run_tick(force_running).await;
        self.in_flight = false;
        Ok(outcome)
    }

    #[instrument(skip(self, force_running), fields(session_id = %self.session.id, iteration = self.session.iteration))]
    async fn run_tick(&mut self, force_running: bool) -> TickOutcome {
        // 1. Capture the running flag before any await; state changes that
        //    land mid-flight must not alter this tick's decision.
        let was_running = force_running || self.session.phase != AnalysisPhase::Idle;

        // 2. Stale follow-up questions are invalid once a new round starts.
        self.session.pending_follow_ups.clear();

        // 3. Nothing to analyze.
        let active = self.session.symptoms.active_vec();
        if active.is_empty() {
            debug!("no active symptoms, stopping analysis");
            return self.halt();
        }

        self.session.phase = AnalysisPhase::Running;

        // 4. Rank disease candidates. Failures degrade to "no predictions".
        let predictions = match self.api.top_predictions(&active).await {
            Ok(predictions) => predictions,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "prediction fetch failed");
                Vec::new()
            }
        };
        let Some(top) = predictions.into_iter().next() else {
            debug!("no predictions received, stopping analysis");
            return self.halt();
        };

        // 5. Termination test against the incremented iteration count.
        self.session.iteration += 1;
        let reached_confidence = top.confidence >= self.session.settings.target_confidence;
        let reached_iterations = self.session.iteration >= self.session.settings.max_iterations;

        debug!(
            disease = %top.disease,
            confidence = top.confidence,
            iteration = self.session.iteration,
            reached_confidence,
            reached_iterations,
            skip = self.session.skip_follow_ups,
            "analysis checkpoint"
        );

        if !was_running
            || reached_confidence
            || reached_iterations
            || self.session.skip_follow_ups
        {
            self.finalize(top).await;
            return TickOutcome::Finalized;
        }

        // 6. Keep narrowing: fetch the next round of follow-up questions.
        let questions = match self
            .api
            .follow_ups(&active, &self.session.symptoms.excluded_vec())
            .await
        {
            Ok(questions) => questions,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "follow-up fetch failed");
                Vec::new()
            }
        };
        let count = questions.len();
        self.session.pending_follow_ups = questions;
        self.session.phase = AnalysisPhase::AwaitingFollowups;
        self.emit(SessionEvent::FollowupsReady {
            session_id: self.session.id.clone(),
            count,
        });
        TickOutcome::AwaitingFollowUps
    }

    fn halt(&mut self) -> TickOutcome {
        self.session.phase = AnalysisPhase::Idle;
        self.session.iteration = 0;
        self.emit(SessionEvent::AnalysisHalted {
            session_id: self.session.id.clone(),
        });
        TickOutcome::Halted
    }

    /// Composes and appends the prediction message, then returns the loop
    /// to idle. Detail data is garnish; the prediction stands on its own
    /// when the detail call fails.
    async fn finalize(&mut self, top: Prediction) {
        let details = match self.api.disease_details(std::slice::from_ref(&top.disease)).await {
            Ok(details) => details,
            Err(e) => {
                warn!(error = %e, kind = e.error_kind(), "disease detail fetch failed");
                Vec::new()
            }
        };
        let detail = details.into_iter().next().unwrap_or_default();

        let mut text = format!(
            "Final Prediction: {}\nConfidence: {}%\n",
            top.disease,
            confidence::format_percent(top.confidence)
        );
        if let Some(description) = &detail.description {
            text.push_str(&format!("Description: {description}\n\n"));
        }
        if !detail.recommendations.is_empty() {
            let bullets = detail
                .recommendations
                .iter()
                .map(|r| format!("• {r}"))
                .collect::<Vec<_>>()
                .join("\n");
            text.push_str(&format!("Recommendations:\n{bullets}"));
        }
        if let Some(model) = self.session.registry.model_for(&top.disease) {
            text.push_str(&format!(
                "\n\nSpecific Test Available: {model} for {}",
                top.disease
            ));
            self.session.recommended_tests.insert(top.disease.clone());
        }

        self.append(Message::prediction(text));

        self.session.iteration = 0;
        self.session.phase = AnalysisPhase::Idle;
        self.session.skip_follow_ups = false;
        self.emit(SessionEvent::AnalysisFinalized {
            session_id: self.session.id.clone(),
            disease: top.disease,
            confidence: top.confidence,
        });
    }

    /// Records a finished test run and reports it into the transcript,
    /// labeled by whether the user asked for the test or a prediction
    /// recommended it. Reruns overwrite the stored record.
    pub fn on_test_completed(&mut self, name: &str, outcome: TestOutcome) {
        let source = self.session.test_source(name);
        let content = match &outcome {
            TestOutcome::Completed { predicted_class, confidence: pct } => format!(
                "({}) {} Test Result:\n• Prediction: {}\n• Confidence: {}%\n• Status: Completed",
                source.label(),
                name,
                predicted_class,
                confidence::format_percent(*pct)
            ),
            TestOutcome::Failed { message } => format!(
                "({}) {} Test Result:\n• Status: Failed ({})",
                source.label(),
                name,
                message
            ),
        };

        self.session.test_records.insert(name.to_string(), outcome);
        self.append(Message::test_result(content));
        self.emit(SessionEvent::TestCompleted {
            session_id: self.session.id.clone(),
            test_name: name.to_string(),
        });
    }

    /// Adds a test the user picked from the catalog to the user-requested
    /// set. Names outside the registry are rejected.
    pub fn add_user_test(&mut self, name: &str) -> Result<(), EngineError> {
        if !self.session.registry.contains(name) {
            return Err(EngineError::UnknownTest(name.to_string()));
        }
        self.session.user_tests.insert(name.to_string());
        Ok(())
    }

    /// Wipes all session state back to a fresh start. Settings and the
    /// test registry survive.
    pub fn reset(&mut self) {
        self.session.reset();
        self.in_flight = false;
        self.emit(SessionEvent::SessionReset {
            session_id: self.session.id.clone(),
        });
    }
}

fn join_or_none(symptoms: &[String]) -> String {
    if symptoms.is_empty() {
        "None".to_string()
    } else {
        symptoms.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use triage_client::MockApi;
    use triage_core::{ApiError, FollowUpQuestion, MessageKind, ParsedIntent};

    fn registry() -> TestRegistry {
        let mut m = BTreeMap::new();
        m.insert("Diabetes".to_string(), "diabetes_test_model".to_string());
        m.insert("Skin Diseases".to_string(), "skin_test_model".to_string());
        TestRegistry::new(m)
    }

    fn orchestrator_with(
        api: MockApi,
        settings: AnalysisSettings,
    ) -> (Orchestrator, Arc<MockApi>, broadcast::Receiver<SessionEvent>) {
        let (tx, rx) = broadcast::channel(100);
        let api = Arc::new(api);
        let orch = Orchestrator::new(api.clone(), registry(), settings, tx);
        (orch, api, rx)
    }

    fn orchestrator(api: MockApi) -> (Orchestrator, Arc<MockApi>, broadcast::Receiver<SessionEvent>) {
        orchestrator_with(api, AnalysisSettings::default())
    }

    fn prediction(disease: &str, pct: f64) -> Prediction {
        Prediction { disease: disease.into(), confidence: pct }
    }

    fn add_intent(symptoms: &[&str]) -> ParsedIntent {
        ParsedIntent {
            symptoms_to_add: symptoms.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn question(disease: &str, text: &str) -> FollowUpQuestion {
        FollowUpQuestion {
            disease: disease.into(),
            symptoms: vec!["chills".into()],
            question: text.into(),
            confidence: 0.5,
        }
    }

    fn kinds(orch: &Orchestrator) -> Vec<MessageKind> {
        orch.session().transcript().entries().iter().map(|m| m.kind).collect()
    }

    fn prediction_messages(orch: &Orchestrator) -> Vec<String> {
        orch.session()
            .transcript()
            .entries()
            .iter()
            .filter(|m| m.kind == MessageKind::Prediction)
            .map(|m| m.content.clone())
            .collect()
    }

    fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<&'static str> {
        let mut seen = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            seen.push(ev.event_type());
        }
        seen
    }

    // ── handle_message ────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_message_rejected_without_network() {
        let (mut orch, api, _rx) = orchestrator(MockApi::new());
        let err = orch.handle_message("   ").await.unwrap_err();
        assert!(matches!(err, EngineError::EmptyMessage));
        assert!(orch.session().transcript().is_empty());
        assert_eq!(api.intent_calls(), 0);
    }

    #[tokio::test]
    async fn message_applies_symptoms_and_summarizes() {
        let api = MockApi::new().with_intent(Ok(ParsedIntent {
            symptoms_to_add: vec!["fever".into(), "cough".into()],
            symptoms_to_remove: vec!["nausea".into()],
            requested_tests: vec![],
        }));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("fever and cough, no nausea").await.unwrap();

        assert_eq!(kinds(&orch), vec![MessageKind::User, MessageKind::Assistant]);
        let summary = &orch.session().transcript().entries()[1].content;
        assert!(summary.contains("I recognized these new symptoms: fever, cough"));
        assert!(summary.contains("You indicated you do not have: nausea"));
        assert!(summary.contains("Current symptoms: cough, fever"));

        assert_eq!(orch.session().symptoms().active_vec(), vec!["cough", "fever"]);
        assert_eq!(orch.session().symptoms().excluded_vec(), vec!["nausea"]);
    }

    #[tokio::test]
    async fn parse_failure_appends_generic_notice_without_mutation() {
        let api = MockApi::new().with_intent(Err(ApiError::Network("refused".into())));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("I feel off").await.unwrap();

        let entries = orch.session().transcript().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].content, "I had trouble understanding. Please try again.");
        assert!(orch.session().symptoms().is_empty());
    }

    #[tokio::test]
    async fn intent_with_no_changes_appends_no_summary() {
        let api = MockApi::new().with_intent(Ok(ParsedIntent::default()));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("hello there").await.unwrap();

        assert_eq!(kinds(&orch), vec![MessageKind::User]);
    }

    #[tokio::test]
    async fn requested_test_in_registry_is_registered() {
        let api = MockApi::new().with_intent(Ok(ParsedIntent {
            requested_tests: vec!["Diabetes".into(), "Cardiology".into()],
            ..Default::default()
        }));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("run a diabetes test").await.unwrap();

        assert!(orch.session().user_tests().contains("Diabetes"));
        assert!(!orch.session().user_tests().contains("Cardiology"));
        let notice = &orch.session().transcript().entries()[1].content;
        assert_eq!(notice, "Recommended tests based on your input:\n- Diabetes");
    }

    #[tokio::test]
    async fn requested_test_unknown_appends_explanation() {
        let api = MockApi::new().with_intent(Ok(ParsedIntent {
            requested_tests: vec!["Cardiology".into()],
            ..Default::default()
        }));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("run a cardiology test").await.unwrap();

        assert!(orch.session().user_tests().is_empty());
        let notice = &orch.session().transcript().entries()[1].content;
        assert_eq!(notice, "No specific tests available for your input.");
    }

    // ── iteration controller ──────────────────────────────────────────

    #[tokio::test]
    async fn start_with_no_symptoms_halts_silently() {
        let (mut orch, api, mut rx) = orchestrator(MockApi::new());

        let outcome = orch.start_analysis().await.unwrap();

        assert_eq!(outcome, TickOutcome::Halted);
        assert!(orch.session().transcript().is_empty());
        assert_eq!(orch.session().iteration(), 0);
        assert_eq!(orch.session().phase(), AnalysisPhase::Idle);
        assert_eq!(api.prediction_calls(), 0);
        assert_eq!(drain(&mut rx), vec!["analysis_started", "analysis_halted"]);
    }

    #[tokio::test]
    async fn finalizes_on_first_tick_at_threshold() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever", "cough"])))
            .with_predictions(Ok(vec![prediction("Flu", 82.0), prediction("Cold", 10.0)]))
            .with_details(Ok(vec![triage_core::DiseaseDetail {
                disease: "Flu".into(),
                description: Some("A viral infection.".into()),
                recommendations: vec!["Rest".into(), "Drink fluids".into()],
            }]));
        let (mut orch, api, _rx) = orchestrator(api);

        orch.handle_message("fever and cough").await.unwrap();
        let outcome = orch.start_analysis().await.unwrap();

        assert_eq!(outcome, TickOutcome::Finalized);
        assert_eq!(api.follow_up_calls(), 0);

        let predictions = prediction_messages(&orch);
        assert_eq!(predictions.len(), 1);
        assert!(predictions[0].starts_with("Final Prediction: Flu\nConfidence: 82.0%\n"));
        assert!(predictions[0].contains("Description: A viral infection."));
        assert!(predictions[0].contains("Recommendations:\n• Rest\n• Drink fluids"));

        assert_eq!(orch.session().phase(), AnalysisPhase::Idle);
        assert_eq!(orch.session().iteration(), 0);
    }

    #[tokio::test]
    async fn iteration_budget_exhaustion_finalizes() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_predictions(Ok(vec![prediction("Flu", 50.0)]))
            .with_predictions(Ok(vec![prediction("Flu", 50.0)]))
            .with_predictions(Ok(vec![prediction("Flu", 50.0)]))
            .with_follow_ups(Ok(vec![question("Flu", "Do you have chills?")]))
            .with_follow_ups(Ok(vec![question("Flu", "Do you have a headache?")]))
            .with_details(Ok(vec![]));
        let (mut orch, api, _rx) = orchestrator_with(api, AnalysisSettings::new(80.0, 3));

        orch.handle_message("fever").await.unwrap();
        assert_eq!(orch.start_analysis().await.unwrap(), TickOutcome::AwaitingFollowUps);
        assert_eq!(orch.submit_follow_ups(&[]).await.unwrap(), TickOutcome::AwaitingFollowUps);
        assert_eq!(orch.submit_follow_ups(&[]).await.unwrap(), TickOutcome::Finalized);

        assert_eq!(api.prediction_calls(), 3);
        assert_eq!(prediction_messages(&orch).len(), 1);
        assert!(prediction_messages(&orch)[0].contains("50.0%"));
        assert_eq!(orch.session().iteration(), 0);
    }

    #[tokio::test]
    async fn never_exceeds_max_iterations() {
        let mut api = MockApi::new().with_intent(Ok(add_intent(&["fever"]))).with_details(Ok(vec![]));
        for _ in 0..10 {
            api = api.with_predictions(Ok(vec![prediction("Flu", 50.0)]));
            api = api.with_follow_ups(Ok(vec![question("Flu", "More?")]));
        }
        let (mut orch, api, _rx) = orchestrator(api);

        orch.handle_message("fever").await.unwrap();
        let mut outcome = orch.start_analysis().await.unwrap();
        let mut rounds = 1;
        while outcome == TickOutcome::AwaitingFollowUps {
            outcome = orch.submit_follow_ups(&[]).await.unwrap();
            rounds += 1;
            assert!(rounds <= 20, "controller failed to terminate");
        }

        assert_eq!(outcome, TickOutcome::Finalized);
        assert_eq!(rounds, 5);
        assert_eq!(api.prediction_calls(), 5);
    }

    #[tokio::test]
    async fn skip_forces_finalization_and_clears_flag() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_predictions(Ok(vec![prediction("Flu", 50.0)]))
            .with_predictions(Ok(vec![prediction("Flu", 55.0)]))
            .with_follow_ups(Ok(vec![question("Flu", "Do you have chills?")]))
            .with_details(Ok(vec![]));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("fever").await.unwrap();
        assert_eq!(orch.start_analysis().await.unwrap(), TickOutcome::AwaitingFollowUps);
        assert_eq!(orch.skip_follow_ups().await.unwrap(), TickOutcome::Finalized);

        let predictions = prediction_messages(&orch);
        assert_eq!(predictions.len(), 1);
        assert!(predictions[0].contains("55.0%"));
        assert!(!orch.session().skip_follow_ups);
    }

    #[tokio::test]
    async fn no_predictions_halts_without_message() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_predictions(Ok(vec![]));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("fever").await.unwrap();
        let before = orch.session().transcript().len();
        let outcome = orch.start_analysis().await.unwrap();

        assert_eq!(outcome, TickOutcome::Halted);
        assert_eq!(orch.session().transcript().len(), before);
        assert_eq!(orch.session().phase(), AnalysisPhase::Idle);
        assert_eq!(orch.session().iteration(), 0);
    }

    #[tokio::test]
    async fn prediction_failure_degrades_to_halt() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_predictions(Err(ApiError::Http { status: 500, body: "internal".into() }));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("fever").await.unwrap();
        let outcome = orch.start_analysis().await.unwrap();

        assert_eq!(outcome, TickOutcome::Halted);
        assert_eq!(prediction_messages(&orch).len(), 0);
    }

    #[tokio::test]
    async fn detail_failure_still_appends_prediction() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_predictions(Ok(vec![prediction("Flu", 82.0)]))
            .with_details(Err(ApiError::Timeout(std::time::Duration::from_secs(15))));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("fever").await.unwrap();
        let outcome = orch.start_analysis().await.unwrap();

        assert_eq!(outcome, TickOutcome::Finalized);
        let predictions = prediction_messages(&orch);
        assert_eq!(predictions.len(), 1);
        assert!(predictions[0].contains("Flu"));
        assert!(predictions[0].contains("82.0%"));
        assert!(!predictions[0].contains("Description:"));
        assert!(!predictions[0].contains("Recommendations:"));
    }

    #[tokio::test]
    async fn finalize_notes_registry_test_and_recommends_it() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["thirst"])))
            .with_predictions(Ok(vec![prediction("Diabetes", 80.0)]))
            .with_details(Ok(vec![]));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("always thirsty").await.unwrap();
        orch.start_analysis().await.unwrap();

        let predictions = prediction_messages(&orch);
        assert!(predictions[0].contains("Specific Test Available: diabetes_test_model for Diabetes"));
        assert!(orch.session().recommended_tests().contains("Diabetes"));
    }

    #[tokio::test]
    async fn followups_populate_then_clear_on_next_tick() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_predictions(Ok(vec![prediction("Flu", 50.0)]))
            .with_predictions(Ok(vec![prediction("Flu", 85.0)]))
            .with_follow_ups(Ok(vec![
                question("Flu", "Do you have chills?"),
                question("Cold", "Do you have a runny nose?"),
            ]))
            .with_details(Ok(vec![]));
        let (mut orch, _api, mut rx) = orchestrator(api);

        orch.handle_message("fever").await.unwrap();
        orch.start_analysis().await.unwrap();
        assert_eq!(orch.session().pending_follow_ups().len(), 2);
        assert_eq!(orch.session().phase(), AnalysisPhase::AwaitingFollowups);

        let events = drain(&mut rx);
        assert!(events.contains(&"followups_ready"));

        orch.submit_follow_ups(&[("chills".into(), true)]).await.unwrap();
        assert!(orch.session().pending_follow_ups().is_empty());
        assert_eq!(orch.session().phase(), AnalysisPhase::Idle);
    }

    #[tokio::test]
    async fn followup_answers_move_symptoms_and_log_summary() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_predictions(Ok(vec![prediction("Flu", 50.0)]))
            .with_predictions(Ok(vec![prediction("Flu", 90.0)]))
            .with_follow_ups(Ok(vec![question("Flu", "Do you have chills?")]))
            .with_details(Ok(vec![]));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("fever").await.unwrap();
        orch.start_analysis().await.unwrap();
        orch.submit_follow_ups(&[("chills".into(), true), ("headache".into(), false)])
            .await
            .unwrap();

        assert_eq!(orch.session().symptoms().active_vec(), vec!["chills", "fever"]);
        assert_eq!(orch.session().symptoms().excluded_vec(), vec!["headache"]);

        let summary = orch
            .session()
            .transcript()
            .entries()
            .iter()
            .find(|m| m.content.starts_with("Additional symptoms:"))
            .map(|m| m.content.clone())
            .unwrap();
        assert_eq!(
            summary,
            "Additional symptoms: chills\nRemoved symptoms: headache\nCurrent symptoms: chills, fever"
        );
    }

    #[tokio::test]
    async fn followup_fetch_failure_still_awaits_answers() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_predictions(Ok(vec![prediction("Flu", 50.0)]))
            .with_predictions(Ok(vec![prediction("Flu", 60.0)]))
            .with_follow_ups(Err(ApiError::Network("refused".into())))
            .with_details(Ok(vec![]));
        let (mut orch, _api, _rx) = orchestrator(api);

        orch.handle_message("fever").await.unwrap();
        let outcome = orch.start_analysis().await.unwrap();

        assert_eq!(outcome, TickOutcome::AwaitingFollowUps);
        assert!(orch.session().pending_follow_ups().is_empty());

        // The user can still break out of the stalled round.
        assert_eq!(orch.skip_follow_ups().await.unwrap(), TickOutcome::Finalized);
    }

    #[tokio::test]
    async fn busy_guard_rejects_concurrent_trigger() {
        let (mut orch, _api, _rx) = orchestrator(MockApi::new());
        orch.in_flight = true;

        assert!(matches!(orch.start_analysis().await.unwrap_err(), EngineError::Busy));
        assert!(matches!(orch.submit_follow_ups(&[]).await.unwrap_err(), EngineError::Busy));
        assert!(matches!(orch.skip_follow_ups().await.unwrap_err(), EngineError::Busy));
    }

    #[tokio::test]
    async fn submit_without_pending_round_rejected() {
        let (mut orch, _api, _rx) = orchestrator(MockApi::new());
        let err = orch.submit_follow_ups(&[("fever".into(), true)]).await.unwrap_err();
        assert!(matches!(err, EngineError::NoPendingFollowUps));
        let err = orch.skip_follow_ups().await.unwrap_err();
        assert!(matches!(err, EngineError::NoPendingFollowUps));
    }

    // ── tests and session lifecycle ───────────────────────────────────

    #[tokio::test]
    async fn test_completion_records_and_reports_by_source() {
        let (mut orch, _api, _rx) = orchestrator(MockApi::new());
        orch.add_user_test("Diabetes").unwrap();

        orch.on_test_completed(
            "Diabetes",
            TestOutcome::Completed { predicted_class: "Diabetic".into(), confidence: 91.2 },
        );
        orch.on_test_completed(
            "Skin Diseases",
            TestOutcome::Completed { predicted_class: "Eczema".into(), confidence: 73.0 },
        );

        let entries = orch.session().transcript().entries();
        assert_eq!(
            entries[0].content,
            "(User-asked) Diabetes Test Result:\n• Prediction: Diabetic\n• Confidence: 91.2%\n• Status: Completed"
        );
        assert!(entries[1].content.starts_with("(Recommended) Skin Diseases Test Result:"));
        assert!(orch.session().test_record("Diabetes").unwrap().is_completed());
    }

    #[tokio::test]
    async fn test_rerun_overwrites_record() {
        let (mut orch, _api, _rx) = orchestrator(MockApi::new());

        orch.on_test_completed(
            "Diabetes",
            TestOutcome::Completed { predicted_class: "Diabetic".into(), confidence: 60.0 },
        );
        orch.on_test_completed(
            "Diabetes",
            TestOutcome::Completed { predicted_class: "Not Diabetic".into(), confidence: 88.0 },
        );

        assert_eq!(orch.session().test_records().len(), 1);
        match orch.session().test_record("Diabetes").unwrap() {
            TestOutcome::Completed { predicted_class, .. } => {
                assert_eq!(predicted_class, "Not Diabetic");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_test_reports_failure() {
        let (mut orch, _api, _rx) = orchestrator(MockApi::new());

        orch.on_test_completed(
            "Skin Diseases",
            TestOutcome::Failed { message: "Failed to get test result".into() },
        );

        let entries = orch.session().transcript().entries();
        assert_eq!(
            entries[0].content,
            "(Recommended) Skin Diseases Test Result:\n• Status: Failed (Failed to get test result)"
        );
        assert!(!orch.session().test_record("Skin Diseases").unwrap().is_completed());
    }

    #[tokio::test]
    async fn unknown_manual_test_rejected() {
        let (mut orch, _api, _rx) = orchestrator(MockApi::new());
        let err = orch.add_user_test("Cardiology").unwrap_err();
        assert!(matches!(err, EngineError::UnknownTest(name) if name == "Cardiology"));
    }

    #[tokio::test]
    async fn reset_clears_session_but_keeps_configuration() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_predictions(Ok(vec![prediction("Flu", 90.0)]))
            .with_details(Ok(vec![]));
        let (mut orch, _api, mut rx) = orchestrator_with(api, AnalysisSettings::new(65.0, 8));

        orch.handle_message("fever").await.unwrap();
        orch.start_analysis().await.unwrap();
        orch.add_user_test("Diabetes").unwrap();
        assert!(!orch.session().transcript().is_empty());

        orch.reset();

        assert!(orch.session().transcript().is_empty());
        assert!(orch.session().symptoms().is_empty());
        assert!(orch.session().user_tests().is_empty());
        assert_eq!(orch.session().phase(), AnalysisPhase::Idle);
        assert_eq!(orch.session().settings().target_confidence, 65.0);
        assert_eq!(orch.session().registry().model_for("Diabetes"), Some("diabetes_test_model"));
        assert_eq!(drain(&mut rx).last(), Some(&"session_reset"));
    }

    #[tokio::test]
    async fn transcript_length_is_monotone_within_session() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_intent(Err(ApiError::Service("down".into())))
            .with_predictions(Ok(vec![prediction("Flu", 90.0)]))
            .with_details(Ok(vec![]));
        let (mut orch, _api, _rx) = orchestrator(api);

        let mut last = 0;
        orch.handle_message("fever").await.unwrap();
        assert!(orch.session().transcript().len() >= last);
        last = orch.session().transcript().len();

        orch.handle_message("gibberish").await.unwrap();
        assert!(orch.session().transcript().len() >= last);
        last = orch.session().transcript().len();

        orch.start_analysis().await.unwrap();
        assert!(orch.session().transcript().len() >= last);
    }

    #[tokio::test]
    async fn events_follow_causal_order() {
        let api = MockApi::new()
            .with_intent(Ok(add_intent(&["fever"])))
            .with_predictions(Ok(vec![prediction("Flu", 90.0)]))
            .with_details(Ok(vec![]));
        let (mut orch, _api, mut rx) = orchestrator(api);

        orch.handle_message("fever").await.unwrap();
        orch.start_analysis().await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                "message_appended",
                "message_appended",
                "analysis_started",
                "message_appended",
                "analysis_finalized",
            ]
        );
    }
}
