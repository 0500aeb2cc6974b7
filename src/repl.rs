//! Line-based interactive surface over the session engine.
//!
//! Free text goes through intent extraction; slash commands drive the
//! analysis loop and the test runners. Transcript output is rendered from
//! the session event stream so it matches what the engine recorded.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use triage_core::{
    ApiError, Message, MessageKind, SessionEvent, TabularFeatures, TestOutcome, TriageApi,
};
use triage_engine::{EngineError, Orchestrator, TickOutcome};

pub async fn run(
    orchestrator: Orchestrator,
    api: Arc<dyn TriageApi>,
    events: broadcast::Receiver<SessionEvent>,
) -> Result<()> {
    Repl { orchestrator, api, events }.run().await
}

struct Repl {
    orchestrator: Orchestrator,
    api: Arc<dyn TriageApi>,
    events: broadcast::Receiver<SessionEvent>,
}

impl Repl {
    async fn run(mut self) -> Result<()> {
        println!("Symptom triage ready. Describe your symptoms, or type /help for commands.");
        let stdin = tokio::io::stdin();
        let mut reader = BufReader::new(stdin).lines();
        loop {
            print!("triage> ");
            std::io::stdout().flush()?;
            let line = match reader.next_line().await? {
                Some(line) => line.trim().to_string(),
                None => break,
            };
            if line.is_empty() {
                continue;
            }

            if let Some(command) = line.strip_prefix('/') {
                if !self.handle_command(command).await {
                    break;
                }
            } else if let Err(e) = self.orchestrator.handle_message(&line).await {
                println!("error: {e}");
            }
            self.render_new_messages();
        }
        Ok(())
    }

    /// Returns false when the loop should exit.
    async fn handle_command(&mut self, command: &str) -> bool {
        let mut parts = command.splitn(2, ' ');
        let name = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match name {
            "start" => {
                let result = self.orchestrator.start_analysis().await;
                self.report_tick(result);
            }
            "answer" => self.answer(rest).await,
            "skip" => {
                let result = self.orchestrator.skip_follow_ups().await;
                self.report_tick(result);
            }
            "followups" => self.print_follow_ups(),
            "symptoms" => self.print_symptoms(),
            "tests" => self.print_tests(),
            "test" => self.add_test(rest),
            "run" => self.run_test(rest).await,
            "settings" => self.settings(rest),
            "reset" => {
                self.orchestrator.reset();
                println!("Session cleared.");
            }
            "help" => print_help(),
            "quit" | "exit" => return false,
            other => println!("Unknown command: /{other}. Type /help for usage."),
        }
        true
    }

    fn render_new_messages(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::MessageAppended { message, .. }) => print_message(&message),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged, rendering may have gaps");
                }
                Err(_) => break,
            }
        }
    }

    fn report_tick(&mut self, result: Result<TickOutcome, EngineError>) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                println!("error: {e}");
                return;
            }
        };
        // Drain first so transcript lines land before the status line.
        self.render_new_messages();
        match outcome {
            TickOutcome::Halted => {
                println!("Analysis stopped: nothing to work with yet. Describe your symptoms first.");
            }
            TickOutcome::Finalized => {}
            TickOutcome::AwaitingFollowUps => self.print_follow_ups(),
        }
    }

    async fn answer(&mut self, rest: &str) {
        let mut answers = Vec::new();
        for token in rest.split_whitespace() {
            let Some((symptom, value)) = token.split_once('=') else {
                println!("Ignoring '{token}': expected <symptom>=yes|no");
                continue;
            };
            match value.to_ascii_lowercase().as_str() {
                "yes" | "y" => answers.push((symptom.to_string(), true)),
                "no" | "n" => answers.push((symptom.to_string(), false)),
                other => println!("Ignoring '{symptom}': '{other}' is not yes or no"),
            }
        }
        let result = self.orchestrator.submit_follow_ups(&answers).await;
        self.report_tick(result);
    }

    fn print_follow_ups(&self) {
        let pending = self.orchestrator.session().pending_follow_ups();
        if pending.is_empty() {
            println!("No follow-up questions this round. /answer with anything you know, or /skip.");
            return;
        }
        println!("Follow-up questions (reply with /answer <symptom>=yes|no ..., or /skip):");
        for q in pending {
            println!("  [{}] {} ({})", q.disease, q.question, q.symptoms.join(", "));
        }
    }

    fn print_symptoms(&self) {
        let symptoms = self.orchestrator.session().symptoms();
        println!("Active: {}", display_list(&symptoms.active_vec()));
        println!("Excluded: {}", display_list(&symptoms.excluded_vec()));
    }

    fn print_tests(&self) {
        let session = self.orchestrator.session();
        if session.registry().is_empty() {
            println!("No specific tests available.");
            return;
        }
        println!("Available tests:");
        for (name, model) in session.registry().iter() {
            let status = match session.test_record(name) {
                Some(outcome) if outcome.is_completed() => "completed",
                Some(_) => "failed",
                None => "not run",
            };
            let mut flags = Vec::new();
            if session.user_tests().contains(name) {
                flags.push("user-asked");
            }
            if session.recommended_tests().contains(name) {
                flags.push("recommended");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            println!("  {name} ({model}) — {status}{flags}");
        }
    }

    fn add_test(&mut self, rest: &str) {
        let Some(name) = rest.strip_prefix("add ") else {
            println!("usage: /test add <name>");
            return;
        };
        let name = name.trim();
        match self.orchestrator.add_user_test(name) {
            Ok(()) => println!("Added {name} to your requested tests. Run it with /run {name} ..."),
            Err(e) => println!("error: {e}"),
        }
    }

    /// `/run <test name> key=value ...`. The test name is every token up
    /// to the first `key=value` pair, so names with spaces work.
    async fn run_test(&mut self, rest: &str) {
        let tokens: Vec<&str> = rest.split_whitespace().collect();
        let split = tokens
            .iter()
            .position(|t| t.contains('='))
            .unwrap_or(tokens.len());
        let name = tokens[..split].join(" ");
        if name.is_empty() {
            println!("usage: /run <test name> key=value ...");
            return;
        }
        if !self.orchestrator.session().registry().contains(&name) {
            println!("Unknown test: {name}. See /tests for the catalog.");
            return;
        }

        let params = &tokens[split..];
        let result = match name.as_str() {
            "Diabetes" => self.run_tabular(params).await,
            "Skin Diseases" => self.run_image(params).await,
            other => {
                println!("No local runner for {other}.");
                return;
            }
        };

        match result {
            Ok(outcome) => self.orchestrator.on_test_completed(&name, outcome),
            // Transport and server failures still count as a completed run
            // that failed; only local input rejections stop short.
            Err(e) if e.is_degradable() => {
                self.orchestrator
                    .on_test_completed(&name, TestOutcome::Failed { message: e.to_string() });
            }
            Err(e) => println!("{e}"),
        }
    }

    async fn run_tabular(&self, params: &[&str]) -> Result<TestOutcome, ApiError> {
        let mut features = TabularFeatures::default();
        for token in params {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            let Ok(value) = value.parse::<f64>() else {
                println!("Ignoring '{key}': '{value}' is not a number");
                continue;
            };
            match key {
                "pregnancies" => features.pregnancies = value,
                "glucose" => features.glucose = value,
                "blood_pressure" => features.blood_pressure = value,
                "skin_thickness" => features.skin_thickness = value,
                "insulin" => features.insulin = value,
                "bmi" => features.bmi = value,
                "diabetes_pedigree_function" => features.diabetes_pedigree_function = value,
                "age" => features.age = value,
                other => println!("Ignoring unknown parameter '{other}'"),
            }
        }
        self.api.tabular_test(&features).await
    }

    async fn run_image(&self, params: &[&str]) -> Result<TestOutcome, ApiError> {
        let path = params
            .iter()
            .find_map(|t| t.strip_prefix("file="))
            .unwrap_or("");
        if path.is_empty() {
            return Err(ApiError::InvalidRequest("Please select an image".into()));
        }
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Err(ApiError::InvalidRequest(format!("Could not read {path}: {e}")));
            }
        };
        let file_name = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.png");
        self.api.image_test(file_name, bytes).await
    }

    fn settings(&mut self, rest: &str) {
        if rest.is_empty() {
            let settings = self.orchestrator.session().settings();
            println!("target_confidence = {}", settings.target_confidence);
            println!("max_iterations = {}", settings.max_iterations);
            return;
        }

        let current = self.orchestrator.session().settings();
        let mut target = current.target_confidence;
        let mut iterations = current.max_iterations;
        for token in rest.split_whitespace() {
            match token.split_once('=') {
                Some(("target", value)) => match value.parse() {
                    Ok(value) => target = value,
                    Err(_) => println!("Ignoring target: '{value}' is not a number"),
                },
                Some(("iterations", value)) => match value.parse() {
                    Ok(value) => iterations = value,
                    Err(_) => println!("Ignoring iterations: '{value}' is not a number"),
                },
                _ => println!("Ignoring '{token}': expected target=<1-100> or iterations=<1-20>"),
            }
        }
        self.orchestrator.update_settings(target, iterations);

        let settings = self.orchestrator.session().settings();
        println!(
            "Settings updated: target_confidence = {}, max_iterations = {}",
            settings.target_confidence, settings.max_iterations
        );
    }
}

fn print_message(message: &Message) {
    let tag = match message.kind {
        MessageKind::User => "you",
        MessageKind::Assistant => "assistant",
        MessageKind::Prediction => "prediction",
        MessageKind::TestResult => "test",
    };
    println!("[{tag}] {}", message.content);
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items.join(", ")
    }
}

fn print_help() {
    println!("Commands:");
    println!("  <free text>            describe symptoms in plain language");
    println!("  /start                 run the analysis loop on the current symptoms");
    println!("  /answer s=yes t=no     answer pending follow-up questions");
    println!("  /skip                  skip follow-ups and finalize this round");
    println!("  /followups             show pending follow-up questions");
    println!("  /symptoms              show active and excluded symptoms");
    println!("  /tests                 show the test catalog and results");
    println!("  /test add <name>       mark a catalog test as one you want to run");
    println!("  /run <name> k=v ...    run a test (Diabetes: glucose=120 bmi=31.5 ...,");
    println!("                         Skin Diseases: file=/path/to/image.png)");
    println!("  /settings [target=80 iterations=5]");
    println!("  /reset                 clear the session");
    println!("  /quit                  exit");
}
