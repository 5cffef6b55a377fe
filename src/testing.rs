//! Test doubles for the generation capability and the script runner.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::execution::script::{ScriptOutcome, ScriptRunner};
use crate::execution::workspace::SessionWorkspace;
use crate::llm::{GenerateError, GenerationRequest, Generator, Task};

pub const DEMO_QUESTIONS: [&str; 5] = [
    "Which stores had the highest sales last quarter? (SQL)",
    "How many customers bought organic products? (SQL)",
    "What is the average basket size per region? (SQL)",
    "What is our return policy for perishable goods? (RAG)",
    "How should staff handle loyalty card complaints? (RAG)",
];

/// Replies that the fake reviewer treats as approval.
const AFFIRMATIONS: &[&str] = &["yes", "y", "ok", "okay", "approve", "approved", "looks good", "lgtm"];

/// Answers each task with a canned reply. Queued replies take precedence
/// over the defaults, and every request is recorded.
#[derive(Default)]
pub struct ScriptedGenerator {
    queued: Mutex<HashMap<Task, VecDeque<Value>>>,
    failing: Mutex<HashSet<Task>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next request of `task`.
    pub fn push(&self, task: Task, value: Value) {
        self.queued.lock().unwrap().entry(task).or_default().push_back(value);
    }

    /// Makes every request of `task` fail.
    pub fn fail_on(&self, task: Task) {
        self.failing.lock().unwrap().insert(task);
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, task: Task) -> Vec<GenerationRequest> {
        self.requests().into_iter().filter(|r| r.task == task).collect()
    }

    pub fn count(&self, task: Task) -> usize {
        self.requests_for(task).len()
    }

    fn default_output(request: &GenerationRequest) -> Value {
        let input = |key: &str| {
            request
                .inputs
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        match request.task {
            Task::Scenario => json!({
                "demo_description": "Retail analytics demo for a regional grocery chain.",
                "questions": DEMO_QUESTIONS,
            }),
            Task::PresentScenario => json!({"message": "Here is the demo idea. Does it look good?"}),
            Task::ReviewFeedback => {
                let reply = input("human_input").trim().trim_end_matches(['.', '!']).to_lowercase();
                json!({"approved": AFFIRMATIONS.contains(&reply.as_str())})
            }
            Task::DatasetScript => json!({
                "script": "import pandas as pd\n",
                "schema": "retail_demo",
                "agent_name": "Retail Agent",
            }),
            Task::ValidateDatasetScript => json!({"script": input("script")}),
            Task::RepairDatasetScript => json!({"script": format!("# fixed\n{}", input("script"))}),
            Task::DocumentPlan => json!({
                "documents": [{
                    "title": "Return Policy",
                    "url": "https://example.com/returns",
                    "generation_description": "Store return policy for perishable goods",
                }]
            }),
            Task::Document => json!({"text": "Perishable goods may be returned within 7 days, with receipt."}),
            Task::SemanticModel | Task::ValidateSemanticModel => json!({
                "semantic_model_yaml": "name: retail\ntables:\n  - name: CUSTOMERS\n",
            }),
            Task::AgentDescription => json!({
                "agent_description": "This agent answers questions about grocery retail operations.",
                "sample_questions": DEMO_QUESTIONS,
            }),
            Task::Summary => json!({"summary": "The retail demo is ready."}),
        }
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Value, GenerateError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.failing.lock().unwrap().contains(&request.task) {
            return Err(GenerateError::Rejected(format!("{} is unavailable", request.task)));
        }

        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&request.task)
            .and_then(VecDeque::pop_front);

        Ok(queued.unwrap_or_else(|| Self::default_output(request)))
    }
}

/// Plays back queued outcomes. Successful outcomes write their artifacts
/// into the workspace output directory; the default is one customers table.
#[derive(Default)]
pub struct FakeRunner {
    outcomes: Mutex<VecDeque<ScriptOutcome>>,
    scripts: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: ScriptOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn fail(&self, detail: &str) {
        self.push(ScriptOutcome::Failed {
            detail: detail.to_string(),
        });
    }

    pub fn succeed(&self, artifacts: &[&str]) {
        self.push(ScriptOutcome::Succeeded {
            artifacts: artifacts.iter().map(|a| a.to_string()).collect(),
        });
    }

    /// Scripts received, in call order.
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

impl ScriptRunner for FakeRunner {
    fn run(&self, script: &str, workspace: &SessionWorkspace) -> ScriptOutcome {
        self.scripts.lock().unwrap().push(script.to_string());

        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptOutcome::Succeeded {
                artifacts: vec!["CUSTOMERS.csv".to_string()],
            });

        let dir = workspace.reset_output_dir().unwrap();
        if let ScriptOutcome::Succeeded { artifacts } = &outcome {
            for name in artifacts {
                fs::write(dir.join(name), "ID,NAME\n1,Ann\n2,Bob\n").unwrap();
            }
        }
        outcome
    }
}

/// Collaborators for exercising single steps in isolation.
pub struct StepHarness {
    pub generator: ScriptedGenerator,
    pub runner: FakeRunner,
    pub warehouse: crate::warehouse::LocalWarehouse,
    pub workspace: SessionWorkspace,
    _temp_dir: tempfile::TempDir,
}

impl StepHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let warehouse =
            crate::warehouse::LocalWarehouse::new(temp_dir.path().join("warehouse"), "DEMO_DB").unwrap();
        let workspace = SessionWorkspace::create(
            &temp_dir.path().join("sessions"),
            &crate::workflow::checkpoint::SessionId::generate(),
        )
        .unwrap();

        Self {
            generator: ScriptedGenerator::new(),
            runner: FakeRunner::new(),
            warehouse,
            workspace,
            _temp_dir: temp_dir,
        }
    }

    pub fn services(&self) -> crate::steps::StepServices<'_> {
        crate::steps::StepServices {
            generator: &self.generator,
            runner: &self.runner,
            warehouse: &self.warehouse,
            workspace: &self.workspace,
        }
    }
}
