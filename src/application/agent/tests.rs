//! Loop-level tests driven by a scripted model, covering the brake, the
//! memory window, resume, and the create-first policy end to end.

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::runner::{AgentRunner, RunOptions};
use crate::application::checkpoint::{CheckpointStore, MemoryCheckpointer};
use crate::application::notes::NoteStore;
use crate::application::tooling::ToolRegistry;
use crate::domain::types::{Action, StoppedReason};
use crate::infrastructure::model::{ModelError, ModelProvider};

/// Replays a fixed script of decisions; after the script runs out it keeps
/// repeating the last entry so over-long loops stay deterministic.
struct ScriptedProvider {
    script: Mutex<Vec<Value>>,
}

impl ScriptedProvider {
    fn new(script: Vec<Value>) -> Self {
        let mut script = script;
        script.reverse();
        Self {
            script: Mutex::new(script),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete_json(&self, _prompt: &str) -> Result<Value, ModelError> {
        let mut script = self.script.lock().expect("lock");
        if script.len() > 1 {
            Ok(script.pop().expect("non-empty"))
        } else {
            script.last().cloned().ok_or(ModelError::EmptyContent)
        }
    }
}

fn runner_with(
    script: Vec<Value>,
    checkpoints: Arc<dyn CheckpointStore>,
) -> (AgentRunner<ScriptedProvider>, Arc<NoteStore>) {
    let store = Arc::new(NoteStore::default());
    let runner = AgentRunner::new(
        Arc::new(ScriptedProvider::new(script)),
        store.clone(),
        Arc::new(ToolRegistry::builtin()),
        checkpoints,
    );
    (runner, store)
}

fn tool_call(tool_name: &str, args: Value) -> Value {
    json!({"type": "tool", "tool_name": tool_name, "args": args})
}

fn final_answer(answer: &str) -> Value {
    json!({"type": "final", "answer": answer, "citations": []})
}

#[tokio::test]
async fn tool_then_final_completes_in_two_iterations() {
    let (runner, store) = runner_with(
        vec![
            tool_call("search_notes", json!({"query": "okr"})),
            final_answer("nothing found"),
        ],
        Arc::new(MemoryCheckpointer::default()),
    );
    store.create("okr draft", "q3 targets").await;

    let outcome = runner
        .run("what do my okr notes say?", RunOptions::default())
        .await
        .expect("run succeeds");

    assert_eq!(outcome.stopped_reason, StoppedReason::Final);
    assert_eq!(outcome.answer, "nothing found");
    assert_eq!(outcome.steps.len(), 1);
    let step = &outcome.steps[0];
    assert_eq!(step.step, 1);
    assert!(step.observation.ok);
    assert_eq!(step.observation.tool_name, "search_notes");
}

#[tokio::test]
async fn step_brake_fires_at_max_steps() {
    // The script never finishes; the last entry repeats forever.
    let (runner, _store) = runner_with(
        vec![tool_call("search_notes", json!({"query": "loop"}))],
        Arc::new(MemoryCheckpointer::default()),
    );

    let outcome = runner
        .run(
            "keep searching",
            RunOptions {
                max_steps: 1,
                ..RunOptions::default()
            },
        )
        .await
        .expect("run succeeds");

    assert_eq!(outcome.stopped_reason, StoppedReason::MaxSteps);
    assert_eq!(outcome.steps.len(), 1);
    assert!(!outcome.answer.is_empty());
}

#[tokio::test]
async fn decision_failure_becomes_structured_error_outcome() {
    // Garbage on both the first call and the repair attempt.
    let (runner, _store) = runner_with(
        vec![json!({"nonsense": 1}), json!({"still": "nonsense"})],
        Arc::new(MemoryCheckpointer::default()),
    );

    let outcome = runner
        .run("what notes do I have?", RunOptions::default())
        .await
        .expect("failure folds into the outcome");

    assert_eq!(outcome.stopped_reason, StoppedReason::Error);
    assert!(!outcome.answer.is_empty());
    assert!(outcome.steps.is_empty());
}

#[tokio::test]
async fn resume_continues_a_thread_across_runner_instances() {
    let checkpoints: Arc<dyn CheckpointStore> = Arc::new(MemoryCheckpointer::default());

    let (first, _store) = runner_with(
        vec![tool_call("create_note", json!({"title": "a", "content": "b"}))],
        checkpoints.clone(),
    );
    let outcome = first
        .run(
            "create a note",
            RunOptions {
                thread_id: Some("t-resume".to_string()),
                max_steps: 1,
                ..RunOptions::default()
            },
        )
        .await
        .expect("first leg");
    assert_eq!(outcome.stopped_reason, StoppedReason::MaxSteps);
    assert_eq!(outcome.steps.len(), 1);

    // A fresh runner over the same checkpoint store picks up the history
    // and the iteration count: with max_steps 2 it has room for exactly
    // one more decision.
    let (second, _store) = runner_with(vec![final_answer("done")], checkpoints.clone());
    let outcome = second
        .run(
            "finish up",
            RunOptions {
                thread_id: Some("t-resume".to_string()),
                max_steps: 2,
                ..RunOptions::default()
            },
        )
        .await
        .expect("second leg");

    assert_eq!(outcome.stopped_reason, StoppedReason::Final);
    assert_eq!(outcome.answer, "done");
    assert_eq!(outcome.steps.len(), 1, "prior step survives the resume");
    assert_eq!(outcome.steps[0].step, 1);

    let view = second
        .state("t-resume")
        .await
        .expect("state load")
        .expect("thread exists");
    assert_eq!(view.steps_count, 1);
    assert_eq!(view.last_observation_ok, Some(true));
    assert!(view.next.is_empty(), "finished threads have no next step");
}

#[tokio::test]
async fn memory_window_drops_oldest_steps() {
    let mut script: Vec<Value> = (0..25)
        .map(|i| tool_call("search_notes", json!({"query": format!("q{i}")})))
        .collect();
    script.push(final_answer("done"));

    let (runner, _store) = runner_with(script, Arc::new(MemoryCheckpointer::default()));
    let runner = runner.with_memory_max_steps(20);

    let outcome = runner
        .run(
            "search a lot",
            RunOptions {
                max_steps: 30,
                ..RunOptions::default()
            },
        )
        .await
        .expect("run succeeds");

    assert_eq!(outcome.stopped_reason, StoppedReason::Final);
    assert_eq!(outcome.steps.len(), 20);
    // 25 tool steps ran; the 5 oldest fell out of the window.
    assert_eq!(outcome.steps[0].step, 6);
    assert_eq!(outcome.steps[19].step, 25);
}

#[tokio::test]
async fn create_intent_overrides_the_first_decision() {
    // The model tries to answer without doing anything; the policy forces
    // a create_note call instead on the first iteration.
    let (runner, store) = runner_with(
        vec![
            final_answer("sure, I could create that"),
            final_answer("created"),
        ],
        Arc::new(MemoryCheckpointer::default()),
    );

    let outcome = runner
        .run(
            "create a note titled groceries with content milk and eggs",
            RunOptions::default(),
        )
        .await
        .expect("run succeeds");

    assert_eq!(outcome.stopped_reason, StoppedReason::Final);
    assert_eq!(outcome.steps.len(), 1);
    match &outcome.steps[0].action {
        Action::Tool { tool_name, args } => {
            assert_eq!(tool_name, "create_note");
            assert_eq!(args["title"], json!("groceries"));
        }
        other => panic!("expected forced create_note, got {other:?}"),
    }
    assert!(outcome.steps[0].observation.ok);

    let notes = store.list().await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].title, "groceries");
}

#[tokio::test]
async fn unknown_prompt_key_is_an_error() {
    let (runner, _store) = runner_with(
        vec![final_answer("never reached")],
        Arc::new(MemoryCheckpointer::default()),
    );
    let err = runner
        .run(
            "hi",
            RunOptions {
                prompt_key: "react_step_v9".to_string(),
                ..RunOptions::default()
            },
        )
        .await
        .expect_err("unknown key rejected");
    assert!(err.to_string().contains("react_step_v9"));
}

#[tokio::test]
async fn state_for_unknown_thread_is_none() {
    let (runner, _store) = runner_with(vec![], Arc::new(MemoryCheckpointer::default()));
    assert!(
        runner
            .state("no-such-thread")
            .await
            .expect("load succeeds")
            .is_none()
    );
}
