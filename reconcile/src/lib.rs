//! Pairs a run's declared stages with the controller's status array and
//! derives a health state per node.
//!
//! The two arrays correspond by position only. The status array may be
//! shorter than the spec array (stages the controller has not scheduled yet),
//! and nothing here assumes otherwise.

mod detail;

use std::fmt::{self, Display, Formatter};

use supwatch_model::{
    PipelineSpec, ResumptionSpec, ResumptionStatusEntry, RunSnapshot, StageSpec, StageStatusEntry,
};

pub use crate::detail::{ABSENT, Substitutions};

/// Derived execution state of a stage or resumption. Computed on every
/// reconcile from the current spec and status halves, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    NotStarted,
    Running,
    Failed,
    Succeeded,
}

impl HealthState {
    pub fn glyph(self) -> &'static str {
        match self {
            HealthState::NotStarted => "-",
            HealthState::Running => "~",
            HealthState::Failed => "X",
            HealthState::Succeeded => "✓",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::NotStarted => "NotStarted",
            HealthState::Running => "Running",
            HealthState::Failed => "Failed",
            HealthState::Succeeded => "Succeeded",
        }
    }
}

impl Display for HealthState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The reconciled hierarchy for one run: stages in declaration order, each
/// with its resumptions in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunTree {
    pub stages: Vec<StageNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageNode {
    pub spec: StageSpec,
    pub status: Option<StageStatusEntry>,
    pub health: HealthState,
    pub resumptions: Vec<ResumptionNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResumptionNode {
    pub spec: ResumptionSpec,
    pub status: Option<ResumptionStatusEntry>,
    pub health: HealthState,
}

/// Merge `spec_stages` and `status_stages` into one tree.
///
/// A stage whose pipeline has not been created is NotStarted and gets no
/// status half, whatever the status array holds at its position. Everything
/// else takes the status entry at its index when the array reaches that far.
pub fn reconcile(run: &RunSnapshot) -> RunTree {
    let stages = run
        .spec_stages
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let health = stage_health(spec);
            let status = if health == HealthState::NotStarted {
                None
            } else {
                run.status_stages.get(i).cloned()
            };

            let resumptions = spec
                .resumptions
                .iter()
                .enumerate()
                .map(|(j, resumption)| {
                    let health = resumption_health(resumption);
                    let status = if health == HealthState::NotStarted {
                        None
                    } else {
                        run.status_stages
                            .get(i)
                            .and_then(|entry| entry.resumptions.get(j))
                            .cloned()
                    };
                    ResumptionNode {
                        spec: resumption.clone(),
                        status,
                        health,
                    }
                })
                .collect();

            StageNode {
                spec: spec.clone(),
                status,
                health,
                resumptions,
            }
        })
        .collect();

    RunTree { stages }
}

fn stage_health(stage: &StageSpec) -> HealthState {
    match &stage.pipeline {
        None => HealthState::NotStarted,
        Some(pipeline) => execution_health(pipeline),
    }
}

fn execution_health(pipeline: &PipelineSpec) -> HealthState {
    started_health(
        pipeline.started.as_deref(),
        pipeline.completed.as_deref(),
        pipeline.passed,
    )
}

fn resumption_health(resumption: &ResumptionSpec) -> HealthState {
    if resumption.started.is_none() && resumption.completed.is_none() && resumption.passed.is_none()
    {
        return HealthState::NotStarted;
    }
    started_health(
        resumption.started.as_deref(),
        resumption.completed.as_deref(),
        resumption.passed,
    )
}

// Completed-but-passed-unset lands on Failed deliberately: once a pipeline
// finishes it is either passed or it is not, never still "running".
fn started_health(
    started: Option<&str>,
    completed: Option<&str>,
    passed: Option<bool>,
) -> HealthState {
    if started.is_some() && completed.is_none() {
        HealthState::Running
    } else if passed == Some(true) {
        HealthState::Succeeded
    } else {
        HealthState::Failed
    }
}

/// The compact per-run progress column: one glyph per execution, resumptions
/// before their stage's pipeline, stages in order. Driven by the raw `passed`
/// tri-state (a running pipeline shows as pending, not failed).
pub fn progress_line(run: &RunSnapshot) -> String {
    let mut line = String::new();
    for stage in &run.spec_stages {
        for resumption in &stage.resumptions {
            line.push(passed_glyph(resumption.passed));
        }
        line.push(match &stage.pipeline {
            Some(pipeline) => passed_glyph(pipeline.passed),
            None => '-',
        });
    }
    line
}

fn passed_glyph(passed: Option<bool>) -> char {
    match passed {
        Some(true) => '✓',
        Some(false) => 'X',
        None => '-',
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use supwatch_model::ObjectRef;

    fn run_from(value: serde_json::Value) -> RunSnapshot {
        RunSnapshot::from_value(value).unwrap()
    }

    fn stage(pipeline: serde_json::Value) -> serde_json::Value {
        json!({
            "metadata": { "name": "r", "namespace": "ns" },
            "status": { "workloadRun": { "spec": { "stages": [
                { "name": "s", "pipeline": pipeline }
            ] } } }
        })
    }

    #[test]
    fn stage_without_pipeline_is_not_started() {
        let run = run_from(json!({
            "metadata": { "name": "r", "namespace": "ns" },
            "status": { "workloadRun": {
                "spec": { "stages": [{ "name": "s" }] },
                "status": { "stages": [{ "ref": { "name": "stale" } }] }
            } }
        }));
        let tree = reconcile(&run);
        assert_eq!(tree.stages[0].health, HealthState::NotStarted);
        // no status half even though the controller wrote one
        assert_eq!(tree.stages[0].status, None);
    }

    #[test]
    fn started_without_completed_is_running() {
        let tree = reconcile(&run_from(stage(json!({ "started": "t1" }))));
        assert_eq!(tree.stages[0].health, HealthState::Running);
    }

    #[test]
    fn passed_true_is_succeeded() {
        let tree = reconcile(&run_from(stage(json!({
            "started": "t1", "completed": "t2", "passed": true
        }))));
        assert_eq!(tree.stages[0].health, HealthState::Succeeded);
    }

    #[test]
    fn passed_false_is_failed() {
        let tree = reconcile(&run_from(stage(json!({
            "started": "t1", "completed": "t2", "passed": false
        }))));
        assert_eq!(tree.stages[0].health, HealthState::Failed);
    }

    #[test]
    fn completed_without_passed_is_failed() {
        let tree = reconcile(&run_from(stage(json!({
            "started": "t1", "completed": "t2"
        }))));
        assert_eq!(tree.stages[0].health, HealthState::Failed);
    }

    #[test]
    fn build_and_test_scenario() {
        let run = run_from(json!({
            "metadata": { "name": "r", "namespace": "ns" },
            "status": { "workloadRun": {
                "spec": { "stages": [
                    { "name": "build", "pipeline": { "started": "t1" } },
                    { "name": "test", "pipeline": null }
                ] },
                "status": { "stages": [
                    { "ref": { "name": "build-run-1" } }
                ] }
            } }
        }));
        let tree = reconcile(&run);

        assert_eq!(tree.stages.len(), 2);
        assert_eq!(tree.stages[0].spec.name, "build");
        assert_eq!(tree.stages[0].health, HealthState::Running);
        assert_eq!(
            tree.stages[0].status,
            Some(StageStatusEntry {
                object_ref: Some(ObjectRef {
                    kind: None,
                    name: Some("build-run-1".into()),
                    namespace: None,
                }),
                resumptions: vec![],
            })
        );
        assert_eq!(tree.stages[1].spec.name, "test");
        assert_eq!(tree.stages[1].health, HealthState::NotStarted);
        assert_eq!(tree.stages[1].status, None);
    }

    #[test]
    fn status_array_shorter_than_spec() {
        let run = run_from(json!({
            "metadata": { "name": "r", "namespace": "ns" },
            "status": { "workloadRun": {
                "spec": { "stages": [
                    { "name": "a", "pipeline": { "started": "t1", "completed": "t2", "passed": true } },
                    { "name": "b", "pipeline": { "started": "t3" } },
                    { "name": "c" }
                ] },
                "status": { "stages": [{ "ref": { "name": "a-run" } }] }
            } }
        }));
        let tree = reconcile(&run);
        assert_eq!(tree.stages[0].status.is_some(), true);
        assert_eq!(tree.stages[1].health, HealthState::Running);
        assert_eq!(tree.stages[1].status, None);
        assert_eq!(tree.stages[2].health, HealthState::NotStarted);
        assert_eq!(tree.stages[2].status, None);
    }

    #[test]
    fn resumptions_classify_like_stages() {
        let run = run_from(json!({
            "metadata": { "name": "r", "namespace": "ns" },
            "status": { "workloadRun": {
                "spec": { "stages": [{
                    "name": "build",
                    "pipeline": { "started": "t1" },
                    "resumptions": [
                        { "name": "idle" },
                        { "name": "checking", "started": "t1" },
                        { "name": "ok", "started": "t1", "completed": "t2", "passed": true },
                        { "name": "bad", "started": "t1", "completed": "t2", "passed": false }
                    ]
                }] },
                "status": { "stages": [{
                    "ref": { "name": "build-run-1" },
                    "resumptions": [
                        { "ref": { "name": "idle-run" } },
                        { "ref": { "name": "checking-run" } }
                    ]
                }] }
            } }
        }));
        let tree = reconcile(&run);
        let resumptions = &tree.stages[0].resumptions;

        assert_eq!(resumptions[0].health, HealthState::NotStarted);
        assert_eq!(resumptions[0].status, None);
        assert_eq!(resumptions[1].health, HealthState::Running);
        assert_eq!(
            resumptions[1]
                .status
                .as_ref()
                .and_then(|s| s.object_ref.as_ref())
                .and_then(|r| r.name.as_deref()),
            Some("checking-run")
        );
        assert_eq!(resumptions[2].health, HealthState::Succeeded);
        assert_eq!(resumptions[2].status, None);
        assert_eq!(resumptions[3].health, HealthState::Failed);
    }

    #[test]
    fn progress_orders_resumptions_before_pipeline() {
        let run = run_from(json!({
            "metadata": { "name": "r", "namespace": "ns" },
            "status": { "workloadRun": { "spec": { "stages": [
                {
                    "name": "build",
                    "pipeline": { "passed": true },
                    "resumptions": [
                        { "name": "a", "passed": true },
                        { "name": "b", "passed": false }
                    ]
                },
                { "name": "test", "pipeline": { "started": "t1" } },
                { "name": "promote" }
            ] } } }
        }));
        assert_eq!(progress_line(&run), "✓X✓--");
    }
}
