use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use displaydoc::Display as DisplayDoc;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Label carrying the name of the workload a run belongs to.
pub const WORKLOAD_NAME_LABEL: &str = "supply-chain.apps.tanzu.vmware.com/workload-name";

/// Label carrying the workload kind, which doubles as the chain name.
pub const WORKLOAD_KIND_LABEL: &str = "supply-chain.apps.tanzu.vmware.com/workload-kind";

#[derive(Debug, Error, DisplayDoc)]
pub enum MalformedRunError {
    /// run document is not shaped like a run: {0}
    Undecodable(#[source] serde_json::Error),

    /// run document has no metadata.name
    MissingName,

    /// run {name} has no metadata.namespace
    MissingNamespace { name: String },

    /// run {namespace}/{name} reports {have} status conditions, readiness is the second
    MissingReadyCondition {
        namespace: String,
        name: String,
        have: usize,
    },
}

/// One fetched run, reduced to the fields the dashboard works with.
///
/// Built fresh on every fetch cycle and never mutated afterwards. The next
/// cycle replaces the whole collection, so downstream views either see the
/// previous snapshot or the next one, never a mix.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub namespace: String,
    pub name: String,
    /// Value of [`WORKLOAD_NAME_LABEL`], when the run carries it.
    pub workload: Option<String>,
    /// Value of [`WORKLOAD_KIND_LABEL`], when the run carries it.
    pub chain: Option<String>,
    /// ISO-8601 creation timestamp. Lexicographic order on these strings is
    /// chronological order, which is how run recency is compared.
    pub created: String,
    pub spec_stages: Vec<StageSpec>,
    /// Index-aligned with `spec_stages`, and allowed to be shorter: a stage
    /// the controller has not scheduled yet has no entry here.
    pub status_stages: Vec<StageStatusEntry>,
    pub conditions: Vec<Condition>,
}

impl RunSnapshot {
    pub fn from_value(value: Value) -> Result<Self, MalformedRunError> {
        let document: RunDocument =
            serde_json::from_value(value).map_err(MalformedRunError::Undecodable)?;
        Self::from_document(document)
    }

    /// Parse a fetched collection, dropping malformed items. A single bad run
    /// must not take the rest of the list down with it, so each failure is
    /// logged and skipped.
    pub fn parse_items(items: Vec<Value>) -> Vec<Self> {
        items
            .into_iter()
            .filter_map(|item| match Self::from_value(item) {
                Ok(run) => Some(run),
                Err(error) => {
                    tracing::warn!("skipping malformed run: {error}");
                    None
                }
            })
            .collect()
    }

    fn from_document(document: RunDocument) -> Result<Self, MalformedRunError> {
        let metadata = document.metadata.unwrap_or_default();
        let name = metadata.name.ok_or(MalformedRunError::MissingName)?;
        let namespace = metadata
            .namespace
            .ok_or_else(|| MalformedRunError::MissingNamespace { name: name.clone() })?;
        let workload = metadata.labels.get(WORKLOAD_NAME_LABEL).cloned();
        let chain = metadata.labels.get(WORKLOAD_KIND_LABEL).cloned();
        let workload_run = document.status.workload_run.unwrap_or_default();

        Ok(RunSnapshot {
            namespace,
            name,
            workload,
            chain,
            created: metadata.creation_timestamp.unwrap_or_default(),
            spec_stages: workload_run.spec.stages,
            status_stages: workload_run.status.stages,
            conditions: document.status.conditions,
        })
    }

    /// The run's readiness condition.
    ///
    /// By API convention this is the condition at index 1 (the second entry),
    /// positionally, not found by type. Runs reporting fewer than two
    /// conditions are malformed rather than an out-of-range access.
    pub fn ready_condition(&self) -> Result<&Condition, MalformedRunError> {
        self.conditions
            .get(1)
            .ok_or_else(|| MalformedRunError::MissingReadyCondition {
                namespace: self.namespace.clone(),
                name: self.name.clone(),
                have: self.conditions.len(),
            })
    }

    /// `"{workload}/{name}"`, the string the free-text filter matches
    /// against. Runs without a workload label keep the slash.
    pub fn search_key(&self) -> String {
        format!("{}/{}", self.workload.as_deref().unwrap_or(""), self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSpec {
    #[serde(default)]
    pub name: String,
    pub component_ref: Option<ObjectRef>,
    #[serde(default)]
    pub outputs: Vec<StageOutput>,
    /// Absent until the controller starts the stage's pipeline.
    pub pipeline: Option<PipelineSpec>,
    #[serde(default)]
    pub resumptions: Vec<ResumptionSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineSpec {
    pub started: Option<String>,
    pub completed: Option<String>,
    /// Tri-state: unset while running, then pass/fail.
    pub passed: Option<bool>,
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<RunResult>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResumptionSpec {
    #[serde(default)]
    pub name: String,
    pub key: Option<String>,
    pub message: Option<String>,
    pub started: Option<String>,
    pub completed: Option<String>,
    pub passed: Option<bool>,
    #[serde(default)]
    pub results: Vec<RunResult>,
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StageOutput {
    pub name: Option<String>,
    pub digest: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunResult {
    pub name: Option<String>,
    pub value: Option<Value>,
}

/// Controller-reported counterpart of a [`StageSpec`], pointing at the
/// pipeline-run object executing the stage. Correlated by index only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StageStatusEntry {
    #[serde(rename = "ref")]
    pub object_ref: Option<ObjectRef>,
    #[serde(default)]
    pub resumptions: Vec<ResumptionStatusEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResumptionStatusEntry {
    #[serde(rename = "ref")]
    pub object_ref: Option<ObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ObjectRef {
    pub kind: Option<String>,
    pub name: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub status: Option<String>,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub last_transition_time: Option<String>,
}

impl Condition {
    /// The message up to its first period, the short form shown in the list.
    pub fn first_sentence(&self) -> Option<&str> {
        self.message.as_deref().map(|message| match message.find('.') {
            Some(end) => &message[..end],
            None => message,
        })
    }
}

/// Readiness reasons the dashboard styles and offers as filter options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyReason {
    Running,
    Succeeded,
    Failed,
    PlatformFailed,
}

impl ReadyReason {
    pub const ALL: [ReadyReason; 4] = [
        ReadyReason::Running,
        ReadyReason::Succeeded,
        ReadyReason::Failed,
        ReadyReason::PlatformFailed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReadyReason::Running => "Running",
            ReadyReason::Succeeded => "Succeeded",
            ReadyReason::Failed => "Failed",
            ReadyReason::PlatformFailed => "PlatformFailed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .find(|reason| reason.as_str().eq_ignore_ascii_case(value))
            .copied()
    }
}

impl Display for ReadyReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RunDocument {
    metadata: Option<Metadata>,
    #[serde(default)]
    status: RunStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    name: Option<String>,
    namespace: Option<String>,
    creation_timestamp: Option<String>,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunStatus {
    #[serde(default)]
    conditions: Vec<Condition>,
    workload_run: Option<WorkloadRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WorkloadRun {
    #[serde(default)]
    spec: WorkloadRunSpec,
    #[serde(default)]
    status: WorkloadRunStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WorkloadRunSpec {
    #[serde(default)]
    stages: Vec<StageSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct WorkloadRunStatus {
    #[serde(default)]
    stages: Vec<StageStatusEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_run() -> Value {
        json!({
            "metadata": {
                "name": "web-run-abc12",
                "namespace": "dev",
                "creationTimestamp": "2024-01-02T00:00:00Z",
                "labels": {
                    WORKLOAD_NAME_LABEL: "web",
                    WORKLOAD_KIND_LABEL: "webapp"
                }
            },
            "status": {
                "conditions": [
                    { "type": "ResumptionsSucceeded", "status": "True" },
                    {
                        "type": "Ready",
                        "status": "False",
                        "reason": "Failed",
                        "message": "Stage test failed. Check the logs."
                    }
                ],
                "workloadRun": {
                    "spec": {
                        "stages": [{
                            "name": "build",
                            "componentRef": { "name": "builder", "namespace": "dev" },
                            "pipeline": { "started": "2024-01-02T00:01:00Z", "passed": true },
                            "resumptions": [{
                                "name": "check-source",
                                "key": "sha:abc",
                                "passed": true
                            }]
                        }]
                    },
                    "status": {
                        "stages": [{
                            "ref": { "kind": "PipelineRun", "name": "build-run-1", "namespace": "dev" },
                            "resumptions": [{ "ref": { "name": "check-source-run-1" } }]
                        }]
                    }
                }
            }
        })
    }

    #[test]
    fn full_document() {
        let run = RunSnapshot::from_value(full_run()).unwrap();
        assert_eq!(run.name, "web-run-abc12");
        assert_eq!(run.namespace, "dev");
        assert_eq!(run.workload.as_deref(), Some("web"));
        assert_eq!(run.chain.as_deref(), Some("webapp"));
        assert_eq!(run.created, "2024-01-02T00:00:00Z");
        assert_eq!(run.spec_stages.len(), 1);
        assert_eq!(run.spec_stages[0].resumptions[0].key.as_deref(), Some("sha:abc"));
        assert_eq!(
            run.status_stages[0]
                .object_ref
                .as_ref()
                .and_then(|r| r.name.as_deref()),
            Some("build-run-1")
        );
    }

    #[test]
    fn minimal_document() {
        let run = RunSnapshot::from_value(json!({
            "metadata": { "name": "r1", "namespace": "default" }
        }))
        .unwrap();
        assert_eq!(run.workload, None);
        assert_eq!(run.chain, None);
        assert_eq!(run.created, "");
        assert!(run.spec_stages.is_empty());
        assert!(run.status_stages.is_empty());
        assert!(run.conditions.is_empty());
    }

    #[test]
    fn missing_name() {
        let error = RunSnapshot::from_value(json!({
            "metadata": { "namespace": "default" }
        }))
        .unwrap_err();
        assert!(matches!(error, MalformedRunError::MissingName));
    }

    #[test]
    fn missing_namespace() {
        let error = RunSnapshot::from_value(json!({
            "metadata": { "name": "r1" }
        }))
        .unwrap_err();
        assert!(matches!(error, MalformedRunError::MissingNamespace { name } if name == "r1"));
    }

    #[test]
    fn not_a_run_at_all() {
        let error = RunSnapshot::from_value(json!("banana")).unwrap_err();
        assert!(matches!(error, MalformedRunError::Undecodable(_)));
    }

    #[test]
    fn ready_condition_is_second() {
        let run = RunSnapshot::from_value(full_run()).unwrap();
        let ready = run.ready_condition().unwrap();
        assert_eq!(ready.reason.as_deref(), Some("Failed"));
        assert_eq!(ready.first_sentence(), Some("Stage test failed"));
    }

    #[test]
    fn single_condition_is_malformed() {
        let run = RunSnapshot::from_value(json!({
            "metadata": { "name": "r1", "namespace": "default" },
            "status": { "conditions": [{ "type": "Ready", "reason": "Running" }] }
        }))
        .unwrap();
        let error = run.ready_condition().unwrap_err();
        assert!(matches!(
            error,
            MalformedRunError::MissingReadyCondition { have: 1, .. }
        ));
    }

    #[test]
    fn first_sentence_without_period() {
        let condition = Condition {
            message: Some("still going".into()),
            ..Default::default()
        };
        assert_eq!(condition.first_sentence(), Some("still going"));
        assert_eq!(Condition::default().first_sentence(), None);
    }

    #[test]
    fn parse_items_skips_malformed() {
        let items = vec![
            json!({ "metadata": { "name": "a", "namespace": "ns" } }),
            json!({ "metadata": { "namespace": "ns" } }),
            json!({ "metadata": { "name": "b", "namespace": "ns" } }),
        ];
        let runs = RunSnapshot::parse_items(items);
        assert_eq!(
            runs.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn search_key_includes_workload() {
        let run = RunSnapshot::from_value(full_run()).unwrap();
        assert_eq!(run.search_key(), "web/web-run-abc12");

        let unlabeled = RunSnapshot::from_value(json!({
            "metadata": { "name": "r1", "namespace": "default" }
        }))
        .unwrap();
        assert_eq!(unlabeled.search_key(), "/r1");
    }

    #[test]
    fn ready_reason_parse_ignores_case() {
        assert_eq!(ReadyReason::parse("running"), Some(ReadyReason::Running));
        assert_eq!(
            ReadyReason::parse("PLATFORMFAILED"),
            Some(ReadyReason::PlatformFailed)
        );
        assert_eq!(ReadyReason::parse("bogus"), None);
    }
}
