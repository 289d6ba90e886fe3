use indexmap::IndexMap;
use serde_json::Value;
use supwatch_model::{ObjectRef, RunResult, StageOutput};

use crate::{ResumptionNode, StageNode};

/// The one placeholder substituted wherever a field is absent. Template
/// output and the detail panel both show it verbatim.
pub const ABSENT: &str = "<none>";

/// Ordered key→value pairs derived from a selected node, ready for a
/// template renderer or a key/value panel. Every key is always present;
/// values fall back to [`ABSENT`].
pub type Substitutions = IndexMap<&'static str, String>;

impl StageNode {
    pub fn substitutions(&self) -> Substitutions {
        let pipeline = self.spec.pipeline.as_ref();
        IndexMap::from([
            ("name", text(Some(&self.spec.name))),
            ("health", self.health.to_string()),
            (
                "component",
                object_ref(self.spec.component_ref.as_ref()),
            ),
            ("started", text(pipeline.and_then(|p| p.started.as_deref()))),
            (
                "completed",
                text(pipeline.and_then(|p| p.completed.as_deref())),
            ),
            ("passed", tri_state(pipeline.and_then(|p| p.passed))),
            ("message", text(pipeline.and_then(|p| p.message.as_deref()))),
            (
                "results",
                results(pipeline.map(|p| p.results.as_slice()).unwrap_or(&[])),
            ),
            ("outputs", outputs(&self.spec.outputs)),
            (
                "ref",
                object_ref(self.status.as_ref().and_then(|s| s.object_ref.as_ref())),
            ),
        ])
    }
}

impl ResumptionNode {
    pub fn substitutions(&self) -> Substitutions {
        IndexMap::from([
            ("name", text(Some(&self.spec.name))),
            ("health", self.health.to_string()),
            ("key", text(self.spec.key.as_deref())),
            ("started", text(self.spec.started.as_deref())),
            ("completed", text(self.spec.completed.as_deref())),
            ("passed", tri_state(self.spec.passed)),
            ("message", text(self.spec.message.as_deref())),
            ("results", results(&self.spec.results)),
            ("digest", text(self.spec.digest.as_deref())),
            (
                "ref",
                object_ref(self.status.as_ref().and_then(|s| s.object_ref.as_ref())),
            ),
        ])
    }
}

fn text(value: Option<&str>) -> String {
    match value {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => ABSENT.to_string(),
    }
}

fn tri_state(passed: Option<bool>) -> String {
    match passed {
        Some(true) => "true".to_string(),
        Some(false) => "false".to_string(),
        None => ABSENT.to_string(),
    }
}

fn object_ref(reference: Option<&ObjectRef>) -> String {
    let Some(reference) = reference else {
        return ABSENT.to_string();
    };
    let name = match (&reference.namespace, &reference.name) {
        (Some(namespace), Some(name)) => format!("{namespace}/{name}"),
        (None, Some(name)) => name.clone(),
        _ => return ABSENT.to_string(),
    };
    match &reference.kind {
        Some(kind) => format!("{kind} {name}"),
        None => name,
    }
}

fn results(results: &[RunResult]) -> String {
    if results.is_empty() {
        return ABSENT.to_string();
    }
    results
        .iter()
        .map(|result| match (&result.name, &result.value) {
            (Some(name), Some(value)) => format!("{name}={}", plain(value)),
            (Some(name), None) => name.clone(),
            (None, Some(value)) => plain(value),
            (None, None) => ABSENT.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn outputs(outputs: &[StageOutput]) -> String {
    if outputs.is_empty() {
        return ABSENT.to_string();
    }
    outputs
        .iter()
        .map(|output| match (&output.name, &output.digest) {
            (Some(name), Some(digest)) => format!("{name}@{digest}"),
            (Some(name), None) => name.clone(),
            (None, Some(digest)) => digest.clone(),
            (None, None) => ABSENT.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

// Strings render bare; everything else as compact JSON.
fn plain(value: &Value) -> String {
    match value {
        Value::String(string) => string.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile;
    use serde_json::json;
    use supwatch_model::RunSnapshot;

    fn tree_from(value: serde_json::Value) -> crate::RunTree {
        reconcile(&RunSnapshot::from_value(value).unwrap())
    }

    #[test]
    fn stage_substitutions_fill_every_key() {
        let tree = tree_from(json!({
            "metadata": { "name": "r", "namespace": "ns" },
            "status": { "workloadRun": {
                "spec": { "stages": [{
                    "name": "build",
                    "componentRef": { "name": "builder", "namespace": "dev" },
                    "outputs": [{ "name": "image", "digest": "sha256:aa" }],
                    "pipeline": {
                        "started": "t1",
                        "completed": "t2",
                        "passed": true,
                        "message": "done",
                        "results": [
                            { "name": "url", "value": "https://img" },
                            { "name": "attempts", "value": 2 }
                        ]
                    }
                }] },
                "status": { "stages": [{
                    "ref": { "kind": "PipelineRun", "name": "build-run-1", "namespace": "dev" }
                }] }
            } }
        }));

        let substitutions = tree.stages[0].substitutions();
        assert_eq!(substitutions["name"], "build");
        assert_eq!(substitutions["health"], "Succeeded");
        assert_eq!(substitutions["component"], "dev/builder");
        assert_eq!(substitutions["started"], "t1");
        assert_eq!(substitutions["completed"], "t2");
        assert_eq!(substitutions["passed"], "true");
        assert_eq!(substitutions["message"], "done");
        assert_eq!(substitutions["results"], "url=https://img, attempts=2");
        assert_eq!(substitutions["outputs"], "image@sha256:aa");
        assert_eq!(substitutions["ref"], "PipelineRun dev/build-run-1");
    }

    #[test]
    fn absent_fields_use_the_placeholder() {
        let tree = tree_from(json!({
            "metadata": { "name": "r", "namespace": "ns" },
            "status": { "workloadRun": { "spec": { "stages": [{ "name": "test" }] } } }
        }));

        let substitutions = tree.stages[0].substitutions();
        assert_eq!(substitutions["started"], ABSENT);
        assert_eq!(substitutions["passed"], ABSENT);
        assert_eq!(substitutions["results"], ABSENT);
        assert_eq!(substitutions["outputs"], ABSENT);
        assert_eq!(substitutions["ref"], ABSENT);
    }

    #[test]
    fn resumption_substitutions() {
        let tree = tree_from(json!({
            "metadata": { "name": "r", "namespace": "ns" },
            "status": { "workloadRun": {
                "spec": { "stages": [{
                    "name": "build",
                    "pipeline": { "started": "t1" },
                    "resumptions": [{
                        "name": "check-source",
                        "key": "sha:abc",
                        "started": "t1",
                        "digest": "sha256:bb"
                    }]
                }] },
                "status": { "stages": [{
                    "ref": { "name": "build-run-1" },
                    "resumptions": [{ "ref": { "name": "check-run-9" } }]
                }] }
            } }
        }));

        let substitutions = tree.stages[0].resumptions[0].substitutions();
        assert_eq!(substitutions["name"], "check-source");
        assert_eq!(substitutions["health"], "Running");
        assert_eq!(substitutions["key"], "sha:abc");
        assert_eq!(substitutions["digest"], "sha256:bb");
        assert_eq!(substitutions["ref"], "check-run-9");
        assert_eq!(substitutions["message"], ABSENT);
    }

    #[test]
    fn key_order_is_stable() {
        let tree = tree_from(json!({
            "metadata": { "name": "r", "namespace": "ns" },
            "status": { "workloadRun": { "spec": { "stages": [{ "name": "s" }] } } }
        }));
        let keys: Vec<_> = tree.stages[0].substitutions().keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                "name",
                "health",
                "component",
                "started",
                "completed",
                "passed",
                "message",
                "results",
                "outputs",
                "ref"
            ]
        );
    }
}
