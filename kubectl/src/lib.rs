//! The cluster-facing collaborators: run/chain queries through `kubectl` and
//! log retrieval through `stern`. Everything here shells out; nothing holds a
//! connection.

use std::fmt::{self, Display, Formatter};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use supwatch_cmd::{CommandError, CommandLine};
use supwatch_model::{ChainSummary, MalformedRunError, RunSnapshot};
use thiserror::Error;
use tracing::debug;

/// Label selecting the pods of a stage's pipeline-run.
pub const PIPELINE_RUN_LABEL: &str = "tekton.dev/pipelineRun";

/// Label selecting the pods of a resumption's task-run.
pub const TASK_RUN_LABEL: &str = "tekton.dev/taskRun";

#[derive(Error, Debug)]
pub enum KubectlError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("failed to parse output of: {command}")]
    Parse {
        command: String,
        #[source]
        error: serde_json::Error,
    },

    #[error(transparent)]
    MalformedRun(#[from] MalformedRunError),
}

/// Enough identity to address one run on the cluster. The resource type is
/// the workload kind with a `run` suffix, so a run of kind `webapp` is
/// fetched as `webapprun/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLocator {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl RunLocator {
    /// `None` when the run carries no workload-kind label, in which case its
    /// resource type cannot be composed.
    pub fn from_run(run: &RunSnapshot) -> Option<Self> {
        Some(RunLocator {
            kind: run.chain.clone()?,
            name: run.name.clone(),
            namespace: run.namespace.clone(),
        })
    }

    pub fn resource(&self) -> String {
        format!("{}run/{}", self.kind, self.name)
    }
}

impl Display for RunLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// The query surface the dashboard polls. [`Kubectl`] is the real
/// implementation; tests substitute scripted ones.
#[async_trait]
pub trait ClusterQuery: Send + Sync + 'static {
    async fn list_runs(&self) -> Result<Vec<RunSnapshot>, KubectlError>;

    async fn list_chains(&self) -> Result<Vec<ChainSummary>, KubectlError>;

    async fn get_run(&self, locator: &RunLocator) -> Result<RunSnapshot, KubectlError>;

    async fn delete_run(&self, locator: &RunLocator) -> Result<(), KubectlError>;
}

#[derive(Debug, Clone)]
pub struct Kubectl {
    kubectl: CommandLine,
}

impl Kubectl {
    pub fn new(kubectl: CommandLine) -> Self {
        Self { kubectl }
    }

    async fn output(&self, args: &[&str]) -> Result<(String, Vec<u8>), KubectlError> {
        let mut command = self.kubectl.command();
        command.args(args);
        let rendered = command.to_string();
        debug!("[kubectl] {rendered}");
        let stdout = command.output().await?;
        Ok((rendered, stdout))
    }

    async fn get_items(&self, resource: &str) -> Result<Vec<Value>, KubectlError> {
        let (command, stdout) = self.output(&["get", resource, "-A", "-ojson"]).await?;
        let list = parse_list(&stdout).map_err(|error| KubectlError::Parse { command, error })?;
        Ok(list)
    }
}

#[async_trait]
impl ClusterQuery for Kubectl {
    async fn list_runs(&self) -> Result<Vec<RunSnapshot>, KubectlError> {
        let items = self.get_items("all-runs").await?;
        Ok(RunSnapshot::parse_items(items))
    }

    async fn list_chains(&self) -> Result<Vec<ChainSummary>, KubectlError> {
        let items = self.get_items("supplychains").await?;
        Ok(ChainSummary::parse_items(items))
    }

    async fn get_run(&self, locator: &RunLocator) -> Result<RunSnapshot, KubectlError> {
        let (command, stdout) = self
            .output(&[
                "get",
                &locator.resource(),
                "-n",
                &locator.namespace,
                "-ojson",
            ])
            .await?;
        let value: Value =
            serde_json::from_slice(&stdout).map_err(|error| KubectlError::Parse { command, error })?;
        Ok(RunSnapshot::from_value(value)?)
    }

    async fn delete_run(&self, locator: &RunLocator) -> Result<(), KubectlError> {
        let mut command = self.kubectl.command();
        command.args(["delete", &locator.resource(), "-n", &locator.namespace]);
        debug!("[kubectl] {command}");
        command.run().await?;
        Ok(())
    }
}

/// Fetches raw log text for the pods behind a stage or resumption.
#[derive(Debug, Clone)]
pub struct Stern {
    stern: CommandLine,
}

impl Stern {
    pub fn new(stern: CommandLine) -> Self {
        Self { stern }
    }

    /// Collected (non-followed) log lines for pods matching `label=value`.
    /// Slow and best-effort; failures stay scoped to the log pane.
    pub async fn fetch_logs(&self, label: &str, value: &str) -> Result<String, KubectlError> {
        let mut command = self.stern.command();
        command.args(["--no-follow", "--selector"]);
        command.arg(format!("{label}={value}"));
        debug!("[stern] {command}");
        let stdout = command.output().await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

#[derive(Debug, Default, Deserialize)]
struct List {
    #[serde(default)]
    items: Vec<Value>,
}

fn parse_list(bytes: &[u8]) -> Result<Vec<Value>, serde_json::Error> {
    let list: List = serde_json::from_slice(bytes)?;
    Ok(list.items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn locator_composes_the_resource_type() {
        let locator = RunLocator {
            kind: "webapp".into(),
            name: "web-run-abc12".into(),
            namespace: "dev".into(),
        };
        assert_eq!(locator.resource(), "webapprun/web-run-abc12");
        assert_eq!(locator.to_string(), "dev/web-run-abc12");
    }

    #[test]
    fn locator_requires_the_kind_label() {
        let run = RunSnapshot::from_value(json!({
            "metadata": { "name": "r1", "namespace": "dev" }
        }))
        .unwrap();
        assert_eq!(RunLocator::from_run(&run), None);

        let run = RunSnapshot::from_value(json!({
            "metadata": {
                "name": "r1",
                "namespace": "dev",
                "labels": { supwatch_model::WORKLOAD_KIND_LABEL: "webapp" }
            }
        }))
        .unwrap();
        let locator = RunLocator::from_run(&run).unwrap();
        assert_eq!(locator.resource(), "webapprun/r1");
    }

    #[test]
    fn list_envelope_without_items_is_empty() {
        assert!(parse_list(br#"{"apiVersion": "v1", "kind": "List"}"#)
            .unwrap()
            .is_empty());
        let items = parse_list(br#"{"items": [1, 2]}"#).unwrap();
        assert_eq!(items.len(), 2);
    }
}
