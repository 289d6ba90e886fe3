use displaydoc::Display as DisplayDoc;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, DisplayDoc)]
pub enum MalformedChainError {
    /// chain document is not shaped like a supply chain: {0}
    Undecodable(#[source] serde_json::Error),

    /// chain document has no metadata.name
    MissingName,
}

/// One supply chain from the cluster catalog. Chain names feed the chain
/// filter options; a run matches a chain when its workload-kind label equals
/// the chain name, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    pub name: String,
    pub namespace: Option<String>,
}

impl ChainSummary {
    pub fn from_value(value: Value) -> Result<Self, MalformedChainError> {
        let document: ChainDocument =
            serde_json::from_value(value).map_err(MalformedChainError::Undecodable)?;
        let metadata = document.metadata.unwrap_or_default();
        let name = metadata.name.ok_or(MalformedChainError::MissingName)?;
        Ok(ChainSummary {
            name,
            namespace: metadata.namespace,
        })
    }

    /// Parse the chain catalog, dropping malformed entries the same way run
    /// parsing does.
    pub fn parse_items(items: Vec<Value>) -> Vec<Self> {
        items
            .into_iter()
            .filter_map(|item| match Self::from_value(item) {
                Ok(chain) => Some(chain),
                Err(error) => {
                    tracing::warn!("skipping malformed chain: {error}");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ChainDocument {
    metadata: Option<ChainMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChainMetadata {
    name: Option<String>,
    namespace: Option<String>,
}
