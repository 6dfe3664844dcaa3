use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One submitted transfer spec: a set of alternative sources and
/// destinations for a single logical file. The builder expands it into
/// the cross product of third-party-valid pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSpecDto {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,

    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub filesize: Option<i64>,
    #[serde(default)]
    pub activity: Option<String>,
    #[serde(default)]
    pub selection_strategy: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// One submitted deletion spec: a single namespace entry to remove.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionSpecDto {
    pub surl: String,

    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Submitted job parameters. Every field is optional: absence and an
/// explicit `null` both mean "apply the static default".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobParametersDto {
    #[serde(default)]
    pub bring_online: Option<i64>,
    #[serde(default)]
    pub copy_pin_lifetime: Option<i64>,
    #[serde(default)]
    pub verify_checksum: Option<bool>,
    #[serde(default)]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub reuse: Option<bool>,
    #[serde(default)]
    pub multihop: Option<bool>,
    #[serde(default)]
    pub retry: Option<i32>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub selection_strategy: Option<String>,
    #[serde(default)]
    pub job_metadata: Option<Value>,
    #[serde(default)]
    pub spacetoken: Option<String>,
    #[serde(default)]
    pub source_spacetoken: Option<String>,
}

/// A raw submission as handed over by the transport layer: either
/// transfer specs or deletion specs, never both, plus parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobSubmissionDto {
    #[serde(default)]
    pub transfers: Vec<TransferSpecDto>,
    #[serde(default)]
    pub deletions: Vec<DeletionSpecDto>,
    #[serde(default)]
    pub params: JobParametersDto,
}
