use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use beaver_core::EvidencePath;

/// Category of a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    PodPhase,
    Condition,
    NodeCondition,
    ContainerAdded,
    ContainerRemoved,
    RestartCount,
    ContainerState,
    LastState,
    Event,
    Resources,
    Summary,
    KubectlCommands,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::PodPhase => "pod_phase",
            ChangeKind::Condition => "condition",
            ChangeKind::NodeCondition => "node_condition",
            ChangeKind::ContainerAdded => "container_added",
            ChangeKind::ContainerRemoved => "container_removed",
            ChangeKind::RestartCount => "restart_count",
            ChangeKind::ContainerState => "container_state",
            ChangeKind::LastState => "last_state",
            ChangeKind::Event => "event",
            ChangeKind::Resources => "resources",
            ChangeKind::Summary => "summary",
            ChangeKind::KubectlCommands => "kubectl_commands",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One difference between two snapshots. `Value::Null` stands for absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub path: EvidencePath,
    pub before: Value,
    pub after: Value,
    pub impact: String,
}

impl ChangeRecord {
    pub fn new(kind: ChangeKind, path: EvidencePath, before: Value, after: Value, impact: impl Into<String>) -> Self {
        Self {
            kind,
            path,
            before,
            after,
            impact: impact.into(),
        }
    }
}
