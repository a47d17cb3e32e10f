//! What a migration run reports back to the operator

use crate::pipeline::{ContentKind, Stage};
use content::{CirculationAudit, IdentifierMapping};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// `{from: to}` pair heading every identifier mapping in a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportHeader {
    pub from: String,
    pub to: String,
}

impl ReportHeader {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    fn start(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(self.from.clone(), Value::String(self.to.clone()));
        map
    }

    /// Header followed by every old-to-new pair of `mapping`
    pub fn mapping(&self, mapping: &IdentifierMapping) -> Map<String, Value> {
        let mut map = self.start();
        map.extend(mapping.to_json());
        map
    }

    /// Header followed by every resolved shared entity; unresolved ones are null
    pub fn shared_entities(&self, entries: &BTreeMap<String, Option<String>>) -> Map<String, Value> {
        let mut map = self.start();
        for (source, destination) in entries {
            let value = destination
                .as_ref()
                .map(|id| Value::String(id.clone()))
                .unwrap_or(Value::Null);
            map.insert(source.clone(), value);
        }
        map
    }
}

/// Identifiers found for one entity kind
///
/// Regenerated kinds are reported as a mapping; portable kinds as a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReferenceEntries {
    Mapped(Map<String, Value>),
    Listed(Vec<String>),
}

impl ReferenceEntries {
    pub fn listed(ids: &BTreeSet<String>) -> Self {
        ReferenceEntries::Listed(ids.iter().cloned().collect())
    }
}

/// Result of recreating one redirect
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedirectOutcome {
    pub url: String,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RedirectsReport {
    NotEvaluated(String),
    Outcomes(Vec<RedirectOutcome>),
}

/// Every reference a migrated document carries, by kind
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ReferenceEntries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub galleries: Option<ReferenceEntries>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub videos: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_stories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_content: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stories: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributor: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo_restrictions: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirects: Option<RedirectsReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circulation: Option<CirculationAudit>,
    /// Identifier the destination assigned when it creates the object itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_id: Option<String>,
}

/// Final report of one single-object migration
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub kind: ContentKind,
    pub id: String,
    pub dry_run: bool,
    /// Every stage the run passed through, in order
    pub stages: Vec<Stage>,
    pub references: ReferenceReport,
    pub document: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circulation: Option<Value>,
}

impl MigrationReport {
    pub fn final_stage(&self) -> Option<Stage> {
        self.stages.last().copied()
    }
}

/// Outcome of one item of a bulk run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkItem {
    pub id: String,
    pub succeeded: bool,
    pub message: String,
}

/// Per-item results of a bulk run; one failure never stops the others
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkReport {
    pub items: Vec<BulkItem>,
}

impl BulkReport {
    pub fn push_success(&mut self, id: &str, message: impl Into<String>) {
        self.items.push(BulkItem {
            id: id.to_string(),
            succeeded: true,
            message: message.into(),
        });
    }

    pub fn push_failure(&mut self, id: &str, message: impl Into<String>) {
        self.items.push(BulkItem {
            id: id.to_string(),
            succeeded: false,
            message: message.into(),
        });
    }

    pub fn processed(&self) -> usize {
        self.items.len()
    }

    pub fn failures(&self) -> usize {
        self.items.iter().filter(|item| !item.succeeded).count()
    }
}
