//! Tool definitions advertised to clients

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::Operation;

/// Tool definition format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Operation name
    pub name: String,
    /// Human-readable display title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    /// Input schema (JSON Schema)
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

/// Tool behavior annotations
///
/// These are hints about tool behavior. Clients should not make
/// tool use decisions based on annotations from untrusted servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAnnotations {
    /// Whether the tool only reads without modifying its environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only_hint: Option<bool>,
    /// Whether modifications can remove or overwrite existing data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destructive_hint: Option<bool>,
    /// Whether repeated identical calls produce no additional effects
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent_hint: Option<bool>,
}

impl ToolAnnotations {
    pub fn read_only() -> Self {
        Self {
            read_only_hint: Some(true),
            destructive_hint: Some(false),
            idempotent_hint: Some(true),
        }
    }

    pub fn additive() -> Self {
        Self {
            read_only_hint: Some(false),
            destructive_hint: Some(false),
            idempotent_hint: Some(false),
        }
    }

    pub fn destructive(idempotent: bool) -> Self {
        Self {
            read_only_hint: Some(false),
            destructive_hint: Some(true),
            idempotent_hint: Some(idempotent),
        }
    }
}

impl From<Operation> for ToolDefinition {
    fn from(operation: Operation) -> Self {
        Self {
            name: operation.name().to_string(),
            title: Some(operation.title().to_string()),
            description: operation.description().to_string(),
            input_schema: operation.input_schema(),
            annotations: Some(operation.annotations()),
        }
    }
}

/// Definitions for every registered operation, in registration order
pub fn list_definitions() -> Vec<ToolDefinition> {
    Operation::ALL
        .iter()
        .copied()
        .map(ToolDefinition::from)
        .collect()
}
