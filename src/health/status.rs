// src/health/status.rs
use super::entry::CheckEntry;
use serde::Serialize;

/// Point-in-time copy of the registry, safe to hand out and serialize.
///
/// False, empty and zero fields are left out of the JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    #[serde(skip_serializing_if = "is_false")]
    pub healthy: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<CheckStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStatus {
    #[serde(rename = "service", skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "is_false")]
    pub healthy: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(skip_serializing_if = "is_false")]
    pub observe_only: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_checked: u64,
}

impl From<&CheckEntry> for CheckStatus {
    fn from(entry: &CheckEntry) -> Self {
        Self {
            name: entry.name.clone(),
            healthy: entry.healthy,
            message: entry.message.clone(),
            observe_only: entry.observe_only,
            last_checked: entry.last_checked,
        }
    }
}

impl HealthStatus {
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}
