//! Member and network records
//!
//!     Snapshots of a virtual network as reported by its controller. Every field is optional
//!     because controllers omit or null out whatever they have not set yet.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One member of the network
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberRecord {
    pub node_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    /// Controller clock at the time of the snapshot, in milliseconds
    pub clock: Option<i64>,
    /// Last time the member was seen, in milliseconds
    pub last_online: Option<i64>,
    pub config: Option<MemberConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemberConfig {
    pub authorized: Option<bool>,
    pub ip_assignments: Option<Vec<String>>,
    pub capabilities: Option<Vec<i64>>,
    pub tags: Option<Vec<(i64, TagValue)>>,
    pub identity: Option<String>,
}

/// Tag value of a member; `false` marks an unset tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Number(i64),
    Flag(bool),
}

impl TagValue {
    pub fn is_set(&self) -> bool {
        *self != TagValue::Flag(false)
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            TagValue::Number(n) => Some(*n),
            TagValue::Flag(_) => None,
        }
    }

    /// Text seen by selectors
    pub fn as_text(&self) -> String {
        match self {
            TagValue::Number(n) => n.to_string(),
            TagValue::Flag(flag) => flag.to_string(),
        }
    }
}

impl MemberRecord {
    pub fn is_authorized(&self) -> bool {
        self.config
            .as_ref()
            .and_then(|c| c.authorized)
            .unwrap_or(false)
    }

    pub fn ip_assignments(&self) -> &[String] {
        self.config
            .as_ref()
            .and_then(|c| c.ip_assignments.as_deref())
            .unwrap_or(&[])
    }

    pub fn capabilities(&self) -> &[i64] {
        self.config
            .as_ref()
            .and_then(|c| c.capabilities.as_deref())
            .unwrap_or(&[])
    }

    pub fn tags(&self) -> &[(i64, TagValue)] {
        self.config
            .as_ref()
            .and_then(|c| c.tags.as_deref())
            .unwrap_or(&[])
    }
}

/// Network level names for capabilities and tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkInfo {
    pub capabilities_by_name: Option<BTreeMap<String, i64>>,
    pub tags_by_name: Option<BTreeMap<String, TagDefinition>>,
    pub config: Option<NetworkConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagDefinition {
    pub id: i64,
    pub enums: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub name: Option<String>,
}

impl NetworkInfo {
    pub fn name(&self) -> Option<&str> {
        self.config.as_ref().and_then(|c| c.name.as_deref())
    }

    pub fn capabilities(&self) -> impl Iterator<Item = (&String, &i64)> {
        self.capabilities_by_name.iter().flatten()
    }

    pub fn tags(&self) -> impl Iterator<Item = (&String, &TagDefinition)> {
        self.tags_by_name.iter().flatten()
    }
}
