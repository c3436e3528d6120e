//! Candidate attributes
//!
//!     Selectors see a node as a flat map of text fields. This module derives that map from a
//!     member record and the network it belongs to, and decides which members are active
//!     enough to be candidates at all.
//!
//!     Base fields:
//!
//!         name nodeId description capabilities identity address IPv4Address IPv6Address
//!
//!     Every tag defined on the network adds `tag:<name>`, `tag:<id>`, `tagEnum:<name>` and
//!     `tagEnum:<id>`.

use crate::address::{select_address, IpVersion};
use crate::records::{MemberRecord, NetworkInfo};
use nodesel_query::{AttributeMap, AttributeSource, KnownFields};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const BASE_FIELDS: &[&str] = &[
    "name",
    "nodeId",
    "description",
    "capabilities",
    "identity",
    "address",
    "IPv4Address",
    "IPv6Address",
];

pub const DEFAULT_LAST_SEEN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Field names a query over `network` may reference
pub fn known_fields(network: &NetworkInfo) -> KnownFields {
    let mut fields: KnownFields = BASE_FIELDS.iter().copied().collect();
    for (name, tag) in network.tags() {
        fields.insert(format!("tag:{}", name));
        fields.insert(format!("tag:{}", tag.id));
        fields.insert(format!("tagEnum:{}", name));
        fields.insert(format!("tagEnum:{}", tag.id));
    }
    fields
}

/// The attribute map of one candidate node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAttributes {
    fields: AttributeMap,
}

impl NodeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// The address reported when this node fills a slot
    pub fn address(&self) -> &str {
        self.get("address").unwrap_or("")
    }

    pub fn fields(&self) -> &AttributeMap {
        &self.fields
    }

    pub fn into_fields(self) -> AttributeMap {
        self.fields
    }

    /// Build the attributes of `member`, naming capabilities and tags through `network`
    pub fn from_member(member: &MemberRecord, network: &NetworkInfo, version: IpVersion) -> Self {
        let mut attrs = NodeAttributes::new();
        let assignments = member.ip_assignments();

        attrs.set("nodeId", member.node_id.clone().unwrap_or_default());
        attrs.set("name", member.name.clone().unwrap_or_default());
        attrs.set("description", member.description.clone().unwrap_or_default());
        attrs.set(
            "identity",
            member
                .config
                .as_ref()
                .and_then(|c| c.identity.clone())
                .unwrap_or_default(),
        );
        attrs.set("capabilities", capability_text(member, network));
        attrs.set("address", select_address(assignments, version));
        attrs.set("IPv4Address", select_address(assignments, IpVersion::V4));
        attrs.set("IPv6Address", select_address(assignments, IpVersion::V6));

        for (id, value) in member.tags() {
            if !value.is_set() {
                continue;
            }
            let text = value.as_text();
            attrs.set(format!("tag:{}", id), text.clone());
            let Some((name, tag)) = network.tags().find(|(_, tag)| tag.id == *id) else {
                continue;
            };
            attrs.set(format!("tag:{}", name), text);
            let label = tag
                .enums
                .iter()
                .flatten()
                .find(|(_, enum_value)| Some(**enum_value) == value.as_number());
            if let Some((label, _)) = label {
                attrs.set(format!("tagEnum:{}", id), label.clone());
                attrs.set(format!("tagEnum:{}", name), label.clone());
            }
        }
        attrs
    }
}

/// Each capability id followed by every name the network maps to it
fn capability_text(member: &MemberRecord, network: &NetworkInfo) -> String {
    let mut words = Vec::new();
    for cap in member.capabilities() {
        words.push(cap.to_string());
        words.extend(
            network
                .capabilities()
                .filter(|(_, id)| *id == cap)
                .map(|(name, _)| name.clone()),
        );
    }
    words.join(" ")
}

impl AttributeSource for NodeAttributes {
    fn attribute(&self, field: &str) -> Option<&str> {
        self.get(field)
    }
}

impl From<AttributeMap> for NodeAttributes {
    fn from(fields: AttributeMap) -> Self {
        Self { fields }
    }
}

/// Which members of a snapshot count as candidates
#[derive(Debug, Clone)]
pub struct ActiveFilter {
    /// The node doing the waiting, never its own candidate
    pub self_id: Option<String>,
    pub last_seen_timeout: Duration,
    pub ip_version: IpVersion,
    /// Stands in for a missing member clock; the system clock when unset
    pub now_ms: Option<i64>,
}

impl Default for ActiveFilter {
    fn default() -> Self {
        Self {
            self_id: None,
            last_seen_timeout: DEFAULT_LAST_SEEN_TIMEOUT,
            ip_version: IpVersion::default(),
            now_ms: None,
        }
    }
}

impl ActiveFilter {
    fn now(&self) -> i64 {
        self.now_ms.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
                .unwrap_or(0)
        })
    }

    /// Whether `member` may fill a slot
    pub fn accepts(&self, member: &MemberRecord) -> bool {
        if self.self_id.is_some() && member.node_id == self.self_id {
            return false;
        }
        if !member.is_authorized() {
            return false;
        }
        let clock = member.clock.unwrap_or_else(|| self.now());
        let last_online = member.last_online.unwrap_or(0);
        let limit = i64::try_from(self.last_seen_timeout.as_millis()).unwrap_or(i64::MAX);
        if clock.saturating_sub(last_online) > limit {
            return false;
        }
        !select_address(member.ip_assignments(), self.ip_version).is_empty()
    }

    /// The candidate pool of one snapshot, in member order
    pub fn candidates(&self, members: &[MemberRecord], network: &NetworkInfo) -> Vec<NodeAttributes> {
        members
            .iter()
            .filter(|member| self.accepts(member))
            .map(|member| NodeAttributes::from_member(member, network, self.ip_version))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{MemberConfig, TagDefinition, TagValue};
    use nodesel_query::compile;
    use std::collections::BTreeMap;

    const NOW: i64 = 1_700_000_000_000;

    fn network() -> NetworkInfo {
        let mut enums = BTreeMap::new();
        enums.insert("db".to_string(), 12);
        enums.insert("web".to_string(), 13);
        let mut tags = BTreeMap::new();
        tags.insert(
            "role".to_string(),
            TagDefinition {
                id: 3,
                enums: Some(enums),
            },
        );
        let mut caps = BTreeMap::new();
        caps.insert("deploy".to_string(), 7);
        caps.insert("push".to_string(), 7);
        NetworkInfo {
            capabilities_by_name: Some(caps),
            tags_by_name: Some(tags),
            config: None,
        }
    }

    fn member(id: &str, addresses: &[&str]) -> MemberRecord {
        MemberRecord {
            node_id: Some(id.to_string()),
            name: Some(format!("node-{}", id)),
            clock: Some(NOW),
            last_online: Some(NOW - 1000),
            config: Some(MemberConfig {
                authorized: Some(true),
                ip_assignments: Some(addresses.iter().map(|a| a.to_string()).collect()),
                capabilities: Some(vec![1, 7]),
                tags: Some(vec![(3, TagValue::Number(12)), (9, TagValue::Flag(false))]),
                identity: Some(format!("{}:0:pub", id)),
            }),
            ..Default::default()
        }
    }

    fn filter() -> ActiveFilter {
        ActiveFilter {
            self_id: Some("self".to_string()),
            now_ms: Some(NOW),
            ..Default::default()
        }
    }

    #[test]
    fn test_known_fields_include_tags() {
        let fields = known_fields(&network());
        let names: Vec<&str> = fields.iter().collect();
        assert_eq!(&names[..8], BASE_FIELDS);
        assert_eq!(&names[8..], &["tag:role", "tag:3", "tagEnum:role", "tagEnum:3"]);
    }

    #[test]
    fn test_attributes_from_member() {
        let attrs =
            NodeAttributes::from_member(&member("n1", &["10.0.0.5/24", "fd00::5"]), &network(), IpVersion::V4);
        assert_eq!(attrs.get("nodeId"), Some("n1"));
        assert_eq!(attrs.get("name"), Some("node-n1"));
        assert_eq!(attrs.get("description"), Some(""));
        assert_eq!(attrs.get("capabilities"), Some("1 7 deploy push"));
        assert_eq!(attrs.address(), "10.0.0.5");
        assert_eq!(attrs.get("IPv6Address"), Some("fd00::5"));
        assert_eq!(attrs.get("tag:3"), Some("12"));
        assert_eq!(attrs.get("tag:role"), Some("12"));
        assert_eq!(attrs.get("tagEnum:role"), Some("db"));
        assert_eq!(attrs.get("tagEnum:3"), Some("db"));
        assert_eq!(attrs.get("tag:9"), None);
    }

    #[test]
    fn test_unnamed_tag_keeps_numeric_field() {
        let mut record = member("n1", &["10.0.0.5"]);
        if let Some(config) = record.config.as_mut() {
            config.tags = Some(vec![(42, TagValue::Number(1))]);
        }
        let attrs = NodeAttributes::from_member(&record, &network(), IpVersion::V4);
        assert_eq!(attrs.get("tag:42"), Some("1"));
        assert_eq!(attrs.get("tagEnum:42"), None);
    }

    #[test]
    fn test_filter_skips_inactive_members() {
        let mut unauthorized = member("u", &["10.0.0.2"]);
        if let Some(config) = unauthorized.config.as_mut() {
            config.authorized = Some(false);
        }
        let mut stale = member("s", &["10.0.0.3"]);
        stale.last_online = Some(NOW - 301_000);
        let members = vec![
            member("self", &["10.0.0.1"]),
            unauthorized,
            stale,
            member("v6", &["fd00::4"]),
            member("ok", &["10.0.0.5"]),
        ];

        let pool = filter().candidates(&members, &network());
        let ids: Vec<&str> = pool.iter().filter_map(|a| a.get("nodeId")).collect();
        assert_eq!(ids, vec!["ok"]);
    }

    #[test]
    fn test_missing_clock_uses_now() {
        let mut record = member("n", &["10.0.0.1"]);
        record.clock = None;
        record.last_online = Some(NOW - 10_000);
        assert!(filter().accepts(&record));
        record.last_online = None;
        assert!(!filter().accepts(&record));
    }

    #[test]
    fn test_extreme_clock_values_do_not_overflow() {
        let mut record = member("n", &["10.0.0.1"]);
        record.clock = Some(i64::MAX);
        record.last_online = Some(-1);
        assert!(!filter().accepts(&record));

        record.clock = Some(i64::MIN);
        record.last_online = Some(i64::MAX);
        assert!(filter().accepts(&record));

        let patient = ActiveFilter {
            last_seen_timeout: Duration::MAX,
            ..filter()
        };
        record.clock = Some(i64::MAX);
        record.last_online = Some(i64::MIN);
        assert!(patient.accepts(&record));
    }

    #[test]
    fn test_selectors_over_member_attributes() {
        let net = network();
        let set = compile("[tagEnum:role=db] [capabilities~=deploy]", &known_fields(&net)).unwrap();
        let attrs = NodeAttributes::from_member(&member("n1", &["10.0.0.5"]), &net, IpVersion::V4);
        assert_eq!(set.evaluate(&attrs), vec![true, true]);
    }

    #[test]
    fn test_serializes_as_flat_object() {
        let mut attrs = NodeAttributes::new();
        attrs.set("address", "10.0.0.1");
        assert_eq!(
            serde_json::to_string(&attrs).unwrap(),
            r#"{"address":"10.0.0.1"}"#
        );
    }
}
