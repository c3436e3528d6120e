//! Address normalization
//!
//!     Controllers report addresses as free text, sometimes with a `/prefix`, mixed case, or
//!     compressed IPv6 groups. Comparison expands `::`, lower-cases and zero pads every group so
//!     that `fe80::1ff:fe23:4567:890a` and `FE80:0:0::00:1FF:Fe23:4567:890a` are equal.
//!
//!     Picking "the" address of a node follows an [IpVersion]: `4` or `6` selects that family
//!     only, `4?` or `6?` prefers it and falls back to the other family.

use crate::error::FleetError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Expand a compressed IPv6 address to eight four digit groups.
///
/// Text without `:` is returned unchanged.
pub fn expand_ipv6(address: &str) -> String {
    if !address.contains(':') {
        return address.to_string();
    }
    let mut halves = address.splitn(2, "::");
    let begin: Vec<&str> = halves.next().map(|h| h.split(':').collect()).unwrap_or_default();
    let end: Vec<&str> = halves.next().map(|h| h.split(':').collect()).unwrap_or_default();
    let missing = 8usize.saturating_sub(begin.len() + end.len());

    begin
        .iter()
        .copied()
        .chain(std::iter::repeat("0000").take(missing))
        .chain(end.iter().copied())
        .map(pad_group)
        .collect::<Vec<_>>()
        .join(":")
}

/// Last four characters of the group, left padded with zeros
fn pad_group(group: &str) -> String {
    let padded: Vec<char> = format!("0000{}", group.trim().to_lowercase())
        .chars()
        .collect();
    padded[padded.len() - 4..].iter().collect()
}

/// Compare two addresses, ignoring case, surrounding whitespace and IPv6 compression
pub fn addresses_equal(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    a == b || expand_ipv6(&a) == expand_ipv6(&b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

/// Which address family to report, and whether the other one may stand in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpVersion {
    pub family: AddressFamily,
    pub fallback: bool,
}

impl IpVersion {
    pub const V4: IpVersion = IpVersion {
        family: AddressFamily::V4,
        fallback: false,
    };
    pub const V6: IpVersion = IpVersion {
        family: AddressFamily::V6,
        fallback: false,
    };
}

impl Default for IpVersion {
    fn default() -> Self {
        IpVersion::V4
    }
}

impl FromStr for IpVersion {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (digits, fallback) = match text.strip_suffix('?') {
            Some(rest) => (rest, true),
            None => (text, false),
        };
        let family = match digits {
            "4" => AddressFamily::V4,
            "6" => AddressFamily::V6,
            _ => return Err(FleetError::InvalidIpVersion(s.to_string())),
        };
        Ok(IpVersion { family, fallback })
    }
}

impl TryFrom<String> for IpVersion {
    type Error = FleetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IpVersion> for String {
    fn from(version: IpVersion) -> Self {
        version.to_string()
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digit = match self.family {
            AddressFamily::V4 => "4",
            AddressFamily::V6 => "6",
        };
        write!(f, "{}{}", digit, if self.fallback { "?" } else { "" })
    }
}

/// Pick the address to report from an assignment list, or an empty string
pub fn select_address<S: AsRef<str>>(list: &[S], version: IpVersion) -> String {
    let list: Vec<String> = list
        .iter()
        .map(|address| {
            let address = address.as_ref();
            let bare = address.split('/').next().unwrap_or(address);
            bare.trim().to_lowercase()
        })
        .collect();
    let (v4, other): (Vec<&String>, Vec<&String>) =
        list.iter().partition(|address| address.contains('.'));
    let (preferred, rest) = match version.family {
        AddressFamily::V4 => (v4, other),
        AddressFamily::V6 => (other, v4),
    };

    let picked = if version.fallback {
        preferred.first().or(rest.first())
    } else {
        preferred.first()
    };
    picked.map(|address| address.to_string()).unwrap_or_default()
}

/// Whether an assignment list holds every requested address.
///
/// With nothing requested, any address of the configured version will do.
pub fn has_requested_addresses<S: AsRef<str>>(
    list: &[S],
    requested: &[String],
    version: IpVersion,
) -> bool {
    let list: Vec<&str> = list
        .iter()
        .map(|address| {
            let address = address.as_ref();
            address.split('/').next().unwrap_or(address).trim()
        })
        .collect();
    if requested.is_empty() {
        return !select_address(&list, version).is_empty();
    }
    requested
        .iter()
        .all(|wanted| list.iter().any(|address| addresses_equal(address, wanted)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("127.0.0.1", " 127.0.0.1")]
    #[case(
        "2001:0db8:85a3:8d3:1319:8a2e:370:7348",
        "2001:DB8:85A3:8D3:1319:8A2E:370: 7348"
    )]
    #[case("fe80::1ff:fe23:4567:890a", " fe80:0:0::00:1FF:Fe23:4567:890a")]
    #[case("::", "::0")]
    fn test_addresses_equal(#[case] a: &str, #[case] b: &str) {
        assert!(addresses_equal(a, b));
    }

    #[test]
    fn test_addresses_differ() {
        assert!(!addresses_equal("10.0.0.1", "10.0.0.2"));
        assert!(!addresses_equal("fe80::1", "fe80::2"));
    }

    #[test]
    fn test_expand_ipv6() {
        assert_eq!(expand_ipv6("10.0.0.1"), "10.0.0.1");
        assert_eq!(expand_ipv6("::"), "0000:0000:0000:0000:0000:0000:0000:0000");
        assert_eq!(
            expand_ipv6("fe80::1ff:fe23"),
            "fe80:0000:0000:0000:0000:0000:01ff:fe23"
        );
    }

    fn pick(list: &[&str], version: &str) -> String {
        select_address(list, version.parse().unwrap())
    }

    #[test]
    fn test_select_v6_only() {
        assert_eq!(pick(&[], "6"), "");
        assert_eq!(pick(&["127.0.0.1/8"], "6"), "");
        assert_eq!(pick(&["::"], "6"), "::");
        assert_eq!(pick(&["127.0.0.1", "::/24", "127.0.0.2"], "6"), "::");
        assert_eq!(pick(&["::/24", "127.0.0.1"], "6"), "::");
    }

    #[test]
    fn test_select_v6_with_fallback() {
        assert_eq!(pick(&[], "6?"), "");
        assert_eq!(pick(&["127.0.0.1/8"], "6?"), "127.0.0.1");
        assert_eq!(pick(&["::"], "6?"), "::");
        assert_eq!(pick(&["127.0.0.1", "::/24", "127.0.0.2"], "6?"), "::");
        assert_eq!(pick(&["::/24", "127.0.0.1"], "6?"), "::");
    }

    #[test]
    fn test_select_v4_only() {
        assert_eq!(pick(&[], "4"), "");
        assert_eq!(pick(&["127.0.0.1/8"], "4"), "127.0.0.1");
        assert_eq!(pick(&["::"], "4"), "");
        assert_eq!(pick(&["::1/24", "127.0.0.1", "::/24"], "4"), "127.0.0.1");
        assert_eq!(pick(&["::/24", "127.0.0.1"], "4"), "127.0.0.1");
    }

    #[test]
    fn test_select_v4_with_fallback() {
        assert_eq!(pick(&[], "4?"), "");
        assert_eq!(pick(&["127.0.0.1/8"], "4?"), "127.0.0.1");
        assert_eq!(pick(&["::"], "4?"), "::");
        assert_eq!(pick(&["127.0.0.1", "::/24", "127.0.0.2"], "4?"), "127.0.0.1");
        assert_eq!(pick(&["::/24", "127.0.0.1"], "4?"), "127.0.0.1");
    }

    #[test]
    fn test_ip_version_parsing() {
        assert_eq!("4".parse::<IpVersion>().unwrap(), IpVersion::V4);
        assert_eq!(" 6 ".parse::<IpVersion>().unwrap(), IpVersion::V6);
        assert_eq!("6?".parse::<IpVersion>().unwrap().to_string(), "6?");
        assert!("5".parse::<IpVersion>().is_err());
    }

    #[test]
    fn test_requested_addresses() {
        let one = vec!["192.168.1.1".to_string()];
        assert!(has_requested_addresses(&["192.168.1.1"], &one, IpVersion::V4));
        assert!(!has_requested_addresses(&["192.168.1.2"], &one, IpVersion::V4));
        assert!(has_requested_addresses(
            &["192.168.1.2", "192.168.1.1/24"],
            &one,
            IpVersion::V4
        ));

        let two = vec!["192.168.1.1".to_string(), "10.0.0.10".to_string()];
        assert!(!has_requested_addresses(&["10.0.0.10"], &two, IpVersion::V4));
        assert!(!has_requested_addresses(&["192.168.1.1"], &two, IpVersion::V4));
        assert!(has_requested_addresses(
            &["10.0.0.10", "192.168.1.2", "192.168.1.1"],
            &two,
            IpVersion::V4
        ));
    }

    #[test]
    fn test_nothing_requested_needs_any_address() {
        assert!(has_requested_addresses(&["10.0.0.1/8"], &[], IpVersion::V4));
        assert!(!has_requested_addresses(&["fe80::1"], &[], IpVersion::V4));
        assert!(!has_requested_addresses::<&str>(&[], &[], IpVersion::V4));
    }
}
