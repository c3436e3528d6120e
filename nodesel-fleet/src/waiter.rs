//! Polling waiter
//!
//!     Repeats slot assignment over fresh pools until the slots reach the wanted state:
//!
//!     - `available`: every slot holds a candidate
//!     - `unavailable`: every slot is empty
//!
//!     Between passes the waiter sleeps for the configured interval. Fetch failures that may
//!     clear up by themselves (a member file being rewritten, say) are logged and the pass
//!     counts as unfinished; anything else ends the wait.
//!
//!     The timeout is measured from the start of the call and only checked after a pass that
//!     did not finish, so a pool that is already satisfied never times out. A timeout written
//!     with a trailing `?` (`"30?"`) is not fatal: the waiter stops and reports `timed_out`.
//!
//!     [wait_for_self_addresses] polls the same way for the waiting node's own record until it
//!     holds the requested addresses. [Timeout::remaining] lets both waits share one budget.

use crate::address::{addresses_equal, has_requested_addresses, select_address, IpVersion};
use crate::attributes::NodeAttributes;
use crate::error::{FleetError, FleetResult};
use crate::provider::{MemberLookup, PoolProvider};
use nodesel_query::SelectorSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::{sleep, Instant};

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(3000);

/// How long to wait, and whether running out of time is an error
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeout {
    limit: Option<Duration>,
    fatal: bool,
}

impl Timeout {
    pub const NONE: Timeout = Timeout {
        limit: None,
        fatal: true,
    };

    pub fn fatal(limit: Duration) -> Self {
        Self {
            limit: Some(limit),
            fatal: true,
        }
    }

    pub fn lenient(limit: Duration) -> Self {
        Self {
            limit: Some(limit),
            fatal: false,
        }
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    /// Whether `elapsed` is past the limit
    pub fn expired(&self, elapsed: Duration) -> bool {
        self.limit.is_some_and(|limit| elapsed > limit)
    }

    /// What is left of this timeout once `elapsed` has been spent
    pub fn remaining(&self, elapsed: Duration) -> Timeout {
        Timeout {
            limit: self.limit.map(|limit| limit.saturating_sub(elapsed)),
            fatal: self.fatal,
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::NONE
    }
}

impl FromStr for Timeout {
    type Err = FleetError;

    /// Seconds as a decimal number; zero, negative or empty means no limit
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (number, fatal) = match text.strip_suffix('?') {
            Some(rest) => (rest.trim(), false),
            None => (text, true),
        };
        if number.is_empty() {
            return Ok(Timeout { limit: None, fatal });
        }
        let seconds: f64 = number
            .parse()
            .map_err(|_| FleetError::InvalidTimeout(s.to_string()))?;
        if !seconds.is_finite() {
            return Err(FleetError::InvalidTimeout(s.to_string()));
        }
        if seconds <= 0.0 {
            return Ok(Timeout { limit: None, fatal });
        }
        let limit = Duration::try_from_secs_f64(seconds)
            .map_err(|_| FleetError::InvalidTimeout(s.to_string()))?;
        Ok(Timeout {
            limit: Some(limit),
            fatal,
        })
    }
}

impl TryFrom<String> for Timeout {
    type Error = FleetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeout> for String {
    fn from(timeout: Timeout) -> Self {
        timeout.to_string()
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.limit.map(|l| l.as_secs_f64()).unwrap_or(0.0);
        write!(f, "{}{}", seconds, if self.fatal { "" } else { "?" })
    }
}

/// The slot state a wait is looking for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    #[default]
    Available,
    Unavailable,
}

impl FromStr for WaitMode {
    type Err = FleetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "available" => Ok(WaitMode::Available),
            "unavailable" => Ok(WaitMode::Unavailable),
            _ => Err(FleetError::InvalidWaitMode(s.to_string())),
        }
    }
}

impl fmt::Display for WaitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitMode::Available => write!(f, "available"),
            WaitMode::Unavailable => write!(f, "unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitOptions {
    pub interval: Duration,
    pub timeout: Timeout,
    pub mode: WaitMode,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            timeout: Timeout::NONE,
            mode: WaitMode::Available,
        }
    }
}

/// Result of a finished wait
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaitOutcome {
    /// Candidate held by each slot after the last successful pass
    pub slots: Vec<Option<NodeAttributes>>,
    pub timed_out: bool,
    pub passes: usize,
}

impl WaitOutcome {
    /// Addresses of the filled slots, in slot order
    pub fn addresses(&self) -> Vec<String> {
        self.slots
            .iter()
            .flatten()
            .map(|node| node.address().to_string())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }
}

/// Poll `provider` until the slots of `selectors` reach the state `options.mode` asks for
pub async fn wait_for_slots<P: PoolProvider + ?Sized>(
    selectors: &SelectorSet,
    provider: &mut P,
    options: &WaitOptions,
) -> FleetResult<WaitOutcome> {
    let start = Instant::now();
    let mut outcome = WaitOutcome {
        slots: vec![None; selectors.len()],
        ..Default::default()
    };

    loop {
        outcome.passes += 1;
        match provider.fetch() {
            Ok(pool) => {
                let assignment = selectors.assign(&pool);
                let finished = match options.mode {
                    WaitMode::Available => assignment.is_complete(),
                    WaitMode::Unavailable => assignment.is_vacant(),
                };
                tracing::debug!(
                    pass = outcome.passes,
                    candidates = pool.len(),
                    pending = assignment.pending(),
                    "assignment pass"
                );
                outcome.slots = assignment.slots().into_iter().map(|s| s.cloned()).collect();
                if finished {
                    tracing::info!(passes = outcome.passes, mode = %options.mode, "wait finished");
                    return Ok(outcome);
                }
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(pass = outcome.passes, error = %err, "failed to fetch candidates, retrying");
            }
            Err(err) => return Err(err),
        }

        let pending = match options.mode {
            WaitMode::Available => outcome.slots.iter().filter(|s| s.is_none()).count(),
            WaitMode::Unavailable => outcome.slots.iter().filter(|s| s.is_some()).count(),
        };
        if out_of_time(&options.timeout, start, pending)? {
            outcome.timed_out = true;
            return Ok(outcome);
        }

        sleep(options.interval).await;
    }
}

/// `Ok(true)` once a lenient timeout has run out; a fatal one becomes [FleetError::Timeout]
fn out_of_time(timeout: &Timeout, start: Instant, pending: usize) -> FleetResult<bool> {
    let elapsed = start.elapsed();
    if !timeout.expired(elapsed) {
        return Ok(false);
    }
    if timeout.is_fatal() {
        tracing::error!(?elapsed, pending, "wait timed out");
        return Err(FleetError::Timeout { elapsed, pending });
    }
    tracing::warn!(?elapsed, pending, "wait timed out, continuing");
    Ok(true)
}

/// Result of waiting for the node's own addresses
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AddressOutcome {
    /// Address of the node for the configured IP version, empty while it has none
    pub address: String,
    pub timed_out: bool,
    pub passes: usize,
}

/// Poll `lookup` until the node's record holds every address in `requested`.
///
/// With nothing requested, any address of `version` will do. A node missing from the snapshot
/// has no addresses. Only `options.interval` and `options.timeout` apply.
pub async fn wait_for_self_addresses<L: MemberLookup + ?Sized>(
    lookup: &mut L,
    requested: &[String],
    version: IpVersion,
    options: &WaitOptions,
) -> FleetResult<AddressOutcome> {
    let start = Instant::now();
    let mut outcome = AddressOutcome::default();

    loop {
        outcome.passes += 1;
        let mut pending = requested.len().max(1);
        match lookup.lookup() {
            Ok(Some(member)) => {
                let assigned = member.ip_assignments();
                outcome.address = select_address(assigned, version);
                if has_requested_addresses(assigned, requested, version) {
                    tracing::info!(passes = outcome.passes, address = %outcome.address, "addresses assigned");
                    return Ok(outcome);
                }
                if !requested.is_empty() {
                    pending = requested
                        .iter()
                        .filter(|wanted| {
                            !assigned.iter().any(|address| {
                                let bare = address.split('/').next().unwrap_or(address);
                                addresses_equal(bare, wanted)
                            })
                        })
                        .count();
                }
                tracing::debug!(pass = outcome.passes, pending, "waiting for address assignment");
            }
            Ok(None) => {
                tracing::debug!(pass = outcome.passes, "own member record not found");
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(pass = outcome.passes, error = %err, "failed to read own member record, retrying");
            }
            Err(err) => return Err(err),
        }

        if out_of_time(&options.timeout, start, pending)? {
            outcome.timed_out = true;
            return Ok(outcome);
        }

        sleep(options.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{MemberConfig, MemberRecord};
    use nodesel_query::query::testing::{attrs, fields};
    use nodesel_query::compile;
    use std::path::PathBuf;

    fn node(address: &str, role: &str) -> NodeAttributes {
        attrs(&[("address", address), ("role", role)]).into()
    }

    fn set(query: &str) -> SelectorSet {
        compile(query, &fields(&["address", "role"])).unwrap()
    }

    fn options(mode: WaitMode, timeout: &str) -> WaitOptions {
        WaitOptions {
            interval: Duration::from_secs(1),
            timeout: timeout.parse().unwrap(),
            mode,
        }
    }

    #[test]
    fn test_timeout_parsing() {
        assert_eq!("0".parse::<Timeout>().unwrap().limit(), None);
        assert_eq!("".parse::<Timeout>().unwrap().limit(), None);
        assert_eq!("-5".parse::<Timeout>().unwrap().limit(), None);
        let t: Timeout = "1.5".parse().unwrap();
        assert_eq!(t.limit(), Some(Duration::from_millis(1500)));
        assert!(t.is_fatal());
        let t: Timeout = "30?".parse().unwrap();
        assert_eq!(t.limit(), Some(Duration::from_secs(30)));
        assert!(!t.is_fatal());
        assert_eq!(t.to_string(), "30?");
        assert!("soon".parse::<Timeout>().is_err());
        assert!("inf".parse::<Timeout>().is_err());
    }

    #[test]
    fn test_timeout_out_of_range_is_an_error() {
        let err = "1e300".parse::<Timeout>().unwrap_err();
        assert!(matches!(err, FleetError::InvalidTimeout(ref text) if text == "1e300"));
        assert!("1e300?".parse::<Timeout>().is_err());
        assert_eq!("-1e300".parse::<Timeout>().unwrap().limit(), None);
        let t: Timeout = "86400".parse().unwrap();
        assert_eq!(t.limit(), Some(Duration::from_secs(86_400)));
    }

    #[test]
    fn test_timeout_expiry_is_strict() {
        let t = Timeout::fatal(Duration::from_secs(2));
        assert!(!t.expired(Duration::from_secs(2)));
        assert!(t.expired(Duration::from_millis(2001)));
        assert!(!Timeout::NONE.expired(Duration::from_secs(u32::MAX as u64)));
    }

    #[test]
    fn test_remaining_timeout() {
        let t = Timeout::lenient(Duration::from_secs(10));
        assert_eq!(
            t.remaining(Duration::from_secs(4)),
            Timeout::lenient(Duration::from_secs(6))
        );
        assert_eq!(t.remaining(Duration::from_secs(40)).limit(), Some(Duration::ZERO));
        assert_eq!(Timeout::NONE.remaining(Duration::from_secs(4)), Timeout::NONE);
    }

    #[test]
    fn test_wait_mode_parsing() {
        assert_eq!("Unavailable".parse::<WaitMode>().unwrap(), WaitMode::Unavailable);
        assert!("gone".parse::<WaitMode>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_until_all_slots_filled() {
        let pools = vec![
            vec![],
            vec![node("10.0.0.1", "web")],
            vec![node("10.0.0.1", "web"), node("10.0.0.2", "db")],
        ];
        let mut pass = 0;
        let mut provider = || {
            let pool = pools[pass.min(pools.len() - 1)].clone();
            pass += 1;
            Ok::<_, FleetError>(pool)
        };

        let outcome = wait_for_slots(
            &set("[role=db] [role=web]"),
            &mut provider,
            &options(WaitMode::Available, "0"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.passes, 3);
        assert!(!outcome.timed_out);
        assert_eq!(outcome.addresses(), vec!["10.0.0.2", "10.0.0.1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_waits_until_all_slots_empty() {
        let mut pass = 0;
        let mut provider = || {
            pass += 1;
            let pool = if pass < 3 {
                vec![node("10.0.0.1", "web")]
            } else {
                vec![]
            };
            Ok::<_, FleetError>(pool)
        };

        let outcome = wait_for_slots(
            &set("[role=web]"),
            &mut provider,
            &options(WaitMode::Unavailable, "0"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.passes, 3);
        assert!(outcome.addresses().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_timeout() {
        let mut provider = || Ok::<_, FleetError>(vec![node("10.0.0.1", "web")]);
        let err = wait_for_slots(
            &set("[role=db]"),
            &mut provider,
            &options(WaitMode::Available, "2.5"),
        )
        .await
        .unwrap_err();

        match err {
            FleetError::Timeout { elapsed, pending } => {
                assert_eq!(pending, 1);
                assert!(elapsed > Duration::from_millis(2500));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lenient_timeout_reports_partial_slots() {
        let mut provider = || Ok::<_, FleetError>(vec![node("10.0.0.1", "web")]);
        let outcome = wait_for_slots(
            &set("[role=web] [role=db]"),
            &mut provider,
            &options(WaitMode::Available, "2?"),
        )
        .await
        .unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.passes, 4);
        assert_eq!(outcome.addresses(), vec!["10.0.0.1"]);
        assert!(!outcome.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let mut pass = 0;
        let mut provider = || {
            pass += 1;
            if pass == 1 {
                return Err(FleetError::Io {
                    path: PathBuf::from("members.json"),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }
            Ok(vec![node("10.0.0.1", "web")])
        };

        let outcome = wait_for_slots(&set("[role=web]"), &mut provider, &WaitOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.passes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_abort() {
        let mut provider =
            || Err::<Vec<NodeAttributes>, _>(FleetError::InvalidWaitMode("x".to_string()));
        let err = wait_for_slots(&set("[role=web]"), &mut provider, &WaitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::InvalidWaitMode(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_selector_set_finishes_immediately() {
        let mut provider = || Ok::<_, FleetError>(vec![]);
        for mode in [WaitMode::Available, WaitMode::Unavailable] {
            let outcome = wait_for_slots(&set(""), &mut provider, &options(mode, "0"))
                .await
                .unwrap();
            assert_eq!(outcome.passes, 1);
            assert!(outcome.slots.is_empty());
        }
    }

    fn own_record(addresses: &[&str]) -> MemberRecord {
        MemberRecord {
            node_id: Some("self01".to_string()),
            config: Some(MemberConfig {
                ip_assignments: Some(addresses.iter().map(|a| a.to_string()).collect()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_requested_addresses() {
        let snapshots = vec![
            None,
            Some(own_record(&["10.0.0.1/24"])),
            Some(own_record(&["10.0.0.1/24", "FD00:0::1/88"])),
        ];
        let mut pass = 0;
        let mut lookup = || {
            let record = snapshots[pass.min(snapshots.len() - 1)].clone();
            pass += 1;
            Ok::<_, FleetError>(record)
        };

        let requested = vec!["10.0.0.1".to_string(), "fd00::1".to_string()];
        let outcome = wait_for_self_addresses(
            &mut lookup,
            &requested,
            IpVersion::V6,
            &options(WaitMode::Available, "0"),
        )
        .await
        .unwrap();

        assert_eq!(outcome.passes, 3);
        assert_eq!(outcome.address, "fd00:0::1");
        assert!(!outcome.timed_out);
    }

    #[tokio::test(start_paused = true)]
    async fn test_any_address_of_version_without_request() {
        let mut lookup = || Ok::<_, FleetError>(Some(own_record(&["fd00::1", "10.0.0.7/24"])));
        let outcome = wait_for_self_addresses(
            &mut lookup,
            &[],
            IpVersion::V4,
            &options(WaitMode::Available, "0"),
        )
        .await
        .unwrap();
        assert_eq!(outcome.passes, 1);
        assert_eq!(outcome.address, "10.0.0.7");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_address_times_out() {
        let mut lookup = || Ok::<_, FleetError>(Some(own_record(&["10.0.0.1"])));
        let requested = vec!["10.0.0.1".to_string(), "10.0.0.9".to_string()];

        let err = wait_for_self_addresses(
            &mut lookup,
            &requested,
            IpVersion::V4,
            &options(WaitMode::Available, "2"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FleetError::Timeout { pending: 1, .. }));

        let outcome = wait_for_self_addresses(
            &mut lookup,
            &requested,
            IpVersion::V4,
            &options(WaitMode::Available, "2?"),
        )
        .await
        .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.address, "10.0.0.1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_address_wait_retries_transient_errors() {
        let mut pass = 0;
        let mut lookup = || {
            pass += 1;
            if pass == 1 {
                return Err(FleetError::Io {
                    path: PathBuf::from("members.json"),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                });
            }
            Ok(Some(own_record(&["10.0.0.1"])))
        };
        let outcome =
            wait_for_self_addresses(&mut lookup, &[], IpVersion::V4, &WaitOptions::default())
                .await
                .unwrap();
        assert_eq!(outcome.passes, 2);
    }
}
