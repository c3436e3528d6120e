//! # nodesel-fleet
//!
//! The plumbing around the selector compiler: turning controller records into candidate
//! attribute maps, normalizing addresses, fetching pool snapshots, and polling until the slots
//! of a compiled query are filled (or emptied) or a timeout fires.
//!
//! The query language itself lives in `nodesel-query`; nothing here changes how selectors match.

pub mod address;
pub mod attributes;
pub mod error;
pub mod provider;
pub mod records;
pub mod telemetry;
pub mod waiter;

pub use address::{
    addresses_equal, expand_ipv6, has_requested_addresses, select_address, IpVersion,
};
pub use attributes::{known_fields, ActiveFilter, NodeAttributes};
pub use error::{FleetError, FleetResult};
pub use provider::{MemberLookup, PoolProvider, SnapshotProvider};
pub use records::{MemberRecord, NetworkInfo};
pub use telemetry::{init_tracing_with, LogConfig};
pub use waiter::{
    wait_for_self_addresses, wait_for_slots, AddressOutcome, Timeout, WaitMode, WaitOptions,
    WaitOutcome,
};
