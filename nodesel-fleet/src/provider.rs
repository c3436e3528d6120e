//! Pool providers
//!
//!     The waiter asks a provider for a fresh candidate pool on every pass. Any `FnMut` closure
//!     returning a pool is a provider, which keeps tests free of fixtures. [SnapshotProvider]
//!     reads a member list exported from the network controller, so a pool changes whenever the
//!     file is rewritten between passes.
//!
//!     [MemberLookup] is the same seam for the waiting node's own record, used while waiting for
//!     its addresses to be assigned.

use crate::attributes::{ActiveFilter, NodeAttributes};
use crate::error::{FleetError, FleetResult};
use crate::records::{MemberRecord, NetworkInfo};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// Source of candidate pools
pub trait PoolProvider {
    /// Current candidates, in the order they should be offered to slots
    fn fetch(&mut self) -> FleetResult<Vec<NodeAttributes>>;
}

impl<F> PoolProvider for F
where
    F: FnMut() -> FleetResult<Vec<NodeAttributes>>,
{
    fn fetch(&mut self) -> FleetResult<Vec<NodeAttributes>> {
        self()
    }
}

/// Source of the waiting node's own member record
pub trait MemberLookup {
    /// The record, or `None` while the node is not part of the snapshot
    fn lookup(&mut self) -> FleetResult<Option<MemberRecord>>;
}

impl<F> MemberLookup for F
where
    F: FnMut() -> FleetResult<Option<MemberRecord>>,
{
    fn lookup(&mut self) -> FleetResult<Option<MemberRecord>> {
        self()
    }
}

/// Read and decode a JSON file
pub fn read_json<T: DeserializeOwned>(path: &Path) -> FleetResult<T> {
    let text = fs::read_to_string(path).map_err(|source| FleetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| FleetError::Decode {
        what: path.display().to_string(),
        source,
    })
}

/// Candidates from a member list file, re-read on every fetch
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    members: PathBuf,
    network: NetworkInfo,
    filter: ActiveFilter,
}

impl SnapshotProvider {
    pub fn new(members: impl Into<PathBuf>, network: NetworkInfo, filter: ActiveFilter) -> Self {
        Self {
            members: members.into(),
            network,
            filter,
        }
    }
}

impl PoolProvider for SnapshotProvider {
    fn fetch(&mut self) -> FleetResult<Vec<NodeAttributes>> {
        let members: Vec<MemberRecord> = read_json(&self.members)?;
        let pool = self.filter.candidates(&members, &self.network);
        tracing::debug!(
            members = members.len(),
            candidates = pool.len(),
            "read member snapshot"
        );
        Ok(pool)
    }
}

/// Finds the filter's own node id in the member file; never a match without one
impl MemberLookup for SnapshotProvider {
    fn lookup(&mut self) -> FleetResult<Option<MemberRecord>> {
        let Some(self_id) = self.filter.self_id.as_deref() else {
            return Ok(None);
        };
        let members: Vec<MemberRecord> = read_json(&self.members)?;
        Ok(members
            .into_iter()
            .find(|member| member.node_id.as_deref() == Some(self_id)))
    }
}
