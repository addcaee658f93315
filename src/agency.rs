// src/agency.rs
//! Agency resolution and the read-only lookup context handed to the archive sink.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub type AgencyId = String;

/// Above this many directory-resolved agencies, setup warns.
pub const LARGE_AGENCY_SET: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencyEntry {
    pub id: AgencyId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub timezone: Option<String>,
}

/// Source of known agencies (the transit graph).
pub trait AgencyDirectory: Send + Sync {
    /// Every agency known right now, in directory order.
    fn all_agencies(&self) -> Result<Vec<AgencyEntry>>;

    fn agency(&self, id: &str) -> Option<AgencyEntry>;
}

/// In-memory directory, loaded from configuration by the binary.
#[derive(Debug, Clone, Default)]
pub struct StaticAgencyDirectory {
    agencies: Vec<AgencyEntry>,
}

impl StaticAgencyDirectory {
    pub fn new(agencies: Vec<AgencyEntry>) -> Self {
        Self { agencies }
    }
}

impl AgencyDirectory for StaticAgencyDirectory {
    fn all_agencies(&self) -> Result<Vec<AgencyEntry>> {
        Ok(self.agencies.clone())
    }

    fn agency(&self, id: &str) -> Option<AgencyEntry> {
        self.agencies.iter().find(|a| a.id == id).cloned()
    }
}

/// Append-only, order-preserving list of agency ids collected from configuration.
/// A repeated id keeps its first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgencyIdList {
    ids: Vec<AgencyId>,
}

impl AgencyIdList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, id: impl Into<AgencyId>) {
        let id = id.into();
        if id.is_empty() || self.ids.contains(&id) {
            return;
        }
        self.ids.push(id);
    }

    pub fn extend<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<AgencyId>,
    {
        for id in ids {
            self.push(id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn into_vec(self) -> Vec<AgencyId> {
        self.ids
    }
}

impl<S: Into<AgencyId>> FromIterator<S> for AgencyIdList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = AgencyIdList::new();
        list.extend(iter);
        list
    }
}

/// Agency ids tracked for the task's lifetime. Frozen once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencySet {
    ids: Arc<[AgencyId]>,
}

impl AgencySet {
    pub fn ids(&self) -> &[AgencyId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Configured ids win; otherwise every agency the directory knows.
/// The directory is only consulted when `configured` is empty.
pub fn resolve_agency_set(
    configured: &[AgencyId],
    directory: &dyn AgencyDirectory,
) -> Result<AgencySet> {
    let ids: Vec<AgencyId> = if configured.is_empty() {
        info!(target: "archiver", "no agency ids specified, using every known agency");
        let all: AgencyIdList = directory.all_agencies()?.into_iter().map(|a| a.id).collect();
        let all = all.into_vec();
        if all.len() > LARGE_AGENCY_SET {
            warn!(
                target: "archiver",
                n = all.len(),
                "the default agency id set is quite large; consider listing the agencies this feed covers"
            );
        }
        all
    } else {
        configured.iter().cloned().collect::<AgencyIdList>().into_vec()
    };

    info!(target: "archiver", count = ids.len(), "number of agencies");
    for id in &ids {
        info!(target: "archiver", agency_id = %id, "agency id");
    }

    Ok(AgencySet { ids: ids.into() })
}

/// An id from the feed qualified with the agency it may belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AgencyAndId {
    pub agency_id: AgencyId,
    pub id: String,
}

/// Read-only view of the tracked agencies, shared by every dispatch.
#[derive(Debug, Clone)]
pub struct LookupContext {
    agencies: AgencySet,
    entries: HashMap<AgencyId, AgencyEntry>,
}

impl LookupContext {
    /// Resolve every tracked id against `directory`. Ids the directory does not
    /// know are kept without an entry.
    pub fn build(agencies: AgencySet, directory: &dyn AgencyDirectory) -> Self {
        let mut entries = HashMap::with_capacity(agencies.len());
        for id in agencies.ids() {
            match directory.agency(id) {
                Some(entry) => {
                    entries.insert(id.clone(), entry);
                }
                None => warn!(target: "archiver", agency_id = %id, "agency not found in directory"),
            }
        }
        Self { agencies, entries }
    }

    pub fn agency_ids(&self) -> &[AgencyId] {
        self.agencies.ids()
    }

    pub fn agency(&self, id: &str) -> Option<&AgencyEntry> {
        self.entries.get(id)
    }

    pub fn tracks(&self, id: &str) -> bool {
        self.agencies.ids().iter().any(|a| a == id)
    }

    /// First tracked agency; feeds without agency ids are attributed to it.
    pub fn primary_agency(&self) -> Option<&AgencyId> {
        self.agencies.ids().first()
    }

    /// Candidate qualified ids for a raw feed id, one per tracked agency, in order.
    pub fn qualify(&self, raw_id: &str) -> Vec<AgencyAndId> {
        self.agencies
            .ids()
            .iter()
            .map(|agency_id| AgencyAndId {
                agency_id: agency_id.clone(),
                id: raw_id.to_string(),
            })
            .collect()
    }
}
