// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Query registry and dependency resolver.
//!
//! Every remote source is described by a [`QueryKey`] that captures all of the
//! inputs its result depends on. The resolver fires a fetch when a source's
//! key changes, folds cached payloads for keys it has seen before, and drops
//! completions whose key is no longer current.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::{
    DashboardError, EnrollSecret, HostSummary, MacAdminsAggregate, MdmSummary, Platform,
    Selection, SoftwareResponse, SortDirection, Team, TeamId, ViewerContext,
};

pub const SOFTWARE_PAGE_SIZE: usize = 8;
pub const SOFTWARE_ORDER_KEY: &str = "hosts_count";
pub const SOFTWARE_ORDER_DIRECTION: SortDirection = SortDirection::Desc;
/// Premium only; the server accepts 1-100.
pub const LOW_DISK_SPACE_GB: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QuerySource {
    HostSummary,
    Teams,
    GlobalEnrollSecrets,
    TeamEnrollSecrets,
    Software,
    MdmSummary,
    MacAdmins,
}

impl QuerySource {
    pub const ALL: [Self; 7] = [
        Self::HostSummary,
        Self::Teams,
        Self::GlobalEnrollSecrets,
        Self::TeamEnrollSecrets,
        Self::Software,
        Self::MdmSummary,
        Self::MacAdmins,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::HostSummary => "host summary",
            Self::Teams => "teams",
            Self::GlobalEnrollSecrets => "global enroll secrets",
            Self::TeamEnrollSecrets => "team enroll secrets",
            Self::Software => "software",
            Self::MdmSummary => "MDM summary",
            Self::MacAdmins => "macadmins",
        }
    }

    /// How long a cached payload counts as fresh.
    pub const fn stale_time(self) -> Duration {
        match self {
            Self::Software => Duration::from_secs(30),
            _ => Duration::ZERO,
        }
    }

    /// Sources whose previous payload stays on screen while a new key for the
    /// same team scope loads.
    pub const fn keeps_previous_data(self) -> bool {
        matches!(self, Self::Software | Self::MacAdmins)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SoftwareTab {
    #[default]
    All,
    Vulnerable,
}

impl SoftwareTab {
    pub const fn is_vulnerable(self) -> bool {
        matches!(self, Self::Vulnerable)
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::All => Self::Vulnerable,
            Self::Vulnerable => Self::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SoftwarePager {
    pub page_index: usize,
    pub tab: SoftwareTab,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SoftwareQuery {
    pub page: usize,
    pub per_page: usize,
    pub order_key: &'static str,
    pub order_direction: SortDirection,
    pub vulnerable: bool,
    pub team: Option<TeamId>,
}

/// Cache key: the full tuple of inputs a source's result is valid for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    HostSummary {
        team: Option<TeamId>,
        platform: Platform,
        low_disk_space_gb: Option<u32>,
    },
    Teams,
    GlobalEnrollSecrets,
    TeamEnrollSecrets {
        team: TeamId,
    },
    Software(SoftwareQuery),
    MdmSummary {
        platform: Platform,
        team: Option<TeamId>,
    },
    MacAdmins {
        team: Option<TeamId>,
    },
}

impl QueryKey {
    pub const fn source(&self) -> QuerySource {
        match self {
            Self::HostSummary { .. } => QuerySource::HostSummary,
            Self::Teams => QuerySource::Teams,
            Self::GlobalEnrollSecrets => QuerySource::GlobalEnrollSecrets,
            Self::TeamEnrollSecrets { .. } => QuerySource::TeamEnrollSecrets,
            Self::Software(_) => QuerySource::Software,
            Self::MdmSummary { .. } => QuerySource::MdmSummary,
            Self::MacAdmins { .. } => QuerySource::MacAdmins,
        }
    }

    /// Team scope the key was issued for; `None` is the global scope.
    pub fn team(&self) -> Option<TeamId> {
        match self {
            Self::Teams | Self::GlobalEnrollSecrets => None,
            Self::TeamEnrollSecrets { team } => Some(*team),
            Self::Software(query) => query.team,
            Self::HostSummary { team, .. }
            | Self::MdmSummary { team, .. }
            | Self::MacAdmins { team } => *team,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryPayload {
    HostSummary(HostSummary),
    Teams(Vec<Team>),
    GlobalEnrollSecrets(Vec<EnrollSecret>),
    TeamEnrollSecrets(Vec<EnrollSecret>),
    Software(SoftwareResponse),
    MdmSummary(MdmSummary),
    MacAdmins(MacAdminsAggregate),
}

impl QueryPayload {
    pub const fn source(&self) -> QuerySource {
        match self {
            Self::HostSummary(_) => QuerySource::HostSummary,
            Self::Teams(_) => QuerySource::Teams,
            Self::GlobalEnrollSecrets(_) => QuerySource::GlobalEnrollSecrets,
            Self::TeamEnrollSecrets(_) => QuerySource::TeamEnrollSecrets,
            Self::Software(_) => QuerySource::Software,
            Self::MdmSummary(_) => QuerySource::MdmSummary,
            Self::MacAdmins(_) => QuerySource::MacAdmins,
        }
    }
}

/// Outcome of one fetch, tagged with the key it was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub key: QueryKey,
    pub result: Result<QueryPayload, DashboardError>,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryInputs<'a> {
    pub selection: &'a Selection,
    pub context: &'a ViewerContext,
    pub software: SoftwarePager,
}

impl QueryInputs<'_> {
    /// Team-level feature flags override the org default.
    pub fn software_inventory_enabled(&self) -> bool {
        match &self.selection.team {
            Some(team) => team.features.enable_software_inventory,
            None => self.context.org_features.enable_software_inventory,
        }
    }

    fn software_scope_permitted(&self) -> bool {
        self.context.is_on_global_team()
            || self
                .selection
                .team_id()
                .is_some_and(|team| self.context.belongs_to_team(team))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub key: QueryKey,
    pub stale_time: Duration,
}

pub fn is_enabled(source: QuerySource, inputs: &QueryInputs<'_>) -> bool {
    let team = inputs.selection.team_id();
    match source {
        QuerySource::HostSummary => true,
        QuerySource::Teams => inputs.context.is_premium(),
        QuerySource::GlobalEnrollSecrets => inputs.context.can_enroll_global_hosts(),
        QuerySource::TeamEnrollSecrets => team.is_some() && inputs.context.can_enroll_hosts(team),
        QuerySource::Software => {
            inputs.software_inventory_enabled() && inputs.software_scope_permitted()
        }
        QuerySource::MdmSummary => inputs.selection.platform != Platform::Linux,
        QuerySource::MacAdmins => inputs.selection.platform == Platform::Darwin,
    }
}

/// Descriptor for `source` under the current inputs, or `None` when the
/// source's predicate is false.
pub fn describe(source: QuerySource, inputs: &QueryInputs<'_>) -> Option<QueryDescriptor> {
    if !is_enabled(source, inputs) {
        return None;
    }

    let team = inputs.selection.team_id();
    let platform = inputs.selection.platform;
    let key = match source {
        QuerySource::HostSummary => QueryKey::HostSummary {
            team,
            platform,
            low_disk_space_gb: inputs.context.is_premium().then_some(LOW_DISK_SPACE_GB),
        },
        QuerySource::Teams => QueryKey::Teams,
        QuerySource::GlobalEnrollSecrets => QueryKey::GlobalEnrollSecrets,
        QuerySource::TeamEnrollSecrets => QueryKey::TeamEnrollSecrets { team: team? },
        QuerySource::Software => QueryKey::Software(SoftwareQuery {
            page: inputs.software.page_index,
            per_page: SOFTWARE_PAGE_SIZE,
            order_key: SOFTWARE_ORDER_KEY,
            order_direction: SOFTWARE_ORDER_DIRECTION,
            vulnerable: inputs.software.tab.is_vulnerable(),
            team,
        }),
        QuerySource::MdmSummary => QueryKey::MdmSummary { platform, team },
        QuerySource::MacAdmins => QueryKey::MacAdmins { team },
    };

    Some(QueryDescriptor {
        key,
        stale_time: source.stale_time(),
    })
}

/// All enabled descriptors for the current inputs, in registry order.
pub fn registry(inputs: &QueryInputs<'_>) -> BTreeMap<QuerySource, QueryDescriptor> {
    QuerySource::ALL
        .into_iter()
        .filter_map(|source| describe(source, inputs).map(|descriptor| (source, descriptor)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceStatus {
    pub enabled: bool,
    pub fetching: bool,
    pub loaded: bool,
    pub error: Option<DashboardError>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: QueryPayload,
    fetched_at: Instant,
}

impl CacheEntry {
    fn is_stale(&self, stale_time: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) >= stale_time
    }
}

/// What the caller must do after a resolve pass: slices to clear because
/// their source moved to a key with nothing cached, payloads to fold right
/// away from cache, and keys to fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    pub reset: Vec<QuerySource>,
    pub cached: Vec<QueryPayload>,
    pub fetches: Vec<QueryKey>,
}

/// Upper bound on cached payloads; the oldest non-current entries go first.
pub const CACHE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct QueryResolver {
    current: BTreeMap<QuerySource, QueryDescriptor>,
    in_flight: HashSet<QueryKey>,
    cache: HashMap<QueryKey, CacheEntry>,
    errors: BTreeMap<QuerySource, DashboardError>,
}

impl QueryResolver {
    /// Diffs the enabled descriptors against the previous pass. Only sources
    /// whose key changed (or that just became enabled) are touched.
    pub fn resolve(
        &mut self,
        descriptors: BTreeMap<QuerySource, QueryDescriptor>,
        now: Instant,
    ) -> Resolution {
        let mut resolution = Resolution::default();

        self.current.retain(|source, _| descriptors.contains_key(source));
        self.errors.retain(|source, _| descriptors.contains_key(source));

        for (source, descriptor) in descriptors {
            let previous = self.current.get(&source).map(|previous| &previous.key);
            if previous == Some(&descriptor.key) {
                continue;
            }
            let same_scope = previous.is_some_and(|key| key.team() == descriptor.key.team());

            self.errors.remove(&source);
            let needs_fetch = match self.cache.get(&descriptor.key) {
                Some(entry) => {
                    resolution.cached.push(entry.payload.clone());
                    entry.is_stale(descriptor.stale_time, now)
                }
                None => {
                    if !(source.keeps_previous_data() && same_scope) {
                        resolution.reset.push(source);
                    }
                    true
                }
            };
            if needs_fetch && self.in_flight.insert(descriptor.key.clone()) {
                debug!(source = source.label(), key = ?descriptor.key, "fetch");
                resolution.fetches.push(descriptor.key.clone());
            }
            self.current.insert(source, descriptor);
        }

        resolution
    }

    /// Refetches every current source whose cached payload has gone stale.
    pub fn refresh(&mut self, now: Instant) -> Vec<QueryKey> {
        let mut fetches = Vec::new();
        for (source, descriptor) in &self.current {
            let stale = self
                .cache
                .get(&descriptor.key)
                .is_none_or(|entry| entry.is_stale(descriptor.stale_time, now));
            if stale && self.in_flight.insert(descriptor.key.clone()) {
                debug!(source = source.label(), key = ?descriptor.key, "refresh");
                fetches.push(descriptor.key.clone());
            }
        }
        fetches
    }

    /// Records a completion. Returns the payload to fold only when the
    /// completion's key is still the source's current key; superseded
    /// payloads are cached under their own key and never folded.
    pub fn complete(&mut self, completion: Completion, now: Instant) -> Option<QueryPayload> {
        let Completion { key, result } = completion;
        self.in_flight.remove(&key);
        let source = key.source();
        let is_current = self
            .current
            .get(&source)
            .is_some_and(|descriptor| descriptor.key == key);

        match result {
            Ok(payload) if payload.source() != source => {
                warn!(
                    source = source.label(),
                    payload = payload.source().label(),
                    "payload does not match its key; dropping"
                );
                None
            }
            Ok(payload) => {
                self.cache.insert(
                    key.clone(),
                    CacheEntry {
                        payload: payload.clone(),
                        fetched_at: now,
                    },
                );
                self.evict();
                if !is_current {
                    debug!(source = source.label(), key = ?key, "discarding stale completion");
                    return None;
                }
                self.errors.remove(&source);
                Some(payload)
            }
            Err(error) => {
                if !is_current {
                    debug!(source = source.label(), %error, "discarding stale failure");
                    return None;
                }
                warn!(source = source.label(), %error, "fetch failed");
                self.errors.insert(source, error);
                None
            }
        }
    }

    /// Drops the oldest cached payloads that no source currently points at
    /// until the cache fits [`CACHE_CAPACITY`].
    fn evict(&mut self) {
        while self.cache.len() > CACHE_CAPACITY {
            let oldest = self
                .cache
                .iter()
                .filter(|(key, _)| self.current_key(key.source()) != Some(*key))
                .min_by_key(|(_, entry)| entry.fetched_at)
                .map(|(key, _)| key.clone());
            let Some(oldest) = oldest else {
                return;
            };
            debug!(key = ?oldest, "evicting cached payload");
            self.cache.remove(&oldest);
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn current_key(&self, source: QuerySource) -> Option<&QueryKey> {
        self.current.get(&source).map(|descriptor| &descriptor.key)
    }

    pub fn status(&self, source: QuerySource) -> SourceStatus {
        let Some(descriptor) = self.current.get(&source) else {
            return SourceStatus::default();
        };
        SourceStatus {
            enabled: true,
            fetching: self.in_flight.contains(&descriptor.key),
            loaded: self.cache.contains_key(&descriptor.key),
            error: self.errors.get(&source).cloned(),
        }
    }
}
