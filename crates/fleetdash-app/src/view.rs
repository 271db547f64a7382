// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! View-state reducer. Each source owns exactly one slice of [`ViewState`]
//! and its fold is a pure function of the previous slice and the payload, so
//! folds from different sources commute and re-applying a payload is a no-op.

use time::OffsetDateTime;

use crate::{
    DashboardError, EnrollSecret, HostSummary, LabelId, LabelSummary, LabelType, LookupTarget,
    MacAdminsAggregate, MdmSolution, MdmSummary, MunkiIssue, MunkiVersion, Platform,
    QueryPayload, QuerySource, SoftwareResponse, Team, TeamId, Tier,
};

/// "Last updated" decoration shown next to a card title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastUpdated {
    pub what: &'static str,
    pub at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostsView {
    pub totals_hosts_count: Option<u64>,
    pub mac_count: u64,
    pub windows_count: u64,
    pub linux_count: u64,
    pub missing_count: u64,
    pub low_disk_space_count: u64,
    pub labels: Option<Vec<LabelSummary>>,
    /// False until the first host summary lands; never flips back.
    pub show_hosts_ui: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SoftwareView {
    pub listing: Option<SoftwareResponse>,
    pub title_detail: Option<LastUpdated>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MdmEnrollmentBucket {
    pub status: &'static str,
    pub hosts: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MdmView {
    pub visible: bool,
    pub enrollment: Vec<MdmEnrollmentBucket>,
    pub solutions: Option<Vec<MdmSolution>>,
    pub title_detail: Option<LastUpdated>,
}

impl Default for MdmView {
    fn default() -> Self {
        Self {
            visible: true,
            enrollment: Vec::new(),
            solutions: None,
            title_detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MunkiView {
    pub visible: bool,
    pub versions: Vec<MunkiVersion>,
    pub issues: Vec<MunkiIssue>,
    pub title_detail: Option<LastUpdated>,
}

impl Default for MunkiView {
    fn default() -> Self {
        Self {
            visible: true,
            versions: Vec::new(),
            issues: Vec::new(),
            title_detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    pub hosts: HostsView,
    pub teams: Option<Vec<Team>>,
    pub global_secrets: Option<Vec<EnrollSecret>>,
    pub team_secrets: Option<Vec<EnrollSecret>>,
    pub software: SoftwareView,
    pub mdm: MdmView,
    pub munki: MunkiView,
}

impl ViewState {
    pub fn apply(&mut self, payload: &QueryPayload, tier: Tier) {
        match payload {
            QueryPayload::HostSummary(summary) => {
                self.hosts = reduce_host_summary(&self.hosts, summary, tier);
            }
            QueryPayload::Teams(teams) => self.teams = Some(reduce_teams(teams)),
            QueryPayload::GlobalEnrollSecrets(secrets) => {
                self.global_secrets = Some(secrets.clone());
            }
            QueryPayload::TeamEnrollSecrets(secrets) => {
                self.team_secrets = Some(secrets.clone());
            }
            QueryPayload::Software(response) => {
                self.software = reduce_software(&self.software, response);
            }
            QueryPayload::MdmSummary(summary) => self.mdm = reduce_mdm(&self.mdm, summary),
            QueryPayload::MacAdmins(aggregate) => self.munki = reduce_munki(aggregate),
        }
    }

    /// Clears the slice a source owns once its key moves to a scope with no
    /// cached payload. The hosts UI flag survives; it only gates first load.
    pub fn reset(&mut self, source: QuerySource) {
        match source {
            QuerySource::HostSummary => {
                self.hosts = HostsView {
                    show_hosts_ui: self.hosts.show_hosts_ui,
                    ..HostsView::default()
                };
            }
            QuerySource::Teams => self.teams = None,
            QuerySource::GlobalEnrollSecrets => self.global_secrets = None,
            QuerySource::TeamEnrollSecrets => self.team_secrets = None,
            QuerySource::Software => self.software = SoftwareView::default(),
            QuerySource::MdmSummary => self.mdm = MdmView::default(),
            QuerySource::MacAdmins => self.munki = MunkiView::default(),
        }
    }

    pub fn teams(&self) -> &[Team] {
        self.teams.as_deref().unwrap_or_default()
    }

    pub fn selected_platform_label_id(&self, platform: Platform) -> Option<LabelId> {
        let labels = self.hosts.labels.as_deref()?;
        resolve_platform_label(labels, platform).ok().flatten()
    }
}

pub fn reduce_host_summary(previous: &HostsView, summary: &HostSummary, tier: Tier) -> HostsView {
    let (missing_count, low_disk_space_count) = match tier {
        Tier::Premium => (
            summary.missing_30_days_count.unwrap_or(0),
            summary.low_disk_space_count.unwrap_or(0),
        ),
        Tier::Free => (previous.missing_count, previous.low_disk_space_count),
    };

    HostsView {
        totals_hosts_count: Some(summary.totals_hosts_count),
        mac_count: summary.platform_count(Platform::Darwin.as_str()),
        windows_count: summary.platform_count(Platform::Windows.as_str()),
        linux_count: summary.all_linux_count,
        missing_count,
        low_disk_space_count,
        labels: Some(summary.builtin_labels.clone()),
        show_hosts_ui: true,
    }
}

/// Teams sorted case-insensitively by name.
pub fn reduce_teams(teams: &[Team]) -> Vec<Team> {
    let mut sorted = teams.to_vec();
    sorted.sort_by_key(|team| team.name.to_lowercase());
    sorted
}

pub fn reduce_software(previous: &SoftwareView, response: &SoftwareResponse) -> SoftwareView {
    let title_detail = if response.rows().is_empty() {
        previous.title_detail
    } else {
        Some(LastUpdated {
            what: "software",
            at: response.counts_updated_at,
        })
    };
    SoftwareView {
        listing: Some(response.clone()),
        title_detail,
    }
}

/// A summary with no hosts and no MDM solution hides the card instead of
/// rendering it empty; the rest of the slice keeps its previous value.
pub fn reduce_mdm(previous: &MdmView, summary: &MdmSummary) -> MdmView {
    let status = summary.mobile_device_management_enrollment_status;
    if status.hosts_count == 0 && summary.mobile_device_management_solution.is_none() {
        return MdmView {
            visible: false,
            ..previous.clone()
        };
    }

    MdmView {
        visible: true,
        enrollment: vec![
            MdmEnrollmentBucket {
                status: "Enrolled (manual)",
                hosts: status.enrolled_manual_hosts_count,
            },
            MdmEnrollmentBucket {
                status: "Enrolled (automatic)",
                hosts: status.enrolled_automated_hosts_count,
            },
            MdmEnrollmentBucket {
                status: "Unenrolled",
                hosts: status.unenrolled_hosts_count,
            },
        ],
        solutions: summary.mobile_device_management_solution.clone(),
        title_detail: Some(LastUpdated {
            what: "MDM information",
            at: summary.counts_updated_at,
        }),
    }
}

pub fn reduce_munki(aggregate: &MacAdminsAggregate) -> MunkiView {
    let versions = aggregate.munki_versions.clone().unwrap_or_default();
    MunkiView {
        visible: !versions.is_empty(),
        versions,
        issues: aggregate.munki_issues.clone().unwrap_or_default(),
        title_detail: Some(LastUpdated {
            what: "Munki",
            at: aggregate.counts_updated_at,
        }),
    }
}

/// `Ok(None)` for [`Platform::All`]; a lookup error when the platform's
/// builtin label is missing from the summary.
pub fn resolve_platform_label(
    labels: &[LabelSummary],
    platform: Platform,
) -> Result<Option<LabelId>, DashboardError> {
    let Some(name) = platform.builtin_label_name() else {
        return Ok(None);
    };
    labels
        .iter()
        .find(|label| label.label_type == LabelType::Builtin && label.name == name)
        .map(|label| Some(label.id))
        .ok_or(DashboardError::Lookup(LookupTarget::PlatformLabel(platform)))
}

/// True only when inventory has never been collected: global scope, first
/// page, no rows, and no counts timestamp. The vulnerable tab is not part of
/// the rule.
pub fn is_collecting_inventory(
    team: Option<TeamId>,
    page_index: usize,
    listing: Option<&SoftwareResponse>,
) -> bool {
    let Some(listing) = listing else {
        return false;
    };
    team.is_none()
        && page_index == 0
        && listing.rows().is_empty()
        && listing.counts_updated_at.is_none()
}
