// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

pub const DASHBOARD_PATH: &str = "/dashboard";
pub const DASHBOARD_MAC_PATH: &str = "/dashboard/mac";
pub const DASHBOARD_WINDOWS_PATH: &str = "/dashboard/windows";
pub const DASHBOARD_LINUX_PATH: &str = "/dashboard/linux";
pub const MANAGE_HOSTS_PATH: &str = "/hosts/manage";
pub const MANAGE_SOFTWARE_PATH: &str = "/software/manage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    All,
    Darwin,
    Windows,
    Linux,
}

impl Platform {
    pub const ALL: [Self; 4] = [Self::All, Self::Darwin, Self::Windows, Self::Linux];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
            Self::Linux => "linux",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Darwin => "macOS",
            Self::Windows => "Windows",
            Self::Linux => "Linux",
        }
    }

    /// Canonical dashboard route for the platform.
    pub const fn path(self) -> &'static str {
        match self {
            Self::All => DASHBOARD_PATH,
            Self::Darwin => DASHBOARD_MAC_PATH,
            Self::Windows => DASHBOARD_WINDOWS_PATH,
            Self::Linux => DASHBOARD_LINUX_PATH,
        }
    }

    /// Unmatched paths resolve to [`Platform::All`].
    pub fn from_path(path: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|platform| platform.path() == path)
            .unwrap_or(Self::All)
    }

    /// Name of the builtin label that filters hosts to this platform.
    pub const fn builtin_label_name(self) -> Option<&'static str> {
        match self {
            Self::All => None,
            Self::Darwin => Some("macOS"),
            Self::Windows => Some("MS Windows"),
            Self::Linux => Some("All Linux"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Self::Free),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Maintainer,
    Observer,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Maintainer => "maintainer",
            Self::Observer => "observer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "maintainer" => Some(Self::Maintainer),
            "observer" => Some(Self::Observer),
            _ => None,
        }
    }

    pub const fn can_enroll_hosts(self) -> bool {
        matches!(self, Self::Admin | Self::Maintainer)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Features {
    #[serde(default)]
    pub enable_software_inventory: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    #[serde(default)]
    pub features: Features,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelType {
    Builtin,
    #[serde(other)]
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSummary {
    pub id: LabelId,
    pub name: String,
    pub label_type: LabelType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSummaryPlatform {
    pub platform: String,
    pub hosts_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSummary {
    pub totals_hosts_count: u64,
    #[serde(default)]
    pub platforms: Option<Vec<HostSummaryPlatform>>,
    #[serde(default)]
    pub all_linux_count: u64,
    #[serde(default)]
    pub missing_30_days_count: Option<u64>,
    #[serde(default)]
    pub low_disk_space_count: Option<u64>,
    #[serde(default)]
    pub builtin_labels: Vec<LabelSummary>,
}

impl HostSummary {
    /// Count for an exact platform string; absent platforms count as zero.
    pub fn platform_count(&self, platform: &str) -> u64 {
        self.platforms
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|entry| entry.platform == platform)
            .map(|entry| entry.hosts_count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamsResponse {
    pub teams: Vec<Team>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollSecret {
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnrollSecretsResponse {
    #[serde(default)]
    pub secrets: Vec<EnrollSecret>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub cve: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Software {
    pub id: SoftwareId,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub hosts_count: u64,
    #[serde(default)]
    pub vulnerabilities: Option<Vec<Vulnerability>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SoftwareResponse {
    #[serde(default)]
    pub software: Option<Vec<Software>>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub counts_updated_at: Option<OffsetDateTime>,
}

impl SoftwareResponse {
    pub fn rows(&self) -> &[Software] {
        self.software.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MdmEnrollmentStatus {
    pub enrolled_manual_hosts_count: u64,
    pub enrolled_automated_hosts_count: u64,
    pub unenrolled_hosts_count: u64,
    pub hosts_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdmSolution {
    #[serde(default)]
    pub name: Option<String>,
    pub server_url: String,
    pub hosts_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MdmSummary {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub counts_updated_at: Option<OffsetDateTime>,
    pub mobile_device_management_enrollment_status: MdmEnrollmentStatus,
    #[serde(default)]
    pub mobile_device_management_solution: Option<Vec<MdmSolution>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunkiVersion {
    pub version: String,
    pub hosts_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MunkiIssueKind {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunkiIssue {
    pub id: MunkiIssueId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MunkiIssueKind,
    pub hosts_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacAdminsAggregate {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub counts_updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub munki_versions: Option<Vec<MunkiVersion>>,
    #[serde(default)]
    pub munki_issues: Option<Vec<MunkiIssue>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacAdminsResponse {
    pub macadmins: MacAdminsAggregate,
}
