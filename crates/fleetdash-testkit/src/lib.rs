// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use fleetdash_app::{
    EnrollSecret, Features, HostSummary, HostSummaryPlatform, LabelId, LabelSummary, LabelType,
    MacAdminsAggregate, MdmEnrollmentStatus, MdmSolution, MdmSummary, MunkiIssue, MunkiIssueId,
    MunkiIssueKind, MunkiVersion, Platform, QueryKey, QueryPayload, Role, Software, SoftwareId,
    SoftwareQuery, SoftwareResponse, Team, TeamId, TeamRole, Tier, ViewerContext, Vulnerability,
};
use time::{Date, Duration, Month, OffsetDateTime, Time};

const TEAM_NAMES: [&str; 5] = ["Workstations", "servers", "Canary", "kiosks", "Design"];

const SOFTWARE_NAMES: [&str; 20] = [
    "Google Chrome",
    "Firefox",
    "Slack",
    "zoom.us",
    "Visual Studio Code",
    "osquery",
    "Docker Desktop",
    "1Password",
    "Microsoft Teams",
    "Microsoft Excel",
    "Notion",
    "iTerm2",
    "Spotify",
    "curl",
    "openssl",
    "python3",
    "git",
    "vim",
    "Postman",
    "Figma",
];
const SOFTWARE_SOURCES: [&str; 4] = ["apps", "programs", "deb_packages", "homebrew_packages"];

const MDM_VENDORS: [(&str, &str); 3] = [
    ("MicroMDM", "https://micromdm.example.com"),
    ("Jamf", "https://acme.jamfcloud.com"),
    ("Fleet", "https://fleet.example.com"),
];

const MUNKI_VERSIONS: [&str; 4] = ["6.3.1", "6.2.0", "5.7.3", "5.5.1"];
const MUNKI_ISSUES: [(&str, MunkiIssueKind); 4] = [
    ("Could not retrieve managed install primary manifest", MunkiIssueKind::Error),
    ("Catalog is missing required item", MunkiIssueKind::Warning),
    ("Download failed", MunkiIssueKind::Error),
    ("Install of package skipped", MunkiIssueKind::Warning),
];

/// Total software titles the fixture fleet reports before paging.
const SOFTWARE_TITLES: usize = 19;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_range(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        min + self.next_u64() % (max - min + 1)
    }
}

/// Deterministic fixture fleet. Every payload is a pure function of the seed
/// and the query key, so repeated fetches of the same key agree.
#[derive(Debug, Clone)]
pub struct FleetFaker {
    seed: u64,
    team_count: usize,
}

impl FleetFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            seed: if seed == 0 { 1 } else { seed },
            team_count: 3,
        }
    }

    pub fn with_team_count(mut self, team_count: usize) -> Self {
        self.team_count = team_count.min(TEAM_NAMES.len());
        self
    }

    pub fn teams(&self) -> Vec<Team> {
        TEAM_NAMES
            .iter()
            .take(self.team_count)
            .enumerate()
            .map(|(index, name)| Team {
                id: TeamId::new(index as i64 + 1),
                name: (*name).to_owned(),
                features: Features {
                    enable_software_inventory: index != 2,
                },
            })
            .collect()
    }

    pub fn host_summary(&self, team: Option<TeamId>, platform: Platform) -> HostSummary {
        let mut rng = self.rng(&[scope(team), platform_salt(platform)]);
        let mac = rng.int_range(10, 120);
        let windows = rng.int_range(5, 90);
        let linux = rng.int_range(0, 40);
        let (mac, windows, linux) = match platform {
            Platform::All => (mac, windows, linux),
            Platform::Darwin => (mac, 0, 0),
            Platform::Windows => (0, windows, 0),
            Platform::Linux => (0, 0, linux),
        };
        let total = mac + windows + linux;

        let mut platforms = Vec::new();
        if mac > 0 {
            platforms.push(host_platform("darwin", mac));
        }
        if windows > 0 {
            platforms.push(host_platform("windows", windows));
        }
        if linux > 0 {
            let ubuntu = linux / 2;
            platforms.push(host_platform("ubuntu", ubuntu));
            platforms.push(host_platform("rhel", linux - ubuntu));
        }

        HostSummary {
            totals_hosts_count: total,
            platforms: Some(platforms),
            all_linux_count: linux,
            missing_30_days_count: Some(rng.int_range(0, total / 10)),
            low_disk_space_count: Some(rng.int_range(0, total / 8)),
            builtin_labels: builtin_labels(),
        }
    }

    pub fn enroll_secrets(&self, team: Option<TeamId>) -> Vec<EnrollSecret> {
        let secret = match team {
            Some(team) => format!("team-{team}-{:012x}", self.seed.wrapping_mul(31)),
            None => format!("global-{:012x}", self.seed.wrapping_mul(17)),
        };
        vec![EnrollSecret { secret }]
    }

    pub fn software(&self, query: &SoftwareQuery) -> SoftwareResponse {
        let mut rng = self.rng(&[scope(query.team), 0x50F7]);
        let mut rows: Vec<Software> = SOFTWARE_NAMES
            .iter()
            .take(SOFTWARE_TITLES)
            .enumerate()
            .map(|(index, name)| {
                let vulnerable = rng.next_u64() % 3 == 0;
                Software {
                    id: SoftwareId::new(index as i64 + 1),
                    name: (*name).to_owned(),
                    version: format!("{}.{}", rng.int_range(1, 20), rng.int_range(0, 9)),
                    source: SOFTWARE_SOURCES[index % SOFTWARE_SOURCES.len()].to_owned(),
                    hosts_count: rng.int_range(1, 200),
                    vulnerabilities: vulnerable.then(|| {
                        vec![Vulnerability {
                            cve: format!("CVE-2026-{:04}", rng.int_range(1000, 9999)),
                        }]
                    }),
                }
            })
            .filter(|row| !query.vulnerable || row.vulnerabilities.is_some())
            .collect();
        rows.sort_by(|left, right| right.hosts_count.cmp(&left.hosts_count));

        let page: Vec<Software> = rows
            .into_iter()
            .skip(query.page * query.per_page)
            .take(query.per_page)
            .collect();
        SoftwareResponse {
            software: Some(page),
            counts_updated_at: Some(reference_now() - Duration::minutes(42)),
        }
    }

    pub fn mdm_summary(&self, team: Option<TeamId>, platform: Platform) -> MdmSummary {
        let mut rng = self.rng(&[scope(team), platform_salt(platform), 0x3D3]);
        let manual = rng.int_range(0, 40);
        let automated = rng.int_range(0, 60);
        let unenrolled = rng.int_range(0, 20);
        let vendor = MDM_VENDORS[(rng.next_u64() % MDM_VENDORS.len() as u64) as usize];
        MdmSummary {
            counts_updated_at: Some(reference_now() - Duration::hours(1)),
            mobile_device_management_enrollment_status: MdmEnrollmentStatus {
                enrolled_manual_hosts_count: manual,
                enrolled_automated_hosts_count: automated,
                unenrolled_hosts_count: unenrolled,
                hosts_count: manual + automated + unenrolled,
            },
            mobile_device_management_solution: Some(vec![MdmSolution {
                name: Some(vendor.0.to_owned()),
                server_url: vendor.1.to_owned(),
                hosts_count: manual + automated,
            }]),
        }
    }

    pub fn macadmins(&self, team: Option<TeamId>) -> MacAdminsAggregate {
        let mut rng = self.rng(&[scope(team), 0x3A6]);
        let versions = MUNKI_VERSIONS
            .iter()
            .map(|version| MunkiVersion {
                version: (*version).to_owned(),
                hosts_count: rng.int_range(1, 50),
            })
            .collect();
        let issues = MUNKI_ISSUES
            .iter()
            .enumerate()
            .map(|(index, (name, kind))| MunkiIssue {
                id: MunkiIssueId::new(index as i64 + 1),
                name: (*name).to_owned(),
                kind: *kind,
                hosts_count: rng.int_range(0, 12),
            })
            .collect();
        MacAdminsAggregate {
            counts_updated_at: Some(reference_now() - Duration::minutes(15)),
            munki_versions: Some(versions),
            munki_issues: Some(issues),
        }
    }

    fn rng(&self, salts: &[u64]) -> DeterministicRng {
        let seed = salts.iter().fold(self.seed, |acc, salt| {
            acc.wrapping_mul(0x100_0000_01B3).wrapping_add(*salt)
        });
        DeterministicRng::new(seed)
    }
}

/// Fixture-backed stand-in for the fleet API.
#[derive(Debug, Clone)]
pub struct FixtureBackend {
    faker: FleetFaker,
}

impl FixtureBackend {
    pub fn new(faker: FleetFaker) -> Self {
        Self { faker }
    }

    pub fn fetch(&self, key: &QueryKey) -> Result<QueryPayload> {
        let payload = match key {
            QueryKey::HostSummary { team, platform, .. } => {
                self.known_team(*team)?;
                QueryPayload::HostSummary(self.faker.host_summary(*team, *platform))
            }
            QueryKey::Teams => QueryPayload::Teams(self.faker.teams()),
            QueryKey::GlobalEnrollSecrets => {
                QueryPayload::GlobalEnrollSecrets(self.faker.enroll_secrets(None))
            }
            QueryKey::TeamEnrollSecrets { team } => {
                self.known_team(Some(*team))?;
                QueryPayload::TeamEnrollSecrets(self.faker.enroll_secrets(Some(*team)))
            }
            QueryKey::Software(query) => {
                self.known_team(query.team)?;
                QueryPayload::Software(self.faker.software(query))
            }
            QueryKey::MdmSummary { platform, team } => {
                self.known_team(*team)?;
                QueryPayload::MdmSummary(self.faker.mdm_summary(*team, *platform))
            }
            QueryKey::MacAdmins { team } => {
                self.known_team(*team)?;
                QueryPayload::MacAdmins(self.faker.macadmins(*team))
            }
        };
        Ok(payload)
    }

    fn known_team(&self, team: Option<TeamId>) -> Result<()> {
        let Some(team) = team else {
            return Ok(());
        };
        if self.faker.teams().iter().any(|known| known.id == team) {
            Ok(())
        } else {
            bail!("HTTP 404: team {team} not found")
        }
    }
}

impl Default for FixtureBackend {
    fn default() -> Self {
        Self::new(FleetFaker::new(7))
    }
}

pub fn global_admin(tier: Tier) -> ViewerContext {
    ViewerContext {
        tier,
        global_role: Some(Role::Admin),
        team_roles: Vec::new(),
        sandbox_mode: false,
        org_name: "Fleet Demo".to_owned(),
        org_features: Features {
            enable_software_inventory: true,
        },
    }
}

pub fn team_member(team: TeamId, role: Role) -> ViewerContext {
    ViewerContext {
        tier: Tier::Premium,
        team_roles: vec![TeamRole {
            team_id: team,
            role,
        }],
        org_name: "Fleet Demo".to_owned(),
        ..ViewerContext::default()
    }
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

fn builtin_labels() -> Vec<LabelSummary> {
    [(6, "All Hosts"), (7, "macOS"), (8, "MS Windows"), (9, "All Linux")]
        .into_iter()
        .map(|(id, name)| LabelSummary {
            id: LabelId::new(id),
            name: name.to_owned(),
            label_type: LabelType::Builtin,
        })
        .collect()
}

fn host_platform(platform: &str, hosts_count: u64) -> HostSummaryPlatform {
    HostSummaryPlatform {
        platform: platform.to_owned(),
        hosts_count,
    }
}

fn scope(team: Option<TeamId>) -> u64 {
    team.map_or(0, |team| team.get().unsigned_abs())
}

fn platform_salt(platform: Platform) -> u64 {
    match platform {
        Platform::All => 11,
        Platform::Darwin => 13,
        Platform::Windows => 17,
        Platform::Linux => 19,
    }
}

fn reference_now() -> OffsetDateTime {
    Date::from_calendar_date(2026, Month::February, 19)
        .map(|date| date.with_time(Time::MIDNIGHT).assume_utc())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::{FixtureBackend, FleetFaker, global_admin, team_member};
    use anyhow::Result;
    use fleetdash_app::{
        Platform, QueryKey, QueryPayload, Role, SOFTWARE_ORDER_DIRECTION, SOFTWARE_ORDER_KEY,
        SOFTWARE_PAGE_SIZE, SoftwareQuery, TeamId, Tier,
    };

    fn software_query(page: usize, vulnerable: bool) -> SoftwareQuery {
        SoftwareQuery {
            page,
            per_page: SOFTWARE_PAGE_SIZE,
            order_key: SOFTWARE_ORDER_KEY,
            order_direction: SOFTWARE_ORDER_DIRECTION,
            vulnerable,
            team: None,
        }
    }

    #[test]
    fn same_key_yields_same_payload() -> Result<()> {
        let backend = FixtureBackend::default();
        let key = QueryKey::HostSummary {
            team: Some(TeamId::new(1)),
            platform: Platform::All,
            low_disk_space_gb: Some(32),
        };
        assert_eq!(backend.fetch(&key)?, backend.fetch(&key)?);
        Ok(())
    }

    #[test]
    fn platform_summary_only_counts_that_platform() {
        let faker = FleetFaker::new(3);
        let summary = faker.host_summary(None, Platform::Darwin);
        assert_eq!(summary.platform_count("windows"), 0);
        assert_eq!(summary.all_linux_count, 0);
        assert_eq!(summary.totals_hosts_count, summary.platform_count("darwin"));
    }

    #[test]
    fn linux_count_splits_across_distributions() {
        let faker = FleetFaker::new(5);
        let summary = faker.host_summary(None, Platform::Linux);
        assert_eq!(
            summary.platform_count("ubuntu") + summary.platform_count("rhel"),
            summary.all_linux_count
        );
    }

    #[test]
    fn software_pages_are_sorted_and_bounded() {
        let faker = FleetFaker::new(9);
        let first = faker.software(&software_query(0, false));
        let rows = first.rows();
        assert_eq!(rows.len(), SOFTWARE_PAGE_SIZE);
        assert!(
            rows.windows(2)
                .all(|pair| pair[0].hosts_count >= pair[1].hosts_count)
        );

        let last = faker.software(&software_query(2, false));
        assert!(last.rows().len() < SOFTWARE_PAGE_SIZE);
    }

    #[test]
    fn vulnerable_listing_only_has_vulnerable_rows() {
        let faker = FleetFaker::new(9);
        let listing = faker.software(&software_query(0, true));
        assert!(
            listing
                .rows()
                .iter()
                .all(|row| row.vulnerabilities.is_some())
        );
    }

    #[test]
    fn unknown_team_is_an_error() {
        let backend = FixtureBackend::new(FleetFaker::new(1).with_team_count(2));
        let result = backend.fetch(&QueryKey::MacAdmins {
            team: Some(TeamId::new(4)),
        });
        assert!(result.is_err());
    }

    #[test]
    fn teams_payload_lists_configured_teams() -> Result<()> {
        let backend = FixtureBackend::new(FleetFaker::new(1).with_team_count(4));
        let QueryPayload::Teams(teams) = backend.fetch(&QueryKey::Teams)? else {
            anyhow::bail!("expected teams payload");
        };
        assert_eq!(teams.len(), 4);
        Ok(())
    }

    #[test]
    fn viewer_fixtures_match_their_roles() {
        assert!(global_admin(Tier::Free).can_enroll_global_hosts());
        let observer = team_member(TeamId::new(2), Role::Observer);
        assert!(observer.can_view_team(TeamId::new(2)));
        assert!(!observer.can_enroll_hosts(Some(TeamId::new(2))));
    }
}
