// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Layout policy: a pure mapping from selection, viewer context, view state
//! and source status to the ordered list of cards on screen.

use crate::{
    DashboardError, LOW_DISK_SPACE_GB, LabelId, LastUpdated, MANAGE_HOSTS_PATH,
    MANAGE_SOFTWARE_PATH, MdmEnrollmentBucket, MdmSolution, MunkiIssue, MunkiVersion, Platform,
    QuerySource, Selection, SoftwarePager, SoftwareResponse, SourceStatus, Team, TeamId, ViewState,
    ViewerContext, is_collecting_inventory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CardId {
    HostsSummary,
    MissingHosts,
    LowDiskSpace,
    Welcome,
    LearnFleet,
    Software,
    ActivityFeed,
    OperatingSystems,
    Mdm,
    Munki,
}

impl CardId {
    pub const fn title(self) -> &'static str {
        match self {
            Self::HostsSummary => "Hosts",
            Self::MissingHosts => "Missing hosts",
            Self::LowDiskSpace => "Low disk space hosts",
            Self::Welcome => "Welcome to Fleet",
            Self::LearnFleet => "Learn how to use Fleet",
            Self::Software => "Software",
            Self::ActivityFeed => "Activity",
            Self::OperatingSystems => "Operating systems",
            Self::Mdm => "Mobile device management (MDM)",
            Self::Munki => "Munki",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardAction {
    pub text: &'static str,
    pub path: String,
}

/// Data a card renders, bound from the view state at layout time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardContent {
    HostsSummary {
        team: Option<TeamId>,
        platform: Platform,
        mac_count: u64,
        windows_count: u64,
        linux_count: u64,
        loading: bool,
        show_hosts_ui: bool,
        platform_label: Option<LabelId>,
        error: Option<DashboardError>,
    },
    MissingHosts {
        count: u64,
        loading: bool,
        show_hosts_ui: bool,
        platform_label: Option<LabelId>,
        team: Option<TeamId>,
    },
    LowDiskSpace {
        threshold_gb: u32,
        count: u64,
        loading: bool,
        show_hosts_ui: bool,
        platform_label: Option<LabelId>,
        team: Option<TeamId>,
    },
    Welcome {
        totals_hosts_count: u64,
    },
    LearnFleet,
    ActivityFeed {
        premium: bool,
    },
    Software {
        listing: Option<SoftwareResponse>,
        fetching: bool,
        error: Option<DashboardError>,
        collecting_inventory: bool,
        pager: SoftwarePager,
    },
    OperatingSystems {
        team: Option<TeamId>,
        platform: Platform,
    },
    Mdm {
        fetching: bool,
        error: Option<DashboardError>,
        enrollment: Vec<MdmEnrollmentBucket>,
        solutions: Option<Vec<MdmSolution>>,
        platform_label: Option<LabelId>,
    },
    Munki {
        fetching: bool,
        error: Option<DashboardError>,
        versions: Vec<MunkiVersion>,
        issues: Vec<MunkiIssue>,
    },
}

/// Built fresh on every layout pass; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub title: &'static str,
    pub visible: bool,
    pub show_title: bool,
    pub title_detail: Option<LastUpdated>,
    /// Hosts card only: suppressed while the summary is in flight or failed.
    pub total_host_count: Option<u64>,
    pub action: Option<CardAction>,
    pub content: CardContent,
}

impl Card {
    fn new(id: CardId, content: CardContent) -> Self {
        Self {
            id,
            title: id.title(),
            visible: true,
            show_title: true,
            title_detail: None,
            total_host_count: None,
            action: None,
            content,
        }
    }

    fn visible_when(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

#[derive(Clone, Copy)]
pub struct LayoutInputs<'a> {
    pub selection: &'a Selection,
    pub context: &'a ViewerContext,
    pub view: &'a ViewState,
    pub pager: SoftwarePager,
    pub status: &'a dyn Fn(QuerySource) -> SourceStatus,
}

/// Ordered visible cards: the host section first, then the platform section.
pub fn layout(inputs: &LayoutInputs<'_>) -> Vec<Card> {
    let mut cards = host_section(inputs);
    cards.extend(platform_section(inputs));
    cards.retain(|card| card.visible);
    cards
}

pub fn software_action_path(pager: SoftwarePager) -> String {
    if pager.tab.is_vulnerable() {
        format!("{MANAGE_SOFTWARE_PATH}?vulnerable=true")
    } else {
        MANAGE_SOFTWARE_PATH.to_owned()
    }
}

/// Host listing filtered by the platform's builtin label and team scope.
pub fn manage_hosts_path(team: Option<TeamId>, label: Option<LabelId>) -> String {
    let mut path = match label {
        Some(label) => format!("{MANAGE_HOSTS_PATH}/labels/{label}"),
        None => MANAGE_HOSTS_PATH.to_owned(),
    };
    if let Some(team) = team {
        path.push_str(&format!("?team_id={team}"));
    }
    path
}

fn host_section(inputs: &LayoutInputs<'_>) -> Vec<Card> {
    let hosts = &inputs.view.hosts;
    let status = (inputs.status)(QuerySource::HostSummary);
    let team = inputs.selection.team_id();
    let platform_label = inputs
        .view
        .selected_platform_label_id(inputs.selection.platform);
    let premium = inputs.context.is_premium();

    let mut summary = Card::new(
        CardId::HostsSummary,
        CardContent::HostsSummary {
            team,
            platform: inputs.selection.platform,
            mac_count: hosts.mac_count,
            windows_count: hosts.windows_count,
            linux_count: hosts.linux_count,
            loading: status.fetching,
            show_hosts_ui: hosts.show_hosts_ui,
            platform_label,
            error: status.error.clone(),
        },
    );
    summary.action = Some(CardAction {
        text: "View all hosts",
        path: manage_hosts_path(team, platform_label),
    });
    if !status.fetching && status.error.is_none() {
        summary.total_host_count = hosts.totals_hosts_count;
    }

    let mut missing = Card::new(
        CardId::MissingHosts,
        CardContent::MissingHosts {
            count: hosts.missing_count,
            loading: status.fetching,
            show_hosts_ui: hosts.show_hosts_ui,
            platform_label,
            team,
        },
    )
    .visible_when(premium);
    missing.show_title = false;

    let mut low_disk = Card::new(
        CardId::LowDiskSpace,
        CardContent::LowDiskSpace {
            threshold_gb: LOW_DISK_SPACE_GB,
            count: hosts.low_disk_space_count,
            loading: status.fetching,
            show_hosts_ui: hosts.show_hosts_ui,
            platform_label,
            team,
        },
    )
    .visible_when(premium);
    low_disk.show_title = false;

    vec![summary, missing, low_disk]
}

fn platform_section(inputs: &LayoutInputs<'_>) -> Vec<Card> {
    let mdm_visible = inputs.view.mdm.visible;
    let munki_visible = inputs.view.munki.visible;
    match inputs.selection.platform {
        Platform::All => {
            let team = inputs.selection.team_id();
            let onboarding = team.is_none()
                && inputs.context.can_enroll_global_hosts()
                && inputs
                    .view
                    .hosts
                    .totals_hosts_count
                    .is_some_and(|total| total < 2);
            vec![
                welcome_card(inputs).visible_when(onboarding),
                Card::new(CardId::LearnFleet, CardContent::LearnFleet).visible_when(onboarding),
                software_card(inputs),
                Card::new(
                    CardId::ActivityFeed,
                    CardContent::ActivityFeed {
                        premium: inputs.context.is_premium(),
                    },
                )
                .visible_when(team.is_none() && inputs.context.is_on_global_team()),
                mdm_card(inputs).visible_when(mdm_visible),
            ]
        }
        Platform::Darwin => vec![
            operating_systems_card(inputs),
            mdm_card(inputs).visible_when(mdm_visible),
            munki_card(inputs).visible_when(munki_visible),
        ],
        Platform::Windows => vec![
            operating_systems_card(inputs),
            mdm_card(inputs).visible_when(mdm_visible),
        ],
        Platform::Linux => Vec::new(),
    }
}

fn welcome_card(inputs: &LayoutInputs<'_>) -> Card {
    Card::new(
        CardId::Welcome,
        CardContent::Welcome {
            totals_hosts_count: inputs.view.hosts.totals_hosts_count.unwrap_or(0),
        },
    )
}

fn software_card(inputs: &LayoutInputs<'_>) -> Card {
    let status = (inputs.status)(QuerySource::Software);
    let listing = inputs.view.software.listing.clone();
    let team = inputs.selection.team_id();
    let error = if status.enabled {
        status.error.clone()
    } else {
        Some(DashboardError::ConfigurationMismatch {
            query: QuerySource::Software,
            feature: "software inventory",
        })
    };

    let mut card = Card::new(
        CardId::Software,
        CardContent::Software {
            collecting_inventory: is_collecting_inventory(
                team,
                inputs.pager.page_index,
                listing.as_ref(),
            ),
            listing,
            fetching: status.fetching,
            error,
            pager: inputs.pager,
        },
    );
    card.show_title = !status.fetching;
    card.title_detail = inputs.view.software.title_detail;
    card.action = Some(CardAction {
        text: "View all software",
        path: software_action_path(inputs.pager),
    });
    card
}

fn operating_systems_card(inputs: &LayoutInputs<'_>) -> Card {
    Card::new(
        CardId::OperatingSystems,
        CardContent::OperatingSystems {
            team: inputs.selection.team_id(),
            platform: inputs.selection.platform,
        },
    )
}

fn mdm_card(inputs: &LayoutInputs<'_>) -> Card {
    let status = (inputs.status)(QuerySource::MdmSummary);
    let mdm = &inputs.view.mdm;
    let mut card = Card::new(
        CardId::Mdm,
        CardContent::Mdm {
            fetching: status.fetching,
            error: status.error.clone(),
            enrollment: mdm.enrollment.clone(),
            solutions: mdm.solutions.clone(),
            platform_label: inputs
                .view
                .selected_platform_label_id(inputs.selection.platform),
        },
    );
    card.show_title = !status.fetching;
    card.title_detail = mdm.title_detail;
    card
}

fn munki_card(inputs: &LayoutInputs<'_>) -> Card {
    let status = (inputs.status)(QuerySource::MacAdmins);
    let munki = &inputs.view.munki;
    let mut card = Card::new(
        CardId::Munki,
        CardContent::Munki {
            fetching: status.fetching,
            error: status.error.clone(),
            versions: munki.versions.clone(),
            issues: munki.issues.clone(),
        },
    );
    card.show_title = !status.fetching;
    card.title_detail = munki.title_detail;
    card
}

/// Top-of-page control, chosen by tier and team membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    OrgName(String),
    TeamPicker {
        teams: Vec<Team>,
        selected: Option<TeamId>,
        include_all_teams: bool,
    },
    TeamName(String),
    Empty,
}

pub fn header(context: &ViewerContext, selection: &Selection, teams: &[Team]) -> Header {
    if !context.is_premium() {
        return Header::OrgName(context.org_name.clone());
    }
    if teams.len() > 1 || context.is_on_global_team() {
        return Header::TeamPicker {
            teams: teams.to_vec(),
            selected: selection.team_id(),
            include_all_teams: context.is_on_global_team(),
        };
    }
    match teams.first() {
        Some(team) => Header::TeamName(team.name.clone()),
        None => Header::Empty,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddHostsModal {
    pub team: Option<Team>,
    pub enroll_secret: Option<String>,
    pub loading: bool,
    pub sandbox_mode: bool,
}

/// Sandbox deployments always enroll with the global secret.
pub fn add_hosts_modal(
    context: &ViewerContext,
    selection: &Selection,
    view: &ViewState,
    status: &dyn Fn(QuerySource) -> SourceStatus,
) -> AddHostsModal {
    let (secrets, secrets_source) = match (&selection.team, context.sandbox_mode) {
        (Some(_), false) => (view.team_secrets.as_deref(), QuerySource::TeamEnrollSecrets),
        _ => (view.global_secrets.as_deref(), QuerySource::GlobalEnrollSecrets),
    };
    AddHostsModal {
        team: selection.team.clone(),
        enroll_secret: secrets
            .and_then(|secrets| secrets.first())
            .map(|secret| secret.secret.clone()),
        loading: status(QuerySource::Teams).fetching
            || status(QuerySource::GlobalEnrollSecrets).fetching
            || status(secrets_source).fetching,
        sandbox_mode: context.sandbox_mode,
    }
}
