// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{DashboardError, LookupTarget, Platform, Team, TeamId, ViewerContext};

/// The operator-driven inputs every query and card depends on. `team == None`
/// is the "All teams" (global) scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub platform: Platform,
    pub team: Option<Team>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            platform: Platform::All,
            team: None,
        }
    }
}

impl Selection {
    pub fn team_id(&self) -> Option<TeamId> {
        self.team.as_ref().map(|team| team.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCommand {
    SelectPlatform(Platform),
    NextPlatform,
    PrevPlatform,
    /// `None` selects the global scope.
    SelectTeam(Option<TeamId>),
    NextTeam,
    /// Route changed underneath the dashboard.
    SyncPath(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamRejection {
    NotLoaded(TeamId),
    NotPermitted(TeamId),
    GlobalScopeNotPermitted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    PlatformChanged(Platform),
    TeamChanged(Option<TeamId>),
    Navigate(String),
    TeamRejected(TeamRejection),
}

/// Sole owner and mutator of [`Selection`].
#[derive(Debug, Clone)]
pub struct SelectionController {
    context: Arc<ViewerContext>,
    selection: Selection,
}

impl SelectionController {
    /// Platform comes from the current route; unmatched routes mean `all`.
    pub fn mount(context: Arc<ViewerContext>, path: &str) -> Self {
        Self {
            context,
            selection: Selection {
                platform: Platform::from_path(path),
                team: None,
            },
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn dispatch(&mut self, command: SelectionCommand, teams: &[Team]) -> Vec<SelectionEvent> {
        match command {
            SelectionCommand::SelectPlatform(platform) => self.select_platform(platform),
            SelectionCommand::NextPlatform => self.rotate_platform(1),
            SelectionCommand::PrevPlatform => self.rotate_platform(-1),
            SelectionCommand::SelectTeam(team) => self.select_team(team, teams),
            SelectionCommand::NextTeam => self.rotate_team(teams),
            SelectionCommand::SyncPath(path) => {
                let platform = Platform::from_path(&path);
                if platform == self.selection.platform {
                    return Vec::new();
                }
                self.selection.platform = platform;
                vec![SelectionEvent::PlatformChanged(platform)]
            }
        }
    }

    /// Reconciles the selection with a freshly loaded teams list. A selected
    /// team that vanished degrades to the global scope, or to the first
    /// visible team for an operator who has no global role. The selected team
    /// is replaced by its fresh copy so feature flags stay current.
    pub fn teams_loaded(&mut self, teams: &[Team]) -> Vec<SelectionEvent> {
        if let Some(current) = self.selection.team.as_ref() {
            let current_id = current.id;
            if let Some(fresh) = teams.iter().find(|team| team.id == current_id) {
                self.selection.team = Some(fresh.clone());
                return Vec::new();
            }
            let error = DashboardError::Lookup(LookupTarget::Team(current_id));
            warn!(%error, "selected team disappeared");
            self.selection.team = None;
            if self.context.is_on_global_team() {
                return vec![SelectionEvent::TeamChanged(None)];
            }
            let first = self.first_visible_team(teams);
            return vec![SelectionEvent::TeamChanged(first)];
        }

        if self.context.is_on_global_team() {
            return Vec::new();
        }

        match self.first_visible_team(teams) {
            Some(first) => vec![SelectionEvent::TeamChanged(Some(first))],
            None => Vec::new(),
        }
    }

    fn first_visible_team(&mut self, teams: &[Team]) -> Option<TeamId> {
        let first = teams
            .iter()
            .find(|team| self.context.can_view_team(team.id))?;
        self.selection.team = Some(first.clone());
        Some(first.id)
    }

    fn select_platform(&mut self, platform: Platform) -> Vec<SelectionEvent> {
        if platform == self.selection.platform {
            return Vec::new();
        }
        self.selection.platform = platform;
        vec![
            SelectionEvent::PlatformChanged(platform),
            SelectionEvent::Navigate(platform.path().to_owned()),
        ]
    }

    fn rotate_platform(&mut self, delta: isize) -> Vec<SelectionEvent> {
        let platforms = Platform::ALL;
        let current = platforms
            .iter()
            .position(|platform| *platform == self.selection.platform)
            .unwrap_or(0) as isize;
        let len = platforms.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.select_platform(platforms[next])
    }

    fn select_team(&mut self, team: Option<TeamId>, teams: &[Team]) -> Vec<SelectionEvent> {
        let Some(team_id) = team else {
            if !self.context.is_on_global_team() {
                return vec![SelectionEvent::TeamRejected(
                    TeamRejection::GlobalScopeNotPermitted,
                )];
            }
            if self.selection.team.is_none() {
                return Vec::new();
            }
            self.selection.team = None;
            return vec![SelectionEvent::TeamChanged(None)];
        };

        if !self.context.can_view_team(team_id) {
            debug!(team = %team_id, "team selection rejected: no role on team");
            return vec![SelectionEvent::TeamRejected(TeamRejection::NotPermitted(
                team_id,
            ))];
        }

        let Some(found) = teams.iter().find(|candidate| candidate.id == team_id) else {
            let error = DashboardError::Lookup(LookupTarget::Team(team_id));
            debug!(%error, "team selection ignored");
            return vec![SelectionEvent::TeamRejected(TeamRejection::NotLoaded(
                team_id,
            ))];
        };

        if self.selection.team_id() == Some(team_id) {
            return Vec::new();
        }
        self.selection.team = Some(found.clone());
        vec![SelectionEvent::TeamChanged(Some(team_id))]
    }

    fn rotate_team(&mut self, teams: &[Team]) -> Vec<SelectionEvent> {
        let mut options: Vec<Option<TeamId>> = Vec::new();
        if self.context.is_on_global_team() {
            options.push(None);
        }
        options.extend(
            teams
                .iter()
                .filter(|team| self.context.can_view_team(team.id))
                .map(|team| Some(team.id)),
        );
        if options.is_empty() {
            return Vec::new();
        }

        let current = options
            .iter()
            .position(|option| *option == self.selection.team_id())
            .map_or(0, |index| (index + 1) % options.len());
        self.select_team(options[current], teams)
    }
}

#[cfg(test)]
mod tests {
    use super::{Selection, SelectionCommand, SelectionController, SelectionEvent, TeamRejection};
    use crate::{Features, Platform, Role, Team, TeamId, TeamRole, ViewerContext};
    use std::sync::Arc;

    fn team(id: i64, name: &str) -> Team {
        Team {
            id: TeamId::new(id),
            name: name.to_owned(),
            features: Features::default(),
        }
    }

    fn global_admin() -> Arc<ViewerContext> {
        Arc::new(ViewerContext {
            global_role: Some(Role::Admin),
            ..ViewerContext::default()
        })
    }

    fn team_member(team: i64) -> Arc<ViewerContext> {
        Arc::new(ViewerContext {
            team_roles: vec![TeamRole {
                team_id: TeamId::new(team),
                role: Role::Observer,
            }],
            ..ViewerContext::default()
        })
    }

    #[test]
    fn mount_derives_platform_from_path() {
        let controller = SelectionController::mount(global_admin(), "/dashboard/windows");
        assert_eq!(controller.selection().platform, Platform::Windows);

        let fallback = SelectionController::mount(global_admin(), "/somewhere/else");
        assert_eq!(fallback.selection(), &Selection::default());
    }

    #[test]
    fn select_platform_navigates_to_canonical_path() {
        let mut controller = SelectionController::mount(global_admin(), "/dashboard");
        let events = controller.dispatch(SelectionCommand::SelectPlatform(Platform::Darwin), &[]);
        assert_eq!(
            events,
            vec![
                SelectionEvent::PlatformChanged(Platform::Darwin),
                SelectionEvent::Navigate("/dashboard/mac".to_owned()),
            ]
        );

        let repeat = controller.dispatch(SelectionCommand::SelectPlatform(Platform::Darwin), &[]);
        assert!(repeat.is_empty());
    }

    #[test]
    fn sync_path_does_not_navigate_again() {
        let mut controller = SelectionController::mount(global_admin(), "/dashboard");
        let events = controller.dispatch(
            SelectionCommand::SyncPath("/dashboard/linux".to_owned()),
            &[],
        );
        assert_eq!(events, vec![SelectionEvent::PlatformChanged(Platform::Linux)]);
    }

    #[test]
    fn platform_rotation_wraps() {
        let mut controller = SelectionController::mount(global_admin(), "/dashboard/linux");
        controller.dispatch(SelectionCommand::NextPlatform, &[]);
        assert_eq!(controller.selection().platform, Platform::All);

        controller.dispatch(SelectionCommand::PrevPlatform, &[]);
        assert_eq!(controller.selection().platform, Platform::Linux);
    }

    #[test]
    fn selecting_unloaded_team_is_a_no_op() {
        let mut controller = SelectionController::mount(global_admin(), "/dashboard");
        let teams = vec![team(1, "Servers"), team(2, "Laptops")];
        controller.dispatch(SelectionCommand::SelectTeam(Some(TeamId::new(2))), &teams);
        let before = controller.selection().clone();

        let events =
            controller.dispatch(SelectionCommand::SelectTeam(Some(TeamId::new(42))), &teams);
        assert_eq!(
            events,
            vec![SelectionEvent::TeamRejected(TeamRejection::NotLoaded(
                TeamId::new(42)
            ))]
        );
        assert_eq!(controller.selection(), &before);
    }

    #[test]
    fn selecting_foreign_team_is_rejected() {
        let mut controller = SelectionController::mount(team_member(1), "/dashboard");
        let teams = vec![team(1, "Servers"), team(2, "Laptops")];

        let events =
            controller.dispatch(SelectionCommand::SelectTeam(Some(TeamId::new(2))), &teams);
        assert_eq!(
            events,
            vec![SelectionEvent::TeamRejected(TeamRejection::NotPermitted(
                TeamId::new(2)
            ))]
        );
        assert_eq!(controller.selection().team_id(), None);
    }

    #[test]
    fn non_global_operator_cannot_pick_all_teams() {
        let mut controller = SelectionController::mount(team_member(1), "/dashboard");
        let teams = vec![team(1, "Servers")];
        controller.teams_loaded(&teams);

        let events = controller.dispatch(SelectionCommand::SelectTeam(None), &teams);
        assert_eq!(
            events,
            vec![SelectionEvent::TeamRejected(
                TeamRejection::GlobalScopeNotPermitted
            )]
        );
        assert_eq!(controller.selection().team_id(), Some(TeamId::new(1)));
    }

    #[test]
    fn teams_loaded_auto_selects_first_team_for_non_global_operator() {
        let mut controller = SelectionController::mount(team_member(5), "/dashboard");
        let events = controller.teams_loaded(&[team(5, "Kiosks")]);
        assert_eq!(events, vec![SelectionEvent::TeamChanged(Some(TeamId::new(5)))]);
    }

    #[test]
    fn teams_loaded_keeps_global_operator_in_global_scope() {
        let mut controller = SelectionController::mount(global_admin(), "/dashboard");
        assert!(controller.teams_loaded(&[team(5, "Kiosks")]).is_empty());
        assert_eq!(controller.selection().team_id(), None);
    }

    #[test]
    fn stale_selected_team_degrades_to_global_scope() {
        let mut controller = SelectionController::mount(global_admin(), "/dashboard");
        let teams = vec![team(7, "Edge")];
        controller.dispatch(SelectionCommand::SelectTeam(Some(TeamId::new(7))), &teams);

        let events = controller.teams_loaded(&[team(8, "Core")]);
        assert_eq!(events, vec![SelectionEvent::TeamChanged(None)]);
        assert_eq!(controller.selection().team, None);
    }

    #[test]
    fn vanished_team_moves_team_member_onto_remaining_team() {
        let context = Arc::new(ViewerContext {
            team_roles: vec![
                TeamRole {
                    team_id: TeamId::new(5),
                    role: Role::Observer,
                },
                TeamRole {
                    team_id: TeamId::new(7),
                    role: Role::Maintainer,
                },
            ],
            ..ViewerContext::default()
        });
        let mut controller = SelectionController::mount(context, "/dashboard");
        controller.teams_loaded(&[team(5, "Kiosks"), team(7, "Edge")]);
        assert_eq!(controller.selection().team_id(), Some(TeamId::new(5)));

        let events = controller.teams_loaded(&[team(7, "Edge")]);
        assert_eq!(events, vec![SelectionEvent::TeamChanged(Some(TeamId::new(7)))]);
        assert_eq!(controller.selection().team_id(), Some(TeamId::new(7)));
    }

    #[test]
    fn teams_reload_refreshes_selected_team_features() {
        let mut controller = SelectionController::mount(global_admin(), "/dashboard");
        let teams = vec![team(7, "Edge")];
        controller.dispatch(SelectionCommand::SelectTeam(Some(TeamId::new(7))), &teams);

        let mut flipped = team(7, "Edge");
        flipped.features.enable_software_inventory = true;
        assert!(controller.teams_loaded(&[flipped.clone()]).is_empty());
        assert_eq!(controller.selection().team, Some(flipped));
    }

    #[test]
    fn team_rotation_cycles_through_all_teams_then_teams() {
        let mut controller = SelectionController::mount(global_admin(), "/dashboard");
        let teams = vec![team(1, "A"), team(2, "B")];

        controller.dispatch(SelectionCommand::NextTeam, &teams);
        assert_eq!(controller.selection().team_id(), Some(TeamId::new(1)));
        controller.dispatch(SelectionCommand::NextTeam, &teams);
        assert_eq!(controller.selection().team_id(), Some(TeamId::new(2)));
        controller.dispatch(SelectionCommand::NextTeam, &teams);
        assert_eq!(controller.selection().team_id(), None);
    }
}
