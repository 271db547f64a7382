// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Features, Role, TeamId, Tier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamRole {
    pub team_id: TeamId,
    pub role: Role,
}

/// Pre-computed authorization and tier facts for the signed-in operator.
/// Built once at startup and never mutated by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerContext {
    pub tier: Tier,
    pub global_role: Option<Role>,
    pub team_roles: Vec<TeamRole>,
    pub sandbox_mode: bool,
    pub org_name: String,
    pub org_features: Features,
}

impl Default for ViewerContext {
    fn default() -> Self {
        Self {
            tier: Tier::Free,
            global_role: None,
            team_roles: Vec::new(),
            sandbox_mode: false,
            org_name: String::new(),
            org_features: Features::default(),
        }
    }
}

impl ViewerContext {
    pub fn is_premium(&self) -> bool {
        self.tier == Tier::Premium
    }

    pub fn is_on_global_team(&self) -> bool {
        self.global_role.is_some()
    }

    pub fn role_on_team(&self, team: TeamId) -> Option<Role> {
        self.team_roles
            .iter()
            .find(|entry| entry.team_id == team)
            .map(|entry| entry.role)
    }

    pub fn belongs_to_team(&self, team: TeamId) -> bool {
        self.role_on_team(team).is_some()
    }

    pub fn can_view_team(&self, team: TeamId) -> bool {
        self.is_on_global_team() || self.belongs_to_team(team)
    }

    pub fn can_enroll_global_hosts(&self) -> bool {
        self.global_role.is_some_and(Role::can_enroll_hosts)
    }

    /// Team roles only count for the team currently in scope.
    pub fn can_enroll_hosts(&self, team: Option<TeamId>) -> bool {
        self.can_enroll_global_hosts()
            || team
                .and_then(|id| self.role_on_team(id))
                .is_some_and(Role::can_enroll_hosts)
    }
}
