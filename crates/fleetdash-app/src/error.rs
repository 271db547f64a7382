// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::{Platform, QuerySource, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupTarget {
    Team(TeamId),
    PlatformLabel(Platform),
}

/// Errors scoped to a single dashboard source. None of them are fatal to the
/// page; each surfaces only in the card that owns the source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    #[error("{} request failed: {message}", .query.label())]
    Fetch { query: QuerySource, message: String },
    #[error("{}", describe_lookup(.0))]
    Lookup(LookupTarget),
    #[error("{feature} is disabled for this scope; {} is not fetched", .query.label())]
    ConfigurationMismatch {
        query: QuerySource,
        feature: &'static str,
    },
}

impl DashboardError {
    pub fn fetch(query: QuerySource, message: impl Into<String>) -> Self {
        Self::Fetch {
            query,
            message: message.into(),
        }
    }
}

fn describe_lookup(target: &LookupTarget) -> String {
    match *target {
        LookupTarget::Team(id) => format!("team {id} is not among the loaded teams"),
        LookupTarget::PlatformLabel(platform) => {
            format!("no builtin label found for platform {}", platform.as_str())
        }
    }
}
