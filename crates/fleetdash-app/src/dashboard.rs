// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! One dashboard session: wires the selection controller, the query resolver,
//! the view-state reducer and the layout policy together. The session does no
//! I/O; callers run the fetches it asks for and hand back [`Completion`]s.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::{
    AddHostsModal, Card, Completion, Header, LayoutInputs, QueryInputs, QueryKey, QueryPayload,
    QueryResolver, QuerySource, SOFTWARE_PAGE_SIZE, Selection, SelectionCommand,
    SelectionController, SelectionEvent, SoftwarePager, SourceStatus, ViewState, ViewerContext,
    add_hosts_modal, header, layout, registry,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardCommand {
    Selection(SelectionCommand),
    NextSoftwarePage,
    PrevSoftwarePage,
    ToggleSoftwareTab,
    ToggleAddHosts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    Selection(SelectionEvent),
    SoftwarePagerChanged(SoftwarePager),
    AddHostsToggled(bool),
}

/// What the caller must do next: surface `events` and start `fetches`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Effects {
    pub events: Vec<DashboardEvent>,
    pub fetches: Vec<QueryKey>,
}

impl Effects {
    fn extend(&mut self, other: Effects) {
        self.events.extend(other.events);
        self.fetches.extend(other.fetches);
    }
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    context: Arc<ViewerContext>,
    selection: SelectionController,
    pager: SoftwarePager,
    resolver: QueryResolver,
    view: ViewState,
    add_hosts_open: bool,
}

impl Dashboard {
    /// Nothing is fetched until the first [`Dashboard::sync`].
    pub fn mount(context: Arc<ViewerContext>, path: &str) -> Self {
        Self {
            selection: SelectionController::mount(Arc::clone(&context), path),
            context,
            pager: SoftwarePager::default(),
            resolver: QueryResolver::default(),
            view: ViewState::default(),
            add_hosts_open: false,
        }
    }

    pub fn context(&self) -> &ViewerContext {
        &self.context
    }

    pub fn selection(&self) -> &Selection {
        self.selection.selection()
    }

    pub fn pager(&self) -> SoftwarePager {
        self.pager
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn is_add_hosts_open(&self) -> bool {
        self.add_hosts_open
    }

    pub fn dispatch(&mut self, command: DashboardCommand, now: Instant) -> Effects {
        let mut effects = Effects::default();
        match command {
            DashboardCommand::Selection(command) => {
                let events = self.selection.dispatch(command, self.view.teams());
                effects.events.extend(self.absorb(events));
            }
            DashboardCommand::NextSoftwarePage => {
                let full_page = self
                    .view
                    .software
                    .listing
                    .as_ref()
                    .is_some_and(|listing| listing.rows().len() >= SOFTWARE_PAGE_SIZE);
                if full_page {
                    self.pager.page_index += 1;
                    effects
                        .events
                        .push(DashboardEvent::SoftwarePagerChanged(self.pager));
                }
            }
            DashboardCommand::PrevSoftwarePage => {
                if self.pager.page_index > 0 {
                    self.pager.page_index -= 1;
                    effects
                        .events
                        .push(DashboardEvent::SoftwarePagerChanged(self.pager));
                }
            }
            DashboardCommand::ToggleSoftwareTab => {
                self.pager = SoftwarePager {
                    page_index: 0,
                    tab: self.pager.tab.toggled(),
                };
                effects
                    .events
                    .push(DashboardEvent::SoftwarePagerChanged(self.pager));
            }
            DashboardCommand::ToggleAddHosts => {
                let allowed = self
                    .context
                    .can_enroll_hosts(self.selection.selection().team_id());
                if self.add_hosts_open || allowed {
                    self.add_hosts_open = !self.add_hosts_open;
                    effects
                        .events
                        .push(DashboardEvent::AddHostsToggled(self.add_hosts_open));
                }
            }
        }
        effects.extend(self.sync(now));
        effects
    }

    /// Re-evaluates every source against the current selection. Cached
    /// payloads for keys seen before are folded immediately.
    pub fn sync(&mut self, now: Instant) -> Effects {
        let mut effects = Effects::default();
        loop {
            let inputs = QueryInputs {
                selection: self.selection.selection(),
                context: &self.context,
                software: self.pager,
            };
            let resolution = self.resolver.resolve(registry(&inputs), now);
            effects.fetches.extend(resolution.fetches);
            for source in resolution.reset {
                self.view.reset(source);
            }

            let before = self.selection.selection().clone();
            for payload in &resolution.cached {
                effects.events.extend(self.fold(payload));
            }
            // A cached teams payload can move the selection; settle again.
            if *self.selection.selection() == before {
                return effects;
            }
        }
    }

    /// Folds a finished fetch. Superseded completions only warm the cache.
    /// A fold that moves the selection, or refreshes the selected team's
    /// features, re-evaluates every source.
    pub fn complete(&mut self, completion: Completion, now: Instant) -> Effects {
        let Some(payload) = self.resolver.complete(completion, now) else {
            return Effects::default();
        };
        let before = self.selection.selection().clone();
        let events = self.fold(&payload);
        let mut effects = Effects {
            events,
            fetches: Vec::new(),
        };
        if !effects.events.is_empty() || *self.selection.selection() != before {
            effects.extend(self.sync(now));
        }
        effects
    }

    pub fn refresh(&mut self, now: Instant) -> Effects {
        Effects {
            events: Vec::new(),
            fetches: self.resolver.refresh(now),
        }
    }

    pub fn status(&self, source: QuerySource) -> SourceStatus {
        self.resolver.status(source)
    }

    pub fn cards(&self) -> Vec<Card> {
        let status = |source| self.resolver.status(source);
        layout(&LayoutInputs {
            selection: self.selection.selection(),
            context: &self.context,
            view: &self.view,
            pager: self.pager,
            status: &status,
        })
    }

    pub fn header(&self) -> Header {
        header(&self.context, self.selection.selection(), self.view.teams())
    }

    pub fn add_hosts_modal(&self) -> Option<AddHostsModal> {
        if !self.add_hosts_open {
            return None;
        }
        let status = |source| self.resolver.status(source);
        Some(add_hosts_modal(
            &self.context,
            self.selection.selection(),
            &self.view,
            &status,
        ))
    }

    fn fold(&mut self, payload: &QueryPayload) -> Vec<DashboardEvent> {
        self.view.apply(payload, self.context.tier);
        match payload {
            QueryPayload::Teams(_) => {
                let events = self.selection.teams_loaded(self.view.teams());
                self.absorb(events)
            }
            _ => Vec::new(),
        }
    }

    /// Team changes restart software paging from the first page.
    fn absorb(&mut self, events: Vec<SelectionEvent>) -> Vec<DashboardEvent> {
        let team_changed = events
            .iter()
            .any(|event| matches!(event, SelectionEvent::TeamChanged(_)));
        if team_changed && self.pager.page_index != 0 {
            debug!(page = self.pager.page_index, "resetting software page");
            self.pager.page_index = 0;
        }
        events.into_iter().map(DashboardEvent::Selection).collect()
    }
}
