// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use fleetdash_app::{
    AddHostsModal, Card, CardContent, Completion, Dashboard, DashboardCommand, DashboardError,
    DashboardEvent, Effects, Header, LastUpdated, MdmEnrollmentBucket, MunkiIssueKind, Platform,
    QueryKey, QueryPayload, SelectionCommand, SelectionEvent, SoftwarePager, SoftwareResponse,
    TeamRejection,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{info, warn};

const SOFTWARE_NAME_WIDTH: usize = 28;

/// Data access seam for the terminal loop. `fetch` runs one remote
/// operation; `spawn_fetch` must eventually send exactly one
/// [`InternalEvent::Fetched`] for the key.
pub trait DashboardRuntime {
    fn fetch(&mut self, key: &QueryKey) -> Result<QueryPayload>;
    fn spawn_fetch(&mut self, key: QueryKey, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .fetch(&key)
            .map_err(|error| DashboardError::fetch(key.source(), format!("{error:#}")));
        tx.send(InternalEvent::Fetched(Completion { key, result }))
            .map_err(|_| anyhow!("fetch event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    Fetched(Completion),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    current_path: String,
    status_line: Option<String>,
    status_token: u64,
    help_visible: bool,
}

pub fn run_app<R: DashboardRuntime>(dashboard: &mut Dashboard, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();
    start_dashboard(dashboard, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(
            dashboard,
            runtime,
            &mut view_data,
            &internal_tx,
            &internal_rx,
        );

        if let Err(error) = terminal.draw(|frame| render(frame, &*dashboard, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(dashboard, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn start_dashboard<R: DashboardRuntime>(
    dashboard: &mut Dashboard,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    view_data.current_path = dashboard.selection().platform.path().to_owned();
    let effects = dashboard.sync(Instant::now());
    info!(fetches = effects.fetches.len(), "dashboard mounted");
    apply_effects(dashboard, runtime, view_data, tx, effects);
}

fn process_internal_events<R: DashboardRuntime>(
    dashboard: &mut Dashboard,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.status_line = None;
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Fetched(completion) => {
                let effects = dashboard.complete(completion, Instant::now());
                apply_effects(dashboard, runtime, view_data, tx, effects);
            }
        }
    }
}

fn apply_effects<R: DashboardRuntime>(
    dashboard: &Dashboard,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    effects: Effects,
) {
    for event in effects.events {
        handle_dashboard_event(dashboard, view_data, tx, event);
    }
    for key in effects.fetches {
        let source = key.source();
        if let Err(error) = runtime.spawn_fetch(key, tx.clone()) {
            warn!(source = source.label(), %error, "could not start fetch");
            emit_status(view_data, tx, format!("{} fetch not started: {error}", source.label()));
        }
    }
}

fn handle_dashboard_event(
    dashboard: &Dashboard,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: DashboardEvent,
) {
    match event {
        DashboardEvent::Selection(SelectionEvent::Navigate(path)) => {
            view_data.current_path = path;
        }
        DashboardEvent::Selection(SelectionEvent::PlatformChanged(platform)) => {
            view_data.current_path = platform.path().to_owned();
            emit_status(view_data, tx, format!("platform: {}", platform.label()));
        }
        DashboardEvent::Selection(SelectionEvent::TeamChanged(_)) => {
            let name = selected_team_name(dashboard);
            emit_status(view_data, tx, format!("team: {name}"));
        }
        DashboardEvent::Selection(SelectionEvent::TeamRejected(rejection)) => {
            let message = match rejection {
                TeamRejection::NotLoaded(team) => format!("team {team} is not loaded"),
                TeamRejection::NotPermitted(team) => format!("no access to team {team}"),
                TeamRejection::GlobalScopeNotPermitted => "all teams requires a global role".to_owned(),
            };
            emit_status(view_data, tx, message);
        }
        DashboardEvent::SoftwarePagerChanged(pager) => {
            emit_status(view_data, tx, software_pager_label(pager));
        }
        DashboardEvent::AddHostsToggled(_) => {}
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status_line = Some(message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: DashboardRuntime>(
    dashboard: &mut Dashboard,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    if dashboard.is_add_hosts_open() && matches!(key.code, KeyCode::Esc | KeyCode::Char('a')) {
        dispatch(
            dashboard,
            runtime,
            view_data,
            internal_tx,
            DashboardCommand::ToggleAddHosts,
        );
        return false;
    }

    let command = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char('?') => {
            view_data.help_visible = true;
            return false;
        }
        KeyCode::Char('r') => {
            let effects = dashboard.refresh(Instant::now());
            let count = effects.fetches.len();
            apply_effects(dashboard, runtime, view_data, internal_tx, effects);
            emit_status(view_data, internal_tx, format!("refreshing {count} source(s)"));
            return false;
        }
        KeyCode::Char('p') | KeyCode::Right => {
            DashboardCommand::Selection(SelectionCommand::NextPlatform)
        }
        KeyCode::Char('P') | KeyCode::Left => {
            DashboardCommand::Selection(SelectionCommand::PrevPlatform)
        }
        KeyCode::Char(digit @ '1'..='4') => {
            let index = digit as usize - '1' as usize;
            DashboardCommand::Selection(SelectionCommand::SelectPlatform(Platform::ALL[index]))
        }
        KeyCode::Char('t') => DashboardCommand::Selection(SelectionCommand::NextTeam),
        KeyCode::Char(']') => DashboardCommand::NextSoftwarePage,
        KeyCode::Char('[') => DashboardCommand::PrevSoftwarePage,
        KeyCode::Char('v') => DashboardCommand::ToggleSoftwareTab,
        KeyCode::Char('a') => {
            if !dashboard
                .context()
                .can_enroll_hosts(dashboard.selection().team_id())
            {
                emit_status(view_data, internal_tx, "adding hosts requires admin or maintainer");
                return false;
            }
            DashboardCommand::ToggleAddHosts
        }
        _ => return false,
    };

    dispatch(dashboard, runtime, view_data, internal_tx, command);
    false
}

fn dispatch<R: DashboardRuntime>(
    dashboard: &mut Dashboard,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: DashboardCommand,
) {
    let effects = dashboard.dispatch(command, Instant::now());
    apply_effects(dashboard, runtime, view_data, internal_tx, effects);
}

fn render(frame: &mut ratatui::Frame<'_>, dashboard: &Dashboard, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let selected = Platform::ALL
        .iter()
        .position(|platform| *platform == dashboard.selection().platform)
        .unwrap_or(0);
    let titles = Platform::ALL
        .iter()
        .map(|platform| platform.label().to_owned())
        .collect::<Vec<String>>();
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .title(render_header_text(&dashboard.header(), dashboard))
                .borders(Borders::ALL),
        )
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, layout[0]);

    render_cards(frame, layout[1], &dashboard.cards());

    let status = Paragraph::new(status_text(dashboard, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if let Some(modal) = dashboard.add_hosts_modal() {
        let area = centered_rect(60, 40, frame.area());
        frame.render_widget(Clear, area);
        let body = Paragraph::new(render_add_hosts_text(&modal))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title("Add hosts")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Cyan)),
            );
        frame.render_widget(body, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 50, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

/// Lays cards out in two columns, each column stacked top to bottom in card
/// order.
fn render_cards(frame: &mut ratatui::Frame<'_>, area: Rect, cards: &[Card]) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let now = OffsetDateTime::now_utc();

    for (column, area) in columns.iter().enumerate() {
        let column_cards: Vec<&Card> = cards
            .iter()
            .enumerate()
            .filter(|(index, _)| index % 2 == column)
            .map(|(_, card)| card)
            .collect();
        if column_cards.is_empty() {
            continue;
        }
        let bodies: Vec<String> = column_cards
            .iter()
            .map(|card| render_card_text(card, now))
            .collect();
        let constraints: Vec<Constraint> = bodies
            .iter()
            .map(|body| Constraint::Length(body.lines().count() as u16 + 2))
            .collect();
        let slots = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(*area);

        for ((card, body), slot) in column_cards.iter().zip(bodies).zip(slots.iter()) {
            let widget = Paragraph::new(body)
                .wrap(Wrap { trim: false })
                .block(
                    Block::default()
                        .title(card_title(card, now))
                        .borders(Borders::ALL),
                );
            frame.render_widget(widget, *slot);
        }
    }
}

fn card_title(card: &Card, now: OffsetDateTime) -> String {
    if !card.show_title {
        return String::new();
    }
    let mut title = match card.total_host_count {
        Some(total) => format!("{} ({total})", card.title),
        None => card.title.to_owned(),
    };
    if let Some(detail) = &card.title_detail {
        title.push_str(" · ");
        title.push_str(&format_last_updated(detail, now));
    }
    title
}

fn render_header_text(header: &Header, dashboard: &Dashboard) -> String {
    match header {
        Header::OrgName(name) if name.is_empty() => "Fleet".to_owned(),
        Header::OrgName(name) | Header::TeamName(name) => name.clone(),
        Header::TeamPicker { .. } => {
            format!("Team: {} (t to switch)", selected_team_name(dashboard))
        }
        Header::Empty => String::new(),
    }
}

fn selected_team_name(dashboard: &Dashboard) -> String {
    dashboard
        .selection()
        .team
        .as_ref()
        .map_or_else(|| "All teams".to_owned(), |team| team.name.clone())
}

fn render_card_text(card: &Card, now: OffsetDateTime) -> String {
    let mut lines = match &card.content {
        CardContent::HostsSummary {
            mac_count,
            windows_count,
            linux_count,
            loading,
            error,
            platform,
            ..
        } => {
            if let Some(error) = error {
                vec![format!("error: {error}")]
            } else if *loading {
                vec!["loading...".to_owned()]
            } else {
                let counts = [
                    (Platform::Darwin, *mac_count),
                    (Platform::Windows, *windows_count),
                    (Platform::Linux, *linux_count),
                ];
                counts
                    .into_iter()
                    .filter(|(candidate, _)| *platform == Platform::All || candidate == platform)
                    .map(|(candidate, count)| {
                        format!("{:<8} {}", candidate.label(), format_count(count, "host"))
                    })
                    .collect()
            }
        }
        CardContent::MissingHosts { count, loading, .. } => vec![if *loading {
            "loading...".to_owned()
        } else {
            format!("{} offline for 30+ days", format_count(*count, "host"))
        }],
        CardContent::LowDiskSpace {
            threshold_gb,
            count,
            loading,
            ..
        } => vec![if *loading {
            "loading...".to_owned()
        } else {
            format!(
                "{} with {threshold_gb} GB or less of disk space",
                format_count(*count, "host")
            )
        }],
        CardContent::Welcome { totals_hosts_count } => vec![
            format!(
                "Fleet is tracking {}.",
                format_count(*totals_hosts_count, "host")
            ),
            "Press a to enroll your first hosts.".to_owned(),
        ],
        CardContent::LearnFleet => vec![
            "Queries, policies and software inventory at a glance.".to_owned(),
            "https://fleetdm.com/docs/using-fleet/learn-how-to-use-fleet".to_owned(),
        ],
        CardContent::ActivityFeed { premium } => {
            let mut lines = vec!["Recent activity across all teams.".to_owned()];
            if *premium {
                lines.push("Includes team changes.".to_owned());
            }
            lines
        }
        CardContent::Software {
            listing,
            fetching,
            error,
            collecting_inventory,
            pager,
        } => render_software_lines(
            listing.as_ref(),
            *fetching,
            error.as_ref(),
            *collecting_inventory,
            *pager,
        ),
        CardContent::OperatingSystems { platform, .. } => {
            vec![format!("{} versions reported by hosts.", platform.label())]
        }
        CardContent::Mdm {
            fetching,
            error,
            enrollment,
            solutions,
            ..
        } => {
            if let Some(error) = error {
                vec![format!("error: {error}")]
            } else if *fetching && enrollment.is_empty() {
                vec!["loading...".to_owned()]
            } else {
                let mut lines = render_enrollment_lines(enrollment);
                for solution in solutions.iter().flatten() {
                    lines.push(format!(
                        "{} ({}) {}",
                        solution.name.as_deref().unwrap_or("Unknown"),
                        solution.server_url,
                        format_count(solution.hosts_count, "host"),
                    ));
                }
                lines
            }
        }
        CardContent::Munki {
            fetching,
            error,
            versions,
            issues,
        } => {
            if let Some(error) = error {
                vec![format!("error: {error}")]
            } else if *fetching && versions.is_empty() {
                vec!["loading...".to_owned()]
            } else {
                let mut lines: Vec<String> = versions
                    .iter()
                    .map(|version| {
                        format!(
                            "{:<10} {}",
                            version.version,
                            format_count(version.hosts_count, "host")
                        )
                    })
                    .collect();
                for issue in issues {
                    let kind = match issue.kind {
                        MunkiIssueKind::Error => "error",
                        MunkiIssueKind::Warning => "warning",
                    };
                    lines.push(format!(
                        "[{kind}] {} ({})",
                        issue.name,
                        format_count(issue.hosts_count, "host")
                    ));
                }
                lines
            }
        }
    };

    if let Some(action) = &card.action {
        lines.push(format!("→ {}: {}", action.text, action.path));
    }
    if let (false, Some(detail)) = (card.show_title, &card.title_detail) {
        lines.push(format_last_updated(detail, now));
    }
    lines.join("\n")
}

fn render_software_lines(
    listing: Option<&SoftwareResponse>,
    fetching: bool,
    error: Option<&DashboardError>,
    collecting_inventory: bool,
    pager: SoftwarePager,
) -> Vec<String> {
    let mut lines = vec![software_tabs_line(pager)];
    if let Some(error) = error {
        lines.push(format!("error: {error}"));
        return lines;
    }
    if collecting_inventory {
        lines.push("Fleet is collecting software inventory.".to_owned());
        return lines;
    }
    let Some(listing) = listing else {
        lines.push(if fetching { "loading..." } else { "no data" }.to_owned());
        return lines;
    };
    if listing.rows().is_empty() {
        lines.push("No software matches this view.".to_owned());
    }
    for row in listing.rows() {
        let name = truncate_label(&format!("{} {}", row.name, row.version), SOFTWARE_NAME_WIDTH);
        let marker = if row.vulnerabilities.as_ref().is_some_and(|cves| !cves.is_empty()) {
            "!"
        } else {
            " "
        };
        lines.push(format!(
            "{marker} {name:<width$} {}",
            format_count(row.hosts_count, "host"),
            width = SOFTWARE_NAME_WIDTH
        ));
    }
    lines.push(format!("page {}", pager.page_index + 1));
    lines
}

fn software_tabs_line(pager: SoftwarePager) -> String {
    if pager.tab.is_vulnerable() {
        " All  [Vulnerable]".to_owned()
    } else {
        "[All]  Vulnerable ".to_owned()
    }
}

fn software_pager_label(pager: SoftwarePager) -> String {
    let tab = if pager.tab.is_vulnerable() {
        "vulnerable"
    } else {
        "all"
    };
    format!("software: {tab}, page {}", pager.page_index + 1)
}

fn render_enrollment_lines(enrollment: &[MdmEnrollmentBucket]) -> Vec<String> {
    enrollment
        .iter()
        .map(|bucket| {
            format!(
                "{:<22} {}",
                bucket.status,
                format_count(bucket.hosts, "host")
            )
        })
        .collect()
}

fn render_add_hosts_text(modal: &AddHostsModal) -> String {
    let scope = modal
        .team
        .as_ref()
        .map_or_else(|| "All teams".to_owned(), |team| team.name.clone());
    let secret = match (&modal.enroll_secret, modal.loading) {
        (Some(secret), _) => secret.clone(),
        (None, true) => "loading...".to_owned(),
        (None, false) => "no enroll secret available".to_owned(),
    };
    let mut lines = vec![
        format!("Team: {scope}"),
        format!("Enroll secret: {secret}"),
        String::new(),
        "Install fleetd with this secret to enroll hosts.".to_owned(),
    ];
    if modal.sandbox_mode {
        lines.push("Sandbox: hosts enroll into the global scope.".to_owned());
    }
    lines.push("a/esc close".to_owned());
    lines.join("\n")
}

fn format_last_updated(detail: &LastUpdated, now: OffsetDateTime) -> String {
    match detail.at {
        Some(at) => format!("{} updated {}", detail.what, format_relative(at, now)),
        None => format!("{} never updated", detail.what),
    }
}

fn format_relative(at: OffsetDateTime, now: OffsetDateTime) -> String {
    let seconds = (now - at).whole_seconds().max(0);
    let (value, unit) = match seconds {
        0..=59 => return "just now".to_owned(),
        60..=3_599 => (seconds / 60, "minute"),
        3_600..=86_399 => (seconds / 3_600, "hour"),
        _ => (seconds / 86_400, "day"),
    };
    if value == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{value} {unit}s ago")
    }
}

fn format_count(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn truncate_label(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let mut truncated: String = value.chars().take(max_chars.saturating_sub(1)).collect();
    truncated.push('…');
    truncated
}

fn status_text(dashboard: &Dashboard, view_data: &ViewData) -> String {
    let default = "p/P platform | 1-4 jump | t team | [/] page | v vulnerable | a add hosts | r refresh | ? help | q quit";
    let path = if view_data.current_path.is_empty() {
        dashboard.selection().platform.path()
    } else {
        view_data.current_path.as_str()
    };
    match &view_data.status_line {
        Some(status) => format!("{path} | {status} | {default}"),
        None => format!("{path} | {default}"),
    }
}

fn help_overlay_text() -> &'static str {
    "platform: p next | P previous | 1 all 2 macOS 3 Windows 4 Linux\n\
team: t next team (premium)\n\
software: ] next page | [ previous page | v toggle vulnerable\n\
hosts: a add hosts (admins and maintainers)\n\
data: r refetch stale sources\n\
global: ? help | q/esc quit | ctrl+c quit"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
