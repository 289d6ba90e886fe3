//! The interactive dashboard.
//!
//! One foreground loop owns the terminal and reads from channels: key events
//! from a reader thread, refresh outcomes from the list poller, run outcomes
//! from the detail poller, and log/delete outcomes from one-off tasks. All
//! state transitions happen here; the pollers only ever produce snapshots.

use std::collections::HashSet;
use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    CompletedFrame, DefaultTerminal, Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap},
};
use supwatch_filter::{RunFilter, SortKey, matches_search, select, sort_runs};
use supwatch_kubectl::{
    ClusterQuery, Kubectl, KubectlError, PIPELINE_RUN_LABEL, RunLocator, Stern, TASK_RUN_LABEL,
};
use supwatch_model::{ReadyReason, RunSnapshot};
use supwatch_reconcile::{ABSENT, HealthState, RunTree, progress_line, reconcile};
use supwatch_refresh::{Applied, Poller, RefreshOutcome, RunOutcome, RunPoller, ViewState};
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::warn;

const CLUSTER_UNREACHABLE: &str = "unable to reach cluster; showing last fetched data";

#[derive(Error, Debug)]
pub enum TuiError {
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub struct TuiOptions {
    pub kubectl: Kubectl,
    pub stern: Stern,
    pub refresh_interval: Duration,
    pub detail_refresh: Duration,
}

pub async fn tui(options: TuiOptions) -> Result<(), TuiError> {
    let mut terminal = TerminalSession::init();

    let (poller, mut refreshes) = Poller::spawn(options.kubectl.clone(), options.refresh_interval);
    let (task_tx, mut task_outcomes) = unbounded_channel();
    let mut app = App::new(options, poller, task_tx);

    let mut events = read_events();
    let mut detail_outcomes: Option<UnboundedReceiver<RunOutcome>> = None;
    let mut housekeeping = tokio::time::interval(Duration::from_secs(1));

    loop {
        terminal.draw(|frame| draw_ui(frame, &mut app))?;

        tokio::select! {
            Some(event) = events.recv() => {
                match app.handle_event(event) {
                    Some(Effect::Quit) => break,
                    Some(Effect::DetailOpened(outcomes)) => detail_outcomes = Some(outcomes),
                    Some(Effect::DetailClosed) => detail_outcomes = None,
                    None => {}
                }
            }

            Some(outcome) = refreshes.recv() => app.apply_refresh(outcome),

            Some(outcome) = recv_run(&mut detail_outcomes) => app.apply_run(outcome),

            Some(outcome) = task_outcomes.recv() => {
                if let Some(Effect::DetailClosed) = app.apply_task(outcome) {
                    detail_outcomes = None;
                }
            }

            _ = housekeeping.tick() => app.expire_notices(),
        }
    }

    Ok(())
}

async fn recv_run(outcomes: &mut Option<UnboundedReceiver<RunOutcome>>) -> Option<RunOutcome> {
    match outcomes {
        Some(outcomes) => outcomes.recv().await,
        None => std::future::pending().await,
    }
}

struct TerminalSession {
    terminal: DefaultTerminal,
}

impl TerminalSession {
    fn init() -> Self {
        let terminal = ratatui::init();
        Self { terminal }
    }

    pub fn draw<F>(&mut self, render_callback: F) -> Result<CompletedFrame<'_>, TuiError>
    where
        F: FnOnce(&mut Frame),
    {
        Ok(self.terminal.draw(render_callback)?)
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        ratatui::restore();
    }
}

fn read_events() -> UnboundedReceiver<Event> {
    let (event_tx, event_rx) = unbounded_channel();

    std::thread::spawn(move || loop {
        if let Ok(event) = crossterm::event::read() {
            if event_tx.send(event).is_err() {
                break;
            }
        }
    });

    event_rx
}

enum Effect {
    Quit,
    DetailOpened(UnboundedReceiver<RunOutcome>),
    DetailClosed,
}

enum TaskOutcome {
    Logs {
        session: u64,
        title: String,
        result: Result<String, KubectlError>,
    },
    Delete {
        session: u64,
        locator: RunLocator,
        result: Result<(), KubectlError>,
    },
}

struct Notice {
    message: String,
    created: Instant,
}

/// Which stage or resumption a detail row points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeRef {
    Stage(usize),
    Resumption(usize, usize),
}

#[derive(Debug, Clone)]
struct DetailRow {
    node: NodeRef,
    depth: usize,
    is_branch: bool,
    is_expanded: bool,
}

enum LogPaneState {
    Loading,
    Ready(String),
    Failed(String),
}

struct LogPane {
    title: String,
    state: LogPaneState,
    scroll: u16,
}

struct DetailView {
    session: u64,
    locator: RunLocator,
    run: RunSnapshot,
    tree: RunTree,
    collapsed: HashSet<usize>,
    selected: usize,
    tree_offset: usize,
    logs: Option<LogPane>,
    // aborts the detail fetch loop when the view goes away
    _poller: RunPoller,
}

struct App {
    kubectl: Kubectl,
    stern: Stern,
    refresh_interval: Duration,
    detail_refresh: Duration,
    poller: Poller,
    tasks: UnboundedSender<TaskOutcome>,

    state: ViewState,
    last_refresh: Option<Instant>,
    notices: Vec<Notice>,

    filter: RunFilter,
    search: String,
    search_editing: bool,
    sort: Option<SortKey>,
    sort_ascending: bool,

    cursor: usize,
    list_offset: usize,

    detail: Option<DetailView>,
    next_session: u64,
}

impl App {
    fn new(options: TuiOptions, poller: Poller, tasks: UnboundedSender<TaskOutcome>) -> Self {
        Self {
            kubectl: options.kubectl,
            stern: options.stern,
            refresh_interval: options.refresh_interval,
            detail_refresh: options.detail_refresh,
            poller,
            tasks,

            state: ViewState::default(),
            last_refresh: None,
            notices: Vec::new(),

            filter: RunFilter::default(),
            search: String::new(),
            search_editing: false,
            sort: None,
            sort_ascending: true,

            cursor: 0,
            list_offset: 0,

            detail: None,
            next_session: 0,
        }
    }

    /// The runs the list currently shows, after filter, search and sort.
    fn visible(&self) -> Vec<&RunSnapshot> {
        match self.state.view() {
            Some(view) => visible_runs(
                &view.runs,
                &self.filter,
                &self.search,
                self.sort,
                self.sort_ascending,
            ),
            None => Vec::new(),
        }
    }

    fn chain_options(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .view()
            .map(|view| view.chains.iter().map(|chain| chain.name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        names.dedup();
        names
    }

    fn status_options() -> Vec<String> {
        ReadyReason::ALL
            .iter()
            .map(|reason| reason.as_str().to_string())
            .collect()
    }

    fn clamp_cursor(&mut self) {
        let len = self.visible().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    fn notice(&mut self, message: String) {
        self.notices.push(Notice {
            message,
            created: Instant::now(),
        });
    }

    /// Transient notices live for one refresh interval.
    fn expire_notices(&mut self) {
        let ttl = self.refresh_interval;
        self.notices.retain(|notice| notice.created.elapsed() < ttl);
    }

    fn apply_refresh(&mut self, outcome: RefreshOutcome) {
        match self.state.apply(outcome) {
            Applied::Replaced => {
                self.last_refresh = Some(Instant::now());
                self.clamp_cursor();
            }
            Applied::Failed(error) => {
                warn!("refresh failed: {error}");
                self.notice(CLUSTER_UNREACHABLE.to_string());
            }
            Applied::Stale => {}
        }
    }

    fn apply_run(&mut self, outcome: RunOutcome) {
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        if outcome.session != detail.session {
            return;
        }
        match outcome.result {
            Ok(run) => {
                detail.tree = reconcile(&run);
                detail.run = run;
                let len = visible_tree_rows(&detail.tree, &detail.collapsed).len();
                detail.selected = detail.selected.min(len.saturating_sub(1));
            }
            Err(error) => {
                warn!("detail fetch failed: {error}");
                self.notice(CLUSTER_UNREACHABLE.to_string());
            }
        }
    }

    fn apply_task(&mut self, outcome: TaskOutcome) -> Option<Effect> {
        match outcome {
            TaskOutcome::Logs {
                session,
                title,
                result,
            } => {
                let detail = self.detail.as_mut()?;
                if session != detail.session {
                    return None;
                }
                let state = match result {
                    Ok(text) if text.trim().is_empty() => {
                        LogPaneState::Failed("no log output returned".into())
                    }
                    Ok(text) => LogPaneState::Ready(text),
                    Err(error) => LogPaneState::Failed(error.to_string()),
                };
                detail.logs = Some(LogPane {
                    title,
                    state,
                    scroll: 0,
                });
                None
            }
            TaskOutcome::Delete {
                session,
                locator,
                result,
            } => {
                if self.detail.as_ref().map(|detail| detail.session) != Some(session) {
                    return None;
                }
                match result {
                    Ok(()) => {
                        self.detail = None;
                        self.poller.poke();
                        self.notice(format!("deleted {locator}"));
                        Some(Effect::DetailClosed)
                    }
                    Err(error) => {
                        // the detail view stays open; the user decides what next
                        self.notice(format!("delete failed: {error}"));
                        None
                    }
                }
            }
        }
    }

    fn handle_event(&mut self, event: Event) -> Option<Effect> {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return None;
        };

        if modifiers.contains(KeyModifiers::CONTROL) {
            return match code {
                KeyCode::Char('c') => Some(Effect::Quit),
                KeyCode::Char('d') if self.detail.is_some() => {
                    self.delete_run();
                    None
                }
                _ => None,
            };
        }

        if self.detail.is_some() {
            self.handle_detail_key(code)
        } else {
            self.handle_list_key(code)
        }
    }

    fn handle_list_key(&mut self, code: KeyCode) -> Option<Effect> {
        if self.search_editing {
            match code {
                KeyCode::Char(c) => self.search.push(c),
                KeyCode::Backspace => {
                    self.search.pop();
                }
                KeyCode::Enter => self.search_editing = false,
                KeyCode::Esc => {
                    self.search.clear();
                    self.search_editing = false;
                }
                _ => {}
            }
            self.clamp_cursor();
            return None;
        }

        match code {
            KeyCode::Char('q') => return Some(Effect::Quit),

            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.visible().len();
                if len > 0 {
                    self.cursor = (self.cursor + 1).min(len - 1);
                }
            }
            KeyCode::Up | KeyCode::Char('k') => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Char('g') => self.cursor = 0,
            KeyCode::Char('G') => {
                self.cursor = self.visible().len().saturating_sub(1);
            }

            KeyCode::Char('/') | KeyCode::Char('s') => self.search_editing = true,

            KeyCode::Char('l') => {
                self.filter.latest_only = !self.filter.latest_only;
                self.clamp_cursor();
            }
            KeyCode::Char('c') => {
                let options = self.chain_options();
                self.filter.chain = cycle_option(&options, self.filter.chain.as_deref());
                self.clamp_cursor();
            }
            KeyCode::Char('t') => {
                let options = Self::status_options();
                self.filter.status = cycle_option(&options, self.filter.status.as_deref());
                self.clamp_cursor();
            }

            KeyCode::Char('o') => self.sort = cycle_sort(self.sort),
            KeyCode::Char('O') => self.sort_ascending = !self.sort_ascending,

            KeyCode::Char('r') => self.poller.poke(),

            KeyCode::Enter => return self.open_detail(),

            _ => {}
        }

        None
    }

    fn handle_detail_key(&mut self, code: KeyCode) -> Option<Effect> {
        let detail = self.detail.as_mut()?;
        match code {
            KeyCode::Char('q') => return Some(Effect::Quit),
            KeyCode::Esc => {
                self.detail = None;
                return Some(Effect::DetailClosed);
            }

            KeyCode::Down | KeyCode::Char('j') => {
                let len = visible_tree_rows(&detail.tree, &detail.collapsed).len();
                if len > 0 {
                    detail.selected = (detail.selected + 1).min(len - 1);
                }
            }
            KeyCode::Up | KeyCode::Char('k') => detail.selected = detail.selected.saturating_sub(1),

            KeyCode::Enter | KeyCode::Char(' ') => {
                let rows = visible_tree_rows(&detail.tree, &detail.collapsed);
                if let Some(row) = rows.get(detail.selected) {
                    if let NodeRef::Stage(index) = row.node {
                        if row.is_branch {
                            if !detail.collapsed.remove(&index) {
                                detail.collapsed.insert(index);
                            }
                            let len = visible_tree_rows(&detail.tree, &detail.collapsed).len();
                            detail.selected = detail.selected.min(len.saturating_sub(1));
                        }
                    }
                }
            }

            KeyCode::Char('L') => self.fetch_logs(),

            KeyCode::PageUp => {
                if let Some(logs) = detail.logs.as_mut() {
                    logs.scroll = logs.scroll.saturating_sub(10);
                }
            }
            KeyCode::PageDown => {
                if let Some(logs) = detail.logs.as_mut() {
                    logs.scroll = logs.scroll.saturating_add(10);
                }
            }
            KeyCode::Char('x') => detail.logs = None,

            _ => {}
        }
        None
    }

    fn open_detail(&mut self) -> Option<Effect> {
        let run = self.visible().get(self.cursor).copied()?.clone();
        let Some(locator) = RunLocator::from_run(&run) else {
            self.notice(format!(
                "run {}/{} has no workload-kind label; cannot fetch it",
                run.namespace, run.name
            ));
            return None;
        };

        self.next_session += 1;
        let session = self.next_session;
        let (poller, outcomes) = RunPoller::spawn(
            self.kubectl.clone(),
            locator.clone(),
            self.detail_refresh,
            session,
        );

        // seed from the list snapshot so the view is populated before the
        // first detail fetch lands
        let tree = reconcile(&run);
        self.detail = Some(DetailView {
            session,
            locator,
            run,
            tree,
            collapsed: HashSet::new(),
            selected: 0,
            tree_offset: 0,
            logs: None,
            _poller: poller,
        });

        Some(Effect::DetailOpened(outcomes))
    }

    fn fetch_logs(&mut self) {
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        let rows = visible_tree_rows(&detail.tree, &detail.collapsed);
        let Some(row) = rows.get(detail.selected) else {
            return;
        };

        let (label, reference, title) = match row.node {
            NodeRef::Stage(i) => {
                let stage = &detail.tree.stages[i];
                (
                    PIPELINE_RUN_LABEL,
                    stage
                        .status
                        .as_ref()
                        .and_then(|status| status.object_ref.as_ref())
                        .and_then(|reference| reference.name.clone()),
                    stage.spec.name.clone(),
                )
            }
            NodeRef::Resumption(i, j) => {
                let resumption = &detail.tree.stages[i].resumptions[j];
                (
                    TASK_RUN_LABEL,
                    resumption
                        .status
                        .as_ref()
                        .and_then(|status| status.object_ref.as_ref())
                        .and_then(|reference| reference.name.clone()),
                    resumption.spec.name.clone(),
                )
            }
        };

        let Some(value) = reference else {
            detail.logs = Some(LogPane {
                title,
                state: LogPaneState::Failed("nothing has run for this node yet".into()),
                scroll: 0,
            });
            return;
        };

        detail.logs = Some(LogPane {
            title: title.clone(),
            state: LogPaneState::Loading,
            scroll: 0,
        });
        let session = detail.session;
        let stern = self.stern.clone();
        let tasks = self.tasks.clone();
        tokio::spawn(async move {
            let result = stern.fetch_logs(label, &value).await;
            let _ = tasks.send(TaskOutcome::Logs {
                session,
                title,
                result,
            });
        });
    }

    fn delete_run(&mut self) {
        let Some(detail) = self.detail.as_ref() else {
            return;
        };
        let session = detail.session;
        let locator = detail.locator.clone();
        let kubectl = self.kubectl.clone();
        let tasks = self.tasks.clone();
        tokio::spawn(async move {
            let result = kubectl.delete_run(&locator).await;
            let _ = tasks.send(TaskOutcome::Delete {
                session,
                locator,
                result,
            });
        });
    }
}

/// Filter, then search, then sort. The search runs over the already-selected
/// set; the latest check inside `select` sees the whole collection.
fn visible_runs<'a>(
    runs: &'a [RunSnapshot],
    filter: &RunFilter,
    search: &str,
    sort: Option<SortKey>,
    ascending: bool,
) -> Vec<&'a RunSnapshot> {
    let mut selected = select(runs, filter);
    selected.retain(|run| matches_search(run, search));
    if let Some(key) = sort {
        sort_runs(&mut selected, key, ascending);
    }
    selected
}

/// all → first option → ... → last option → all.
fn cycle_option(options: &[String], current: Option<&str>) -> Option<String> {
    match current {
        None => options.first().cloned(),
        Some(current) => {
            let index = options.iter().position(|option| option == current)?;
            options.get(index + 1).cloned()
        }
    }
}

fn cycle_sort(current: Option<SortKey>) -> Option<SortKey> {
    match current {
        None => SortKey::ALL.first().copied(),
        Some(key) => {
            let index = SortKey::ALL.iter().position(|k| *k == key)?;
            SortKey::ALL.get(index + 1).copied()
        }
    }
}

fn visible_tree_rows(tree: &RunTree, collapsed: &HashSet<usize>) -> Vec<DetailRow> {
    let mut rows = Vec::new();
    for (i, stage) in tree.stages.iter().enumerate() {
        let is_branch = !stage.resumptions.is_empty();
        let is_expanded = !collapsed.contains(&i);
        rows.push(DetailRow {
            node: NodeRef::Stage(i),
            depth: 0,
            is_branch,
            is_expanded,
        });
        if is_branch && is_expanded {
            for (j, _) in stage.resumptions.iter().enumerate() {
                rows.push(DetailRow {
                    node: NodeRef::Resumption(i, j),
                    depth: 1,
                    is_branch: false,
                    is_expanded: false,
                });
            }
        }
    }
    rows
}

fn ensure_visible(offset: &mut usize, selected: usize, height: usize) {
    if height == 0 {
        return;
    }
    let bottom = *offset + height - 1;
    if selected < *offset {
        *offset = selected;
    } else if selected > bottom {
        *offset = selected + 1 - height;
    }
}

fn ready_color(reason: Option<&str>) -> Color {
    match reason.and_then(ReadyReason::parse) {
        Some(ReadyReason::Running) => Color::Blue,
        Some(ReadyReason::Succeeded) => Color::Green,
        Some(ReadyReason::Failed) => Color::Red,
        Some(ReadyReason::PlatformFailed) => Color::Yellow,
        None => Color::DarkGray,
    }
}

fn health_color(health: HealthState) -> Color {
    match health {
        HealthState::NotStarted => Color::DarkGray,
        HealthState::Running => Color::Blue,
        HealthState::Failed => Color::Red,
        HealthState::Succeeded => Color::Green,
    }
}

fn draw_ui(frame: &mut Frame, app: &mut App) {
    let outer = Block::bordered().title_top("supwatch");
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(4),
                Constraint::Min(5),
                Constraint::Length(1),
            ]
            .as_ref(),
        )
        .split(outer.inner(frame.area()));

    frame.render_widget(outer, frame.area());
    draw_header(frame, layout[0], app);
    if app.detail.is_some() {
        draw_detail(frame, layout[1], app);
    } else {
        draw_list(frame, layout[1], app);
    }
    draw_help(frame, layout[2], app);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let first = match &app.detail {
        Some(detail) => {
            let run = &detail.run;
            let reason = run
                .ready_condition()
                .ok()
                .and_then(|condition| condition.reason.clone());
            Line::from(vec![
                Span::styled(
                    format!("{}/{}", run.namespace, run.name),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw("  chain: "),
                Span::raw(run.chain.clone().unwrap_or_else(|| ABSENT.into())),
                Span::raw("  ready: "),
                Span::styled(
                    reason.clone().unwrap_or_else(|| ABSENT.into()),
                    Style::default().fg(ready_color(reason.as_deref())),
                ),
            ])
        }
        None => {
            let active = Style::default().fg(Color::Cyan);
            let idle = Style::default().fg(Color::DarkGray);
            let axis = |label: &str, value: Option<&str>| {
                let style = if value.is_some() { active } else { idle };
                Span::styled(
                    format!("{label}: {}  ", value.unwrap_or("all")),
                    style,
                )
            };
            let mut spans = vec![
                axis("chain", app.filter.chain.as_deref()),
                axis("status", app.filter.status.as_deref()),
                Span::styled(
                    format!("latest: {}  ", if app.filter.latest_only { "on" } else { "off" }),
                    if app.filter.latest_only { active } else { idle },
                ),
                Span::styled(
                    match app.sort {
                        Some(key) => format!(
                            "sort: {key} {}  ",
                            if app.sort_ascending { "asc" } else { "desc" }
                        ),
                        None => "sort: cluster  ".to_string(),
                    },
                    if app.sort.is_some() { active } else { idle },
                ),
            ];
            if app.search_editing || !app.search.is_empty() {
                spans.push(Span::styled(
                    format!(
                        "search: {}{}",
                        app.search,
                        if app.search_editing { "▌" } else { "" }
                    ),
                    active,
                ));
            }
            Line::from(spans)
        }
    };

    let mut status_spans: Vec<Span> = Vec::new();
    match app.last_refresh {
        Some(at) => status_spans.push(Span::raw(format!(
            "refreshed {}s ago",
            at.elapsed().as_secs()
        ))),
        None => status_spans.push(Span::raw("waiting for first fetch...")),
    }
    if app.state.failures() > 0 {
        status_spans.push(Span::styled(
            format!("  {} failed refresh(es)", app.state.failures()),
            Style::default().fg(Color::Red),
        ));
    }
    if let Some(notice) = app.notices.last() {
        status_spans.push(Span::styled(
            format!("  {}", notice.message),
            Style::default().fg(Color::Yellow),
        ));
    }

    let widget = Paragraph::new(Text::from(vec![first, Line::from(status_spans)]))
        .block(Block::bordered().title_top("runs"))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    frame.render_widget(widget, area);
}

fn draw_list(frame: &mut Frame, area: Rect, app: &mut App) {
    let App {
        state,
        filter,
        search,
        sort,
        sort_ascending,
        cursor,
        list_offset,
        ..
    } = app;

    let Some(view) = state.view() else {
        let widget = Paragraph::new("Waiting for run data...")
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        frame.render_widget(widget, area);
        return;
    };

    let visible = visible_runs(&view.runs, filter, search, *sort, *sort_ascending);
    let header = Row::new(vec![
        "namespace", "chain", "run", "ready", "created", "progress", "message",
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = visible.iter().map(|run| {
        let ready = run.ready_condition().ok();
        let reason = ready.and_then(|condition| condition.reason.clone());
        let message = ready
            .and_then(|condition| condition.first_sentence())
            .unwrap_or_default()
            .to_string();
        Row::new(vec![
            Cell::from(run.namespace.clone()),
            Cell::from(run.chain.clone().unwrap_or_default()),
            Cell::from(run.search_key()),
            Cell::from(reason.clone().unwrap_or_else(|| ABSENT.into()))
                .style(Style::default().fg(ready_color(reason.as_deref()))),
            Cell::from(run.created.clone()),
            Cell::from(progress_line(run)),
            Cell::from(message),
        ])
    });

    let widths = [
        Constraint::Length(14),
        Constraint::Length(12),
        Constraint::Min(24),
        Constraint::Length(14),
        Constraint::Length(20),
        Constraint::Length(10),
        Constraint::Min(16),
    ];

    // borders plus the header row
    let inner_height = area.height.saturating_sub(3) as usize;
    ensure_visible(list_offset, *cursor, inner_height);

    let mut table_state = TableState::default();
    if !visible.is_empty() {
        table_state.select(Some(*cursor));
    }
    *table_state.offset_mut() = *list_offset;

    let widget = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL))
        .row_highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_stateful_widget(widget, area, &mut table_state);
}

fn draw_detail(frame: &mut Frame, area: Rect, app: &mut App) {
    let Some(detail) = app.detail.as_mut() else {
        return;
    };

    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)].as_ref())
        .split(area);

    draw_detail_tree(frame, layout[0], detail);

    match detail.logs.is_some() {
        true => {
            let right = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(40), Constraint::Percentage(60)].as_ref())
                .split(layout[1]);
            draw_detail_fields(frame, right[0], detail);
            draw_detail_logs(frame, right[1], detail);
        }
        false => draw_detail_fields(frame, layout[1], detail),
    }
}

fn draw_detail_tree(frame: &mut Frame, area: Rect, detail: &mut DetailView) {
    let rows = visible_tree_rows(&detail.tree, &detail.collapsed);

    let items = rows
        .iter()
        .map(|row| {
            let mut spans: Vec<Span> = Vec::new();
            spans.push(Span::raw("  ".repeat(row.depth)));

            if row.is_branch {
                spans.push(Span::styled(
                    format!("{} ", if row.is_expanded { "▼" } else { "▶" }),
                    Style::default().fg(Color::Yellow),
                ));
            } else {
                spans.push(Span::styled("• ", Style::default().fg(Color::DarkGray)));
            }

            let (health, name, reference) = match row.node {
                NodeRef::Stage(i) => {
                    let stage = &detail.tree.stages[i];
                    (
                        stage.health,
                        stage.spec.name.as_str(),
                        stage
                            .status
                            .as_ref()
                            .and_then(|status| status.object_ref.as_ref())
                            .and_then(|reference| reference.name.as_deref()),
                    )
                }
                NodeRef::Resumption(i, j) => {
                    let resumption = &detail.tree.stages[i].resumptions[j];
                    (
                        resumption.health,
                        resumption.spec.name.as_str(),
                        resumption
                            .status
                            .as_ref()
                            .and_then(|status| status.object_ref.as_ref())
                            .and_then(|reference| reference.name.as_deref()),
                    )
                }
            };

            spans.push(Span::styled(
                format!("{} ", health.glyph()),
                Style::default().fg(health_color(health)),
            ));
            spans.push(Span::raw(name.to_string()));
            if let Some(reference) = reference {
                spans.push(Span::styled(
                    format!("  {reference}"),
                    Style::default().fg(Color::DarkGray),
                ));
            }

            ListItem::new(Line::from(spans))
        })
        .collect::<Vec<_>>();

    let inner_height = area.height.saturating_sub(2) as usize;
    ensure_visible(&mut detail.tree_offset, detail.selected, inner_height);

    let mut list_state = ListState::default();
    if !rows.is_empty() {
        list_state.select(Some(detail.selected));
    }
    *list_state.offset_mut() = detail.tree_offset;

    let widget = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("stages"))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_stateful_widget(widget, area, &mut list_state);
}

fn draw_detail_fields(frame: &mut Frame, area: Rect, detail: &DetailView) {
    let rows = visible_tree_rows(&detail.tree, &detail.collapsed);
    let substitutions = rows.get(detail.selected).map(|row| match row.node {
        NodeRef::Stage(i) => detail.tree.stages[i].substitutions(),
        NodeRef::Resumption(i, j) => detail.tree.stages[i].resumptions[j].substitutions(),
    });

    let lines = match &substitutions {
        Some(substitutions) => substitutions
            .iter()
            .map(|(key, value)| {
                Line::from(vec![
                    Span::styled(format!("{key:>10}  "), Style::default().fg(Color::DarkGray)),
                    Span::raw(value.as_str()),
                ])
            })
            .collect::<Vec<_>>(),
        None => vec![Line::from("no stage selected")],
    };

    let widget = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("fields"))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false });
    frame.render_widget(widget, area);
}

fn draw_detail_logs(frame: &mut Frame, area: Rect, detail: &mut DetailView) {
    let Some(logs) = detail.logs.as_mut() else {
        return;
    };

    let title = format!("logs: {} (x to close)", logs.title);
    let widget = match &logs.state {
        LogPaneState::Loading => Paragraph::new("fetching logs...")
            .block(Block::default().borders(Borders::ALL).title(title))
            .style(Style::default().fg(Color::DarkGray)),
        LogPaneState::Failed(message) => Paragraph::new(message.as_str())
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false })
            .style(Style::default().fg(Color::Red)),
        LogPaneState::Ready(text) => {
            let inner_height = area.height.saturating_sub(2) as usize;
            let total_lines = text.lines().count();
            let max_scroll = total_lines.saturating_sub(inner_height) as u16;
            if logs.scroll > max_scroll {
                logs.scroll = max_scroll;
            }
            Paragraph::new(text.as_str())
                .block(Block::default().borders(Borders::ALL).title(title))
                .wrap(Wrap { trim: false })
                .scroll((logs.scroll, 0))
        }
    };

    frame.render_widget(widget, area);
}

fn draw_help(frame: &mut Frame, area: Rect, app: &App) {
    let hints = if app.detail.is_some() {
        "j/k move  enter fold  L logs  PgUp/PgDn scroll logs  ctrl-d delete  esc back  q quit"
    } else if app.search_editing {
        "type to filter  enter keep  esc clear"
    } else {
        "j/k move  enter open  / search  c chain  t status  l latest  o/O sort  r refresh  q quit"
    };

    let widget = Paragraph::new(Text::from(vec![Line::from(Span::styled(
        hints,
        Style::default().fg(Color::DarkGray),
    ))]))
    .block(Block::default())
    .alignment(Alignment::Left)
    .wrap(Wrap { trim: true });

    frame.render_widget(widget, area);
}
