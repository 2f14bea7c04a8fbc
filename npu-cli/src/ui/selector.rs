//! Two-pane update selector.
//!
//! The dependency list pane marks rows for update; the version picker pane
//! pins a specific candidate for the highlighted row. All transitions live
//! in [`SelectorState`] so they can be tested without a terminal.

use std::collections::HashSet;
use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Layout, Margin};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;

use npu::dependency::{Dependency, Scope, SelectedVersion};
use npu::version::{diff, VersionDiff};

use super::{format_weight_delta, TerminalGuard};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Which pane has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Dependencies,
    Versions,
}

/// How the selector session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorOutcome {
    /// Operator committed the marked set.
    Committed,
    /// Operator cancelled; nothing is written.
    Cancelled,
}

/// Selector state machine.
#[derive(Debug)]
pub struct SelectorState {
    deps: Vec<Dependency>,
    pane: Pane,
    cursor: usize,
    version_cursor: usize,
    selected: HashSet<usize>,
}

impl SelectorState {
    pub fn new(deps: Vec<Dependency>) -> Self {
        Self {
            deps,
            pane: Pane::Dependencies,
            cursor: 0,
            version_cursor: 0,
            selected: HashSet::new(),
        }
    }

    pub fn pane(&self) -> Pane {
        self.pane
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    /// Applies one key press; `Some` ends the session.
    pub fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> Option<SelectorOutcome> {
        if code == KeyCode::Char('q')
            || (code == KeyCode::Char('c') && mods.contains(KeyModifiers::CONTROL))
        {
            return Some(SelectorOutcome::Cancelled);
        }
        match self.pane {
            Pane::Dependencies => self.handle_deps_key(code, mods),
            Pane::Versions => {
                self.handle_versions_key(code);
                None
            }
        }
    }

    fn handle_deps_key(
        &mut self,
        code: KeyCode,
        mods: KeyModifiers,
    ) -> Option<SelectorOutcome> {
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < self.deps.len() {
                    self.cursor += 1;
                }
            }
            KeyCode::Char(' ') => {
                if !self.selected.remove(&self.cursor) {
                    self.selected.insert(self.cursor);
                }
            }
            KeyCode::Enter => return Some(SelectorOutcome::Committed),
            KeyCode::Right | KeyCode::Char('l') => self.enter_version_picker(),
            KeyCode::Char('a') if mods.contains(KeyModifiers::CONTROL) => {
                self.select_where(|_| true);
            }
            KeyCode::Char('u') if mods.contains(KeyModifiers::CONTROL) => {
                self.selected.clear();
            }
            KeyCode::Char('d') if mods.contains(KeyModifiers::CONTROL) => {
                self.select_where(|dep| dep.scope == Scope::Development);
            }
            KeyCode::Char('z') if mods.contains(KeyModifiers::CONTROL) => {
                self.select_where(|dep| dep.scope == Scope::Production);
            }
            KeyCode::Char('x') if mods.contains(KeyModifiers::CONTROL) => {
                self.select_where(|dep| diff_class(dep) == Some(VersionDiff::Patch));
            }
            KeyCode::Char('b') if mods.contains(KeyModifiers::CONTROL) => {
                self.select_where(|dep| diff_class(dep) == Some(VersionDiff::Minor));
            }
            _ => {}
        }
        None
    }

    fn handle_versions_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.version_cursor = self.version_cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.version_cursor + 1 < self.deps[self.cursor].versions.len() {
                    self.version_cursor += 1;
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.pick_version();
                self.pane = Pane::Dependencies;
            }
            KeyCode::Left | KeyCode::Char('h') | KeyCode::Esc => {
                self.pane = Pane::Dependencies;
            }
            _ => {}
        }
    }

    fn select_where(&mut self, predicate: impl Fn(&Dependency) -> bool) {
        for (index, dep) in self.deps.iter().enumerate() {
            if predicate(dep) {
                self.selected.insert(index);
            }
        }
    }

    fn enter_version_picker(&mut self) {
        let dep = &self.deps[self.cursor];
        if dep.versions.is_empty() {
            return;
        }
        // Start on the currently selected next version.
        self.version_cursor = dep
            .next
            .as_ref()
            .and_then(|next| {
                dep.versions
                    .iter()
                    .position(|e| e.version == next.entry.version)
            })
            .unwrap_or(0);
        self.pane = Pane::Versions;
    }

    /// Pins the highlighted candidate as the row's next version and marks
    /// the row for update. The write operator stays whatever the engine
    /// chose for this dependency.
    fn pick_version(&mut self) {
        let dep = &mut self.deps[self.cursor];
        let Some(entry) = dep.versions.iter().nth(self.version_cursor).cloned() else {
            return;
        };
        let operator = dep.next.as_ref().and_then(|next| next.operator);
        dep.next = Some(SelectedVersion { entry, operator });
        self.selected.insert(self.cursor);
    }

    /// Consumes the state, applying the marks to the dependency records.
    pub fn finish(mut self) -> Vec<Dependency> {
        for index in &self.selected {
            if let Some(dep) = self.deps.get_mut(*index) {
                dep.should_update = true;
            }
        }
        self.deps
    }
}

fn diff_class(dep: &Dependency) -> Option<VersionDiff> {
    let current = dep.current.version()?;
    let next = dep.next.as_ref()?;
    Some(diff(current, &next.entry.version))
}

fn diff_style(dep: &Dependency) -> Style {
    match diff_class(dep) {
        Some(VersionDiff::Major) => Style::default().fg(Color::Red),
        Some(VersionDiff::Minor) => Style::default().fg(Color::Yellow),
        Some(VersionDiff::Patch) => Style::default().fg(Color::Green),
        _ => Style::default(),
    }
}

/// Runs the interactive selector.
///
/// Returns the dependency records with `should_update` applied, plus
/// whether the operator committed (false means cancel: no writes).
pub fn run(deps: Vec<Dependency>) -> io::Result<(Vec<Dependency>, bool)> {
    let mut guard = TerminalGuard::new()?;
    let mut state = SelectorState::new(deps);

    loop {
        guard.terminal.draw(|frame| draw(frame, &state))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Some(outcome) = state.handle_key(key.code, key.modifiers) {
                    let committed = outcome == SelectorOutcome::Committed;
                    return Ok((state.finish(), committed));
                }
            }
        }
    }
}

fn draw(frame: &mut Frame, state: &SelectorState) {
    let [body, footer] =
        Layout::vertical([Constraint::Min(4), Constraint::Length(2)]).areas(frame.area());

    match state.pane {
        Pane::Dependencies => draw_deps_table(frame, state, body),
        Pane::Versions => draw_versions_table(frame, state, body),
    }

    let help = match state.pane {
        Pane::Dependencies => {
            "↑/↓: navigate • space: toggle • →: versions • enter: update • \
             ctrl+a: all • ctrl+u: none • ctrl+z: prod • ctrl+d: dev • \
             ctrl+x: patches • ctrl+b: minors • q: quit"
        }
        Pane::Versions => "↑/↓: navigate • space/enter: pick • ←/esc: back • q: quit",
    };
    frame.render_widget(
        Paragraph::new(Line::from(help)).style(Style::default().fg(Color::DarkGray)),
        footer.inner(Margin::new(1, 0)),
    );
}

fn draw_deps_table(frame: &mut Frame, state: &SelectorState, area: ratatui::layout::Rect) {
    let header = Row::new(["", "Dependency", "Current", "New Version", "Scope", "Workspace"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = state
        .deps
        .iter()
        .enumerate()
        .map(|(index, dep)| {
            let mark = if state.is_selected(index) { "✓" } else { " " };
            let next = dep
                .next
                .as_ref()
                .map(|n| {
                    let mut text = n.render();
                    if n.entry.deprecated {
                        text.push_str(" 🚩");
                    }
                    text
                })
                .unwrap_or_default();
            Row::new(vec![
                Cell::from(mark),
                Cell::from(dep.name.clone()),
                Cell::from(dep.current.raw().to_string()),
                Cell::from(next).style(diff_style(dep)),
                Cell::from(dep.scope.label()),
                Cell::from(dep.workspace.to_string_lossy().into_owned()),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(2),
        Constraint::Length(28),
        Constraint::Length(14),
        Constraint::Length(20),
        Constraint::Length(10),
        Constraint::Min(16),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Updates"))
        .row_highlight_style(
            Style::default()
                .bg(Color::Magenta)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );

    let mut table_state = TableState::default();
    table_state.select(Some(state.cursor));
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn draw_versions_table(frame: &mut Frame, state: &SelectorState, area: ratatui::layout::Rect) {
    let dep = &state.deps[state.cursor];
    let current_weight = dep.current_weight().unwrap_or(0);

    let header = Row::new(["Dependency", "Version", "Weight Δ"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = dep
        .versions
        .iter()
        .map(|entry| {
            let mut version = entry.raw.clone();
            if entry.deprecated {
                version.push_str(" 🚩");
            }
            Row::new(vec![
                Cell::from(dep.name.clone()),
                Cell::from(version),
                Cell::from(format_weight_delta(entry.weight, current_weight)),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(28),
        Constraint::Length(20),
        Constraint::Min(12),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Versions of {}", dep.name)),
        )
        .row_highlight_style(
            Style::default()
                .bg(Color::Magenta)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );

    let mut table_state = TableState::default();
    table_state.select(Some(state.version_cursor));
    frame.render_stateful_widget(table, area, &mut table_state);
}
