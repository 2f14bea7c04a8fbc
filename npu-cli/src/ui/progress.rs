//! Resolution progress display.
//!
//! Polls the engine's two progress channels at a fixed tick rate and
//! renders a gauge plus the most recent package name. The bar only ever
//! advances; at 100 % control returns to the caller, which hands over to
//! the selector.

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Gauge, Paragraph};
use ratatui::Frame;
use tokio_util::sync::CancellationToken;

use npu::resolver::ProgressReceiver;

use super::TerminalGuard;

const TICK_RATE: Duration = Duration::from_millis(50);

/// Progress counters fed from the engine's channels.
#[derive(Debug)]
pub struct ProgressState {
    total: usize,
    completed: usize,
    current_package: String,
}

impl ProgressState {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            current_package: String::new(),
        }
    }

    /// Drains both channels; completion only moves forward.
    pub fn absorb(&mut self, rx: &ProgressReceiver) {
        while let Ok(name) = rx.names.try_recv() {
            self.current_package = name;
        }
        let finished = rx.done.try_iter().count();
        self.completed = (self.completed + finished).min(self.total);
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Runs the progress display until resolution completes.
///
/// Returns `false` when the operator cancelled (`q` / ctrl+c); the token
/// is cancelled before returning so the engine unwinds too.
pub fn run(
    total: usize,
    rx: &ProgressReceiver,
    cancel: &CancellationToken,
) -> io::Result<bool> {
    let mut guard = TerminalGuard::new()?;
    let mut state = ProgressState::new(total);

    loop {
        state.absorb(rx);
        guard.terminal.draw(|frame| draw(frame, &state))?;

        if state.is_complete() {
            return Ok(true);
        }
        if cancel.is_cancelled() {
            return Ok(false);
        }

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let interrupt = key.code == KeyCode::Char('q')
                    || (key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL));
                if interrupt {
                    cancel.cancel();
                    return Ok(false);
                }
            }
        }
    }
}

/// Headless fallback for non-TTY environments: drain events until done.
pub fn run_headless(total: usize, rx: &ProgressReceiver, cancel: &CancellationToken) -> bool {
    let mut state = ProgressState::new(total);
    while !state.is_complete() {
        if cancel.is_cancelled() {
            return false;
        }
        state.absorb(rx);
        std::thread::sleep(TICK_RATE);
    }
    true
}

fn draw(frame: &mut Frame, state: &ProgressState) {
    let [header, bar] =
        Layout::vertical([Constraint::Length(1), Constraint::Length(3)]).areas(frame.area());

    let fetching = if state.current_package.is_empty() {
        Line::from("Fetching package versions...")
    } else {
        Line::from(format!("Fetching: {}", state.current_package))
    };
    frame.render_widget(Paragraph::new(fetching), header);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio(state.ratio())
        .label(format!("{}/{}", state.completed, state.total));
    frame.render_widget(gauge, bar);
}

#[cfg(test)]
mod tests {
    use super::*;
    use npu::resolver::progress_channel;

    #[test]
    fn test_absorb_counts_and_tracks_current() {
        let (tx, rx) = progress_channel();
        let mut state = ProgressState::new(3);

        tx.started("alpha");
        tx.finished();
        tx.started("beta");
        state.absorb(&rx);

        assert_eq!(state.completed, 1);
        assert_eq!(state.current_package, "beta");
        assert!(!state.is_complete());
    }

    #[test]
    fn test_completion_is_monotone_and_clamped() {
        let (tx, rx) = progress_channel();
        let mut state = ProgressState::new(2);

        for _ in 0..5 {
            tx.finished();
        }
        state.absorb(&rx);
        assert_eq!(state.completed, 2);
        assert!(state.is_complete());
        assert_eq!(state.ratio(), 1.0);
    }

    #[test]
    fn test_zero_total_is_complete() {
        let state = ProgressState::new(0);
        assert!(state.is_complete());
        assert_eq!(state.ratio(), 1.0);
    }

    #[test]
    fn test_headless_run_completes() {
        let (tx, rx) = progress_channel();
        tx.finished();
        tx.finished();
        assert!(run_headless(2, &rx, &CancellationToken::new()));
    }

    #[test]
    fn test_headless_run_observes_cancel() {
        let (_tx, rx) = progress_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!run_headless(5, &rx, &cancel));
    }
}
