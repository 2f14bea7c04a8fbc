//! Terminal user interface: resolution progress and update selection.
//!
//! State structs are separated from rendering so transitions can be unit
//! tested without a terminal.

pub mod progress;
pub mod selector;

use std::io::{self, Stdout};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

/// A raw-mode alternate-screen terminal that restores the user's screen
/// when dropped, including on unwind.
pub struct TerminalGuard {
    pub terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Formats a weight delta relative to the installed version: an arrow
/// glyph plus the absolute difference in KB.
pub fn format_weight_delta(candidate: u64, current: u64) -> String {
    let delta_kb = candidate.abs_diff(current) / 1024;
    if candidate > current {
        format!("↑ {delta_kb}KB")
    } else if candidate < current {
        format!("↓ {delta_kb}KB")
    } else {
        "0KB".to_string()
    }
}
