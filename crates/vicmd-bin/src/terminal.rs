//! Interactive front end on crossterm.

use std::io::{Write, stdout};
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::{Print, Stylize},
    terminal::{
        self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
        disable_raw_mode, enable_raw_mode,
    },
};
use tracing::{debug, info};

use crate::app::App;
use crate::bindings::{BACKSPACE, ENTER, ESC, TAB};
use crate::host::Mode;

/// RAII guard restoring the terminal even if the loop early-returns or panics.
pub struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    pub fn enter(title: &str) -> Result<Self> {
        enable_raw_mode()?;
        execute!(stdout(), EnterAlternateScreen, Hide, SetTitle(title))?;
        Ok(Self { active: true })
    }

    pub fn leave(&mut self) -> Result<()> {
        if self.active {
            execute!(stdout(), LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.active = false;
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

/// The key a dispatcher sees for a terminal key press.
pub fn key_char(key: &KeyEvent) -> Option<char> {
    match key.code {
        KeyCode::Char(ch) => Some(ch),
        KeyCode::Enter => Some(ENTER),
        KeyCode::Esc => Some(ESC),
        KeyCode::Tab => Some(TAB),
        KeyCode::Backspace => Some(BACKSPACE),
        _ => None,
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('c')) && key.modifiers.contains(KeyModifiers::CONTROL)
}

pub fn run(app: &mut App) -> Result<()> {
    let mut guard = TerminalGuard::enter("vicmd")?;
    info!(target: "runtime", "interactive_start");
    let mut wait: Option<Duration> = None;
    render(app)?;
    while !app.host.quit {
        // A pending chord only waits as long as its timeout allows.
        if let Some(limit) = wait
            && !event::poll(limit)?
        {
            app.flush_timeout();
            wait = None;
            render(app)?;
            continue;
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if is_ctrl_c(&key) {
                    info!(target: "runtime", reason = "ctrl_c", "shutdown");
                    break;
                }
                let Some(ch) = key_char(&key) else {
                    continue;
                };
                let outcome = app.feed_key(ch);
                wait = app.wait_for(outcome);
            }
            Event::Resize(width, height) => {
                debug!(target: "runtime", width, height, "resize");
            }
            _ => continue,
        }
        render(app)?;
    }
    guard.leave()?;
    info!(target: "runtime", "interactive_end");
    Ok(())
}

fn render(app: &mut App) -> Result<()> {
    let (width, height) = terminal::size()?;
    let list_rows = usize::from(height.saturating_sub(1));
    let host = &app.host;
    let mut out = stdout();
    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;

    // Keep the cursor on screen; listing output takes over the list area.
    let lines: Vec<String> = if host.output.is_empty() {
        let first = host.cursor.saturating_sub(list_rows.saturating_sub(1));
        host.items
            .iter()
            .enumerate()
            .skip(first)
            .take(list_rows)
            .map(|(idx, item)| {
                let selected = host
                    .selection
                    .or_else(|| host.visual_range())
                    .is_some_and(|(begin, end)| (begin..=end).contains(&idx));
                let marker = if idx == host.cursor { '>' } else { ' ' };
                let sel = if selected { '*' } else { ' ' };
                format!("{marker}{sel}{item}")
            })
            .collect()
    } else {
        host.output.iter().take(list_rows).cloned().collect()
    };
    for (row, line) in lines.iter().enumerate() {
        let row = u16::try_from(row).unwrap_or(u16::MAX);
        let text: String = line.chars().take(usize::from(width)).collect();
        if line.starts_with('>') {
            queue!(out, MoveTo(0, row), Print(text.reverse()))?;
        } else {
            queue!(out, MoveTo(0, row), Print(text))?;
        }
    }

    let status = match host.mode {
        Mode::Cmdline => format!(":{}", host.cmdline),
        mode if host.status.is_empty() => {
            format!("-- {} -- {}", mode.label(), app.pending_keys())
        }
        _ => host.status.clone(),
    };
    let status: String = status.chars().take(usize::from(width)).collect();
    queue!(out, MoveTo(0, height.saturating_sub(1)), Print(status))?;
    out.flush()?;
    app.host.output.clear();
    Ok(())
}
