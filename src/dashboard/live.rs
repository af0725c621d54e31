//! Full-screen live dashboard
//!
//! Frames are composed into a back buffer and compared line by line with
//! what is already on screen; only differing rows are rewritten. The last
//! row is a fixed footer, everything above it scrolls.

use crate::dashboard::viewport::{ScrollCommand, Viewport};
use crate::dashboard::{DashboardSink, Signal};
use crate::progress::format_view;
use crate::status::DashboardView;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Stdout, Write};
use std::time::Duration;

const FOOTER: &str = "↑/↓ j/k line  PgUp/PgDn page  Home/End top/bottom  q stop";

/// Keyboard request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Scroll(ScrollCommand),
    Quit,
}

/// Map a key press to a dashboard action
pub fn map_key(key: &KeyEvent) -> Option<KeyAction> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(KeyAction::Quit);
    }

    let action = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Up | KeyCode::Char('k') => KeyAction::Scroll(ScrollCommand::LineUp),
        KeyCode::Down | KeyCode::Char('j') => KeyAction::Scroll(ScrollCommand::LineDown),
        KeyCode::PageUp | KeyCode::Char('b') => KeyAction::Scroll(ScrollCommand::PageUp),
        KeyCode::PageDown | KeyCode::Char(' ') => KeyAction::Scroll(ScrollCommand::PageDown),
        KeyCode::Home | KeyCode::Char('g') => KeyAction::Scroll(ScrollCommand::Top),
        KeyCode::End | KeyCode::Char('G') => KeyAction::Scroll(ScrollCommand::Bottom),
        _ => return None,
    };
    Some(action)
}

/// Screen rows that must be rewritten to turn `front` into `back`
pub fn changed_rows(front: &[String], back: &[String]) -> Vec<usize> {
    (0..back.len().max(front.len()))
        .filter(|&i| front.get(i) != back.get(i))
        .collect()
}

/// Alternate-screen dashboard with keyboard scrolling
pub struct LiveSink {
    out: Stdout,
    viewport: Viewport,
    /// Lines currently on screen
    front: Vec<String>,
    /// Last composed content, for scrolling between frames
    content: Vec<String>,
    size: (u16, u16),
    active: bool,
}

impl LiveSink {
    /// Take over the terminal
    pub fn new() -> io::Result<Self> {
        let size = terminal::size()?;
        enable_raw_mode()?;
        let mut out = io::stdout();
        if let Err(e) = execute!(out, EnterAlternateScreen, Hide, Clear(ClearType::All)) {
            let _ = disable_raw_mode();
            return Err(e);
        }

        Ok(Self {
            out,
            viewport: Viewport::new(size.1.saturating_sub(1) as usize),
            front: Vec::new(),
            content: Vec::new(),
            size,
            active: true,
        })
    }

    /// Compose the back buffer and write the rows that differ
    fn draw(&mut self) -> io::Result<()> {
        let size = terminal::size()?;
        if size != self.size {
            self.size = size;
            self.viewport.set_height(size.1.saturating_sub(1) as usize);
            self.front.clear();
            queue!(self.out, Clear(ClearType::All))?;
        }

        let width = size.0 as usize;
        let height = self.viewport.height();
        let mut back: Vec<String> = self
            .viewport
            .visible(&self.content)
            .iter()
            .map(|line| console::truncate_str(line, width, "…").into_owned())
            .collect();
        back.resize(height, String::new());
        let footer = format!("{}  [{}]", FOOTER, self.viewport.position(self.content.len()));
        back.push(console::style(console::truncate_str(&footer, width, "…")).reverse().to_string());

        for row in changed_rows(&self.front, &back) {
            queue!(self.out, MoveTo(0, row as u16), Clear(ClearType::CurrentLine))?;
            if let Some(line) = back.get(row) {
                queue!(self.out, Print(line))?;
            }
        }
        self.out.flush()?;
        self.front = back;
        Ok(())
    }

    fn restore(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(self.out, Show, LeaveAlternateScreen)?;
        disable_raw_mode()
    }
}

impl DashboardSink for LiveSink {
    fn render(&mut self, view: &DashboardView) -> io::Result<()> {
        self.content = format_view(view);
        self.draw()
    }

    fn poll_input(&mut self) -> io::Result<Signal> {
        let mut signal = Signal::Continue;
        let mut redraw = false;

        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match map_key(&key) {
                    Some(KeyAction::Quit) => signal = Signal::StopRequested,
                    Some(KeyAction::Scroll(cmd)) => {
                        self.viewport.scroll(cmd, self.content.len());
                        redraw = true;
                    }
                    None => {}
                },
                Event::Resize(..) => redraw = true,
                _ => {}
            }
        }

        if redraw {
            self.draw()?;
        }
        Ok(signal)
    }

    fn finish(&mut self, view: &DashboardView) -> io::Result<()> {
        self.render(view)?;
        self.restore()
    }
}

impl Drop for LiveSink {
    fn drop(&mut self) {
        let _ = self.restore();
    }
}
