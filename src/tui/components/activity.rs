use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

/// Rolling log of request activity, newest last.
pub struct ActivityLog {
    pub entries: Vec<(Level, String)>,
    pub max_entries: usize,
    tick: usize,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            max_entries: 50,
            tick: 0,
        }
    }

    pub fn info(&mut self, message: impl AsRef<str>) {
        self.push(Level::Info, message.as_ref());
    }

    pub fn error(&mut self, message: impl AsRef<str>) {
        self.push(Level::Error, message.as_ref());
    }

    fn push(&mut self, level: Level, message: &str) {
        let timestamp = chrono::Local::now().format("%H:%M:%S");
        self.entries.push((level, format!("[{timestamp}] {message}")));

        if self.entries.len() > self.max_entries {
            self.entries.remove(0);
        }
    }

    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `pending` lists requests still in flight; they get a spinner line.
    pub fn render(&self, f: &mut Frame, area: Rect, pending: &[&str]) {
        let visible = area.height.saturating_sub(2) as usize;
        let spinner = SPINNER[self.tick % SPINNER.len()];

        let mut lines: Vec<Line> = pending
            .iter()
            .map(|label| {
                Line::from(Span::styled(
                    format!("{spinner} {label}…"),
                    Style::default().fg(Color::Yellow),
                ))
            })
            .collect();

        let room = visible.saturating_sub(lines.len());
        let skip = self.entries.len().saturating_sub(room);
        lines.extend(self.entries.iter().skip(skip).map(|(level, text)| {
            let color = match level {
                Level::Info => Color::Gray,
                Level::Error => Color::Red,
            };
            Line::from(Span::styled(text.as_str(), Style::default().fg(color)))
        }));

        let paragraph =
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Activity"));
        f.render_widget(paragraph, area);
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}
