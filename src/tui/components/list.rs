use crate::core::Section;
use crate::core::timestamp::{normalize_timestamp, parse_timestamp};
use crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState},
};

/// Selection state for the sections pane. The sections themselves live in
/// the chat session and are passed in at render time.
pub struct SectionList {
    pub state: ListState,
    len: usize,
    viewport_size: usize,
}

impl SectionList {
    pub fn new(len: usize) -> Self {
        let mut state = ListState::default();
        if len > 0 {
            state.select(Some(0));
        }

        Self {
            state,
            len,
            viewport_size: 0,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Up => {
                self.previous();
                true
            }
            KeyCode::Down => {
                self.next();
                true
            }
            KeyCode::PageDown => {
                self.page_down();
                true
            }
            KeyCode::PageUp => {
                self.page_up();
                true
            }
            KeyCode::Home => {
                self.select(0);
                true
            }
            KeyCode::End => {
                self.select(self.len.saturating_sub(1));
                true
            }
            _ => false,
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> bool {
        match mouse.kind {
            MouseEventKind::ScrollUp => {
                let current = self.state.selected().unwrap_or(0);
                self.select(current.saturating_sub(1));
                true
            }
            MouseEventKind::ScrollDown => {
                let current = self.state.selected().unwrap_or(0);
                self.select(current + 1);
                true
            }
            _ => false,
        }
    }

    pub fn next(&mut self) {
        if self.len == 0 {
            return;
        }

        let i = match self.state.selected() {
            Some(i) => (i + 1) % self.len,
            None => 0,
        };
        self.select(i);
    }

    pub fn previous(&mut self) {
        if self.len == 0 {
            return;
        }

        let i = match self.state.selected() {
            Some(0) | None => self.len - 1,
            Some(i) => i - 1,
        };
        self.select(i);
    }

    fn page_down(&mut self) {
        let step = self.viewport_size.max(1);
        let current = self.state.selected().unwrap_or(0);
        self.select(current + step);
    }

    fn page_up(&mut self) {
        let step = self.viewport_size.max(1);
        let current = self.state.selected().unwrap_or(0);
        self.select(current.saturating_sub(step));
    }

    fn select(&mut self, index: usize) {
        if self.len == 0 {
            return;
        }
        self.state.select(Some(index.min(self.len - 1)));
        self.adjust_offset();
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.state.selected().filter(|&i| i < self.len)
    }

    /// Start over with `len` sections, selecting the first.
    pub fn reset(&mut self, len: usize) {
        self.len = len;
        if len == 0 {
            self.state.select(None);
        } else {
            self.state.select(Some(0));
        }
        *self.state.offset_mut() = 0;
    }

    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        sections: &[Section],
        title: &str,
        focused: bool,
        position: u32,
    ) {
        if sections.len() != self.len {
            self.reset(sections.len());
        }
        self.viewport_size = area.height.saturating_sub(2).max(1) as usize;
        self.adjust_offset();
        let playing = playing_index(sections, position);

        let items: Vec<ListItem> = sections
            .iter()
            .enumerate()
            .map(|(i, section)| {
                if let Some(error) = &section.error {
                    return ListItem::new(Line::from(Span::styled(
                        format!("⚠ {error}"),
                        Style::default().fg(Color::Red),
                    )));
                }

                let start = normalize_timestamp(&section.start)
                    .unwrap_or_else(|| section.start.clone());
                let end =
                    normalize_timestamp(&section.end).unwrap_or_else(|| section.end.clone());
                let marker = if playing == Some(i) { "▶ " } else { "  " };

                ListItem::new(Line::from(vec![
                    Span::styled(marker, Style::default().fg(Color::Green)),
                    Span::styled(
                        format!("{start} - {end}"),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::raw(" "),
                    Span::styled(section.summary.as_str(), Style::default().fg(Color::White)),
                ]))
            })
            .collect();

        let border = if focused { Color::Yellow } else { Color::Gray };
        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(Style::default().fg(border)),
            )
            .highlight_style(
                Style::default()
                    .bg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            );

        f.render_stateful_widget(list, area, &mut self.state);
    }

    fn adjust_offset(&mut self) {
        if self.len == 0 {
            *self.state.offset_mut() = 0;
            return;
        }

        let viewport = self.viewport_size.max(1);
        let max_index = self.len - 1;
        let selected = self
            .state
            .selected()
            .map(|idx| idx.min(max_index))
            .unwrap_or(0);
        self.state.select(Some(selected));

        let max_offset = self.len.saturating_sub(viewport);
        let offset = self.state.offset().min(max_offset);
        *self.state.offset_mut() = offset;

        if selected < offset {
            *self.state.offset_mut() = selected;
        } else if selected >= offset + viewport {
            *self.state.offset_mut() = selected + 1 - viewport;
        }
    }
}

/// Index of the section whose range holds `position`.
pub fn playing_index(sections: &[Section], position: u32) -> Option<usize> {
    sections.iter().position(|section| {
        match (
            parse_timestamp(&section.start),
            parse_timestamp(&section.end),
        ) {
            (Some(start), Some(end)) => start <= position && position < end,
            _ => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(start: &str, end: &str) -> Section {
        Section {
            start: start.into(),
            end: end.into(),
            summary: "s".into(),
            ..Section::default()
        }
    }

    #[test]
    fn navigation_wraps_around() {
        let mut list = SectionList::new(2);
        assert_eq!(list.selected_index(), Some(0));
        list.previous();
        assert_eq!(list.selected_index(), Some(1));
        list.next();
        assert_eq!(list.selected_index(), Some(0));
    }

    #[test]
    fn empty_list_has_no_selection() {
        let mut list = SectionList::new(0);
        list.next();
        assert_eq!(list.selected_index(), None);
        list.reset(1);
        assert_eq!(list.selected_index(), Some(0));
    }

    #[test]
    fn finds_playing_section() {
        let sections = vec![section("00:00", "01:18"), section("01:18", "03:33")];
        assert_eq!(playing_index(&sections, 0), Some(0));
        assert_eq!(playing_index(&sections, 78), Some(1));
        assert_eq!(playing_index(&sections, 500), None);
    }
}
