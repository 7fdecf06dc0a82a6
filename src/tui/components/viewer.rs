use crate::core::QA;
use crate::core::annotate::{Emphasis, Fragment, Stamp};
use crossterm::event::{KeyCode, KeyEvent, MouseEvent, MouseEventKind};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

/// Scrollable chat transcript. Timestamps of the latest answer can be
/// selected with the arrow keys.
pub struct ChatView {
    pub scroll: usize,
    pub selected_stamp: Option<usize>,
    follow: bool,
    rows: usize,
    height: usize,
}

impl ChatView {
    pub fn new() -> Self {
        Self {
            scroll: 0,
            selected_stamp: None,
            follow: true,
            rows: 0,
            height: 0,
        }
    }

    /// Jump to the bottom and select the first stamp of the new answer.
    pub fn on_new_answer(&mut self, stamp_count: usize) {
        self.follow = true;
        self.selected_stamp = (stamp_count > 0).then_some(0);
    }

    pub fn handle_key(&mut self, key: KeyEvent, stamp_count: usize) -> bool {
        let page = self.height.max(1);
        let max_scroll = self.rows.saturating_sub(self.height);
        match key.code {
            KeyCode::Left | KeyCode::Right if stamp_count > 0 => {
                let current = self.selected_stamp.unwrap_or(0).min(stamp_count - 1);
                self.selected_stamp = Some(match key.code {
                    KeyCode::Left if current == 0 => stamp_count - 1,
                    KeyCode::Left => current - 1,
                    _ => (current + 1) % stamp_count,
                });
                true
            }
            KeyCode::Up => {
                self.follow = false;
                self.scroll = self.scroll.saturating_sub(1);
                true
            }
            KeyCode::Down => {
                self.scroll = (self.scroll + 1).min(max_scroll);
                self.follow = self.scroll == max_scroll;
                true
            }
            KeyCode::PageUp => {
                self.follow = false;
                self.scroll = self.scroll.saturating_sub(page);
                true
            }
            KeyCode::PageDown => {
                self.scroll = (self.scroll + page).min(max_scroll);
                self.follow = self.scroll == max_scroll;
                true
            }
            KeyCode::Home => {
                self.follow = false;
                self.scroll = 0;
                true
            }
            KeyCode::End => {
                self.follow = true;
                self.scroll = max_scroll;
                true
            }
            _ => false,
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) -> bool {
        let code = match mouse.kind {
            MouseEventKind::ScrollUp => KeyCode::Up,
            MouseEventKind::ScrollDown => KeyCode::Down,
            _ => return false,
        };
        self.handle_key(KeyEvent::from(code), 0)
    }

    pub fn render(
        &mut self,
        f: &mut Frame,
        area: Rect,
        history: &[QA],
        pending_question: Option<&str>,
        focused: bool,
    ) {
        let lines = chat_lines(history, pending_question, self.selected_stamp);
        let inner_width = area.width.saturating_sub(2).max(1) as usize;

        self.height = area.height.saturating_sub(2) as usize;
        self.rows = lines
            .iter()
            .map(|line| wrapped_rows(line, inner_width))
            .sum();
        let max_scroll = self.rows.saturating_sub(self.height);
        if self.follow {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }

        let border = if focused { Color::Yellow } else { Color::Gray };
        let title = if focused && self.selected_stamp.is_some() {
            "Chat  [←→] timestamp  [Enter] seek"
        } else {
            "Chat"
        };

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(Style::default().fg(border)),
            )
            .wrap(Wrap { trim: false })
            .scroll((self.scroll.min(u16::MAX as usize) as u16, 0));

        f.render_widget(paragraph, area);
    }
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new()
    }
}

/// Lines for the whole conversation. `selected` indexes the stamps of the
/// last answer.
pub fn chat_lines(
    history: &[QA],
    pending_question: Option<&str>,
    selected: Option<usize>,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let question_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);

    if history.is_empty() && pending_question.is_none() {
        lines.push(Line::from(Span::styled(
            "Ask anything about this video.",
            Style::default().fg(Color::DarkGray),
        )));
    }

    for (i, qa) in history.iter().enumerate() {
        if i > 0 {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            format!("You: {}", qa.question),
            question_style,
        )));
        let selected = if i + 1 == history.len() { selected } else { None };
        lines.extend(answer_lines(qa.fragments(), selected));
    }

    if let Some(question) = pending_question {
        if !history.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(
            format!("You: {question}"),
            question_style,
        )));
        lines.push(Line::from(Span::styled(
            "Thinking…",
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines
}

fn answer_lines(fragments: &[Fragment], selected: Option<usize>) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut stamp_index = 0;

    let mut stamp_span = |stamp: &Stamp, emphasis: Emphasis| {
        let mut style = text_style(emphasis)
            .fg(Color::Yellow)
            .add_modifier(Modifier::UNDERLINED);
        if selected == Some(stamp_index) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        stamp_index += 1;
        Span::styled(stamp.label.clone(), style)
    };

    for fragment in fragments {
        match fragment {
            Fragment::Text { text, emphasis } => {
                spans.push(Span::styled(text.clone(), text_style(*emphasis)));
            }
            Fragment::Timestamp { stamp, emphasis } => spans.push(stamp_span(stamp, *emphasis)),
            Fragment::Range {
                start,
                separator,
                end,
                emphasis,
            } => {
                spans.push(stamp_span(start, *emphasis));
                spans.push(Span::styled(separator.clone(), text_style(*emphasis)));
                spans.push(stamp_span(end, *emphasis));
            }
            Fragment::LineBreak => lines.push(Line::from(std::mem::take(&mut spans))),
        }
    }

    if !spans.is_empty() || lines.is_empty() {
        lines.push(Line::from(spans));
    }
    lines
}

// Word wrapping can take more rows than the raw width suggests.
fn wrapped_rows(line: &Line<'_>, width: usize) -> usize {
    let text: String = line.spans.iter().map(|span| &*span.content).collect();
    textwrap::wrap(&text, width.max(1)).len().max(1)
}

fn text_style(emphasis: Emphasis) -> Style {
    let mut style = Style::default();
    if emphasis.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if emphasis.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    style
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qa(question: &str, answer: &str) -> QA {
        QA::new(question.to_string(), answer.to_string())
    }

    fn plain(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.to_string()).collect()
    }

    #[test]
    fn renders_question_and_answer_lines() {
        let history = vec![qa("When?", "At 02:15\nand **later** 1:00:00")];
        let lines = chat_lines(&history, None, Some(1));
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(text, vec!["You: When?", "At 02:15", "and later 1:00:00"]);

        let selected = lines[2]
            .spans
            .iter()
            .find(|s| s.content == "1:00:00")
            .expect("stamp span");
        assert!(selected.style.add_modifier.contains(Modifier::REVERSED));
    }

    #[test]
    fn pending_question_is_shown() {
        let lines = chat_lines(&[], Some("Why?"), None);
        let text: Vec<String> = lines.iter().map(plain).collect();
        assert_eq!(text, vec!["You: Why?", "Thinking…"]);
    }

    #[test]
    fn counts_rows_after_word_wrap() {
        let line = Line::from("aa bbbbb cc ddddd");
        assert_eq!(wrapped_rows(&line, 6), 4);
        assert_eq!(wrapped_rows(&Line::default(), 6), 1);
    }

    #[test]
    fn arrows_cycle_through_stamps() {
        let mut view = ChatView::new();
        view.on_new_answer(3);
        assert_eq!(view.selected_stamp, Some(0));
        view.handle_key(KeyEvent::from(KeyCode::Left), 3);
        assert_eq!(view.selected_stamp, Some(2));
        view.handle_key(KeyEvent::from(KeyCode::Right), 3);
        assert_eq!(view.selected_stamp, Some(0));

        view.on_new_answer(0);
        assert_eq!(view.selected_stamp, None);
    }
}
