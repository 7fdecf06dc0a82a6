use crate::core::timestamp::{format_timestamp, seconds_from_f64};
use crate::tui::app::{App, AppState, ChatFocus};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

pub fn draw(f: &mut Frame, app: &mut App) {
    match &app.state {
        AppState::Home => draw_home(f, app),
        AppState::Chat => draw_chat(f, app),
        AppState::InvalidUrl { input } => draw_invalid_url(f, input),
    }

    if let Some(message) = &app.alert {
        draw_alert(f, message);
    }
}

fn title_bar(text: &str) -> Paragraph<'_> {
    Paragraph::new(text)
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL))
}

fn help_bar(text: &str) -> Paragraph<'_> {
    Paragraph::new(text)
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL))
}

fn draw_home(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // URL input
            Constraint::Length(3), // Key input
            Constraint::Min(1),    // Notes
            Constraint::Length(3), // Help
        ])
        .split(f.area());

    f.render_widget(title_bar("vidchat"), chunks[0]);
    app.url_input.render(f, chunks[1]);
    app.key_input.render(f, chunks[2]);

    let notes = Paragraph::new(vec![
        Line::from("Paste a YouTube link and your Gemini API key."),
        Line::from(format!(
            "The key is kept in {} for next time.",
            app.store.storage_path().display()
        )),
        Line::from(format!("Backend: {}", app.backend.base_url())),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(notes, chunks[3]);

    f.render_widget(
        help_bar("[Tab] Next field  [Enter] Continue  [Esc] Quit"),
        chunks[4],
    );
}

fn draw_invalid_url(f: &mut Frame, input: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(f.area());

    f.render_widget(title_bar("Invalid URL"), chunks[0]);

    let body = Paragraph::new(vec![
        Line::from(Span::styled(
            "That does not look like a YouTube video link.",
            Style::default().fg(Color::Red),
        )),
        Line::default(),
        Line::from(input.to_string()),
    ])
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(body, chunks[1]);

    f.render_widget(help_bar("[Enter/Esc] Back"), chunks[2]);
}

fn draw_chat(f: &mut Frame, app: &mut App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(3)])
        .split(f.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(42), Constraint::Percentage(58)])
        .split(rows[0]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // Player
            Constraint::Min(4),    // Sections
            Constraint::Length(3), // Visual search input
            Constraint::Length(4), // Visual result
        ])
        .split(columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Chat
            Constraint::Length(3), // Question input
            Constraint::Length(6), // Activity
        ])
        .split(columns[1]);

    let position = app.session.as_ref().map(|s| s.position).unwrap_or(0);
    let sections = app
        .session
        .as_ref()
        .map(|s| s.sections.as_slice())
        .unwrap_or_default();

    draw_player(f, app, left[0]);
    let sections_title = if app.loading_sections {
        "Sections (loading…)"
    } else {
        "Sections"
    };
    app.section_list.render(
        f,
        left[1],
        sections,
        sections_title,
        app.focus == ChatFocus::Sections,
        position,
    );
    app.visual_input.render(f, left[2]);
    draw_visual_result(f, app, left[3]);

    let history = app
        .session
        .as_ref()
        .map(|s| s.history.as_slice())
        .unwrap_or_default();
    app.chat_view.render(
        f,
        right[0],
        history,
        app.pending_question.as_deref(),
        app.focus == ChatFocus::Conversation,
    );
    app.question_input.render(f, right[1]);
    app.activity.render(f, right[2], &app.pending_labels());

    f.render_widget(
        help_bar("[Tab] Focus  [Enter] Send/Seek  [↑↓] Move  [Ctrl+S] Save chat  [Esc] Home"),
        rows[1],
    );
}

fn draw_player(f: &mut Frame, app: &App, area: Rect) {
    let Some(session) = &app.session else {
        return;
    };

    let label = Style::default().fg(Color::Gray);
    let lines = vec![
        Line::from(vec![
            Span::styled("Video    ", label),
            Span::raw(session.video.id.as_str()),
        ]),
        Line::from(vec![
            Span::styled("Position ", label),
            Span::styled(
                format_timestamp(session.position),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Watch    ", label),
            Span::raw(session.watch_url()),
        ]),
        Line::from(vec![
            Span::styled("Embed    ", label),
            Span::raw(session.embed_url()),
        ]),
    ];

    let player = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Player"))
        .wrap(Wrap { trim: false });
    f.render_widget(player, area);
}

fn draw_visual_result(f: &mut Frame, app: &App, area: Rect) {
    let line = match app.session.as_ref() {
        Some(session) => match (&session.visual, session.visual_missed) {
            (Some(result), _) => {
                let mut spans = vec![
                    Span::styled(
                        format_timestamp(seconds_from_f64(result.timestamp)),
                        Style::default()
                            .fg(Color::Yellow)
                            .add_modifier(Modifier::UNDERLINED),
                    ),
                    Span::raw(" "),
                    Span::raw(result.description.clone()),
                ];
                if let Some(score) = result.score {
                    spans.push(Span::styled(
                        format!(" ({score:.2})"),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                Line::from(spans)
            }
            (None, true) => Line::from(Span::styled(
                "No matching frame",
                Style::default().fg(Color::DarkGray),
            )),
            (None, false) => Line::from(Span::styled(
                "Describe a scene to jump to it",
                Style::default().fg(Color::DarkGray),
            )),
        },
        None => Line::default(),
    };

    let result = Paragraph::new(line)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Best match"));
    f.render_widget(result, area);
}

fn draw_alert(f: &mut Frame, message: &str) {
    let area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, area);

    let mut lines: Vec<Line> = message.lines().map(|l| Line::from(l.to_string())).collect();
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "[Enter] OK",
        Style::default().fg(Color::Gray),
    )));

    let popup = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Error")
                .border_style(Style::default().fg(Color::Red)),
        );
    f.render_widget(popup, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
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
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Config, KeyStore};
    use ratatui::{Terminal, backend::TestBackend};
    use std::time::Duration;

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect::<String>()
    }

    #[tokio::test]
    async fn draws_home_and_alert() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            backend_url: "http://127.0.0.1:9".to_string(),
            api_key: None,
            data_dir: dir.path().to_path_buf(),
            timeout: Duration::from_millis(200),
        };
        let store = KeyStore::open(dir.path()).expect("store");
        let mut app = App::new(&config, store).expect("app");
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("terminal");

        terminal.draw(|f| draw(f, &mut app)).expect("draw");
        assert!(screen_text(&terminal).contains("YouTube URL"));

        app.alert = Some("Something broke".to_string());
        terminal.draw(|f| draw(f, &mut app)).expect("draw");
        assert!(screen_text(&terminal).contains("Something broke"));
    }

    #[tokio::test]
    async fn draws_chat_screen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            backend_url: "http://127.0.0.1:9".to_string(),
            api_key: Some("k".to_string()),
            data_dir: dir.path().to_path_buf(),
            timeout: Duration::from_millis(200),
        };
        let store = KeyStore::open(dir.path()).expect("store");
        let mut app = App::new(&config, store).expect("app");
        app.open_initial("dQw4w9WgXcQ");

        let mut terminal = Terminal::new(TestBackend::new(120, 40)).expect("terminal");
        terminal.draw(|f| draw(f, &mut app)).expect("draw");
        let text = screen_text(&terminal);
        assert!(text.contains("Player"));
        assert!(text.contains("dQw4w9WgXcQ"));
        assert!(text.contains("Loading sections"));
    }
}
