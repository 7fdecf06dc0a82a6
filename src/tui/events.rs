use crate::core::{Section, VisualResult};
use crate::error::Result;
use crossterm::event::{self, Event, KeyEvent, KeyEventKind, MouseEvent};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Tick,
}

/// Results of background requests, delivered to the UI loop over mpsc.
/// `session` is the generation of the chat that issued the request.
#[derive(Debug)]
pub enum BackendEvent {
    Sections {
        session: u64,
        video_id: String,
        result: Result<Vec<Section>>,
    },
    Answer {
        session: u64,
        video_id: String,
        question: String,
        result: Result<String>,
    },
    Visual {
        session: u64,
        video_id: String,
        query: String,
        result: Result<Option<VisualResult>>,
    },
}

pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        Self { tick_rate }
    }

    pub fn next_event(&self) -> Result<AppEvent> {
        if event::poll(self.tick_rate)? {
            match event::read()? {
                // Windows reports releases too
                Event::Key(key) if key.kind == KeyEventKind::Press => Ok(AppEvent::Key(key)),
                Event::Mouse(mouse) => Ok(AppEvent::Mouse(mouse)),
                _ => Ok(AppEvent::Tick),
            }
        } else {
            Ok(AppEvent::Tick)
        }
    }
}
