use crate::core::annotate;
use crate::core::timestamp::{format_timestamp, seconds_from_f64};
use crate::core::{BackendClient, ChatSession, Config, KeyStore, VideoRef};
use crate::error::{Error, Result};
use crate::tui::components::{ActivityLog, ChatView, InputField, SectionList};
use crate::tui::events::{AppEvent, BackendEvent};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Home,
    Chat,
    InvalidUrl { input: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFocus {
    Question,
    Visual,
    Sections,
    Conversation,
}

impl ChatFocus {
    const ORDER: [ChatFocus; 4] = [
        ChatFocus::Question,
        ChatFocus::Visual,
        ChatFocus::Sections,
        ChatFocus::Conversation,
    ];

    fn step(self, forward: bool) -> Self {
        let len = Self::ORDER.len();
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        let next = if forward { (i + 1) % len } else { (i + len - 1) % len };
        Self::ORDER[next]
    }
}

struct RequestOrigin {
    session: u64,
    video_id: String,
}

pub struct App {
    pub state: AppState,
    pub should_quit: bool,

    // Home screen
    pub url_input: InputField,
    pub key_input: InputField,
    pub home_focus: usize,

    // Chat screen
    pub session: Option<ChatSession>,
    pub question_input: InputField,
    pub visual_input: InputField,
    pub section_list: SectionList,
    pub chat_view: ChatView,
    pub focus: ChatFocus,
    pub loading_sections: bool,
    pub pending_question: Option<String>,
    pub pending_search: Option<String>,
    pub activity: ActivityLog,
    // Bumped on every chat open; results from older chats are dropped.
    pub generation: u64,

    // Blocking message shown over any screen
    pub alert: Option<String>,

    // Services
    pub backend: BackendClient,
    pub store: KeyStore,
    pub api_key: Option<String>,

    // Async communication
    backend_tx: mpsc::UnboundedSender<BackendEvent>,
    backend_rx: mpsc::UnboundedReceiver<BackendEvent>,
}

impl App {
    pub fn new(config: &Config, store: KeyStore) -> Result<Self> {
        let backend = BackendClient::new(&config.backend_url, config.timeout)?;
        let api_key = config.resolve_api_key(&store)?;
        let (backend_tx, backend_rx) = mpsc::unbounded_channel();

        let mut url_input = InputField::new("YouTube URL", "https://www.youtube.com/watch?v=...");
        url_input.focused = true;
        let mut key_input = InputField::new("Gemini API key", "Paste your API key").masked();
        if let Some(key) = &api_key {
            key_input.set_value(key);
        }

        Ok(Self {
            state: AppState::Home,
            should_quit: false,

            url_input,
            key_input,
            home_focus: 0,

            session: None,
            question_input: InputField::new("Ask a question", "What is this video about?"),
            visual_input: InputField::new("Visual search", "e.g. a whiteboard diagram"),
            section_list: SectionList::new(0),
            chat_view: ChatView::new(),
            focus: ChatFocus::Question,
            loading_sections: false,
            pending_question: None,
            pending_search: None,
            activity: ActivityLog::new(),
            generation: 0,

            alert: None,

            backend,
            store,
            api_key,

            backend_tx,
            backend_rx,
        })
    }

    /// Entry point for `vidchat tui <URL>`: skip the form when a key is known.
    pub fn open_initial(&mut self, url: &str) {
        self.url_input.set_value(url);
        if self.api_key.is_some() {
            self.open_video(url);
        } else {
            self.set_home_focus(1);
        }
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Result<()> {
        match event {
            AppEvent::Key(key) => self.handle_key(key),
            AppEvent::Mouse(mouse) => {
                self.handle_mouse(mouse);
                Ok(())
            }
            AppEvent::Tick => {
                self.handle_tick();
                Ok(())
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Ok(());
        }

        if self.alert.is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                self.alert = None;
            }
            return Ok(());
        }

        match &self.state {
            AppState::Home => self.handle_home_key(key),
            AppState::Chat => self.handle_chat_key(key),
            AppState::InvalidUrl { .. } => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                    self.state = AppState::Home;
                }
                Ok(())
            }
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.state != AppState::Chat || self.alert.is_some() {
            return;
        }
        if self.focus == ChatFocus::Sections {
            self.section_list.handle_mouse(mouse);
        } else {
            self.chat_view.handle_mouse(mouse);
        }
    }

    fn handle_home_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                self.set_home_focus(1 - self.home_focus);
            }
            KeyCode::Enter => {
                if self.home_focus == 0 {
                    self.set_home_focus(1);
                } else {
                    self.submit_home();
                }
            }
            _ => {
                if self.home_focus == 0 {
                    self.url_input.handle_key(key);
                } else {
                    self.key_input.handle_key(key);
                }
            }
        }
        Ok(())
    }

    fn set_home_focus(&mut self, focus: usize) {
        self.home_focus = focus;
        self.url_input.focused = focus == 0;
        self.key_input.focused = focus == 1;
    }

    /// Both fields are required; an incomplete form is not submitted.
    pub fn submit_home(&mut self) {
        if !self.url_input.is_valid() || !self.key_input.is_valid() {
            return;
        }

        let key = self.key_input.value.trim().to_string();
        if let Err(e) = self.store.save_api_key(&key) {
            // The key still works for this run.
            warn!(error = %e, "could not persist API key");
        }
        self.api_key = Some(key);

        let url = self.url_input.value.clone();
        self.open_video(&url);
    }

    fn open_video(&mut self, url: &str) {
        match VideoRef::parse(url) {
            Some(video) => self.start_chat(video),
            None => {
                info!(input = url, "rejected video url");
                self.state = AppState::InvalidUrl {
                    input: url.trim().to_string(),
                };
            }
        }
    }

    fn start_chat(&mut self, video: VideoRef) {
        self.generation += 1;
        info!(video_id = %video.id, generation = self.generation, "opening chat");
        self.session = Some(ChatSession::new(video));
        self.question_input.clear();
        self.visual_input.clear();
        self.section_list.reset(0);
        self.chat_view = ChatView::new();
        self.loading_sections = false;
        self.pending_question = None;
        self.pending_search = None;
        self.activity.clear();
        self.set_focus(ChatFocus::Question);
        self.state = AppState::Chat;

        self.request_sections();
    }

    fn leave_chat(&mut self) {
        self.session = None;
        self.state = AppState::Home;
        self.set_home_focus(0);
    }

    fn set_focus(&mut self, focus: ChatFocus) {
        self.focus = focus;
        self.question_input.focused = focus == ChatFocus::Question;
        self.visual_input.focused = focus == ChatFocus::Visual;
    }

    fn handle_chat_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('s') {
            self.export_chat();
            return Ok(());
        }

        match key.code {
            KeyCode::Esc => self.leave_chat(),
            KeyCode::Tab => self.set_focus(self.focus.step(true)),
            KeyCode::BackTab => self.set_focus(self.focus.step(false)),
            KeyCode::Enter => match self.focus {
                ChatFocus::Question => self.submit_question(),
                ChatFocus::Visual => self.submit_visual(),
                ChatFocus::Sections => self.seek_selected_section(),
                ChatFocus::Conversation => self.seek_selected_stamp(),
            },
            _ => match self.focus {
                ChatFocus::Question => {
                    self.question_input.handle_key(key);
                }
                ChatFocus::Visual => {
                    self.visual_input.handle_key(key);
                }
                ChatFocus::Sections => {
                    self.section_list.handle_key(key);
                }
                ChatFocus::Conversation => {
                    let count = self.latest_stamp_count();
                    self.chat_view.handle_key(key, count);
                }
            },
        }
        Ok(())
    }

    fn latest_stamp_count(&self) -> usize {
        self.session
            .as_ref()
            .and_then(ChatSession::latest)
            .map(|qa| annotate::stamps(qa.fragments()).len())
            .unwrap_or(0)
    }

    /// Who issued a request plus its URL and key, or `None` when either is missing.
    fn request_context(&mut self) -> Option<(RequestOrigin, String, String)> {
        let session = self.session.as_ref()?;
        let origin = RequestOrigin {
            session: self.generation,
            video_id: session.video.id.clone(),
        };
        let video_url = session.video.watch_url();
        match self.api_key.clone() {
            Some(api_key) => Some((origin, video_url, api_key)),
            None => {
                self.fail("Cannot contact the backend", Error::custom("no API key set"));
                None
            }
        }
    }

    fn request_sections(&mut self) {
        if self.loading_sections {
            return;
        }
        let Some((origin, video_url, api_key)) = self.request_context() else {
            return;
        };
        self.loading_sections = true;
        self.activity.info("Requesting section summaries");

        let backend = self.backend.clone();
        let tx = self.backend_tx.clone();
        tokio::spawn(async move {
            let result = backend.fetch_sections(&video_url, &api_key).await;
            let _ = tx.send(BackendEvent::Sections {
                session: origin.session,
                video_id: origin.video_id,
                result,
            });
        });
    }

    fn submit_question(&mut self) {
        if self.pending_question.is_some() {
            self.activity.info("Still waiting for the previous answer");
            return;
        }
        if !self.question_input.is_valid() {
            return;
        }
        let Some((origin, video_url, api_key)) = self.request_context() else {
            return;
        };
        let question = self.question_input.take();
        self.pending_question = Some(question.clone());
        self.activity.info("Question sent");

        let backend = self.backend.clone();
        let tx = self.backend_tx.clone();
        tokio::spawn(async move {
            let result = backend.ask_question(&video_url, &question, &api_key).await;
            let _ = tx.send(BackendEvent::Answer {
                session: origin.session,
                video_id: origin.video_id,
                question,
                result,
            });
        });
    }

    fn submit_visual(&mut self) {
        if self.pending_search.is_some() {
            self.activity.info("A visual search is already running");
            return;
        }
        if !self.visual_input.is_valid() {
            return;
        }
        let Some((origin, video_url, api_key)) = self.request_context() else {
            return;
        };
        let query = self.visual_input.take();
        self.pending_search = Some(query.clone());
        self.activity.info(format!("Searching frames for \"{query}\""));

        let backend = self.backend.clone();
        let tx = self.backend_tx.clone();
        tokio::spawn(async move {
            let result = backend.visual_search(&video_url, &query, &api_key).await;
            let _ = tx.send(BackendEvent::Visual {
                session: origin.session,
                video_id: origin.video_id,
                query,
                result,
            });
        });
    }

    fn seek_selected_section(&mut self) {
        let Some(index) = self.section_list.selected_index() else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.seek_section(index) {
            Some(seconds) => self
                .activity
                .info(format!("Playing from {}", format_timestamp(seconds))),
            None => self.activity.info("That section has no usable start time"),
        }
    }

    fn seek_selected_stamp(&mut self) {
        let Some(selected) = self.chat_view.selected_stamp else {
            return;
        };
        let seconds = self
            .session
            .as_ref()
            .and_then(ChatSession::latest)
            .and_then(|qa| annotate::stamps(qa.fragments()).get(selected).map(|s| s.seconds));
        if let (Some(seconds), Some(session)) = (seconds, self.session.as_mut()) {
            session.seek(seconds);
            self.activity
                .info(format!("Playing from {}", format_timestamp(seconds)));
        }
    }

    fn export_chat(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        match self.store.save_chat(session) {
            Ok(path) => self
                .activity
                .info(format!("Chat saved to {}", path.display())),
            Err(e) => self.fail("Failed to save chat", e),
        }
    }

    fn handle_tick(&mut self) {
        self.activity.tick();

        let mut events = Vec::new();
        while let Ok(event) = self.backend_rx.try_recv() {
            events.push(event);
        }
        for event in events {
            self.handle_backend_event(event);
        }
    }

    pub fn handle_backend_event(&mut self, event: BackendEvent) {
        let current = self
            .session
            .as_ref()
            .map(|s| (self.generation, s.video.id.clone()));
        let for_current = |session: u64, video_id: &str| {
            current
                .as_ref()
                .is_some_and(|(generation, id)| *generation == session && id == video_id)
        };

        match event {
            BackendEvent::Sections {
                session,
                video_id,
                result,
            } if for_current(session, &video_id) => {
                self.loading_sections = false;
                match result {
                    Ok(sections) => {
                        for section in sections.iter().filter(|s| s.is_error()) {
                            let message = section.error.as_deref().unwrap_or_default();
                            warn!(reason = message, "backend reported a section error");
                            self.activity.error(format!("Sections: {message}"));
                        }
                        self.activity
                            .info(format!("Loaded {} sections", sections.len()));
                        self.section_list.reset(sections.len());
                        if let Some(session) = self.session.as_mut() {
                            session.set_sections(sections);
                        }
                    }
                    Err(e) => self.fail("Failed to load sections", e),
                }
            }
            BackendEvent::Answer {
                session,
                video_id,
                question,
                result,
            } if for_current(session, &video_id) => {
                self.pending_question = None;
                match result {
                    Ok(answer) => {
                        if let Some(session) = self.session.as_mut() {
                            session.push_answer(question, answer);
                        }
                        let count = self.latest_stamp_count();
                        self.chat_view.on_new_answer(count);
                        self.activity.info("Answer received");
                    }
                    Err(e) => self.fail("Failed to get an answer", e),
                }
            }
            BackendEvent::Visual {
                session,
                video_id,
                query,
                result,
            } if for_current(session, &video_id) => {
                self.pending_search = None;
                match result {
                    Ok(found) => {
                        match &found {
                            Some(hit) => self.activity.info(format!(
                                "\"{query}\" best matches {}",
                                format_timestamp(seconds_from_f64(hit.timestamp))
                            )),
                            None => self.activity.info(format!("No frame matched \"{query}\"")),
                        }
                        if let Some(session) = self.session.as_mut() {
                            session.set_visual(found);
                        }
                    }
                    Err(e) => self.fail("Visual search failed", e),
                }
            }
            stale => info!(?stale, "dropping result for a closed chat"),
        }
    }

    fn fail(&mut self, context: &str, err: Error) {
        error!(error = %err, "{context}");
        self.activity.error(format!("{context}: {err}"));
        self.alert = Some(format!("{context}.\n\n{err}"));
    }

    /// Labels of requests still in flight, for the activity pane.
    pub fn pending_labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.loading_sections {
            labels.push("Loading sections");
        }
        if self.pending_question.is_some() {
            labels.push("Waiting for answer");
        }
        if self.pending_search.is_some() {
            labels.push("Searching frames");
        }
        labels
    }
}
