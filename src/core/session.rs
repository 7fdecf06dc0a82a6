use crate::core::annotate::{self, Fragment};
use crate::core::backend::{Section, VisualResult};
use crate::core::timestamp::{format_timestamp, parse_timestamp, seconds_from_f64};
use crate::core::video::VideoRef;

/// One chat turn. The answer is kept verbatim; its annotated form is computed once.
#[derive(Debug, Clone)]
pub struct QA {
    pub question: String,
    pub answer: String,
    fragments: Vec<Fragment>,
}

impl QA {
    pub fn new(question: String, answer: String) -> Self {
        let fragments = annotate::annotate(&answer);
        Self {
            question,
            answer,
            fragments,
        }
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }
}

/// Everything shown for one video. Lives as long as the chat screen does.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub video: VideoRef,
    pub sections: Vec<Section>,
    pub history: Vec<QA>,
    pub visual: Option<VisualResult>,
    /// Whether the last visual search finished without a match.
    pub visual_missed: bool,
    pub position: u32,
}

impl ChatSession {
    pub fn new(video: VideoRef) -> Self {
        Self {
            video,
            sections: Vec::new(),
            history: Vec::new(),
            visual: None,
            visual_missed: false,
            position: 0,
        }
    }

    pub fn set_sections(&mut self, sections: Vec<Section>) {
        self.sections = sections;
    }

    pub fn push_answer(&mut self, question: String, answer: String) {
        self.history.push(QA::new(question, answer));
    }

    pub fn latest(&self) -> Option<&QA> {
        self.history.last()
    }

    /// Replace the previous result. A match also moves the player.
    pub fn set_visual(&mut self, result: Option<VisualResult>) {
        self.visual_missed = result.is_none();
        if let Some(found) = &result {
            self.seek(seconds_from_f64(found.timestamp));
        }
        self.visual = result;
    }

    pub fn seek(&mut self, seconds: u32) {
        self.position = seconds;
    }

    /// Seek to a section start. Error rows and unparsable starts are skipped.
    pub fn seek_section(&mut self, index: usize) -> Option<u32> {
        let section = self.sections.get(index)?;
        if section.is_error() {
            return None;
        }
        let seconds = parse_timestamp(&section.start)?;
        self.seek(seconds);
        Some(seconds)
    }

    pub fn embed_url(&self) -> String {
        self.video.embed_url(self.position)
    }

    pub fn watch_url(&self) -> String {
        self.video.watch_url_at(self.position)
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "# Chat: {}\n\nExported {}\n",
            self.video.watch_url(),
            chrono::Local::now().format("%Y-%m-%d %H:%M")
        );

        if !self.sections.is_empty() {
            out.push_str("\n## Sections\n\n");
            for section in &self.sections {
                match &section.error {
                    Some(error) => out.push_str(&format!("- error: {error}\n")),
                    None => {
                        let link = parse_timestamp(&section.start)
                            .map(|s| self.video.watch_url_at(s))
                            .or_else(|| section.link.clone());
                        match link {
                            Some(link) => out.push_str(&format!(
                                "- [{} - {}]({link}) {}\n",
                                section.start, section.end, section.summary
                            )),
                            None => out.push_str(&format!(
                                "- {} - {} {}\n",
                                section.start, section.end, section.summary
                            )),
                        }
                    }
                }
            }
        }

        if let Some(visual) = &self.visual {
            out.push_str(&format!(
                "\n## Visual search\n\n{} at {}\n",
                visual.description,
                format_timestamp(seconds_from_f64(visual.timestamp))
            ));
        }

        if !self.history.is_empty() {
            out.push_str("\n## Conversation\n");
            for qa in &self.history {
                out.push_str(&format!(
                    "\n### {}\n\n{}\n",
                    qa.question,
                    annotate::to_text(qa.fragments())
                ));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ChatSession {
        ChatSession::new(VideoRef::parse("dQw4w9WgXcQ").expect("valid id"))
    }

    fn section(start: &str, summary: &str) -> Section {
        Section {
            start: start.to_string(),
            end: "99:00".to_string(),
            summary: summary.to_string(),
            ..Section::default()
        }
    }

    #[test]
    fn history_is_append_only() {
        let mut session = session();
        session.push_answer("first".into(), "at 00:05".into());
        session.push_answer("second".into(), "at 1:00:00".into());
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].question, "first");
        assert_eq!(
            annotate::timestamps(session.latest().expect("latest").fragments()),
            vec![3600]
        );
    }

    #[test]
    fn visual_result_overwrites_and_seeks() {
        let mut session = session();
        session.set_visual(Some(VisualResult {
            timestamp: 30.0,
            description: "dog".into(),
            score: None,
        }));
        assert_eq!(session.position, 30);

        session.set_visual(None);
        assert!(session.visual.is_none());
        assert!(session.visual_missed);
        assert_eq!(session.position, 30);
    }

    #[test]
    fn seeking_sections_skips_errors() {
        let mut session = session();
        session.set_sections(vec![
            section("01:18", "Platform"),
            Section {
                error: Some("quota".into()),
                ..Section::default()
            },
            section("soon", "Broken"),
        ]);

        assert_eq!(session.seek_section(0), Some(78));
        assert_eq!(session.position, 78);
        assert_eq!(session.seek_section(1), None);
        assert_eq!(session.seek_section(2), None);
        assert_eq!(session.seek_section(7), None);
        assert_eq!(session.position, 78);
        assert_eq!(
            session.watch_url(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=78s"
        );
    }

    #[test]
    fn markdown_export_lists_everything() {
        let mut session = session();
        session.set_sections(vec![section("00:00", "Intro")]);
        session.push_answer("Where?".into(), "**Here** at 02:15".into());

        let md = session.to_markdown();
        assert!(md.contains("## Sections"));
        assert!(md.contains("(https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=0s) Intro"));
        assert!(md.contains("### Where?"));
        assert!(md.contains("Here at [02:15]"));
    }
}
