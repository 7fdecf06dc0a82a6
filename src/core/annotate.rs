//! Turns free-form answer text from the backend into display fragments.
//!
//! Answers arrive as loosely formatted markdown: sometimes JSON-quoted, with
//! literal `\n` sequences, bold markers and timestamps such as `02:15`,
//! `1:02:05` or `1:00 - 1:30`. [`annotate`] normalizes all of that into a flat
//! list of [`Fragment`]s; [`to_html`] renders them as escaped HTML with every
//! timestamp turned into a clickable element carrying its second count.

use crate::core::timestamp::parse_timestamp;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<a\b[^>]*>(.*?)</a\s*>").expect("valid anchor regex")
});

static LINE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*<br\s*/?>\s*$").expect("valid line break regex"));

static TIMESTAMP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d{1,2}(?::\d{2}){1,2})\b(?:(\s*[-–—]\s*|\s+to\s+)(\d{1,2}(?::\d{2}){1,2})\b)?",
    )
    .expect("valid timestamp regex")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Emphasis {
    pub bold: bool,
    pub italic: bool,
}

/// A timestamp as written in the answer plus the position it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub label: String,
    pub seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text {
        text: String,
        emphasis: Emphasis,
    },
    Timestamp {
        stamp: Stamp,
        emphasis: Emphasis,
    },
    Range {
        start: Stamp,
        separator: String,
        end: Stamp,
        emphasis: Emphasis,
    },
    LineBreak,
}

impl Fragment {
    pub fn emphasis(&self) -> Option<Emphasis> {
        match self {
            Fragment::Text { emphasis, .. }
            | Fragment::Timestamp { emphasis, .. }
            | Fragment::Range { emphasis, .. } => Some(*emphasis),
            Fragment::LineBreak => None,
        }
    }
}

pub fn annotate(raw: &str) -> Vec<Fragment> {
    let text = unescape(raw);
    let text = ANCHOR_RE.replace_all(&text, "$1");

    let mut builder = Builder::default();
    for event in Parser::new(&text) {
        builder.event(event);
    }
    builder.finish()
}

pub fn annotate_html(raw: &str) -> String {
    to_html(&annotate(raw))
}

/// Undo the quoting a JSON-encoded string body leaves behind.
pub fn unescape(raw: &str) -> String {
    let trimmed = raw.trim();
    let quoted = trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"');

    let decoded = if quoted {
        serde_json::from_str::<String>(trimmed)
            .unwrap_or_else(|_| trimmed[1..trimmed.len() - 1].to_string())
    } else {
        trimmed.to_string()
    };

    decoded
        .replace("\\r\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\r\n", "\n")
}

/// Every clickable stamp, in reading order. Ranges contribute both ends.
pub fn stamps(fragments: &[Fragment]) -> Vec<&Stamp> {
    fragments
        .iter()
        .flat_map(|fragment| match fragment {
            Fragment::Timestamp { stamp, .. } => vec![stamp],
            Fragment::Range { start, end, .. } => vec![start, end],
            _ => Vec::new(),
        })
        .collect()
}

pub fn timestamps(fragments: &[Fragment]) -> Vec<u32> {
    stamps(fragments).iter().map(|stamp| stamp.seconds).collect()
}

pub fn to_html(fragments: &[Fragment]) -> String {
    let mut html = String::new();
    let mut open = Emphasis::default();

    for fragment in fragments {
        if let Some(wanted) = fragment.emphasis()
            && wanted != open
        {
            close_tags(&mut html, open);
            open_tags(&mut html, wanted);
            open = wanted;
        }

        match fragment {
            Fragment::Text { text, .. } => html.push_str(&html_escape::encode_text(text)),
            Fragment::Timestamp { stamp, .. } => push_button(&mut html, stamp),
            Fragment::Range {
                start,
                separator,
                end,
                ..
            } => {
                html.push_str(r#"<span class="timestamp-range">"#);
                push_button(&mut html, start);
                html.push_str(&html_escape::encode_text(separator));
                push_button(&mut html, end);
                html.push_str("</span>");
            }
            Fragment::LineBreak => html.push_str("<br>"),
        }
    }

    close_tags(&mut html, open);
    html
}

/// Plain-text rendering for terminals; timestamps are bracketed.
pub fn to_text(fragments: &[Fragment]) -> String {
    let mut out = String::new();
    for fragment in fragments {
        match fragment {
            Fragment::Text { text, .. } => out.push_str(text),
            Fragment::Timestamp { stamp, .. } => out.push_str(&format!("[{}]", stamp.label)),
            Fragment::Range {
                start,
                separator,
                end,
                ..
            } => out.push_str(&format!("[{}]{separator}[{}]", start.label, end.label)),
            Fragment::LineBreak => out.push('\n'),
        }
    }
    out
}

fn push_button(html: &mut String, stamp: &Stamp) {
    html.push_str(&format!(
        r#"<button type="button" class="timestamp" data-seconds="{}">{}</button>"#,
        stamp.seconds,
        html_escape::encode_text(&stamp.label)
    ));
}

fn open_tags(html: &mut String, emphasis: Emphasis) {
    if emphasis.bold {
        html.push_str("<strong>");
    }
    if emphasis.italic {
        html.push_str("<em>");
    }
}

fn close_tags(html: &mut String, emphasis: Emphasis) {
    if emphasis.italic {
        html.push_str("</em>");
    }
    if emphasis.bold {
        html.push_str("</strong>");
    }
}

#[derive(Default)]
struct Builder {
    fragments: Vec<Fragment>,
    buffer: String,
    bold: usize,
    italic: usize,
    pending_breaks: usize,
    lists: Vec<Option<u64>>,
}

impl Builder {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Text(text) | Event::Code(text) => self.buffer.push_str(&text),
            Event::Html(html) | Event::InlineHtml(html) => {
                if LINE_BREAK_RE.is_match(&html) {
                    self.flush();
                    self.pending_breaks += 1;
                } else {
                    self.buffer.push_str(&html);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                self.flush();
                self.pending_breaks += 1;
            }
            Event::Start(Tag::Strong) | Event::Start(Tag::Heading { .. }) => {
                self.flush();
                self.bold += 1;
            }
            Event::End(TagEnd::Strong) => {
                self.flush();
                self.bold = self.bold.saturating_sub(1);
            }
            Event::End(TagEnd::Heading(_)) => {
                self.flush();
                self.bold = self.bold.saturating_sub(1);
                self.end_block(2);
            }
            Event::Start(Tag::Emphasis) => {
                self.flush();
                self.italic += 1;
            }
            Event::End(TagEnd::Emphasis) => {
                self.flush();
                self.italic = self.italic.saturating_sub(1);
            }
            Event::Start(Tag::List(first)) => {
                self.flush();
                if self.pending_breaks > 0 {
                    self.pending_breaks = 1;
                }
                self.lists.push(first);
            }
            Event::End(TagEnd::List(_)) => {
                self.lists.pop();
                let breaks = if self.lists.is_empty() { 2 } else { 1 };
                self.end_block(breaks);
            }
            Event::Start(Tag::Item) => {
                self.flush();
                self.pending_breaks = self.pending_breaks.max(1);
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{number}. ");
                        *number += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.buffer.push_str(&"  ".repeat(depth));
                self.buffer.push_str(&marker);
            }
            Event::End(TagEnd::Item) => self.end_block(1),
            Event::End(TagEnd::Paragraph | TagEnd::CodeBlock | TagEnd::HtmlBlock) => {
                self.end_block(2)
            }
            Event::Rule => self.end_block(2),
            _ => {}
        }
    }

    fn emphasis(&self) -> Emphasis {
        Emphasis {
            bold: self.bold > 0,
            italic: self.italic > 0,
        }
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.buffer);
        let emphasis = self.emphasis();

        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.pending_breaks += 1;
            }
            if !line.is_empty() {
                self.begin_content();
                push_annotated(&mut self.fragments, line, emphasis);
            }
        }
    }

    // Breaks are only materialized in front of content, so the output never
    // starts or ends with one.
    fn begin_content(&mut self) {
        if !self.fragments.is_empty() {
            for _ in 0..self.pending_breaks {
                self.fragments.push(Fragment::LineBreak);
            }
        }
        self.pending_breaks = 0;
    }

    fn end_block(&mut self, breaks: usize) {
        self.flush();
        self.pending_breaks = self.pending_breaks.max(breaks);
    }

    fn finish(mut self) -> Vec<Fragment> {
        self.flush();
        self.fragments
    }
}

fn push_annotated(out: &mut Vec<Fragment>, text: &str, emphasis: Emphasis) {
    // `cursor` marks emitted text, `pos` where the next search starts.
    let mut cursor = 0;
    let mut pos = 0;

    while let Some(caps) = TIMESTAMP_RE.captures_at(text, pos) {
        let (Some(whole), Some(first)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let seconds = if stands_alone(text, first.start(), first.end()) {
            parse_timestamp(first.as_str())
        } else {
            None
        };
        // A rejected start may still be followed by a valid stamp inside the match.
        let Some(seconds) = seconds else {
            pos = first.end();
            continue;
        };

        push_text(out, &text[cursor..whole.start()], emphasis);
        let start = Stamp {
            label: first.as_str().to_string(),
            seconds,
        };

        match range_end(text, &caps) {
            Some((separator, end)) => {
                out.push(Fragment::Range {
                    start,
                    separator,
                    end,
                    emphasis,
                });
                cursor = whole.end();
            }
            None => {
                out.push(Fragment::Timestamp { stamp: start, emphasis });
                cursor = first.end();
            }
        }
        pos = cursor;
    }

    push_text(out, &text[cursor..], emphasis);
}

fn range_end(text: &str, caps: &Captures<'_>) -> Option<(String, Stamp)> {
    let separator = caps.get(2)?;
    let end = caps.get(3)?;
    if !stands_alone(text, end.start(), end.end()) {
        return None;
    }
    let seconds = parse_timestamp(end.as_str())?;
    Some((
        separator.as_str().to_string(),
        Stamp {
            label: end.as_str().to_string(),
            seconds,
        },
    ))
}

// Rejects pieces of longer colon chains such as `1:02:05:07`.
fn stands_alone(text: &str, start: usize, end: usize) -> bool {
    if text[..start].ends_with(':') {
        return false;
    }
    let mut after = text[end..].chars();
    !matches!(
        (after.next(), after.next()),
        (Some(':'), Some(c)) if c.is_ascii_digit()
    )
}

fn push_text(out: &mut Vec<Fragment>, text: &str, emphasis: Emphasis) {
    if text.is_empty() {
        return;
    }
    if let Some(Fragment::Text {
        text: previous,
        emphasis: previous_emphasis,
    }) = out.last_mut()
        && *previous_emphasis == emphasis
    {
        previous.push_str(text);
        return;
    }
    out.push(Fragment::Text {
        text: text.to_string(),
        emphasis,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(label: &str, seconds: u32) -> String {
        format!(
            r#"<button type="button" class="timestamp" data-seconds="{seconds}">{label}</button>"#
        )
    }

    #[test]
    fn single_timestamp_becomes_button() {
        assert_eq!(
            annotate_html("Intro at 02:15."),
            format!("Intro at {}.", button("02:15", 135))
        );
    }

    #[test]
    fn hour_timestamps_carry_full_second_count() {
        assert_eq!(
            annotate_html("Recap at 1:02:05"),
            format!("Recap at {}", button("1:02:05", 3725))
        );
    }

    #[test]
    fn ranges_keep_both_ends_clickable() {
        assert_eq!(
            annotate_html("See 1:00 - 1:30 for details"),
            format!(
                r#"See <span class="timestamp-range">{} - {}</span> for details"#,
                button("1:00", 60),
                button("1:30", 90)
            )
        );

        let fragments = annotate("from 10:00 to 12:30");
        assert_eq!(timestamps(&fragments), vec![600, 750]);
        assert!(matches!(
            &fragments[1],
            Fragment::Range { separator, .. } if separator == " to "
        ));
    }

    #[test]
    fn bold_timestamp_is_wrapped_in_strong() {
        assert_eq!(
            annotate_html("**02:15** intro"),
            format!("<strong>{}</strong> intro", button("02:15", 135))
        );
    }

    #[test]
    fn plain_text_is_escaped() {
        let html = annotate_html("a <script>alert(1)</script> & b");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&amp; b"));
    }

    #[test]
    fn quoted_json_body_is_unescaped() {
        let raw = r#""Line one\nLine two""#;
        assert_eq!(annotate_html(raw), "Line one<br>Line two");
    }

    #[test]
    fn literal_newlines_become_breaks() {
        assert_eq!(annotate_html(r"First\n\nSecond"), "First<br><br>Second");
        assert_eq!(annotate_html("one<br>two"), "one<br>two");
    }

    #[test]
    fn backend_anchor_tags_are_replaced() {
        let raw = r#"Watch <a href="https://www.youtube.com/watch?v=x&t=135s" target="_blank">02:15</a> now"#;
        assert_eq!(
            annotate_html(raw),
            format!("Watch {} now", button("02:15", 135))
        );
    }

    #[test]
    fn invalid_shapes_stay_text() {
        let fragments = annotate("score 7:75, ratio 16:9 and chain 1:02:05:07");
        assert!(timestamps(&fragments).is_empty());
        assert_eq!(
            to_text(&fragments),
            "score 7:75, ratio 16:9 and chain 1:02:05:07"
        );
    }

    #[test]
    fn rejected_range_start_keeps_valid_end() {
        let fragments = annotate("score 7:75 - 1:30 later");
        assert_eq!(timestamps(&fragments), vec![90]);
        assert_eq!(to_text(&fragments), "score 7:75 - [1:30] later");

        let fragments = annotate("chain 1:02:05:07 - 1:30");
        assert_eq!(timestamps(&fragments), vec![90]);
    }

    #[test]
    fn dash_variants_join_ranges() {
        let fragments = annotate("from 1:00–1:30");
        assert_eq!(timestamps(&fragments), vec![60, 90]);
        assert!(matches!(
            &fragments[1],
            Fragment::Range { separator, .. } if separator == "–"
        ));

        let fragments = annotate("from 2:00 — 2:30");
        assert_eq!(to_text(&fragments), "from [2:00] — [2:30]");
    }

    #[test]
    fn italic_is_wrapped_in_em() {
        assert_eq!(
            annotate_html("an *aside* at 00:05"),
            format!("an <em>aside</em> at {}", button("00:05", 5))
        );
    }

    #[test]
    fn headings_render_bold() {
        let fragments = annotate("# Summary\n\nBody");
        assert_eq!(
            fragments[0],
            Fragment::Text {
                text: "Summary".to_string(),
                emphasis: Emphasis {
                    bold: true,
                    italic: false
                },
            }
        );
        assert!(annotate_html("## Key points").starts_with("<strong>Key points"));
    }

    #[test]
    fn literal_escapes_are_unescaped() {
        assert_eq!(unescape(r"a\r\nb\tc"), "a\nb\tc");
        assert_eq!(unescape(r#"say \"hi\""#), "say \"hi\"");
    }

    #[test]
    fn undecodable_quoted_body_drops_quotes() {
        assert_eq!(unescape(r#""bad \x escape""#), r"bad \x escape");
    }

    #[test]
    fn collects_timestamps_in_order() {
        let fragments = annotate("Starts 02:15, then **1:00:00**.");
        assert_eq!(timestamps(&fragments), vec![135, 3600]);
    }

    #[test]
    fn list_items_keep_markers_and_emphasis() {
        let html = annotate_html("Points:\n\n* **Intro** at 00:10\n* Outro at 09:50");
        assert_eq!(
            html,
            format!(
                "Points:<br>• <strong>Intro</strong> at {}<br>• Outro at {}",
                button("00:10", 10),
                button("09:50", 590)
            )
        );
    }

    #[test]
    fn text_rendering_brackets_stamps() {
        let fragments = annotate("Key moment 3:07 - 3:20\nthen *done*");
        assert_eq!(to_text(&fragments), "Key moment [3:07] - [3:20]\nthen done");
    }
}
