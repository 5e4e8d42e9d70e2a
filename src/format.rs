//! Text transforms that turn a validated [`Alert`] into something a human
//! wants to read in an inbox or a work item.

use regex::Regex;
use std::ops::Range;

use crate::alert::Alert;
use crate::config::PipelineConfig;

const ANNOTATIONS_MARKER: &str = "Annotations:";
const MUTED: &str = "color:#6b7280";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Text,
    Html,
}

#[derive(Debug, Clone)]
pub struct Formatter {
    strip_parenthetical: bool,
    strip_annotations: bool,
    include_summary: bool,
    highlights: Vec<Regex>,
    label_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedAlert {
    pub alert_id: String,
    pub status: Option<String>,
    pub title: String,
    pub title_bracket: Option<String>,
    message: String,
    highlights: Vec<Range<usize>>,
    pub summary: Option<String>,
    pub labels: Vec<(String, String)>,
}

impl Formatter {
    pub fn new(config: &PipelineConfig) -> Result<Self, regex::Error> {
        let highlights = config
            .highlight_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            strip_parenthetical: config.strip_parenthetical,
            strip_annotations: config.strip_annotations,
            include_summary: config.include_summary,
            highlights,
            label_keys: config.label_keys.clone(),
        })
    }

    pub fn format(&self, alert: &Alert) -> FormattedAlert {
        let (title, title_bracket) = if self.strip_parenthetical {
            split_parenthetical(&alert.title)
        } else {
            (alert.title.trim().to_string(), None)
        };

        let message = if self.strip_annotations {
            strip_annotations(&alert.message)
        } else {
            alert.message.trim_end()
        }
        .to_string();

        let highlights = highlight_ranges(&message, &self.highlights);

        let summary = if self.include_summary && alert.is_firing() {
            alert.summary.clone()
        } else {
            None
        };

        let labels = self
            .label_keys
            .iter()
            .filter_map(|key| alert.labels.get(key).map(|v| (key.clone(), v.clone())))
            .collect();

        FormattedAlert {
            alert_id: alert.id.clone(),
            status: alert.status.clone(),
            title,
            title_bracket,
            message,
            highlights,
            summary,
            labels,
        }
    }
}

/// Splits `"Foo (bar)"` into `("Foo", Some("(bar)"))`. Titles without a
/// trailing, non-nested parenthetical are returned trimmed and whole.
pub fn split_parenthetical(title: &str) -> (String, Option<String>) {
    let trimmed = title.trim();
    if let Some(inner_end) = trimmed.strip_suffix(')') {
        if let Some(open) = inner_end.rfind('(') {
            let main = trimmed[..open].trim_end();
            let inner = &inner_end[open + 1..];
            if !main.is_empty() && !inner.contains(')') {
                return (main.to_string(), Some(trimmed[open..].to_string()));
            }
        }
    }
    (trimmed.to_string(), None)
}

/// Drops everything from the first `Annotations:` marker onward.
pub fn strip_annotations(message: &str) -> &str {
    match message.find(ANNOTATIONS_MARKER) {
        Some(idx) => message[..idx].trim_end(),
        None => message.trim_end(),
    }
}

fn highlight_ranges(text: &str, patterns: &[Regex]) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = patterns
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| m.range()))
        .filter(|r| !r.is_empty())
        .collect();
    ranges.sort_by_key(|r| (r.start, r.end));

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

fn render(text: &str, highlights: &[Range<usize>], style: Style) -> String {
    let mut out = String::with_capacity(text.len() + highlights.len() * 8);
    let mut cursor = 0;
    for range in highlights {
        push_segment(&mut out, &text[cursor..range.start], style);
        match style {
            Style::Text => {
                out.push_str("**");
                out.push_str(&text[range.clone()]);
                out.push_str("**");
            }
            Style::Html => {
                out.push_str("<b>");
                push_segment(&mut out, &text[range.clone()], style);
                out.push_str("</b>");
            }
        }
        cursor = range.end;
    }
    push_segment(&mut out, &text[cursor..], style);
    out
}

fn push_segment(out: &mut String, segment: &str, style: Style) {
    match style {
        Style::Text => out.push_str(segment),
        Style::Html => {
            for ch in segment.chars() {
                match ch {
                    '&' => out.push_str("&amp;"),
                    '<' => out.push_str("&lt;"),
                    '>' => out.push_str("&gt;"),
                    '"' => out.push_str("&quot;"),
                    '\'' => out.push_str("&#39;"),
                    '\n' => out.push_str("<br>\n"),
                    '\r' => {}
                    c => out.push(c),
                }
            }
        }
    }
}

fn escape_html(text: &str) -> String {
    render(text, &[], Style::Html)
}

impl FormattedAlert {
    /// Title with its parenthetical, if any, rejoined.
    pub fn full_title(&self) -> String {
        match &self.title_bracket {
            Some(bracket) => format!("{} {}", self.title, bracket),
            None => self.title.clone(),
        }
    }

    pub fn subject(&self) -> String {
        match &self.status {
            Some(status) => format!("[{}] {}", status.to_uppercase(), self.full_title()),
            None => self.full_title(),
        }
    }

    /// Message after annotation stripping, before highlighting.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn message_text(&self) -> String {
        render(&self.message, &self.highlights, Style::Text)
    }

    pub fn message_html(&self) -> String {
        render(&self.message, &self.highlights, Style::Html)
    }

    pub fn text_body(&self) -> String {
        let mut header = self.full_title();
        if let Some(status) = &self.status {
            header.push_str("\nStatus: ");
            header.push_str(&status.to_uppercase());
        }

        let mut sections = vec![header, self.message_text()];
        if let Some(summary) = &self.summary {
            sections.push(format!("Summary: {}", summary));
        }
        if !self.labels.is_empty() {
            let mut labels = String::from("Labels:");
            for (key, value) in &self.labels {
                labels.push_str(&format!("\n  {}: {}", key, value));
            }
            sections.push(labels);
        }
        sections.push(format!("Alert ID: {}", self.alert_id));
        sections.join("\n\n")
    }

    /// HTML fragment, used as the work item description.
    pub fn html_fragment(&self) -> String {
        let mut heading = format!("<h2>{}", escape_html(&self.title));
        if let Some(bracket) = &self.title_bracket {
            heading.push_str(&format!(
                " <span style=\"{};font-weight:normal\">{}</span>",
                MUTED,
                escape_html(bracket)
            ));
        }
        heading.push_str("</h2>");

        let mut lines = vec![heading];
        if let Some(status) = &self.status {
            lines.push(format!(
                "<p><b>Status:</b> {}</p>",
                escape_html(&status.to_uppercase())
            ));
        }
        lines.push(format!("<p>{}</p>", self.message_html()));
        if let Some(summary) = &self.summary {
            lines.push(format!("<p><b>Summary:</b> {}</p>", escape_html(summary)));
        }
        if !self.labels.is_empty() {
            lines.push("<table cellpadding=\"4\">".to_string());
            for (key, value) in &self.labels {
                lines.push(format!(
                    "<tr><td><b>{}</b></td><td>{}</td></tr>",
                    escape_html(key),
                    escape_html(value)
                ));
            }
            lines.push("</table>".to_string());
        }
        lines.push(format!(
            "<p style=\"{};font-size:12px\">Alert ID: {}</p>",
            MUTED,
            escape_html(&self.alert_id)
        ));
        lines.join("\n")
    }

    pub fn html_body(&self) -> String {
        format!("<html><body>\n{}\n</body></html>", self.html_fragment())
    }
}
