//! Plain-text sanitizers shared by the outreach stages.
//!
//! Writer output may arrive with markup, `Subject:` scaffolding, or ragged
//! blank lines; everything downstream works on the sanitized form.

use regex::Regex;

/// Strip HTML tags, keeping the text between them.
pub fn strip_html(text: &str) -> String {
    let tags = Regex::new(r"<[^>]+>").expect("regex for html tags");
    tags.replace_all(text, "").into_owned()
}

/// Drop any line carrying a leading `Subject:` label.
pub fn drop_subject_lines(text: &str) -> String {
    let label = Regex::new(r"(?i)^\s*subject\s*:").expect("regex for subject labels");
    text.lines()
        .filter(|line| !label.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse runs of blank lines down to a single empty line.
pub fn collapse_blank_runs(text: &str) -> String {
    let runs = Regex::new(r"\n{3,}").expect("regex for blank runs");
    runs.replace_all(text, "\n\n").into_owned()
}

/// Sanitize writer output into send-ready plain text.
pub fn sanitize_plain_text(text: &str) -> String {
    collapse_blank_runs(&drop_subject_lines(&strip_html(text)))
        .trim()
        .to_string()
}

/// First non-empty line of `text`, trimmed.
pub fn first_nonempty_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Escape text for embedding inside an HTML element.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}
