use chrono::{NaiveDate, NaiveTime};

pub const FILE_PREFIX: &str = "running_knowledge_";
pub const HEADER_PREFIX: &str = "## Captured at ";
pub const BLOCK_END: &str = "---";
pub const EMPTY_MARKER: &str = "_No recognizable text._";

/// Prefixed to body lines that would otherwise read back as a header or as
/// the empty marker. Also a markdown escape, so the file renders the same.
const ESCAPE: char = '\\';

/// `running_knowledge_20240309.md`
pub fn file_name_for(date: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}.md", date.format("%Y%m%d"))
}

/// One appended block: a time header, the text, and a closing rule.
pub fn format_block(text: &str, at: NaiveTime) -> String {
    let body = text.trim_end_matches(['\n', '\r']);
    let body = if body.trim().is_empty() {
        EMPTY_MARKER.to_string()
    } else {
        escape_body(body)
    };
    format!(
        "\n\n{HEADER_PREFIX}{}\n\n{body}\n\n{BLOCK_END}\n",
        at.format("%H:%M:%S")
    )
}

fn escape_body(body: &str) -> String {
    body.split('\n')
        .map(|line| {
            if needs_escape(line) {
                format!("{ESCAPE}{line}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_line(line: &str) -> &str {
    match line.strip_prefix(ESCAPE) {
        Some(rest) if needs_escape(rest) => rest,
        _ => line,
    }
}

/// Lines starting with the header prefix or equal to the marker, including
/// ones already carrying escapes, so escaping stays reversible.
fn needs_escape(line: &str) -> bool {
    let bare = line.trim_start_matches(ESCAPE).trim_end_matches('\r');
    bare.starts_with(HEADER_PREFIX) || bare == EMPTY_MARKER
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeEntry {
    pub captured_at: NaiveTime,
    pub text: String,
}

/// Reads the blocks of a knowledge file back, in file order.
///
/// A block's body runs to the last `---` line before the next header, so
/// OCR text that itself contains a `---` line survives.
pub fn parse_blocks(contents: &str) -> Vec<KnowledgeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<(NaiveTime, Vec<&str>)> = None;

    for line in contents.lines() {
        if let Some(time) = header_time(line) {
            if let Some((at, body)) = current.take() {
                entries.push(finish(at, body));
            }
            current = Some((time, Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }

    if let Some((at, body)) = current {
        entries.push(finish(at, body));
    }
    entries
}

fn header_time(line: &str) -> Option<NaiveTime> {
    line.strip_prefix(HEADER_PREFIX)
        .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M:%S").ok())
}

fn finish(captured_at: NaiveTime, mut body: Vec<&str>) -> KnowledgeEntry {
    if let Some(end) = body.iter().rposition(|l| l.trim_end() == BLOCK_END) {
        body.truncate(end);
    }

    let first = body.iter().position(|l| !l.trim().is_empty());
    let last = body.iter().rposition(|l| !l.trim().is_empty());
    let body = match (first, last) {
        (Some(first), Some(last)) => &body[first..=last],
        _ => &[][..],
    };

    let text = if body == [EMPTY_MARKER] {
        String::new()
    } else {
        body.iter()
            .map(|line| unescape_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    };
    KnowledgeEntry { captured_at, text }
}
