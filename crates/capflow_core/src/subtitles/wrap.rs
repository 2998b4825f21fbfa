//! Caption line wrapping.

/// Maximum characters per caption line.
pub const MAX_LINE_CHARS: usize = 42;

/// Maximum lines per caption.
pub const MAX_LINES: usize = 2;

/// Greedy word wrap to `max_chars` per line, keeping at most `max_lines`.
///
/// Existing line breaks are treated as spaces. Words past the last line are
/// dropped; a single word longer than `max_chars` gets a line of its own.
pub fn wrap_caption(text: &str, max_chars: usize, max_lines: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };

        if candidate_len <= max_chars || current.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        tracing::debug!(
            "Caption needs {} lines, keeping {}: {}",
            lines.len(),
            max_lines,
            text
        );
        lines.truncate(max_lines);
    }
    lines.join("\n")
}
