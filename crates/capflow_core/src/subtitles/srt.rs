//! SRT caption writer.
//!
//! Timing is written with millisecond precision (HH:MM:SS,mmm); segment
//! times in seconds are rounded to the nearest millisecond.

use std::path::Path;

use super::wrap::{wrap_caption, MAX_LINES, MAX_LINE_CHARS};
use super::{CaptionEntry, SubtitleError};

/// Options for [`write_srt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrtOptions {
    /// Skip captions without a translation instead of showing source text.
    pub omit_untranslated: bool,
    pub max_line_chars: usize,
    pub max_lines: usize,
}

impl Default for SrtOptions {
    fn default() -> Self {
        Self {
            omit_untranslated: false,
            max_line_chars: MAX_LINE_CHARS,
            max_lines: MAX_LINES,
        }
    }
}

/// Write caption entries to SRT format string.
pub fn write_srt(entries: &[CaptionEntry], options: &SrtOptions) -> String {
    let mut output = String::new();

    let visible = entries
        .iter()
        .filter(|e| !(options.omit_untranslated && e.translation.is_none()));

    let mut index = 0;
    for entry in visible {
        let text = wrap_caption(entry.display_text(), options.max_line_chars, options.max_lines);
        if text.is_empty() {
            continue;
        }

        if index > 0 {
            output.push('\n');
        }
        index += 1;

        // Index (1-based)
        output.push_str(&format!("{}\n", index));

        let start = format_srt_time(entry.segment.start);
        let end = format_srt_time(entry.segment.end);
        output.push_str(&format!("{} --> {}\n", start, end));

        output.push_str(&text);
        output.push('\n');
    }

    output
}

/// Write caption entries to an SRT file.
pub fn write_srt_file(
    entries: &[CaptionEntry],
    options: &SrtOptions,
    path: &Path,
) -> Result<(), SubtitleError> {
    std::fs::write(path, write_srt(entries, options)).map_err(|source| SubtitleError::WriteError {
        path: path.to_path_buf(),
        source,
    })
}

/// Format seconds as SRT timestamp (HH:MM:SS,mmm).
pub fn format_srt_time(seconds: f64) -> String {
    let ms = (seconds * 1000.0).round().max(0.0) as u64;

    let millis = ms % 1000;
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RejectReason, TranscriptSegment};

    fn seg(start: f64, end: f64, text: &str) -> TranscriptSegment {
        TranscriptSegment::new(start, end, text)
    }

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(1.5), "00:00:01,500");
        assert_eq!(format_srt_time(61.0), "00:01:01,000");
        assert_eq!(format_srt_time(3600.0), "01:00:00,000");
        assert_eq!(format_srt_time(1.2346), "00:00:01,235");
        assert_eq!(format_srt_time(-2.0), "00:00:00,000");
    }

    #[test]
    fn test_write_srt() {
        let entries = vec![
            CaptionEntry::translated(seg(0.0, 2.0, "Hello"), "Olá"),
            CaptionEntry::untranslated(seg(2.5, 4.0, "Goodbye"), RejectReason::PermanentlyBlocked),
        ];

        let srt = write_srt(&entries, &SrtOptions::default());

        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:02,000\nOlá\n\n2\n00:00:02,500 --> 00:00:04,000\nGoodbye\n"
        );
    }

    #[test]
    fn omitting_untranslated_renumbers() {
        let entries = vec![
            CaptionEntry::untranslated(seg(0.0, 1.0, "Blocked"), RejectReason::PermanentlyBlocked),
            CaptionEntry::translated(seg(1.0, 2.0, "Yes"), "Sim"),
        ];
        let options = SrtOptions {
            omit_untranslated: true,
            ..Default::default()
        };

        let srt = write_srt(&entries, &options);
        assert!(srt.starts_with("1\n00:00:01,000"));
        assert!(!srt.contains("Blocked"));
    }

    #[test]
    fn long_captions_are_wrapped() {
        let text = "Esta é uma legenda bastante longa que precisa ser quebrada em duas linhas";
        let entries = vec![CaptionEntry::translated(seg(0.0, 5.0, "x"), text)];
        let srt = write_srt(&entries, &SrtOptions::default());
        let body: Vec<&str> = srt.lines().skip(2).collect();
        assert_eq!(body.len(), 2);
        assert!(body.iter().all(|l| l.chars().count() <= 42));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        let entries = vec![CaptionEntry::translated(seg(0.0, 1.0, "Hi"), "Oi")];

        write_srt_file(&entries, &SrtOptions::default(), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("Oi"));
    }
}
