//! Deterministic cleanup of an extracted body before it is written.
//!
//! Extractors hand back whatever the library produced: Windows line endings,
//! zero-width characters from copy-pasted sources, long runs of blank lines
//! where pages or empty paragraphs were. None of these rules touch content.
//!
//! Order matters: line endings are normalised before trimming so `\r` does not
//! count as trailing whitespace, and the final-newline pass runs last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules. A blank body becomes the empty string.
///
/// 1. Normalise line endings (CRLF / CR → LF)
/// 2. Remove invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip leading blank lines and end with exactly one newline
pub fn clean_body(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    finish(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ──────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 5: Trim ends ────────────────────────────────────────────────────

fn finish(input: &str) -> String {
    let trimmed = input.trim_start_matches('\n').trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(trim_trailing_whitespace("  hello   \nworld\t"), "  hello\nworld");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(
            remove_invisible_chars("hello\u{200B}world\u{FEFF}foo\u{00AD}bar"),
            "helloworldfoobar"
        );
    }

    #[test]
    fn test_clean_body_end_to_end() {
        let input = "\n\n# Title\r\n\r\nline one   \r\n\n\n\n\n\nline two\n\n\n";
        assert_eq!(clean_body(input), "# Title\n\nline one\n\n\nline two\n");
    }

    #[test]
    fn test_blank_body_is_empty() {
        assert_eq!(clean_body(""), "");
        assert_eq!(clean_body(" \n\t\n\u{200B}"), "");
    }

    #[test]
    fn test_leading_indentation_is_kept() {
        assert_eq!(clean_body("    code\n"), "    code\n");
    }
}
