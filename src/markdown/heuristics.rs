//! Line heuristics that give plain PDF text some Markdown structure.
//!
//! PDF libraries return lines without any notion of headings or lists. A line
//! is treated as a heading when it looks numbered (`1.2`, `3、`, `第二章`,
//! `四、`), is mostly upper-case, or is a short line naming a typical section.
//! Headings shorter than 30 characters become `###`, longer ones `####`.
//! Bullet or enumerated lines become `- ` list items.

use once_cell::sync::Lazy;
use regex::Regex;

const MAX_HEADING_CHARS: usize = 100;
const SHORT_HEADING_CHARS: usize = 30;
const UPPERCASE_RATIO: f64 = 0.7;

static HEADING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^第[一二三四五六七八九十\d]+[章节部分]",
        r"^\d+[\.、]\s*",
        r"^[一二三四五六七八九十]+[、\.]\s*",
        r"^\d+\.\d+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static LIST_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^[•·▪▫◦]\s+",
        r"^[-*+]\s+",
        r"^\d+[\.、)]\s+",
        r"^[a-zA-Z][\.、)]\s+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Section words that mark a short line as a heading.
const HEADING_KEYWORDS: &[&str] = &[
    "概述", "简介", "背景", "目标", "方案", "设计", "实现", "总结", "结论",
];

/// Whether a trimmed, non-empty line looks like a heading.
pub fn is_likely_heading(line: &str) -> bool {
    if line.is_empty() {
        return false;
    }
    let len = line.chars().count();
    if len > MAX_HEADING_CHARS {
        return false;
    }
    if HEADING_PATTERNS.iter().any(|re| re.is_match(line)) {
        return true;
    }

    let upper = line.chars().filter(char::is_ascii_uppercase).count();
    if upper as f64 / len as f64 > UPPERCASE_RATIO {
        return true;
    }

    len < SHORT_HEADING_CHARS && HEADING_KEYWORDS.iter().any(|k| line.contains(k))
}

/// Whether a trimmed line starts with a bullet or enumeration marker.
pub fn is_list_item(line: &str) -> bool {
    LIST_PATTERNS.iter().any(|re| re.is_match(line))
}

/// Turn plain extracted text into Markdown-ish text, one line at a time.
pub fn format_plain_text(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut out = String::with_capacity(text.len() + text.len() / 8);

    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            out.push('\n');
            continue;
        }

        if is_likely_heading(line) {
            let hashes = if line.chars().count() < SHORT_HEADING_CHARS {
                "###"
            } else {
                "####"
            };
            out.push_str(&format!("{hashes} {line}\n\n"));
        } else if is_list_item(line) {
            out.push_str(&format!("- {line}\n"));
        } else {
            out.push_str(line);
            out.push('\n');
        }

        // Separate consecutive paragraphs, but let list items stay together.
        if let Some(next) = lines.get(i + 1) {
            let continues = !next.is_empty() && !is_likely_heading(next);
            let in_list = is_list_item(line) && is_list_item(next);
            if continues && !in_list && !out.ends_with("\n\n") {
                out.push('\n');
            }
        }
    }
    out
}

/// One `## Page N` section per page, each closed by a `---` rule.
///
/// Pages are `(number, text)` pairs; pages with blank text are skipped.
pub fn format_page_sections<'a>(pages: impl IntoIterator<Item = (usize, &'a str)>) -> String {
    let mut out = String::new();
    for (number, text) in pages {
        if text.trim().is_empty() {
            continue;
        }
        out.push_str(&format!("## Page {number}\n\n"));
        out.push_str(format_plain_text(text).trim_end());
        out.push_str("\n\n---\n\n");
    }
    out
}
