//! DOCX extractors.
//!
//! A `.docx` file is a ZIP container; the body lives in `word/document.xml`
//! and paragraph style names in `word/styles.xml`. Two extractors read it:
//!
//! * [`DocxStyledExtractor`] resolves paragraph styles, turns heading styles
//!   into `#` headings and bold/italic runs into `**`/`*` emphasis.
//! * [`DocxXmlExtractor`] only collects the `w:t` text of each paragraph.
//!   It is the fallback when the styled pass fails.
//!
//! Both walk `document.xml` with a namespace-aware `quick-xml` reader and only
//! act on WordprocessingML elements. The prefix a document binds does not
//! matter, and DrawingML text (`a:p`, `a:t`) nested in runs is ignored.

use super::{Extracted, Extractor, ExtractorChain};
use crate::error::ExtractError;
use quick_xml::events::{BytesRef, BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Reader};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";

/// WordprocessingML namespace, transitional and strict.
const WML_NS: &[u8] = b"http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const WML_STRICT_NS: &[u8] = b"http://purl.oclc.org/ooxml/wordprocessingml/main";

fn is_wml(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == WML_NS || *uri == WML_STRICT_NS)
}

/// The DOCX chain in priority order: styled parse, then raw XML.
pub fn docx_chain() -> ExtractorChain {
    ExtractorChain::new("DOCX")
        .with(DocxStyledExtractor)
        .with(DocxXmlExtractor)
}

/// Map a paragraph style name to a Markdown heading level.
///
/// Only names starting with `Heading` (or the `Title` style) are headings.
/// The level is found by substring: "Heading 1"/"Title" → 1 through
/// "Heading 4" → 4; any other heading style gets level 2.
pub fn heading_level(style_name: &str) -> Option<u8> {
    if !style_name.starts_with("Heading") && style_name != "Title" {
        return None;
    }
    let level = if style_name.contains("Heading 1") || style_name.contains("Title") {
        1
    } else if style_name.contains("Heading 2") {
        2
    } else if style_name.contains("Heading 3") {
        3
    } else if style_name.contains("Heading 4") {
        4
    } else {
        2
    };
    Some(level)
}

// ── Styled extractor ─────────────────────────────────────────────────────

/// Style-aware DOCX extractor producing Markdown-flavoured text.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxStyledExtractor;

impl Extractor for DocxStyledExtractor {
    fn name(&self) -> &'static str {
        "docx-styled"
    }

    fn extract(&self, path: &Path) -> Result<Extracted, ExtractError> {
        let name = self.name();
        let mut archive = open_archive(path, name)?;
        let document = read_part(&mut archive, DOCUMENT_PART, name)?.ok_or_else(|| {
            ExtractError::ParseFailed {
                extractor: name,
                detail: format!("missing {DOCUMENT_PART}"),
            }
        })?;
        let styles = match read_part(&mut archive, STYLES_PART, name)? {
            Some(xml) => parse_styles(&xml).map_err(|detail| ExtractError::ParseFailed {
                extractor: name,
                detail,
            })?,
            None => HashMap::new(),
        };

        let paragraphs = parse_paragraphs(&document).map_err(|detail| {
            ExtractError::ParseFailed {
                extractor: name,
                detail,
            }
        })?;

        let mut text = String::new();
        for para in &paragraphs {
            let plain = para.plain_text();
            let plain = plain.trim();
            if plain.is_empty() {
                continue;
            }
            let level = para
                .style_id
                .as_deref()
                .and_then(|id| styles.get(id))
                .and_then(|style| heading_level(style));
            match level {
                Some(level) => {
                    text.push_str(&"#".repeat(level as usize));
                    text.push(' ');
                    text.push_str(plain);
                }
                None => text.push_str(para.emphasised_text().trim()),
            }
            text.push_str("\n\n");
        }

        Ok(Extracted {
            text,
            page_count: None,
            pages: Vec::new(),
            extractor: name,
        })
    }
}

#[derive(Debug, Default)]
struct Run {
    text: String,
    bold: bool,
    italic: bool,
}

#[derive(Debug, Default)]
struct Paragraph {
    style_id: Option<String>,
    runs: Vec<Run>,
}

impl Paragraph {
    fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    /// Run text with bold/italic markers around non-blank runs.
    fn emphasised_text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            let core = run.text.trim();
            if core.is_empty() || !(run.bold || run.italic) {
                out.push_str(&run.text);
                continue;
            }
            let marker = match (run.bold, run.italic) {
                (true, true) => "***",
                (true, false) => "**",
                _ => "*",
            };
            // Keep surrounding whitespace outside the markers.
            let start = run.text.len() - run.text.trim_start().len();
            let end = run.text.trim_end().len();
            out.push_str(&run.text[..start]);
            out.push_str(marker);
            out.push_str(core);
            out.push_str(marker);
            out.push_str(&run.text[end..]);
        }
        out
    }
}

/// Walk `document.xml` and collect paragraphs with their runs.
///
/// Paragraphs nested in tables or text boxes are emitted in document order.
/// `mc:Fallback` content is skipped since it duplicates `mc:Choice`.
fn parse_paragraphs(xml: &str) -> Result<Vec<Paragraph>, String> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut done = Vec::new();
    let mut open: Vec<Paragraph> = Vec::new();
    let mut run: Option<Run> = None;
    let mut in_ppr = false;
    let mut in_rpr = false;
    let mut in_text = false;
    let mut skip_depth = 0usize;

    loop {
        let (wml, event) = next_event(&mut reader)?;
        match event {
            Event::Start(e) => {
                let name = e.local_name();
                if skip_depth > 0 || name.as_ref() == b"Fallback" {
                    skip_depth += 1;
                    continue;
                }
                if !wml {
                    continue;
                }
                match name.as_ref() {
                    b"p" => open.push(Paragraph::default()),
                    b"pPr" => in_ppr = true,
                    b"r" if !open.is_empty() => run = Some(Run::default()),
                    b"rPr" if !in_ppr => in_rpr = true,
                    b"t" if run.is_some() => in_text = true,
                    _ => apply_property(&e, &mut open, &mut run, in_ppr, in_rpr),
                }
            }
            Event::Empty(e) => {
                if skip_depth > 0 || !wml {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"p" => done.push(Paragraph::default()),
                    b"tab" if !in_ppr => push_run_text(&mut run, "\t"),
                    b"br" | b"cr" if !in_ppr => push_run_text(&mut run, "\n"),
                    _ => apply_property(&e, &mut open, &mut run, in_ppr, in_rpr),
                }
            }
            Event::End(e) => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    continue;
                }
                if !wml {
                    continue;
                }
                match e.local_name().as_ref() {
                    b"p" => {
                        if let Some(p) = open.pop() {
                            done.push(p);
                        }
                    }
                    b"pPr" => in_ppr = false,
                    b"rPr" => in_rpr = false,
                    b"t" => in_text = false,
                    b"r" => {
                        if let (Some(r), Some(p)) = (run.take(), open.last_mut()) {
                            p.runs.push(r);
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) if in_text && skip_depth == 0 => {
                let s = reader.decoder().decode(&t).map_err(|e| e.to_string())?;
                push_run_text(&mut run, &s);
            }
            Event::CData(t) if in_text && skip_depth == 0 => {
                let s = reader.decoder().decode(&t).map_err(|e| e.to_string())?;
                push_run_text(&mut run, &s);
            }
            Event::GeneralRef(r) if in_text && skip_depth == 0 => {
                let s = resolve_reference(&reader, &r)?;
                push_run_text(&mut run, &s);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // Unclosed paragraphs only happen in truncated documents; keep their text.
    done.extend(open);
    Ok(done)
}

/// Next event, and whether its element is in the WordprocessingML namespace.
fn next_event<'i>(reader: &mut NsReader<&'i [u8]>) -> Result<(bool, Event<'i>), String> {
    match reader.read_resolved_event() {
        Ok((ns, event)) => Ok((is_wml(&ns), event)),
        Err(e) => Err(format!("XML error at byte {}: {e}", reader.buffer_position())),
    }
}

fn push_run_text(run: &mut Option<Run>, s: &str) {
    if let Some(r) = run.as_mut() {
        r.text.push_str(s);
    }
}

/// Handle `w:pStyle`, `w:b` and `w:i`, which may appear as start or empty tags.
fn apply_property(
    e: &BytesStart<'_>,
    open: &mut [Paragraph],
    run: &mut Option<Run>,
    in_ppr: bool,
    in_rpr: bool,
) {
    match e.local_name().as_ref() {
        b"pStyle" if in_ppr => {
            if let (Some(p), Some(v)) = (open.last_mut(), val_attr(e)) {
                p.style_id = Some(v);
            }
        }
        b"b" if in_rpr => {
            if let Some(r) = run.as_mut() {
                r.bold = toggle_is_on(e);
            }
        }
        b"i" if in_rpr => {
            if let Some(r) = run.as_mut() {
                r.italic = toggle_is_on(e);
            }
        }
        _ => {}
    }
}

/// `w:val` attribute of an element, if present.
fn val_attr(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"val")
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// OOXML on/off property: absent `w:val` means on.
fn toggle_is_on(e: &BytesStart<'_>) -> bool {
    !matches!(val_attr(e).as_deref(), Some("0" | "false" | "off" | "none"))
}

fn resolve_reference(reader: &Reader<&[u8]>, r: &BytesRef<'_>) -> Result<String, String> {
    let name = reader.decoder().decode(r).map_err(|e| e.to_string())?;
    let resolved = match name.as_ref() {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        n if n.starts_with("#x") || n.starts_with("#X") => {
            u32::from_str_radix(&n[2..], 16).ok().and_then(char::from_u32)
        }
        n if n.starts_with('#') => n[1..].parse::<u32>().ok().and_then(char::from_u32),
        _ => None,
    };
    Ok(match resolved {
        Some(c) => c.to_string(),
        None => format!("&{name};"),
    })
}

/// Map style ids to display names from `styles.xml`.
///
/// Built-in styles are stored lower-case (`heading 1`, `title`); they are
/// reported with the capitalised names Word shows in its UI.
fn parse_styles(xml: &str) -> Result<HashMap<String, String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut styles = HashMap::new();
    let mut current_id: Option<String> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            format!("XML error at byte {}: {e}", reader.buffer_position())
        })?;
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"style" => {
                current_id = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.local_name().as_ref() == b"styleId")
                    .map(|a| String::from_utf8_lossy(&a.value).into_owned());
            }
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"name" => {
                if let (Some(id), Some(name)) = (current_id.as_ref(), val_attr(&e)) {
                    styles.insert(id.clone(), display_style_name(&name));
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"style" => current_id = None,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(styles)
}

fn display_style_name(name: &str) -> String {
    let lower = name.to_lowercase();
    if let Some(rest) = lower.strip_prefix("heading ") {
        format!("Heading {rest}")
    } else if lower == "title" {
        "Title".to_string()
    } else {
        name.to_string()
    }
}

// ── Raw XML extractor ────────────────────────────────────────────────────

/// Fallback DOCX extractor: paragraph text only, no styles.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxXmlExtractor;

impl Extractor for DocxXmlExtractor {
    fn name(&self) -> &'static str {
        "docx-xml"
    }

    fn extract(&self, path: &Path) -> Result<Extracted, ExtractError> {
        let name = self.name();
        let mut archive = open_archive(path, name)?;
        let document = read_part(&mut archive, DOCUMENT_PART, name)?.ok_or_else(|| {
            ExtractError::ParseFailed {
                extractor: name,
                detail: format!("missing {DOCUMENT_PART}"),
            }
        })?;
        let paragraphs = paragraph_texts(&document).map_err(|detail| {
            ExtractError::ParseFailed {
                extractor: name,
                detail,
            }
        })?;

        Ok(Extracted {
            text: paragraphs.join("\n\n"),
            page_count: None,
            pages: Vec::new(),
            extractor: name,
        })
    }
}

/// Trimmed, non-empty `w:t` text of each `w:p`, WordprocessingML elements only.
fn paragraph_texts(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut out = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut in_text = false;

    fn finish(text: String, out: &mut Vec<String>) {
        let t = text.trim();
        if !t.is_empty() {
            out.push(t.to_string());
        }
    }

    loop {
        let (wml, event) = next_event(&mut reader)?;
        match event {
            Event::Start(e) if wml => match e.local_name().as_ref() {
                b"p" => stack.push(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Event::End(e) if wml => match e.local_name().as_ref() {
                b"p" => {
                    if let Some(text) = stack.pop() {
                        finish(text, &mut out);
                    }
                }
                b"t" => in_text = false,
                _ => {}
            },
            Event::Text(t) if in_text => {
                let s = reader.decoder().decode(&t).map_err(|e| e.to_string())?;
                if let Some(cur) = stack.last_mut() {
                    cur.push_str(&s);
                }
            }
            Event::GeneralRef(r) if in_text => {
                let s = resolve_reference(&reader, &r)?;
                if let Some(cur) = stack.last_mut() {
                    cur.push_str(&s);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    for text in stack {
        finish(text, &mut out);
    }
    Ok(out)
}

// ── Container access ─────────────────────────────────────────────────────

fn open_archive(
    path: &Path,
    extractor: &'static str,
) -> Result<zip::ZipArchive<File>, ExtractError> {
    let file = File::open(path).map_err(|e| ExtractError::ParseFailed {
        extractor,
        detail: e.to_string(),
    })?;
    zip::ZipArchive::new(file).map_err(|e| ExtractError::ParseFailed {
        extractor,
        detail: format!("not a DOCX container: {e}"),
    })
}

/// Read one part of the container as UTF-8; `None` if it does not exist.
fn read_part(
    archive: &mut zip::ZipArchive<File>,
    part: &str,
    extractor: &'static str,
) -> Result<Option<String>, ExtractError> {
    let mut entry = match archive.by_name(part) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(ExtractError::ParseFailed {
                extractor,
                detail: format!("{part}: {e}"),
            })
        }
    };
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| ExtractError::ParseFailed {
            extractor,
            detail: format!("{part}: {e}"),
        })?;
    Ok(Some(xml))
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    fn doc(body: &str) -> String {
        format!(r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="{W}"><w:body>{body}</w:body></w:document>"#)
    }

    #[test]
    fn heading_levels_by_style_name() {
        assert_eq!(heading_level("Heading 1"), Some(1));
        assert_eq!(heading_level("Title"), Some(1));
        assert_eq!(heading_level("Heading 2"), Some(2));
        assert_eq!(heading_level("Heading 3"), Some(3));
        assert_eq!(heading_level("Heading 4"), Some(4));
        assert_eq!(heading_level("Heading 7"), Some(2));
        assert_eq!(heading_level("Heading Custom"), Some(2));
        assert_eq!(heading_level("Normal"), None);
        assert_eq!(heading_level("List Paragraph"), None);
    }

    #[test]
    fn raw_paragraphs_are_trimmed_and_blank_ones_dropped() {
        let xml = doc(
            "<w:p><w:r><w:t xml:space=\"preserve\">  Hello </w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>\
             <w:p><w:r><w:t>   </w:t></w:r></w:p>\
             <w:p/>\
             <w:p><w:r><w:t>Second</w:t></w:r></w:p>",
        );
        assert_eq!(paragraph_texts(&xml).unwrap(), vec!["Hello world", "Second"]);
    }

    #[test]
    fn entities_are_resolved() {
        let xml = doc("<w:p><w:r><w:t>R&amp;D &lt;v2&gt; caf&#233;</w:t></w:r></w:p>");
        assert_eq!(paragraph_texts(&xml).unwrap(), vec!["R&D <v2> café"]);
    }

    #[test]
    fn runs_carry_emphasis_and_paragraph_style() {
        let xml = doc(
            "<w:p><w:pPr><w:pStyle w:val=\"Heading3\"/></w:pPr><w:r><w:t>Scope</w:t></w:r></w:p>\
             <w:p><w:r><w:t xml:space=\"preserve\">plain </w:t></w:r>\
             <w:r><w:rPr><w:b/></w:rPr><w:t>bold</w:t></w:r>\
             <w:r><w:t xml:space=\"preserve\"> and </w:t></w:r>\
             <w:r><w:rPr><w:i w:val=\"true\"/></w:rPr><w:t>italic</w:t></w:r>\
             <w:r><w:rPr><w:b w:val=\"0\"/></w:rPr><w:t xml:space=\"preserve\"> end</w:t></w:r></w:p>",
        );
        let paras = parse_paragraphs(&xml).unwrap();
        assert_eq!(paras.len(), 2);
        assert_eq!(paras[0].style_id.as_deref(), Some("Heading3"));
        assert_eq!(
            paras[1].emphasised_text(),
            "plain **bold** and *italic* end"
        );
    }

    #[test]
    fn tabs_and_breaks_become_whitespace() {
        let xml = doc("<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c</w:t></w:r></w:p>");
        let paras = parse_paragraphs(&xml).unwrap();
        assert_eq!(paras[0].plain_text(), "a\tb\nc");
    }

    #[test]
    fn styles_map_ids_to_display_names() {
        let xml = format!(
            r#"<w:styles xmlns:w="{W}">
                <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>
                <w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/></w:style>
                <w:style w:type="paragraph" w:styleId="Quote"><w:name w:val="Quote"/></w:style>
            </w:styles>"#
        );
        let styles = parse_styles(&xml).unwrap();
        assert_eq!(styles["Heading1"], "Heading 1");
        assert_eq!(styles["Title"], "Title");
        assert_eq!(styles["Quote"], "Quote");
    }

    #[test]
    fn fallback_content_is_not_duplicated() {
        let xml = doc(
            "<w:p><w:r><mc:AlternateContent xmlns:mc=\"http://schemas.openxmlformats.org/markup-compatibility/2006\">\
             <mc:Choice Requires=\"wps\"><w:p><w:r><w:t>boxed</w:t></w:r></w:p></mc:Choice>\
             <mc:Fallback><w:p><w:r><w:t>boxed</w:t></w:r></w:p></mc:Fallback>\
             </mc:AlternateContent></w:r></w:p>",
        );
        let texts: Vec<String> = parse_paragraphs(&xml)
            .unwrap()
            .iter()
            .map(Paragraph::plain_text)
            .filter(|t| !t.is_empty())
            .collect();
        assert_eq!(texts, vec!["boxed"]);
    }

    const DRAWING_RUN: &str = "<a:graphic xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\">\
        <a:p><a:r><a:t>chart label</a:t></a:r></a:p></a:graphic>";

    #[test]
    fn drawingml_text_inside_a_run_is_ignored() {
        let xml = doc(&format!(
            "<w:p><w:r><w:t xml:space=\"preserve\">Revenue </w:t>{DRAWING_RUN}<w:t>grew</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Next</w:t></w:r></w:p>"
        ));
        let paras = parse_paragraphs(&xml).unwrap();
        assert_eq!(paras.len(), 2);
        assert_eq!(paras[0].plain_text(), "Revenue grew");
        assert_eq!(paras[1].plain_text(), "Next");

        assert_eq!(paragraph_texts(&xml).unwrap(), vec!["Revenue grew", "Next"]);
    }

    #[test]
    fn any_prefix_bound_to_wordprocessingml_is_accepted() {
        let xml = format!(
            r#"<doc:document xmlns:doc="{W}"><doc:body><doc:p><doc:r><doc:t>Renamed</doc:t></doc:r></doc:p></doc:body></doc:document>"#
        );
        assert_eq!(paragraph_texts(&xml).unwrap(), vec!["Renamed"]);
        assert_eq!(parse_paragraphs(&xml).unwrap()[0].plain_text(), "Renamed");
    }

    #[test]
    fn unqualified_elements_are_ignored() {
        let xml = "<document><body><p><r><t>stray</t></r></p></body></document>";
        assert!(paragraph_texts(xml).unwrap().is_empty());
        assert!(parse_paragraphs(xml).unwrap().is_empty());
    }
}
